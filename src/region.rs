//! Bucket region lookup and its per-client cache.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use http::{Method, StatusCode};

use crate::{
    auth::Region,
    client::{
        Client,
        dispatch::{Payload, RequestSpec},
    },
    error::{Error, Result},
    util,
};

/// bucket → region, filled lazily and dropped on any failed request that
/// names the bucket.
#[derive(Debug, Default)]
pub(crate) struct RegionCache {
    map: Mutex<HashMap<String, Region>>,
}

impl RegionCache {
    pub(crate) fn get(&self, bucket: &str) -> Option<Region> {
        self.lock().get(bucket).cloned()
    }

    pub(crate) fn insert(&self, bucket: &str, region: Region) {
        self.lock().insert(bucket.to_string(), region);
    }

    pub(crate) fn invalidate(&self, bucket: &str) {
        if self.lock().remove(bucket).is_some() {
            #[cfg(feature = "tracing")]
            tracing::debug!(bucket, "dropped cached bucket region");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Region>> {
        // Every critical section is a single map call.
        self.map
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Static region, else cached region, else a location lookup.
pub(crate) async fn resolve(client: &Client, bucket: &str) -> Result<Region> {
    if let Some(region) = client.region() {
        return Ok(region.clone());
    }
    let cache = &client.inner().regions;
    if let Some(region) = cache.get(bucket) {
        return Ok(region);
    }

    let region = match bootstrap(client, bucket).await {
        Ok(region) => region,
        Err(err)
            if client.inner().auth.credentials().is_none()
                && err.status() == Some(StatusCode::FORBIDDEN) =>
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(bucket, "bucket location not readable anonymously, using us-east-1");
            return Ok(Region::us_east_1());
        }
        Err(err) => return Err(err),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(bucket, region = region.as_str(), "resolved bucket region");
    cache.insert(bucket, region.clone());
    Ok(region)
}

/// `GET ?location`, path style and signed for `us-east-1`. A rejection that
/// names the bucket's real region is retried once for that region.
async fn bootstrap(client: &Client, bucket: &str) -> Result<Region> {
    let first = client
        .exchange(
            location_request(bucket).path_style(),
            Payload::Empty,
            StatusCode::OK,
            &Region::us_east_1(),
        )
        .await;

    let response = match first {
        Ok(response) => response,
        Err(err) => {
            let hint = match &err {
                Error::Protocol {
                    code,
                    region: Some(hint),
                    ..
                } if code == "AuthorizationHeaderMalformed" => Some(hint.clone()),
                _ => None,
            };
            let Some(hint) = hint else {
                return Err(err);
            };
            let hinted = Region::new(hint)?;
            #[cfg(feature = "tracing")]
            tracing::debug!(
                bucket,
                region = hinted.as_str(),
                "retrying bucket location with hinted region"
            );
            client
                .exchange(
                    location_request(bucket),
                    Payload::Empty,
                    StatusCode::OK,
                    &hinted,
                )
                .await?
        }
    };

    let body = response.text().await?;
    let constraint = util::xml::parse_location_constraint(&body)?;
    Ok(normalize_location(constraint.as_deref()))
}

fn location_request(bucket: &str) -> RequestSpec<'_> {
    RequestSpec::new(Method::GET)
        .bucket(bucket)
        .query("location", "")
}

/// An empty constraint is `us-east-1`; `EU` is the legacy name of
/// `eu-west-1`.
fn normalize_location(constraint: Option<&str>) -> Region {
    match constraint {
        None => Region::us_east_1(),
        Some("EU") => Region::new("eu-west-1").unwrap_or_else(|_| Region::us_east_1()),
        Some(other) => Region::new(other).unwrap_or_else(|_| Region::us_east_1()),
    }
}
