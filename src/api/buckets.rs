use http::{Method, StatusCode};

use crate::{
    auth::Region,
    client::{
        Client,
        dispatch::{Payload, RequestSpec},
    },
    error::{Error, Result},
    types::Bucket,
    util,
};

/// Bucket-level operations.
#[derive(Clone)]
pub struct BucketsService {
    client: Client,
}

impl BucketsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn list(&self) -> ListBucketsRequest {
        ListBucketsRequest {
            client: self.client.clone(),
        }
    }

    pub fn exists(&self, bucket: impl Into<String>) -> BucketExistsRequest {
        BucketExistsRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }

    pub fn create(&self, bucket: impl Into<String>) -> CreateBucketRequest {
        CreateBucketRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
            region: None,
        }
    }

    pub fn remove(&self, bucket: impl Into<String>) -> RemoveBucketRequest {
        RemoveBucketRequest {
            client: self.client.clone(),
            bucket: bucket.into(),
        }
    }
}

pub struct ListBucketsRequest {
    client: Client,
}

impl ListBucketsRequest {
    pub async fn send(self) -> Result<Vec<Bucket>> {
        let body = self
            .client
            .dispatch(
                RequestSpec::new(Method::GET).region(self.client.default_region()),
                Payload::Empty,
                StatusCode::OK,
            )
            .await?
            .text()
            .await?;
        util::xml::parse_list_buckets(&body)
    }
}

pub struct BucketExistsRequest {
    client: Client,
    bucket: String,
}

impl BucketExistsRequest {
    pub async fn send(self) -> Result<bool> {
        let result = self
            .client
            .dispatch_drained(
                RequestSpec::new(Method::HEAD).bucket(&self.bucket),
                Payload::Empty,
                StatusCode::OK,
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(err) if matches!(err.code(), Some("NotFound" | "NoSuchBucket")) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

pub struct CreateBucketRequest {
    client: Client,
    bucket: String,
    region: Option<String>,
}

impl CreateBucketRequest {
    /// Location of the new bucket; the client region, else `us-east-1`,
    /// when unset.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub async fn send(self) -> Result<()> {
        let requested = self.region.map(Region::new).transpose()?;
        let region = match (self.client.region(), requested) {
            (Some(fixed), Some(requested)) if fixed != &requested => {
                return Err(Error::validation(format!(
                    "bucket region {} conflicts with client region {}",
                    requested.as_str(),
                    fixed.as_str()
                )));
            }
            (_, Some(requested)) => requested,
            (_, None) => self.client.default_region(),
        };

        let payload = if region == Region::us_east_1() {
            Payload::Empty
        } else {
            Payload::Bytes(util::xml::encode_create_bucket_configuration(region.as_str())?)
        };

        self.client
            .dispatch_drained(
                RequestSpec::new(Method::PUT)
                    .bucket(&self.bucket)
                    .region(region),
                payload,
                StatusCode::OK,
            )
            .await?;
        Ok(())
    }
}

pub struct RemoveBucketRequest {
    client: Client,
    bucket: String,
}

impl RemoveBucketRequest {
    pub async fn send(self) -> Result<()> {
        self.client
            .dispatch_drained(
                RequestSpec::new(Method::DELETE).bucket(&self.bucket),
                Payload::Empty,
                StatusCode::NO_CONTENT,
            )
            .await?;
        self.client.inner().regions.invalidate(&self.bucket);
        Ok(())
    }
}
