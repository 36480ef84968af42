use std::{sync::Arc, time::Duration};

use http::HeaderValue;
use url::Url;

use crate::{
    api,
    auth::{AddressingStyle, Auth, Region},
    error::{Error, Result},
    region::RegionCache,
    transport::{ReqwestTransport, Transport},
    util::{hash::ChecksumKind, part::PartPlanner},
};

/// Handle to one S3-compatible endpoint.
///
/// Clones share the connection pool and the bucket region cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

pub struct ClientBuilder {
    endpoint: Url,
    region: Option<String>,
    auth: Auth,
    addressing: AddressingStyle,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    app_info: Option<(String, String)>,
    min_part_size: Option<u64>,
    transport: Option<Arc<dyn Transport>>,
}

pub(crate) struct Inner {
    pub(crate) endpoint: Url,
    pub(crate) region: Option<Region>,
    pub(crate) auth: Auth,
    pub(crate) addressing: AddressingStyle,
    pub(crate) user_agent: HeaderValue,
    pub(crate) planner: PartPlanner,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) regions: RegionCache,
}

/// How request payloads are covered by the signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PayloadMode {
    /// No credentials: nothing is signed, bodies carry `Content-MD5`.
    Anonymous,
    /// Authenticated over plain HTTP: the SHA256 of the body is signed.
    Sha256,
    /// Authenticated over TLS: `UNSIGNED-PAYLOAD` plus `Content-MD5`.
    UnsignedWithMd5,
}

impl PayloadMode {
    /// The digest uploads compute for their bodies in this mode.
    pub(crate) fn checksum_kind(self) -> ChecksumKind {
        match self {
            Self::Sha256 => ChecksumKind::Sha256,
            Self::Anonymous | Self::UnsignedWithMd5 => ChecksumKind::Md5,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("region", &self.inner.region)
            .field("auth", &self.inner.auth)
            .field("addressing", &self.inner.addressing)
            .finish()
    }
}

impl Client {
    pub fn builder(endpoint: impl AsRef<str>) -> Result<ClientBuilder> {
        ClientBuilder::new(endpoint.as_ref())
    }

    pub fn objects(&self) -> api::ObjectsService {
        api::ObjectsService::new(self.clone())
    }

    pub fn uploads(&self) -> api::UploadsService {
        api::UploadsService::new(self.clone())
    }

    pub fn buckets(&self) -> api::BucketsService {
        api::BucketsService::new(self.clone())
    }

    /// Part sizing in effect for this client.
    pub fn part_planner(&self) -> PartPlanner {
        self.inner.planner
    }

    /// The statically configured region, if any.
    pub fn region(&self) -> Option<&Region> {
        self.inner.region.as_ref()
    }

    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }

    pub(crate) fn payload_mode(&self) -> PayloadMode {
        match self.inner.auth.credentials() {
            None => PayloadMode::Anonymous,
            Some(_) if self.inner.endpoint.scheme() == "http" => PayloadMode::Sha256,
            Some(_) => PayloadMode::UnsignedWithMd5,
        }
    }

    /// Region for requests that are not scoped to a bucket.
    pub(crate) fn default_region(&self) -> Region {
        self.inner.region.clone().unwrap_or_else(Region::us_east_1)
    }
}

impl ClientBuilder {
    fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|_| Error::validation("endpoint must be a valid absolute URL"))?;

        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(Error::validation("endpoint scheme must be http or https"));
        }
        if endpoint.host_str().is_none() {
            return Err(Error::validation("endpoint must include host"));
        }
        if endpoint.query().is_some() || endpoint.fragment().is_some() {
            return Err(Error::validation(
                "endpoint must not include query or fragment",
            ));
        }
        if endpoint.path() != "/" && !endpoint.path().is_empty() {
            return Err(Error::validation("endpoint must not include a path"));
        }

        Ok(Self {
            endpoint,
            region: None,
            auth: Auth::Anonymous,
            addressing: AddressingStyle::Auto,
            timeout: None,
            user_agent: None,
            app_info: None,
            min_part_size: None,
            transport: None,
        })
    }

    /// Fixes the signing region for every bucket; no location lookups are made.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn addressing_style(mut self, style: AddressingStyle) -> Self {
        self.addressing = style;
        self
    }

    /// Per-request timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the whole `User-Agent` value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Appends `name/version` to the default `User-Agent`.
    pub fn app_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.app_info = Some((name.into(), version.into()));
        self
    }

    pub fn min_part_size(mut self, bytes: u64) -> Self {
        self.min_part_size = Some(bytes);
        self
    }

    /// Sends requests through `transport` instead of the built-in client.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client> {
        let region = self.region.map(Region::new).transpose()?;

        let mut user_agent = self.user_agent.unwrap_or_else(default_user_agent);
        if let Some((name, version)) = self.app_info {
            if name.trim().is_empty() || version.trim().is_empty() {
                return Err(Error::validation("app name and version must not be empty"));
            }
            user_agent = format!("{user_agent} {}/{}", name.trim(), version.trim());
        }
        let user_agent = HeaderValue::from_str(&user_agent)
            .map_err(|_| Error::validation("user agent contains invalid characters"))?;

        let planner = match self.min_part_size {
            Some(bytes) => PartPlanner::new(bytes)?,
            None => PartPlanner::default(),
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            endpoint = %self.endpoint,
            region = region.as_ref().map_or("<per bucket>", Region::as_str),
            static_region = region.is_some(),
            "s3 client configured"
        );

        Ok(Client {
            inner: Arc::new(Inner {
                endpoint: self.endpoint,
                region,
                auth: self.auth,
                addressing: self.addressing,
                user_agent,
                planner,
                transport,
                regions: RegionCache::default(),
            }),
        })
    }
}

fn default_user_agent() -> String {
    format!(
        "s3-transfer/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
