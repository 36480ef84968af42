//! Browser form uploads signed with a POST policy.

use std::collections::BTreeMap;

use base64::Engine as _;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime, macros::format_description};

use crate::{
    api::ObjectsService,
    error::{Error, Result},
    types::PostPolicyOutput,
    util::{
        self,
        signing::{ALGORITHM, SigningScope, post_policy_signature},
    },
};

const DEFAULT_EXPIRY: Duration = Duration::days(7);

/// Conditions a browser form upload must satisfy.
#[derive(Clone, Debug, Default)]
pub struct PostPolicy {
    expiration: Option<OffsetDateTime>,
    conditions: Vec<Value>,
    form_data: BTreeMap<String, String>,
    bucket: Option<String>,
}

impl PostPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults to seven days after signing.
    pub fn expires(mut self, at: OffsetDateTime) -> Self {
        self.expiration = Some(at);
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        util::validate::bucket_name(&bucket)?;
        self.conditions.push(json!(["eq", "$bucket", bucket]));
        self.form_data.insert("bucket".to_string(), bucket.clone());
        self.bucket = Some(bucket);
        Ok(self)
    }

    pub fn key(mut self, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        util::validate::object_name(&key)?;
        self.conditions.push(json!(["eq", "$key", key]));
        self.form_data.insert("key".to_string(), key);
        Ok(self)
    }

    /// Accepts any key under `prefix`; the form's `key` field starts out as
    /// the prefix.
    pub fn key_starts_with(mut self, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        util::validate::prefix(&prefix)?;
        self.conditions.push(json!(["starts-with", "$key", prefix]));
        self.form_data.insert("key".to_string(), prefix);
        Ok(self)
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Result<Self> {
        let content_type = content_type.into();
        if content_type.trim().is_empty() {
            return Err(Error::validation("content type must not be empty"));
        }
        self.conditions
            .push(json!(["eq", "$Content-Type", content_type]));
        self.form_data
            .insert("Content-Type".to_string(), content_type);
        Ok(self)
    }

    pub fn content_length_range(mut self, min: u64, max: u64) -> Result<Self> {
        if min > max {
            return Err(Error::validation(format!(
                "content length range minimum {min} exceeds maximum {max}"
            )));
        }
        self.conditions
            .push(json!(["content-length-range", min, max]));
        Ok(self)
    }

    fn document(&self, now: OffsetDateTime) -> Result<Value> {
        let expiration = self.expiration.unwrap_or(now + DEFAULT_EXPIRY);
        let expiration = expiration
            .to_offset(time::UtcOffset::UTC)
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
            ))
            .map_err(|_| Error::validation("policy expiration cannot be formatted"))?;
        Ok(json!({
            "expiration": expiration,
            "conditions": self.conditions,
        }))
    }
}

impl ObjectsService {
    /// Signs `policy` and returns the form target and the fields to post.
    pub async fn presigned_post_policy(&self, policy: PostPolicy) -> Result<PostPolicyOutput> {
        let client = self.client();
        let credentials = client
            .inner()
            .auth
            .credentials()
            .ok_or_else(|| Error::validation("POST policies require credentials"))?;
        let bucket = policy
            .bucket
            .clone()
            .ok_or_else(|| Error::validation("POST policy must name a bucket"))?;

        let region = client.bucket_region(&bucket).await?;
        let scope = SigningScope::new(credentials, &region, OffsetDateTime::now_utc());
        let mut policy = policy;

        let mut signed_field = |name: &str, value: String| {
            policy
                .conditions
                .push(json!(["eq", format!("${name}"), value.clone()]));
            policy.form_data.insert(name.to_string(), value);
        };
        signed_field("x-amz-date", scope.amz_date());
        signed_field("x-amz-algorithm", ALGORITHM.to_string());
        signed_field("x-amz-credential", scope.credential());
        if let Some(token) = &credentials.session_token {
            signed_field("x-amz-security-token", token.clone());
        }

        let document = policy.document(scope.now)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(document.to_string());
        let signature = post_policy_signature(scope, &encoded)?;

        let mut form_data = policy.form_data;
        form_data.insert("policy".to_string(), encoded);
        form_data.insert("x-amz-signature".to_string(), signature);

        let url = util::url::resolve_url(
            &client.inner().endpoint,
            Some(&bucket),
            None,
            &[],
            client.inner().addressing,
            region.as_str(),
        )?
        .url;

        Ok(PostPolicyOutput { url, form_data })
    }
}
