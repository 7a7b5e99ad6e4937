use std::time::Duration;

use async_trait::async_trait;
use codetype_common::{Error, Result};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

/// Upper bound on one admin call, so account deletion latency stays bounded.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_ERROR_BODY_CHARS: usize = 256;

/// How a successful identity deletion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityDeletion {
    Deleted,
    /// The provider had no such identity. Counts as success so that repeated
    /// deletions converge on the same end state.
    AlreadyAbsent,
}

/// Administrative operations on the external identity provider.
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    async fn delete_identity(&self, identity_id: &str) -> Result<IdentityDeletion>;
}

/// Client for the identity provider's admin API. Performs no retries.
pub struct IdentityAdminClient {
    base_url: Url,
    http: Client,
}

impl IdentityAdminClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid identity admin url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "identity admin url {base_url} cannot carry a path"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build identity admin client: {e}")))?;

        Ok(Self { base_url, http })
    }

    fn identity_url(&self, identity_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::Config(format!("identity admin url {} cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty().push("identities").push(identity_id);
        }
        Ok(url)
    }
}

#[async_trait]
impl IdentityAdmin for IdentityAdminClient {
    /// `DELETE {base}/identities/{id}`: 204 and 404 succeed, anything else
    /// fails with the status for diagnostics.
    async fn delete_identity(&self, identity_id: &str) -> Result<IdentityDeletion> {
        let url = self.identity_url(identity_id)?;
        debug!("deleting identity via {url}");

        let resp = self
            .http
            .delete(url.clone())
            .send()
            .await
            .map_err(|e| {
                Error::IdentityProvider(format!("failed to call identity admin api at {url}: {e}"))
            })?;

        match resp.status() {
            StatusCode::NO_CONTENT => Ok(IdentityDeletion::Deleted),
            StatusCode::NOT_FOUND => Ok(IdentityDeletion::AlreadyAbsent),
            status => {
                let body: String = resp
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_ERROR_BODY_CHARS)
                    .collect();
                Err(Error::IdentityProvider(format!(
                    "identity admin api returned {status}: {body}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IdentityAdminClient;

    #[test]
    fn identity_url_appends_escaped_segment() {
        let client = IdentityAdminClient::new("http://kratos:4434").unwrap();
        assert_eq!(
            client.identity_url("abc").unwrap().as_str(),
            "http://kratos:4434/identities/abc"
        );
        assert_eq!(
            client.identity_url("a/b").unwrap().as_str(),
            "http://kratos:4434/identities/a%2Fb"
        );
    }

    #[test]
    fn identity_url_keeps_base_path_and_tolerates_trailing_slash() {
        let client = IdentityAdminClient::new("http://gateway/admin/").unwrap();
        assert_eq!(
            client.identity_url("abc").unwrap().as_str(),
            "http://gateway/admin/identities/abc"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        assert!(IdentityAdminClient::new("not a url").is_err());
        assert!(IdentityAdminClient::new("mailto:admin@example.com").is_err());
    }
}
