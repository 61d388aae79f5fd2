//! Package index availability (PyPI JSON API)

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::execution::poller::ReadinessCheck;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_INDEX_URL: &str = "https://pypi.org";

/// Checks whether a package (optionally at a specific version) is published
#[derive(Debug, Clone)]
pub struct PackageIndexCheck {
    client: reqwest::Client,
    index_url: String,
    package: String,
    version: Option<String>,
}

impl PackageIndexCheck {
    pub fn new(
        index_url: impl Into<String>,
        package: impl Into<String>,
        version: Option<String>,
    ) -> ReleaseResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ReleaseError::Failure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            index_url: index_url.into().trim_end_matches('/').to_string(),
            package: package.into(),
            version,
        })
    }

    /// JSON endpoint for the package or one of its releases
    pub fn url(&self) -> String {
        match &self.version {
            Some(version) => format!("{}/pypi/{}/{}/json", self.index_url, self.package, version),
            None => format!("{}/pypi/{}/json", self.index_url, self.package),
        }
    }

    /// Single existence check: `Ok(false)` when the index answers 404
    pub async fn exists(&self) -> ReleaseResult<bool> {
        let url = self.url();
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReleaseError::from_request(e, "package index"))?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(ReleaseError::from_status(status, "package index")),
        }
    }
}

#[async_trait]
impl ReadinessCheck for PackageIndexCheck {
    fn resource(&self) -> String {
        match &self.version {
            Some(version) => format!("package {}=={}", self.package, version),
            None => format!("package {}", self.package),
        }
    }

    async fn check_ready(&self) -> ReleaseResult<bool> {
        self.exists().await
    }
}

/// Package versions drop a leading `v` from the release tag
pub fn package_version(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}
