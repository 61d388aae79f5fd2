//! Container registry availability (Docker Hub v2 API)

use crate::core::error::{ReleaseError, ReleaseResult};
use crate::execution::poller::ReadinessCheck;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

const AUTH_URL: &str = "https://auth.docker.io/token";
const REGISTRY_URL: &str = "https://registry-1.docker.io";
const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.list.v2+json";

/// A parsed `repo[:tag]` image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Repository path, always namespaced (`library/` for official images)
    pub repository: String,
    pub reference: String,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.reference)
    }
}

/// Parse an image reference such as `nginx`, `acme/api:1.2.0` or `docker.io/acme/api`
///
/// The tag defaults to `latest`, unqualified names get the `library/` namespace.
pub fn parse_image_ref(image: &str) -> ReleaseResult<ImageRef> {
    let image = image.trim();
    let image = image.strip_prefix("docker.io/").unwrap_or(image);
    if image.is_empty() {
        return Err(ReleaseError::Validation("image reference is empty".to_string()));
    }

    // A colon before the last slash belongs to a registry port, not a tag
    let last_slash = image.rfind('/');
    let (repository, reference) = match image.rfind(':') {
        Some(colon) if last_slash.map_or(true, |slash| colon > slash) => {
            (&image[..colon], &image[colon + 1..])
        }
        _ => (image, "latest"),
    };

    if repository.is_empty() || reference.is_empty() {
        return Err(ReleaseError::Validation(format!(
            "invalid image reference: {}",
            image
        )));
    }

    let repository = if repository.contains('/') {
        repository.to_string()
    } else {
        format!("library/{}", repository)
    };

    Ok(ImageRef {
        repository,
        reference: reference.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Checks whether an image manifest is published on Docker Hub
#[derive(Debug, Clone)]
pub struct RegistryCheck {
    client: reqwest::Client,
    image: ImageRef,
}

impl RegistryCheck {
    pub fn new(image: &str) -> ReleaseResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ReleaseError::Failure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            image: parse_image_ref(image)?,
        })
    }

    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    async fn pull_token(&self) -> ReleaseResult<String> {
        let scope = format!("repository:{}:pull", self.image.repository);
        let response = self
            .client
            .get(AUTH_URL)
            .query(&[("service", "registry.docker.io"), ("scope", scope.as_str())])
            .send()
            .await
            .map_err(|e| ReleaseError::from_request(e, "registry auth"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReleaseError::from_status(status.as_u16(), "registry auth"));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ReleaseError::Failure(format!("registry auth: invalid response: {}", e)))?;

        body.token
            .or(body.access_token)
            .ok_or_else(|| ReleaseError::Failure("registry auth returned no token".to_string()))
    }

    /// Single existence check via a manifest HEAD request
    pub async fn exists(&self) -> ReleaseResult<bool> {
        let token = self.pull_token().await?;
        let url = format!(
            "{}/v2/{}/manifests/{}",
            REGISTRY_URL, self.image.repository, self.image.reference
        );
        debug!("HEAD {}", url);

        let response = self
            .client
            .head(&url)
            .bearer_auth(token)
            .header("Accept", MANIFEST_ACCEPT)
            .send()
            .await
            .map_err(|e| ReleaseError::from_request(e, "registry manifest"))?;

        match response.status().as_u16() {
            200 => Ok(true),
            // Hub answers 401 for repositories that do not exist yet
            401 | 404 => Ok(false),
            status => Err(ReleaseError::from_status(status, "registry manifest")),
        }
    }
}

#[async_trait]
impl ReadinessCheck for RegistryCheck {
    fn resource(&self) -> String {
        format!("image {}", self.image)
    }

    async fn check_ready(&self) -> ReleaseResult<bool> {
        self.exists().await
    }
}
