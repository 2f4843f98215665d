//! Sentry Client
//!
//! Main client for the Sentry REST API, combining the auth token, the API
//! base URL and the HTTP client.

use super::http::SentryHttpClient;
use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Main Sentry client
#[derive(Clone)]
pub struct SentryClient {
    pub http: SentryHttpClient,
    token: String,
    base_url: Url,
}

impl std::fmt::Debug for SentryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentryClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl SentryClient {
    /// Create a new Sentry client
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        // Url::join drops the last path segment unless it ends with '/'
        let mut api_url = config.api_url.clone();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let base_url = Url::parse(&api_url)
            .with_context(|| format!("could not parse URL {:?}", config.api_url))?;

        let http = SentryHttpClient::new()?;

        Ok(Self {
            http,
            token: config.token.clone(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a GET request to the Sentry API
    pub async fn get(&self, url: &str) -> Result<Value> {
        self.http.get(url, &self.token).await
    }

    /// Make a POST request to the Sentry API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        self.http.post(url, &self.token, body).await
    }

    /// Make a PUT request to the Sentry API
    pub async fn put(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        self.http.put(url, &self.token, body).await
    }

    /// Make a DELETE request to the Sentry API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.http.delete(url, &self.token).await
    }

    /// Do a test request to check the client is set up correctly
    pub async fn check(&self) -> Result<()> {
        let url = self.api_url(&["projects"])?;
        self.get(&url).await.context("Sentry API check failed")?;
        Ok(())
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build an API URL from path segments. Every segment is percent-encoded
    /// and the result keeps Sentry's trailing slash.
    pub fn api_url(&self, segments: &[&str]) -> Result<String> {
        let path = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = self
            .base_url
            .join(&format!("{}/", path))
            .with_context(|| format!("could not build API URL for {}", path))?;
        Ok(url.to_string())
    }

    /// `teams/{org}/{team}/projects/`
    pub fn team_projects_url(&self, organization: &str, team: &str) -> Result<String> {
        self.api_url(&["teams", organization, team, "projects"])
    }

    /// `projects/{org}/{project}/`
    pub fn project_url(&self, organization: &str, project: &str) -> Result<String> {
        self.api_url(&["projects", organization, project])
    }

    /// `projects/{org}/{project}/keys/`
    pub fn project_keys_url(&self, organization: &str, project: &str) -> Result<String> {
        self.api_url(&["projects", organization, project, "keys"])
    }

    /// `projects/{org}/{project}/keys/{key}/`
    pub fn project_key_url(
        &self,
        organization: &str,
        project: &str,
        key_id: &str,
    ) -> Result<String> {
        self.api_url(&["projects", organization, project, "keys", key_id])
    }
}
