//! The slice of the Sentry API the provider needs, as a trait so the
//! provider can run against a fake.

use super::client::SentryClient;
use super::keys::{self, SentryClientKey};
use super::projects::{self, ProjectSettings, SentryProject};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SentryApi: Send + Sync {
    async fn create_project(
        &self,
        organization: &str,
        team: &str,
        name: &str,
        slug: &str,
    ) -> Result<SentryProject>;

    async fn get_project(&self, organization: &str, slug: &str) -> Result<SentryProject>;

    async fn update_project(
        &self,
        organization: &str,
        slug: &str,
        settings: &ProjectSettings,
    ) -> Result<SentryProject>;

    async fn delete_project(&self, organization: &str, slug: &str) -> Result<()>;

    async fn list_client_keys(
        &self,
        organization: &str,
        project: &str,
    ) -> Result<Vec<SentryClientKey>>;

    async fn create_client_key(
        &self,
        organization: &str,
        project: &str,
        name: &str,
    ) -> Result<SentryClientKey>;

    async fn delete_client_key(
        &self,
        organization: &str,
        project: &str,
        key_id: &str,
    ) -> Result<()>;
}

#[async_trait]
impl SentryApi for SentryClient {
    async fn create_project(
        &self,
        organization: &str,
        team: &str,
        name: &str,
        slug: &str,
    ) -> Result<SentryProject> {
        projects::create_project(self, organization, team, name, slug).await
    }

    async fn get_project(&self, organization: &str, slug: &str) -> Result<SentryProject> {
        projects::get_project(self, organization, slug).await
    }

    async fn update_project(
        &self,
        organization: &str,
        slug: &str,
        settings: &ProjectSettings,
    ) -> Result<SentryProject> {
        projects::update_project(self, organization, slug, settings).await
    }

    async fn delete_project(&self, organization: &str, slug: &str) -> Result<()> {
        projects::delete_project(self, organization, slug).await
    }

    async fn list_client_keys(
        &self,
        organization: &str,
        project: &str,
    ) -> Result<Vec<SentryClientKey>> {
        keys::list_client_keys(self, organization, project).await
    }

    async fn create_client_key(
        &self,
        organization: &str,
        project: &str,
        name: &str,
    ) -> Result<SentryClientKey> {
        keys::create_client_key(self, organization, project, name).await
    }

    async fn delete_client_key(
        &self,
        organization: &str,
        project: &str,
        key_id: &str,
    ) -> Result<()> {
        keys::delete_client_key(self, organization, project, key_id).await
    }
}
