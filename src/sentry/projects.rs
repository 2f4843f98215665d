//! Sentry Projects
//!
//! Functions for creating, reading and deleting Sentry projects.

use super::client::SentryClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Slug reference to an organization or team
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SlugRef {
    pub slug: String,
}

/// Project as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentryProject {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub organization: Option<SlugRef>,
    #[serde(default)]
    pub team: Option<SlugRef>,
    #[serde(default)]
    pub teams: Vec<SlugRef>,
    #[serde(default)]
    pub subject_prefix: Option<String>,
    #[serde(default)]
    pub subject_template: Option<String>,
    #[serde(default)]
    pub default_environment: Option<String>,
}

impl SentryProject {
    /// Owning team: the legacy `team` field, else the first of `teams`
    pub fn team_slug(&self) -> Option<&str> {
        self.team
            .as_ref()
            .or_else(|| self.teams.first())
            .map(|t| t.slug.as_str())
    }

    pub fn organization_slug(&self) -> Option<&str> {
        self.organization.as_ref().map(|o| o.slug.as_str())
    }
}

/// Settings applied after creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_environment: Option<String>,
}

impl ProjectSettings {
    pub fn is_empty(&self) -> bool {
        self.subject_prefix.is_none()
            && self.subject_template.is_none()
            && self.default_environment.is_none()
    }
}

fn parse_project(value: Value) -> Result<SentryProject> {
    serde_json::from_value(value).context("Failed to parse project response")
}

/// Create a project owned by a team
pub async fn create_project(
    client: &SentryClient,
    organization: &str,
    team: &str,
    name: &str,
    slug: &str,
) -> Result<SentryProject> {
    let url = client.team_projects_url(organization, team)?;
    let body = json!({ "name": name, "slug": slug });
    let response = client
        .post(&url, Some(&body))
        .await
        .with_context(|| format!("could not create project {}", slug))?;
    parse_project(response)
}

/// Get a project by slug
pub async fn get_project(
    client: &SentryClient,
    organization: &str,
    slug: &str,
) -> Result<SentryProject> {
    let url = client.project_url(organization, slug)?;
    let response = client
        .get(&url)
        .await
        .with_context(|| format!("could not get project {}/{}", organization, slug))?;
    parse_project(response)
}

/// Apply settings to an existing project
pub async fn update_project(
    client: &SentryClient,
    organization: &str,
    slug: &str,
    settings: &ProjectSettings,
) -> Result<SentryProject> {
    let url = client.project_url(organization, slug)?;
    let body = serde_json::to_value(settings)?;
    let response = client
        .put(&url, Some(&body))
        .await
        .with_context(|| format!("could not update project {}/{}", organization, slug))?;
    parse_project(response)
}

/// Delete a project
pub async fn delete_project(client: &SentryClient, organization: &str, slug: &str) -> Result<()> {
    let url = client.project_url(organization, slug)?;
    client
        .delete(&url)
        .await
        .with_context(|| format!("could not delete project {}/{}", organization, slug))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_prefers_legacy_team() {
        let project = parse_project(json!({
            "id": "2",
            "name": "Pump Station",
            "slug": "pump-station",
            "organization": {"slug": "acme", "name": "Acme"},
            "team": {"slug": "core"},
            "teams": [{"slug": "other"}],
            "subjectPrefix": "[acme]",
            "subjectTemplate": null
        }))
        .unwrap();
        assert_eq!(project.team_slug(), Some("core"));
        assert_eq!(project.organization_slug(), Some("acme"));
        assert_eq!(project.subject_prefix.as_deref(), Some("[acme]"));
        assert_eq!(project.subject_template, None);
    }

    #[test]
    fn test_parse_project_falls_back_to_teams() {
        let project = parse_project(json!({
            "name": "n",
            "slug": "s",
            "teams": [{"slug": "first"}, {"slug": "second"}]
        }))
        .unwrap();
        assert_eq!(project.team_slug(), Some("first"));
        assert_eq!(project.organization_slug(), None);
    }

    #[test]
    fn test_settings_serialize_only_present_fields() {
        let settings = ProjectSettings {
            subject_prefix: Some("[x]".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            json!({"subjectPrefix": "[x]"})
        );
        assert!(!settings.is_empty());
        assert!(ProjectSettings::default().is_empty());
    }
}
