//! `sentry:index:Project`
//!
//! Ids are `<organizationSlug>/<slug>`. Every input is immutable, so any
//! change is a replacement.

use super::{
    check_inputs, provider_error, replace_on_any_change, CheckResult, DiffResult, ProviderResource,
};
use crate::error::{EngineError, EngineResult};
use crate::property::{get_str, require_str, PropertyMap};
use crate::resource::Urn;
use crate::sentry::projects::{ProjectSettings, SentryProject};
use crate::sentry::{is_not_found, SentryApi};
use serde_json::Value;

pub const TYPE_TOKEN: &str = "sentry:index:Project";

pub const REQUIRED_INPUTS: [&str; 4] = ["name", "organizationSlug", "slug", "teamSlug"];
pub const OPTIONAL_INPUTS: [&str; 3] = ["defaultEnvironment", "subjectPrefix", "subjectTemplate"];

/// Output computed by the provider, never accepted as an input
pub const DSN_OUTPUT: &str = "defaultClientKeyDSNPublic";

fn all_inputs() -> Vec<&'static str> {
    REQUIRED_INPUTS.iter().chain(OPTIONAL_INPUTS.iter()).copied().collect()
}

pub fn build_id(organization: &str, slug: &str) -> String {
    format!("{}/{}", organization, slug)
}

pub fn parse_id(id: &str) -> EngineResult<(String, String)> {
    match id.split('/').collect::<Vec<_>>().as_slice() {
        [org, slug] if !org.is_empty() && !slug.is_empty() => {
            Ok((org.to_string(), slug.to_string()))
        }
        _ => Err(EngineError::InvalidId(id.to_string())),
    }
}

pub fn check(news: &PropertyMap) -> CheckResult {
    let mut result = check_inputs(news, &REQUIRED_INPUTS, &OPTIONAL_INPUTS);
    result.inputs.remove(DSN_OUTPUT);
    result
}

/// Every change replaces. The id is `org/slug`, so when neither changes the
/// old project has to be deleted before its replacement can take the slug.
pub fn diff(olds: &PropertyMap, news: &PropertyMap) -> DiffResult {
    let mut result = replace_on_any_change(olds, news, &all_inputs());
    result.delete_before_replace = result.requires_replace()
        && !result
            .replaces
            .iter()
            .any(|key| key == "organizationSlug" || key == "slug");
    result
}

fn settings_from(inputs: &PropertyMap) -> ProjectSettings {
    ProjectSettings {
        subject_prefix: get_str(inputs, "subjectPrefix").map(str::to_string),
        subject_template: get_str(inputs, "subjectTemplate").map(str::to_string),
        default_environment: get_str(inputs, "defaultEnvironment").map(str::to_string),
    }
}

/// Public DSN of the project's first client key. Missing keys are not fatal.
async fn default_dsn(api: &dyn SentryApi, organization: &str, slug: &str) -> Option<String> {
    match api.list_client_keys(organization, slug).await {
        Ok(keys) => keys
            .into_iter()
            .next()
            .map(|k| k.dsn.public)
            .filter(|dsn| !dsn.is_empty()),
        Err(e) => {
            tracing::warn!("Could not read client keys of {}/{}: {:#}", organization, slug, e);
            None
        }
    }
}

fn outputs_from(
    project: &SentryProject,
    organization: &str,
    team: Option<&str>,
    dsn: Option<String>,
) -> PropertyMap {
    let mut outputs = PropertyMap::new();
    outputs.insert("name".into(), Value::String(project.name.clone()));
    outputs.insert(
        "organizationSlug".into(),
        Value::String(project.organization_slug().unwrap_or(organization).to_string()),
    );
    outputs.insert("slug".into(), Value::String(project.slug.clone()));
    if let Some(team) = team.or_else(|| project.team_slug()) {
        outputs.insert("teamSlug".into(), Value::String(team.to_string()));
    }
    let optional = [
        ("defaultEnvironment", &project.default_environment),
        ("subjectPrefix", &project.subject_prefix),
        ("subjectTemplate", &project.subject_template),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            outputs.insert(key.into(), Value::String(value.clone()));
        }
    }
    if let Some(dsn) = dsn {
        outputs.insert(DSN_OUTPUT.into(), Value::String(dsn));
    }
    outputs
}

pub async fn create(
    api: &dyn SentryApi,
    urn: &Urn,
    inputs: &PropertyMap,
) -> EngineResult<ProviderResource> {
    let organization = require_str(inputs, "organizationSlug").map_err(provider_error(urn))?;
    let team = require_str(inputs, "teamSlug").map_err(provider_error(urn))?;
    let name = require_str(inputs, "name").map_err(provider_error(urn))?;
    let slug = require_str(inputs, "slug").map_err(provider_error(urn))?;

    let mut project = api
        .create_project(&organization, &team, &name, &slug)
        .await
        .map_err(provider_error(urn))?;
    if project.slug != slug {
        tracing::info!("Sentry normalized project slug '{}' to '{}'", slug, project.slug);
    }

    let settings = settings_from(inputs);
    if !settings.is_empty() {
        project = api
            .update_project(&organization, &project.slug, &settings)
            .await
            .map_err(provider_error(urn))?;
    }

    let dsn = default_dsn(api, &organization, &project.slug).await;
    Ok(ProviderResource {
        id: build_id(&organization, &project.slug),
        outputs: outputs_from(&project, &organization, Some(&team), dsn),
    })
}

pub async fn read(
    api: &dyn SentryApi,
    urn: &Urn,
    id: &str,
) -> EngineResult<Option<ProviderResource>> {
    let (organization, slug) = parse_id(id)?;
    let project = match api.get_project(&organization, &slug).await {
        Ok(project) => project,
        Err(e) if is_not_found(&e) => return Ok(None),
        Err(e) => return Err(provider_error(urn)(e)),
    };

    let dsn = default_dsn(api, &organization, &project.slug).await;
    Ok(Some(ProviderResource {
        id: build_id(&organization, &project.slug),
        outputs: outputs_from(&project, &organization, None, dsn),
    }))
}

pub async fn delete(api: &dyn SentryApi, urn: &Urn, id: &str) -> EngineResult<()> {
    let (organization, slug) = parse_id(id)?;
    match api.delete_project(&organization, &slug).await {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => {
            tracing::debug!("Project {} already gone", id);
            Ok(())
        }
        Err(e) => Err(provider_error(urn)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckFailure;
    use crate::provider::fake::FakeSentry;
    use crate::provider::NON_EMPTY_STRING_REASON;
    use crate::resource::TypeToken;
    use serde_json::json;

    fn map(value: Value) -> PropertyMap {
        value.as_object().cloned().unwrap()
    }

    fn urn() -> Urn {
        Urn::new("dev", "test", None, &TypeToken::parse(TYPE_TOKEN).unwrap(), "proj1")
    }

    fn valid_inputs() -> PropertyMap {
        map(json!({
            "name": "p1",
            "organizationSlug": "org1",
            "slug": "p1-slug",
            "teamSlug": "team1",
        }))
    }

    #[test]
    fn test_id_round_trip() {
        assert_eq!(build_id("org1", "p1"), "org1/p1");
        assert_eq!(parse_id("org1/p1").unwrap(), ("org1".to_string(), "p1".to_string()));
    }

    #[test]
    fn test_parse_id_rejects_malformed() {
        for id in ["", "org1", "org1/", "/p1", "a/b/c"] {
            assert_eq!(parse_id(id), Err(EngineError::InvalidId(id.to_string())), "{id}");
        }
    }

    #[test]
    fn test_check_accepts_valid_inputs() {
        let result = check(&valid_inputs());
        assert!(result.failures.is_empty());
        assert_eq!(result.inputs, valid_inputs());
    }

    #[test]
    fn test_check_reports_every_missing_input() {
        let result = check(&map(json!({"name": "", "slug": 1})));
        assert_eq!(
            result.failures,
            vec![
                CheckFailure::new("name", NON_EMPTY_STRING_REASON),
                CheckFailure::new("organizationSlug", NON_EMPTY_STRING_REASON),
                CheckFailure::new("slug", NON_EMPTY_STRING_REASON),
                CheckFailure::new("teamSlug", NON_EMPTY_STRING_REASON),
            ]
        );
    }

    #[test]
    fn test_check_drops_output_only_property() {
        let mut news = valid_inputs();
        news.insert(DSN_OUTPUT.into(), json!("https://k@o1.ingest.sentry.io/1"));
        assert!(!check(&news).inputs.contains_key(DSN_OUTPUT));
    }

    #[test]
    fn test_diff_replaces_on_any_input_change() {
        let mut news = valid_inputs();
        news.insert("subjectPrefix".into(), json!("[p1]"));
        news.insert("teamSlug".into(), json!("team2"));
        let result = diff(&valid_inputs(), &news);
        assert_eq!(result.diffs, vec!["subjectPrefix", "teamSlug"]);
        assert!(result.requires_replace());

        assert!(!diff(&valid_inputs(), &valid_inputs()).has_changes());
    }

    #[test]
    fn test_diff_keeping_slug_deletes_first() {
        let mut news = valid_inputs();
        news.insert("name".into(), json!("p1-renamed"));
        let result = diff(&valid_inputs(), &news);
        assert_eq!(result.replaces, vec!["name"]);
        assert!(result.delete_before_replace);

        news.insert("slug".into(), json!("p1-moved"));
        assert!(!diff(&valid_inputs(), &news).delete_before_replace);
    }

    #[test]
    fn test_diff_ignores_output_only_keys() {
        let mut olds = valid_inputs();
        olds.insert(DSN_OUTPUT.into(), json!("x"));
        assert!(!diff(&olds, &valid_inputs()).has_changes());
    }

    #[tokio::test]
    async fn test_create_applies_settings_and_reads_dsn() {
        let api = FakeSentry::new();
        let mut inputs = valid_inputs();
        inputs.insert("subjectPrefix".into(), json!("[p1]"));

        let created = create(&api, &urn(), &inputs).await.unwrap();
        assert_eq!(created.id, "org1/p1-slug");
        assert_eq!(created.outputs["name"], json!("p1"));
        assert_eq!(created.outputs["teamSlug"], json!("team1"));
        assert_eq!(created.outputs["subjectPrefix"], json!("[p1]"));
        assert_eq!(
            created.outputs[DSN_OUTPUT],
            json!("https://public-p1-slug-default@o1.ingest.sentry.io/1")
        );
        assert_eq!(
            api.calls(),
            vec![
                "create_project org1/p1-slug",
                "update_project org1/p1-slug",
                "list_client_keys org1/p1-slug",
            ]
        );
    }

    #[tokio::test]
    async fn test_create_skips_update_without_settings() {
        let api = FakeSentry::new();
        create(&api, &urn(), &valid_inputs()).await.unwrap();
        assert!(!api.calls().iter().any(|c| c.starts_with("update_project")));
    }

    #[tokio::test]
    async fn test_create_uses_normalized_slug() {
        let api = FakeSentry {
            normalize_slug: Some(str::to_lowercase),
            ..Default::default()
        };
        let mut inputs = valid_inputs();
        inputs.insert("slug".into(), json!("P1-Slug"));
        let created = create(&api, &urn(), &inputs).await.unwrap();
        assert_eq!(created.id, "org1/p1-slug");
        assert_eq!(created.outputs["slug"], json!("p1-slug"));
    }

    #[tokio::test]
    async fn test_read_existing_and_missing() {
        let api = FakeSentry::new();
        create(&api, &urn(), &valid_inputs()).await.unwrap();

        let read_back = read(&api, &urn(), "org1/p1-slug").await.unwrap().unwrap();
        assert_eq!(read_back.id, "org1/p1-slug");
        assert_eq!(read_back.outputs["organizationSlug"], json!("org1"));
        assert_eq!(read_back.outputs["teamSlug"], json!("team1"));

        assert_eq!(read(&api, &urn(), "org1/nope").await.unwrap(), None);
        assert_eq!(
            read(&api, &urn(), "garbage").await.unwrap_err(),
            EngineError::InvalidId("garbage".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_project() {
        let api = FakeSentry::new();
        create(&api, &urn(), &valid_inputs()).await.unwrap();
        delete(&api, &urn(), "org1/p1-slug").await.unwrap();
        delete(&api, &urn(), "org1/p1-slug").await.unwrap();
        assert_eq!(read(&api, &urn(), "org1/p1-slug").await.unwrap(), None);
    }
}
