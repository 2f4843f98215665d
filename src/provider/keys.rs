//! `sentry:index:ClientKey`
//!
//! Ids are `<organizationSlug>/<projectSlug>/<keyId>`.

use super::{
    check_inputs, provider_error, replace_on_any_change, CheckResult, DiffResult, ProviderResource,
};
use crate::error::{EngineError, EngineResult};
use crate::property::{require_str, PropertyMap};
use crate::resource::Urn;
use crate::sentry::keys::SentryClientKey;
use crate::sentry::{is_not_found, SentryApi};
use serde_json::Value;

pub const TYPE_TOKEN: &str = "sentry:index:ClientKey";

pub const REQUIRED_INPUTS: [&str; 3] = ["name", "organizationSlug", "projectSlug"];

pub fn build_id(organization: &str, project: &str, key_id: &str) -> String {
    format!("{}/{}/{}", organization, project, key_id)
}

pub fn parse_id(id: &str) -> EngineResult<(String, String, String)> {
    match id.split('/').collect::<Vec<_>>().as_slice() {
        [org, project, key] if !org.is_empty() && !project.is_empty() && !key.is_empty() => {
            Ok((org.to_string(), project.to_string(), key.to_string()))
        }
        _ => Err(EngineError::InvalidId(id.to_string())),
    }
}

pub fn check(news: &PropertyMap) -> CheckResult {
    check_inputs(news, &REQUIRED_INPUTS, &[])
}

pub fn diff(olds: &PropertyMap, news: &PropertyMap) -> DiffResult {
    replace_on_any_change(olds, news, &REQUIRED_INPUTS)
}

fn outputs_from(key: &SentryClientKey, organization: &str, project: &str) -> PropertyMap {
    let mut outputs = PropertyMap::new();
    let mut put = |k: &str, v: &str| {
        outputs.insert(k.to_string(), Value::String(v.to_string()));
    };
    put("name", key.display_name());
    put("organizationSlug", organization);
    put("projectSlug", project);
    put("public", &key.public);
    put("secret", &key.secret);
    put("dsnPublic", &key.dsn.public);
    put("dsnSecret", &key.dsn.secret);
    put("dsnCSP", &key.dsn.csp);
    if let Some(created) = key.date_created_rfc3339() {
        put("dateCreated", &created);
    }
    outputs
}

pub async fn create(
    api: &dyn SentryApi,
    urn: &Urn,
    inputs: &PropertyMap,
) -> EngineResult<ProviderResource> {
    let organization = require_str(inputs, "organizationSlug").map_err(provider_error(urn))?;
    let project = require_str(inputs, "projectSlug").map_err(provider_error(urn))?;
    let name = require_str(inputs, "name").map_err(provider_error(urn))?;

    let key = api
        .create_client_key(&organization, &project, &name)
        .await
        .map_err(provider_error(urn))?;
    Ok(ProviderResource {
        id: build_id(&organization, &project, &key.id),
        outputs: outputs_from(&key, &organization, &project),
    })
}

pub async fn read(
    api: &dyn SentryApi,
    urn: &Urn,
    id: &str,
) -> EngineResult<Option<ProviderResource>> {
    let (organization, project, key_id) = parse_id(id)?;
    let keys = match api.list_client_keys(&organization, &project).await {
        Ok(keys) => keys,
        Err(e) if is_not_found(&e) => return Ok(None),
        Err(e) => return Err(provider_error(urn)(e)),
    };

    Ok(keys.iter().find(|k| k.id == key_id).map(|key| ProviderResource {
        id: id.to_string(),
        outputs: outputs_from(key, &organization, &project),
    }))
}

pub async fn delete(api: &dyn SentryApi, urn: &Urn, id: &str) -> EngineResult<()> {
    let (organization, project, key_id) = parse_id(id)?;
    match api.delete_client_key(&organization, &project, &key_id).await {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => Ok(()),
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

    fn urn() -> Urn {
        Urn::new("dev", "test", None, &TypeToken::parse(TYPE_TOKEN).unwrap(), "key")
    }

    fn inputs() -> PropertyMap {
        json!({"name": "ci", "organizationSlug": "org1", "projectSlug": "p1"})
            .as_object()
            .cloned()
            .unwrap()
    }

    async fn api_with_project() -> FakeSentry {
        let api = FakeSentry::new();
        api.create_project("org1", "team1", "p1", "p1").await.unwrap();
        api
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(
            parse_id("org1/p1/abc").unwrap(),
            ("org1".to_string(), "p1".to_string(), "abc".to_string())
        );
        assert!(matches!(parse_id("org1/p1"), Err(EngineError::InvalidId(_))));
        assert!(matches!(parse_id("org1//abc"), Err(EngineError::InvalidId(_))));
    }

    #[test]
    fn test_check_requires_project_slug() {
        let mut news = inputs();
        news.remove("projectSlug");
        assert_eq!(
            check(&news).failures,
            vec![CheckFailure::new("projectSlug", NON_EMPTY_STRING_REASON)]
        );
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let api = api_with_project().await;
        let created = create(&api, &urn(), &inputs()).await.unwrap();
        assert_eq!(created.id, "org1/p1/k2");
        assert_eq!(created.outputs["name"], json!("ci"));
        assert_eq!(created.outputs["dateCreated"], json!("2021-03-04T05:06:07Z"));

        let read_back = read(&api, &urn(), &created.id).await.unwrap().unwrap();
        assert_eq!(read_back, created);
    }

    #[tokio::test]
    async fn test_read_missing_key_or_project() {
        let api = api_with_project().await;
        assert_eq!(read(&api, &urn(), "org1/p1/nope").await.unwrap(), None);
        assert_eq!(read(&api, &urn(), "org1/gone/k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_on_missing_project_is_provider_error() {
        let api = FakeSentry::new();
        let err = create(&api, &urn(), &inputs()).await.unwrap_err();
        assert!(matches!(err, EngineError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let api = api_with_project().await;
        let created = create(&api, &urn(), &inputs()).await.unwrap();
        delete(&api, &urn(), &created.id).await.unwrap();
        assert_eq!(read(&api, &urn(), &created.id).await.unwrap(), None);
    }
}
