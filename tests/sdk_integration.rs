//! End-to-end tests of the resource handles
//!
//! Declarations and lookups go through a [`Context`] to the mock engine, or
//! to the local engine backed by a wiremock Sentry API.

use sentry_iac::config::ProviderConfig;
use sentry_iac::engine::{LocalEngine, MockEngine};
use sentry_iac::provider::SentryProvider;
use sentry_iac::sentry::SentryClient;
use sentry_iac::{
    ClientKey, ClientKeyArgs, Context, ContextConfig, CustomResource, Deferred, DeferredState,
    EngineError, Project, ProjectArgs, ResourceError, ResourceOptions,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_context(engine: &MockEngine) -> Context {
    Context::new(Arc::new(engine.clone()), ContextConfig::new("dev", "sdk")).expect("runtime")
}

fn full_args() -> ProjectArgs {
    ProjectArgs::new()
        .name("p1")
        .organization_slug("org1")
        .slug("p1-slug")
        .team_slug("team1")
}

/// Test module for the declare and lookup scenarios
mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_declare_registers_project() {
        let engine = MockEngine::new();
        let ctx = mock_context(&engine);

        let project = Project::new(&ctx, "proj1", full_args(), ResourceOptions::new()).unwrap();
        ctx.drain().await;

        let registrations = engine.registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].type_token, "sentry:index:Project");
        assert_eq!(registrations[0].name, "proj1");
        assert_eq!(registrations[0].options.version.as_deref(), Some(sentry_iac::VERSION));
        assert_eq!(project.name().value().await.unwrap(), "p1");
        assert_eq!(project.id().value().await.unwrap(), "proj1-id");
        assert_eq!(project.urn().as_str(), "urn:iac:dev::sdk::sentry:index:Project::proj1");
    }

    #[tokio::test]
    async fn test_declare_without_slug_fails() {
        let engine = MockEngine::new();
        let ctx = mock_context(&engine);

        let args = ProjectArgs::new().name("p2").organization_slug("org1").team_slug("team1");
        let err = Project::new(&ctx, "proj2", args, ResourceOptions::new()).unwrap_err();
        ctx.drain().await;

        assert_eq!(err, ResourceError::MissingRequiredProperty("slug"));
        assert_eq!(err.to_string(), "missing required property 'slug'");
        assert_eq!(engine.request_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_reads_existing_project() {
        let existing = json!({
            "name": "p3",
            "organizationSlug": "org1",
            "slug": "p3-slug",
            "teamSlug": "team1"
        });
        let engine =
            MockEngine::new().with_existing("org1/p3-slug", existing.as_object().cloned().unwrap());
        let ctx = mock_context(&engine);

        let project = Project::get(&ctx, "proj3", "org1/p3-slug", ResourceOptions::new()).unwrap();
        ctx.drain().await;

        assert_eq!(engine.registrations().len(), 0);
        assert_eq!(engine.reads()[0].id, "org1/p3-slug");
        assert_eq!(project.slug().value().await.unwrap().as_deref(), Some("p3-slug"));
        assert_eq!(project.subject_prefix().value().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_declare_with_id_option_reads() {
        let engine = MockEngine::new().with_existing(
            "org1/p4",
            json!({"name": "p4", "organizationSlug": "org1", "slug": "p4", "teamSlug": "t"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let ctx = mock_context(&engine);

        let options = ResourceOptions::new().with_id("org1/p4");
        let project = Project::new(&ctx, "proj4", ProjectArgs::new(), options).unwrap();
        ctx.drain().await;

        assert_eq!(engine.registrations().len(), 0);
        assert_eq!(engine.reads().len(), 1);
        assert_eq!(project.name().value().await.unwrap(), "p4");
    }

    #[tokio::test]
    async fn test_lookup_of_unknown_id_fails_outputs() {
        let engine = MockEngine::new();
        let ctx = mock_context(&engine);

        let project = Project::get(&ctx, "ghost", "org1/ghost", ResourceOptions::new()).unwrap();
        ctx.drain().await;

        let expected = EngineError::NotFound {
            type_token: "sentry:index:Project".to_string(),
            id: "org1/ghost".to_string(),
        };
        assert_eq!(project.id().value().await, Err(expected.clone()));
        assert_eq!(project.team_slug().value().await, Err(expected));
    }
}

/// Test module for values flowing between resources
mod dependency_tests {
    use super::*;

    #[tokio::test]
    async fn test_key_waits_for_project() {
        let engine = MockEngine::held();
        let ctx = mock_context(&engine);

        let project = Project::new(&ctx, "proj1", full_args(), ResourceOptions::new()).unwrap();
        let key = ClientKey::new(
            &ctx,
            "proj1-key",
            ClientKeyArgs::new()
                .name("ci")
                .organization_slug(project.organization_slug())
                .project_slug(project.slug().map(|s| s.unwrap_or_default())),
            ResourceOptions::new().with_dependency(project.registered().dependency()),
        )
        .unwrap();

        while engine.request_count() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.registrations().len(), 1);
        assert_eq!(key.dsn_public().state(), DeferredState::Pending);

        engine.release_all();
        ctx.drain().await;

        assert_eq!(engine.registrations().len(), 2);
        assert_eq!(key.project_slug().value().await.unwrap(), "p1-slug");
    }

    #[tokio::test]
    async fn test_project_failure_reaches_key() {
        let err = EngineError::Provider {
            urn: "proj1".to_string(),
            message: "409 Conflict".to_string(),
        };
        let engine = MockEngine::new().fail("proj1", err.clone());
        let ctx = mock_context(&engine);

        let project = Project::new(&ctx, "proj1", full_args(), ResourceOptions::new()).unwrap();
        let key = ClientKey::new(
            &ctx,
            "proj1-key",
            ClientKeyArgs::new()
                .name("ci")
                .organization_slug("org1")
                .project_slug(project.slug().map(|s| s.unwrap_or_default())),
            ResourceOptions::new(),
        )
        .unwrap();
        ctx.drain().await;

        assert_eq!(project.name().value().await, Err(err.clone()));
        assert_eq!(key.id().value().await, Err(err));
        assert!(engine.registrations().iter().all(|r| r.name != "proj1-key"));
    }

    #[tokio::test]
    async fn test_combinators_carry_failure() {
        let (root, resolver) = Deferred::<String>::channel();
        let upper = root.map(|s| s.to_uppercase());
        let chained = upper.and_then(|s| Deferred::resolved(s.len()));
        let both = chained.zip(&Deferred::resolved(1usize));

        assert!(both.is_pending());
        resolver.fail(EngineError::Abandoned);

        assert_eq!(upper.value().await, Err(EngineError::Abandoned));
        assert_eq!(both.value().await, Err(EngineError::Abandoned));
    }
}

/// Test module for handles backed by the local engine
mod local_engine_tests {
    use super::*;

    fn project_json() -> serde_json::Value {
        json!({
            "id": "4505",
            "name": "p1",
            "slug": "p1-slug",
            "organization": {"slug": "org1"},
            "team": {"slug": "team1"},
            "subjectTemplate": "$shortID - $title"
        })
    }

    async fn mount_project(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/0/teams/org1/team1/projects/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(project_json()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/0/projects/org1/p1-slug/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_json()))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/0/projects/org1/p1-slug/keys/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    fn context_for(server: &MockServer) -> Context {
        let config = ProviderConfig::new("t", format!("{}/api/0", server.uri()));
        let client = SentryClient::new(&config).unwrap();
        let provider = SentryProvider::new(Arc::new(client));
        let engine = LocalEngine::new().with_provider(Arc::new(provider));
        Context::new(Arc::new(engine), ContextConfig::new("dev", "sdk")).unwrap()
    }

    /// Lookup exposes the same output properties as a declaration
    #[tokio::test]
    async fn test_lookup_outputs_match_declare() {
        let server = MockServer::start().await;
        mount_project(&server).await;

        let declared_ctx = context_for(&server);
        let declared =
            Project::new(&declared_ctx, "proj1", full_args(), ResourceOptions::new()).unwrap();
        declared_ctx.drain().await;

        let looked_up_ctx = context_for(&server);
        let looked_up =
            Project::get(&looked_up_ctx, "proj3", "org1/p1-slug", ResourceOptions::new()).unwrap();
        looked_up_ctx.drain().await;

        let declared_outputs = declared.registered().outputs.value().await.unwrap();
        let looked_up_outputs = looked_up.registered().outputs.value().await.unwrap();
        let declared_keys: BTreeSet<&String> = declared_outputs.keys().collect();
        let looked_up_keys: BTreeSet<&String> = looked_up_outputs.keys().collect();
        assert_eq!(declared_keys, looked_up_keys);
        assert_eq!(looked_up.slug().value().await.unwrap().as_deref(), Some("p1-slug"));
        assert_eq!(looked_up.id().value().await.unwrap(), declared.id().value().await.unwrap());
    }
}
