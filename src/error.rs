//! Error types
//!
//! Two families: [`ResourceError`] is raised synchronously while a handle is
//! being constructed, [`EngineError`] travels through deferred values once the
//! registration has left the caller's hands.

use thiserror::Error;

/// Result type alias for handle construction.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Result type alias for engine and provider operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Local, synchronous failures. Nothing has been sent to the engine when one
/// of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("missing required property '{0}'")]
    MissingRequiredProperty(&'static str),

    #[error("invalid type token '{0}', expected <package>:<module>:<type>")]
    InvalidTypeToken(String),

    #[error("no tokio runtime available to drive resource registrations")]
    NoRuntime,
}

/// A single property rejected by a provider's check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CheckFailure {
    pub property: String,
    pub reason: String,
}

impl CheckFailure {
    pub fn new(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.property, self.reason)
    }
}

/// Asynchronous failures, delivered to every consumer of the affected
/// deferred values. Cloneable so one failure can fan out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("check failed for {urn}: {}", format_failures(.failures))]
    CheckFailed {
        urn: String,
        failures: Vec<CheckFailure>,
    },

    #[error("provider error for {urn}: {message}")]
    Provider { urn: String, message: String },

    #[error("{type_token} with id '{id}' not found")]
    NotFound { type_token: String, id: String },

    #[error("invalid resource id '{0}'")]
    InvalidId(String),

    #[error("unknown resource type '{0}'")]
    UnknownType(String),

    #[error("no provider registered for package '{0}'")]
    NoProvider(String),

    #[error("provider response is missing required output '{property}'")]
    MissingOutput { property: String },

    #[error("in-place update is not supported for {0}")]
    UnsupportedUpdate(String),

    #[error("resource {0} is protected and cannot be deleted")]
    Protected(String),

    #[error("no resource recorded under {0}")]
    UnknownUrn(String),

    #[error("resource {urn} is still referenced by {}", .dependents.join(", "))]
    HasDependents { urn: String, dependents: Vec<String> },

    #[error("registration was abandoned before it completed")]
    Abandoned,
}

impl EngineError {
    /// Wrap a provider-side failure, keeping the whole context chain.
    pub fn provider(urn: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::Provider {
            urn: urn.into(),
            message: format!("{:#}", error),
        }
    }
}

fn format_failures(failures: &[CheckFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_property_message() {
        let err = ResourceError::MissingRequiredProperty("slug");
        assert_eq!(err.to_string(), "missing required property 'slug'");
    }

    #[test]
    fn test_check_failed_lists_every_property() {
        let err = EngineError::CheckFailed {
            urn: "urn:iac:dev::demo::sentry:index:Project::p".to_string(),
            failures: vec![
                CheckFailure::new("name", "this input must be a non-empty string"),
                CheckFailure::new("slug", "this input must be a non-empty string"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("name: this input must be a non-empty string"));
        assert!(msg.contains("; slug:"));
    }

    #[test]
    fn test_provider_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("API request failed: 409 Conflict")
            .context("could not create project");
        let err = EngineError::provider("urn:x", &inner);
        assert_eq!(
            err.to_string(),
            "provider error for urn:x: could not create project: API request failed: 409 Conflict"
        );
    }
}
