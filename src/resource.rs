//! Resource registration
//!
//! The generic pieces every typed handle is composed of: the type token that
//! routes a resource to its provider, the address ([`Urn`]) it occupies in the
//! engine's graph, the options bag, and the registration record itself.

use crate::deferred::{Deferred, Input};
use crate::error::{ResourceError, ResourceResult};
use crate::property::{self, PropertyMap};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifies a resource kind to the provider dispatch: `<package>:<module>:<type>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeToken {
    package: String,
    module: String,
    name: String,
}

impl TypeToken {
    pub fn new(package: &str, module: &str, name: &str) -> ResourceResult<Self> {
        Self::parse(&format!("{}:{}:{}", package, module, name))
    }

    pub fn parse(token: &str) -> ResourceResult<Self> {
        let parts: Vec<&str> = token.split(':').collect();
        match parts.as_slice() {
            [package, module, name]
                if !package.is_empty() && !module.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    package: package.to_string(),
                    module: module.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ResourceError::InvalidTypeToken(token.to_string())),
        }
    }

    /// Provider package, e.g. `sentry`
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Resource kind within the module, e.g. `Project`
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package, self.module, self.name)
    }
}

impl FromStr for TypeToken {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Address of a resource in the engine's graph.
///
/// `urn:iac:<stack>::<project>::<qualified type>::<name>`, where the qualified
/// type is prefixed with the parent's qualified type (`parent$child`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urn(String);

const URN_PREFIX: &str = "urn:iac:";

impl Urn {
    pub fn new(
        stack: &str,
        project: &str,
        parent: Option<&Urn>,
        type_token: &TypeToken,
        name: &str,
    ) -> Self {
        let qualified = match parent.and_then(|p| p.qualified_type()) {
            Some(parent_type) => format!("{}${}", parent_type, type_token),
            None => type_token.to_string(),
        };
        Self(format!(
            "{}{}::{}::{}::{}",
            URN_PREFIX, stack, project, qualified, name
        ))
    }

    /// Accept a previously rendered URN (e.g. from a state file).
    pub fn parse(urn: &str) -> Option<Self> {
        let rest = urn.strip_prefix(URN_PREFIX)?;
        if rest.split("::").count() < 4 {
            return None;
        }
        Some(Self(urn.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The qualified type segment, including parent types.
    pub fn qualified_type(&self) -> Option<&str> {
        let parts: Vec<&str> = self.0.split("::").collect();
        parts.get(2).copied()
    }

    /// The resource's own type token (last `$` segment of the qualified type).
    pub fn type_token(&self) -> Option<&str> {
        self.qualified_type()
            .and_then(|q| q.rsplit('$').next())
    }

    /// The logical name.
    pub fn name(&self) -> &str {
        self.0.splitn(4, "::").nth(3).unwrap_or("")
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something a registration must wait for.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub urn: Urn,
    pub ready: Deferred<String>,
}

/// Options bag that controls how the engine treats a resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Attach to an existing object instead of declaring new state.
    pub id: Option<Input<String>>,
    /// Provider plugin version; filled from the context when unset.
    pub version: Option<String>,
    pub parent: Option<Urn>,
    pub depends_on: Vec<Dependency>,
    pub aliases: Vec<String>,
    /// Refuse deletion.
    pub protect: bool,
    pub delete_before_replace: bool,
    /// Drop from state without deleting the remote object.
    pub retain_on_delete: bool,
    pub ignore_changes: Vec<String>,
    pub replace_on_changes: Vec<String>,
    /// Package whose provider serves this resource, when not the token's own.
    pub provider: Option<String>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<Input<String>>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_parent(mut self, parent: &Urn) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.depends_on.push(dependency);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn protected(mut self) -> Self {
        self.protect = true;
        self
    }

    pub fn delete_before_replace(mut self) -> Self {
        self.delete_before_replace = true;
        self
    }

    pub fn retain_on_delete(mut self) -> Self {
        self.retain_on_delete = true;
        self
    }

    pub fn ignore_change(mut self, property: impl Into<String>) -> Self {
        self.ignore_changes.push(property.into());
        self
    }

    pub fn replace_on_change(mut self, property: impl Into<String>) -> Self {
        self.replace_on_changes.push(property.into());
        self
    }

    pub fn with_provider(mut self, package: impl Into<String>) -> Self {
        self.provider = Some(package.into());
        self
    }
}

/// A desired-state record ready to hand to the [`Context`](crate::Context).
#[derive(Debug, Clone)]
pub struct ResourceRegistration {
    pub type_token: TypeToken,
    pub name: String,
    pub inputs: BTreeMap<String, Input<Value>>,
    pub options: ResourceOptions,
}

impl ResourceRegistration {
    pub fn new(type_token: TypeToken, name: impl Into<String>, options: ResourceOptions) -> Self {
        Self {
            type_token,
            name: name.into(),
            inputs: BTreeMap::new(),
            options,
        }
    }

    /// Add a string input. Absent optional inputs are simply not added.
    pub fn string_input(mut self, key: &str, value: Option<Input<String>>) -> Self {
        if let Some(value) = value {
            self.inputs.insert(key.to_string(), value.map(Value::String));
        }
        self
    }

    pub fn input(mut self, key: &str, value: Input<Value>) -> Self {
        self.inputs.insert(key.to_string(), value);
        self
    }
}

/// What the context hands back for a registration: the address right away,
/// everything else once the engine answers.
#[derive(Debug, Clone)]
pub struct RegisteredResource {
    pub type_token: TypeToken,
    pub urn: Urn,
    pub id: Deferred<String>,
    pub outputs: Deferred<PropertyMap>,
}

impl RegisteredResource {
    /// A required string output.
    pub fn string_output(&self, key: &'static str) -> Deferred<String> {
        self.outputs
            .try_map(move |outputs| property::string_output(&outputs, key))
    }

    /// An optional string output.
    pub fn optional_string_output(&self, key: &'static str) -> Deferred<Option<String>> {
        self.outputs
            .map(move |outputs| property::optional_string_output(&outputs, key))
    }

    pub fn dependency(&self) -> Dependency {
        Dependency {
            urn: self.urn.clone(),
            ready: self.id.clone(),
        }
    }
}

/// Implemented by typed handles built on top of a [`RegisteredResource`].
pub trait CustomResource {
    const TYPE_TOKEN: &'static str;

    fn registered(&self) -> &RegisteredResource;

    fn urn(&self) -> &Urn {
        &self.registered().urn
    }

    fn id(&self) -> &Deferred<String> {
        &self.registered().id
    }

    fn dependency(&self) -> Dependency {
        self.registered().dependency()
    }

    /// True when a registration belongs to this resource kind.
    fn is_instance(resource: &RegisteredResource) -> bool {
        resource.type_token.to_string() == Self::TYPE_TOKEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_token_round_trip() {
        let token = TypeToken::parse("sentry:index:Project").unwrap();
        assert_eq!(token.package(), "sentry");
        assert_eq!(token.module(), "index");
        assert_eq!(token.name(), "Project");
        assert_eq!(token.to_string(), "sentry:index:Project");
    }

    #[test]
    fn test_type_token_rejects_malformed() {
        for bad in ["", "sentry", "sentry:index", "sentry::Project", "a:b:c:d"] {
            assert_eq!(
                TypeToken::parse(bad),
                Err(ResourceError::InvalidTypeToken(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_urn_format_and_accessors() {
        let token = TypeToken::parse("sentry:index:Project").unwrap();
        let urn = Urn::new("dev", "infra", None, &token, "backend");
        assert_eq!(
            urn.as_str(),
            "urn:iac:dev::infra::sentry:index:Project::backend"
        );
        assert_eq!(urn.name(), "backend");
        assert_eq!(urn.type_token(), Some("sentry:index:Project"));
    }

    #[test]
    fn test_urn_qualifies_parent_type() {
        let project = TypeToken::parse("sentry:index:Project").unwrap();
        let key = TypeToken::parse("sentry:index:ClientKey").unwrap();
        let parent = Urn::new("dev", "infra", None, &project, "backend");
        let child = Urn::new("dev", "infra", Some(&parent), &key, "default");
        assert_eq!(
            child.qualified_type(),
            Some("sentry:index:Project$sentry:index:ClientKey")
        );
        assert_eq!(child.type_token(), Some("sentry:index:ClientKey"));
        assert_eq!(child.name(), "default");
    }

    #[test]
    fn test_urn_name_may_contain_separators() {
        let token = TypeToken::parse("sentry:index:Project").unwrap();
        let urn = Urn::new("dev", "infra", None, &token, "a::b");
        assert_eq!(urn.name(), "a::b");
        assert_eq!(Urn::parse(urn.as_str()), Some(urn.clone()));
        assert_eq!(Urn::parse("not-an-urn"), None);
    }

    #[test]
    fn test_registration_skips_absent_inputs() {
        let token = TypeToken::parse("sentry:index:Project").unwrap();
        let reg = ResourceRegistration::new(token, "p", ResourceOptions::new())
            .string_input("name", Some("p1".into()))
            .string_input("subjectPrefix", None);
        assert_eq!(reg.inputs.len(), 1);
        assert!(reg.inputs.contains_key("name"));
    }
}
