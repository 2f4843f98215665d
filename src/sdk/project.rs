//! Sentry project handle

use super::require;
use crate::context::Context;
use crate::deferred::{Deferred, Input};
use crate::error::ResourceResult;
use crate::provider::projects::{DSN_OUTPUT, TYPE_TOKEN};
use crate::resource::{
    CustomResource, RegisteredResource, ResourceOptions, ResourceRegistration, TypeToken,
};

/// Arguments of a [`Project`].
///
/// `defaultClientKeyDSNPublic` is computed by the provider and has no field here.
#[derive(Debug, Clone, Default)]
pub struct ProjectArgs {
    pub name: Option<Input<String>>,
    pub organization_slug: Option<Input<String>>,
    pub slug: Option<Input<String>>,
    pub team_slug: Option<Input<String>>,
    pub default_environment: Option<Input<String>>,
    pub subject_prefix: Option<Input<String>>,
    pub subject_template: Option<Input<String>>,
}

impl ProjectArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<Input<String>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn organization_slug(mut self, slug: impl Into<Input<String>>) -> Self {
        self.organization_slug = Some(slug.into());
        self
    }

    pub fn slug(mut self, slug: impl Into<Input<String>>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn team_slug(mut self, slug: impl Into<Input<String>>) -> Self {
        self.team_slug = Some(slug.into());
        self
    }

    pub fn default_environment(mut self, environment: impl Into<Input<String>>) -> Self {
        self.default_environment = Some(environment.into());
        self
    }

    pub fn subject_prefix(mut self, prefix: impl Into<Input<String>>) -> Self {
        self.subject_prefix = Some(prefix.into());
        self
    }

    pub fn subject_template(mut self, template: impl Into<Input<String>>) -> Self {
        self.subject_template = Some(template.into());
        self
    }

    /// First missing required argument, in declaration order.
    fn validate(&self) -> ResourceResult<()> {
        require("name", &self.name)?;
        require("organizationSlug", &self.organization_slug)?;
        require("slug", &self.slug)?;
        require("teamSlug", &self.team_slug)
    }
}

/// A Sentry project.
#[derive(Debug, Clone)]
pub struct Project {
    resource: RegisteredResource,
}

impl Project {
    /// Declare a project.
    ///
    /// Fails before anything is submitted when a required argument is
    /// missing, unless `options.id` is set, in which case the existing
    /// project is read and `args` are not used.
    pub fn new(
        ctx: &Context,
        name: &str,
        args: ProjectArgs,
        options: ResourceOptions,
    ) -> ResourceResult<Self> {
        let token = TypeToken::parse(TYPE_TOKEN)?;
        if options.id.is_none() {
            args.validate()?;
        }

        let registration = ResourceRegistration::new(token, name, options)
            .string_input("name", args.name)
            .string_input("organizationSlug", args.organization_slug)
            .string_input("slug", args.slug)
            .string_input("teamSlug", args.team_slug)
            .string_input("defaultEnvironment", args.default_environment)
            .string_input("subjectPrefix", args.subject_prefix)
            .string_input("subjectTemplate", args.subject_template);
        Ok(Self {
            resource: ctx.register(registration),
        })
    }

    /// Attach to an existing project by id (`<organizationSlug>/<slug>`).
    pub fn get(
        ctx: &Context,
        name: &str,
        id: impl Into<Input<String>>,
        options: ResourceOptions,
    ) -> ResourceResult<Self> {
        let token = TypeToken::parse(TYPE_TOKEN)?;
        Ok(Self {
            resource: ctx.read(token, name, id, options),
        })
    }

    pub fn name(&self) -> Deferred<String> {
        self.resource.string_output("name")
    }

    pub fn organization_slug(&self) -> Deferred<String> {
        self.resource.string_output("organizationSlug")
    }

    /// The provider may normalize the slug, and may not report one.
    pub fn slug(&self) -> Deferred<Option<String>> {
        self.resource.optional_string_output("slug")
    }

    pub fn team_slug(&self) -> Deferred<String> {
        self.resource.string_output("teamSlug")
    }

    pub fn default_environment(&self) -> Deferred<Option<String>> {
        self.resource.optional_string_output("defaultEnvironment")
    }

    pub fn subject_prefix(&self) -> Deferred<Option<String>> {
        self.resource.optional_string_output("subjectPrefix")
    }

    pub fn subject_template(&self) -> Deferred<Option<String>> {
        self.resource.optional_string_output("subjectTemplate")
    }

    /// Public DSN of the project's first client key.
    pub fn default_client_key_dsn_public(&self) -> Deferred<Option<String>> {
        self.resource.optional_string_output(DSN_OUTPUT)
    }
}

impl CustomResource for Project {
    const TYPE_TOKEN: &'static str = TYPE_TOKEN;

    fn registered(&self) -> &RegisteredResource {
        &self.resource
    }
}
