//! Sentry client key (DSN) handle

use super::require;
use crate::context::Context;
use crate::deferred::{Deferred, Input};
use crate::error::ResourceResult;
use crate::provider::keys::TYPE_TOKEN;
use crate::resource::{
    CustomResource, RegisteredResource, ResourceOptions, ResourceRegistration, TypeToken,
};

/// Arguments of a [`ClientKey`].
#[derive(Debug, Clone, Default)]
pub struct ClientKeyArgs {
    pub name: Option<Input<String>>,
    pub organization_slug: Option<Input<String>>,
    pub project_slug: Option<Input<String>>,
}

impl ClientKeyArgs {
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

    pub fn project_slug(mut self, slug: impl Into<Input<String>>) -> Self {
        self.project_slug = Some(slug.into());
        self
    }
}

/// A client key of a Sentry project.
#[derive(Debug, Clone)]
pub struct ClientKey {
    resource: RegisteredResource,
}

impl ClientKey {
    pub fn new(
        ctx: &Context,
        name: &str,
        args: ClientKeyArgs,
        options: ResourceOptions,
    ) -> ResourceResult<Self> {
        let token = TypeToken::parse(TYPE_TOKEN)?;
        if options.id.is_none() {
            require("name", &args.name)?;
            require("organizationSlug", &args.organization_slug)?;
            require("projectSlug", &args.project_slug)?;
        }

        let registration = ResourceRegistration::new(token, name, options)
            .string_input("name", args.name)
            .string_input("organizationSlug", args.organization_slug)
            .string_input("projectSlug", args.project_slug);
        Ok(Self {
            resource: ctx.register(registration),
        })
    }

    /// Attach to an existing key by id (`<organizationSlug>/<projectSlug>/<keyId>`).
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

    pub fn project_slug(&self) -> Deferred<String> {
        self.resource.string_output("projectSlug")
    }

    pub fn public(&self) -> Deferred<String> {
        self.resource.string_output("public")
    }

    pub fn secret(&self) -> Deferred<String> {
        self.resource.string_output("secret")
    }

    pub fn dsn_public(&self) -> Deferred<String> {
        self.resource.string_output("dsnPublic")
    }

    pub fn dsn_secret(&self) -> Deferred<String> {
        self.resource.string_output("dsnSecret")
    }

    pub fn dsn_csp(&self) -> Deferred<String> {
        self.resource.string_output("dsnCSP")
    }

    /// RFC 3339 creation time.
    pub fn date_created(&self) -> Deferred<Option<String>> {
        self.resource.optional_string_output("dateCreated")
    }
}

impl CustomResource for ClientKey {
    const TYPE_TOKEN: &'static str = TYPE_TOKEN;

    fn registered(&self) -> &RegisteredResource {
        &self.resource
    }
}
