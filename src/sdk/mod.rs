//! Typed resource handles
//!
//! - [`Project`] - `sentry:index:Project`
//! - [`ClientKey`] - `sentry:index:ClientKey`
//!
//! Each handle has two constructors. `new` declares desired state and checks
//! the required arguments before anything is submitted; `get` attaches to an
//! existing object by id and checks nothing.

pub mod client_key;
pub mod project;

pub use client_key::{ClientKey, ClientKeyArgs};
pub use project::{Project, ProjectArgs};

use crate::deferred::Input;
use crate::error::{ResourceError, ResourceResult};

/// Fail with the wire name of a required argument that was left out.
pub(crate) fn require(field: &'static str, value: &Option<Input<String>>) -> ResourceResult<()> {
    match value {
        Some(_) => Ok(()),
        None => Err(ResourceError::MissingRequiredProperty(field)),
    }
}
