//! kbforge access scoping
//!
//! Derives the least-privilege grants of access roles from the resource
//! graph. Grants are computed, never declared: a role only receives the
//! actions its dependents need on the resources they touch.

pub mod document;
pub mod grant;
pub mod scoper;

pub use document::{PolicyDocument, PolicyStatement};
pub use grant::{GrantAction, GrantSet, PermissionGrant};
pub use scoper::{PolicyScoper, ScopedPolicy};
