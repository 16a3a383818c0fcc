//! Applies provisioning plans through a [`ProvisioningBackend`].
//!
//! The planner produces dry-run identifiers; here each resource is handed to
//! a backend in plan order and the identifiers it returns are threaded into
//! the resources created after it.

pub mod audit;
pub mod backend;
pub mod provisioner;

pub use audit::{
    AuditSink, ProvisioningEvent, ProvisioningEventType, StdoutAuditSink, TracingAuditSink,
};
pub use backend::{DryRunBackend, ProvisioningBackend};
pub use provisioner::Provisioner;
