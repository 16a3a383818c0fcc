//! kbforge planning
//!
//! Turns a declaration table into an ordered, fully resolved provisioning
//! plan. The pipeline is synchronous and side-effect free:
//!
//! 1. validate declarations (dangling references, exposed attributes)
//! 2. scope every access role ([`kbforge_policy::PolicyScoper`])
//! 3. order and bind references ([`DependencyResolver`])
//! 4. emit operator outputs ([`emit`])

pub mod outputs;
pub mod plan;
pub mod resolver;
pub mod stack;

pub use outputs::{ArtifactUploads, OutputDirective};
pub use plan::{PlanBuilder, ProvisioningPlan, emit};
pub use resolver::{AttributeSource, DependencyResolver, SyntheticAttributes};
pub use stack::knowledge_base_stack;
