//! Plan error taxonomy.
//!
//! Every error raised while declaring, scoping or resolving a plan aborts the
//! whole plan. None of them are transient: the declaration has to be fixed.

/// Errors raised while building a provisioning plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Unknown kind or malformed descriptor config.
    #[error("schema error in '{descriptor}': {message}")]
    Schema { descriptor: String, message: String },

    /// A descriptor id was declared twice.
    #[error("descriptor id '{id}' is already declared")]
    Conflict { id: String },

    /// The reference graph contains a cycle. Members are listed in cycle order.
    #[error("cyclic dependency: {}", format_cycle(.members))]
    CyclicDependency { members: Vec<String> },

    /// A reference names a descriptor that is not declared in the plan.
    #[error("'{referrer}' references undeclared descriptor '{target}'")]
    UnresolvedReference { referrer: String, target: String },

    /// A required parameter or reference target is empty or unknown.
    #[error("'{descriptor}' has no value for required field '{field}'")]
    IncompleteConfiguration { descriptor: String, field: String },
}

impl PlanError {
    pub fn schema(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    pub fn incomplete(descriptor: impl Into<String>, field: impl Into<String>) -> Self {
        Self::IncompleteConfiguration {
            descriptor: descriptor.into(),
            field: field.into(),
        }
    }

    pub fn unresolved(referrer: impl Into<String>, target: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            referrer: referrer.into(),
            target: target.into(),
        }
    }

    /// Stable category name, used in check findings and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::Schema { .. } => "schema",
            PlanError::Conflict { .. } => "conflict",
            PlanError::CyclicDependency { .. } => "cyclic_dependency",
            PlanError::UnresolvedReference { .. } => "unresolved_reference",
            PlanError::IncompleteConfiguration { .. } => "incomplete_configuration",
        }
    }

    /// Plan errors are structural, so retrying never helps.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Descriptor ids the operator has to look at to fix the declaration.
    pub fn offending_ids(&self) -> Vec<&str> {
        match self {
            PlanError::Schema { descriptor, .. } => vec![descriptor.as_str()],
            PlanError::Conflict { id } => vec![id.as_str()],
            PlanError::CyclicDependency { members } => {
                members.iter().map(String::as_str).collect()
            }
            PlanError::UnresolvedReference { referrer, target } => {
                vec![referrer.as_str(), target.as_str()]
            }
            PlanError::IncompleteConfiguration { descriptor, .. } => vec![descriptor.as_str()],
        }
    }
}

fn format_cycle(members: &[String]) -> String {
    match members.first() {
        Some(first) => format!("{} -> {}", members.join(" -> "), first),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_closes_the_loop() {
        let err = PlanError::CyclicDependency {
            members: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
        assert_eq!(err.offending_ids(), vec!["a", "b"]);
    }

    #[test]
    fn unresolved_reference_names_both_ends() {
        let err = PlanError::unresolved("kb", "missing");
        assert_eq!(
            err.to_string(),
            "'kb' references undeclared descriptor 'missing'"
        );
        assert_eq!(err.kind(), "unresolved_reference");
        assert!(!err.is_retryable());
    }
}
