//! Deterministic domain id generation
//!
//! Domain ids have the form `testrail:<ToolType>:<connectionId>:<remoteId>`,
//! so converting the same tool row twice always yields the same id.

use crate::models::EntityKind;
use std::fmt::Display;

/// Id prefix shared by every TestRail-sourced domain row
pub const PREFIX: &str = "testrail";

/// Generates domain ids for one entity kind
#[derive(Debug, Clone, Copy)]
pub struct DomainIdGenerator {
    kind: EntityKind,
}

impl DomainIdGenerator {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind }
    }

    pub fn generate(&self, connection_id: i64, remote_id: impl Display) -> String {
        domain_id(self.kind, connection_id, remote_id)
    }
}

/// Build the domain id for a remote entity
pub fn domain_id(kind: EntityKind, connection_id: i64, remote_id: impl Display) -> String {
    format!(
        "{}:{}:{}:{}",
        PREFIX,
        kind.tool_type(),
        connection_id,
        remote_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_id_format() {
        assert_eq!(
            domain_id(EntityKind::Project, 1, 1),
            "testrail:TestrailProject:1:1"
        );
        assert_eq!(
            domain_id(EntityKind::PlanEntry, 2, "ab12-cd"),
            "testrail:TestrailPlanEntry:2:ab12-cd"
        );
    }

    #[test]
    fn test_generator_is_stable() {
        let gen = DomainIdGenerator::new(EntityKind::Result);
        assert_eq!(gen.generate(3, 900), gen.generate(3, 900));
        assert_ne!(gen.generate(3, 900), gen.generate(4, 900));
        assert_ne!(
            gen.generate(3, 900),
            DomainIdGenerator::new(EntityKind::Case).generate(3, 900)
        );
    }
}
