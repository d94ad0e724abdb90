//! The closed list of pipeline subtasks, in dependency order

use super::converter::{self, ConvertStats};
use super::extractor::{self, ExtractStats};
use super::TaskContext;
use crate::collector::{self, CollectStats};
use crate::error::Result;
use crate::models::EntityKind;

/// Pipeline stage a subtask belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// API to raw store
    Collect,
    /// Raw store to tool rows
    Extract,
    /// Tool rows to domain rows
    Convert,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Collect => "collect",
            Phase::Extract => "extract",
            Phase::Convert => "convert",
        }
    }
}

macro_rules! define_subtasks {
    (
        $( $variant:ident => $name:literal, $phase:ident, $kind:ident );+ $(;)?
    ) => {
        /// One named step of the pipeline
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Subtask {
            $( $variant ),+
        }

        impl Subtask {
            /// Every subtask, in the order they must run
            pub const ALL: &'static [Subtask] = &[ $( Subtask::$variant ),+ ];

            /// Name as used on the command line and in logs (e.g., `collectRuns`)
            pub fn name(&self) -> &'static str {
                match self {
                    $( Subtask::$variant => $name ),+
                }
            }

            pub fn phase(&self) -> Phase {
                match self {
                    $( Subtask::$variant => Phase::$phase ),+
                }
            }

            /// Entity kind the subtask operates on
            pub fn entity(&self) -> EntityKind {
                match self {
                    $( Subtask::$variant => EntityKind::$kind ),+
                }
            }
        }
    };
}

define_subtasks! {
    CollectStatuses => "collectStatuses", Collect, Status;
    ExtractStatuses => "extractStatuses", Extract, Status;
    CollectPriorities => "collectPriorities", Collect, Priority;
    ExtractPriorities => "extractPriorities", Extract, Priority;
    CollectCaseTypes => "collectCaseTypes", Collect, CaseType;
    ExtractCaseTypes => "extractCaseTypes", Extract, CaseType;
    CollectCaseFields => "collectCaseFields", Collect, CaseField;
    ExtractCaseFields => "extractCaseFields", Extract, CaseField;
    CollectUsers => "collectUsers", Collect, User;
    ExtractUsers => "extractUsers", Extract, User;
    CollectProjects => "collectProjects", Collect, Project;
    ExtractProjects => "extractProjects", Extract, Project;
    ConvertProjects => "convertProjects", Convert, Project;
    CollectSuites => "collectSuites", Collect, Suite;
    ExtractSuites => "extractSuites", Extract, Suite;
    CollectSections => "collectSections", Collect, Section;
    ExtractSections => "extractSections", Extract, Section;
    CollectMilestones => "collectMilestones", Collect, Milestone;
    ExtractMilestones => "extractMilestones", Extract, Milestone;
    CollectCases => "collectCases", Collect, Case;
    ExtractCases => "extractCases", Extract, Case;
    ConvertCases => "convertCases", Convert, Case;
    CollectPlans => "collectPlans", Collect, Plan;
    ExtractPlans => "extractPlans", Extract, Plan;
    CollectRuns => "collectRuns", Collect, Run;
    ExtractRuns => "extractRuns", Extract, Run;
    ConvertRuns => "convertRuns", Convert, Run;
    CollectResults => "collectResults", Collect, Result;
    ExtractResults => "extractResults", Extract, Result;
    ConvertResults => "convertResults", Convert, Result;
}

impl Subtask {
    /// Look a subtask up by its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Position in the dependency order
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(usize::MAX)
    }

    /// Run this subtask against the context.
    pub async fn run(&self, ctx: &TaskContext<'_>) -> Result<SubtaskOutcome> {
        ctx.check_cancelled()?;
        let kind = self.entity();
        match self.phase() {
            Phase::Collect => collector::collect(ctx, kind)
                .await
                .map(SubtaskOutcome::Collected),
            Phase::Extract => extractor::extract(ctx, kind).map(SubtaskOutcome::Extracted),
            Phase::Convert => converter::convert(ctx, kind).map(SubtaskOutcome::Converted),
        }
    }
}

impl std::fmt::Display for Subtask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a finished subtask did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskOutcome {
    Collected(CollectStats),
    Extracted(ExtractStats),
    Converted(ConvertStats),
}

impl SubtaskOutcome {
    /// Records stored (collect) or rows written (extract, convert)
    pub fn rows(&self) -> usize {
        match self {
            SubtaskOutcome::Collected(s) => s.records,
            SubtaskOutcome::Extracted(s) => s.rows,
            SubtaskOutcome::Converted(s) => s.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_names() {
        assert_eq!(Subtask::ALL.len(), 30);
        assert_eq!(Subtask::ALL[0].name(), "collectStatuses");
        assert_eq!(Subtask::ALL[29].name(), "convertResults");
        assert_eq!(Subtask::from_name("extractPlans"), Some(Subtask::ExtractPlans));
        assert_eq!(Subtask::from_name("extractPlanEntries"), None);
    }

    #[test]
    fn test_every_extract_follows_its_collect() {
        for subtask in Subtask::ALL {
            if subtask.phase() == Phase::Extract {
                let collect = Subtask::ALL
                    .iter()
                    .find(|s| s.phase() == Phase::Collect && s.entity() == subtask.entity())
                    .unwrap();
                assert!(collect.index() < subtask.index(), "{}", subtask);
            }
        }
    }

    #[test]
    fn test_fan_out_parents_come_first() {
        assert!(Subtask::ExtractSuites.index() < Subtask::CollectSections.index());
        assert!(Subtask::ExtractSuites.index() < Subtask::CollectCases.index());
        assert!(Subtask::ExtractRuns.index() < Subtask::CollectResults.index());
    }
}
