//! Cross-run comparison
//!
//! Classifies a set of runs into a comparison case and builds the nested
//! statistics tree (phase → metric → detail → comparison key).
//!
//! # Architecture
//!
//! - `classifier`: decision table over distinct dimension counts
//! - `statistics`: t-distribution, one-sample and Welch t-tests
//! - `tree`: typed, insertion-ordered comparison tree
//! - `builder`: turns phase-stat rows into a tree and fills in statistics
//!
//! # Example
//!
//! ```
//! use phasestats::comparison::{classify, ComparisonCase};
//! use phasestats::model::DimensionCounts;
//!
//! // same repo, scenario, machine and branch; two commits
//! let case = classify(&DimensionCounts::new(1, 1, 1, 2, 1)).unwrap();
//! assert_eq!(case, ComparisonCase::Commit);
//! ```

pub mod builder;
pub mod classifier;
pub mod statistics;
pub mod tree;

pub use builder::ComparisonBuilder;
pub use classifier::{classify, matching_rule, Bound, Outcome, Rule, CLASSIFICATION_TABLE};
pub use tree::{ComparisonNode, DetailNode, LeafStats, MetricNode, OrderedMap, PhaseNode};

use crate::model::PhaseStatRow;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Axis along which a set of runs is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonCase {
    Repository,
    Branch,
    #[serde(rename = "Usage Scenario")]
    UsageScenario,
    Machine,
    Commit,
    #[serde(rename = "Repeated Run")]
    RepeatedRun,
}

impl ComparisonCase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Repository => "Repository",
            Self::Branch => "Branch",
            Self::UsageScenario => "Usage Scenario",
            Self::Machine => "Machine",
            Self::Commit => "Commit",
            Self::RepeatedRun => "Repeated Run",
        }
    }

    /// Map a "compare anyway" mode name to the case it forces
    ///
    /// # Example
    /// ```
    /// use phasestats::comparison::ComparisonCase;
    ///
    /// assert_eq!(
    ///     ComparisonCase::from_force_mode("machine_ids").unwrap(),
    ///     ComparisonCase::Machine
    /// );
    /// assert!(ComparisonCase::from_force_mode("machines").is_err());
    /// ```
    pub fn from_force_mode(mode: &str) -> Result<Self, ComparisonError> {
        match mode {
            "repos" => Ok(Self::Repository),
            "usage_scenarios" => Ok(Self::UsageScenario),
            "machine_ids" => Ok(Self::Machine),
            "commit_hashes" => Ok(Self::Commit),
            "branches" => Ok(Self::Branch),
            other => Err(ComparisonError::UnknownForceMode(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison key of a row under a case
///
/// Without a case (single-run view) and for `Commit`/`RepeatedRun` the
/// commit hash is the key.
pub fn comparison_key(case: Option<ComparisonCase>, row: &PhaseStatRow) -> &str {
    match case {
        Some(ComparisonCase::Repository) => &row.repository,
        Some(ComparisonCase::Branch) => &row.branch,
        Some(ComparisonCase::UsageScenario) => &row.filename,
        Some(ComparisonCase::Machine) => &row.machine_description,
        Some(ComparisonCase::Commit) | Some(ComparisonCase::RepeatedRun) | None => &row.commit_hash,
    }
}

/// Reasons a combination of dimension counts is not comparable
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("Different repos & machines not supported")]
    ReposAndMachines,

    #[error("Less than 1 or more than 2 Machines and different repos not supported.")]
    ReposInvalidMachineCount,

    #[error("Different repos & more than 2 branches not supported")]
    ReposTooManyBranches,

    #[error("Different repos & more than 2 different commits not supported")]
    ReposTooManyCommits,

    #[error("More than 2 usage scenarios for different repos not supported.")]
    ReposTooManyScenarios,

    #[error("Different usage scenarios & machines not supported")]
    ScenariosAndMachines,

    #[error("Different usage scenarios & commits not supported")]
    ScenariosAndCommits,

    #[error("Different usage scenarios & branches not supported")]
    ScenariosAndBranches,

    #[error("Less than 1 or more than 2 Machines for different usage scenarios not supported.")]
    ScenariosInvalidMachineCount,

    #[error("Different machines & commits not supported")]
    MachinesAndCommits,

    #[error("Different machines & branches not supported")]
    MachinesAndBranches,

    #[error("More than 2 commits not supported. Please use the timeline view to compare a series of commits.")]
    TooManyCommits,

    #[error("Different branches and more than 2 commits not supported")]
    BranchesTooManyCommits,

    #[error("Less than 1 or more than 2 Machines per repo not supported.")]
    InvalidMachineCount,

    #[error("Less than 1 or more than 2 Usage scenarios per repo not supported.")]
    InvalidScenarioCount,

    #[error("Less than 1 or more than 2 repos not supported for overview. Please apply metric filter.")]
    InvalidRepoCount,

    #[error("Could not determine compare case")]
    Undetermined,
}

/// Errors from classifying or forcing a comparison
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComparisonError {
    #[error("{0}")]
    Unsupported(#[from] Rejection),

    #[error("Forcing a comparison mode for unknown mode")]
    UnknownForceMode(String),
}
