// Comparison case classification
//
// The decision table is data: each rule constrains the five distinct
// counts and the first matching rule decides. Tests enumerate the table
// directly, so every row must stay reachable.

use super::{ComparisonCase, ComparisonError, Rejection};
use crate::model::DimensionCounts;

/// Constraint on one distinct count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Any,
    Exactly(u64),
    Not(u64),
    AtMost(u64),
    Above(u64),
    /// Neither of the two values
    NotIn(u64, u64),
}

impl Bound {
    pub fn matches(self, value: u64) -> bool {
        match self {
            Self::Any => true,
            Self::Exactly(n) => value == n,
            Self::Not(n) => value != n,
            Self::AtMost(n) => value <= n,
            Self::Above(n) => value > n,
            Self::NotIn(a, b) => value != a && value != b,
        }
    }
}

/// Result of a matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Case(ComparisonCase),
    Reject(Rejection),
}

/// One row of the decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub repos: Bound,
    pub scenarios: Bound,
    pub machines: Bound,
    pub branches: Bound,
    pub commits: Bound,
    pub outcome: Outcome,
}

impl Rule {
    const fn new(
        repos: Bound,
        scenarios: Bound,
        machines: Bound,
        branches: Bound,
        commits: Bound,
        outcome: Outcome,
    ) -> Self {
        Self {
            repos,
            scenarios,
            machines,
            branches,
            commits,
            outcome,
        }
    }

    pub fn matches(&self, counts: &DimensionCounts) -> bool {
        self.repos.matches(counts.repos)
            && self.scenarios.matches(counts.scenarios)
            && self.machines.matches(counts.machines)
            && self.branches.matches(counts.branches)
            && self.commits.matches(counts.commits)
    }
}

use Bound::{Above, Any, AtMost, Exactly, Not, NotIn};
use ComparisonCase as C;
use Outcome::{Case, Reject};
use Rejection as R;

/// Columns: repos, scenarios, machines, branches, commits
#[rustfmt::skip]
pub const CLASSIFICATION_TABLE: &[Rule] = &[
    // different repositories
    Rule::new(Exactly(2),  AtMost(2),   Exactly(1),  AtMost(2),   AtMost(2),   Case(C::Repository)),
    Rule::new(Exactly(2),  AtMost(2),   Exactly(2),  Any,         Any,         Reject(R::ReposAndMachines)),
    Rule::new(Exactly(2),  AtMost(2),   NotIn(1, 2), Any,         Any,         Reject(R::ReposInvalidMachineCount)),
    Rule::new(Exactly(2),  AtMost(2),   Exactly(1),  Above(2),    Any,         Reject(R::ReposTooManyBranches)),
    Rule::new(Exactly(2),  AtMost(2),   Exactly(1),  AtMost(2),   Above(2),    Reject(R::ReposTooManyCommits)),
    Rule::new(Exactly(2),  Above(2),    Any,         Any,         Any,         Reject(R::ReposTooManyScenarios)),
    // same repository, different usage scenarios
    Rule::new(Exactly(1),  Exactly(2),  Exactly(1),  AtMost(1),   Exactly(1),  Case(C::UsageScenario)),
    Rule::new(Exactly(1),  Exactly(2),  Exactly(2),  Any,         Any,         Reject(R::ScenariosAndMachines)),
    Rule::new(Exactly(1),  Exactly(2),  Exactly(1),  AtMost(1),   Not(1),      Reject(R::ScenariosAndCommits)),
    Rule::new(Exactly(1),  Exactly(2),  Exactly(1),  Above(1),    Any,         Reject(R::ScenariosAndBranches)),
    Rule::new(Exactly(1),  Exactly(2),  NotIn(1, 2), Any,         Any,         Reject(R::ScenariosInvalidMachineCount)),
    // same repository and scenario, different machines
    Rule::new(Exactly(1),  Exactly(1),  Exactly(2),  AtMost(1),   Exactly(1),  Case(C::Machine)),
    Rule::new(Exactly(1),  Exactly(1),  Exactly(2),  AtMost(1),   Not(1),      Reject(R::MachinesAndCommits)),
    Rule::new(Exactly(1),  Exactly(1),  Exactly(2),  Above(1),    Any,         Reject(R::MachinesAndBranches)),
    // same repository, scenario and machine
    Rule::new(Exactly(1),  Exactly(1),  Exactly(1),  AtMost(1),   Exactly(2),  Case(C::Commit)),
    Rule::new(Exactly(1),  Exactly(1),  Exactly(1),  AtMost(1),   Above(2),    Reject(R::TooManyCommits)),
    Rule::new(Exactly(1),  Exactly(1),  Exactly(1),  AtMost(1),   Exactly(1),  Case(C::RepeatedRun)),
    Rule::new(Exactly(1),  Exactly(1),  Exactly(1),  Above(1),    AtMost(2),   Case(C::Branch)),
    Rule::new(Exactly(1),  Exactly(1),  Exactly(1),  Above(1),    Above(2),    Reject(R::BranchesTooManyCommits)),
    Rule::new(Exactly(1),  Exactly(1),  NotIn(1, 2), Any,         Any,         Reject(R::InvalidMachineCount)),
    Rule::new(Exactly(1),  NotIn(1, 2), Any,         Any,         Any,         Reject(R::InvalidScenarioCount)),
    Rule::new(NotIn(1, 2), Any,         Any,         Any,         Any,         Reject(R::InvalidRepoCount)),
];

/// First rule of [`CLASSIFICATION_TABLE`] matching the counts
pub fn matching_rule(counts: &DimensionCounts) -> Option<&'static Rule> {
    CLASSIFICATION_TABLE.iter().find(|rule| rule.matches(counts))
}

/// Classify distinct dimension counts into a comparison case
///
/// Unsupported combinations are rejected with a user-facing reason; no
/// case is ever inferred outside the table.
pub fn classify(counts: &DimensionCounts) -> Result<ComparisonCase, ComparisonError> {
    match matching_rule(counts).map(|rule| rule.outcome) {
        Some(Case(case)) => Ok(case),
        Some(Reject(reason)) => Err(reason.into()),
        None => Err(R::Undetermined.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(Bound::Any.matches(0));
        assert!(Bound::Exactly(2).matches(2));
        assert!(!Bound::Exactly(2).matches(3));
        assert!(Bound::Not(1).matches(0));
        assert!(Bound::AtMost(2).matches(0));
        assert!(!Bound::AtMost(2).matches(3));
        assert!(Bound::Above(2).matches(3));
        assert!(Bound::NotIn(1, 2).matches(0));
        assert!(Bound::NotIn(1, 2).matches(3));
        assert!(!Bound::NotIn(1, 2).matches(2));
    }

    #[test]
    fn test_commit_row_wins_over_repeated_run() {
        let rule = matching_rule(&DimensionCounts::new(1, 1, 1, 2, 1)).unwrap();
        assert_eq!(rule.outcome, Outcome::Case(ComparisonCase::Commit));
    }

    #[test]
    fn test_zero_counts_rejected() {
        assert_eq!(
            classify(&DimensionCounts::default()),
            Err(ComparisonError::Unsupported(Rejection::InvalidRepoCount))
        );
    }

    #[test]
    fn test_only_unreachable_combinations_are_undetermined() {
        // one repository always has at least one commit
        assert_eq!(
            classify(&DimensionCounts::new(1, 1, 1, 0, 1)),
            Err(ComparisonError::Unsupported(Rejection::Undetermined))
        );
    }
}
