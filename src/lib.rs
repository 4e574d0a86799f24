//! phasestats - per-phase energy rollups and cross-run comparisons
//!
//! This library turns the raw telemetry of a measured software run into one
//! summary row per (phase, metric, detail), and compares those rows across
//! runs: it classifies what differs between the runs (commit, branch,
//! machine, usage scenario, repository, or nothing at all) and reports
//! descriptive statistics, confidence intervals and t-test significance.

pub mod aggregator;
pub mod cli;
pub mod comparison;
pub mod config;
pub mod engine;
pub mod metric_catalog;
pub mod model;
pub mod report;
pub mod rollup;
pub mod store;
