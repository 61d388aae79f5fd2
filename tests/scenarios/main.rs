//! Scenario-based tests for releaser
//!
//! Every collaborator is an in-memory mock, so these run without git,
//! just, or network access.

mod helpers;

mod ci_wait;
mod dry_run;
mod failure_handling;
mod gating;
mod release_branch;
mod success_chain;
