//! Core domain models for a release
//!
//! Versions and tags, workflow triggers, step and run state, and the
//! configuration a run is resolved from.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod state;
pub mod step;
pub mod trigger;
pub mod version;

pub use error::{ReleaseError, ReleaseResult};
pub use pipeline::*;
pub use plan::{ReleaseConfig, ReleaseOverrides};
pub use state::*;
pub use step::*;
