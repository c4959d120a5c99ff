//! Core domain models
//!
//! This module defines the fundamental data structures that represent
//! a pipeline definition, its expanded jobs, and their terminal results.

pub mod config;
pub mod job;
pub mod matrix;
pub mod outcome;
pub mod pipeline;
pub mod trigger;

pub use job::*;
pub use outcome::*;
pub use pipeline::*;
pub use trigger::{TriggerDecision, TriggerFilter, COMMIT_MESSAGE_ENV};
