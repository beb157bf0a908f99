//! Plan construction.
//!
//! A [`Planner`] turns a [`QualityProfile`] into an ordered [`Plan`].
//! Two planners are provided:
//!
//! - [`RuleBasedPlanner`]: deterministic, always available.
//! - [`AdvisoryPlanner`]: asks an [`AIProvider`](crate::ai::AIProvider)
//!   for a plan and falls back to the rule-based plan when the response
//!   cannot be used.
//!
//! Response decoding lives in [`parse`] and is shared with the advisory
//! validator.

mod advisory;
pub mod parse;
mod rule_based;

pub use advisory::AdvisoryPlanner;
pub use rule_based::RuleBasedPlanner;

use crate::types::{Plan, QualityProfile};

/// Trait for plan builders.
///
/// Planning never fails from the caller's point of view: implementations
/// that depend on external services must degrade to a usable plan.
pub trait Planner: Send + Sync {
    fn plan(&self, profile: &QualityProfile) -> Plan;

    fn name(&self) -> &'static str;
}
