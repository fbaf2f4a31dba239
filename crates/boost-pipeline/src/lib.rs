//! # boost-pipeline: Incentive computation and distribution.
//!
//! [`Pipeline::run`] is the single entry point: resolve the catch-up
//! multiplier, score every loan in batches against fresh price bundles, and
//! persist rewards only when the whole loan universe was covered.
//!
//! - [`config`]: [`PipelineConfig`] tunables
//! - [`endpoints`]: round-robin RPC failover
//! - [`state`]: per-run accumulator
//! - [`orchestrator`]: the batch state machine

pub mod config;
pub mod endpoints;
pub mod orchestrator;
pub mod state;

pub use config::PipelineConfig;
pub use endpoints::{EndpointPreference, EndpointRotation};
pub use orchestrator::Pipeline;
pub use state::RunState;
