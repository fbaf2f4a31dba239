//! Cross-crate test suite for the Boost pipeline.
//!
//! Scenario tests drive a real [`boost_pipeline::Pipeline`] against scripted
//! chain and price collaborators and both result stores. Property tests
//! check the scoring and distribution invariants under randomized inputs.

pub mod helpers;
