//! Application layer for the harness
//!
//! Orchestration of one run, verification of its result, repetition over
//! many runs, and the built-in scenario catalog.

pub mod catalog;
pub mod orchestrator;
pub mod runner;
pub mod verifier;
