//! Domain module for the engine
//!
//! Contains the lock table, wait-for graph analysis and visibility rules.

pub mod lock_table;
pub mod visibility;
pub mod wait_for;
