//! Domain layer for the harness
//!
//! Contains the recorder, transaction handles, scenario description and
//! result types. Nothing here knows about a concrete engine.

pub mod accessor;
pub mod errors;
pub mod events;
pub mod handle;
pub mod outcome;
pub mod scenario;
pub mod signals;
