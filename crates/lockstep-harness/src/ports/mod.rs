//! Ports for the harness
//!
//! Inbound: how the runner asks for one scenario execution.
//! Outbound: the transactional store every flow talks to.

pub mod inbound;
pub mod outbound;
