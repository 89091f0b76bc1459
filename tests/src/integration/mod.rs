//! # Integration Tests
//!
//! Every scenario runs on a current-thread runtime with paused time, so
//! delays elapse instantly and milestone order is reproducible.


mod cleanup;
mod contention;
mod deadlock;
mod orderings;
