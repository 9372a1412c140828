//! Matching and proxying engine for the Bifrost gateway data plane (4).

pub mod connection;
pub mod engine;
pub mod identity;
pub mod proxy;
pub mod worker;
