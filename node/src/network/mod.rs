//! Block propagation between the simulated miners.
//!
//! All miners share one process, so "broadcasting" a block means submitting
//! it to the [`NodeNetwork`] gate, which re-verifies it on behalf of every
//! peer and decides whether the chain accepts it.

pub mod broadcast;

pub use broadcast::NodeNetwork;
