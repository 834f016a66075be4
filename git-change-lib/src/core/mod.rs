//! Configuration, output and the owners algorithm.

pub mod config;
pub mod effects;
pub mod formatting;
pub mod owners;
