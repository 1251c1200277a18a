//! Pallet stacking engine.
//!
//! Places boxes on a bounded pallet under several first-fit strategies: a
//! greedy fill, a two-tier buffer with promotion, and a volume-sorted voxel
//! grid with yaw rotation. [`engine::StackingEngine`] is the entry point;
//! [`api`] exposes it over HTTP.

pub mod api;
pub mod buffer;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod model;
pub mod optimizer;
pub mod types;
