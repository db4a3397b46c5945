//! Monte Carlo sampling orchestration for power network working states.
//!
//! Two loosely coupled pieces of a grid simulation platform: the Eurostag
//! export configuration holder ([`config`]) and the Monte Carlo sampler
//! orchestrator ([`sampler`]), which perturbs generator and load power values
//! on a network working state by invoking an external compiled numerical tool
//! and copying its per-sample output back into the network.

pub mod config;
pub mod exec;
pub mod fea;
pub mod network;
/// Sampler orchestrator, staged-input writer, and result-artifact parser.
pub mod sampler;
