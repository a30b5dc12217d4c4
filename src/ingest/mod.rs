pub mod classifier;
pub mod error;
pub mod hasher;
pub mod orchestrator;
pub mod scanner;
pub mod sidecar;
pub mod state;
