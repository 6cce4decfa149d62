//! Application layer - use cases and services

pub mod commands;
pub mod services;
pub mod tracker;

pub use commands::{Cli, CommandExecutor, Commands};
pub use services::{SessionStatus, TrackerService};
pub use tracker::{
    LoopState, StopReason, TrackingLoop, TrackingReport, TrackingSummary, CHECKPOINT_EVERY,
};
