//! Price Tracker - single-instrument price tracking with drawdown alerts
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{TrackerService, TrackingLoop};
pub use domain::alert::AlertDispatcher;
pub use domain::price::{DrawdownDetector, HistoryStore, PriceSource, RetryingFetcher};
pub use shared::types::TrackerConfig;
