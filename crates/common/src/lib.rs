//! Common utilities, types, and configuration shared across Scout crates.
//!
//! This crate contains the base building blocks for the Scout system:
//! - **Configuration**: Strongly typed engine configuration (`config`).
//! - **Wire models**: The plugin-facing data contracts (`models`).
//! - **Cancellation**: Query-scoped cancellation and timeouts (`context`).
//! - **Resilience**: Retry with exponential backoff (`retry`).
//! - **Logging**: Subscriber initialisation (`logging`).
pub mod config;
pub mod context;
pub mod logging;
pub mod models;
pub mod retry;
