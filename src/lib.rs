//! INEI Fetcher Library
//!
//! A Rust library for acquiring survey microdata published by Peru's INEI
//! (ENAHO, ENDES, ENAPRES). Discovers the modules released per year,
//! downloads and extracts their archives idempotently, and reorganizes the
//! extracted files into a stable, collision-free layout.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
