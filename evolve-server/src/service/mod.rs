//! Service Module
//!
//! Business logic layer for the server.
//! Services orchestrate between repositories and contain domain logic.

pub mod run;

// Re-export for convenience
pub use run as run_service;
