//! Record storage for jobs, media and derived artifacts.
//!
//! The repository traits are the seam to whatever backs persistence;
//! the in-memory implementations serve the worker binary and tests.

pub mod error;
pub mod memory;
pub mod repos;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryJobRepository, InMemoryMediaRepository};
pub use repos::{JobRepository, MediaRepository, UpdateOutcome};
