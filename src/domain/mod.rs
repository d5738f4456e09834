//! Persisted entities and enumerations shared by every layer.

pub mod content;
pub mod error;
pub mod schedule;
