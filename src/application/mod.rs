//! Application services layer.

pub mod admin_auth;
pub mod error;
pub mod jobs;
pub mod pool;
pub mod repos;
pub mod schedule;
