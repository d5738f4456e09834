//! Hotdog Diaries scheduling service: slot filling, forecasting and reconciliation.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
