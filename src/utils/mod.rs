//! The `utils` module provides a collection of utility functions and common
//! definitions used across `telemq`.
//!
//! It centralizes the crate-wide error type and the logging bootstrap so the
//! other modules share one way of reporting failures.

pub mod error;
pub mod logging;
