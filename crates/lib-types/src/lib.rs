//! # lib-types
//!
//! Core type definitions for ground-motion seismogram processing.
//!
//! This crate provides the data model shared by the workspace:
//! - Physical units with compile-time safety
//! - Wall-clock stamps and earthquake timing
//! - Single-component time series
//! - Three-component stations and recorded/simulated ensembles

pub mod units;
pub mod time;
pub mod timeseries;
pub mod station;

pub use units::*;
pub use time::*;
pub use timeseries::*;
pub use station::*;
