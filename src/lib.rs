//! workdays library - business-time calculation over a regional working calendar
//!
//! This module exports internal components for integration testing.

pub mod advance;
pub mod calculator;
pub mod calendar;
pub mod cli;
pub mod clock;
pub mod config;
pub mod holidays;
pub mod normalize;
pub mod query;
pub mod refresher;
pub mod server;
