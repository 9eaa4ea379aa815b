#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for qgate
//!
//! This library consolidates all functionality for the qgate tool, which evaluates
//! user-authored quality-gate checks against JSON documents.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`engine`]: Condition evaluation, quantifiers, and status aggregation
//! - [`reports`]: Console and JSON renderings of a gate report

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod engine;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

pub use crate::commands::{Host, run};
