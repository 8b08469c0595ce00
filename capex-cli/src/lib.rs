//! capex-cli - run the CapEx pipeline and reports from the command line.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod commands;
pub mod output;

pub use output::OutputFormat;
