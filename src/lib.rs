//! Pipeboard - a sales pipeline board for the command line
//!
//! This library provides the core functionality for Pipeboard, including:
//! - Data models for pipelines, stages and deals
//! - The data provider seam, with a REST client and an embedded SQLite store
//! - The board controller that reorders stages and moves deals through a drag gesture
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use pipeboard::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod config;
pub mod db;
pub mod models;
pub mod repo;
pub mod provider;
pub mod board;
pub mod cli;
