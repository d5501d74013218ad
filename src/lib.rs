//! # tabprep - Tabular data preparation for ML training and inference
//!
//! tabprep reads a table from a relational database, one-hot encodes its
//! categorical columns and derives calendar features from its date columns,
//! producing a model-ready table.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabprep::config::PipelineConfig;
//!
//! # async fn example() -> tabprep::error::Result<()> {
//! let config = PipelineConfig::from_file("pipeline.json")?;
//! let run = tabprep::pipeline::run_pipeline(&config).await?;
//! println!("{} rows x {} columns", run.table.height(), run.table.width());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`table`]: Typed table passed between steps
//! - [`loader`]: Database table loader
//! - [`transform`]: Fit/transform contract, categorical encoder, date features
//! - [`pipeline`]: The ingest, encode and feature-engineering steps and their runner
//! - [`config`]: Pipeline configuration
//! - [`error`]: Error types
//! - [`logging`]: Subscriber setup for the binary
//!
//! ## Fitted state
//!
//! Transformers are refit on every run unless `encoder_state_path` is set, in
//! which case training runs save the observed categories and prediction runs
//! reuse them, keeping indicator columns stable between the two.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod table;
pub mod transform;
