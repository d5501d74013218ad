//! Data preparation pipeline.
//!
//! # Overview
//!
//! Three steps run in a fixed order, each consuming the previous step's table:
//!
//! 1. **ingest** ([`ingest`]): load one table from the database; in predict
//!    mode the target column is dropped
//! 2. **categorical encode** ([`categorical_encode`]): replace categorical
//!    columns with encoded columns
//! 3. **feature engineering** ([`feature_engineering`]): add calendar fields
//!    from date columns, then drop helper columns
//!
//! Steps are plain functions so any orchestrator can call them; [`run_pipeline`]
//! is the built-in one.
//!
//! # Example
//!
//! ```no_run
//! use tabprep::config::PipelineConfig;
//! use tabprep::pipeline::run_pipeline;
//!
//! # async fn example() -> tabprep::error::Result<()> {
//! let mut config = PipelineConfig::default();
//! config.source.set_uri("sqlite://sales.db".to_owned());
//!
//! let run = run_pipeline(&config).await?;
//! println!("{}", run.report.summary());
//! # Ok(())
//! # }
//! ```

pub mod executor;
pub mod steps;

pub use executor::{PipelineRun, RunReport, StepRecord, run_pipeline, write_output};
pub use steps::{StepKind, categorical_encode, feature_engineering, ingest};
