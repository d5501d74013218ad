//! Fit/transform contract shared by the column transformers.
//!
//! A transformer is configured at construction, learns whatever it needs from
//! a table in [`FitTransform::fit`], and applies it in
//! [`FitTransform::transform`]. Transforms never touch the input table and
//! always preserve row count and row order.
//!
//! - [`categorical`]: one-hot, ordinal and frequency encoding
//! - [`date`]: calendar features derived from date columns

pub mod categorical;
pub mod date;

pub use categorical::{CategoricalEncoder, ColumnCategories, EncoderState, EncodingMethod};
pub use date::{DateFeatureEngineer, DateField};

use crate::error::Result;
use crate::table::Table;

/// Trait for column transformers with a two-phase fit/transform lifecycle.
pub trait FitTransform {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Learn parameters for `columns` from `table`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::error::Error::ColumnNotFound`] if any column is
    /// absent; no state is changed in that case.
    fn fit(&mut self, table: &Table, columns: &[String]) -> Result<()>;

    /// Apply fitted parameters to `table`, returning a new table.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::error::Error::State`] if called before `fit`.
    fn transform(&self, table: &Table) -> Result<Table>;

    fn fit_transform(&mut self, table: &Table, columns: &[String]) -> Result<Table> {
        self.fit(table, columns)?;
        self.transform(table)
    }
}
