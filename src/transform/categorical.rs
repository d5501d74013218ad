//! Categorical encoding.
//!
//! Output layout for every method: columns that are not encoded keep their
//! original order, followed by the encoded columns grouped by source column in
//! the order the columns were requested. For one-hot, indicators within a
//! group follow the order in which values were first seen during fit.

use super::FitTransform;
use crate::error::{Error, Result};
use crate::table::Table;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Encoding scheme applied to every configured column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMethod {
    /// One Int32 indicator column per observed value, named `{column}_{value}`.
    #[default]
    OneHot,
    /// A single Int32 `{column}_ordinal` column holding the first-seen index.
    Ordinal,
    /// A single Float64 `{column}_frequency` column holding the value's share of fit rows.
    Frequency,
}

impl EncodingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneHot => "onehot",
            Self::Ordinal => "ordinal",
            Self::Frequency => "frequency",
        }
    }
}

impl fmt::Display for EncodingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "onehot" | "one_hot" | "one-hot" => Ok(Self::OneHot),
            "ordinal" => Ok(Self::Ordinal),
            "frequency" => Ok(Self::Frequency),
            other => Err(Error::Config(format!("Unknown encoding method: {other}"))),
        }
    }
}

/// Distinct values observed in one column at fit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCategories {
    pub column: String,
    /// Distinct non-null values in first-seen order.
    pub values: Vec<String>,
    /// Occurrences of each entry in `values`.
    pub counts: Vec<usize>,
}

impl ColumnCategories {
    fn index(&self) -> HashMap<&str, usize> {
        self.values
            .iter()
            .enumerate()
            .map(|(idx, value)| (value.as_str(), idx))
            .collect()
    }

    pub fn indicator_names(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|value| indicator_name(&self.column, value))
            .collect()
    }
}

/// Everything a fitted [`CategoricalEncoder`] learned.
///
/// Saving this after a training run and loading it for prediction keeps the
/// indicator columns identical between the two runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderState {
    pub method: EncodingMethod,
    /// Number of rows in the table the encoder was fitted on.
    pub rows: usize,
    pub columns: Vec<ColumnCategories>,
}

impl EncoderState {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn source_columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column.as_str()).collect()
    }
}

/// Encodes categorical columns with a configurable [`EncodingMethod`].
#[derive(Debug, Clone, Default)]
pub struct CategoricalEncoder {
    method: EncodingMethod,
    state: Option<EncoderState>,
}

impl CategoricalEncoder {
    pub fn new(method: EncodingMethod) -> Self {
        Self {
            method,
            state: None,
        }
    }

    /// Rebuild an already fitted encoder, e.g. from a saved training run.
    pub fn from_state(state: EncoderState) -> Self {
        Self {
            method: state.method,
            state: Some(state),
        }
    }

    pub fn method(&self) -> EncodingMethod {
        self.method
    }

    pub fn state(&self) -> Option<&EncoderState> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<EncoderState> {
        self.state
    }
}

impl FitTransform for CategoricalEncoder {
    fn name(&self) -> &str {
        "categorical_encoder"
    }

    fn fit(&mut self, table: &Table, columns: &[String]) -> Result<()> {
        table.require_columns(columns)?;

        let fitted = columns
            .iter()
            .map(|name| observe_categories(table, name))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            transformer = self.name(),
            method = %self.method,
            columns = fitted.len(),
            "Fitted categorical encoder"
        );

        self.state = Some(EncoderState {
            method: self.method,
            rows: table.height(),
            columns: fitted,
        });
        Ok(())
    }

    fn transform(&self, table: &Table) -> Result<Table> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| Error::state("categorical encoder used before fit"))?;

        let sources = state.source_columns();
        table.require_columns(&sources)?;

        let mut encoded = Vec::new();
        for categories in &state.columns {
            let values = category_strings(table, &categories.column)?;
            match state.method {
                EncodingMethod::OneHot => encoded.extend(one_hot(categories, &values)),
                EncodingMethod::Ordinal => encoded.push(ordinal(categories, &values)),
                EncodingMethod::Frequency => {
                    encoded.push(frequency(categories, &values, state.rows));
                }
            }
        }

        table.drop_columns(&sources)?.with_columns(encoded)
    }
}

fn indicator_name(column: &str, value: &str) -> String {
    format!("{column}_{value}")
}

/// Column values as strings; non-string columns are cast first.
fn category_strings(table: &Table, name: &str) -> Result<Vec<Option<String>>> {
    let column = table.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(ToOwned::to_owned))
        .collect())
}

fn observe_categories(table: &Table, name: &str) -> Result<ColumnCategories> {
    let mut categories = ColumnCategories {
        column: name.to_owned(),
        values: Vec::new(),
        counts: Vec::new(),
    };
    let mut seen: HashMap<String, usize> = HashMap::new();

    for value in category_strings(table, name)?.into_iter().flatten() {
        if let Some(&idx) = seen.get(&value) {
            if let Some(count) = categories.counts.get_mut(idx) {
                *count += 1;
            }
        } else {
            seen.insert(value.clone(), categories.values.len());
            categories.values.push(value);
            categories.counts.push(1);
        }
    }

    Ok(categories)
}

fn one_hot(categories: &ColumnCategories, values: &[Option<String>]) -> Vec<Column> {
    categories
        .values
        .iter()
        .map(|category| {
            let indicator: Vec<i32> = values
                .iter()
                .map(|value| i32::from(value.as_deref() == Some(category.as_str())))
                .collect();
            Column::new(
                indicator_name(&categories.column, category).into(),
                indicator,
            )
        })
        .collect()
}

fn ordinal(categories: &ColumnCategories, values: &[Option<String>]) -> Column {
    let index = categories.index();
    let codes: Vec<Option<i32>> = values
        .iter()
        .map(|value| {
            value
                .as_deref()
                .and_then(|v| index.get(v))
                .and_then(|&idx| i32::try_from(idx).ok())
        })
        .collect();
    Column::new(format!("{}_ordinal", categories.column).into(), codes)
}

fn frequency(categories: &ColumnCategories, values: &[Option<String>], rows: usize) -> Column {
    let index = categories.index();
    let shares: Vec<f64> = values
        .iter()
        .map(|value| {
            let count = value
                .as_deref()
                .and_then(|v| index.get(v))
                .and_then(|&idx| categories.counts.get(idx).copied())
                .unwrap_or(0);
            if rows == 0 {
                0.0
            } else {
                count as f64 / rows as f64
            }
        })
        .collect();
    Column::new(format!("{}_frequency", categories.column).into(), shares)
}
