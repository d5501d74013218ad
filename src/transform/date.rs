//! Calendar features derived from date columns.

use super::FitTransform;
use crate::error::{Error, Result};
use crate::table::{ScalarType, Table};
use chrono::format::ParseErrorKind;
use chrono::{Datelike as _, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01.
pub(crate) const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub const DEFAULT_DATE_FORMAT: &str = "%d-%m-%Y";

/// Calendar sub-field extracted into its own Int32 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    Day,
    Month,
    Year,
    Quarter,
    /// ISO weekday, Monday = 1.
    Weekday,
}

impl DateField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Quarter => "quarter",
            Self::Weekday => "weekday",
        }
    }

    pub fn extract(self, date: NaiveDate) -> i32 {
        match self {
            Self::Day => date.day() as i32,
            Self::Month => date.month() as i32,
            Self::Year => date.year(),
            Self::Quarter => date.month0() as i32 / 3 + 1,
            Self::Weekday => date.weekday().number_from_monday() as i32,
        }
    }

    pub fn column_name(self, source: &str) -> String {
        format!("{source}_{}", self.as_str())
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn default_date_fields() -> Vec<DateField> {
    vec![DateField::Month, DateField::Year]
}

/// Parses configured date columns and appends one column per [`DateField`].
///
/// Source columns are kept; dropping them is left to the caller.
#[derive(Debug, Clone)]
pub struct DateFeatureEngineer {
    format: String,
    fields: Vec<DateField>,
    columns: Option<Vec<String>>,
}

impl DateFeatureEngineer {
    pub fn new(format: impl Into<String>) -> Self {
        Self::with_fields(format, default_date_fields())
    }

    pub fn with_fields(format: impl Into<String>, fields: Vec<DateField>) -> Self {
        Self {
            format: format.into(),
            fields,
            columns: None,
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn fields(&self) -> &[DateField] {
        &self.fields
    }

    /// Parse one raw value exactly as given; surrounding whitespace is not
    /// stripped. Formats without a day component (`%m-%Y`) resolve to the
    /// first of the month.
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        match NaiveDate::parse_from_str(raw, &self.format) {
            Ok(date) => Some(date),
            Err(e) if e.kind() == ParseErrorKind::NotEnough => {
                NaiveDate::parse_from_str(&format!("1 {raw}"), &format!("%d {}", self.format)).ok()
            }
            Err(_) => None,
        }
    }

    fn parse_column(&self, table: &Table, name: &str) -> Result<Vec<Option<NaiveDate>>> {
        let column = table.column(name)?;
        match ScalarType::of(column.dtype()) {
            ScalarType::String => column
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, raw)| match raw {
                    None => Ok(None),
                    Some(raw) => self.parse(raw).map(Some).ok_or_else(|| Error::Parse {
                        column: name.to_owned(),
                        row,
                        value: raw.to_owned(),
                        format: self.format.clone(),
                    }),
                })
                .collect(),
            ScalarType::Date | ScalarType::Datetime => {
                let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
                Ok(days
                    .i32()?
                    .into_iter()
                    .map(|d| d.and_then(date_from_epoch_days))
                    .collect())
            }
            other => Err(Error::TypeMismatch {
                column: name.to_owned(),
                expected: "string, date or datetime".to_owned(),
                found: other.to_string(),
            }),
        }
    }
}

impl Default for DateFeatureEngineer {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMAT)
    }
}

impl FitTransform for DateFeatureEngineer {
    fn name(&self) -> &str {
        "date_feature_engineer"
    }

    fn fit(&mut self, table: &Table, columns: &[String]) -> Result<()> {
        table.require_columns(columns)?;
        self.columns = Some(columns.to_vec());
        Ok(())
    }

    fn transform(&self, table: &Table) -> Result<Table> {
        let columns = self
            .columns
            .as_ref()
            .ok_or_else(|| Error::state("date feature engineer used before fit"))?;
        table.require_columns(columns)?;

        let mut derived = Vec::with_capacity(columns.len() * self.fields.len());
        for name in columns {
            let dates = self.parse_column(table, name)?;
            for field in &self.fields {
                let values: Vec<Option<i32>> =
                    dates.iter().map(|d| d.map(|d| field.extract(d))).collect();
                derived.push(Column::new(field.column_name(name).into(), values));
            }
        }

        tracing::debug!(
            transformer = self.name(),
            columns = columns.len(),
            fields = self.fields.len(),
            format = %self.format,
            "Derived date features"
        );

        table.with_columns(derived)
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}
