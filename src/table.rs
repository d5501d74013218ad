//! Strongly-typed table handed between pipeline steps.
//!
//! [`Table`] wraps a polars [`DataFrame`] and exposes only the column-level
//! operations the pipeline needs. Each operation returns a new `Table` and
//! leaves the receiver untouched, so a table passed into a step can never be
//! altered behind the caller's back.

use crate::error::{Error, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::fmt;

/// Scalar type declared by a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    /// Any polars dtype the pipeline does not handle natively.
    Other(String),
}

impl ScalarType {
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::String => Self::String,
            DataType::Boolean => Self::Boolean,
            DataType::Date => Self::Date,
            DataType::Datetime(..) => Self::Datetime,
            dt if dt.is_integer() => Self::Integer,
            dt if dt.is_float() => Self::Float,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
            Self::Datetime => write!(f, "datetime"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Ordered, uniquely named, typed columns over a fixed number of rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    df: DataFrame,
}

impl Table {
    pub fn from_frame(df: DataFrame) -> Self {
        Self { df }
    }

    /// Build a table from columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        Ok(Self {
            df: DataFrame::new(columns)?,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str().to_owned())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_index(name).is_some()
    }

    /// Look up a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ColumnNotFound`] if the table has no such column.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.df
            .column(name)
            .map_err(|_e| Error::column_not_found(name))
    }

    pub fn scalar_type(&self, name: &str) -> Result<ScalarType> {
        Ok(ScalarType::of(self.column(name)?.dtype()))
    }

    /// Fail with [`Error::ColumnNotFound`] naming the first absent column.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        match names.iter().find(|name| !self.has_column(name.as_ref())) {
            Some(missing) => Err(Error::column_not_found(missing.as_ref())),
            None => Ok(()),
        }
    }

    /// Append a column. The name must not already be present.
    pub fn with_column(&self, column: Column) -> Result<Self> {
        self.with_columns(vec![column])
    }

    /// Append several columns, in order. None of the names may already be
    /// present or repeat within `columns`.
    pub fn with_columns(&self, columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            let name = column.name().as_str();
            if self.has_column(name) || !seen.insert(name.to_owned()) {
                return Err(Error::ColumnCollision {
                    column: name.to_owned(),
                });
            }
        }

        let mut df = self.df.clone();
        for column in columns {
            df.with_column(column)?;
        }
        Ok(Self { df })
    }

    /// Remove the named columns. Nothing is dropped if any name is absent.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        self.require_columns(names)?;

        let drop: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let keep: Vec<PlSmallStr> = self
            .df
            .get_column_names()
            .into_iter()
            .filter(|name| !drop.contains(name.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            df: self.df.select(keep)?,
        })
    }

    pub fn rename_column(&self, old: &str, new: &str) -> Result<Self> {
        self.column(old)?;
        if old != new && self.has_column(new) {
            return Err(Error::ColumnCollision {
                column: new.to_owned(),
            });
        }

        let mut df = self.df.clone();
        df.rename(old, new.into())?;
        Ok(Self { df })
    }
}

impl From<DataFrame> for Table {
    fn from(df: DataFrame) -> Self {
        Self::from_frame(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            Column::new("id".into(), &[1i64, 2, 3]),
            Column::new("name".into(), &["a", "b", "c"]),
            Column::new("price".into(), &[1.5f64, 2.5, 3.5]),
        ])
        .unwrap()
    }

    #[test]
    fn test_scalar_types() {
        let table = sample();
        assert_eq!(table.scalar_type("id").unwrap(), ScalarType::Integer);
        assert_eq!(table.scalar_type("name").unwrap(), ScalarType::String);
        assert_eq!(table.scalar_type("price").unwrap(), ScalarType::Float);
    }

    #[test]
    fn test_missing_column() {
        let table = sample();
        let err = table.column("nope").unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { ref column } if column == "nope"));
    }

    #[test]
    fn test_drop_columns_is_all_or_nothing() {
        let table = sample();
        let err = table.drop_columns(&["id", "nope"]).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));
        assert_eq!(table.width(), 3);

        let dropped = table.drop_columns(&["id"]).unwrap();
        assert_eq!(dropped.column_names(), vec!["name", "price"]);
        assert_eq!(dropped.height(), 3);
        assert_eq!(table.width(), 3, "receiver must be untouched");
    }

    #[test]
    fn test_with_column_rejects_collision() {
        let table = sample();
        let err = table
            .with_column(Column::new("id".into(), &[9i64, 9, 9]))
            .unwrap_err();
        assert!(matches!(err, Error::ColumnCollision { .. }));

        let extended = table
            .with_column(Column::new("qty".into(), &[4i32, 5, 6]))
            .unwrap();
        assert_eq!(extended.column_names(), vec!["id", "name", "price", "qty"]);
    }

    #[test]
    fn test_rename_column() {
        let table = sample();
        let renamed = table.rename_column("name", "label").unwrap();
        assert!(renamed.has_column("label"));
        assert!(!renamed.has_column("name"));
        assert!(table.rename_column("name", "price").is_err());
    }
}
