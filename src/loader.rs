//! Loads a whole relational table into a [`Table`].
//!
//! The URI scheme picks the backend: `postgres://` (or `postgresql://`) opens
//! a Postgres pool, `sqlite:` a SQLite one. The loader holds a single
//! connection for its whole lifetime and is deliberately `!Sync`: a loader
//! belongs to one caller and must not be shared across threads.
//!
//! Column types come from the prepared statement, not from the first row, so
//! an empty table still loads with its full, typed schema.

use crate::error::{Error, Result};
use crate::table::Table;
use crate::transform::date::UNIX_EPOCH_DAYS_FROM_CE;
use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::{Column, DataType, TimeUnit};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive as _;
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{
    Column as _, ColumnIndex, Database, Decode, Executor as _, Postgres, Row, Sqlite,
    Statement as _, Type, TypeInfo as _,
};
use std::cell::Cell;
use std::marker::PhantomData;
use std::time::Duration;

pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

enum Source {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

pub struct TableLoader {
    source: Source,
    data: Option<Table>,
    _not_sync: PhantomData<Cell<()>>,
}

impl TableLoader {
    /// Connect with the default acquire timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the source is unreachable, the scheme
    /// is unknown, or the credentials are rejected.
    pub async fn connect(uri: &str) -> Result<Self> {
        Self::connect_with_timeout(uri, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    pub async fn connect_with_timeout(uri: &str, timeout: Duration) -> Result<Self> {
        let connect_err = |e: sqlx::Error| Error::Connection {
            message: format!("{}: {e}", redact_uri(uri)),
        };

        let source = match uri.split_once(':').map(|(scheme, _)| scheme) {
            Some("postgres" | "postgresql") => Source::Postgres(
                pool_options::<Postgres>(timeout)
                    .connect(uri)
                    .await
                    .map_err(connect_err)?,
            ),
            Some("sqlite") => Source::Sqlite(
                pool_options::<Sqlite>(timeout)
                    .connect(uri)
                    .await
                    .map_err(connect_err)?,
            ),
            _ => {
                return Err(Error::Connection {
                    message: format!(
                        "{}: unsupported scheme, expected postgres:// or sqlite:",
                        redact_uri(uri)
                    ),
                });
            }
        };

        tracing::info!("Connected to {}", redact_uri(uri));

        Ok(Self {
            source,
            data: None,
            _not_sync: PhantomData,
        })
    }

    /// Run `SELECT *` against `table_name` and keep the result in memory.
    ///
    /// `table_name` may be schema-qualified (`schema.table`). It is validated
    /// and quoted before being placed in the query.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIdentifier`] if the name is not a plain identifier
    /// - [`Error::Query`] with the driver message if the query fails or a
    ///   column has a type with no table representation
    pub async fn load(&mut self, table_name: &str) -> Result<&Table> {
        let query = format!("SELECT * FROM {}", quote_table_name(table_name)?);

        let table = match &self.source {
            Source::Postgres(pool) => fetch_postgres(pool, table_name, &query).await?,
            Source::Sqlite(pool) => fetch_sqlite(pool, table_name, &query).await?,
        };
        tracing::info!(
            "Loaded {} rows x {} columns from {table_name}",
            table.height(),
            table.width()
        );

        Ok(&*self.data.insert(table))
    }

    /// The most recently loaded table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if [`TableLoader::load`] has not succeeded yet.
    pub fn data(&self) -> Result<&Table> {
        self.data
            .as_ref()
            .ok_or_else(|| Error::state("no data loaded yet; call load() first"))
    }

    pub async fn close(self) {
        match self.source {
            Source::Postgres(pool) => pool.close().await,
            Source::Sqlite(pool) => pool.close().await,
        }
    }
}

fn pool_options<DB: Database>(timeout: Duration) -> PoolOptions<DB> {
    PoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(timeout)
}

/// Validate a `[schema.]table` identifier and double-quote each part.
pub fn quote_table_name(name: &str) -> Result<String> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| is_identifier(part)) {
        return Err(Error::InvalidIdentifier(name.to_owned()));
    }

    Ok(parts
        .iter()
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Hide credentials before a URI reaches logs or error messages.
pub fn redact_uri(uri: &str) -> String {
    match uri.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{scheme}://***@{host}"),
            None => uri.to_owned(),
        },
        None => uri.to_owned(),
    }
}

/// How a database column materializes in a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Boolean,
    Text,
    Date,
    Timestamp,
    TimestampTz,
}

impl ColumnKind {
    fn postgres(type_name: &str) -> Option<Self> {
        Some(match type_name {
            "INT2" => Self::SmallInt,
            "INT4" => Self::Integer,
            "INT8" => Self::BigInt,
            "FLOAT4" => Self::Real,
            "FLOAT8" => Self::Double,
            "NUMERIC" => Self::Numeric,
            "BOOL" => Self::Boolean,
            "TEXT" | "VARCHAR" | "CHAR" | "NAME" => Self::Text,
            "DATE" => Self::Date,
            "TIMESTAMP" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            _ => return None,
        })
    }

    /// `NULL` is what SQLite reports for columns without a declared type,
    /// such as expressions in a view; those load as strings.
    fn sqlite(type_name: &str) -> Option<Self> {
        Some(match type_name {
            "INTEGER" => Self::BigInt,
            "REAL" => Self::Double,
            "BOOLEAN" => Self::Boolean,
            "TEXT" | "NULL" => Self::Text,
            "DATE" => Self::Date,
            "DATETIME" => Self::Timestamp,
            _ => return None,
        })
    }
}

fn query_error(table_name: &str, message: String) -> Error {
    Error::Query {
        table: table_name.to_owned(),
        message,
    }
}

fn unsupported(table_name: &str, column: &str, type_name: &str) -> Error {
    query_error(
        table_name,
        format!("column '{column}' has unsupported type {type_name}"),
    )
}

async fn fetch_postgres(pool: &PgPool, table_name: &str, query: &str) -> Result<Table> {
    let query_err = |e: sqlx::Error| query_error(table_name, e.to_string());

    let statement = pool.prepare(query).await.map_err(query_err)?;
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .await
        .map_err(query_err)?;

    let columns = statement
        .columns()
        .iter()
        .map(|column| {
            let type_name = column.type_info().name();
            let kind = ColumnKind::postgres(type_name)
                .ok_or_else(|| unsupported(table_name, column.name(), type_name))?;
            read_postgres_column(table_name, &rows, column.ordinal(), column.name(), kind)
        })
        .collect::<Result<Vec<_>>>()?;

    Table::from_columns(columns)
}

async fn fetch_sqlite(pool: &SqlitePool, table_name: &str, query: &str) -> Result<Table> {
    let query_err = |e: sqlx::Error| query_error(table_name, e.to_string());

    let statement = pool.prepare(query).await.map_err(query_err)?;
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .await
        .map_err(query_err)?;

    let columns = statement
        .columns()
        .iter()
        .map(|column| {
            let type_name = column.type_info().name();
            let kind = ColumnKind::sqlite(type_name)
                .ok_or_else(|| unsupported(table_name, column.name(), type_name))?;
            read_sqlite_column(table_name, &rows, column.ordinal(), column.name(), kind)
        })
        .collect::<Result<Vec<_>>>()?;

    Table::from_columns(columns)
}

fn read_postgres_column(
    table_name: &str,
    rows: &[PgRow],
    idx: usize,
    name: &str,
    kind: ColumnKind,
) -> Result<Column> {
    let decode_err = |e: sqlx::Error| {
        query_error(table_name, format!("failed to decode column '{name}': {e}"))
    };

    let column = match kind {
        ColumnKind::SmallInt => {
            let values: Vec<Option<i32>> = decode_all::<_, i16>(rows, idx)
                .map_err(decode_err)?
                .into_iter()
                .map(|v| v.map(i32::from))
                .collect();
            Column::new(name.into(), values)
        }
        ColumnKind::Integer => {
            Column::new(name.into(), decode_all::<_, i32>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::BigInt => {
            Column::new(name.into(), decode_all::<_, i64>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Real => {
            let values: Vec<Option<f64>> = decode_all::<_, f32>(rows, idx)
                .map_err(decode_err)?
                .into_iter()
                .map(|v| v.map(f64::from))
                .collect();
            Column::new(name.into(), values)
        }
        ColumnKind::Double => {
            Column::new(name.into(), decode_all::<_, f64>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Numeric => {
            let values: Vec<Option<f64>> = decode_all::<_, Decimal>(rows, idx)
                .map_err(decode_err)?
                .into_iter()
                .map(|v| v.and_then(|d| d.to_f64()))
                .collect();
            Column::new(name.into(), values)
        }
        ColumnKind::Boolean => {
            Column::new(name.into(), decode_all::<_, bool>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Text => {
            Column::new(name.into(), decode_all::<_, String>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Date => {
            date_column(name, decode_all::<_, NaiveDate>(rows, idx).map_err(decode_err)?)?
        }
        ColumnKind::Timestamp => datetime_column(
            name,
            decode_all::<_, NaiveDateTime>(rows, idx).map_err(decode_err)?,
        )?,
        ColumnKind::TimestampTz => {
            let values: Vec<Option<NaiveDateTime>> = decode_all::<_, DateTime<Utc>>(rows, idx)
                .map_err(decode_err)?
                .into_iter()
                .map(|v| v.map(|t| t.naive_utc()))
                .collect();
            datetime_column(name, values)?
        }
    };

    Ok(column)
}

fn read_sqlite_column(
    table_name: &str,
    rows: &[SqliteRow],
    idx: usize,
    name: &str,
    kind: ColumnKind,
) -> Result<Column> {
    let decode_err = |e: sqlx::Error| {
        query_error(table_name, format!("failed to decode column '{name}': {e}"))
    };

    let column = match kind {
        ColumnKind::BigInt => {
            Column::new(name.into(), decode_all::<_, i64>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Double => {
            Column::new(name.into(), decode_all::<_, f64>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Boolean => {
            Column::new(name.into(), decode_all::<_, bool>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Text => {
            Column::new(name.into(), decode_all::<_, String>(rows, idx).map_err(decode_err)?)
        }
        ColumnKind::Date => {
            date_column(name, decode_all::<_, NaiveDate>(rows, idx).map_err(decode_err)?)?
        }
        ColumnKind::Timestamp => datetime_column(
            name,
            decode_all::<_, NaiveDateTime>(rows, idx).map_err(decode_err)?,
        )?,
        other => {
            return Err(unsupported(table_name, name, &format!("{other:?}")));
        }
    };

    Ok(column)
}

fn decode_all<'r, R, T>(rows: &'r [R], idx: usize) -> std::result::Result<Vec<Option<T>>, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    rows.iter().map(|row| row.try_get::<Option<T>, _>(idx)).collect()
}

/// Polars `Date` column from calendar dates.
fn date_column(name: &str, values: Vec<Option<NaiveDate>>) -> Result<Column> {
    let days: Vec<Option<i32>> = values
        .into_iter()
        .map(|d| d.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE))
        .collect();
    Ok(Column::new(name.into(), days).cast(&DataType::Date)?)
}

/// Millisecond polars `Datetime` column, without a time zone.
fn datetime_column(name: &str, values: Vec<Option<NaiveDateTime>>) -> Result<Column> {
    let millis: Vec<Option<i64>> = values
        .into_iter()
        .map(|v| v.map(|t| t.and_utc().timestamp_millis()))
        .collect();
    Ok(Column::new(name.into(), millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ScalarType;

    #[test]
    fn test_quote_table_name() {
        assert_eq!(quote_table_name("sales").unwrap(), "\"sales\"");
        assert_eq!(quote_table_name("public.sales_2020").unwrap(), "\"public\".\"sales_2020\"");
    }

    #[test]
    fn test_rejects_injection() {
        for bad in ["sales; DROP TABLE x", "", "a.b.c", "1sales", "sa\"les", "sales--"] {
            assert!(
                matches!(quote_table_name(bad), Err(Error::InvalidIdentifier(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_redact_uri() {
        assert_eq!(
            redact_uri("postgres://user:secret@db:5432/app"),
            "postgres://***@db:5432/app"
        );
        assert_eq!(redact_uri("sqlite://data.db"), "sqlite://data.db");
    }

    #[test]
    fn test_postgres_types() {
        assert_eq!(ColumnKind::postgres("NUMERIC"), Some(ColumnKind::Numeric));
        assert_eq!(ColumnKind::postgres("DATE"), Some(ColumnKind::Date));
        assert_eq!(ColumnKind::postgres("TIMESTAMPTZ"), Some(ColumnKind::TimestampTz));
        assert_eq!(ColumnKind::postgres("VARCHAR"), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::postgres("JSONB"), None);
    }

    #[test]
    fn test_sqlite_untyped_columns_are_text() {
        assert_eq!(ColumnKind::sqlite("NULL"), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::sqlite("BLOB"), None);
    }

    #[test]
    fn test_date_and_datetime_columns() {
        let dates = date_column("d", vec![NaiveDate::from_ymd_opt(2020, 5, 1), None]).unwrap();
        assert_eq!(ScalarType::of(dates.dtype()), ScalarType::Date);
        assert_eq!(dates.cast(&DataType::Int32).unwrap().i32().unwrap().get(0), Some(18_383));
        assert_eq!(dates.null_count(), 1);

        let stamp = NaiveDate::from_ymd_opt(2020, 5, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 1));
        let stamps = datetime_column("t", vec![stamp]).unwrap();
        assert_eq!(ScalarType::of(stamps.dtype()), ScalarType::Datetime);
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_connection_error() {
        let err = TableLoader::connect("mysql://root:pw@localhost/shop")
            .await
            .err()
            .unwrap();
        match err {
            Error::Connection { message } => {
                assert!(message.contains("unsupported scheme"));
                assert!(!message.contains("pw"));
            }
            other => panic!("expected connection error, got {other}"),
        }
    }
}
