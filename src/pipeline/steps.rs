//! The three pipeline steps: ingest, categorical encode, feature engineering.
//!
//! Each step is a function from a table (plus config) to a new table. On
//! failure a step logs one error naming itself and returns the original error
//! unchanged; there is no retry and no partial result.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader::TableLoader;
use crate::table::Table;
use crate::transform::{
    CategoricalEncoder, DateFeatureEngineer, EncoderState, FitTransform as _,
};

/// Identity and scheduling hints for a step, as seen by an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Ingest,
    CategoricalEncode,
    FeatureEngineering,
}

impl StepKind {
    pub const ALL: [Self; 3] = [Self::Ingest, Self::CategoricalEncode, Self::FeatureEngineering];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ingest => "ingest_data",
            Self::CategoricalEncode => "categorical_encode",
            Self::FeatureEngineering => "feature_engineering",
        }
    }

    /// Whether an orchestrator may reuse a cached output for this step.
    /// Ingest always re-reads the source.
    pub fn cache_enabled(self) -> bool {
        !matches!(self, Self::Ingest)
    }
}

fn log_outcome(step: StepKind, result: &Result<Table>, success: &str, failure: &str) {
    match result {
        Ok(table) => tracing::info!(
            step = step.name(),
            rows = table.height(),
            columns = table.width(),
            "{success}"
        ),
        Err(e) => tracing::error!(step = step.name(), error = %e, "{failure}"),
    }
}

/// Read `config.source.table`, dropping the target column in predict mode.
pub async fn ingest(config: &PipelineConfig) -> Result<Table> {
    let table_name = config.source.table.as_str();
    let result = ingest_inner(config).await;
    log_outcome(
        StepKind::Ingest,
        &result,
        &format!("Successfully read data from {table_name}."),
        &format!("Error while reading data from {table_name}."),
    );
    result
}

async fn ingest_inner(config: &PipelineConfig) -> Result<Table> {
    let mut loader =
        TableLoader::connect_with_timeout(config.source.uri(), config.source.acquire_timeout())
            .await?;
    loader.load(&config.source.table).await?;
    let table = loader.data()?.clone();
    loader.close().await;

    if config.for_predict {
        table.drop_columns(&[config.target_column.as_str()])
    } else {
        Ok(table)
    }
}

/// Encode `config.categorical_columns` with `config.encoding_method`.
///
/// With `encoder_state_path` set, train runs save the fitted categories there
/// and predict runs reuse them instead of refitting.
pub fn categorical_encode(table: &Table, config: &PipelineConfig) -> Result<Table> {
    let result = categorical_encode_inner(table, config);
    log_outcome(
        StepKind::CategoricalEncode,
        &result,
        "Successfully encoded categorical variables.",
        "Error while encoding categorical variables.",
    );
    result
}

fn categorical_encode_inner(table: &Table, config: &PipelineConfig) -> Result<Table> {
    match (&config.encoder_state_path, config.for_predict) {
        (Some(path), true) => {
            let state = EncoderState::load(path)?;
            if state.method != config.encoding_method {
                tracing::warn!(
                    "Saved encoder uses {} but config asks for {}; using the saved method",
                    state.method,
                    config.encoding_method
                );
            }
            CategoricalEncoder::from_state(state).transform(table)
        }
        (path, _) => {
            let mut encoder = CategoricalEncoder::new(config.encoding_method);
            let encoded = encoder.fit_transform(table, &config.categorical_columns)?;
            if let Some(path) = path
                && let Some(state) = encoder.state()
            {
                state.save(path)?;
                tracing::info!("Saved encoder state to {}", path.display());
            }
            Ok(encoded)
        }
    }
}

/// Derive date features from `config.date_columns`, then drop
/// `config.drop_columns`.
pub fn feature_engineering(table: &Table, config: &PipelineConfig) -> Result<Table> {
    let result = feature_engineering_inner(table, config);
    log_outcome(
        StepKind::FeatureEngineering,
        &result,
        "Successfully engineered features.",
        "Error while engineering features.",
    );
    result
}

fn feature_engineering_inner(table: &Table, config: &PipelineConfig) -> Result<Table> {
    let mut engineer =
        DateFeatureEngineer::with_fields(config.date_format.clone(), config.date_fields.clone());
    engineer
        .fit_transform(table, &config.date_columns)?
        .drop_columns(&config.drop_columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use polars::prelude::*;

    fn sales_row() -> Table {
        Table::from_columns(vec![
            Column::new("id".into(), &[1i64]),
            Column::new("product_id".into(), &["A"]),
            Column::new("product_category_name".into(), &["x"]),
            Column::new("month_year".into(), &["01-05-2020"]),
            Column::new("unit_price".into(), &[9.5f64]),
        ])
        .unwrap()
    }

    #[test]
    fn test_encode_then_engineer() {
        let config = PipelineConfig::default();
        let encoded = categorical_encode(&sales_row(), &config).unwrap();
        assert_eq!(
            encoded.column_names(),
            vec![
                "id",
                "month_year",
                "unit_price",
                "product_id_A",
                "product_category_name_x"
            ]
        );

        let features = feature_engineering(&encoded, &config).unwrap();
        assert_eq!(
            features.column_names(),
            vec![
                "unit_price",
                "product_id_A",
                "product_category_name_x",
                "month_year_month",
                "month_year_year"
            ]
        );
        assert_eq!(features.column("month_year_month").unwrap().i32().unwrap().get(0), Some(5));
        assert_eq!(features.column("month_year_year").unwrap().i32().unwrap().get(0), Some(2020));
        assert_eq!(features.column("unit_price").unwrap().f64().unwrap().get(0), Some(9.5));
    }

    #[test]
    fn test_step_error_is_returned_unchanged() {
        let config = PipelineConfig::default();
        let table = sales_row().drop_columns(&["product_category_name"]).unwrap();
        let err = categorical_encode(&table, &config).unwrap_err();
        assert!(
            matches!(err, Error::ColumnNotFound { ref column } if column == "product_category_name")
        );
    }

    #[test]
    fn test_predict_reuses_saved_categories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig {
            encoder_state_path: Some(dir.path().join("state").join("encoder.json")),
            ..PipelineConfig::default()
        };
        categorical_encode(&sales_row(), &config).unwrap();

        config.for_predict = true;
        let predict = Table::from_columns(vec![
            Column::new("product_id".into(), &["B"]),
            Column::new("product_category_name".into(), &["x"]),
        ])
        .unwrap();
        let encoded = categorical_encode(&predict, &config).unwrap();
        assert_eq!(
            encoded.column_names(),
            vec!["product_id_A", "product_category_name_x"]
        );
        assert_eq!(encoded.column("product_id_A").unwrap().i32().unwrap().get(0), Some(0));
    }

    #[test]
    fn test_only_ingest_disables_cache() {
        let cached: Vec<bool> = StepKind::ALL.iter().map(|s| s.cache_enabled()).collect();
        assert_eq!(cached, vec![false, true, true]);
    }
}
