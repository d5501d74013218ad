//! Property tests for the transformer invariants: row count and order are
//! preserved, and one-hot indicators from one source column sum to one.

use polars::prelude::*;
use proptest::prelude::*;
use tabprep::error::Error;
use tabprep::table::Table;
use tabprep::transform::{
    CategoricalEncoder, DateFeatureEngineer, EncodingMethod, FitTransform as _,
};

fn categories() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 1..40)
        .prop_map(|v| v.into_iter().map(str::to_owned).collect())
}

fn table_of(cats: &[String]) -> Table {
    let ids: Vec<i64> = (0..cats.len() as i64).collect();
    Table::from_columns(vec![
        Column::new("id".into(), ids),
        Column::new("cat".into(), cats.to_vec()),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn one_hot_rows_sum_to_one(cats in categories()) {
        let table = table_of(&cats);
        let mut encoder = CategoricalEncoder::new(EncodingMethod::OneHot);
        let out = encoder.fit_transform(&table, &["cat".to_owned()]).unwrap();

        prop_assert_eq!(out.height(), table.height());

        let indicator_names = encoder.state().unwrap().columns[0].indicator_names();
        for row in 0..out.height() {
            let mut sum = 0;
            for name in &indicator_names {
                let v = out.column(name).unwrap().i32().unwrap().get(row).unwrap();
                if v == 1 {
                    let expected = format!("cat_{}", cats[row]);
                    prop_assert_eq!(name.as_str(), expected.as_str());
                }
                sum += v;
            }
            prop_assert_eq!(sum, 1);
        }

        let ids: Vec<Option<i64>> = out.column("id").unwrap().i64().unwrap().into_iter().collect();
        let expected: Vec<Option<i64>> = (0..cats.len() as i64).map(Some).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn encoding_is_deterministic(cats in categories()) {
        let table = table_of(&cats);
        let first = CategoricalEncoder::new(EncodingMethod::OneHot)
            .fit_transform(&table, &["cat".to_owned()])
            .unwrap();
        let second = CategoricalEncoder::new(EncodingMethod::OneHot)
            .fit_transform(&table, &["cat".to_owned()])
            .unwrap();
        prop_assert_eq!(first.column_names(), second.column_names());
    }

    #[test]
    fn absent_columns_fail_and_leave_input_alone(cats in categories(), missing in "[e-z]{1,8}") {
        let table = table_of(&cats);
        let before = table.column_names();

        let mut encoder = CategoricalEncoder::new(EncodingMethod::OneHot);
        let err = encoder.fit_transform(&table, &[missing.clone()]).unwrap_err();
        prop_assert!(
            matches!(err, Error::ColumnNotFound { .. }),
            "expected ColumnNotFound, got {:?}",
            err
        );

        let mut engineer = DateFeatureEngineer::default();
        let err = engineer.fit_transform(&table, &[missing]).unwrap_err();
        prop_assert!(
            matches!(err, Error::ColumnNotFound { .. }),
            "expected ColumnNotFound, got {:?}",
            err
        );

        prop_assert_eq!(table.column_names(), before);
        prop_assert_eq!(table.height(), cats.len());
    }

    #[test]
    fn date_features_keep_rows(months in prop::collection::vec(1u32..=12, 1..30)) {
        let raw: Vec<String> = months.iter().map(|m| format!("01-{m:02}-2021")).collect();
        let table = Table::from_columns(vec![Column::new("month_year".into(), raw)]).unwrap();

        let mut engineer = DateFeatureEngineer::default();
        let out = engineer.fit_transform(&table, &["month_year".to_owned()]).unwrap();

        prop_assert_eq!(out.height(), months.len());
        let got: Vec<Option<i32>> = out
            .column("month_year_month")
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        let expected: Vec<Option<i32>> = months.iter().map(|m| Some(*m as i32)).collect();
        prop_assert_eq!(got, expected);
    }
}
