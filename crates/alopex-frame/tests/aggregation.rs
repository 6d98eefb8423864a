mod common;

use alopex_frame::expr::col;
use alopex_frame::{CollectOptions, DataFrame, DataFrameError, DataType};

use common::{floats, frame, i64s, ints, strs, texts};

fn df() -> DataFrame {
    frame(vec![
        strs("g", vec![Some("x"), Some("x"), Some("y"), Some("y"), Some("y")]),
        i64s("v", vec![Some(10), None, Some(3), Some(7), None]),
    ])
}

#[test]
fn group_by_agg_semantics_and_column_order() {
    let out = df()
        .lazy()
        .group_by(vec![col("g")])
        .agg(vec![
            col("v").sum().alias("sum_v"),
            col("v").mean().alias("mean_v"),
            col("v").min().alias("min_v"),
            col("v").max().alias("max_v"),
            col("v").count().alias("cnt_v"),
        ])
        .collect_sync(CollectOptions::default())
        .unwrap();

    assert_eq!(
        out.column_names(),
        vec!["g", "sum_v", "mean_v", "min_v", "max_v", "cnt_v"]
    );
    assert_eq!(out.column("mean_v").unwrap().dtype(), DataType::Float64);
    assert_eq!(out.column("cnt_v").unwrap().dtype(), DataType::UInt32);

    // Groups come out in order of first appearance.
    assert_eq!(texts(&out, "g"), vec![Some("x".into()), Some("y".into())]);
    assert_eq!(ints(&out, "sum_v"), vec![Some(10), Some(10)]);
    assert_eq!(ints(&out, "min_v"), vec![Some(10), Some(3)]);
    assert_eq!(ints(&out, "max_v"), vec![Some(10), Some(7)]);
    assert_eq!(ints(&out, "cnt_v"), vec![Some(1), Some(2)]);
    assert_eq!(floats(&out, "mean_v"), vec![Some(10.0), Some(5.0)]);
}

#[test]
fn plain_columns_aggregate_to_lists() {
    let out = df()
        .lazy()
        .group_by_stable(vec![col("g")])
        .agg(vec![col("v").alias("all_v"), col("v").first().alias("first_v")])
        .collect_sync(CollectOptions::default())
        .unwrap();

    let all_v = out.column("all_v").unwrap();
    assert!(matches!(all_v.dtype(), DataType::List(_)));
    assert_eq!(all_v.len(), 2);
    assert_eq!(ints(&out, "first_v"), vec![Some(10), Some(3)]);
}

#[test]
fn group_head_keeps_keys_first() {
    let out = df()
        .lazy()
        .group_by(vec![col("g")])
        .head(1)
        .collect_sync(CollectOptions::default())
        .unwrap();
    assert_eq!(out.column_names(), vec!["g", "v"]);
    assert_eq!(ints(&out, "v"), vec![Some(10), Some(3)]);

    let tail = df()
        .lazy()
        .group_by(vec![col("g")])
        .tail(1)
        .collect_sync(CollectOptions::default())
        .unwrap();
    assert_eq!(ints(&tail, "v"), vec![None, None]);
}

#[test]
fn window_expressions_broadcast_group_results() {
    let out = df()
        .lazy()
        .select(vec![col("g"), col("v").sum().over(["g"]).alias("total")])
        .collect_sync(CollectOptions::default())
        .unwrap();
    assert_eq!(
        ints(&out, "total"),
        vec![Some(10), Some(10), Some(10), Some(10), Some(10)]
    );
}

#[test]
fn non_numeric_aggregation_is_type_mismatch() {
    let df = frame(vec![
        strs("g", vec![Some("x"), Some("x")]),
        strs("s", vec![Some("a"), Some("b")]),
    ]);

    let err = df
        .lazy()
        .group_by(vec![col("g")])
        .agg(vec![col("s").sum().alias("sum_s")])
        .collect_sync(CollectOptions::default())
        .unwrap_err();
    assert!(matches!(err, DataFrameError::TypeMismatch { .. }));
    assert!(err.to_string().contains("numeric"));
}
