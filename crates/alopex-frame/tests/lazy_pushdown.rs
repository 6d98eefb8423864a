mod common;

use alopex_frame::expr::{col, lit};
use alopex_frame::lazy::{LogicalPlan, Optimizer};
use alopex_frame::{CollectOptions, DataFrame, LazyFrame};

use common::{frame, i64s, init_test_tracing, ints, strs, texts};

fn df() -> DataFrame {
    frame(vec![
        i64s("a", vec![Some(1), Some(2), Some(3), Some(4)]),
        strs("b", vec![Some("w"), Some("x"), Some("y"), Some("z")]),
        i64s("c", vec![Some(10), Some(20), Some(30), Some(40)]),
    ])
}

fn query() -> LazyFrame {
    df()
        .lazy()
        .with_columns(vec![col("c").mul(lit(2_i64)).alias("d")])
        .filter(col("a").gt(lit(1_i64)))
        .select(vec![col("b"), col("d")])
}

#[test]
fn explain_shows_pushdowns_only_when_optimized() {
    let lf = query();

    let unoptimized = lf.explain(false);
    assert!(unoptimized.contains("scan[dataframe"));
    assert!(!unoptimized.contains("projection="));
    assert!(!unoptimized.contains("filters=["));

    let optimized = lf.explain(true);
    assert!(optimized.contains("projection="));
    assert!(optimized.contains("filters=["));
}

#[test]
fn optimized_and_unoptimized_results_match() {
    init_test_tracing();
    let lf = query();
    let optimized = lf.collect_sync(CollectOptions::default()).unwrap();
    let plain = lf
        .collect_sync(CollectOptions::default().with_no_optimization(true))
        .unwrap();
    let manual = lf
        .collect_sync(
            CollectOptions::default()
                .with_predicate_pushdown(false)
                .with_projection_pushdown(false)
                .with_simplify_expression(false)
                .with_slice_pushdown(false),
        )
        .unwrap();

    assert_eq!(optimized, plain);
    assert_eq!(optimized, manual);
    assert_eq!(
        texts(&optimized, "b"),
        vec![Some("x".into()), Some("y".into()), Some("z".into())]
    );
    assert_eq!(ints(&optimized, "d"), vec![Some(40), Some(60), Some(80)]);
}

#[test]
fn projection_pushdown_prunes_unused_columns() {
    let lf = df().lazy().select(vec![col("a")]);
    let plan = Optimizer::optimize(lf.logical_plan(), CollectOptions::default().flags());
    let scan = match plan {
        LogicalPlan::Projection { input, .. } => input,
        other => panic!("expected a projection, got {other:?}"),
    };
    match scan.as_ref() {
        LogicalPlan::DataFrameScan { projection, .. } => {
            assert_eq!(projection.as_deref(), Some(&["a".to_string()][..]));
        }
        other => panic!("expected a scan, got {other:?}"),
    }
}

#[test]
fn head_is_pushed_into_the_scan() {
    let lf = df().lazy().head(2);
    let explained = lf.explain(true);
    assert!(explained.contains("n_rows=2"));
    let out = lf.collect_sync(CollectOptions::default()).unwrap();
    assert_eq!(ints(&out, "a"), vec![Some(1), Some(2)]);
}

#[test]
fn filters_above_a_limit_stay_above_it() {
    let lf = df().lazy().head(2).filter(col("a").gt(lit(1_i64)));
    let out = lf.collect_sync(CollectOptions::default()).unwrap();
    assert_eq!(ints(&out, "a"), vec![Some(2)]);
}

#[test]
fn fetch_caps_every_scan() {
    let out = query()
        .fetch_sync(2, CollectOptions::default())
        .unwrap();
    // Only rows a=1 and a=2 are read; the filter keeps one.
    assert_eq!(out.height(), 1);
    assert_eq!(ints(&out, "d"), vec![Some(40)]);
}
