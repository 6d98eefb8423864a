mod common;

use alopex_frame::lazy::{AsofJoinOptions, AsofStrategy, JoinOptions, JoinType};
use alopex_frame::{CollectOptions, DataFrame, DataFrameError, LazyFrame};

use common::{f64s, frame, i64s, init_test_tracing, ints, strs, texts};

fn left() -> DataFrame {
    frame(vec![
        i64s("id", vec![Some(1), Some(2), Some(3), None]),
        strs("lv", vec![Some("a"), Some("b"), Some("c"), Some("d")]),
    ])
}

fn right() -> DataFrame {
    frame(vec![
        i64s("id", vec![Some(2), Some(3), Some(3), Some(4)]),
        i64s("rv", vec![Some(10), Some(20), Some(30), Some(40)]),
    ])
}

fn joined(how: JoinType) -> DataFrame {
    left()
        .lazy()
        .join(right().lazy(), JoinOptions::default().with_how(how).with_on(["id"]))
        .unwrap()
        .collect_sync(CollectOptions::default())
        .unwrap()
}

fn collect(lf: LazyFrame) -> DataFrame {
    lf.collect_sync(CollectOptions::default()).unwrap()
}

#[test]
fn inner_join_matches_every_pair() {
    init_test_tracing();
    let out = joined(JoinType::Inner);
    assert_eq!(out.column_names(), vec!["id", "lv", "rv"]);
    assert_eq!(ints(&out, "id"), vec![Some(2), Some(3), Some(3)]);
    assert_eq!(ints(&out, "rv"), vec![Some(10), Some(20), Some(30)]);
}

#[test]
fn left_join_keeps_unmatched_left_rows() {
    let out = joined(JoinType::Left);
    assert_eq!(out.height(), 5);
    assert_eq!(ints(&out, "id"), vec![Some(1), Some(2), Some(3), Some(3), None]);
    assert_eq!(ints(&out, "rv"), vec![None, Some(10), Some(20), Some(30), None]);
}

#[test]
fn outer_join_coalesces_keys() {
    let out = joined(JoinType::Outer);
    assert_eq!(out.column_names(), vec!["id", "lv", "rv"]);
    assert_eq!(
        ints(&out, "id"),
        vec![Some(1), Some(2), Some(3), Some(3), None, Some(4)]
    );
    assert_eq!(
        texts(&out, "lv"),
        vec![
            Some("a".into()),
            Some("b".into()),
            Some("c".into()),
            Some("c".into()),
            Some("d".into()),
            None
        ]
    );
    assert_eq!(
        ints(&out, "rv"),
        vec![None, Some(10), Some(20), Some(30), None, Some(40)]
    );
}

#[test]
fn semi_and_anti_keep_left_columns_only() {
    let semi = joined(JoinType::Semi);
    assert_eq!(semi.column_names(), vec!["id", "lv"]);
    assert_eq!(ints(&semi, "id"), vec![Some(2), Some(3)]);

    // A null key never matches, so the anti join keeps it.
    let anti = joined(JoinType::Anti);
    assert_eq!(ints(&anti, "id"), vec![Some(1), None]);
}

#[test]
fn cross_join_suffixes_colliding_names() {
    let a = frame(vec![i64s("x", vec![Some(1), Some(2)])]);
    let b = frame(vec![i64s("x", vec![Some(10), Some(20)])]);
    let out = collect(
        a.lazy()
            .join(b.lazy(), JoinOptions::default().with_how(JoinType::Cross))
            .unwrap(),
    );
    assert_eq!(out.column_names(), vec!["x", "x_right"]);
    assert_eq!(ints(&out, "x"), vec![Some(1), Some(1), Some(2), Some(2)]);
    assert_eq!(
        ints(&out, "x_right"),
        vec![Some(10), Some(20), Some(10), Some(20)]
    );
}

#[test]
fn differently_named_keys_and_custom_suffix() {
    let a = frame(vec![
        i64s("a", vec![Some(1), Some(2)]),
        i64s("v", vec![Some(5), Some(6)]),
    ]);
    let b = frame(vec![
        i64s("b", vec![Some(2), Some(1)]),
        i64s("v", vec![Some(50), Some(60)]),
    ]);
    let out = collect(
        a.lazy()
            .join(
                b.lazy(),
                JoinOptions::default()
                    .with_left_on(["a"])
                    .with_right_on(["b"])
                    .with_suffix("_r"),
            )
            .unwrap(),
    );
    assert_eq!(out.column_names(), vec!["a", "v", "v_r"]);
    assert_eq!(ints(&out, "v_r"), vec![Some(60), Some(50)]);
}

#[test]
fn key_types_are_unified_only_with_coercion() {
    let a = frame(vec![i64s("k", vec![Some(1), Some(2)])]);
    let b = frame(vec![
        f64s("k", vec![Some(2.0), Some(3.0)]),
        i64s("w", vec![Some(7), Some(8)]),
    ]);
    let lf = a
        .lazy()
        .join(b.lazy(), JoinOptions::default().with_on(["k"]))
        .unwrap();

    let out = lf.collect_sync(CollectOptions::default()).unwrap();
    assert_eq!(ints(&out, "w"), vec![Some(7)]);

    let err = lf
        .collect_sync(CollectOptions::default().with_type_coercion(false))
        .unwrap_err();
    assert!(matches!(err, DataFrameError::TypeMismatch { .. }));
}

#[test]
fn asof_join_searches_backward_and_forward() {
    let quotes = frame(vec![
        i64s("t", vec![Some(0), Some(4), Some(8)]),
        i64s("v", vec![Some(100), Some(200), Some(300)]),
    ]);
    let trades = frame(vec![
        i64s("t", vec![Some(1), Some(5), Some(10)]),
        strs("q", vec![Some("x"), Some("y"), Some("z")]),
    ]);

    let backward = collect(
        trades
            .clone()
            .lazy()
            .join_asof(quotes.clone().lazy(), AsofJoinOptions::default().with_on("t"))
            .unwrap(),
    );
    assert_eq!(backward.column_names(), vec!["t", "q", "v"]);
    assert_eq!(ints(&backward, "v"), vec![Some(100), Some(200), Some(300)]);

    let forward = collect(
        trades
            .lazy()
            .join_asof(
                quotes.lazy(),
                AsofJoinOptions::default()
                    .with_on("t")
                    .with_strategy(AsofStrategy::Forward),
            )
            .unwrap(),
    );
    assert_eq!(ints(&forward, "v"), vec![Some(200), Some(300), None]);
}

#[test]
fn asof_join_matches_within_by_groups() {
    let quotes = frame(vec![
        i64s("t", vec![Some(0), Some(1)]),
        strs("g", vec![Some("b"), Some("a")]),
        i64s("v", vec![Some(10), Some(20)]),
    ]);
    let trades = frame(vec![
        i64s("t", vec![Some(2), Some(2)]),
        strs("g", vec![Some("a"), Some("b")]),
    ]);
    let out = collect(
        trades
            .lazy()
            .join_asof(
                quotes.lazy(),
                AsofJoinOptions::default().with_on("t").with_by(["g"]),
            )
            .unwrap(),
    );
    assert_eq!(out.column_names(), vec!["t", "g", "v"]);
    assert_eq!(ints(&out, "v"), vec![Some(20), Some(10)]);
}
