use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, TimeZone, Utc};
use docfilter_core::{
    CatalogBuilder, CompareOp, Expr, FieldCatalog, FilterError, SqlType, TextOp, Value, ValueKind,
};
use docfilter_storage::{InMemoryStore, Storage, StoreError};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

fn t() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn utc_text(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap()
}

fn date_store(kind: ValueKind, duplicate: bool) -> InMemoryStore {
    let catalog = CatalogBuilder::new()
        .document("DateClass", |d| {
            let d = d.field("DateTimeField", kind);
            if duplicate {
                d.duplicate("DateTimeField")
            } else {
                d
            }
        })
        .build()
        .unwrap();
    InMemoryStore::new(Arc::new(catalog))
}

fn seed_utc(store: &InMemoryStore) {
    for delta in [0, 5, -5] {
        let stamp = t() + Duration::minutes(delta);
        store
            .put("DateClass", json!({ "DateTimeField": utc_text(stamp) }))
            .unwrap();
    }
}

fn now_ge_field(now: impl Into<Value>) -> Expr {
    Expr::cmp_literal(now, CompareOp::Ge, "DateTimeField")
}

fn ids(docs: Vec<docfilter_storage::StoredDocument>) -> BTreeSet<String> {
    docs.into_iter().map(|d| d.id).collect()
}

#[test]
fn utc_field_extracted_from_json_matches_two() {
    let store = date_store(ValueKind::DatetimeUtc, false);
    seed_utc(&store);
    let count = store.count("DateClass", Some(&now_ge_field(t()))).unwrap();
    assert_eq!(count, 2);
}

#[test]
fn utc_field_as_duplicated_column_matches_two() {
    let store = date_store(ValueKind::DatetimeUtc, true);
    seed_utc(&store);
    let count = store.count("DateClass", Some(&now_ge_field(t()))).unwrap();
    assert_eq!(count, 2);
}

#[test]
fn utc_field_normalizes_literals_of_any_zone_kind() {
    for duplicate in [false, true] {
        let store = date_store(ValueKind::DatetimeUtc, duplicate);
        seed_utc(&store);
        let expected = ids(store.query("DateClass", Some(&now_ge_field(t()))).unwrap());
        assert_eq!(expected.len(), 2);

        let literals = vec![
            Value::from(t().with_timezone(&offset(2))),
            Value::from(t().with_timezone(&offset(-5))),
            Value::from(t().naive_utc()),
        ];
        for literal in literals {
            let got = ids(
                store
                    .query("DateClass", Some(&now_ge_field(literal.clone())))
                    .unwrap(),
            );
            assert_eq!(got, expected, "literal {:?} duplicate={}", literal, duplicate);
        }
    }
}

#[test]
fn offset_field_compares_on_the_instant() {
    for duplicate in [false, true] {
        let store = date_store(ValueKind::DatetimeOffset, duplicate);
        let stored = t().with_timezone(&offset(3));
        store
            .put("DateClass", json!({ "DateTimeField": stored.to_rfc3339() }))
            .unwrap();

        // same instant written with a different offset
        let now = t().with_timezone(&offset(-4));
        assert_eq!(store.count("DateClass", Some(&now_ge_field(now))).unwrap(), 1);

        let earlier = now - Duration::seconds(1);
        assert_eq!(
            store
                .count("DateClass", Some(&now_ge_field(earlier)))
                .unwrap(),
            0,
            "duplicate={}",
            duplicate
        );
    }
}

#[test]
fn offset_field_matches_all_but_the_future_one() {
    for duplicate in [false, true] {
        let store = date_store(ValueKind::DatetimeOffset, duplicate);
        for delta in [0, 5, -5] {
            let stamp = (t() + Duration::minutes(delta)).with_timezone(&offset(1));
            store
                .put("DateClass", json!({ "DateTimeField": stamp.to_rfc3339() }))
                .unwrap();
        }
        assert_eq!(store.count("DateClass", Some(&now_ge_field(t()))).unwrap(), 2);
    }
}

#[test]
fn unknown_property_fails_before_emission() {
    let store = date_store(ValueKind::DatetimeUtc, false);
    seed_utc(&store);
    let expr = Expr::and([
        now_ge_field(t()),
        Expr::cmp_literal(t(), CompareOp::Ge, "NoSuchField"),
    ]);

    let err = store
        .translator()
        .where_clause("DateClass", Some(&expr))
        .unwrap_err();
    assert_eq!(
        err,
        FilterError::UnknownField {
            doc_type: "DateClass".into(),
            path: "NoSuchField".into()
        }
    );
    assert!(matches!(
        store.query("DateClass", Some(&expr)),
        Err(StoreError::Filter(FilterError::UnknownField { .. }))
    ));
}

fn mixed_catalog(duplicate: bool) -> FieldCatalog {
    CatalogBuilder::new()
        .document("Order", |d| {
            let d = d
                .field("Name", ValueKind::String)
                .field("Qty", ValueKind::Integer)
                .field("Price", ValueKind::Float)
                .field("Paid", ValueKind::Boolean)
                .field("Placed", ValueKind::DatetimeUtc)
                .field("Due", ValueKind::DatetimeOffset)
                .field("Local", ValueKind::DatetimeNaive)
                .field("Customer.City", ValueKind::String)
                .field("Ref", ValueKind::Uuid)
                .field("Flag", ValueKind::Boolean)
                .field("Rank", ValueKind::Integer);
            if duplicate {
                d.duplicate("Name")
                    .duplicate("Qty")
                    .duplicate("Price")
                    .duplicate("Paid")
                    .duplicate_as("Placed", "placed", SqlType::TimestampTz)
                    .duplicate("Due")
                    .duplicate("Local")
                    .duplicate("Customer.City")
                    .duplicate_as("Ref", "ref", SqlType::Text)
                    .duplicate_as("Flag", "flag", SqlType::Text)
                    .duplicate_as("Rank", "rank", SqlType::Integer)
            } else {
                d
            }
        })
        .build()
        .unwrap()
}

fn order_bodies() -> Vec<serde_json::Value> {
    let ids = [
        "6f1c3a1e-8a7b-4c55-9a1e-000000000001",
        "6f1c3a1e-8a7b-4c55-9a1e-000000000002",
        "6f1c3a1e-8a7b-4c55-9a1e-000000000003",
        "6f1c3a1e-8a7b-4c55-9a1e-000000000004",
    ];
    vec![
        json!({"Id": ids[0], "Name": "apple", "Qty": 3, "Price": 1.5, "Paid": true,
               "Placed": utc_text(t()), "Due": (t() + Duration::hours(1)).with_timezone(&offset(2)).to_rfc3339(),
               "Local": "2026-03-01T09:00:00", "Customer": {"City": "Oslo"},
               "Ref": "6F1C3A1E-8A7B-4C55-9A1E-0000000000AA", "Flag": "True", "Rank": 4}),
        json!({"Id": ids[1], "Name": "banana_50%", "Qty": 12, "Price": 0.25, "Paid": false,
               "Placed": utc_text(t() - Duration::days(1)), "Due": t().with_timezone(&offset(-3)).to_rfc3339(),
               "Local": "2026-03-01T18:30:00", "Customer": {"City": "Lima"},
               "Ref": "6f1c3a1e-8a7b-4c55-9a1e-0000000000bb", "Flag": false, "Rank": "2147483647"}),
        json!({"Id": ids[2], "Name": "Cherry", "Qty": null, "Price": 10, "Paid": true,
               "Placed": utc_text(t() + Duration::minutes(1)), "Due": null,
               "Local": null, "Customer": {}}),
        json!({"Id": ids[3], "Name": null, "Qty": 7, "Paid": false,
               "Placed": null, "Due": (t() - Duration::hours(2)).to_rfc3339()}),
    ]
}

fn predicates() -> Vec<Expr> {
    vec![
        Expr::cmp("Qty", CompareOp::Gt, 5),
        Expr::cmp("Qty", CompareOp::Ne, 3),
        Expr::not(Expr::cmp("Qty", CompareOp::Gt, 5)),
        Expr::cmp("Price", CompareOp::Le, 1.5),
        Expr::eq("Paid", true),
        Expr::eq("Name", Value::Null),
        Expr::is_in("Name", [Value::from("apple"), Value::Null]),
        Expr::In {
            field: "Qty".into(),
            values: vec![Value::from(3), Value::from(7)],
            negated: true,
        },
        Expr::between("Placed", t() - Duration::hours(1), t() + Duration::hours(1)),
        Expr::cmp_literal(t().with_timezone(&offset(5)), CompareOp::Ge, "Placed"),
        Expr::cmp("Due", CompareOp::Lt, t() + Duration::minutes(30)),
        Expr::cmp(
            "Local",
            CompareOp::Lt,
            t().naive_utc(), // 12:00 wall clock
        ),
        Expr::text("Name", TextOp::Contains, "_50%"),
        Expr::Text {
            field: "Name".into(),
            text_op: TextOp::StartsWith,
            value: "CH".into(),
            case_insensitive: true,
        },
        Expr::eq("Customer.City", "Oslo"),
        Expr::cmp_fields("Placed", CompareOp::Lt, "Due"),
        Expr::or([
            Expr::and([Expr::eq("Paid", false), Expr::cmp("Qty", CompareOp::Ge, 7)]),
            Expr::is_null("Due"),
        ]),
        Expr::eq("Ref", ref_aa()),
        Expr::is_in("Ref", ["6f1c3a1e-8a7b-4c55-9a1e-0000000000bb", "6F1C3A1E-8A7B-4C55-9A1E-0000000000AA"]),
        Expr::eq("Flag", true),
        Expr::eq("Flag", false),
        Expr::cmp("Rank", CompareOp::Lt, 5_000_000_000i64),
        Expr::cmp("Rank", CompareOp::Gt, 5_000_000_000i64),
        Expr::And { args: vec![] },
    ]
}

fn ref_aa() -> uuid::Uuid {
    uuid::Uuid::parse_str("6f1c3a1e-8a7b-4c55-9a1e-0000000000aa").unwrap()
}

#[test]
fn json_and_duplicated_storage_return_identical_results() {
    let json_store = InMemoryStore::new(Arc::new(mixed_catalog(false)));
    let dup_store = InMemoryStore::new(Arc::new(mixed_catalog(true)));
    for body in order_bodies() {
        json_store.put("Order", body.clone()).unwrap();
        dup_store.put("Order", body).unwrap();
    }
    for expr in predicates() {
        let a = ids(json_store.query("Order", Some(&expr)).unwrap());
        let b = ids(dup_store.query("Order", Some(&expr)).unwrap());
        assert_eq!(a, b, "predicate {:?}", expr);
    }
}

#[test]
fn spot_check_result_sets() {
    let store = InMemoryStore::new(Arc::new(mixed_catalog(true)));
    for body in order_bodies() {
        store.put("Order", body).unwrap();
    }
    let count = |expr: Expr| store.count("Order", Some(&expr)).unwrap();

    // NULL Qty is neither > 5 nor NOT > 5
    assert_eq!(count(Expr::cmp("Qty", CompareOp::Gt, 5)), 2);
    assert_eq!(count(Expr::not(Expr::cmp("Qty", CompareOp::Gt, 5))), 1);
    assert_eq!(count(Expr::eq("Name", Value::Null)), 1);
    assert_eq!(count(Expr::text("Name", TextOp::Contains, "_50%")), 1);
    assert_eq!(count(Expr::And { args: vec![] }), 4);
    assert_eq!(count(Expr::is_in("Qty", Vec::<Value>::new())), 0);

    // text columns compare the canonical spelling, not what the body carried
    assert_eq!(count(Expr::eq("Ref", ref_aa())), 1);
    assert_eq!(count(Expr::eq("Flag", true)), 1);
    assert_eq!(count(Expr::cmp("Rank", CompareOp::Lt, 5_000_000_000i64)), 2);
}

#[test]
fn offset_fields_compare_across_strategies_on_instants() {
    let catalog = CatalogBuilder::new()
        .document("Window", |d| {
            d.field("Opens", ValueKind::DatetimeOffset)
                .field("Closes", ValueKind::DatetimeOffset)
                .duplicate("Closes")
        })
        .build()
        .unwrap();
    let store = InMemoryStore::new(Arc::new(catalog));
    // wall clocks say Opens (14:00) is after Closes (13:00); instants say the opposite
    store
        .put(
            "Window",
            json!({"Opens": "2026-03-01T14:00:00+02:00", "Closes": "2026-03-01T13:00:00+00:00"}),
        )
        .unwrap();

    let before = Expr::cmp_fields("Opens", CompareOp::Lt, "Closes");
    assert_eq!(store.count("Window", Some(&before)).unwrap(), 1);
    let reversed = Expr::cmp_fields("Closes", CompareOp::Gt, "Opens");
    assert_eq!(store.count("Window", Some(&reversed)).unwrap(), 1);

    let cmd = store.translator().where_clause("Window", Some(&before)).unwrap();
    assert_eq!(
        cmd.text,
        "CAST(d.data ->> 'Opens' AS timestamp with time zone) < d.\"closes\""
    );
    assert!(cmd.parameters.is_empty());
}

#[test]
fn utc_fields_compare_across_strategies_on_instants() {
    let catalog = CatalogBuilder::new()
        .document("Shift", |d| {
            d.field("Start", ValueKind::DatetimeUtc)
                .field("Deadline", ValueKind::DatetimeOffset)
                .duplicate("Start")
        })
        .build()
        .unwrap();
    let store = InMemoryStore::new(Arc::new(catalog));
    store
        .put(
            "Shift",
            json!({"Start": "2026-03-01T12:30:00Z", "Deadline": "2026-03-01T14:00:00+02:00"}),
        )
        .unwrap();
    let expr = Expr::cmp_fields("Start", CompareOp::Gt, "Deadline");
    assert_eq!(store.count("Shift", Some(&expr)).unwrap(), 1);
}

#[test]
fn parameter_count_matches_leaves_times_operands() {
    let store = InMemoryStore::new(Arc::new(mixed_catalog(false)));
    let expr = Expr::or([
        Expr::cmp("Qty", CompareOp::Gt, 1),
        Expr::not(Expr::is_in("Name", ["a", "b", "c"])),
        Expr::between("Price", 1.0, 2.0),
        Expr::text("Name", TextOp::EndsWith, "x"),
        Expr::is_null("Due"),
        Expr::cmp_fields("Placed", CompareOp::Lt, "Due"),
    ]);
    let filter = store.translator().compile("Order", Some(&expr)).unwrap();
    let cmd = store.translator().where_clause("Order", Some(&expr)).unwrap();
    assert_eq!(filter.leaf_count(), 6);
    assert_eq!(cmd.parameters.len(), 1 + 3 + 2 + 1);
    for (i, _) in cmd.parameters.iter().enumerate() {
        assert!(cmd.text.contains(&format!("${}", i + 1)));
    }
    assert!(!cmd.text.contains("$8"));
}

#[test]
fn naive_fields_compare_wall_clocks_without_reconciliation() {
    let store = date_store(ValueKind::DatetimeNaive, true);
    store
        .put("DateClass", json!({"DateTimeField": "2026-03-01T12:00:00"}))
        .unwrap();
    // 12:00 at +02:00 is 10:00Z, but the naive field only sees 12:00
    let literal = offset(2).with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let expr = Expr::eq("DateTimeField", literal);
    assert_eq!(store.count("DateClass", Some(&expr)).unwrap(), 1);
}
