//! End-to-end field resolution against an in-memory app

mod common;

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use apptest_model::{
    ControlCatalog, ControlRecord, EngineConfig, Error, FieldValue, InMemoryProvider, ItemPath,
    ProviderHandle, ScalarKind, ScalarValue, TypeGrammar,
};

use common::{session, test_config};

fn record(
    grammar: &TypeGrammar,
    name: &str,
    type_string: &str,
    handle: &ProviderHandle,
) -> ControlRecord {
    let record_type = grammar
        .parse(type_string)
        .and_then(|t| t.as_record().cloned())
        .expect("record type");
    ControlRecord::control(name, record_type, handle.clone())
}

fn gallery_rows() -> ItemPath {
    ItemPath::control("Gallery1").with_property_name("AllItems")
}

#[test]
fn component_child_gets_its_own_segment() {
    let (provider, handle) = session(test_config());
    let grammar = TypeGrammar::new();
    let component = record(&grammar, "Component1", "![Label1:![Text:s]]", &handle);

    let expected = ItemPath::nested("Label1", Some(Arc::new(ItemPath::control("Component1"))))
        .with_property_name("Text");
    provider.set_value(&expected, "inside component");

    let label = component.field("Label1").unwrap().into_record().unwrap();
    assert_eq!(label.name(), Some("Label1"));
    assert_eq!(label.parent_path(), Some(&ItemPath::control("Component1")));
    assert_eq!(label.scalar("Text").unwrap().as_str(), Some("inside component"));
}

#[test]
fn row_child_adds_no_segment() {
    let (provider, handle) = session(test_config());
    let grammar = TypeGrammar::new();
    let gallery = record(
        &grammar,
        "Gallery1",
        "![AllItems:*[Label1:![Text:s],Title:s]]",
        &handle,
    );
    provider.push_counts(&gallery_rows(), [2]);

    let rows = gallery.field("AllItems").unwrap().into_table().unwrap();
    let row = rows.row(1);
    assert_eq!(row.name(), None);

    let label = row.field("Label1").unwrap().into_record().unwrap();
    let row_path = gallery_rows().with_index(1);
    assert_eq!(label.parent_path(), Some(&row_path));

    let text_path =
        ItemPath::nested("Label1", Some(Arc::new(row_path.clone()))).with_property_name("Text");
    provider.set_value(&text_path, "second row");
    assert_eq!(label.scalar("Text").unwrap().as_str(), Some("second row"));

    // Scalars on the row itself are read at the indexed row path
    provider.set_value(&row_path.with_property_name("Title"), "Row title");
    assert_eq!(row.scalar("Title").unwrap().as_str(), Some("Row title"));
}

#[test]
fn nested_galleries_chain_row_paths() {
    let (provider, handle) = session(test_config());
    let grammar = TypeGrammar::new();
    let outer = record(
        &grammar,
        "Gallery1",
        "![AllItems:*[Gallery2:![AllItems:*[Label4:![Text:s]]]]]",
        &handle,
    );

    let outer_row = gallery_rows().with_index(0);
    let inner_rows =
        ItemPath::nested("Gallery2", Some(Arc::new(outer_row))).with_property_name("AllItems");
    provider.push_counts(&inner_rows, [4]);
    let leaf = ItemPath::nested("Label4", Some(Arc::new(inner_rows.with_index(3))))
        .with_property_name("Text");
    provider.set_value(&leaf, "deep");

    let inner = outer
        .field("AllItems")
        .unwrap()
        .into_table()
        .unwrap()
        .row(0)
        .field("Gallery2")
        .unwrap()
        .into_record()
        .unwrap()
        .field("AllItems")
        .unwrap()
        .into_table()
        .unwrap();

    assert_eq!(inner.count().unwrap(), 4);
    let label = inner
        .last()
        .unwrap()
        .unwrap()
        .field("Label4")
        .unwrap()
        .into_record()
        .unwrap();
    assert_eq!(label.scalar("Text").unwrap().as_str(), Some("deep"));
    assert_eq!(leaf.depth(), 3);
}

#[test]
fn untyped_gallery_row_fields() {
    let (provider, handle) = session(test_config());
    let grammar = TypeGrammar::new();
    let gallery = record(
        &grammar,
        "Gallery1",
        "![AllItems:*[Gallery2:v,Icon2:v,Label4:v]]",
        &handle,
    );
    let label_path = gallery_rows().with_index(0).with_property_name("Label4");
    provider.set_value(&label_path, r#"{"Text":"hi"}"#);

    let rows = gallery.field("AllItems").unwrap().into_table().unwrap();
    let row = rows.row(0);
    assert_eq!(
        row.scalar("Label4").unwrap(),
        ScalarValue::Untyped(serde_json::json!({"Text": "hi"}))
    );
    assert_eq!(row.scalar("Icon2").unwrap(), ScalarValue::Blank(ScalarKind::UntypedObject));
}

#[test]
fn table_field_on_row_stays_under_that_row() {
    let (provider, handle) = session(test_config());
    let grammar = TypeGrammar::new();
    let gallery = record(&grammar, "Gallery1", "![AllItems:*[Items:*[X:s],Title:s]]", &handle);
    let rows = gallery.field("AllItems").unwrap().into_table().unwrap();

    let first = rows.row(0).field("Items").unwrap().into_table().unwrap();
    let second = rows.row(1).field("Items").unwrap().into_table().unwrap();
    assert_ne!(first.source().item_path(), second.source().item_path());

    let expected = ItemPath::nested("Items", Some(Arc::new(gallery_rows().with_index(1))))
        .with_property_name("Items");
    assert_eq!(second.source().item_path(), &expected);

    // Inner rows never land on a scalar of the outer row with the same index
    let inner_row = second.row(0).parent_path().cloned().unwrap();
    assert_ne!(inner_row, gallery_rows().with_index(0).with_property_name("Items"));
    assert_eq!(inner_row, expected.with_index(0));

    provider.push_counts(first.source().item_path(), [2]);
    provider.push_counts(&expected, [7]);
    assert_eq!(first.count().unwrap(), 2);
    assert_eq!(second.count().unwrap(), 7);

    provider.set_value(&expected.with_index(0).with_property_name("X"), "inner");
    assert_eq!(second.row(0).scalar("X").unwrap().as_str(), Some("inner"));
}

#[test]
fn table_count_reflects_every_read() {
    let (provider, handle) = session(test_config());
    let grammar = TypeGrammar::new();
    let gallery = record(&grammar, "Gallery1", "![AllItems:*[Title:s]]", &handle);
    provider.push_counts(&gallery_rows(), [3, 5]);

    let rows = gallery.field("AllItems").unwrap().into_table().unwrap();
    assert_eq!(rows.count().unwrap(), 3);
    assert_eq!(rows.count().unwrap(), 5);
    assert_eq!(rows.rows().unwrap().len(), 5);
    assert_eq!(provider.calls().count_reads, 3);
}

mod dates {
    use super::*;

    const EPOCH: &str = "1700000000000";

    fn picker(handle: &ProviderHandle) -> ControlRecord {
        record(&TypeGrammar::new(), "DatePicker1", "![SelectedDate:d,Day:D]", handle)
    }

    fn path(property: &str) -> ItemPath {
        ItemPath::control("DatePicker1").with_property_name(property)
    }

    #[test]
    fn epoch_without_zone_sibling_is_utc() {
        let (provider, handle) = session(test_config());
        provider.set_value(&path("SelectedDate"), EPOCH);

        let value = picker(&handle).scalar("SelectedDate").unwrap();
        let expected = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        assert_eq!(value, ScalarValue::DateTime(expected));
        // Primary read plus the timezone sibling
        assert_eq!(provider.calls().property_reads, 2);
    }

    #[test]
    fn epoch_with_local_sibling_is_shifted() {
        let (provider, handle) = session(test_config());
        provider.set_value(&path("SelectedDate"), EPOCH);
        provider.set_value(&path("DateTimeZone"), "Local");

        let value = picker(&handle).scalar("SelectedDate").unwrap();
        let expected = Utc.with_ymd_and_hms(2023, 11, 15, 3, 13, 20).unwrap();
        assert_eq!(value, ScalarValue::DateTime(expected));

        provider.set_value(&path("Day"), EPOCH);
        let day = picker(&handle).scalar("Day").unwrap();
        assert_eq!(day.as_date().unwrap().to_string(), "2023-11-15");
    }

    #[test]
    fn failing_zone_lookup_keeps_utc() {
        let (provider, handle) = session(test_config());
        provider.set_value(&path("SelectedDate"), EPOCH);
        provider.fail_with(&path("DateTimeZone"), "boom");

        let value = picker(&handle).scalar("SelectedDate").unwrap();
        assert_eq!(value.as_datetime().unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn slow_zone_lookup_keeps_utc() {
        let config = EngineConfig {
            timeout_ms: 100,
            ..test_config()
        };
        let (provider, handle) = session(config);
        provider.set_value(&path("SelectedDate"), EPOCH);
        provider.set_value(&path("DateTimeZone"), "Local");
        provider.delay_path(&path("DateTimeZone"), Duration::from_millis(400));

        let value = picker(&handle).scalar("SelectedDate").unwrap();
        assert_eq!(value.as_datetime().unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn garbage_payload_is_coercion_error() {
        let (provider, handle) = session(test_config());
        provider.set_value(&path("SelectedDate"), "soon");

        let err = picker(&handle).scalar("SelectedDate").unwrap_err();
        assert!(matches!(err, Error::Coercion { .. }));
        assert!(!err.is_timeout());
    }
}

#[test]
fn timeout_is_distinct_from_coercion_failure() {
    common::init_tracing();
    let provider = Arc::new(InMemoryProvider::new().with_delay(Duration::from_millis(500)));
    provider.set_value(&ItemPath::control("Label1").with_property_name("Text"), "late");
    let config = EngineConfig {
        timeout_ms: 50,
        ..test_config()
    };
    let handle = ProviderHandle::with_owned_runtime(provider, config).unwrap();
    let label = record(&TypeGrammar::new(), "Label1", "![Text:s]", &handle);

    let err = label.field("Text").unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err, Error::Timeout { timeout_ms: 50, .. }));
}

#[test]
fn catalog_drives_component_resolution() {
    let (provider, handle) = session(test_config());
    let mut grammar = TypeGrammar::new();
    let catalog = ControlCatalog::from_json(
        r#"{"controls":[
            {"name":"Label1","properties":[{"propertyName":"Text","propertyType":"s"}]},
            {"name":"Component1","properties":[{"propertyName":"Label1","propertyType":"Label1"}]}
        ]}"#,
        &mut grammar,
    )
    .unwrap();

    let leaf = ItemPath::nested("Label1", Some(Arc::new(ItemPath::control("Component1"))))
        .with_property_name("Text");
    provider.set_value(&leaf, "via catalog");

    let component = catalog.record("Component1", &handle).unwrap();
    let text = match component.field("Label1").unwrap() {
        FieldValue::Record(label) => label.scalar("Text").unwrap(),
        other => panic!("expected record, got {:?}", other),
    };
    assert_eq!(text.as_str(), Some("via catalog"));
    assert!(matches!(catalog.record("Nope", &handle), Err(Error::UnknownType(_))));
}
