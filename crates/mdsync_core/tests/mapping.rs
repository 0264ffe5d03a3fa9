use chrono::{TimeZone, Utc};
use mdsync_core::{
    map_record, ConfigError, EnumRule, FieldKind, FieldSpec, FieldValue, MapContext,
    MappingError, MappingSpec, PositionOptions,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Number, Value};

fn ctx() -> MapContext {
    MapContext::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

fn spec(fields: Vec<FieldSpec>) -> MappingSpec {
    MappingSpec {
        fields,
        ..MappingSpec::default()
    }
}

fn map(raw: Value, spec: &MappingSpec) -> Result<mdsync_core::MappedRecord, MappingError> {
    map_record(&raw, &spec.compile().unwrap(), &ctx())
}

#[test]
fn maps_strings_and_numbers_with_base_fields() {
    let spec = spec(vec![
        FieldSpec::new("title", FieldKind::String),
        FieldSpec::new("count", FieldKind::Number),
    ]);
    let record = map(json!({"id": "idstring", "title": "Title", "count": 21}), &spec).unwrap();

    assert_eq!(record.id, "idstring");
    assert_eq!(record.created_at, ctx().now);
    assert_eq!(record.updated_at, ctx().now);
    let fields: Vec<_> = record.fields().collect();
    assert_eq!(
        fields,
        vec![
            ("title", &FieldValue::Text("Title".into())),
            ("count", &FieldValue::Number(Number::from(21))),
        ]
    );
}

#[test]
fn timestamps_come_from_the_record() {
    let spec = spec(vec![FieldSpec::new("title", FieldKind::String)]);
    let record = map(
        json!({"id": 7, "createdAt": "2023-05-01T10:00:00Z", "title": "x"}),
        &spec,
    )
    .unwrap();
    let created = Utc.with_ymd_and_hms(2023, 5, 1, 10, 0, 0).unwrap();
    assert_eq!(record.id, "7");
    assert_eq!(record.created_at, created);
    assert_eq!(record.updated_at, created);
}

#[test]
fn custom_base_field_names() {
    let mut spec = spec(vec![FieldSpec::new("title", FieldKind::String)]);
    spec.base.id = "slug".into();
    spec.base.updated_at = "modified".into();
    let record = map(
        json!({"slug": "my-post", "modified": "2024-02-02", "title": "T"}),
        &spec,
    )
    .unwrap();
    assert_eq!(record.id, "my-post");
    assert_eq!(
        record.updated_at,
        Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap()
    );
}

#[test]
fn unsafe_ids_are_rejected() {
    let spec = spec(vec![FieldSpec::new("title", FieldKind::String)]);
    for bad in ["../etc", "a/b", "a.b", "quo\"te", "it's", "[x]", "{x}", "a b", ""] {
        let err = map(json!({"id": bad, "title": "x"}), &spec).unwrap_err();
        match &err {
            MappingError::InvalidIdentifier { destination, .. } => assert_eq!(destination, "id"),
            other => panic!("unexpected error for {bad:?}: {other:?}"),
        }
        assert!(err.to_string().contains("id"));
    }
}

#[test]
fn id_kind_fields_are_validated_too() {
    let spec = spec(vec![FieldSpec::new("ref", FieldKind::Id)]);
    let record = map(json!({"id": "a", "ref": 12}), &spec).unwrap();
    assert_eq!(record.get("ref"), Some(&FieldValue::Text("12".into())));

    let err = map(json!({"id": "a", "ref": "x/y"}), &spec).unwrap_err();
    assert_eq!(err.destination(), Some("ref"));
}

#[test]
fn missing_id_falls_back_to_a_stable_hash() {
    let spec = spec(vec![FieldSpec::new("title", FieldKind::String)]);
    let first = map(json!({"title": "x"}), &spec).unwrap();
    let second = map(json!({"title": "x"}), &spec).unwrap();
    assert_eq!(first.id.len(), 16);
    assert_eq!(first.id, second.id);
    assert_ne!(first.id, map(json!({"title": "y"}), &spec).unwrap().id);
}

#[test]
fn number_kind_rejects_strings() {
    let spec = spec(vec![FieldSpec::new("count", FieldKind::Number)]);
    let err = map(json!({"id": "a", "count": "21"}), &spec).unwrap_err();
    assert_eq!(
        err,
        MappingError::TypeMismatch {
            source_field: "count".into(),
            destination: "count".into(),
            kind: "number",
            expected: "a number",
            found: "\"21\"".into(),
        }
    );
}

#[test]
fn strings_and_images_coerce_scalars() {
    let spec = spec(vec![
        FieldSpec::new("flag", FieldKind::String),
        FieldSpec::new("n", FieldKind::String).to("label"),
        FieldSpec::new("hero", FieldKind::Image {
            download: false,
            file_name_field: None,
            probe_size: false,
        }),
    ]);
    let record = map(
        json!({"id": "a", "flag": true, "n": 3.5, "hero": "https://cdn.example.com/a.png"}),
        &spec,
    )
    .unwrap();
    assert_eq!(record.get("flag"), Some(&FieldValue::Text("true".into())));
    assert_eq!(record.get("label"), Some(&FieldValue::Text("3.5".into())));
    match record.get("hero") {
        Some(FieldValue::Image(image)) => {
            assert_eq!(image.src, "https://cdn.example.com/a.png");
            assert_eq!(image.remote_url, image.src);
        }
        other => panic!("unexpected hero {other:?}"),
    }
}

#[test]
fn datetime_and_boolean_kinds() {
    let spec = spec(vec![
        FieldSpec::new("published", FieldKind::Datetime),
        FieldSpec::new("draft", FieldKind::Boolean),
    ]);
    let record = map(
        json!({"id": "a", "published": "2022-12-24", "draft": "false"}),
        &spec,
    )
    .unwrap();
    assert_eq!(
        record.get("published"),
        Some(&FieldValue::DateTime(
            Utc.with_ymd_and_hms(2022, 12, 24, 0, 0, 0).unwrap()
        ))
    );
    assert_eq!(record.get("draft"), Some(&FieldValue::Bool(false)));

    let err = map(json!({"id": "a", "published": "someday"}), &spec).unwrap_err();
    assert!(matches!(err, MappingError::TypeMismatch { kind: "datetime", .. }));

    for extreme in [json!(i64::MIN), json!(-1e30)] {
        let err = map(json!({"id": "a", "published": extreme}), &spec).unwrap_err();
        assert!(matches!(err, MappingError::TypeMismatch { kind: "datetime", .. }));
    }
}

#[test]
fn enum_rules_apply_first_match_only() {
    let spec = spec(vec![FieldSpec::new(
        "status",
        FieldKind::Enum {
            rules: vec![
                EnumRule {
                    pattern: "^pub.*$".into(),
                    replacement: "published".into(),
                },
                EnumRule {
                    pattern: "^publish$".into(),
                    replacement: "never".into(),
                },
                EnumRule {
                    pattern: "^(\\w+)-draft$".into(),
                    replacement: "draft:$1".into(),
                },
            ],
        },
    )]);
    let status = |raw: Value| {
        map(json!({"id": "a", "status": raw}), &spec)
            .unwrap()
            .get("status")
            .cloned()
    };
    assert_eq!(status(json!("publish")), Some(FieldValue::Text("published".into())));
    assert_eq!(status(json!("blog-draft")), Some(FieldValue::Text("draft:blog".into())));
    assert_eq!(status(json!("archived")), Some(FieldValue::Text("archived".into())));
    assert_eq!(status(json!(3)), Some(FieldValue::Text("3".into())));
}

#[test]
fn transforms_run_before_type_dispatch() {
    let spec = spec(vec![
        FieldSpec::new("meta", FieldKind::Number).with_transform("views | number"),
        FieldSpec::new("title", FieldKind::String)
            .to("slug")
            .with_transform("$ | slug"),
        FieldSpec::new("title", FieldKind::String),
    ]);
    let record = map(
        json!({"id": "a", "meta": {"views": "1200"}, "title": "Hello There"}),
        &spec,
    )
    .unwrap();
    assert_eq!(record.get("meta"), Some(&FieldValue::Number(Number::from(1200))));
    assert_eq!(record.get("slug"), Some(&FieldValue::Text("hello-there".into())));
    assert_eq!(record.get("title"), Some(&FieldValue::Text("Hello There".into())));
}

#[test]
fn transform_failures_are_fatal_and_name_the_field() {
    let spec = spec(vec![FieldSpec::new("tags", FieldKind::String).with_transform("$ | lower")]);
    let err = map(json!({"id": "a", "tags": ["x"]}), &spec).unwrap_err();
    match err {
        MappingError::Transform {
            source_field,
            source,
            ..
        } => {
            assert_eq!(source_field, "tags");
            assert!(source.to_string().contains("[\"x\"]"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn passthrough_copies_only_unconsumed_keys() {
    let mut spec = spec(vec![FieldSpec::new("title", FieldKind::String).to("heading")]);
    spec.passthru_unmapped = true;
    let record = map(
        json!({"id": "a", "title": "T", "extra": {"k": 1}, "createdAt": "2024-01-05", "position": 9}),
        &spec,
    )
    .unwrap();
    let names: Vec<_> = record.fields().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["heading", "extra"]);
    assert_eq!(record.get("extra"), Some(&FieldValue::Raw(json!({"k": 1}))));
}

#[test]
fn without_passthrough_unmapped_keys_are_dropped() {
    let spec = spec(vec![FieldSpec::new("title", FieldKind::String)]);
    let record = map(json!({"id": "a", "title": "T", "extra": 1}), &spec).unwrap();
    assert!(!record.contains("extra"));
}

#[test]
fn null_and_absent_fields_are_skipped() {
    let spec = spec(vec![
        FieldSpec::new("title", FieldKind::String),
        FieldSpec::new("body", FieldKind::Richtext {
            mode: Default::default(),
            embed_images: Vec::new(),
        }),
    ]);
    let record = map(json!({"id": "a", "title": null}), &spec).unwrap();
    assert!(record.is_empty());
}

#[test]
fn richtext_requires_html_strings() {
    let spec = spec(vec![FieldSpec::new("body", FieldKind::Richtext {
        mode: Default::default(),
        embed_images: Vec::new(),
    })]);
    let record = map(json!({"id": "a", "body": "<p>x</p>"}), &spec).unwrap();
    assert_eq!(record.get("body"), Some(&FieldValue::RichText("<p>x</p>".into())));
    assert!(map(json!({"id": "a", "body": {"nodeType": "document"}}), &spec).is_err());
}

#[test]
fn mapping_is_idempotent() {
    let mut spec = spec(vec![
        FieldSpec::new("title", FieldKind::String),
        FieldSpec::new("tags", FieldKind::Object),
    ]);
    spec.passthru_unmapped = true;
    let raw = json!({"id": "a", "title": "T", "tags": ["x"], "other": [1, 2]});
    let compiled = spec.compile().unwrap();
    let first = map_record(&raw, &compiled, &ctx()).unwrap();
    let second = map_record(&raw, &compiled, &ctx()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn non_object_records_are_rejected() {
    let spec = spec(vec![FieldSpec::new("title", FieldKind::String)]);
    assert!(matches!(
        map(json!(["not", "a", "record"]), &spec),
        Err(MappingError::NotAnObject { .. })
    ));
}

#[test]
fn compile_rejects_malformed_specifications() {
    assert!(matches!(MappingSpec::default().compile(), Err(ConfigError::EmptyMapping)));

    let duplicate = spec(vec![
        FieldSpec::new("a", FieldKind::String).to("x"),
        FieldSpec::new("b", FieldKind::String).to("x"),
    ]);
    assert!(matches!(duplicate.compile(), Err(ConfigError::DuplicateDestination(ref d)) if d == "x"));

    let reserved = spec(vec![FieldSpec::new("created", FieldKind::String).to("createdAt")]);
    assert!(matches!(reserved.compile(), Err(ConfigError::ReservedDestination(_))));

    let position_clash = spec(vec![FieldSpec::new("order", FieldKind::Number).to("position")]);
    assert!(matches!(position_clash.compile(), Err(ConfigError::ReservedDestination(_))));

    let mut no_position = position_clash.clone();
    no_position.position = PositionOptions {
        field: None,
        start: 0,
    };
    assert!(no_position.compile().is_ok());

    let bad_name = spec(vec![FieldSpec::new("a", FieldKind::String).to("has space")]);
    assert!(matches!(bad_name.compile(), Err(ConfigError::InvalidDestination { .. })));

    let bad_regex = spec(vec![FieldSpec::new(
        "s",
        FieldKind::Enum {
            rules: vec![EnumRule {
                pattern: "(".into(),
                replacement: "x".into(),
            }],
        },
    )]);
    assert!(matches!(bad_regex.compile(), Err(ConfigError::InvalidPattern { .. })));

    let bad_expr = spec(vec![FieldSpec::new("a", FieldKind::String).with_transform("a |")]);
    assert!(matches!(bad_expr.compile(), Err(ConfigError::InvalidExpression { .. })));

    let mut bad_body = spec(vec![FieldSpec::new("count", FieldKind::Number)]);
    bad_body.body = Some("count".into());
    assert!(matches!(bad_body.compile(), Err(ConfigError::InvalidBody(_))));

    let bad_image_name = spec(vec![FieldSpec::new(
        "hero",
        FieldKind::Image {
            download: true,
            file_name_field: Some("slug".into()),
            probe_size: false,
        },
    )]);
    assert!(matches!(
        bad_image_name.compile(),
        Err(ConfigError::UnknownFileNameField { .. })
    ));
}

#[test]
fn downloaded_images_cannot_share_a_file_name_field() {
    let image = |source: &str, download: bool| {
        FieldSpec::new(
            source,
            FieldKind::Image {
                download,
                file_name_field: Some("slug".into()),
                probe_size: false,
            },
        )
    };
    let shared = spec(vec![
        FieldSpec::new("slug", FieldKind::String),
        image("hero", true),
        image("thumb", true),
    ]);
    match shared.compile() {
        Err(ConfigError::SharedFileNameField { first, second, name }) => {
            assert_eq!((first.as_str(), second.as_str(), name.as_str()), ("hero", "thumb", "slug"));
        }
        other => panic!("expected a shared file name error, got {other:?}"),
    }

    let linked_only = spec(vec![
        FieldSpec::new("slug", FieldKind::String),
        image("hero", true),
        image("thumb", false),
    ]);
    assert!(linked_only.compile().is_ok());
}

#[test]
fn specifications_deserialize_from_json() {
    let spec: MappingSpec = serde_json::from_value(json!({
        "fields": [
            {"source": "title", "kind": "string"},
            {"source": "status", "kind": {"enum": {"rules": [{"pattern": "^d$", "replacement": "draft"}]}}},
            {"source": "hero", "destination": "image", "kind": {"image": {"download": true}}},
            {"source": "content", "kind": {"richtext": {"embed_images": [
                {"base_url": "https://cdn.example.com/", "attributes": ["width"], "style": "block"}
            ]}}}
        ],
        "passthru_unmapped": true,
        "body": "content",
        "position": {"field": "order", "start": 1}
    }))
    .unwrap();
    assert!(spec.base_fields);
    assert_eq!(spec.fields[2].destination(), "image");
    assert_eq!(spec.position.start, 1);
    assert!(spec.compile().is_ok());
}
