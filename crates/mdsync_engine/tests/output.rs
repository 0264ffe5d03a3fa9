use chrono::{TimeZone, Utc};
use mdsync_core::{FieldValue, ImageRef, MappedRecord};
use mdsync_engine::{build_markdown_document, document_filename, image_filename, DocumentLayout};
use pretty_assertions::assert_eq;
use serde_json::{json, Number};

fn record() -> MappedRecord {
    let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let updated = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
    let mut record = MappedRecord::new("post-1", created, updated);
    record.set("title", FieldValue::Text("Hello: \"World\"".into()));
    record.set("count", FieldValue::Number(Number::from(21)));
    record.set("draft", FieldValue::Bool(false));
    record.set("tags", FieldValue::Object(json!(["a", "b"])));
    record.set(
        "hero",
        FieldValue::Image(ImageRef {
            src: "images/hero.png".into(),
            remote_url: "https://cdn.example.com/hero.png".into(),
            width: Some(640),
            height: Some(480),
        }),
    );
    record.set("body", FieldValue::Markdown("# Heading\n\nText\n".into()));
    record
}

#[test]
fn document_has_front_matter_then_body() {
    let layout = DocumentLayout {
        base_fields: true,
        position_field: Some("position".into()),
        body: Some("body".into()),
    };
    let doc = build_markdown_document(&record(), Some(7), &layout);
    assert_eq!(
        doc,
        "---\n\
         id: \"post-1\"\n\
         createdAt: \"2024-01-02T03:04:05.000Z\"\n\
         updatedAt: \"2024-02-03T04:05:06.000Z\"\n\
         position: 7\n\
         title: \"Hello: \\\"World\\\"\"\n\
         count: 21\n\
         draft: false\n\
         tags: [\"a\",\"b\"]\n\
         hero: {\"height\":480,\"src\":\"images/hero.png\",\"width\":640}\n\
         ---\n\
         \n\
         # Heading\n\
         \n\
         Text\n"
    );
}

#[test]
fn base_fields_and_position_can_be_disabled() {
    let layout = DocumentLayout {
        base_fields: false,
        position_field: None,
        body: None,
    };
    let doc = build_markdown_document(&record(), Some(7), &layout);
    assert!(doc.starts_with("---\nid: \"post-1\"\ntitle: "));
    assert!(!doc.contains("createdAt"));
    assert!(!doc.contains("position"));
    assert!(doc.contains("body: \"# Heading\\n\\nText\\n\""));
    assert!(doc.ends_with("---\n"));
}

#[test]
fn document_names_follow_the_id() {
    assert_eq!(document_filename("post-1"), "post-1.md");
    assert_eq!(document_filename("con"), "con_.md");
}

#[test]
fn image_names_are_deterministic_and_safe() {
    let url = "https://cdn.example.com/a/b/photo.JPEG?w=100";
    assert_eq!(image_filename(url, Some("My: Photo?")), "My_Photo.jpeg");
    assert_eq!(image_filename(url, None), image_filename(url, None));
    assert!(image_filename(url, None).ends_with(".jpeg"));
    assert_eq!(image_filename("https://e.com/noext", Some("x")), "x");
    assert_eq!(image_filename(url, Some("LPT1")), "LPT1_.jpeg");
}
