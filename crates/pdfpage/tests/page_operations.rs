//! Integration tests for page-level operations.
//!
//! Each test builds a small document in memory and drives it through
//! [`PageObjectHelper`], checking the resulting page dictionary.

mod common;

use common::Fixture;
use lopdf::{Dictionary, Object, dictionary};
use pdfpage::{PageError, PageObjectHelper, ResourceKind, WarningCode};

// ─── Content streams ────────────────────────────────────────────────────────

#[test]
fn coalesce_joins_fragments_with_newline() {
    let mut fx = Fixture::new();
    let page_id = fx.page_with_fragments(&[b"q 1 0 0 1 0 0 cm", b"Q"], Dictionary::new());
    let mut page = PageObjectHelper::new(page_id);

    assert!(page.coalesce_content_streams(&mut fx.doc).unwrap());

    let streams = page.get_page_contents(&fx.doc).unwrap();
    assert_eq!(streams.len(), 1);
    assert!(streams[0].id.is_some());
    assert_eq!(
        streams[0].decoded_bytes().unwrap(),
        b"q 1 0 0 1 0 0 cm\nQ".to_vec()
    );
    assert!(matches!(
        fx.page_dict(page_id).get(b"Contents"),
        Ok(Object::Reference(_))
    ));
}

#[test]
fn coalesce_is_idempotent() {
    let mut fx = Fixture::new();
    let page_id = fx.page_with_fragments(&[b"BT", b"ET"], Dictionary::new());
    let mut page = PageObjectHelper::new(page_id);

    assert!(page.coalesce_content_streams(&mut fx.doc).unwrap());
    let contents = fx.page_dict(page_id).get(b"Contents").unwrap().clone();
    let object_count = fx.doc.objects.len();

    assert!(!page.coalesce_content_streams(&mut fx.doc).unwrap());
    assert_eq!(fx.page_dict(page_id).get(b"Contents").unwrap(), &contents);
    assert_eq!(fx.doc.objects.len(), object_count);
}

#[test]
fn add_first_to_single_stream_page() {
    let mut fx = Fixture::new();
    let s0 = fx.stream(b"0 0 m 10 10 l S");
    let page_id = fx.page(dictionary! { "Contents" => s0 });
    let mut page = PageObjectHelper::new(page_id);

    let new_id = page
        .add_page_contents_bytes(&mut fx.doc, b"q".to_vec(), true)
        .unwrap();

    let contents = fx.page_dict(page_id).get(b"Contents").unwrap();
    assert_eq!(
        contents,
        &Object::Array(vec![Object::Reference(new_id), Object::Reference(s0)])
    );
    assert_eq!(
        page.content_bytes(&fx.doc).unwrap(),
        b"q\n0 0 m 10 10 l S".to_vec()
    );
}

#[test]
fn add_last_appends() {
    let mut fx = Fixture::new();
    let page_id = fx.page_with_fragments(&[b"q", b"1 w"], Dictionary::new());
    let extra = fx.stream(b"Q");
    let mut page = PageObjectHelper::new(page_id);

    page.add_page_contents(&mut fx.doc, extra, false).unwrap();

    let ids: Vec<_> = page
        .get_page_contents(&fx.doc)
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[2], Some(extra));
}

#[test]
fn add_non_stream_is_rejected() {
    let mut fx = Fixture::new();
    let page_id = fx.page_with_fragments(&[b"q Q"], Dictionary::new());
    let not_a_stream = fx.doc.add_object(dictionary! { "Type" => "Font" });
    let before = fx.page_dict(page_id).clone();
    let mut page = PageObjectHelper::new(page_id);

    let err = page
        .add_page_contents(&mut fx.doc, not_a_stream, true)
        .unwrap_err();
    assert!(matches!(err, PageError::InvalidArgument(_)));
    assert_eq!(fx.page_dict(page_id), &before);
}

#[test]
fn non_stream_array_element_is_warned() {
    let mut fx = Fixture::new();
    let s0 = fx.stream(b"q");
    let s1 = fx.stream(b"Q");
    let page_id = fx.page(dictionary! {
        "Contents" => vec![Object::Reference(s0), Object::Integer(5), Object::Reference(s1)],
    });
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.content_bytes(&fx.doc).unwrap(), b"q\nQ".to_vec());
    assert_eq!(page.warnings().len(), 1);
    assert_eq!(page.warnings()[0].code, WarningCode::NonStreamContent);
}

#[test]
fn strict_mode_turns_warnings_into_errors() {
    let mut fx = Fixture::new();
    let s0 = fx.stream(b"q");
    let page_id = fx.page(dictionary! {
        "Contents" => vec![Object::Reference(s0), Object::Null],
    });
    let mut page = PageObjectHelper::with_options(page_id, pdfpage::ContentOptions::strict());

    let err = page.content_bytes(&fx.doc).unwrap_err();
    assert!(matches!(err, PageError::StructuralAnomaly(_)));
}

#[test]
fn oversized_content_is_refused() {
    let mut fx = Fixture::new();
    let page_id = fx.page_with_fragments(&[&[b' '; 64], &[b' '; 64]], Dictionary::new());
    let options = pdfpage::ContentOptions {
        max_content_bytes: 100,
        ..Default::default()
    };
    let mut page = PageObjectHelper::with_options(page_id, options);

    match page.content_bytes(&fx.doc).unwrap_err() {
        PageError::ResourceLimitExceeded {
            limit_value,
            actual_value,
            ..
        } => {
            assert_eq!(limit_value, 100);
            assert_eq!(actual_value, 129);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ─── Resources ──────────────────────────────────────────────────────────────

fn page_with_three_images(fx: &mut Fixture, content: &[u8]) -> lopdf::ObjectId {
    let im1 = fx.image(2, 2);
    let im2 = fx.image(2, 2);
    let im3 = fx.image(2, 2);
    let contents = fx.stream(content);
    fx.page(dictionary! {
        "Contents" => contents,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im1" => im1, "Im2" => im2, "Im3" => im3 },
        },
    })
}

#[test]
fn unreferenced_xobject_is_removed() {
    let mut fx = Fixture::new();
    let page_id = page_with_three_images(
        &mut fx,
        b"q 10 0 0 10 0 0 cm /Im1 Do Q q 10 0 0 10 20 0 cm /Im3 Do Q",
    );
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.remove_unreferenced_resources(&mut fx.doc).unwrap(), 1);
    assert_eq!(fx.resource_names(page_id, "XObject"), vec!["Im1", "Im3"]);
}

#[test]
fn pruning_twice_removes_nothing_more() {
    let mut fx = Fixture::new();
    let page_id = page_with_three_images(&mut fx, b"/Im2 Do");
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.remove_unreferenced_resources(&mut fx.doc).unwrap(), 2);
    assert_eq!(page.remove_unreferenced_resources(&mut fx.doc).unwrap(), 0);
    assert_eq!(fx.resource_names(page_id, "XObject"), vec!["Im2"]);
}

#[test]
fn pruning_keeps_every_kind_in_use() {
    let mut fx = Fixture::new();
    let font = fx.doc.add_object(dictionary! { "Type" => "Font", "Subtype" => "Type1" });
    let gs = fx.doc.add_object(dictionary! { "Type" => "ExtGState", "CA" => 1 });
    let contents = fx.stream(
        b"/GS1 gs /CS0 cs /P0 scn /Sh0 sh /OC /MC0 BDC BT /F1 12 Tf (x) Tj ET EMC",
    );
    let page_id = fx.page(dictionary! {
        "Contents" => contents,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font, "F2" => font },
            "ExtGState" => dictionary! { "GS1" => gs, "GS2" => gs },
            "ColorSpace" => dictionary! { "CS0" => "DeviceRGB", "CS1" => "DeviceCMYK" },
            "Pattern" => dictionary! { "P0" => Object::Null },
            "Shading" => dictionary! { "Sh0" => Object::Null },
            "Properties" => dictionary! { "MC0" => Dictionary::new(), "MC1" => Dictionary::new() },
        },
    });
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.remove_unreferenced_resources(&mut fx.doc).unwrap(), 4);
    assert_eq!(fx.resource_names(page_id, "Font"), vec!["F1"]);
    assert_eq!(fx.resource_names(page_id, "ExtGState"), vec!["GS1"]);
    assert_eq!(fx.resource_names(page_id, "ColorSpace"), vec!["CS0"]);
    assert_eq!(fx.resource_names(page_id, "Pattern"), vec!["P0"]);
    assert_eq!(fx.resource_names(page_id, "Shading"), vec!["Sh0"]);
    assert_eq!(fx.resource_names(page_id, "Properties"), vec!["MC0"]);
}

#[test]
fn shared_resources_are_not_modified() {
    let mut fx = Fixture::new();
    let im1 = fx.image(1, 1);
    let im2 = fx.image(1, 1);
    let shared = fx.doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im1" => im1, "Im2" => im2 },
    });
    let c1 = fx.stream(b"/Im1 Do");
    let c2 = fx.stream(b"/Im2 Do");
    let p1 = fx.page(dictionary! { "Contents" => c1, "Resources" => shared });
    let p2 = fx.page(dictionary! { "Contents" => c2, "Resources" => shared });

    let mut page = PageObjectHelper::new(p1);
    assert_eq!(page.remove_unreferenced_resources(&mut fx.doc).unwrap(), 1);

    assert_eq!(fx.resource_names(p1, "XObject"), vec!["Im1"]);
    assert_eq!(fx.resource_names(p2, "XObject"), vec!["Im1", "Im2"]);
    assert!(matches!(
        fx.page_dict(p2).get(b"Resources"),
        Ok(Object::Reference(id)) if *id == shared
    ));
}

#[test]
fn malformed_content_disables_pruning() {
    let mut fx = Fixture::new();
    let page_id = page_with_three_images(&mut fx, b"/Im1 Do <zz> /Im2 Do");
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.remove_unreferenced_resources(&mut fx.doc).unwrap(), 0);
    assert_eq!(fx.resource_names(page_id, "XObject").len(), 3);
    assert!(
        page.warnings()
            .iter()
            .any(|w| w.code == WarningCode::MalformedContents)
    );
}

#[test]
fn referenced_resources_reports_names() {
    let mut fx = Fixture::new();
    let page_id = fx.page_with_fragments(
        &[b"BT /F1 9 Tf ET", b"BI /W 1 /H 1 /CS /Indexed0 /BPC 8 ID \x00 EI /Im9 Do"],
        Dictionary::new(),
    );
    let mut page = PageObjectHelper::new(page_id);

    let usage = page.referenced_resources(&fx.doc).unwrap();
    assert!(usage.contains(ResourceKind::Font, "F1"));
    assert!(usage.contains(ResourceKind::ColorSpace, "Indexed0"));
    assert!(usage.contains(ResourceKind::XObject, "Im9"));
    assert_eq!(usage.len(), 3);
}

// ─── Rotation ───────────────────────────────────────────────────────────────

#[test]
fn rotate_non_multiple_of_90_is_rejected() {
    let mut fx = Fixture::new();
    let page_id = fx.page(dictionary! { "Rotate" => 90 });
    let before = fx.page_dict(page_id).clone();
    let mut page = PageObjectHelper::new(page_id);

    let err = page.rotate_page(&mut fx.doc, 45, true).unwrap_err();
    assert!(matches!(err, PageError::InvalidArgument(_)));
    assert_eq!(fx.page_dict(page_id), &before);
}

#[test]
fn four_quarter_turns_restore_rotation() {
    let mut fx = Fixture::new();
    let page_id = fx.page(dictionary! { "Rotate" => 270 });
    let mut page = PageObjectHelper::new(page_id);

    let seen: Vec<i64> = (0..4)
        .map(|_| page.rotate_page(&mut fx.doc, 90, true).unwrap())
        .collect();
    assert_eq!(seen, vec![0, 90, 180, 270]);
    assert_eq!(page.page_rotation(&fx.doc).unwrap(), 270);
}

#[test]
fn absolute_rotation_normalizes() {
    let mut fx = Fixture::new();
    let page_id = fx.page(Dictionary::new());
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.rotate_page(&mut fx.doc, -90, false).unwrap(), 270);
    assert_eq!(fx.page_dict(page_id).get(b"Rotate").unwrap(), &Object::Integer(270));
}

#[test]
fn rotation_is_inherited_from_page_tree() {
    let mut fx = Fixture::new();
    fx.doc
        .get_object_mut(fx.pages_id)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Rotate", 180);
    let page_id = fx.page(Dictionary::new());
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.page_rotation(&fx.doc).unwrap(), 180);
    assert_eq!(page.rotate_page(&mut fx.doc, 90, true).unwrap(), 270);
    assert_eq!(fx.page_dict(page_id).get(b"Rotate").unwrap(), &Object::Integer(270));
}

#[test]
fn invalid_stored_rotation_reads_as_zero() {
    let mut fx = Fixture::new();
    let page_id = fx.page(dictionary! { "Rotate" => 33 });
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.page_rotation(&fx.doc).unwrap(), 0);
    assert_eq!(page.warnings()[0].code, WarningCode::MalformedRotation);
}

// ─── Annotations and images ─────────────────────────────────────────────────

#[test]
fn annotations_by_subtype() {
    let mut fx = Fixture::new();
    let link = fx.doc.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Link" });
    let widget = fx.doc.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Widget" });
    let page_id = fx.page(dictionary! {
        "Annots" => vec![Object::Reference(link), Object::Reference(widget)],
    });
    let mut page = PageObjectHelper::new(page_id);

    assert_eq!(page.get_annotations(&fx.doc, "").unwrap().len(), 2);
    let widgets = page.get_annotations(&fx.doc, "Widget").unwrap();
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0].id, Some(widget));
    assert!(page.get_annotations(&fx.doc, "Popup").unwrap().is_empty());
}

#[test]
fn images_skip_form_xobjects() {
    let mut fx = Fixture::new();
    let image = fx.image(3, 1);
    let form = fx.doc.add_object(lopdf::Stream::new(
        dictionary! { "Type" => "XObject", "Subtype" => "Form" },
        b"0 0 m".to_vec(),
    ));
    let page_id = fx.page(dictionary! {
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image, "Fm0" => form },
        },
    });
    let mut page = PageObjectHelper::new(page_id);

    let images = page.get_page_images(&fx.doc).unwrap();
    assert_eq!(images.keys().collect::<Vec<_>>(), vec!["Im0"]);
    assert_eq!(images["Im0"].id, Some(image));
    assert_eq!(images["Im0"].decoded_bytes().unwrap().len(), 3);
}
