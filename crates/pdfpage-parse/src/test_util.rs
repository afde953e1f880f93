//! In-memory document builders shared by unit tests.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// A document with an empty page tree; returns the `/Pages` id.
pub(crate) fn new_doc() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    (doc, pages_id)
}

/// Add a page under `pages_id` with `extra` entries merged in.
pub(crate) fn add_page(doc: &mut Document, pages_id: ObjectId, extra: Dictionary) -> ObjectId {
    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    for (key, value) in extra.iter() {
        page.set(key.clone(), value.clone());
    }
    let page_id = doc.add_object(page);
    if let Ok(Object::Dictionary(pages)) = doc.get_object_mut(pages_id) {
        let mut kids = pages
            .get(b"Kids")
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default();
        kids.push(page_id.into());
        let count = kids.len() as i64;
        pages.set("Kids", kids);
        pages.set("Count", count);
    }
    page_id
}

/// Add an unfiltered stream object.
pub(crate) fn add_stream(doc: &mut Document, bytes: &[u8]) -> ObjectId {
    doc.add_object(Stream::new(Dictionary::new(), bytes.to_vec()))
}

/// A one-page document whose contents are `fragments`: a single reference
/// for one fragment, an array of references otherwise.
pub(crate) fn page_with_contents(fragments: &[&[u8]]) -> (Document, ObjectId) {
    let (mut doc, pages_id) = new_doc();
    let ids: Vec<ObjectId> = fragments.iter().map(|f| add_stream(&mut doc, f)).collect();
    let extra = match ids.as_slice() {
        [] => Dictionary::new(),
        [single] => dictionary! { "Contents" => *single },
        many => dictionary! {
            "Contents" => many.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
        },
    };
    let page_id = add_page(&mut doc, pages_id, extra);
    (doc, page_id)
}

/// The page dictionary, for assertions.
pub(crate) fn page(doc: &Document, page_id: ObjectId) -> &Dictionary {
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .expect("page dictionary")
}
