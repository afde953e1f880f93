//! In-memory document builders shared by the integration tests.

#![allow(dead_code)]

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// A document with a root `/Pages` node and no pages.
pub struct Fixture {
    pub doc: Document,
    pub pages_id: ObjectId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
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
        Self { doc, pages_id }
    }

    /// Add an unfiltered stream.
    pub fn stream(&mut self, bytes: &[u8]) -> ObjectId {
        self.doc
            .add_object(Stream::new(Dictionary::new(), bytes.to_vec()))
    }

    /// Add an image XObject of `w` x `h` gray pixels.
    pub fn image(&mut self, w: i64, h: i64) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w,
            "Height" => h,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        };
        let pixels = vec![0x80u8; (w * h) as usize];
        self.doc.add_object(Stream::new(dict, pixels))
    }

    /// Add a page under the root with `extra` entries.
    pub fn page(&mut self, extra: Dictionary) -> ObjectId {
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        for (key, value) in extra.iter() {
            page.set(key.clone(), value.clone());
        }
        let page_id = self.doc.add_object(page);
        let pages = self
            .doc
            .get_object_mut(self.pages_id)
            .and_then(Object::as_dict_mut)
            .expect("pages dictionary");
        let mut kids = pages
            .get(b"Kids")
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default();
        kids.push(page_id.into());
        let count = kids.len() as i64;
        pages.set("Kids", kids);
        pages.set("Count", count);
        page_id
    }

    /// Add a page whose `/Contents` is an array of one stream per fragment.
    pub fn page_with_fragments(&mut self, fragments: &[&[u8]], extra: Dictionary) -> ObjectId {
        let contents: Vec<Object> = fragments
            .iter()
            .map(|bytes| Object::Reference(self.stream(bytes)))
            .collect();
        let mut extra = extra;
        extra.set("Contents", contents);
        self.page(extra)
    }

    /// The page dictionary.
    pub fn page_dict(&self, page_id: ObjectId) -> &Dictionary {
        self.doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .expect("page dictionary")
    }

    /// The `/Resources` sub-dictionary `key` of a page with direct resources.
    pub fn resource_names(&self, page_id: ObjectId, key: &str) -> Vec<String> {
        let resources = match self.page_dict(page_id).get(b"Resources") {
            Ok(Object::Dictionary(dict)) => dict,
            Ok(Object::Reference(id)) => self
                .doc
                .get_object(*id)
                .and_then(Object::as_dict)
                .expect("resources dictionary"),
            _ => return Vec::new(),
        };
        match resources.get(key.as_bytes()) {
            Ok(Object::Dictionary(sub)) => sub
                .iter()
                .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
                .collect(),
            _ => Vec::new(),
        }
    }
}
