//! Annotation enumeration.

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfpage_core::{PageWarning, WarningCode};

use crate::contents::{page_dict, resolve};
use crate::error::{BackendError, Diagnostics};

/// An entry of a page's `/Annots` array.
#[derive(Debug, Clone, Copy)]
pub struct Annotation<'a> {
    /// Object id, or `None` for a direct annotation dictionary.
    pub id: Option<ObjectId>,
    /// The `/Subtype` name without the leading `/` (e.g., `"Link"`).
    pub subtype: &'a str,
    /// The annotation dictionary.
    pub dict: &'a Dictionary,
}

/// Annotations of the page, in `/Annots` order.
///
/// When `only_subtype` is non-empty, only annotations with that `/Subtype`
/// are returned. Entries that cannot be resolved, are not dictionaries, or
/// lack a name `/Subtype` are skipped with a
/// [`WarningCode::MalformedAnnotation`] warning.
///
/// # Errors
///
/// Returns an error if the page or the `/Annots` array cannot be resolved.
pub fn page_annotations<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    only_subtype: &str,
    diag: &mut Diagnostics,
) -> Result<Vec<Annotation<'a>>, BackendError> {
    let page = page_dict(doc, page_id)?;

    // Get /Annots array (may be a direct array or indirect reference)
    let annots = match page.get(b"Annots") {
        Ok(obj) => resolve(doc, obj)?,
        Err(_) => return Ok(Vec::new()),
    };
    let entries = match annots {
        Object::Array(entries) => entries,
        Object::Null => return Ok(Vec::new()),
        _ => {
            diag.warn(
                PageWarning::new(WarningCode::MalformedAnnotation, "/Annots is not an array")
                    .with_element(format!("page {} {} R", page_id.0, page_id.1)),
            )?;
            return Ok(Vec::new());
        }
    };

    let mut annotations = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let element = || format!("Annots[{index}]");
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let dict = match resolve(doc, entry) {
            Ok(Object::Dictionary(dict)) => dict,
            Ok(_) => {
                diag.warn(
                    PageWarning::new(WarningCode::MalformedAnnotation, "entry is not a dictionary")
                        .with_element(element()),
                )?;
                continue;
            }
            Err(err) => {
                diag.warn(
                    PageWarning::new(WarningCode::MalformedAnnotation, err.to_string())
                        .with_element(element()),
                )?;
                continue;
            }
        };
        let subtype = match dict.get(b"Subtype") {
            Ok(Object::Name(name)) => std::str::from_utf8(name).ok(),
            _ => None,
        };
        let Some(subtype) = subtype else {
            diag.warn(
                PageWarning::new(WarningCode::MalformedAnnotation, "missing or invalid /Subtype")
                    .with_element(element()),
            )?;
            continue;
        };
        if only_subtype.is_empty() || subtype == only_subtype {
            annotations.push(Annotation { id, subtype, dict });
        }
    }
    Ok(annotations)
}
