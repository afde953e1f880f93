//! Resource reference tracking and pruning.
//!
//! [`ResourceTracker`] watches parsed content for operators that name
//! resources (`Do`, `Tf`, `gs`, ...) and records which names are used under
//! which `/Resources` sub-dictionary. [`prune_resources`] then drops the
//! sub-dictionary entries nothing referenced.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfpage_core::{PageWarning, ResourceKind, ResourceUsage, WarningCode};

use crate::contents::{StreamRef, page_dict, page_dict_mut, resolve};
use crate::error::{BackendError, Diagnostics};
use crate::parser::{ContentObject, Flow, LexicalError, Operand, ParserCallbacks};

/// Which operand of an operator carries the resource name.
#[derive(Debug, Clone, Copy)]
enum NamePosition {
    First,
    Second,
    Last,
}

/// Map a content operator to the resource kind it references.
fn operator_resource(operator: &str) -> Option<(ResourceKind, NamePosition)> {
    let entry = match operator {
        "Do" => (ResourceKind::XObject, NamePosition::Last),
        "Tf" => (ResourceKind::Font, NamePosition::First),
        "gs" => (ResourceKind::ExtGState, NamePosition::Last),
        "cs" | "CS" => (ResourceKind::ColorSpace, NamePosition::Last),
        "scn" | "SCN" => (ResourceKind::Pattern, NamePosition::Last),
        "sh" => (ResourceKind::Shading, NamePosition::Last),
        "BDC" | "DP" => (ResourceKind::Properties, NamePosition::Second),
        _ => return None,
    };
    Some(entry)
}

/// Records the resource names a content stream uses.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    usage: ResourceUsage,
    operands: Vec<Operand>,
    errors: Vec<LexicalError>,
}

impl ResourceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names recorded so far.
    pub fn usage(&self) -> &ResourceUsage {
        &self.usage
    }

    /// Consume the tracker, returning the recorded names.
    pub fn into_usage(self) -> ResourceUsage {
        self.usage
    }

    /// Lexical errors seen during the parse.
    pub fn errors(&self) -> &[LexicalError] {
        &self.errors
    }

    fn operator(&mut self, operator: &str) {
        let operands = std::mem::take(&mut self.operands);
        let Some((kind, position)) = operator_resource(operator) else {
            return;
        };
        let operand = match position {
            NamePosition::First => operands.first(),
            NamePosition::Second => operands.get(1),
            NamePosition::Last => operands.last(),
        };
        if let Some(name) = operand.and_then(Operand::as_name) {
            self.usage.record(kind, name);
        }
    }
}

impl ParserCallbacks for ResourceTracker {
    fn handle_object(&mut self, object: ContentObject) -> Flow {
        match object {
            ContentObject::Operand(operand) => self.operands.push(operand),
            ContentObject::Operator(operator) => self.operator(&operator),
            ContentObject::InlineImage(image) => {
                self.operands.clear();
                let color_space = image.get("CS").or_else(|| image.get("ColorSpace"));
                if let Some(name) = color_space.and_then(Operand::as_name) {
                    self.usage.record(ResourceKind::ColorSpace, name);
                }
            }
        }
        Flow::Continue
    }

    fn handle_error(&mut self, error: &LexicalError) -> Flow {
        self.errors.push(error.clone());
        Flow::Continue
    }
}

fn page_label(page_id: ObjectId) -> String {
    format!("page {} {} R", page_id.0, page_id.1)
}

/// The page's own `/Resources` dictionary, resolved.
///
/// Returns `None` when the page has no `/Resources`. A non-dictionary value
/// is reported as [`WarningCode::MalformedResources`] and treated as absent.
pub(crate) fn own_resources<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    diag: &mut Diagnostics,
) -> Result<Option<&'a Dictionary>, BackendError> {
    let page = page_dict(doc, page_id)?;
    let Ok(entry) = page.get(b"Resources") else {
        return Ok(None);
    };
    match resolve(doc, entry)? {
        Object::Dictionary(dict) => Ok(Some(dict)),
        Object::Null => Ok(None),
        _ => {
            diag.warn(
                PageWarning::new(WarningCode::MalformedResources, "/Resources is not a dictionary")
                    .with_element(page_label(page_id)),
            )?;
            Ok(None)
        }
    }
}

/// Remove entries of the page's `/Resources` sub-dictionaries that are not
/// in `usage`. Returns the number of entries removed.
///
/// Only the page's own `/Resources` is considered. Sub-dictionaries that
/// lose entries are written back as direct dictionaries, and the page gets
/// a new direct `/Resources`, so objects shared with other pages are never
/// modified. Emptied sub-dictionaries are kept.
///
/// # Errors
///
/// Returns an error if the page or a sub-dictionary reference cannot be
/// resolved; the page is unchanged in that case.
pub fn prune_resources(
    doc: &mut Document,
    page_id: ObjectId,
    usage: &ResourceUsage,
    diag: &mut Diagnostics,
) -> Result<usize, BackendError> {
    let Some(resources) = own_resources(doc, page_id, diag)? else {
        return Ok(0);
    };

    let mut pruned = resources.clone();
    let mut removed = 0;
    for kind in ResourceKind::ALL {
        let Ok(entry) = resources.get(kind.key().as_bytes()) else {
            continue;
        };
        let sub = match resolve(doc, entry)? {
            Object::Dictionary(sub) => sub,
            _ => {
                diag.warn(
                    PageWarning::new(
                        WarningCode::MalformedResources,
                        format!("/{} is not a dictionary", kind.key()),
                    )
                    .with_element(page_label(page_id)),
                )?;
                continue;
            }
        };

        let mut kept = Dictionary::new();
        let mut dropped = 0;
        for (key, value) in sub.iter() {
            if usage.contains(kind, &String::from_utf8_lossy(key)) {
                kept.set(key.clone(), value.clone());
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!(page = ?page_id, kind = kind.key(), dropped, "pruned unreferenced resources");
            pruned.set(kind.key(), Object::Dictionary(kept));
            removed += dropped;
        }
    }

    if removed > 0 {
        page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(pruned));
    }
    Ok(removed)
}

/// Image XObjects in the page's own `/Resources`, keyed by resource name.
///
/// Entries that cannot be resolved are skipped with a warning; entries that
/// are not image streams are ignored.
///
/// # Errors
///
/// Returns an error if the page itself cannot be resolved.
pub fn page_images<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    diag: &mut Diagnostics,
) -> Result<BTreeMap<String, StreamRef<'a>>, BackendError> {
    let mut images = BTreeMap::new();
    let Some(resources) = own_resources(doc, page_id, diag)? else {
        return Ok(images);
    };
    let Ok(entry) = resources.get(b"XObject") else {
        return Ok(images);
    };
    let Object::Dictionary(xobjects) = resolve(doc, entry)? else {
        diag.warn(
            PageWarning::new(WarningCode::MalformedResources, "/XObject is not a dictionary")
                .with_element(page_label(page_id)),
        )?;
        return Ok(images);
    };

    for (key, value) in xobjects.iter() {
        let name = String::from_utf8_lossy(key).into_owned();
        let id = match value {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let resolved = match resolve(doc, value) {
            Ok(resolved) => resolved,
            Err(err) => {
                diag.warn(
                    PageWarning::new(WarningCode::MalformedResources, err.to_string())
                        .with_element(format!("XObject /{name}")),
                )?;
                continue;
            }
        };
        let Object::Stream(stream) = resolved else {
            continue;
        };
        let is_image = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Image");
        if is_image {
            images.insert(name, StreamRef { id, stream });
        }
    }
    Ok(images)
}
