//! Content locator: finds, reads, coalesces, and extends a page's content
//! streams.
//!
//! A page's `/Contents` may be a single stream or an array of streams, and
//! either form may sit behind an indirect reference. Everything here treats
//! both forms the same way.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pdfpage_core::{ContentOptions, PageError, PageWarning, WarningCode};

use crate::error::{BackendError, Diagnostics};

/// A content stream owned by the document.
#[derive(Debug, Clone, Copy)]
pub struct StreamRef<'a> {
    /// Object id of the stream, or `None` for a direct stream object.
    pub id: Option<ObjectId>,
    /// The stream itself.
    pub stream: &'a Stream,
}

impl StreamRef<'_> {
    /// Decoded stream data, decompressing if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream's filters cannot be decoded.
    pub fn decoded_bytes(&self) -> Result<Vec<u8>, BackendError> {
        decode_stream(self.stream)
    }
}

/// Decode a content stream, decompressing if needed.
pub(crate) fn decode_stream(stream: &Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.get(b"Filter").is_ok() {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

/// Get the page dictionary for `page_id`.
pub(crate) fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary, BackendError> {
    doc.get_object(page_id)
        .map_err(|e| BackendError::unresolvable(page_id, e))?
        .as_dict()
        .map_err(|_| BackendError::Type(format!("page {} {} R is not a dictionary", page_id.0, page_id.1)))
}

/// Get the page dictionary for `page_id`, mutably.
pub(crate) fn page_dict_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, BackendError> {
    doc.get_object_mut(page_id)
        .map_err(|e| BackendError::unresolvable(page_id, e))?
        .as_dict_mut()
        .map_err(|_| BackendError::Type(format!("page {} {} R is not a dictionary", page_id.0, page_id.1)))
}

/// Follow an indirect reference, if `obj` is one.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, BackendError> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| BackendError::unresolvable(*id, e)),
        other => Ok(other),
    }
}

fn describe(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
    }
}

/// The shape of a page's `/Contents` entry.
enum ContentsForm<'a> {
    Absent,
    Single(StreamRef<'a>),
    Array(&'a [Object]),
}

fn contents_form<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    diag: &mut Diagnostics,
) -> Result<ContentsForm<'a>, BackendError> {
    let page = page_dict(doc, page_id)?;
    let Ok(entry) = page.get(b"Contents") else {
        return Ok(ContentsForm::Absent);
    };
    let id = match entry {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    match resolve(doc, entry)? {
        Object::Stream(stream) => Ok(ContentsForm::Single(StreamRef { id, stream })),
        Object::Array(items) => Ok(ContentsForm::Array(items)),
        Object::Null => Ok(ContentsForm::Absent),
        other => {
            diag.warn(
                PageWarning::new(
                    WarningCode::MalformedContents,
                    format!("/Contents is a {}, treated as empty", describe(other)),
                )
                .with_element(format!("page {} {} R", page_id.0, page_id.1)),
            )?;
            Ok(ContentsForm::Absent)
        }
    }
}

/// The page's content streams in order.
///
/// Array elements that are not streams are skipped with a
/// [`WarningCode::NonStreamContent`] warning. A page without `/Contents`
/// has no streams.
///
/// # Errors
///
/// Returns [`BackendError::Unresolvable`] if a reference cannot be resolved.
pub fn page_contents<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    diag: &mut Diagnostics,
) -> Result<Vec<StreamRef<'a>>, BackendError> {
    match contents_form(doc, page_id, diag)? {
        ContentsForm::Absent => Ok(Vec::new()),
        ContentsForm::Single(stream) => Ok(vec![stream]),
        ContentsForm::Array(items) => {
            let mut streams = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let id = match item {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                };
                match resolve(doc, item)? {
                    Object::Stream(stream) => streams.push(StreamRef { id, stream }),
                    other => diag.warn(
                        PageWarning::new(
                            WarningCode::NonStreamContent,
                            format!("skipping {} in /Contents", describe(other)),
                        )
                        .with_element(format!("Contents[{index}]")),
                    )?,
                }
            }
            Ok(streams)
        }
    }
}

/// Concatenated decoded content of the page, with `\n` between streams.
///
/// # Errors
///
/// Returns [`PageError::ResourceLimitExceeded`] if the content is larger
/// than `options.max_content_bytes`, or any error from [`page_contents`].
pub fn content_bytes(
    doc: &Document,
    page_id: ObjectId,
    options: &ContentOptions,
    diag: &mut Diagnostics,
) -> Result<Vec<u8>, BackendError> {
    let mut content = Vec::new();
    for (index, stream) in page_contents(doc, page_id, diag)?.iter().enumerate() {
        let bytes = stream.decoded_bytes()?;
        let separator = usize::from(index > 0);
        let total = content.len() + separator + bytes.len();
        if total > options.max_content_bytes {
            return Err(PageError::ResourceLimitExceeded {
                limit_name: "max_content_bytes".to_string(),
                limit_value: options.max_content_bytes,
                actual_value: total,
            }
            .into());
        }
        if index > 0 {
            content.push(b'\n');
        }
        content.extend_from_slice(&bytes);
    }
    Ok(content)
}

/// Replace the page's contents with a single new stream holding `bytes`.
pub(crate) fn replace_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    bytes: Vec<u8>,
) -> Result<ObjectId, BackendError> {
    // Fail before allocating if the page is missing.
    page_dict(doc, page_id)?;
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), bytes));
    page_dict_mut(doc, page_id)?.set("Contents", stream_id);
    Ok(stream_id)
}

/// Merge an array of content streams into one stream.
///
/// Returns `false` without touching the document when `/Contents` is
/// already a single stream or absent. Otherwise the decoded streams are
/// joined with `\n` into a new unfiltered stream and `/Contents` points to
/// it. The old streams are left in the document unreferenced by this page.
///
/// # Errors
///
/// Returns an error if a stream cannot be resolved or decoded, or the merged
/// content exceeds `options.max_content_bytes`; the page is unchanged in
/// that case.
pub fn coalesce_content_streams(
    doc: &mut Document,
    page_id: ObjectId,
    options: &ContentOptions,
    diag: &mut Diagnostics,
) -> Result<bool, BackendError> {
    if !matches!(contents_form(doc, page_id, diag)?, ContentsForm::Array(_)) {
        return Ok(false);
    }
    let merged = content_bytes(doc, page_id, options, diag)?;
    let stream_id = replace_page_contents(doc, page_id, merged)?;
    tracing::debug!(
        page = ?page_id,
        stream = ?stream_id,
        "coalesced content streams"
    );
    Ok(true)
}

/// Add the stream `stream_id` to the page's contents.
///
/// A single-stream `/Contents` is first turned into a one-element array.
/// The stream goes first when `first` is set, last otherwise. The page gets
/// a new direct array, so an array shared with other pages is not changed.
///
/// # Errors
///
/// Returns [`PageError::InvalidArgument`] if `stream_id` is not a stream.
pub fn add_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    stream_id: ObjectId,
    first: bool,
) -> Result<(), BackendError> {
    let is_stream = doc
        .get_object(stream_id)
        .is_ok_and(|obj| obj.as_stream().is_ok());
    if !is_stream {
        return Err(PageError::InvalidArgument(format!(
            "{} {} R is not a stream",
            stream_id.0, stream_id.1
        ))
        .into());
    }

    let page = page_dict(doc, page_id)?;
    let mut items: Vec<Object> = match page.get(b"Contents") {
        Err(_) | Ok(Object::Null) => Vec::new(),
        Ok(Object::Array(items)) => items.clone(),
        Ok(entry @ Object::Reference(id)) => match resolve(doc, entry)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(direct) => vec![direct.clone()],
    };
    // A direct stream cannot be an array element of a saved file.
    for item in &mut items {
        if let Object::Stream(stream) = item {
            let id = doc.add_object(stream.clone());
            *item = Object::Reference(id);
        }
    }
    if first {
        items.insert(0, Object::Reference(stream_id));
    } else {
        items.push(Object::Reference(stream_id));
    }

    page_dict_mut(doc, page_id)?.set("Contents", items);
    Ok(())
}

/// Add `bytes` as a new content stream of the page.
///
/// # Errors
///
/// See [`add_page_contents`].
pub fn add_page_contents_bytes(
    doc: &mut Document,
    page_id: ObjectId,
    bytes: Vec<u8>,
    first: bool,
) -> Result<ObjectId, BackendError> {
    page_dict(doc, page_id)?;
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), bytes));
    add_page_contents(doc, page_id, stream_id, first)?;
    Ok(stream_id)
}
