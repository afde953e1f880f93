//! Page-level operations over a lopdf document.
//!
//! [`PageObjectHelper`] binds a page id to the options, persistent content
//! filters, and warnings used while reading or rewriting that page. The
//! document is passed to each call, so one document can be worked on by
//! several helpers, one per page.

use std::collections::{BTreeMap, HashSet};

use lopdf::{Document, Object, ObjectId};
use pdfpage_core::{
    ContentOptions, PageError, PageWarning, ResourceUsage, WarningCode, check_angle,
    normalize_rotation, rotated,
};

use crate::annotation::{Annotation, page_annotations};
use crate::contents::{self, StreamRef, page_dict, page_dict_mut};
use crate::error::Diagnostics;
use crate::filter::{PassThrough, SharedTokenFilter, TokenFilter};
use crate::parser::{
    ParseStatus, ParserCallbacks, filter_content_with_options, parse_content_with_options,
};
use crate::pipeline::{Discard, Pipeline};
use crate::resources::{ResourceTracker, page_images, prune_resources};

/// Operations on one page of a document.
///
/// Persistent filters added with [`add_content_token_filter`] are applied,
/// in the order they were added, every time the page content is read
/// through this helper.
///
/// [`add_content_token_filter`]: PageObjectHelper::add_content_token_filter
pub struct PageObjectHelper {
    page_id: ObjectId,
    options: ContentOptions,
    content_filters: Vec<SharedTokenFilter>,
    diagnostics: Diagnostics,
}

impl std::fmt::Debug for PageObjectHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageObjectHelper")
            .field("page_id", &self.page_id)
            .field("options", &self.options)
            .field("content_filters", &self.content_filters.len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl PageObjectHelper {
    /// Create a helper for `page_id` with default options.
    pub fn new(page_id: ObjectId) -> Self {
        Self::with_options(page_id, ContentOptions::default())
    }

    /// Create a helper for `page_id`.
    pub fn with_options(page_id: ObjectId, options: ContentOptions) -> Self {
        let diagnostics = Diagnostics::new(options.strict_mode);
        Self {
            page_id,
            options,
            content_filters: Vec::new(),
            diagnostics,
        }
    }

    /// The page this helper operates on.
    pub fn page_id(&self) -> ObjectId {
        self.page_id
    }

    /// The options in effect.
    pub fn options(&self) -> &ContentOptions {
        &self.options
    }

    /// Warnings collected by previous calls.
    pub fn warnings(&self) -> &[PageWarning] {
        self.diagnostics.warnings()
    }

    /// Remove and return the collected warnings.
    pub fn take_warnings(&mut self) -> Vec<PageWarning> {
        self.diagnostics.take()
    }

    /// Number of persistent content filters attached.
    pub fn content_filter_count(&self) -> usize {
        self.content_filters.len()
    }

    // --- Content streams ---

    /// The page's content streams, in order.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::ResourceUnavailable`] if a stream reference
    /// cannot be resolved.
    pub fn get_page_contents<'a>(
        &mut self,
        doc: &'a Document,
    ) -> Result<Vec<StreamRef<'a>>, PageError> {
        Ok(contents::page_contents(doc, self.page_id, &mut self.diagnostics)?)
    }

    /// Add an existing stream object to the page's contents.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidArgument`] if `stream_id` is not a stream.
    pub fn add_page_contents(
        &mut self,
        doc: &mut Document,
        stream_id: ObjectId,
        first: bool,
    ) -> Result<(), PageError> {
        Ok(contents::add_page_contents(doc, self.page_id, stream_id, first)?)
    }

    /// Add `bytes` as a new content stream, returning the new stream's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be resolved.
    pub fn add_page_contents_bytes(
        &mut self,
        doc: &mut Document,
        bytes: Vec<u8>,
        first: bool,
    ) -> Result<ObjectId, PageError> {
        Ok(contents::add_page_contents_bytes(doc, self.page_id, bytes, first)?)
    }

    /// Merge an array of content streams into one stream.
    ///
    /// Returns `true` if the page was changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a stream cannot be resolved or decoded; the page
    /// is unchanged in that case.
    pub fn coalesce_content_streams(&mut self, doc: &mut Document) -> Result<bool, PageError> {
        Ok(contents::coalesce_content_streams(
            doc,
            self.page_id,
            &self.options,
            &mut self.diagnostics,
        )?)
    }

    /// The page content after all persistent filters.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::ResourceLimitExceeded`] for oversized content,
    /// [`PageError::PipelineError`] if a filter fails or is already borrowed.
    pub fn content_bytes(&mut self, doc: &Document) -> Result<Vec<u8>, PageError> {
        let mut content =
            contents::content_bytes(doc, self.page_id, &self.options, &mut self.diagnostics)?;
        for filter in &self.content_filters {
            let mut filter = filter.try_borrow_mut().map_err(|_| {
                PageError::PipelineError("content filter is already in use".to_string())
            })?;
            let mut filtered = Vec::with_capacity(content.len());
            filter_content_with_options(&content, &mut *filter, &mut filtered, &self.options)?;
            content = filtered;
        }
        Ok(content)
    }

    /// Parse the page content, delivering content objects to `callbacks`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the content cannot be read.
    pub fn parse_page_contents(
        &mut self,
        doc: &Document,
        callbacks: &mut dyn ParserCallbacks,
    ) -> Result<ParseStatus, PageError> {
        let content = self.content_bytes(doc)?;
        Ok(parse_content_with_options(&content, callbacks, &self.options))
    }

    /// Run `filter` over the page content, writing its output to `sink`.
    ///
    /// With no sink the output is discarded. The page is not modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or the filter or
    /// sink fails.
    pub fn filter_page_contents(
        &mut self,
        doc: &Document,
        filter: &mut dyn TokenFilter,
        sink: Option<&mut dyn Pipeline>,
    ) -> Result<ParseStatus, PageError> {
        let mut discard = Discard;
        let sink: &mut dyn Pipeline = match sink {
            Some(sink) => sink,
            None => &mut discard,
        };
        // The sink is finished even when the content cannot be read; the
        // read error wins over any error from finishing.
        let content = match self.content_bytes(doc) {
            Ok(content) => content,
            Err(err) => {
                if let Err(finish) = sink.finish() {
                    tracing::debug!(error = %finish, "sink failed to finish after read error");
                }
                return Err(err);
            }
        };
        Ok(filter_content_with_options(
            &content,
            filter,
            sink,
            &self.options,
        )?)
    }

    /// Write the page content, unchanged apart from persistent filters, to
    /// `sink`.
    ///
    /// # Errors
    ///
    /// See [`filter_page_contents`](Self::filter_page_contents).
    pub fn pipe_page_contents(
        &mut self,
        doc: &Document,
        sink: &mut dyn Pipeline,
    ) -> Result<ParseStatus, PageError> {
        self.filter_page_contents(doc, &mut PassThrough, Some(sink))
    }

    /// Attach a filter that is applied to every later read of the content.
    ///
    /// The page's content streams are coalesced first.
    ///
    /// # Errors
    ///
    /// Returns an error if coalescing fails; the filter is not attached.
    pub fn add_content_token_filter(
        &mut self,
        doc: &mut Document,
        filter: SharedTokenFilter,
    ) -> Result<(), PageError> {
        self.coalesce_content_streams(doc)?;
        self.content_filters.push(filter);
        tracing::debug!(
            page = ?self.page_id,
            filters = self.content_filters.len(),
            "attached content filter"
        );
        Ok(())
    }

    /// Write the filtered content back to the page and detach all filters.
    ///
    /// Returns `false` if no filters were attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or a filter fails;
    /// the page and the attached filters are unchanged in that case.
    pub fn apply_content_filters(&mut self, doc: &mut Document) -> Result<bool, PageError> {
        if self.content_filters.is_empty() {
            return Ok(false);
        }
        let content = self.content_bytes(doc)?;
        let stream_id = contents::replace_page_contents(doc, self.page_id, content)?;
        tracing::debug!(
            page = ?self.page_id,
            stream = ?stream_id,
            filters = self.content_filters.len(),
            "applied content filters"
        );
        self.content_filters.clear();
        Ok(true)
    }

    // --- Rotation ---

    /// The page's effective rotation in `[0, 360)`.
    ///
    /// `/Rotate` is looked up on the page and then on its ancestors. An
    /// invalid value is reported as [`WarningCode::MalformedRotation`] and
    /// read as 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the page or a `/Parent` cannot be resolved.
    pub fn page_rotation(&mut self, doc: &Document) -> Result<i64, PageError> {
        let Some((value, holder)) = self.inherited_rotate(doc)? else {
            return Ok(0);
        };
        let angle = match value {
            Object::Integer(i) => Some(*i),
            Object::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        };
        match angle {
            Some(angle) if angle % 90 == 0 => Ok(normalize_rotation(angle)),
            _ => {
                self.diagnostics.warn(
                    PageWarning::new(
                        WarningCode::MalformedRotation,
                        "/Rotate is not a multiple of 90, using 0",
                    )
                    .with_element(format!("{} {} R", holder.0, holder.1)),
                )?;
                Ok(0)
            }
        }
    }

    /// Find `/Rotate` on the page or its nearest ancestor.
    fn inherited_rotate<'a>(
        &self,
        doc: &'a Document,
    ) -> Result<Option<(&'a Object, ObjectId)>, PageError> {
        let mut current = self.page_id;
        let mut visited = HashSet::new();
        while visited.insert(current) {
            let dict = page_dict(doc, current)?;
            if let Ok(value) = dict.get(b"Rotate") {
                return Ok(Some((value, current)));
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => current = *parent,
                _ => return Ok(None),
            }
        }
        tracing::warn!(page = ?self.page_id, "cycle in page tree /Parent chain");
        Ok(None)
    }

    /// Rotate the page by `angle` degrees, or set its rotation to `angle`
    /// when `relative` is false. Returns the new `/Rotate` value.
    ///
    /// The result is written to the page's own `/Rotate`.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::InvalidArgument`] if `angle` is not a multiple
    /// of 90; the page is unchanged.
    pub fn rotate_page(
        &mut self,
        doc: &mut Document,
        angle: i64,
        relative: bool,
    ) -> Result<i64, PageError> {
        check_angle(angle)?;
        let current = if relative {
            self.page_rotation(doc)?
        } else {
            0
        };
        let new_rotation = rotated(current, angle, relative)?;
        page_dict_mut(doc, self.page_id)?.set("Rotate", new_rotation);
        tracing::debug!(page = ?self.page_id, rotation = new_rotation, "rotated page");
        Ok(new_rotation)
    }

    // --- Resources ---

    /// Resource names used by the page content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read.
    pub fn referenced_resources(&mut self, doc: &Document) -> Result<ResourceUsage, PageError> {
        let mut tracker = ResourceTracker::new();
        self.parse_page_contents(doc, &mut tracker)?;
        Ok(tracker.into_usage())
    }

    /// Remove `/Resources` entries the page content does not use.
    /// Returns the number of entries removed.
    ///
    /// If the content has lexical errors nothing is removed, since a
    /// reference may be hidden in the malformed part.
    ///
    /// # Errors
    ///
    /// Returns an error if the content or resources cannot be read; the
    /// page is unchanged in that case.
    pub fn remove_unreferenced_resources(&mut self, doc: &mut Document) -> Result<usize, PageError> {
        let mut tracker = ResourceTracker::new();
        self.parse_page_contents(doc, &mut tracker)?;
        if let Some(error) = tracker.errors().first() {
            self.diagnostics.warn(
                PageWarning::new(
                    WarningCode::MalformedContents,
                    format!("not pruning resources: {error}"),
                )
                .with_element(format!("page {} {} R", self.page_id.0, self.page_id.1)),
            )?;
            return Ok(0);
        }
        let usage = tracker.into_usage();
        Ok(prune_resources(
            doc,
            self.page_id,
            &usage,
            &mut self.diagnostics,
        )?)
    }

    // --- Enumeration ---

    /// The page's annotations; an empty `only_subtype` returns all.
    ///
    /// # Errors
    ///
    /// Returns an error if the page or `/Annots` cannot be resolved.
    pub fn get_annotations<'a>(
        &mut self,
        doc: &'a Document,
        only_subtype: &str,
    ) -> Result<Vec<Annotation<'a>>, PageError> {
        Ok(page_annotations(
            doc,
            self.page_id,
            only_subtype,
            &mut self.diagnostics,
        )?)
    }

    /// Image XObjects named in the page's own `/Resources`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page or its resources cannot be resolved.
    pub fn get_page_images<'a>(
        &mut self,
        doc: &'a Document,
    ) -> Result<BTreeMap<String, StreamRef<'a>>, PageError> {
        Ok(page_images(doc, self.page_id, &mut self.diagnostics)?)
    }
}
