//! pdfpage: Read, filter, and rewrite the content of PDF pages.
//!
//! This is the public API facade crate for pdfpage. It re-exports the
//! backend-independent types of pdfpage-core and the lopdf-backed
//! tokenizer, filters, and page operations of pdfpage-parse.
//!
//! # Architecture
//!
//! - **pdfpage-core**: Errors, warnings, options, resource kinds, rotation math
//! - **pdfpage-parse**: Tokenizer, parser driver, token filters, pipelines, page helper
//! - **pdfpage** (this crate): Public API that ties everything together
//!
//! # Example
//!
//! ```ignore
//! use pdfpage::{PageObjectHelper, lopdf::Document};
//!
//! let mut doc = Document::load("in.pdf")?;
//! let page_id = doc.get_pages()[&1];
//! let mut page = PageObjectHelper::new(page_id);
//! page.coalesce_content_streams(&mut doc)?;
//! page.remove_unreferenced_resources(&mut doc)?;
//! page.rotate_page(&mut doc, 90, true)?;
//! ```

pub use pdfpage_core;
pub use pdfpage_parse;

pub use pdfpage_core::{
    ContentOptions, PageError, PageWarning, ResourceKind, ResourceUsage, WarningCode,
};
pub use pdfpage_parse::{
    Annotation, BackendError, Buffer, ContentNormalizer, ContentObject, CountingStage, Discard,
    FilterOutput, Flow, InlineImage, LexicalError, Operand, Operation, OperationCollector,
    PageObjectHelper, ParseStatus, ParserCallbacks, PassThrough, Pipeline, ResourceTracker,
    SharedTokenFilter, StreamRef, Token, TokenFilter, TokenFilterStage, TokenKind, Tokenizer,
    WriterSink, collect_operations, filter_content, lopdf, parse_content,
};
