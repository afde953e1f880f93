//! pdfpage-parse: content stream tokenizer, filters, and page operations.
//!
//! This crate holds the lopdf-backed half of pdfpage: the content stream
//! [`tokenizer`], the [`parser`] driver with its callback and token-filter
//! consumers, [`pipeline`] stages, and the page operations built on them
//! ([`contents`], [`resources`], [`annotation`], and [`page`]).
//! It depends on pdfpage-core for shared error and option types.

pub mod annotation;
pub mod contents;
pub mod error;
pub mod filter;
pub mod page;
pub mod parser;
pub mod pipeline;
pub mod resources;
pub mod tokenizer;

#[cfg(test)]
mod test_util;

pub use annotation::Annotation;
pub use contents::StreamRef;
pub use error::{BackendError, Diagnostics};
pub use filter::{ContentNormalizer, FilterOutput, PassThrough, SharedTokenFilter, TokenFilter};
pub use page::PageObjectHelper;
pub use parser::{
    ContentObject, Flow, InlineImage, LexicalError, Operand, Operation, OperationCollector,
    ParseStatus, ParserCallbacks, collect_operations, filter_content, parse_content,
};
pub use pipeline::{Buffer, CountingStage, Discard, Pipeline, TokenFilterStage, WriterSink};
pub use resources::ResourceTracker;
pub use tokenizer::{Token, TokenKind, Tokenizer};

pub use lopdf;
pub use pdfpage_core;
