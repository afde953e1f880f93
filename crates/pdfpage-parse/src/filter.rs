//! Token filters.
//!
//! A [`TokenFilter`] sees every token of a content stream, including
//! whitespace, comments, and bad tokens, and decides what bytes to write in
//! its place. The default behaviour is identity, so a filter only overrides
//! the tokens it cares about.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::BackendError;
use crate::parser::Flow;
use crate::pipeline::Pipeline;
use crate::tokenizer::{Token, TokenKind};

/// Where a filter writes its output.
///
/// Wraps the sink the driver was given; filters never own it.
pub struct FilterOutput<'a> {
    sink: &'a mut dyn Pipeline,
    written: usize,
}

impl<'a> FilterOutput<'a> {
    /// Wrap `sink`.
    pub fn new(sink: &'a mut dyn Pipeline) -> Self {
        Self { sink, written: 0 }
    }

    /// Write raw bytes.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the sink.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        self.written += bytes.len();
        self.sink.write(bytes)
    }

    /// Write a token's raw bytes.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the sink.
    pub fn write_token(&mut self, token: &Token) -> Result<(), BackendError> {
        self.write(token.raw())
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }
}

/// A consumer that rewrites a content stream token by token.
pub trait TokenFilter {
    /// Called for every token in content order.
    ///
    /// The default writes the token unchanged.
    ///
    /// # Errors
    ///
    /// Implementations return errors from the output, or their own.
    fn handle_token(
        &mut self,
        token: &Token,
        out: &mut FilterOutput<'_>,
    ) -> Result<Flow, BackendError> {
        out.write_token(token)?;
        Ok(Flow::Continue)
    }

    /// Called once after the last token. May write trailing bytes.
    ///
    /// # Errors
    ///
    /// Implementations return errors from the output, or their own.
    fn handle_eof(&mut self, out: &mut FilterOutput<'_>) -> Result<(), BackendError> {
        let _ = out;
        Ok(())
    }
}

impl<F: TokenFilter + ?Sized> TokenFilter for &mut F {
    fn handle_token(
        &mut self,
        token: &Token,
        out: &mut FilterOutput<'_>,
    ) -> Result<Flow, BackendError> {
        (**self).handle_token(token, out)
    }

    fn handle_eof(&mut self, out: &mut FilterOutput<'_>) -> Result<(), BackendError> {
        (**self).handle_eof(out)
    }
}

impl<F: TokenFilter + ?Sized> TokenFilter for Box<F> {
    fn handle_token(
        &mut self,
        token: &Token,
        out: &mut FilterOutput<'_>,
    ) -> Result<Flow, BackendError> {
        (**self).handle_token(token, out)
    }

    fn handle_eof(&mut self, out: &mut FilterOutput<'_>) -> Result<(), BackendError> {
        (**self).handle_eof(out)
    }
}

/// A filter shared between a page helper and the caller that created it.
///
/// The caller keeps a handle to inspect filter state after content reads.
pub type SharedTokenFilter = Rc<RefCell<dyn TokenFilter>>;

/// Identity filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl TokenFilter for PassThrough {}

/// Normalizes whitespace in content streams.
///
/// Whitespace runs containing a line break become a single `\n`; other
/// runs become a single space. Everything else is written unchanged, so
/// inline image data and strings are preserved byte for byte.
#[derive(Debug, Clone, Default)]
pub struct ContentNormalizer {
    any_bad_tokens: bool,
    last_token_was_bad: bool,
    token_count: usize,
}

impl ContentNormalizer {
    /// Create a normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any malformed token was seen.
    pub fn any_bad_tokens(&self) -> bool {
        self.any_bad_tokens
    }

    /// Returns true if the content ended with a malformed token.
    pub fn last_token_was_bad(&self) -> bool {
        self.last_token_was_bad
    }

    /// Number of tokens seen.
    pub fn token_count(&self) -> usize {
        self.token_count
    }
}

impl TokenFilter for ContentNormalizer {
    fn handle_token(
        &mut self,
        token: &Token,
        out: &mut FilterOutput<'_>,
    ) -> Result<Flow, BackendError> {
        self.token_count += 1;
        self.last_token_was_bad = token.kind() == TokenKind::Bad;
        if self.last_token_was_bad {
            self.any_bad_tokens = true;
        }
        match token.kind() {
            TokenKind::Space if token.raw().iter().any(|&b| b == b'\n' || b == b'\r') => {
                out.write(b"\n")?;
            }
            TokenKind::Space => out.write(b" ")?,
            _ => out.write_token(token)?,
        }
        Ok(Flow::Continue)
    }
}
