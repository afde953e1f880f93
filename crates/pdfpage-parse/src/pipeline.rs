//! Pipeline stages that receive filtered content bytes.
//!
//! A [`Pipeline`] is a byte sink with an explicit end. Intermediate stages
//! own the stage after them, so a chain is built inside out and finished
//! from the front:
//!
//! ```ignore
//! use pdfpage_parse::filter::ContentNormalizer;
//! use pdfpage_parse::pipeline::{Buffer, CountingStage, TokenFilterStage};
//!
//! let mut chain = TokenFilterStage::new(ContentNormalizer::new(), CountingStage::new(Buffer::new()));
//! ```

use std::io::Write;

use pdfpage_core::{ContentOptions, PageError};

use crate::error::BackendError;
use crate::filter::TokenFilter;
use crate::parser::filter_content_with_options;

/// A byte sink.
pub trait Pipeline {
    /// Accept the next chunk of bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage cannot accept more data.
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError>;

    /// Signal that no more bytes will be written.
    ///
    /// Stages forward this to the stage after them exactly once.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn finish(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

impl Pipeline for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<P: Pipeline + ?Sized> Pipeline for &mut P {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        (**self).write(bytes)
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        (**self).finish()
    }
}

impl<P: Pipeline + ?Sized> Pipeline for Box<P> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        (**self).write(bytes)
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        (**self).finish()
    }
}

/// Terminal stage that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Pipeline for Discard {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Terminal stage that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    bytes: Vec<u8>,
    finished: bool,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the received bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns true once `finish` was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Pipeline for Buffer {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        if self.finished {
            return Err(BackendError::Pipeline("write after finish".to_string()));
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        self.finished = true;
        Ok(())
    }
}

/// Terminal stage writing to a caller-owned [`std::io::Write`].
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Wrap `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Return the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Pipeline for WriterSink<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Counts bytes on their way to the next stage.
#[derive(Debug)]
pub struct CountingStage<P> {
    next: P,
    count: u64,
    finished: bool,
}

impl<P: Pipeline> CountingStage<P> {
    /// Forward to `next`.
    pub fn new(next: P) -> Self {
        Self {
            next,
            count: 0,
            finished: false,
        }
    }

    /// Bytes forwarded so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Return the next stage.
    pub fn into_inner(self) -> P {
        self.next
    }
}

impl<P: Pipeline> Pipeline for CountingStage<P> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        self.count += bytes.len() as u64;
        self.next.write(bytes)
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.next.finish()
    }
}

/// Runs a [`TokenFilter`] over the bytes written to it.
///
/// Input is buffered until `finish`, then tokenized in one pass with the
/// filter's output going to the next stage. Stacking these stages composes
/// filters: the outermost filter sees the original content.
pub struct TokenFilterStage<F, P> {
    filter: F,
    next: P,
    buffer: Vec<u8>,
    options: ContentOptions,
    finished: bool,
}

impl<F: TokenFilter, P: Pipeline> TokenFilterStage<F, P> {
    /// Filter into `next` with default options.
    pub fn new(filter: F, next: P) -> Self {
        Self::with_options(filter, next, ContentOptions::default())
    }

    /// Filter into `next` honoring `options`.
    pub fn with_options(filter: F, next: P, options: ContentOptions) -> Self {
        Self {
            filter,
            next,
            buffer: Vec::new(),
            options,
            finished: false,
        }
    }

    /// The filter, for inspecting its state after `finish`.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Return the filter and the next stage.
    pub fn into_parts(self) -> (F, P) {
        (self.filter, self.next)
    }
}

impl<F: TokenFilter, P: Pipeline> Pipeline for TokenFilterStage<F, P> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        if self.finished {
            return Err(BackendError::Pipeline("write after finish".to_string()));
        }
        if self.buffer.len() + bytes.len() > self.options.max_content_bytes {
            return Err(PageError::ResourceLimitExceeded {
                limit_name: "max_content_bytes".to_string(),
                limit_value: self.options.max_content_bytes,
                actual_value: self.buffer.len() + bytes.len(),
            }
            .into());
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BackendError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let input = std::mem::take(&mut self.buffer);
        filter_content_with_options(&input, &mut self.filter, &mut self.next, &self.options)?;
        Ok(())
    }
}
