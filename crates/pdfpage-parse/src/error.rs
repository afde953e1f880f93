//! Error types for the parsing and page-operation layers.
//!
//! Uses [`thiserror`] for ergonomic error derivation. Provides [`BackendError`]
//! that wraps lopdf and I/O errors and converts them to [`PageError`], and
//! [`Diagnostics`], the warning collector shared by page operations.

use pdfpage_core::{PageError, PageWarning};
use thiserror::Error;

/// Error type for content parsing and page operations.
///
/// Wraps backend-specific errors and provides conversion to [`PageError`]
/// for unified error handling across the library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The document could not resolve an object the operation needs.
    #[error("unresolvable object: {0}")]
    Unresolvable(String),

    /// An object has a type the operation cannot work with.
    #[error("unexpected object type: {0}")]
    Type(String),

    /// Error from lopdf while reading or decoding an object.
    #[error("lopdf error: {0}")]
    Lopdf(#[from] lopdf::Error),

    /// Error writing to a pipeline stage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pipeline or filter was used in a way it does not support.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// A core library error.
    #[error(transparent)]
    Core(#[from] PageError),
}

impl BackendError {
    /// Build an [`Unresolvable`](BackendError::Unresolvable) error for an object id.
    pub(crate) fn unresolvable(id: lopdf::ObjectId, err: lopdf::Error) -> Self {
        BackendError::Unresolvable(format!("{} {} R: {err}", id.0, id.1))
    }
}

impl From<BackendError> for PageError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unresolvable(msg) => PageError::ResourceUnavailable(msg),
            BackendError::Lopdf(e) => PageError::ResourceUnavailable(e.to_string()),
            BackendError::Type(msg) => PageError::Other(msg),
            BackendError::Io(e) => PageError::PipelineError(e.to_string()),
            BackendError::Pipeline(msg) => PageError::PipelineError(msg),
            BackendError::Core(e) => e,
        }
    }
}

/// Collects structural warnings raised while operating on a page.
///
/// Every warning is logged through `tracing`. In strict mode the first
/// warning is returned as an error instead of being collected.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<PageWarning>,
    strict: bool,
}

impl Diagnostics {
    /// Create a collector; `strict` escalates warnings to errors.
    pub fn new(strict: bool) -> Self {
        Self {
            warnings: Vec::new(),
            strict,
        }
    }

    /// Record a warning.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::StructuralAnomaly`] (wrapped) in strict mode.
    pub fn warn(&mut self, warning: PageWarning) -> Result<(), BackendError> {
        tracing::warn!(code = %warning.code, element = ?warning.element, "{}", warning.description);
        if self.strict {
            return Err(warning.to_error().into());
        }
        self.warnings.push(warning);
        Ok(())
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[PageWarning] {
        &self.warnings
    }

    /// Remove and return the collected warnings.
    pub fn take(&mut self) -> Vec<PageWarning> {
        std::mem::take(&mut self.warnings)
    }
}
