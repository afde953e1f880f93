//! Error and warning types for pdfpage.
//!
//! Provides [`PageError`] for failures that stop the current operation,
//! [`PageWarning`] for structural anomalies that are skipped with a
//! recoverable default, and [`ContentOptions`] for configuring limits and
//! warning behavior.

use std::fmt;

/// Fatal error types for page operations.
///
/// A `PageError` fails the operation that produced it. The page is left in
/// the state it had before the call.
#[derive(Debug, Clone, PartialEq)]
pub enum PageError {
    /// A caller-supplied argument violates the operation's contract
    /// (e.g., a rotation angle that is not a multiple of 90).
    InvalidArgument(String),
    /// An object the operation needs could not be resolved by the document.
    ResourceUnavailable(String),
    /// A structural anomaly escalated to an error by strict mode.
    StructuralAnomaly(String),
    /// Writing to a pipeline stage failed.
    PipelineError(String),
    /// A configured limit was exceeded.
    ResourceLimitExceeded {
        /// Name of the limit that was exceeded (e.g., "max_content_bytes").
        limit_name: String,
        /// The configured limit value.
        limit_value: usize,
        /// The actual value that exceeded the limit.
        actual_value: usize,
    },
    /// Any other error not covered by specific variants.
    Other(String),
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            PageError::ResourceUnavailable(msg) => write!(f, "resource unavailable: {msg}"),
            PageError::StructuralAnomaly(msg) => write!(f, "structural anomaly: {msg}"),
            PageError::PipelineError(msg) => write!(f, "pipeline error: {msg}"),
            PageError::ResourceLimitExceeded {
                limit_name,
                limit_value,
                actual_value,
            } => write!(
                f,
                "resource limit exceeded: {limit_name} (limit: {limit_value}, actual: {actual_value})"
            ),
            PageError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PageError {}

impl From<std::io::Error> for PageError {
    fn from(err: std::io::Error) -> Self {
        PageError::PipelineError(err.to_string())
    }
}

/// Machine-readable code for a structural anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", content = "detail")
)]
pub enum WarningCode {
    /// A `/Contents` element is not a stream.
    NonStreamContent,
    /// `/Contents` has an unexpected type (neither stream nor array).
    MalformedContents,
    /// An `/Annots` entry is not a well-formed annotation dictionary.
    MalformedAnnotation,
    /// `/Resources` or one of its sub-dictionaries has an unexpected type.
    MalformedResources,
    /// `/Rotate` holds something other than a number.
    MalformedRotation,
    /// Any other warning not covered by specific variants.
    Other(String),
}

impl WarningCode {
    /// Returns the string tag for this warning code.
    pub fn as_str(&self) -> &str {
        match self {
            WarningCode::NonStreamContent => "NON_STREAM_CONTENT",
            WarningCode::MalformedContents => "MALFORMED_CONTENTS",
            WarningCode::MalformedAnnotation => "MALFORMED_ANNOTATION",
            WarningCode::MalformedResources => "MALFORMED_RESOURCES",
            WarningCode::MalformedRotation => "MALFORMED_ROTATION",
            WarningCode::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structural anomaly that was skipped.
///
/// Warnings carry a structured [`code`](PageWarning::code), a human-readable
/// description, and optionally the element that was skipped (e.g.,
/// "/Contents[2]" or "/Annots[0]").
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageWarning {
    /// Machine-readable warning code.
    pub code: WarningCode,
    /// Human-readable description of the warning.
    pub description: String,
    /// The element that triggered the warning, if applicable.
    pub element: Option<String>,
}

impl PageWarning {
    /// Create a warning with a specific code and description.
    pub fn new(code: WarningCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            element: None,
        }
    }

    /// Attach the offending element, returning the modified warning.
    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// Convert this warning into a [`PageError`].
    ///
    /// Used by strict mode to escalate warnings to errors.
    pub fn to_error(&self) -> PageError {
        PageError::StructuralAnomaly(self.to_string())
    }
}

impl fmt::Display for PageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)?;
        if let Some(ref element) = self.element {
            write!(f, " [{element}]")?;
        }
        Ok(())
    }
}

/// Options controlling content parsing and warning behavior.
///
/// Limits keep pathological content streams from consuming excessive memory
/// or recursing without bound.
#[derive(Debug, Clone)]
pub struct ContentOptions {
    /// Maximum decoded content bytes read for one page (default: 100 MB).
    pub max_content_bytes: usize,
    /// Maximum nesting of arrays and dictionaries inside operands (default: 64).
    pub max_nesting_depth: usize,
    /// Number of tokens inspected after a candidate `EI` before accepting it
    /// as the end of an inline image (default: 10).
    pub inline_image_lookahead: usize,
    /// When true, any structural warning is escalated to an error (default: false).
    pub strict_mode: bool,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            max_content_bytes: 100 * 1024 * 1024,
            max_nesting_depth: 64,
            inline_image_lookahead: 10,
            strict_mode: false,
        }
    }
}

impl ContentOptions {
    /// Options that turn every structural warning into an error.
    pub fn strict() -> Self {
        Self {
            strict_mode: true,
            ..Self::default()
        }
    }
}
