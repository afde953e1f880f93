//! pdfpage-core: Backend-independent types shared by the pdfpage crates.
//!
//! This crate holds the error and warning taxonomy, the [`ContentOptions`]
//! configuration, the resource sub-dictionary catalogue ([`ResourceKind`]),
//! and page rotation arithmetic. It has no dependency on any PDF object
//! model; the lopdf-backed implementation lives in pdfpage-parse.

pub mod error;
pub mod resource;
pub mod rotation;

pub use error::{ContentOptions, PageError, PageWarning, WarningCode};
pub use resource::{ResourceKind, ResourceUsage};
pub use rotation::{check_angle, normalize_rotation, rotated};
