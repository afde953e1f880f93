//! Parser and callback driver for content streams.
//!
//! [`parse_content`] groups the tokens produced by [`Tokenizer`] into
//! [`ContentObject`]s (operands, operators, and whole inline images) and
//! delivers them to a [`ParserCallbacks`] consumer. [`filter_content`]
//! instead hands every raw token to a [`TokenFilter`] whose output is
//! written to a [`Pipeline`].
//!
//! Lexical problems never fail a parse. They are reported to the consumer,
//! which decides whether to continue or abort.

use pdfpage_core::ContentOptions;

use crate::error::BackendError;
use crate::filter::{FilterOutput, TokenFilter};
use crate::pipeline::Pipeline;
use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// A content stream operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Integer number (e.g., `42`, `-7`).
    Integer(i64),
    /// Real (floating-point) number (e.g., `3.14`, `.5`).
    Real(f64),
    /// Name object (e.g., `/F1`, `/DeviceRGB`). Stored without the leading `/`.
    Name(String),
    /// Literal string delimited by parentheses, stored as decoded bytes.
    LiteralString(Vec<u8>),
    /// Hexadecimal string delimited by angle brackets, stored as decoded bytes.
    HexString(Vec<u8>),
    /// Array of operands (e.g., `[1 2 3]`).
    Array(Vec<Operand>),
    /// Boolean value (`true` or `false`).
    Boolean(bool),
    /// The null object.
    Null,
    /// Dictionary object (`<< /Key value ... >>`).
    Dictionary(Vec<(String, Operand)>),
}

impl Operand {
    /// The name, if this operand is a name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The numeric value of an integer or real operand.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Look up `key` in a dictionary operand.
    pub fn get(&self, key: &str) -> Option<&Operand> {
        match self {
            Operand::Dictionary(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn from_token(token: &Token) -> Option<Operand> {
        match token.kind() {
            TokenKind::Integer => token
                .as_i64()
                .map(Operand::Integer)
                .or_else(|| token.as_f64().map(Operand::Real)),
            TokenKind::Real => token.as_f64().map(Operand::Real),
            TokenKind::Name => Some(Operand::Name(token.text())),
            TokenKind::LiteralString => Some(Operand::LiteralString(token.value().to_vec())),
            TokenKind::HexString => Some(Operand::HexString(token.value().to_vec())),
            TokenKind::Boolean => Some(Operand::Boolean(token.value() == b"true")),
            TokenKind::Null => Some(Operand::Null),
            _ => None,
        }
    }
}

/// An inline image captured from a `BI ... ID ... EI` sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Dictionary entries between BI and ID as key-value pairs.
    pub dict: Vec<(String, Operand)>,
    /// Raw image data bytes between ID and EI.
    pub data: Vec<u8>,
}

impl InlineImage {
    /// Look up an entry of the image dictionary by key.
    pub fn get(&self, key: &str) -> Option<&Operand> {
        self.dict.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// A top-level object delivered to [`ParserCallbacks::handle_object`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContentObject {
    /// An operand, possibly an assembled array or dictionary.
    Operand(Operand),
    /// An operator such as `cm` or `Do`.
    Operator(String),
    /// A complete inline image; `BI`, `ID`, and `EI` are not delivered separately.
    InlineImage(InlineImage),
}

/// A malformed token or grammar problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    /// Human-readable description.
    pub message: String,
    /// Byte offset of the offending token in the parsed content.
    pub offset: usize,
}

impl std::fmt::Display for LexicalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

/// Returned by consumers after each upcall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going.
    Continue,
    /// Stop before the next upcall.
    Abort,
}

/// How a parse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// All input was consumed and the end-of-input notification was sent.
    Completed,
    /// The consumer requested an abort.
    Aborted,
}

/// Consumer of parsed content objects.
///
/// The driver calls these methods synchronously, in content order.
pub trait ParserCallbacks {
    /// Called for each top-level object.
    fn handle_object(&mut self, object: ContentObject) -> Flow;

    /// Called for each lexical or grammar error. The default keeps parsing.
    fn handle_error(&mut self, error: &LexicalError) -> Flow {
        let _ = error;
        Flow::Continue
    }

    /// Called once after the last object unless the parse was aborted.
    fn handle_eof(&mut self) {}
}

/// Parse `input` with default options.
pub fn parse_content(input: &[u8], callbacks: &mut dyn ParserCallbacks) -> ParseStatus {
    parse_content_with_options(input, callbacks, &ContentOptions::default())
}

/// Parse `input`, delivering content objects to `callbacks`.
pub fn parse_content_with_options(
    input: &[u8],
    callbacks: &mut dyn ParserCallbacks,
    options: &ContentOptions,
) -> ParseStatus {
    let mut tokenizer = Tokenizer::with_options(input, options);
    let mut assembler = Assembler::new(callbacks, options.max_nesting_depth);
    loop {
        let offset = tokenizer.position();
        let Some(token) = tokenizer.next_token() else {
            break;
        };
        if !token.is_significant() {
            continue;
        }
        if assembler.token(&token, offset) == Flow::Abort {
            return ParseStatus::Aborted;
        }
    }
    assembler.finish(input.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Array,
    Dictionary,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    items: Vec<Operand>,
}

#[derive(Debug, Default)]
struct PendingImage {
    entries: Vec<Operand>,
    seen_id: bool,
    data: Option<Vec<u8>>,
}

/// Groups significant tokens into content objects.
struct Assembler<'c> {
    callbacks: &'c mut dyn ParserCallbacks,
    max_depth: usize,
    stack: Vec<Frame>,
    /// Open composites beyond `max_depth` whose contents are discarded.
    skipped: usize,
    image: Option<PendingImage>,
}

impl<'c> Assembler<'c> {
    fn new(callbacks: &'c mut dyn ParserCallbacks, max_depth: usize) -> Self {
        Self {
            callbacks,
            max_depth,
            stack: Vec::new(),
            skipped: 0,
            image: None,
        }
    }

    fn error(&mut self, message: impl Into<String>, offset: usize) -> Flow {
        let error = LexicalError {
            message: message.into(),
            offset,
        };
        self.callbacks.handle_error(&error)
    }

    fn report(&mut self, problem: Option<String>, offset: usize) -> Flow {
        match problem {
            Some(message) => self.error(message, offset),
            None => Flow::Continue,
        }
    }

    fn token(&mut self, token: &Token, offset: usize) -> Flow {
        if self.skipped > 0 {
            match token.kind() {
                TokenKind::ArrayOpen | TokenKind::DictOpen => self.skipped += 1,
                TokenKind::ArrayClose | TokenKind::DictClose => self.skipped -= 1,
                _ => {}
            }
            return Flow::Continue;
        }

        match token.kind() {
            TokenKind::Bad => {
                // Bad image data already names the open image.
                if self
                    .image
                    .as_ref()
                    .is_some_and(|image| image.seen_id && image.data.is_none())
                {
                    self.image = None;
                }
                let message = token.error().unwrap_or("malformed token").to_string();
                self.error(message, offset)
            }
            TokenKind::ArrayOpen | TokenKind::DictOpen => {
                if self.stack.len() >= self.max_depth {
                    self.skipped = 1;
                    let max = self.max_depth;
                    return self.error(format!("nesting depth exceeds {max}"), offset);
                }
                let kind = if token.kind() == TokenKind::ArrayOpen {
                    FrameKind::Array
                } else {
                    FrameKind::Dictionary
                };
                self.stack.push(Frame {
                    kind,
                    items: Vec::new(),
                });
                Flow::Continue
            }
            TokenKind::ArrayClose => self.close(FrameKind::Array, offset),
            TokenKind::DictClose => self.close(FrameKind::Dictionary, offset),
            TokenKind::BraceOpen | TokenKind::BraceClose => {
                self.error("unexpected brace in content stream", offset)
            }
            TokenKind::InlineImage => match self.image.as_mut() {
                Some(image) if image.seen_id && image.data.is_none() => {
                    image.data = Some(token.raw().to_vec());
                    Flow::Continue
                }
                _ => self.error("unexpected inline image data", offset),
            },
            TokenKind::Operator => self.operator(token, offset),
            TokenKind::Space | TokenKind::Comment => Flow::Continue,
            _ => match Operand::from_token(token) {
                Some(operand) => self.value(operand),
                None => self.error("invalid number", offset),
            },
        }
    }

    fn close(&mut self, kind: FrameKind, offset: usize) -> Flow {
        if !self.stack.last().is_some_and(|frame| frame.kind == kind) {
            let what = if kind == FrameKind::Array { "]" } else { ">>" };
            return self.error(format!("unexpected '{what}'"), offset);
        }
        let Some(frame) = self.stack.pop() else {
            return Flow::Continue;
        };
        match kind {
            FrameKind::Array => self.value(Operand::Array(frame.items)),
            FrameKind::Dictionary => {
                let (entries, problem) = pairs(frame.items);
                if self.report(problem, offset) == Flow::Abort {
                    return Flow::Abort;
                }
                self.value(Operand::Dictionary(entries))
            }
        }
    }

    fn value(&mut self, operand: Operand) -> Flow {
        if let Some(frame) = self.stack.last_mut() {
            frame.items.push(operand);
            return Flow::Continue;
        }
        if let Some(image) = self.image.as_mut().filter(|image| !image.seen_id) {
            image.entries.push(operand);
            return Flow::Continue;
        }
        self.callbacks.handle_object(ContentObject::Operand(operand))
    }

    fn operator(&mut self, token: &Token, offset: usize) -> Flow {
        let name = token.text();
        if let Some(frame) = self.stack.last() {
            let container = match frame.kind {
                FrameKind::Array => "array",
                FrameKind::Dictionary => "dictionary",
            };
            return self.error(format!("operator {name} inside {container}"), offset);
        }

        match name.as_str() {
            "BI" => {
                if self.image.is_some() {
                    return self.error("nested BI", offset);
                }
                self.image = Some(PendingImage::default());
                Flow::Continue
            }
            "ID" => match self.image.as_mut() {
                Some(image) if !image.seen_id => {
                    image.seen_id = true;
                    Flow::Continue
                }
                _ => self.error("ID without BI", offset),
            },
            "EI" => match self.image.take() {
                Some(PendingImage {
                    entries,
                    data: Some(data),
                    ..
                }) => {
                    let (dict, problem) = pairs(entries);
                    if self.report(problem, offset) == Flow::Abort {
                        return Flow::Abort;
                    }
                    self.callbacks
                        .handle_object(ContentObject::InlineImage(InlineImage { dict, data }))
                }
                _ => self.error("EI without inline image data", offset),
            },
            _ if self.image.as_ref().is_some_and(|image| !image.seen_id) => {
                self.error(format!("operator {name} inside inline image dictionary"), offset)
            }
            _ => self.callbacks.handle_object(ContentObject::Operator(name)),
        }
    }

    fn finish(mut self, end: usize) -> ParseStatus {
        if let Some(frame) = self.stack.last() {
            let what = match frame.kind {
                FrameKind::Array => "unterminated array",
                FrameKind::Dictionary => "unterminated dictionary",
            };
            if self.error(what, end) == Flow::Abort {
                return ParseStatus::Aborted;
            }
        }
        if self.image.is_some() && self.error("unterminated inline image", end) == Flow::Abort {
            return ParseStatus::Aborted;
        }
        self.callbacks.handle_eof();
        ParseStatus::Completed
    }
}

/// Split a flat key/value list into dictionary entries.
///
/// Non-name keys drop their pair; a trailing key without value maps to null.
fn pairs(items: Vec<Operand>) -> (Vec<(String, Operand)>, Option<String>) {
    let mut entries = Vec::with_capacity(items.len() / 2);
    let mut problem = None;
    let mut iter = items.into_iter();
    while let Some(key) = iter.next() {
        let value = iter.next();
        match (key, value) {
            (Operand::Name(key), Some(value)) => entries.push((key, value)),
            (Operand::Name(key), None) => {
                problem.get_or_insert_with(|| format!("dictionary key /{key} has no value"));
                entries.push((key, Operand::Null));
            }
            (_, _) => {
                problem.get_or_insert_with(|| "dictionary key is not a name".to_string());
            }
        }
    }
    (entries, problem)
}

/// Run `filter` over every token of `input` with default options.
///
/// # Errors
///
/// Returns any error raised by the filter or the sink.
pub fn filter_content(
    input: &[u8],
    filter: &mut dyn TokenFilter,
    sink: &mut dyn Pipeline,
) -> Result<ParseStatus, BackendError> {
    filter_content_with_options(input, filter, sink, &ContentOptions::default())
}

/// Run `filter` over every token of `input`, writing its output to `sink`.
///
/// Whitespace, comments, and bad tokens are all delivered. The filter's
/// end-of-input hook runs unless it aborted. `sink.finish()` is called on
/// every exit path.
///
/// # Errors
///
/// Returns the first error raised by the filter or the sink.
pub fn filter_content_with_options(
    input: &[u8],
    filter: &mut dyn TokenFilter,
    sink: &mut dyn Pipeline,
    options: &ContentOptions,
) -> Result<ParseStatus, BackendError> {
    let result = drive_filter(input, filter, sink, options);
    let finished = sink.finish();
    let status = result?;
    finished?;
    Ok(status)
}

fn drive_filter(
    input: &[u8],
    filter: &mut dyn TokenFilter,
    sink: &mut dyn Pipeline,
    options: &ContentOptions,
) -> Result<ParseStatus, BackendError> {
    let mut output = FilterOutput::new(sink);
    for token in Tokenizer::with_options(input, options) {
        if filter.handle_token(&token, &mut output)? == Flow::Abort {
            return Ok(ParseStatus::Aborted);
        }
    }
    filter.handle_eof(&mut output)?;
    Ok(ParseStatus::Completed)
}

/// A content stream operator with its preceding operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operator name (e.g., `"BT"`, `"Tf"`, `"Tj"`, `"m"`); `"BI"` for inline images.
    pub operator: String,
    /// Operands that preceded this operator on the operand stack.
    pub operands: Vec<Operand>,
    /// The image, for `BI` operations.
    pub inline_image: Option<InlineImage>,
}

/// Groups content objects into [`Operation`]s.
#[derive(Debug, Default)]
pub struct OperationCollector {
    /// Completed operations, in content order.
    pub operations: Vec<Operation>,
    /// Errors reported during the parse.
    pub errors: Vec<LexicalError>,
    pending: Vec<Operand>,
}

impl OperationCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operands left over at the end of the content without an operator.
    pub fn trailing_operands(&self) -> &[Operand] {
        &self.pending
    }
}

impl ParserCallbacks for OperationCollector {
    fn handle_object(&mut self, object: ContentObject) -> Flow {
        match object {
            ContentObject::Operand(operand) => self.pending.push(operand),
            ContentObject::Operator(operator) => self.operations.push(Operation {
                operator,
                operands: std::mem::take(&mut self.pending),
                inline_image: None,
            }),
            ContentObject::InlineImage(image) => self.operations.push(Operation {
                operator: "BI".to_string(),
                operands: std::mem::take(&mut self.pending),
                inline_image: Some(image),
            }),
        }
        Flow::Continue
    }

    fn handle_error(&mut self, error: &LexicalError) -> Flow {
        self.errors.push(error.clone());
        Flow::Continue
    }
}

/// Parse `input` into operations, ignoring lexical errors.
pub fn collect_operations(input: &[u8]) -> Vec<Operation> {
    let mut collector = OperationCollector::new();
    parse_content(input, &mut collector);
    collector.operations
}
