//! Content stream tokenizer.
//!
//! Splits raw content stream bytes into a lazy sequence of lexical
//! [`Token`]s. Every byte of the input belongs to exactly one token, so
//! concatenating [`Token::raw`] over the whole sequence reproduces the input.
//! Malformed input never fails: it produces [`TokenKind::Bad`] tokens that
//! carry an error message.
//!
//! Inline image data (`BI ... ID <data> EI`) is captured as one opaque
//! [`TokenKind::InlineImage`] token and is never scanned for tokens.

use pdfpage_core::ContentOptions;

/// The lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Integer number (e.g., `42`, `-7`).
    Integer,
    /// Real number without exponent (e.g., `3.14`, `.5`, `-2.`).
    Real,
    /// Name object (e.g., `/F1`).
    Name,
    /// Literal string delimited by parentheses.
    LiteralString,
    /// Hexadecimal string delimited by angle brackets.
    HexString,
    /// `true` or `false`.
    Boolean,
    /// `null`.
    Null,
    /// Any other bare word; in a content stream this is an operator.
    Operator,
    /// `[`
    ArrayOpen,
    /// `]`
    ArrayClose,
    /// `<<`
    DictOpen,
    /// `>>`
    DictClose,
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
    /// Raw inline image bytes between `ID` and `EI`.
    InlineImage,
    /// A run of whitespace.
    Space,
    /// `%` up to (not including) the end of line.
    Comment,
    /// Malformed input; see [`Token::error`].
    Bad,
}

/// A lexical token from a content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,
    raw: Vec<u8>,
    value: Vec<u8>,
    error: Option<String>,
}

impl Token {
    fn new(kind: TokenKind, raw: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            kind,
            raw,
            value,
            error: None,
        }
    }

    fn bad(raw: Vec<u8>, error: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Bad,
            value: raw.clone(),
            raw,
            error: Some(error.into()),
        }
    }

    /// An operator token such as `Do` or `Tf`.
    pub fn operator(name: &str) -> Self {
        Self::new(
            TokenKind::Operator,
            name.as_bytes().to_vec(),
            name.as_bytes().to_vec(),
        )
    }

    /// A name token; `name` is given without the leading `/`.
    pub fn name(name: &str) -> Self {
        let mut raw = Vec::with_capacity(name.len() + 1);
        raw.push(b'/');
        for &b in name.as_bytes() {
            if b <= b' ' || b >= 0x7F || b == b'#' || is_delimiter(b) {
                raw.extend_from_slice(format!("#{b:02X}").as_bytes());
            } else {
                raw.push(b);
            }
        }
        Self::new(TokenKind::Name, raw, name.as_bytes().to_vec())
    }

    /// An integer token.
    pub fn integer(value: i64) -> Self {
        let text = value.to_string().into_bytes();
        Self::new(TokenKind::Integer, text.clone(), text)
    }

    /// A real number token, written without an exponent.
    pub fn real(value: f64) -> Self {
        let text = format_real(value).into_bytes();
        Self::new(TokenKind::Real, text.clone(), text)
    }

    /// A literal string token; `bytes` are the unescaped contents.
    pub fn literal_string(bytes: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(bytes.len() + 2);
        raw.push(b'(');
        for &b in bytes {
            match b {
                b'(' | b')' | b'\\' => {
                    raw.push(b'\\');
                    raw.push(b);
                }
                b'\r' => raw.extend_from_slice(b"\\r"),
                _ => raw.push(b),
            }
        }
        raw.push(b')');
        Self::new(TokenKind::LiteralString, raw, bytes.to_vec())
    }

    /// A single space.
    pub fn space() -> Self {
        Self::new(TokenKind::Space, b" ".to_vec(), b" ".to_vec())
    }

    /// A single newline.
    pub fn newline() -> Self {
        Self::new(TokenKind::Space, b"\n".to_vec(), b"\n".to_vec())
    }

    /// The token's lexical category.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The exact source bytes of this token.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The decoded payload.
    ///
    /// Names are returned without `/` and with `#xx` escapes decoded,
    /// strings with escapes or hex digits decoded, and every other kind
    /// as its raw bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Error message for [`TokenKind::Bad`] tokens.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true if this is the operator `name`.
    pub fn is_operator(&self, name: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == name.as_bytes()
    }

    /// Returns true for tokens other than whitespace and comments.
    pub fn is_significant(&self) -> bool {
        !matches!(self.kind, TokenKind::Space | TokenKind::Comment)
    }

    /// The decoded value as text, for names and operators.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// The value of an integer token.
    pub fn as_i64(&self) -> Option<i64> {
        match self.kind {
            TokenKind::Integer => std::str::from_utf8(&self.value).ok()?.parse().ok(),
            _ => None,
        }
    }

    /// The value of a numeric token.
    pub fn as_f64(&self) -> Option<f64> {
        match self.kind {
            TokenKind::Integer | TokenKind::Real => {
                std::str::from_utf8(&self.value).ok()?.parse().ok()
            }
            _ => None,
        }
    }
}

/// Format a real number without an exponent, trimming trailing zeros.
///
/// The decimal point is always kept so the text reads back as a real.
fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0.".to_string();
    }
    let mut text = format!("{value:.6}");
    while text.ends_with('0') {
        text.pop();
    }
    if text == "-." || text == "-0." {
        text = "0.".to_string();
    }
    text
}

/// Returns `true` if `b` is a PDF whitespace character.
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

/// Returns `true` if `b` is a PDF delimiter character.
pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Convert a hex digit character to its value (0-15).
fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn is_integer(run: &[u8]) -> bool {
    let digits = match run.first() {
        Some(b'+' | b'-') => &run[1..],
        _ => run,
    };
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}

fn is_real(run: &[u8]) -> bool {
    let body = match run.first() {
        Some(b'+' | b'-') => &run[1..],
        _ => run,
    };
    let dots = body.iter().filter(|&&b| b == b'.').count();
    dots == 1
        && body.iter().any(u8::is_ascii_digit)
        && body.iter().all(|&b| b == b'.' || b.is_ascii_digit())
}

/// Operators in content streams are short words such as `Tj`, `BDC`, or `T*`.
fn is_plausible_operator(word: &[u8]) -> bool {
    (1..=3).contains(&word.len())
        && word
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'*' | b'\'' | b'"'))
}

/// Bytes a single `EI` candidate may look ahead.
const LOOKAHEAD_WINDOW: usize = 4096;

/// Lookahead bytes allowed per byte of scanned inline image data.
const LOOKAHEAD_ALLOWANCE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// `ID` was just emitted; the next whitespace byte is the separator.
    ImageSeparator,
    /// Inside inline image data.
    ImageData,
}

/// Lazy tokenizer over a content stream.
///
/// ```ignore
/// use pdfpage_parse::tokenizer::{Tokenizer, TokenKind};
///
/// let kinds: Vec<TokenKind> = Tokenizer::new(b"/Im1 Do").map(|t| t.kind()).collect();
/// ```
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a [u8],
    pos: usize,
    mode: Mode,
    inline_images: bool,
    lookahead: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer with default options.
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_options(input, &ContentOptions::default())
    }

    /// Create a tokenizer honoring `options.inline_image_lookahead`.
    pub fn with_options(input: &'a [u8], options: &ContentOptions) -> Self {
        Self {
            input,
            pos: 0,
            mode: Mode::Normal,
            inline_images: true,
            lookahead: options.inline_image_lookahead,
        }
    }

    /// Byte offset of the next token.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        match self.mode {
            Mode::Normal => self.next_normal(),
            Mode::ImageSeparator => self.next_separator(),
            Mode::ImageData => Some(self.next_image_data()),
        }
    }

    fn take(&mut self, end: usize) -> Vec<u8> {
        let raw = self.input[self.pos..end].to_vec();
        self.pos = end;
        raw
    }

    fn next_separator(&mut self) -> Option<Token> {
        self.mode = Mode::ImageData;
        match self.input.get(self.pos) {
            Some(&b) if is_whitespace(b) => {
                let raw = self.take(self.pos + 1);
                Some(Token::new(TokenKind::Space, raw.clone(), raw))
            }
            _ => Some(self.next_image_data()),
        }
    }

    fn next_image_data(&mut self) -> Token {
        self.mode = Mode::Normal;
        let start = self.pos;
        match self.find_image_end(start) {
            Some(ei) => {
                // The whitespace byte in front of EI is left for the next
                // Space token unless it is the separator after ID.
                let end = if ei > start { ei - 1 } else { start };
                let raw = self.take(end);
                Token::new(TokenKind::InlineImage, raw.clone(), raw)
            }
            None => {
                let raw = self.take(self.input.len());
                Token::bad(raw, "unterminated inline image")
            }
        }
    }

    /// Find the offset of the `EI` that terminates inline image data
    /// starting at `start`.
    ///
    /// A candidate must be preceded by whitespace, followed by whitespace or
    /// end of input, and followed by tokens that look like content: no bad
    /// tokens and only short operator words. Lookahead is capped at a few
    /// bytes per scanned data byte; past that cap the next whitespace-framed
    /// candidate is taken as is.
    fn find_image_end(&self, start: usize) -> Option<usize> {
        let input = self.input;
        let mut looked_ahead = 0usize;
        let mut i = start;
        while i + 1 < input.len() {
            if input[i] == b'E'
                && input[i + 1] == b'I'
                && i >= 1
                && is_whitespace(input[i - 1])
                && input.get(i + 2).is_none_or(|&b| is_whitespace(b))
            {
                if looked_ahead > LOOKAHEAD_ALLOWANCE * (LOOKAHEAD_WINDOW + (i - start)) {
                    tracing::debug!(
                        offset = i,
                        looked_ahead,
                        "inline image lookahead budget spent"
                    );
                    return Some(i);
                }
                let (plausible, spent) = self.plausible_after(i + 2);
                looked_ahead += spent;
                if plausible {
                    return Some(i);
                }
                tracing::trace!(offset = i, "rejected EI candidate inside inline image data");
            }
            i += 1;
        }
        None
    }

    /// Check the tokens after a candidate `EI` at most [`LOOKAHEAD_WINDOW`]
    /// bytes ahead. Returns the verdict and the number of bytes examined.
    ///
    /// Reaching `ID` means the next inline image has started, whose data
    /// must not be tokenized. A token cut off by the window is inconclusive
    /// and counts as plausible.
    fn plausible_after(&self, pos: usize) -> (bool, usize) {
        let window_end = self.input.len().min(pos.saturating_add(LOOKAHEAD_WINDOW));
        let truncated = window_end < self.input.len();
        let mut ahead = Tokenizer {
            input: &self.input[..window_end],
            pos,
            mode: Mode::Normal,
            inline_images: false,
            lookahead: 0,
        };
        let mut seen = 0;
        let plausible = loop {
            if seen >= self.lookahead {
                break true;
            }
            let Some(token) = ahead.next_token() else {
                break true;
            };
            if truncated && ahead.pos == window_end {
                break true;
            }
            match token.kind {
                TokenKind::Space | TokenKind::Comment => continue,
                TokenKind::Bad => break false,
                TokenKind::Operator if token.value == b"ID" => break true,
                TokenKind::Operator if !is_plausible_operator(&token.value) => break false,
                _ => {}
            }
            seen += 1;
        };
        (plausible, ahead.pos - pos)
    }

    fn next_normal(&mut self) -> Option<Token> {
        let input = self.input;
        let start = self.pos;
        let b = *input.get(start)?;

        let token = match b {
            _ if is_whitespace(b) => {
                let end = self.scan_while(start, is_whitespace);
                let raw = self.take(end);
                Token::new(TokenKind::Space, raw.clone(), raw)
            }
            b'%' => {
                let end = self.scan_while(start, |c| c != b'\n' && c != b'\r');
                let raw = self.take(end);
                Token::new(TokenKind::Comment, raw.clone(), raw)
            }
            b'(' => self.literal_string(),
            b'<' if input.get(start + 1) == Some(&b'<') => {
                let raw = self.take(start + 2);
                Token::new(TokenKind::DictOpen, raw.clone(), raw)
            }
            b'<' => self.hex_string(),
            b'>' if input.get(start + 1) == Some(&b'>') => {
                let raw = self.take(start + 2);
                Token::new(TokenKind::DictClose, raw.clone(), raw)
            }
            b'>' => Token::bad(self.take(start + 1), "unexpected '>'"),
            b')' => Token::bad(self.take(start + 1), "unexpected ')'"),
            b'[' | b']' | b'{' | b'}' => {
                let kind = match b {
                    b'[' => TokenKind::ArrayOpen,
                    b']' => TokenKind::ArrayClose,
                    b'{' => TokenKind::BraceOpen,
                    _ => TokenKind::BraceClose,
                };
                let raw = self.take(start + 1);
                Token::new(kind, raw.clone(), raw)
            }
            b'/' => {
                let end = self.scan_while(start + 1, is_regular);
                let raw = self.take(end);
                let value = decode_name(&raw[1..]);
                Token::new(TokenKind::Name, raw, value)
            }
            _ => {
                let end = self.scan_while(start, is_regular);
                let raw = self.take(end);
                let kind = classify_word(&raw);
                if self.inline_images && kind == TokenKind::Operator && raw == b"ID" {
                    self.mode = Mode::ImageSeparator;
                }
                Token::new(kind, raw.clone(), raw)
            }
        };
        Some(token)
    }

    fn scan_while(&self, from: usize, pred: impl Fn(u8) -> bool) -> usize {
        let mut end = from;
        while end < self.input.len() && pred(self.input[end]) {
            end += 1;
        }
        end
    }

    /// Parse a literal string `(...)` with balanced parentheses and escape sequences.
    fn literal_string(&mut self) -> Token {
        let input = self.input;
        let mut pos = self.pos + 1;
        let mut value = Vec::new();
        let mut depth = 1u32;

        while pos < input.len() {
            let b = input[pos];
            match b {
                b'(' => {
                    depth += 1;
                    value.push(b'(');
                    pos += 1;
                }
                b')' => {
                    depth -= 1;
                    pos += 1;
                    if depth == 0 {
                        let raw = self.take(pos);
                        return Token::new(TokenKind::LiteralString, raw, value);
                    }
                    value.push(b')');
                }
                b'\\' => {
                    pos += 1;
                    let Some(&escaped) = input.get(pos) else {
                        break;
                    };
                    match escaped {
                        b'n' => value.push(b'\n'),
                        b'r' => value.push(b'\r'),
                        b't' => value.push(b'\t'),
                        b'b' => value.push(0x08),
                        b'f' => value.push(0x0C),
                        b'\r' => {
                            // Backslash + CR (or CR+LF) = line continuation
                            if input.get(pos + 1) == Some(&b'\n') {
                                pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut val = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match input.get(pos + 1) {
                                    Some(&d @ b'0'..=b'7') => {
                                        pos += 1;
                                        val = val * 8 + u32::from(d - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            value.push((val & 0xFF) as u8);
                        }
                        // Unknown escapes (including \( \) \\) keep the character.
                        other => value.push(other),
                    }
                    pos += 1;
                }
                _ => {
                    value.push(b);
                    pos += 1;
                }
            }
        }

        let raw = self.take(input.len());
        Token::bad(raw, "unterminated literal string")
    }

    /// Parse a hex string `<...>`.
    fn hex_string(&mut self) -> Token {
        let input = self.input;
        let mut pos = self.pos + 1;
        let mut digits = Vec::new();
        let mut invalid = None;

        while pos < input.len() {
            let b = input[pos];
            pos += 1;
            if b == b'>' {
                let raw = self.take(pos);
                if let Some(c) = invalid {
                    return Token::bad(raw, format!("invalid hex digit: {:?}", c as char));
                }
                return Token::new(TokenKind::HexString, raw, pack_hex(&digits));
            }
            if is_whitespace(b) {
                continue;
            }
            match hex_digit(b) {
                Some(d) => digits.push(d),
                None => {
                    invalid.get_or_insert(b);
                }
            }
        }

        let raw = self.take(input.len());
        Token::bad(raw, "unterminated hex string")
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Pack hex digit values into bytes; an odd trailing digit is padded with 0.
fn pack_hex(digits: &[u8]) -> Vec<u8> {
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Decode `#XX` hex escapes in a name body.
fn decode_name(raw: &[u8]) -> Vec<u8> {
    let mut name = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(raw[i + 1]), hex_digit(raw[i + 2])) {
                name.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        name.push(raw[i]);
        i += 1;
    }
    name
}

fn classify_word(run: &[u8]) -> TokenKind {
    match run {
        b"true" | b"false" => TokenKind::Boolean,
        b"null" => TokenKind::Null,
        _ if is_integer(run) => TokenKind::Integer,
        _ if is_real(run) => TokenKind::Real,
        _ => TokenKind::Operator,
    }
}

/// Tokenize a whole buffer eagerly.
pub fn tokenize(input: &[u8]) -> Vec<Token> {
    Tokenizer::new(input).collect()
}
