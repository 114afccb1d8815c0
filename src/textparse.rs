//! In-process textual include extractor.
//!
//! Line-oriented byte scan: a directive is `#`, optional whitespace,
//! `include` or `include_next`, then a `<...>` or `"..."` operand. No
//! preprocessor evaluation: conditional blocks, macro-computed
//! includes, and block comments wrapping a directive are all out of
//! scope, so a `#include` behind `#if 0` is still reported. That
//! over-approximation is the point: the result bounds the compiler's
//! possible inputs.

use std::fs;
use std::path::PathBuf;

use memchr::{memchr, memchr_iter};

use crate::artifact::Artifact;
use crate::error::ScanError;
use crate::hints::{Hints, StaticHints};
use crate::inclusion::{IncludeKind, Inclusion};
use crate::parser::{IncludeParser, ScanContext};

/// Reads artifacts beneath an exec root and extracts their directives.
pub struct TextIncludeParser {
    exec_root: PathBuf,
    hints: Option<StaticHints>,
}

impl TextIncludeParser {
    pub fn new(exec_root: PathBuf) -> Self {
        Self {
            exec_root,
            hints: None,
        }
    }

    /// Attaches a hint table served through [`IncludeParser::hints`].
    pub fn with_hints(mut self, hints: StaticHints) -> Self {
        self.hints = Some(hints);
        self
    }
}

impl IncludeParser for TextIncludeParser {
    fn extract_inclusions(
        &self,
        file: &Artifact,
        _ctx: &ScanContext,
        _treat_as_generated: bool,
    ) -> Result<Vec<Inclusion>, ScanError> {
        let on_disk = if file.exec_path().is_absolute() {
            file.exec_path().to_path_buf()
        } else {
            self.exec_root.join(file.exec_path())
        };
        let data = fs::read(on_disk)?;
        Ok(extract_from_bytes(&data))
    }

    fn hints(&self) -> Option<&dyn Hints> {
        self.hints.as_ref().map(|h| h as &dyn Hints)
    }
}

/// Extracts directives from raw file contents, in source order.
pub fn extract_from_bytes(data: &[u8]) -> Vec<Inclusion> {
    let mut out = Vec::new();
    let mut start = 0;
    for nl in memchr_iter(b'\n', data) {
        if let Some(inclusion) = parse_line(&data[start..nl]) {
            out.push(inclusion);
        }
        start = nl + 1;
    }
    if start < data.len() {
        if let Some(inclusion) = parse_line(&data[start..]) {
            out.push(inclusion);
        }
    }
    out
}

fn parse_line(line: &[u8]) -> Option<Inclusion> {
    let line = skip_ws(line);
    let rest = line.strip_prefix(b"#")?;
    let rest = skip_ws(rest);

    let (rest, next) = if let Some(r) = strip_keyword(rest, b"include_next") {
        (r, true)
    } else if let Some(r) = strip_keyword(rest, b"include") {
        (r, false)
    } else {
        return None;
    };

    let rest = skip_ws(rest);
    let (close, quote) = match *rest.first()? {
        b'<' => (b'>', false),
        b'"' => (b'"', true),
        _ => return None,
    };
    let operand = &rest[1..];
    let end = memchr(close, operand)?;
    if end == 0 {
        return None;
    }
    let name = std::str::from_utf8(&operand[..end]).ok()?;
    let kind = match (next, quote) {
        (false, true) => IncludeKind::Quote,
        (false, false) => IncludeKind::Angle,
        (true, true) => IncludeKind::NextQuote,
        (true, false) => IncludeKind::NextAngle,
    };
    Some(Inclusion::new(kind, name))
}

#[inline]
fn skip_ws(bytes: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    &bytes[i..]
}

/// Strips `keyword` only when it is delimited (not a prefix of a longer
/// identifier such as `includable`).
fn strip_keyword<'a>(bytes: &'a [u8], keyword: &[u8]) -> Option<&'a [u8]> {
    let rest = bytes.strip_prefix(keyword)?;
    match rest.first() {
        Some(b) if b.is_ascii_alphanumeric() || *b == b'_' => None,
        _ => Some(rest),
    }
}
