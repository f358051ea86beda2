//! Line-oriented MIME header block parser.
//!
//! A 4-state scanner over raw bytes: looking for the start of a line,
//! having seen a bare `\r`, inside a field's value (including folded
//! continuation lines), and just past a line terminator deciding whether
//! the next line folds into the previous field or starts a new one.
//! Grounded in `MIMEScanner`/`mime_parser_parse` in
//! `original_source/proxy/hdrs/MIME.cc`.

use super::header;
use crate::error::MimeParseError;
use crate::heap::{HeaderHeap, ObjHandle};

/// Individual field lines longer than this are rejected outright, matching
/// the original's `MAX_MIME_FIELD_LEN` (spec.md §4.3 keeps this limit).
pub const MAX_FIELD_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the start of a line (or input).
    StartLine,
    /// Accumulating a field's name/value, possibly spanning folded lines.
    InField,
    /// Just consumed `\r`, waiting to see if `\n` follows.
    SeenCr,
}

struct RawField<'a> {
    name: &'a [u8],
    value: Vec<u8>,
}

/// Splits a raw header block into `(name, value)` pairs, honoring RFC 822
/// line folding (a continuation line starts with space or tab). Lines that
/// don't begin with a token character (and aren't a fold) are silently
/// dropped, matching the original scanner's tolerance of stray input.
fn split_fields(block: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, MimeParseError> {
    let mut fields: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    let mut state = State::StartLine;
    let mut line_start = 0usize;
    let mut i = 0usize;

    while i < block.len() {
        let b = block[i];
        if b == 0 {
            return Err(MimeParseError::EmbeddedNul);
        }
        match state {
            State::StartLine | State::InField => {
                if b == b'\r' {
                    state = State::SeenCr;
                } else if b == b'\n' {
                    push_line(&mut fields, &block[line_start..i])?;
                    line_start = i + 1;
                    state = State::StartLine;
                } else {
                    state = State::InField;
                }
            }
            State::SeenCr => {
                if b == b'\n' {
                    push_line(&mut fields, &block[line_start..i - 1])?;
                    line_start = i + 1;
                    state = State::StartLine;
                } else {
                    // Bare CR not followed by LF: treat as part of the line.
                    state = State::InField;
                }
            }
        }
        i += 1;
    }
    if line_start < block.len() {
        push_line(&mut fields, &block[line_start..])?;
    }
    Ok(fields)
}

fn push_line(fields: &mut Vec<(Vec<u8>, Vec<u8>)>, line: &[u8]) -> Result<(), MimeParseError> {
    if line.is_empty() {
        return Ok(());
    }
    if line.len() > MAX_FIELD_LEN {
        return Err(MimeParseError::FieldTooLong);
    }
    if line[0] == b' ' || line[0] == b'\t' {
        // Folded continuation of the previous field's value.
        if let Some((_, value)) = fields.last_mut() {
            value.push(b' ');
            value.extend_from_slice(trim(line));
        }
        return Ok(());
    }
    let Some(colon) = line.iter().position(|&b| b == b':') else {
        // Not a token-char line, not a fold: silently dropped.
        return Ok(());
    };
    let name = &line[..colon];
    if name.is_empty() || name.iter().any(|&b| b == b' ' || b == b'\t') {
        return Err(MimeParseError::WhitespaceBeforeColon);
    }
    let value = trim(&line[colon + 1..]);
    fields.push((name.to_vec(), value.to_vec()));
    Ok(())
}

fn trim(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&b| b != b' ' && b != b'\t').unwrap_or(s.len());
    let end = s.iter().rposition(|&b| b != b' ' && b != b'\t' && b != b'\r').map(|p| p + 1).unwrap_or(start);
    &s[start..end]
}

/// Parses a raw header block (as transmitted on the wire, sans the blank
/// line that terminates it) into a freshly created [`MimeHeader`] object,
/// attaching each field in the order encountered.
pub fn parse(heap: &mut HeaderHeap, block: &[u8]) -> Result<ObjHandle, MimeParseError> {
    let fields = split_fields(block)?;
    let mime = header::create(heap);
    for (name, value) in fields {
        let name = String::from_utf8_lossy(&name).into_owned();
        let value = String::from_utf8_lossy(&value).into_owned();
        header::add_header(heap, mime, &name, &value);
    }
    Ok(mime)
}

/// Serializes a header back to wire format: `Name: value\r\n` per live
/// field occurrence, in block/slot order, no trailing blank line.
pub fn print(heap: &HeaderHeap, mime: ObjHandle) -> String {
    let mut out = String::new();
    for addr in header::iter_all_fields(heap, mime) {
        let field = heap.field_block(addr.0).slot(addr.1);
        out.push_str(heap.str_str(field.name));
        out.push_str(": ");
        out.push_str(heap.str_str(field.value));
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_fields() {
        let mut heap = HeaderHeap::new();
        let mime = parse(&mut heap, b"Host: example.com\r\nX-Test: 1\r\n").unwrap();
        let head = header::field_find(&heap, mime, "Host").unwrap();
        assert_eq!(heap.str_str(heap.field_block(head.0).slot(head.1).value), "example.com");
        assert_eq!(header::fields_count(&heap, mime), 2);
    }

    #[test]
    fn folded_continuation_joins_value() {
        let mut heap = HeaderHeap::new();
        let mime = parse(&mut heap, b"X-Long: part one\r\n  part two\r\n").unwrap();
        let head = header::field_find(&heap, mime, "X-Long").unwrap();
        assert_eq!(
            heap.str_str(heap.field_block(head.0).slot(head.1).value),
            "part one part two"
        );
    }

    #[test]
    fn embedded_nul_rejected() {
        let mut heap = HeaderHeap::new();
        let err = parse(&mut heap, b"Host: exa\0mple.com\r\n").unwrap_err();
        assert_eq!(err, MimeParseError::EmbeddedNul);
    }

    #[test]
    fn whitespace_before_colon_rejected() {
        let mut heap = HeaderHeap::new();
        let err = parse(&mut heap, b"Host : example.com\r\n").unwrap_err();
        assert_eq!(err, MimeParseError::WhitespaceBeforeColon);
    }

    #[test]
    fn stray_line_without_colon_dropped() {
        let mut heap = HeaderHeap::new();
        let mime = parse(&mut heap, b"not a field\r\nHost: example.com\r\n").unwrap();
        assert_eq!(header::fields_count(&heap, mime), 1);
    }

    #[test]
    fn round_trip_print() {
        let mut heap = HeaderHeap::new();
        let mime = parse(&mut heap, b"Host: example.com\r\n").unwrap();
        assert_eq!(print(&heap, mime), "Host: example.com\r\n");
    }
}
