//! Command serialization helpers.

use super::{FetchAttribute, SearchCriteria};

/// Writes an astring: a bare atom when safe, otherwise a quoted string.
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if !s.is_empty() && !s.bytes().any(needs_quoting) {
        buf.extend_from_slice(s.as_bytes());
        return;
    }

    buf.push(b'"');
    for b in s.bytes() {
        if matches!(b, b'"' | b'\\') {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Writes a LIST pattern. Wildcards stay bare so `*` and `%` keep their
/// meaning.
pub fn write_list_pattern(buf: &mut Vec<u8>, pattern: &str) {
    if !pattern.is_empty() && pattern.bytes().all(|b| b == b'*' || b == b'%' || !needs_quoting(b)) {
        buf.extend_from_slice(pattern.as_bytes());
    } else {
        write_astring(buf, pattern);
    }
}

const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'}' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

/// Writes a parenthesized FETCH item list.
pub fn write_fetch_items(buf: &mut Vec<u8>, items: &[FetchAttribute]) {
    buf.push(b'(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write_fetch_attribute(buf, item);
    }
    buf.push(b')');
}

fn write_fetch_attribute(buf: &mut Vec<u8>, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
        FetchAttribute::Envelope => buf.extend_from_slice(b"ENVELOPE"),
        FetchAttribute::BodyStructure => buf.extend_from_slice(b"BODYSTRUCTURE"),
        FetchAttribute::BodyPeek(section) => {
            buf.extend_from_slice(b"BODY.PEEK[");
            if let Some(section) = section {
                buf.extend_from_slice(section.as_bytes());
            }
            buf.push(b']');
        }
    }
}

/// Writes SEARCH criteria.
pub fn write_search_criteria(buf: &mut Vec<u8>, criteria: SearchCriteria) {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::NotDeleted => buf.extend_from_slice(b"NOT DELETED"),
    }
}
