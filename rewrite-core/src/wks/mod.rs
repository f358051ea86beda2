//! Well-known string (WKS) table.
//!
//! Interns the closed set of field names and directive-value tokens the
//! engine cares about and hands back a stable integer index (`wks_idx`)
//! that every other component uses as an O(1) identity instead of
//! comparing strings. Built once at process startup and immutable after
//! that, per spec.md §5.

mod table;

pub use table::{WksEntry, WksKind, ACCEL_SLOT_COUNT, ACCEL_UNKNOWN, NOT_WKS};

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Stable integer identity for a well-known string. `-1` (`NOT_WKS`) means
/// "not interned" — the caller must fall back to verbatim string storage.
pub type WksIdx = i16;

lazy_static! {
    /// Case-insensitive lookup from header field name to `wks_idx`.
    static ref FIELD_NAME_INDEX: HashMap<String, WksIdx> = {
        let mut m = HashMap::new();
        for (idx, entry) in table::WKS_TABLE.iter().enumerate() {
            if matches!(entry.kind, WksKind::HeaderField) {
                m.insert(entry.name.to_ascii_lowercase(), idx as WksIdx);
            }
        }
        m
    };

    /// Case-sensitive lookup from Cache-Control directive token to `wks_idx`.
    static ref VALUE_TOKEN_INDEX: HashMap<&'static str, WksIdx> = {
        let mut m = HashMap::new();
        for (idx, entry) in table::WKS_TABLE.iter().enumerate() {
            if matches!(entry.kind, WksKind::CacheControlDirective { .. }) {
                m.insert(entry.name, idx as WksIdx);
            }
        }
        m
    };

    /// Case-sensitive lookup from Pragma directive token to `wks_idx`. Kept
    /// separate from `VALUE_TOKEN_INDEX` because "no-cache" is a valid
    /// token for both Cache-Control and Pragma with distinct WKS entries.
    static ref PRAGMA_TOKEN_INDEX: HashMap<&'static str, WksIdx> = {
        let mut m = HashMap::new();
        for (idx, entry) in table::WKS_TABLE.iter().enumerate() {
            if matches!(entry.kind, WksKind::PragmaDirective) {
                m.insert(entry.name, idx as WksIdx);
            }
        }
        m
    };

    /// Case-insensitive lookup from compiler keyword (condition/operator
    /// names, hook selectors, modifiers) to its canonical spelling.
    static ref KEYWORD_INDEX: HashMap<String, &'static str> = {
        let mut m = HashMap::new();
        for kw in table::KEYWORD_TABLE.iter() {
            m.insert(kw.to_ascii_uppercase(), *kw);
        }
        m
    };
}

/// Interns a header field name. Case-insensitive, as per spec.md §4.1.
pub fn tokenize_field(name: &str) -> WksIdx {
    FIELD_NAME_INDEX
        .get(&name.to_ascii_lowercase())
        .copied()
        .unwrap_or(NOT_WKS)
}

/// Interns a Cache-Control directive token. Case-sensitive, per spec.md §4.1.
pub fn tokenize_value(token: &str) -> WksIdx {
    VALUE_TOKEN_INDEX.get(token).copied().unwrap_or(NOT_WKS)
}

/// Interns a Pragma directive token. Case-sensitive, per spec.md §4.1.
pub fn tokenize_pragma(token: &str) -> WksIdx {
    PRAGMA_TOKEN_INDEX.get(token).copied().unwrap_or(NOT_WKS)
}

/// True iff `idx` names the `Cache-Control` or `Pragma` header field, i.e.
/// any field with this WKS must carry the `COOKED` flag.
pub fn is_cooked_header(idx: WksIdx) -> bool {
    if idx == NOT_WKS {
        return false;
    }
    let e = entry(idx);
    matches!(e.kind, WksKind::HeaderField) && (e.name == "Cache-Control" || e.name == "Pragma")
}

/// True iff `idx` names the `Cache-Control` header field specifically.
pub fn is_cache_control(idx: WksIdx) -> bool {
    idx != NOT_WKS && entry(idx).name == "Cache-Control" && matches!(entry(idx).kind, WksKind::HeaderField)
}

/// True iff `idx` names the `Pragma` header field specifically.
pub fn is_pragma(idx: WksIdx) -> bool {
    idx != NOT_WKS && entry(idx).name == "Pragma" && matches!(entry(idx).kind, WksKind::HeaderField)
}

/// Resolves a rule-file keyword (condition/operator/hook-selector name) to
/// its canonical spelling, case-insensitively. Used by the compiler.
pub fn tokenize_keyword(word: &str) -> Option<&'static str> {
    KEYWORD_INDEX.get(&word.to_ascii_uppercase()).copied()
}

/// Looks up a WKS entry by index. Panics on an out-of-range index — callers
/// only ever pass indices obtained from `tokenize_*`, never arbitrary
/// integers, so an out-of-range index is a programming error, not user input.
pub fn entry(idx: WksIdx) -> &'static WksEntry {
    &table::WKS_TABLE[idx as usize]
}

/// Canonical string for a WKS index.
pub fn canonical_str(idx: WksIdx) -> &'static str {
    entry(idx).name
}

/// Length in bytes of the canonical string for a WKS index.
pub fn canonical_len(idx: WksIdx) -> usize {
    entry(idx).name.len()
}

/// Presence-bitmap bit for a WKS index, if this WKS participates in MIME
/// header presence tracking (only header-field WKS entries do).
pub fn presence_mask(idx: WksIdx) -> Option<u64> {
    entry(idx).presence_bit.map(|b| 1u64 << b)
}

/// Slot-accelerator id in `[0, ACCEL_SLOT_COUNT)` for the hottest WKS
/// header field names, if any.
pub fn accel_slot(idx: WksIdx) -> Option<u8> {
    entry(idx).accel_slot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup_is_case_insensitive() {
        let a = tokenize_field("Host");
        let b = tokenize_field("hOST");
        assert_ne!(a, NOT_WKS);
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_field_is_not_wks() {
        assert_eq!(tokenize_field("X-My-Custom-Header"), NOT_WKS);
    }

    #[test]
    fn value_token_lookup_is_case_sensitive() {
        let a = tokenize_value("no-cache");
        let b = tokenize_value("No-Cache");
        assert_ne!(a, NOT_WKS);
        assert_eq!(b, NOT_WKS);
    }

    #[test]
    fn presence_mask_only_on_header_fields() {
        let host = tokenize_field("Host");
        assert!(presence_mask(host).is_some());
        let max_age = tokenize_value("max-age");
        assert!(presence_mask(max_age).is_none());
    }

    #[test]
    fn accel_slots_are_unique_and_in_range() {
        let mut seen = std::collections::HashSet::new();
        for entry in table::WKS_TABLE.iter() {
            if let Some(slot) = entry.accel_slot {
                assert!((slot as usize) < ACCEL_SLOT_COUNT);
                assert!(seen.insert(slot), "duplicate accel slot {slot}");
            }
        }
    }

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        assert_eq!(tokenize_keyword("status"), Some("STATUS"));
        assert_eq!(tokenize_keyword("Set-Header"), Some("SET-HEADER"));
        assert_eq!(tokenize_keyword("not-a-keyword"), None);
    }
}
