//! Cooked Cache-Control / Pragma cache, recomputed incrementally whenever a
//! field flagged `COOKED` is mutated (spec.md §4.4).
//!
//! Grounded in `mime_hdr_cooked_cache_set` in
//! `original_source/proxy/hdrs/MIME.cc`.

use crate::wks::{self, WksKind};

/// "max-stale present with no value" saturates to this (spec.md §9 keeps
/// this as specified, noting it may be a source quirk).
pub const MAX_STALE_NO_VALUE: i32 = i32::MAX;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControlCooked {
    /// 13-bit directive mask, one bit per `WksKind::CacheControlDirective`.
    pub mask: u16,
    pub max_age: i32,
    pub s_maxage: i32,
    pub max_stale: i32,
    pub min_fresh: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PragmaCooked {
    pub no_cache: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookedCache {
    pub cache_control: CacheControlCooked,
    pub pragma: PragmaCooked,
}

/// Parses one directive token (already comma-split and trimmed) against
/// the integer-argument directives (`max-age`, `s-maxage`, `max-stale`,
/// `min-fresh`). Returns `None` if the token isn't one of these, or if it
/// is but is malformed in a way that means "skip, contributes nothing".
fn try_int_directive(token: &str, cc: &mut CacheControlCooked) -> bool {
    let Some(eq_pos) = token.find('=') else {
        // `max-stale` bare (no `=`) is the one directive allowed to omit
        // its value; it saturates per spec.md §4.4 / §9.
        if token == "max-stale" {
            let idx = wks::tokenize_value("max-stale");
            if let WksKind::CacheControlDirective { cooked_bit, .. } = wks::entry(idx).kind {
                cc.mask |= 1 << cooked_bit;
            }
            cc.max_stale = MAX_STALE_NO_VALUE;
            return true;
        }
        return false;
    };
    let name = &token[..eq_pos];
    let value = &token[eq_pos + 1..];
    let idx = wks::tokenize_value(name);
    if idx == wks::NOT_WKS {
        return false;
    }
    let WksKind::CacheControlDirective {
        cooked_bit,
        takes_int_arg,
    } = wks::entry(idx).kind
    else {
        return false;
    };
    if !takes_int_arg {
        return false;
    }
    // Malformed `=`: surrounding whitespace, quotes, non-digit characters,
    // a decimal point — silently skip (spec.md §4.4).
    if value.is_empty()
        || value.starts_with(' ')
        || value.ends_with(' ')
        || value.starts_with('"')
        || value.contains('.')
        || !value.bytes().all(|b| b.is_ascii_digit())
    {
        return false;
    }
    let Ok(parsed) = value.parse::<i32>() else {
        return false;
    };
    cc.mask |= 1 << cooked_bit;
    match name {
        "max-age" => cc.max_age = parsed,
        "s-maxage" => cc.s_maxage = parsed,
        "max-stale" => cc.max_stale = parsed,
        "min-fresh" => cc.min_fresh = parsed,
        _ => {}
    }
    true
}

/// Recomputes the cooked Cache-Control state from the raw header values.
/// `values` is every live Cache-Control field occurrence's value (there may
/// be more than one field with this name).
pub fn recompute_cache_control<'a>(values: impl Iterator<Item = &'a str>) -> CacheControlCooked {
    let mut cc = CacheControlCooked::default();
    for value in values {
        for raw_token in value.split(',') {
            // A `;` is part of a single directive token, not a separator:
            // `public; max-age=30` is one token that matches no known
            // directive, so it contributes nothing (spec.md §4.4, scenario 3).
            let token = raw_token.trim();
            if token.is_empty() {
                continue;
            }
            if try_int_directive(token, &mut cc) {
                continue;
            }
            let idx = wks::tokenize_value(token);
            if idx == wks::NOT_WKS {
                continue;
            }
            if let WksKind::CacheControlDirective {
                cooked_bit,
                takes_int_arg: false,
            } = wks::entry(idx).kind
            {
                cc.mask |= 1 << cooked_bit;
            }
        }
    }
    cc
}

/// Recomputes the cooked Pragma state: `no_cache` iff any directive token
/// tokenizes to `no-cache` (spec.md §4.4).
pub fn recompute_pragma<'a>(values: impl Iterator<Item = &'a str>) -> PragmaCooked {
    let mut p = PragmaCooked::default();
    for value in values {
        for raw_token in value.split(',') {
            let token = raw_token.trim();
            if wks::tokenize_pragma(token) != wks::NOT_WKS {
                p.no_cache = true;
            }
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_directives_and_integers() {
        let cc = recompute_cache_control(std::iter::once(
            "public, max-age=300, s-maxage=600",
        ));
        assert_eq!(cc.max_age, 300);
        assert_eq!(cc.s_maxage, 600);
        assert_ne!(cc.mask, 0);
    }

    #[test]
    fn semicolon_makes_directives_unrecognized() {
        let cc = recompute_cache_control(std::iter::once("public; max-age=30"));
        assert_eq!(cc.mask, 0);
        assert_eq!(cc.max_age, 0);
    }

    #[test]
    fn max_stale_bare_saturates() {
        let cc = recompute_cache_control(std::iter::once("max-stale"));
        assert_eq!(cc.max_stale, MAX_STALE_NO_VALUE);
        assert_ne!(cc.mask, 0);
    }

    #[test]
    fn malformed_equals_is_skipped() {
        let cc = recompute_cache_control(std::iter::once("max-age = 30"));
        assert_eq!(cc.max_age, 0);
        let cc2 = recompute_cache_control(std::iter::once("max-age=\"30\""));
        assert_eq!(cc2.max_age, 0);
        let cc3 = recompute_cache_control(std::iter::once("max-age=30.5"));
        assert_eq!(cc3.max_age, 0);
    }

    #[test]
    fn pragma_no_cache() {
        let p = recompute_pragma(std::iter::once("no-cache"));
        assert!(p.no_cache);
        let p2 = recompute_pragma(std::iter::once("something-else"));
        assert!(!p2.no_cache);
    }
}
