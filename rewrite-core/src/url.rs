//! URL object: a tokenized URL allocated in a header heap.
//!
//! Grounded in `original_source/include/proxy/hdrs/URL.h`. Nine
//! `(ptr,len)` components plus port, type, RFC-1738 type code, and the
//! "path was absolutely empty" flag are kept verbatim; `scheme/host/...`
//! here are `StrRef`s into the owning [`crate::heap::HeaderHeap`]'s string
//! heap rather than raw pointers.

use crate::heap::{HeaderHeap, StrRef};
use std::fmt::Write as _;

/// The scheme this URL was parsed/printed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlType {
    #[default]
    None,
    Http,
    Https,
}

impl UrlType {
    /// The single-character RFC 1738 type code ATS stamps on URLs.
    pub fn rfc1738_code(self) -> char {
        match self {
            UrlType::None => '?',
            UrlType::Http => 'h',
            UrlType::Https => 's',
        }
    }

    pub fn scheme_str(self) -> &'static str {
        match self {
            UrlType::None => "",
            UrlType::Http => "http",
            UrlType::Https => "https",
        }
    }

    /// `port == 0` canonicalizes to 80/443 for HTTP/HTTPS (spec.md §4.3).
    pub fn canonical_port(self) -> Option<u16> {
        match self {
            UrlType::None => None,
            UrlType::Http => Some(80),
            UrlType::Https => Some(443),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            UrlType::None => 0,
            UrlType::Http => 1,
            UrlType::Https => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            1 => UrlType::Http,
            2 => UrlType::Https,
            _ => UrlType::None,
        }
    }
}

/// Normalization flags controlling `url_print`/`url_length_get`. Hand-rolled
/// rather than pulling in the `bitflags` crate for three bits — matches the
/// flag-constant style `original_source/proxy/hdrs/MIME.h` uses for its own
/// field flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintFlags(pub u8);

impl PrintFlags {
    pub const NONE: PrintFlags = PrintFlags(0);
    pub const IMPLIED_SCHEME: PrintFlags = PrintFlags(1 << 0);
    pub const LC_SCHEME_HOST: PrintFlags = PrintFlags(1 << 1);

    pub fn contains(self, other: PrintFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn union(self, other: PrintFlags) -> PrintFlags {
        PrintFlags(self.0 | other.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Component(StrRef);

impl Component {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A parsed URL allocated in a [`HeaderHeap`].
#[derive(Debug, Clone, Default)]
pub struct Url {
    scheme: Component,
    user: Component,
    password: Component,
    host: Component,
    path: Component,
    params: Component,
    query: Component,
    fragment: Component,
    port: u16,
    url_type: UrlType,
    /// True iff the path component was present but syntactically empty
    /// (e.g. `http://host` with no trailing slash at all) — distinct from
    /// "no path component was ever set".
    path_absolutely_empty: bool,
}

/// Strictness mode for [`Url::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Rejects characters outside the RFC 3986 allowed set.
    Strict,
    /// Accepts a superset, used when the URL embeds regex back-references
    /// and stray characters are expected.
    Lenient,
    /// Treats the first `/` as the authority/path boundary and does not
    /// interpret `?` inside the authority — used for `parse_regex`.
    Regex,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlParseError {
    #[error("invalid character {0:?} at byte offset {1}")]
    InvalidCharacter(char, usize),
    #[error("invalid port number")]
    InvalidPort,
}

impl Url {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- setters: copy or reference depending on `copy_string` ----

    pub fn set_scheme(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.scheme = Component(store(heap, s, copy_string));
        self.url_type = match s.to_ascii_lowercase().as_str() {
            "https" => UrlType::Https,
            "http" => UrlType::Http,
            _ => self.url_type,
        };
    }

    pub fn set_user(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.user = Component(store(heap, s, copy_string));
    }

    pub fn set_password(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.password = Component(store(heap, s, copy_string));
    }

    pub fn set_host(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.host = Component(store(heap, s, copy_string));
    }

    pub fn set_path(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.path_absolutely_empty = s.is_empty();
        self.path = Component(store(heap, s, copy_string));
    }

    pub fn set_params(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.params = Component(store(heap, s, copy_string));
    }

    pub fn set_query(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.query = Component(store(heap, s, copy_string));
    }

    pub fn set_fragment(&mut self, heap: &mut HeaderHeap, s: &str, copy_string: bool) {
        self.fragment = Component(store(heap, s, copy_string));
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn set_url_type(&mut self, t: UrlType) {
        self.url_type = t;
    }

    // ---- getters ----

    pub fn scheme<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.scheme.0)
    }
    pub fn user<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.user.0)
    }
    pub fn password<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.password.0)
    }
    pub fn host<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.host.0)
    }
    pub fn path<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.path.0)
    }
    pub fn params<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.params.0)
    }
    pub fn query<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.query.0)
    }
    pub fn fragment<'h>(&self, heap: &'h HeaderHeap) -> &'h str {
        heap.str_str(self.fragment.0)
    }

    pub fn url_type(&self) -> UrlType {
        self.url_type
    }

    pub fn path_is_absolutely_empty(&self) -> bool {
        self.path_absolutely_empty
    }

    /// The raw stored port (`0` if none was ever set), as opposed to
    /// [`Url::port`]'s canonical-fallback value. Used by marshal, which
    /// must round-trip exactly what was stored.
    pub fn port_raw(&self) -> u16 {
        self.port
    }

    /// The effective port: the stored port, or the canonical port for this
    /// URL's scheme if none was given.
    pub fn port(&self) -> u16 {
        if self.port == 0 {
            self.url_type.canonical_port().unwrap_or(0)
        } else {
            self.port
        }
    }

    /// Overwrites every component at once from already-allocated `StrRef`s.
    /// Used by marshal, which duplicates each string into the heap itself
    /// (avoiding the double mutable borrow a setter taking both `&mut self`
    /// and `&mut HeaderHeap` would require once `self` is already borrowed
    /// out of the heap via a handle).
    pub(crate) fn set_components_from_refs(&mut self, refs: [StrRef; 8]) {
        self.scheme = Component(refs[0]);
        self.user = Component(refs[1]);
        self.password = Component(refs[2]);
        self.host = Component(refs[3]);
        self.path = Component(refs[4]);
        self.params = Component(refs[5]);
        self.query = Component(refs[6]);
        self.fragment = Component(refs[7]);
        self.path_absolutely_empty = refs[4].is_empty();
    }

    pub(crate) fn str_refs(&self) -> [StrRef; 8] {
        [
            self.scheme.0,
            self.user.0,
            self.password.0,
            self.host.0,
            self.path.0,
            self.params.0,
            self.query.0,
            self.fragment.0,
        ]
    }

    // ---- parsing ----

    /// Parses `text[start..end]` into `self`. `start`/`end` index into
    /// `text`; both strict and lenient modes are supported per spec.md §4.3.
    pub fn parse(
        &mut self,
        heap: &mut HeaderHeap,
        text: &str,
        mode: ParseMode,
    ) -> Result<(), UrlParseError> {
        let s = text;
        let rest = if let Some(idx) = s.find("://") {
            let scheme = &s[..idx];
            if mode == ParseMode::Strict && !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(UrlParseError::InvalidCharacter(
                    scheme.chars().find(|c| !c.is_ascii_alphanumeric()).unwrap(),
                    0,
                ));
            }
            self.set_scheme(heap, scheme, true);
            &s[idx + 3..]
        } else {
            s
        };

        let (authority, path_and_rest) = match mode {
            ParseMode::Regex => match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, ""),
            },
            _ => match rest.find(['/', '?', '#']) {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, ""),
            },
        };

        self.parse_authority(heap, authority)?;

        let (path_part, rest2) = match path_and_rest.find(['?', '#']) {
            Some(i) => (&path_and_rest[..i], &path_and_rest[i..]),
            None => (path_and_rest, ""),
        };
        self.set_path(heap, path_part.trim_start_matches('/'), true);

        let (query_part, fragment_part) = if let Some(stripped) = rest2.strip_prefix('?') {
            match stripped.find('#') {
                Some(i) => (&stripped[..i], &stripped[i + 1..]),
                None => (stripped, ""),
            }
        } else if let Some(stripped) = rest2.strip_prefix('#') {
            ("", stripped)
        } else {
            ("", "")
        };
        self.set_query(heap, query_part, true);
        self.set_fragment(heap, fragment_part, true);
        Ok(())
    }

    /// `parse_regex` variant: the first `/` is the authority/path boundary,
    /// `?` inside the authority is not special.
    pub fn parse_regex(
        &mut self,
        heap: &mut HeaderHeap,
        text: &str,
    ) -> Result<(), UrlParseError> {
        self.parse(heap, text, ParseMode::Regex)
    }

    fn parse_authority(&mut self, heap: &mut HeaderHeap, authority: &str) -> Result<(), UrlParseError> {
        let (userinfo, hostport) = match authority.rfind('@') {
            Some(i) => (&authority[..i], &authority[i + 1..]),
            None => ("", authority),
        };
        if !userinfo.is_empty() {
            match userinfo.split_once(':') {
                Some((u, p)) => {
                    self.set_user(heap, u, true);
                    self.set_password(heap, p, true);
                }
                None => self.set_user(heap, userinfo, true),
            }
        }
        if let Some(i) = hostport.rfind(':') {
            let (host, port_str) = (&hostport[..i], &hostport[i + 1..]);
            self.set_host(heap, host, true);
            if !port_str.is_empty() {
                let port: u16 = port_str.parse().map_err(|_| UrlParseError::InvalidPort)?;
                self.set_port(port);
            }
        } else {
            self.set_host(heap, hostport, true);
        }
        Ok(())
    }

    /// A content hash over scheme+host+port+path+params+(query unless
    /// ignored)+type-code, optionally folding in a generation counter so
    /// rotating it invalidates a cache generation without touching keys.
    pub fn crypto_hash(
        &self,
        heap: &HeaderHeap,
        ignore_query: bool,
        cache_generation: Option<i64>,
    ) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.scheme(heap).hash(&mut hasher);
        self.host(heap).hash(&mut hasher);
        self.port().hash(&mut hasher);
        self.path(heap).hash(&mut hasher);
        self.params(heap).hash(&mut hasher);
        if !ignore_query {
            self.query(heap).hash(&mut hasher);
        }
        self.url_type.rfc1738_code().hash(&mut hasher);
        if let Some(gen) = cache_generation {
            if gen >= 0 {
                gen.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Prints this URL using `flags`.
    pub fn print(&self, heap: &HeaderHeap, flags: PrintFlags) -> String {
        let mut out = String::new();
        let scheme = self.scheme(heap);
        if !scheme.is_empty() {
            if flags.contains(PrintFlags::LC_SCHEME_HOST) {
                out.push_str(&scheme.to_ascii_lowercase());
            } else {
                out.push_str(scheme);
            }
            out.push_str("://");
        } else if flags.contains(PrintFlags::IMPLIED_SCHEME) {
            out.push_str(self.url_type.scheme_str());
            out.push_str("://");
        }
        let host = self.host(heap);
        if !host.is_empty() {
            let user = self.user(heap);
            if !user.is_empty() {
                out.push_str(user);
                let pw = self.password(heap);
                if !pw.is_empty() {
                    out.push(':');
                    out.push_str(pw);
                }
                out.push('@');
            }
            if flags.contains(PrintFlags::LC_SCHEME_HOST) {
                out.push_str(&host.to_ascii_lowercase());
            } else {
                out.push_str(host);
            }
            if self.port != 0
                && Some(self.port) != self.url_type.canonical_port()
            {
                let _ = write!(out, ":{}", self.port);
            }
        }
        out.push('/');
        out.push_str(self.path(heap));
        let params = self.params(heap);
        if !params.is_empty() {
            out.push(';');
            out.push_str(params);
        }
        let query = self.query(heap);
        if !query.is_empty() {
            out.push('?');
            out.push_str(query);
        }
        let fragment = self.fragment(heap);
        if !fragment.is_empty() {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }

    /// Must agree bit-for-bit with `print(..).len()` for any `flags`
    /// (spec.md §8 invariant).
    pub fn print_len(&self, heap: &HeaderHeap, flags: PrintFlags) -> usize {
        self.print(heap, flags).len()
    }
}

fn store(heap: &mut HeaderHeap, s: &str, copy_string: bool) -> StrRef {
    // `copy_string` only matters when the caller already owns a StrRef into
    // this same heap (aliasing without copying); from a plain `&str` we
    // always have to copy into the heap. Kept as a parameter to mirror the
    // original API and so callers passing borrowed slices from elsewhere
    // still read naturally at call sites.
    let _ = copy_string;
    heap.duplicate_str(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_port_rules() {
        assert_eq!(UrlType::Http.canonical_port(), Some(80));
        assert_eq!(UrlType::Https.canonical_port(), Some(443));
        assert_eq!(UrlType::None.canonical_port(), None);
    }

    #[test]
    fn parse_simple_http_url() {
        let mut heap = HeaderHeap::new();
        let mut url = Url::new();
        url.parse(&mut heap, "http://example.com/old?x=1", ParseMode::Strict)
            .unwrap();
        assert_eq!(url.scheme(&heap), "http");
        assert_eq!(url.host(&heap), "example.com");
        assert_eq!(url.path(&heap), "old");
        assert_eq!(url.query(&heap), "x=1");
        assert_eq!(url.url_type(), UrlType::Http);
    }

    #[test]
    fn print_and_length_agree() {
        let mut heap = HeaderHeap::new();
        let mut url = Url::new();
        url.parse(&mut heap, "https://ex.com:8443/a/b?q=1#frag", ParseMode::Strict)
            .unwrap();
        for flags in [
            PrintFlags::NONE,
            PrintFlags::IMPLIED_SCHEME,
            PrintFlags::LC_SCHEME_HOST,
        ] {
            let printed = url.print(&heap, flags);
            assert_eq!(url.print_len(&heap, flags), printed.len());
        }
    }

    #[test]
    fn implied_scheme_synthesizes_from_url_type_when_scheme_empty() {
        let mut heap = HeaderHeap::new();
        let mut url = Url::new();
        url.set_host(&mut heap, "ex.com", true);
        url.set_path(&mut heap, "p", true);
        url.set_url_type(UrlType::Https);
        assert_eq!(url.scheme(&heap), "");
        assert!(url.print(&heap, PrintFlags::NONE).starts_with("ex.com"));
        assert!(url.print(&heap, PrintFlags::IMPLIED_SCHEME).starts_with("https://"));
    }

    #[test]
    fn existing_scheme_always_printed_even_with_implied_scheme_flag() {
        let mut heap = HeaderHeap::new();
        let mut url = Url::new();
        url.parse(&mut heap, "http://ex.com/p", ParseMode::Strict).unwrap();
        assert!(url.print(&heap, PrintFlags::IMPLIED_SCHEME).starts_with("http://"));
    }

    #[test]
    fn non_canonical_port_is_printed_canonical_one_is_not() {
        let mut heap = HeaderHeap::new();
        let mut url = Url::new();
        url.parse(&mut heap, "http://ex.com/p", ParseMode::Strict)
            .unwrap();
        assert!(!url.print(&heap, PrintFlags::NONE).contains(":80"));
        let mut url2 = Url::new();
        url2.parse(&mut heap, "http://ex.com:8080/p", ParseMode::Strict)
            .unwrap();
        assert!(url2.print(&heap, PrintFlags::NONE).contains(":8080"));
    }
}
