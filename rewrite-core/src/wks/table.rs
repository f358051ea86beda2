//! The closed WKS data set. Grounded in the well-known-string table of
//! `original_source/proxy/hdrs/MIME.h` (field names) and the Cache-Control
//! directive set handled by `mime_hdr_cooked_cache_set` in
//! `original_source/proxy/hdrs/MIME.cc`.

/// Number of hottest WKS header names that get a slot-accelerator entry.
pub const ACCEL_SLOT_COUNT: usize = 32;

/// Sentinel accelerator value meaning "dup head is not in the first block".
pub const ACCEL_UNKNOWN: u8 = 15;

/// Sentinel `wks_idx` meaning "not a well-known string".
pub const NOT_WKS: super::WksIdx = -1;

#[derive(Debug, Clone, Copy)]
pub enum WksKind {
    /// A MIME header field name (`Host`, `Cache-Control`, …).
    HeaderField,
    /// A Cache-Control directive token. `cooked_bit` is the bit this
    /// directive contributes to the 13-bit cooked mask if it has no
    /// integer argument; directives with an integer argument still get a
    /// bit (spec.md §4.4) but also set `takes_int_arg`.
    CacheControlDirective {
        cooked_bit: u8,
        takes_int_arg: bool,
    },
    /// The single Pragma directive token the cooked cache tracks.
    PragmaDirective,
}

#[derive(Debug, Clone, Copy)]
pub struct WksEntry {
    pub name: &'static str,
    pub kind: WksKind,
    /// Presence-bitmap bit index, only set for `HeaderField` entries.
    pub presence_bit: Option<u8>,
    /// Slot-accelerator id for the hottest header fields.
    pub accel_slot: Option<u8>,
}

macro_rules! field {
    ($name:expr, $presence:expr) => {
        WksEntry {
            name: $name,
            kind: WksKind::HeaderField,
            presence_bit: Some($presence),
            accel_slot: None,
        }
    };
    ($name:expr, $presence:expr, $accel:expr) => {
        WksEntry {
            name: $name,
            kind: WksKind::HeaderField,
            presence_bit: Some($presence),
            accel_slot: Some($accel),
        }
    };
}

macro_rules! cc_directive {
    ($name:expr, $bit:expr) => {
        WksEntry {
            name: $name,
            kind: WksKind::CacheControlDirective {
                cooked_bit: $bit,
                takes_int_arg: false,
            },
            presence_bit: None,
            accel_slot: None,
        }
    };
    ($name:expr, $bit:expr, int) => {
        WksEntry {
            name: $name,
            kind: WksKind::CacheControlDirective {
                cooked_bit: $bit,
                takes_int_arg: true,
            },
            presence_bit: None,
            accel_slot: None,
        }
    };
}

/// Index of each entry below *is* its `wks_idx`. Header field names occupy
/// the low range (presence-bitmap eligible, bit == index, so the table must
/// not exceed 64 header-field entries); Cache-Control directive tokens and
/// the lone Pragma directive follow and never carry a presence bit.
pub static WKS_TABLE: &[WksEntry] = &[
    // --- header field names (indices 0..=44, presence_bit == index) ---
    field!("Accept", 0),
    field!("Accept-Charset", 1),
    field!("Accept-Encoding", 2, 8),
    field!("Accept-Language", 3),
    field!("Accept-Ranges", 4),
    field!("Age", 5, 9),
    field!("Allow", 6),
    field!("Authorization", 7, 10),
    field!("Cache-Control", 8, 0),
    field!("Client-ip", 9),
    field!("Connection", 10, 11),
    field!("Content-Encoding", 11),
    field!("Content-Language", 12),
    field!("Content-Length", 13, 1),
    field!("Content-Location", 14),
    field!("Content-Range", 15),
    field!("Content-Type", 16, 2),
    field!("Cookie", 17, 12),
    field!("Date", 18, 13),
    field!("Etag", 19, 14),
    field!("Expires", 20, 15),
    field!("From", 21),
    field!("Host", 22, 3),
    field!("If-Match", 23),
    field!("If-Modified-Since", 24),
    field!("If-None-Match", 25),
    field!("If-Range", 26),
    field!("If-Unmodified-Since", 27),
    field!("Keep-Alive", 28),
    field!("Last-Modified", 29, 16),
    field!("Location", 30, 17),
    field!("Max-Forwards", 31),
    field!("Pragma", 32, 18),
    field!("Proxy-Authenticate", 33),
    field!("Proxy-Authorization", 34),
    field!("Proxy-Connection", 35),
    field!("Public", 36),
    field!("Range", 37),
    field!("Referer", 38, 19),
    field!("Retry-After", 39),
    field!("Server", 40, 20),
    field!("Set-Cookie", 41, 21),
    field!("Te", 42),
    field!("Transfer-Encoding", 43, 22),
    field!("Upgrade", 44),
    field!("User-Agent", 45, 23),
    field!("Vary", 46, 24),
    field!("Via", 47, 25),
    field!("Warning", 48),
    field!("Www-Authenticate", 49),
    field!("X-Forwarded-For", 50, 26),
    // --- Cache-Control directives (cooked mask bits 0..=12) ---
    cc_directive!("no-cache", 0),
    cc_directive!("no-store", 1),
    cc_directive!("no-transform", 2),
    cc_directive!("max-age", 3, int),
    cc_directive!("min-fresh", 4, int),
    cc_directive!("max-stale", 5, int),
    cc_directive!("must-revalidate", 6),
    cc_directive!("proxy-revalidate", 7),
    cc_directive!("public", 8),
    cc_directive!("private", 9),
    cc_directive!("s-maxage", 10, int),
    cc_directive!("only-if-cached", 11),
    cc_directive!("immutable", 12),
    // --- Pragma directive ---
    WksEntry {
        name: "no-cache",
        kind: WksKind::PragmaDirective,
        presence_bit: None,
        accel_slot: None,
    },
];

/// Closed set of compiler keywords: condition names, operator names, hook
/// selectors, and modifier tokens. Grounded in
/// `original_source/plugins/header_rewrite/objtypes.cc`'s keyword tables,
/// which enumerate exactly this vocabulary for `value.cc`'s `Parser`.
pub static KEYWORD_TABLE: &[&str] = &[
    // condition names
    "TRUE", "FALSE", "STATUS", "METHOD", "RANDOM", "ACCESS", "COOKIE", "HEADER",
    "CLIENT-URL", "FROM-URL", "TO-URL", "URL", "DBM", "INTERNAL-TXN", "IP", "TXN-COUNT",
    "NOW", "GEO", "ID", "CIDR", "INBOUND", "SSN-TXN-COUNT", "TCP-INFO", "CACHE",
    "NEXT-HOP", "HTTP-CNTL", "GROUP", "STATE-FLAG", "STATE-INT8", "STATE-INT16",
    "LAST-CAPTURE", "PATH",
    // operator names
    "RM-HEADER", "SET-HEADER", "ADD-HEADER", "SET-CONFIG", "SET-STATUS", "SET-REASON",
    "SET-DESTINATION", "RM-DESTINATION", "SET-REDIRECT", "TIMEOUT-OUT", "SKIP-REMAP",
    "NO-OP", "COUNTER", "RM-COOKIE", "SET-COOKIE", "ADD-COOKIE", "SET-CONN-DSCP",
    "SET-CONN-MARK", "SET-DEBUG", "SET-BODY", "SET-BODY-FROM", "SET-HTTP-CNTL",
    "SET-PLUGIN-CNTL", "RUN-PLUGIN", "SET-STATE-FLAG", "SET-STATE-INT8", "SET-STATE-INT16",
    "SET-EFFECTIVE-ADDRESS", "SET-NEXT-HOP-STRATEGY", "SET-CC-ALG", "IF", "ELIF", "ELSE",
    // hook selectors
    "READ_REQUEST_HDR_HOOK", "READ_RESPONSE_HDR_HOOK", "SEND_REQUEST_HDR_HOOK",
    "SEND_RESPONSE_HDR_HOOK", "REMAP_PSEUDO_HOOK", "PRE_REMAP_HOOK", "TXN_START_HOOK",
    // modifiers
    "AND", "OR", "NOT", "L", "QSA", "I", "INV", "NOCASE", "EXT", "PRE", "SUF", "MID",
];
