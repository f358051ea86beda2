//! Hooks and the per-hook `Resources` view passed to every condition and
//! operator.
//!
//! Grounded in `TSHttpHookID`/`ResourceIDs` in
//! `original_source/plugins/header_rewrite/resources.h`.

use crate::heap::{HeaderHeap, ObjHandle};
use crate::url::Url;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A named callback point in the host's request/response lifecycle, plus
/// the remap pseudo-hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    ReadRequest,
    PreRemap,
    Remap,
    SendRequest,
    ReadResponse,
    SendResponse,
}

impl Hook {
    pub const ALL: [Hook; 6] = [
        Hook::ReadRequest,
        Hook::PreRemap,
        Hook::Remap,
        Hook::SendRequest,
        Hook::ReadResponse,
        Hook::SendResponse,
    ];

    pub fn index(self) -> usize {
        match self {
            Hook::ReadRequest => 0,
            Hook::PreRemap => 1,
            Hook::Remap => 2,
            Hook::SendRequest => 3,
            Hook::ReadResponse => 4,
            Hook::SendResponse => 5,
        }
    }

    /// Resolves a rule-file hook-selector keyword (`READ_RESPONSE_HDR_HOOK`,
    /// …) to its `Hook`.
    pub fn from_selector(word: &str) -> Option<Hook> {
        match word.to_ascii_uppercase().as_str() {
            "READ_REQUEST_HDR_HOOK" => Some(Hook::ReadRequest),
            "READ_REQUEST_PRE_REMAP_HOOK" => Some(Hook::PreRemap),
            "REMAP_PSEUDO_HOOK" => Some(Hook::Remap),
            "SEND_REQUEST_HDR_HOOK" => Some(Hook::SendRequest),
            "READ_RESPONSE_HDR_HOOK" => Some(Hook::ReadResponse),
            "SEND_RESPONSE_HDR_HOOK" => Some(Hook::SendResponse),
            _ => None,
        }
    }
}

/// Bitmask of resources a condition/operator declares it needs; the engine
/// only materialises what the compiled chain for a hook actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceBits(pub u32);

impl ResourceBits {
    pub const NONE: ResourceBits = ResourceBits(0);
    pub const CLIENT_REQUEST: ResourceBits = ResourceBits(1 << 0);
    pub const CLIENT_RESPONSE: ResourceBits = ResourceBits(1 << 1);
    pub const SERVER_REQUEST: ResourceBits = ResourceBits(1 << 2);
    pub const SERVER_RESPONSE: ResourceBits = ResourceBits(1 << 3);
    pub const REMAP_REQUEST: ResourceBits = ResourceBits(1 << 4);

    pub fn union(self, other: ResourceBits) -> ResourceBits {
        ResourceBits(self.0 | other.0)
    }

    pub fn contains(self, other: ResourceBits) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Disposition the engine returns after running one hook's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    DidRemap,
    NoRemap,
}

/// Per-transaction private state slot: 16 flag bits, 4 int8 lanes, 1 int16
/// lane, all packed into a single 64-bit word per spec.md §4.5.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateWord(pub u64);

impl StateWord {
    pub fn flag(&self, ix: u8) -> bool {
        (self.0 >> ix) & 1 != 0
    }
    pub fn set_flag(&mut self, ix: u8, value: bool) {
        let bit = 1u64 << ix;
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
    pub fn int8(&self, lane: u8) -> i8 {
        ((self.0 >> (16 + lane as u32 * 8)) & 0xFF) as i8
    }
    pub fn set_int8(&mut self, lane: u8, value: i8) {
        let shift = 16 + lane as u32 * 8;
        self.0 = (self.0 & !(0xFFu64 << shift)) | ((value as u8 as u64) << shift);
    }
    pub fn int16(&self) -> i16 {
        ((self.0 >> 48) & 0xFFFF) as i16
    }
    pub fn set_int16(&mut self, value: i16) {
        self.0 = (self.0 & !(0xFFFFu64 << 48)) | ((value as u16 as u64) << 48);
    }
}

/// A regex match's captured groups plus the text they were captured from,
/// backing `%{1}`..`%{9}` template substitutions and `LAST-CAPTURE`.
#[derive(Debug, Clone, Default)]
pub struct CaptureState {
    pub groups: Vec<String>,
    pub source_text: String,
}

/// Transport-layer facts the host provides; the core only consumes them; it
/// never reaches into sockets or TLS state itself (spec.md §1 Non-goals).
#[derive(Debug, Clone, Default)]
pub struct InboundInfo {
    pub peer_addr: Option<std::net::IpAddr>,
    pub local_port: u16,
    pub tls_proto: Option<String>,
}

/// Named atomic counters the `COUNTER` operator bumps. Process-wide (not
/// per-`RulesConfig`) so a rule-file reload doesn't reset a counter an
/// operator dashboard is watching.
#[derive(Debug, Default)]
pub struct CounterTable {
    inner: std::sync::Mutex<std::collections::HashMap<String, AtomicU64>>,
}

impl CounterTable {
    pub fn increment(&self, name: &str) -> u64 {
        let mut guard = self.inner.lock().expect("counter table mutex poisoned");
        let counter = guard.entry(name.to_string()).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, name: &str) -> u64 {
        let guard = self.inner.lock().expect("counter table mutex poisoned");
        guard.get(name).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }
}

/// Per-hook view passed to every condition and operator evaluation.
pub struct Resources<'a> {
    pub hook: Hook,
    pub heap: &'a mut HeaderHeap,
    pub client_request: Option<ObjHandle>,
    pub client_response: Option<ObjHandle>,
    pub server_request: Option<ObjHandle>,
    pub server_response: Option<ObjHandle>,
    /// The effective request URL for the remap hook (`None` outside remap).
    pub remap_url: Option<ObjHandle>,
    pub status: u16,
    pub method: String,
    pub captures: CaptureState,
    pub changed_url: bool,
    /// Synthesized response body, set by `SET-BODY`/`SET-BODY-FROM` or the
    /// non-remap branch of `SET-REDIRECT` (spec.md §4.5).
    pub body: Option<String>,
    pub body_content_type: Option<String>,
    pub state: StateWord,
    pub inbound: InboundInfo,
    pub txn_count: u64,
    pub counters: Arc<CounterTable>,
    /// Whether `NOW(...)` conditions read local wall-clock time instead of
    /// UTC, per the `timezone` tuning knob in [`crate::EngineConfig`]
    /// (spec.md §6).
    pub use_local_time: bool,
}

impl<'a> Resources<'a> {
    pub fn new(hook: Hook, heap: &'a mut HeaderHeap) -> Self {
        Self {
            hook,
            heap,
            client_request: None,
            client_response: None,
            server_request: None,
            server_response: None,
            remap_url: None,
            status: 0,
            method: String::new(),
            captures: CaptureState::default(),
            changed_url: false,
            body: None,
            body_content_type: None,
            state: StateWord::default(),
            inbound: InboundInfo::default(),
            txn_count: 0,
            counters: Arc::new(CounterTable::default()),
            use_local_time: false,
        }
    }

    pub fn with_counters(mut self, counters: Arc<CounterTable>) -> Self {
        self.counters = counters;
        self
    }

    /// The MIME header this hook's request-side rules mutate by default.
    pub fn active_request_header(&self) -> Option<ObjHandle> {
        match self.hook {
            Hook::ReadRequest | Hook::PreRemap | Hook::Remap => self.client_request,
            Hook::SendRequest => self.server_request.or(self.client_request),
            Hook::ReadResponse | Hook::SendResponse => self.server_request.or(self.client_request),
        }
    }

    /// The MIME header this hook's response-side rules mutate by default.
    pub fn active_response_header(&self) -> Option<ObjHandle> {
        match self.hook {
            Hook::ReadRequest | Hook::PreRemap | Hook::Remap | Hook::SendRequest => None,
            Hook::ReadResponse | Hook::SendResponse => self.server_response.or(self.client_response),
        }
    }

    pub fn active_url(&self) -> Option<ObjHandle> {
        self.remap_url.or(self.client_request)
    }

    pub fn url<'b>(&'b self, handle: ObjHandle) -> &'b Url {
        self.heap.url(handle)
    }
}
