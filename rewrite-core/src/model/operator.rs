//! The operator model: what a matched rule does.
//!
//! Grounded in the `Operator` subclass hierarchy in
//! `original_source/plugins/header_rewrite/operator.h` and the
//! `OperModifiers` enum alongside it.

use super::expander::expand;
use super::resources::{Disposition, Hook, ResourceBits, Resources};
use crate::mime;
use crate::url::ParseMode;

pub use super::condition::Side;

/// `LAST`/`QSA`/`INV` modifiers named in spec.md §3.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperModifiers {
    pub last: bool,
    pub qsa: bool,
    pub inv: bool,
}

/// A lazily-expanded template: the literal text plus `%{...}`/`%<...>`
/// tokens resolved against `Resources` each time the operator fires (spec.md
/// §4.5's `VariableExpander`), rather than up front at compile time.
#[derive(Debug, Clone)]
pub struct ValueTemplate(pub String);

impl ValueTemplate {
    pub fn resolve(&self, res: &Resources) -> String {
        expand(&self.0, res)
    }
}

#[derive(Debug, Clone)]
pub enum OperatorKind {
    RmHeader { name: String, side: Side },
    SetHeader { name: String, value: ValueTemplate, side: Side },
    AddHeader { name: String, value: ValueTemplate, side: Side },
    SetConfig { name: String, value: ValueTemplate },
    SetStatus { code: u16 },
    SetStatusReason { code: u16, reason: ValueTemplate },
    SetDestination { qualifier: DestQualifier, value: ValueTemplate },
    RmDestination { qualifier: DestQualifier },
    SetRedirect { code: u16, target: ValueTemplate },
    TimeoutOut { kind: TimeoutKind, millis: u64 },
    SkipRemap,
    NoOp,
    Counter(String),
    RmCookie(String),
    SetCookie { name: String, value: ValueTemplate },
    AddCookie { name: String, value: ValueTemplate },
    SetConnDscp(u8),
    SetConnMark(u32),
    SetDebug,
    SetBody(ValueTemplate),
    SetBodyFrom(String),
    SetHttpCntl { name: String, on: bool },
    SetPluginCntl { name: String, value: ValueTemplate },
    RunPlugin { path: String, args: Vec<String> },
    SetStateFlag { ix: u8, value: bool },
    SetStateInt8 { lane: u8, value: i8 },
    SetStateInt16 { value: i16 },
    SetEffectiveAddress(ValueTemplate),
    SetNextHopStrategy(String),
    SetCcAlgorithm(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestQualifier {
    Host,
    Port,
    Path,
    Query,
    Scheme,
    Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Active,
    NoActivity,
    Connect,
    DnsLookup,
}

#[derive(Debug, Clone)]
pub struct Operator {
    pub kind: OperatorKind,
    pub modifiers: OperModifiers,
}

impl Operator {
    pub fn new(kind: OperatorKind) -> Self {
        Self {
            kind,
            modifiers: OperModifiers::default(),
        }
    }

    pub fn legal_in(&self, hook: Hook) -> bool {
        match &self.kind {
            OperatorKind::SetDestination { .. } | OperatorKind::RmDestination { .. } | OperatorKind::SkipRemap => {
                matches!(hook, Hook::Remap | Hook::PreRemap)
            }
            OperatorKind::SetRedirect { .. } => !matches!(hook, Hook::SendResponse),
            _ => true,
        }
    }

    pub fn required_resources(&self) -> ResourceBits {
        match &self.kind {
            OperatorKind::SetDestination { .. } | OperatorKind::RmDestination { .. } => {
                ResourceBits::REMAP_REQUEST.union(ResourceBits::CLIENT_REQUEST)
            }
            _ => ResourceBits::CLIENT_REQUEST.union(ResourceBits::CLIENT_RESPONSE),
        }
    }

    /// Applies this operator's effect to `res`. Returns `Some(disposition)`
    /// when the operator terminates the chain outright (`SKIP-REMAP`);
    /// `None` otherwise, letting the chain continue (`LAST` is handled by
    /// the engine after this returns, per spec.md §4.5).
    pub fn apply(&self, res: &mut Resources) -> Option<Disposition> {
        match &self.kind {
            OperatorKind::RmHeader { name, side } => {
                if let Some(mime) = header_target(res, *side) {
                    mime::rm_header(res.heap, mime, name);
                }
            }
            OperatorKind::SetHeader { name, value, side } => {
                if let Some(mime) = header_target(res, *side) {
                    let v = value.resolve(res);
                    mime::set_header(res.heap, mime, name, &v);
                }
            }
            OperatorKind::AddHeader { name, value, side } => {
                if let Some(mime) = header_target(res, *side) {
                    let v = value.resolve(res);
                    mime::add_header(res.heap, mime, name, &v);
                }
            }
            OperatorKind::SetConfig { .. } => {
                // Host-configuration overrides (proxy.config.* knobs) are
                // out of scope: the core only manipulates headers/URLs it
                // owns (spec.md §1 Non-goals). Accepted for wire
                // compatibility, applied as a no-op.
            }
            OperatorKind::SetStatus { code } => {
                res.status = valid_status(*code);
            }
            OperatorKind::SetStatusReason { code, reason } => {
                res.status = valid_status(*code);
                let r = reason.resolve(res);
                if let Some(mime) = res.active_response_header() {
                    mime::set_header(res.heap, mime, "X-Status-Reason", &r);
                }
            }
            OperatorKind::SetDestination { qualifier, value } => {
                apply_destination(res, *qualifier, &value.resolve(res), self.modifiers.qsa);
            }
            OperatorKind::RmDestination { qualifier } => {
                clear_destination(res, *qualifier);
            }
            OperatorKind::SetRedirect { code, target } => {
                let status = valid_redirect_status(*code);
                let mut location = target.resolve(res);
                if self.modifiers.qsa {
                    if let Some(handle) = res.active_url() {
                        let existing = res.heap.url(handle).query(res.heap).to_string();
                        if !existing.is_empty() {
                            location.push(if location.contains('?') { '&' } else { '?' });
                            location.push_str(&existing);
                        }
                    }
                }
                if res.hook == Hook::Remap {
                    // Remap context: rewrite the request URL in place rather
                    // than synthesizing a response, mirroring
                    // `TSUrlParse` on `rri->requestUrl`.
                    if let Some(handle) = res.active_url() {
                        let mut parsed = crate::url::Url::new();
                        let _ = parsed.parse(res.heap, &location, ParseMode::Strict);
                        let refs = parsed.str_refs();
                        let port = parsed.port_raw();
                        let url_type = parsed.url_type();
                        let url = res.heap.url_mut(handle);
                        url.set_components_from_refs(refs);
                        url.set_port(port);
                        url.set_url_type(url_type);
                    }
                } else if let Some(mime) = res.active_response_header().or(res.client_response) {
                    mime::set_header(res.heap, mime, "Location", &location);
                    res.body = Some(format!(
                        "<HTML>\n<HEAD>\n<TITLE>Document Has Moved</TITLE>\n</HEAD>\n\
<BODY BGCOLOR=\"white\" FGCOLOR=\"black\">\n<H1>Document Has Moved</H1>\n<HR>\n\
<FONT FACE=\"Helvetica,Arial\"><B>\nDescription: The document you requested has moved \
to a new location. The new location is \"{location}\".\n</B></FONT>\n<HR>\n</BODY>\n"
                    ));
                    res.body_content_type = Some("text/html".to_string());
                }
                res.status = status;
                res.changed_url = true;
            }
            OperatorKind::TimeoutOut { .. } => {}
            OperatorKind::SkipRemap => return Some(Disposition::NoRemap),
            OperatorKind::NoOp => {}
            OperatorKind::Counter(name) => {
                let n = res.counters.increment(name);
                log::debug!(target: "header_rewrite", "COUNTER {name} = {n}");
            }
            OperatorKind::RmCookie(name) => mutate_cookie(res, name, None),
            OperatorKind::SetCookie { name, value } => {
                let v = value.resolve(res);
                mutate_cookie(res, name, Some(v));
            }
            OperatorKind::AddCookie { name, value } => {
                let v = value.resolve(res);
                mutate_cookie(res, name, Some(v));
            }
            OperatorKind::SetConnDscp(_) | OperatorKind::SetConnMark(_) => {}
            OperatorKind::SetDebug => {
                res.state.set_flag(0, true);
            }
            OperatorKind::SetBody(value) => {
                res.body = Some(value.resolve(res));
                res.body_content_type.get_or_insert_with(|| "text/html".to_string());
            }
            OperatorKind::SetBodyFrom(path) => match std::fs::read_to_string(path) {
                Ok(contents) => {
                    res.body = Some(contents);
                    res.body_content_type.get_or_insert_with(|| "text/html".to_string());
                }
                Err(e) => {
                    log::warn!(target: "header_rewrite", "SET-BODY-FROM `{path}` could not be read: {e}");
                }
            },
            OperatorKind::SetHttpCntl { .. } | OperatorKind::SetPluginCntl { .. } | OperatorKind::RunPlugin { .. } => {}
            OperatorKind::SetStateFlag { ix, value } => res.state.set_flag(*ix, *value),
            OperatorKind::SetStateInt8 { lane, value } => res.state.set_int8(*lane, *value),
            OperatorKind::SetStateInt16 { value } => res.state.set_int16(*value),
            OperatorKind::SetEffectiveAddress(_) => {}
            OperatorKind::SetNextHopStrategy(_) => {}
            OperatorKind::SetCcAlgorithm(_) => {}
        }
        None
    }
}

/// Validates a rule-file-supplied status code against `http::StatusCode`'s
/// 100..=999 range. An out-of-range value is still applied — the host's HTTP
/// codec is the one that ultimately rejects it on the wire — but is logged,
/// matching spec.md §7's "runtime errors degrade rather than abort" posture.
fn valid_status(code: u16) -> u16 {
    if http::StatusCode::from_u16(code).is_err() {
        log::warn!(target: "header_rewrite", "status code {code} is out of range");
    }
    code
}

/// `SET-REDIRECT` only supports 301/302 (spec.md §4.5); any other code is
/// still applied (runtime errors degrade rather than abort, spec.md §7) but
/// logged, matching the original's `TSError` on an unsupported status.
fn valid_redirect_status(code: u16) -> u16 {
    if code != 301 && code != 302 {
        log::warn!(target: "header_rewrite", "unsupported redirect status {code}, expected 301 or 302");
    }
    code
}

fn header_target(res: &Resources, side: Side) -> Option<crate::heap::ObjHandle> {
    match side {
        Side::Client => res.active_response_header().or(res.active_request_header()),
        Side::Server => res.server_response.or(res.server_request),
    }
}

/// Index into `Url::str_refs()`/`set_components_from_refs` — see
/// `crate::url::Url` for the fixed component order.
const URL_SCHEME: usize = 0;
const URL_HOST: usize = 3;
const URL_PATH: usize = 4;
const URL_QUERY: usize = 6;

fn set_url_component(res: &mut Resources, handle: crate::heap::ObjHandle, index: usize, value: &str) {
    let new_ref = res.heap.duplicate_str(value.as_bytes());
    let mut refs = res.heap.url(handle).str_refs();
    refs[index] = new_ref;
    res.heap.url_mut(handle).set_components_from_refs(refs);
}

fn apply_destination(res: &mut Resources, qualifier: DestQualifier, value: &str, qsa: bool) {
    let Some(handle) = res.active_url() else { return };
    match qualifier {
        DestQualifier::Host => set_url_component(res, handle, URL_HOST, value),
        DestQualifier::Port => {
            if let Ok(p) = value.parse::<u16>() {
                res.heap.url_mut(handle).set_port(p);
            }
        }
        DestQualifier::Path => set_url_component(res, handle, URL_PATH, value),
        DestQualifier::Scheme => set_url_component(res, handle, URL_SCHEME, value),
        DestQualifier::Query => {
            if qsa {
                let existing = res.heap.url(handle).query(res.heap).to_string();
                let merged = if existing.is_empty() {
                    value.to_string()
                } else {
                    format!("{existing}&{value}")
                };
                set_url_component(res, handle, URL_QUERY, &merged);
            } else {
                set_url_component(res, handle, URL_QUERY, value);
            }
        }
        DestQualifier::Url => {
            let mut parsed = crate::url::Url::new();
            let _ = parsed.parse(res.heap, value, ParseMode::Strict);
            let refs = parsed.str_refs();
            let port = parsed.port_raw();
            let url_type = parsed.url_type();
            let url = res.heap.url_mut(handle);
            url.set_components_from_refs(refs);
            url.set_port(port);
            url.set_url_type(url_type);
        }
    }
    res.changed_url = true;
}

fn clear_destination(res: &mut Resources, qualifier: DestQualifier) {
    let Some(handle) = res.active_url() else { return };
    match qualifier {
        DestQualifier::Query => set_url_component(res, handle, URL_QUERY, ""),
        DestQualifier::Path => set_url_component(res, handle, URL_PATH, ""),
        _ => {}
    }
    res.changed_url = true;
}

fn mutate_cookie(res: &mut Resources, name: &str, value: Option<String>) {
    let Some(mime) = header_target(res, Side::Client) else { return };
    let Some(head) = mime::field_find(res.heap, mime, "Cookie") else {
        if let Some(v) = value {
            mime::set_header(res.heap, mime, "Cookie", &format!("{name}={v}"));
        }
        return;
    };
    let pairs_raw = {
        let block = res.heap.field_block(head.0);
        res.heap.str_str(block.slot(head.1).value).to_string()
    };
    let mut pairs: Vec<(String, String)> = pairs_raw
        .split(';')
        .filter_map(|p| p.trim().split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
        .filter(|(k, _)| k != name)
        .collect();
    if let Some(v) = value {
        pairs.push((name.to_string(), v));
    }
    let rebuilt = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("; ");
    mime::set_header(res.heap, mime, "Cookie", &rebuilt);
}
