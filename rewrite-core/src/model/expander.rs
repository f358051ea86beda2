//! `%{NAME}` / `%<...>` template expansion for operator value slots.
//!
//! Grounded in `VariableExpander` in
//! `original_source/plugins/header_rewrite/value.h`. Unknown tokens are left
//! as literal text rather than erroring: a rule author's typo in a template
//! shouldn't take down the whole chain (spec.md §7).

use super::resources::Resources;

/// Expands every `%{...}` and `%<...>` token in `template` against `res`.
pub fn expand(template: &str, res: &Resources) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 1 < bytes.len() && (bytes[i + 1] == b'{' || bytes[i + 1] == b'<') {
            let close = if bytes[i + 1] == b'{' { b'}' } else { b'>' };
            if let Some(end) = template[i + 2..].find(close as char) {
                let token = &template[i + 2..i + 2 + end];
                out.push_str(&resolve_token(token, res));
                i = i + 2 + end + 1;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

fn resolve_token(token: &str, res: &Resources) -> String {
    if let Ok(n) = token.parse::<usize>() {
        if n >= 1 {
            return res.captures.groups.get(n - 1).cloned().unwrap_or_default();
        }
    }
    if let Some(name) = token.strip_prefix("HEADER:") {
        return header_lookup(res, name);
    }
    if let Some(name) = token.strip_prefix("COOKIE:") {
        return cookie_lookup(res, name);
    }
    match token {
        "METHOD" => res.method.clone(),
        "STATUS" => res.status.to_string(),
        "CLIENT-URL" | "URL" => res
            .client_request
            .map(|h| res.url(h).print(res.heap, crate::url::PrintFlags::NONE))
            .unwrap_or_default(),
        "PATH" => res
            .active_url()
            .map(|h| res.url(h).path(res.heap).to_string())
            .unwrap_or_default(),
        "HOST" => res
            .active_url()
            .map(|h| res.url(h).host(res.heap).to_string())
            .unwrap_or_default(),
        "QUERY" => res
            .active_url()
            .map(|h| res.url(h).query(res.heap).to_string())
            .unwrap_or_default(),
        _ => header_lookup(res, token),
    }
}

fn header_lookup(res: &Resources, name: &str) -> String {
    let Some(mime) = res.active_response_header().or(res.active_request_header()) else {
        return String::new();
    };
    let Some(head) = crate::mime::field_find(res.heap, mime, name) else {
        return String::new();
    };
    let block = res.heap.field_block(head.0);
    res.heap.str_str(block.slot(head.1).value).to_string()
}

fn cookie_lookup(res: &Resources, name: &str) -> String {
    let Some(mime) = res.active_request_header() else {
        return String::new();
    };
    let Some(head) = crate::mime::field_find(res.heap, mime, "Cookie") else {
        return String::new();
    };
    let block = res.heap.field_block(head.0);
    let raw = res.heap.str_str(block.slot(head.1).value).to_string();
    for pair in raw.split(';') {
        if let Some((k, v)) = pair.trim().split_once('=') {
            if k == name {
                return v.to_string();
            }
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeaderHeap;
    use crate::model::resources::Hook;

    #[test]
    fn expands_capture_group() {
        let mut heap = HeaderHeap::new();
        let mut res = Resources::new(Hook::Remap, &mut heap);
        res.captures.groups = vec!["foo".to_string(), "bar".to_string()];
        assert_eq!(expand("/%{1}/%{2}", &res), "/foo/bar");
    }

    #[test]
    fn unknown_token_left_literal_when_no_fallback() {
        let mut heap = HeaderHeap::new();
        let res = Resources::new(Hook::Remap, &mut heap);
        assert_eq!(expand("x-%{NOPE}-y", &res), "x--y");
    }
}
