//! End-to-end scenarios exercising the compiler, engine, MIME, and URL
//! layers together rather than in isolation.

use rewrite_core::engine::{Rule, RulesConfig};
use rewrite_core::heap::HeaderHeap;
use rewrite_core::mime;
use rewrite_core::model::{
    Condition, ConditionKind, Disposition, Hook, Matcher, Operator, OperatorKind, Resources, Side,
    UrlQualifier, ValueTemplate,
};
use rewrite_core::url::{ParseMode, Url};

#[test]
fn set_header_overwrites_all_dups() {
    let mut heap = HeaderHeap::new();
    let mime_handle = mime::create(&mut heap);
    mime::add_header(&mut heap, mime_handle, "Via", "1.1 a");
    mime::add_header(&mut heap, mime_handle, "Via", "1.1 b");
    assert_eq!(mime::fields_count(&heap, mime_handle), 2);

    mime::set_header(&mut heap, mime_handle, "Via", "1.1 proxy");

    assert_eq!(mime::fields_count(&heap, mime_handle), 1);
    let addr = mime::field_find(&heap, mime_handle, "Via").unwrap();
    let value = heap.field_block(addr.0).slot(addr.1).value;
    assert_eq!(heap.str_str(value), "1.1 proxy");
}

#[test]
fn redirect_with_qsa_merges_query_and_marks_remap() {
    let mut heap = HeaderHeap::new();
    let client_request = mime::create(&mut heap);
    let client_response = mime::create(&mut heap);
    let mut parsed = Url::new();
    parsed.parse(&mut heap, "http://ex/old?x=1", ParseMode::Strict).unwrap();
    let url_handle = heap.allocate_url().unwrap();
    *heap.url_mut(url_handle) = parsed;

    let mut res = Resources::new(Hook::Remap, &mut heap);
    res.client_request = Some(client_request);
    res.client_response = Some(client_response);
    res.remap_url = Some(url_handle);

    let mut config = RulesConfig::new();
    let mut path_cond = Condition::new(ConditionKind::ToUrl(UrlQualifier::Path));
    path_cond.matcher = Some(Matcher::Eq("/old".to_string()));
    let mut redirect = Operator::new(OperatorKind::SetRedirect {
        code: 302,
        target: ValueTemplate("http://ex/new".to_string()),
    });
    redirect.modifiers.qsa = true;

    config.chain_mut(Hook::Remap).rules.push(Rule {
        conditions: vec![path_cond],
        operators: vec![redirect],
    });

    let disposition = config.run(Hook::Remap, &mut res);

    assert_eq!(res.status, 302);
    assert!(res.changed_url);
    assert_eq!(disposition, Disposition::DidRemap);
    // In a remap context SET-REDIRECT rewrites the request URL in place
    // rather than synthesizing a Location header.
    let rewritten = res.heap.url(url_handle).print(res.heap, rewrite_core::url::PrintFlags::NONE);
    assert_eq!(rewritten, "http://ex/new?x=1");
    assert!(mime::field_find(res.heap, client_response, "Location").is_none());
}

#[test]
fn redirect_outside_remap_sets_location_header_and_body() {
    let mut heap = HeaderHeap::new();
    let client_response = mime::create(&mut heap);

    let mut res = Resources::new(Hook::ReadResponse, &mut heap);
    res.server_response = None;
    res.client_response = Some(client_response);

    let mut config = RulesConfig::new();
    let true_cond = Condition::new(ConditionKind::True);
    let redirect = Operator::new(OperatorKind::SetRedirect {
        code: 302,
        target: ValueTemplate("http://ex/new".to_string()),
    });

    config.chain_mut(Hook::ReadResponse).rules.push(Rule {
        conditions: vec![true_cond],
        operators: vec![redirect],
    });

    config.run(Hook::ReadResponse, &mut res);

    assert_eq!(res.status, 302);
    let addr = mime::field_find(res.heap, client_response, "Location").unwrap();
    let value = res.heap.field_block(addr.0).slot(addr.1).value;
    assert_eq!(res.heap.str_str(value), "http://ex/new");
    assert!(res.body.as_ref().unwrap().contains("http://ex/new"));
    assert_eq!(res.body_content_type.as_deref(), Some("text/html"));
}

#[test]
fn cache_control_cooks_then_recomputes_on_mutation() {
    use rewrite_core::mime::cooked::recompute_cache_control;

    let mut heap = HeaderHeap::new();
    let mime_handle = mime::create(&mut heap);
    mime::add_header(
        &mut heap,
        mime_handle,
        "Cache-Control",
        "public, max-age=300, s-maxage=600",
    );
    let values = cache_control_values(&heap, mime_handle);
    let cooked = recompute_cache_control(values.iter().map(String::as_str));
    assert_ne!(cooked.mask, 0);
    assert_eq!(cooked.max_age, 300);
    assert_eq!(cooked.s_maxage, 600);

    mime::set_header(&mut heap, mime_handle, "Cache-Control", "public; max-age=30");
    let values = cache_control_values(&heap, mime_handle);
    let cooked = recompute_cache_control(values.iter().map(String::as_str));
    assert_eq!(cooked.mask, 0);
    assert_eq!(cooked.max_age, 0);
}

fn cache_control_values(heap: &HeaderHeap, mime_handle: rewrite_core::heap::ObjHandle) -> Vec<String> {
    let Some(head) = mime::field_find(heap, mime_handle, "Cache-Control") else {
        return Vec::new();
    };
    mime::dup_chain(heap, head)
        .iter()
        .map(|addr| heap.str_str(heap.field_block(addr.0).slot(addr.1).value).to_string())
        .collect()
}

#[test]
fn or_short_circuits_second_condition() {
    // `GET [OR]` then `HEAD`: once the first condition is already true, the
    // second must never run — observed here via a regex matcher on the
    // second condition that would populate `captures` if evaluated.
    let mut get_cond = Condition::new(ConditionKind::Method);
    get_cond.matcher = Some(Matcher::Eq("GET".to_string()));
    get_cond.group.last = true;

    let mut head_cond = Condition::new(ConditionKind::Method);
    head_cond.matcher = Some(Matcher::Regex(regex::Regex::new(r"^(HEAD)$").unwrap()));
    head_cond.group.or = true;

    let mut config = RulesConfig::new();
    config.chain_mut(Hook::ReadRequest).rules.push(Rule {
        conditions: vec![get_cond, head_cond],
        operators: vec![Operator::new(OperatorKind::SetHeader {
            name: "X".to_string(),
            value: ValueTemplate("y".to_string()),
            side: Side::Client,
        })],
    });

    let mut heap = HeaderHeap::new();
    let client_request = mime::create(&mut heap);
    let mut res = Resources::new(Hook::ReadRequest, &mut heap);
    res.client_request = Some(client_request);
    res.method = "GET".to_string();

    config.run(Hook::ReadRequest, &mut res);
    assert!(mime::field_find(res.heap, client_request, "X").is_some());
    assert!(res.captures.groups.is_empty(), "second condition must not have run");

    let mut heap2 = HeaderHeap::new();
    let client_request2 = mime::create(&mut heap2);
    let mut res2 = Resources::new(Hook::ReadRequest, &mut heap2);
    res2.client_request = Some(client_request2);
    res2.method = "POST".to_string();
    config.run(Hook::ReadRequest, &mut res2);
    assert!(mime::field_find(res2.heap, client_request2, "X").is_none());
}

#[test]
fn header_heap_coalesce_preserves_live_strings() {
    let mut heap = HeaderHeap::new();
    let mime_handle = mime::create(&mut heap);
    mime::add_header(&mut heap, mime_handle, "X-Keep", "still here");

    let before = heap.live_object_count();
    // Force several allocate/free cycles past LOST_STRING_THRESHOLD so an
    // automatic coalesce runs mid-sequence.
    for i in 0..300 {
        let s = heap.duplicate_str(format!("scratch-{i}").as_bytes());
        heap.free_string(s, 9);
    }
    assert_eq!(heap.live_object_count(), before);

    let addr = mime::field_find(&heap, mime_handle, "X-Keep").unwrap();
    let value = heap.field_block(addr.0).slot(addr.1).value;
    assert_eq!(heap.str_bytes(value), b"still here");
}

#[test]
fn regex_capture_feeds_template() {
    let mut heap = HeaderHeap::new();
    let client_request = mime::create(&mut heap);
    let mut parsed = Url::new();
    parsed.parse(&mut heap, "http://ex/user/42/", ParseMode::Strict).unwrap();
    let url_handle = heap.allocate_url().unwrap();
    *heap.url_mut(url_handle) = parsed;

    let mut res = Resources::new(Hook::ReadRequest, &mut heap);
    res.client_request = Some(client_request);
    res.remap_url = Some(url_handle);

    let mut config = RulesConfig::new();
    let mut path_cond = Condition::new(ConditionKind::ToUrl(UrlQualifier::Path));
    path_cond.matcher = Some(Matcher::Regex(regex::Regex::new(r"^/user/(\d+)/$").unwrap()));
    config.chain_mut(Hook::ReadRequest).rules.push(Rule {
        conditions: vec![path_cond],
        operators: vec![Operator::new(OperatorKind::SetHeader {
            name: "X-User".to_string(),
            value: ValueTemplate("%{1}".to_string()),
            side: Side::Client,
        })],
    });

    config.run(Hook::ReadRequest, &mut res);
    let addr = mime::field_find(res.heap, client_request, "X-User").unwrap();
    let value = res.heap.field_block(addr.0).slot(addr.1).value;
    assert_eq!(res.heap.str_str(value), "42");
}
