//! Semantic pass: turns tokenized lines into a [`crate::engine::RulesConfig`].
//!
//! Grounded in `RuleSet::check_hook_test`/`Parser::parse_condition`/
//! `Parser::parse_operator` in
//! `original_source/plugins/header_rewrite/parser.cc`: a hook-selector
//! condition at the top of a block switches which hook the rules that
//! follow are installed into; a blank line (or EOF) finalizes the rule
//! currently being accumulated; `elif`/`else` extend the previous rule's
//! condition group rather than starting a new one.

use super::tokenizer::{strip_brackets, tokenize_line, unquote};
use crate::engine::{Rule, RulesConfig};
use crate::error::CompileError;
use crate::model::{
    Condition, ConditionKind, GeoQualifier, GroupModifiers, Hook, IdQualifier, InboundQualifier,
    IpQualifier, MatchModifiers, Matcher, NextHopQualifier, OperModifiers, Operator, OperatorKind,
    ResourceBits, Side, TimeQualifier, UrlQualifier, ValueTemplate,
};
use std::path::{Path, PathBuf};

/// Parses the rule file at `path` into a [`RulesConfig`]. `.hrw4u`-suffixed
/// files are first piped through an external DSL compiler per
/// [`super::dsl`]; everything else is read as native rule-file syntax.
pub fn compile_file(path: &Path) -> Result<RulesConfig, CompileError> {
    let text = if super::dsl::is_dsl_source(path) {
        super::dsl::compile_dsl(path)?
    } else {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CompileError::FileNotFound(path.to_path_buf())
            } else {
                CompileError::Io(e)
            }
        })?
    };
    compile_str(&text, path)
}

/// Parses already-loaded rule-file text; `source` is used only for error
/// messages (it need not be a real path for `.hrw4u`-compiled input).
pub fn compile_str(text: &str, source: &Path) -> Result<RulesConfig, CompileError> {
    let mut config = RulesConfig::new();
    let mut current_hook = Hook::Remap;
    let mut pending: Option<Rule> = None;

    let finalize = |config: &mut RulesConfig, hook: Hook, pending: &mut Option<Rule>| {
        if let Some(rule) = pending.take() {
            if !rule.conditions.is_empty() || !rule.operators.is_empty() {
                config.chain_mut(hook).rules.push(rule);
            }
        }
    };

    for (lineno, raw_line) in text.lines().enumerate() {
        let line_no = lineno + 1;
        let tokens = tokenize_line(raw_line);
        if tokens.is_empty() {
            finalize(&mut config, current_hook, &mut pending);
            continue;
        }

        let keyword = tokens[0].to_ascii_uppercase();
        if keyword == "COND" {
            if tokens.len() < 2 {
                return Err(CompileError::SyntaxError {
                    file: source.to_path_buf(),
                    line: line_no,
                    col: 1,
                    msg: "`cond` requires a %{...} expansion".to_string(),
                });
            }
            let selector = extract_braced(&tokens[1]).ok_or_else(|| CompileError::SyntaxError {
                file: source.to_path_buf(),
                line: line_no,
                col: 1,
                msg: format!("expected %{{...}}, got `{}`", tokens[1]),
            })?;
            let (name, arg) = split_name_arg(selector);

            if let Some(hook) = Hook::from_selector(name) {
                finalize(&mut config, current_hook, &mut pending);
                current_hook = hook;
                continue;
            }

            let cond = build_condition(name, arg, &tokens[2..], source, line_no)?;
            if !cond.legal_in(current_hook) {
                return Err(CompileError::HookMismatch {
                    file: source.to_path_buf(),
                    line: line_no,
                    name: name.to_string(),
                    hook: current_hook,
                });
            }
            let rule = pending.get_or_insert_with(|| Rule {
                conditions: Vec::new(),
                operators: Vec::new(),
            });
            rule.conditions.push(cond);
        } else {
            let op = build_operator(&keyword, &tokens[1..], source, line_no)?;
            if !op.legal_in(current_hook) {
                return Err(CompileError::HookMismatch {
                    file: source.to_path_buf(),
                    line: line_no,
                    name: keyword,
                    hook: current_hook,
                });
            }
            let rule = pending.get_or_insert_with(|| Rule {
                conditions: Vec::new(),
                operators: Vec::new(),
            });
            rule.operators.push(op);
        }
    }
    finalize(&mut config, current_hook, &mut pending);
    Ok(config)
}

fn extract_braced(token: &str) -> Option<&str> {
    let t = token.trim();
    if t.starts_with("%{") && t.ends_with('}') {
        Some(&t[2..t.len() - 1])
    } else {
        None
    }
}

fn split_name_arg(selector: &str) -> (&str, Option<&str>) {
    match selector.split_once(':') {
        Some((n, a)) => (n, Some(a)),
        None => (selector, None),
    }
}

fn parse_modifiers_for_condition(rest: &[String]) -> GroupModifiers {
    let mut m = GroupModifiers::default();
    for tok in rest {
        if let Some(inner) = strip_brackets(tok) {
            for part in inner.split(',') {
                match part.trim().to_ascii_uppercase().as_str() {
                    "OR" => m.or = true,
                    "AND" => m.and = true,
                    "NOT" => m.not = true,
                    "LAST" | "L" => m.last = true,
                    _ => {}
                }
            }
        }
    }
    m
}

fn parse_match_modifiers(rest: &[String]) -> MatchModifiers {
    let mut m = MatchModifiers::default();
    for tok in rest {
        if let Some(inner) = strip_brackets(tok) {
            for part in inner.split(',') {
                match part.trim().to_ascii_uppercase().as_str() {
                    "NOCASE" => m.nocase = true,
                    "EXT" => m.ext = true,
                    "SUF" => m.suffix = true,
                    "PRE" => m.prefix = true,
                    "MID" => m.mid = true,
                    _ => {}
                }
            }
        }
    }
    m
}

fn find_matcher(rest: &[String], source: &Path, line_no: usize) -> Result<Option<Matcher>, CompileError> {
    for tok in rest {
        if strip_brackets(tok).is_some() {
            continue;
        }
        if let Some(v) = tok.strip_prefix('=') {
            return Ok(Some(Matcher::Eq(unquote(v).to_string())));
        }
        if let Some(v) = tok.strip_prefix('<') {
            return Ok(Some(Matcher::Lt(v.parse().map_err(|_| CompileError::SyntaxError {
                file: source.to_path_buf(),
                line: line_no,
                col: 1,
                msg: format!("`{v}` is not an integer"),
            })?)));
        }
        if let Some(v) = tok.strip_prefix('>') {
            return Ok(Some(Matcher::Gt(v.parse().map_err(|_| CompileError::SyntaxError {
                file: source.to_path_buf(),
                line: line_no,
                col: 1,
                msg: format!("`{v}` is not an integer"),
            })?)));
        }
        if tok.starts_with('/') && tok.ends_with('/') && tok.len() >= 2 {
            let pattern = unquote(tok);
            let re = regex::Regex::new(pattern).map_err(|e| CompileError::SyntaxError {
                file: source.to_path_buf(),
                line: line_no,
                col: 1,
                msg: format!("bad regex `{pattern}`: {e}"),
            })?;
            return Ok(Some(Matcher::Regex(re)));
        }
        if tok.starts_with('{') && tok.ends_with('}') {
            let set = tok[1..tok.len() - 1]
                .split(',')
                .map(|s| unquote(s.trim()).to_string())
                .collect();
            return Ok(Some(Matcher::Set(set)));
        }
    }
    Ok(None)
}

fn build_condition(
    name: &str,
    arg: Option<&str>,
    rest: &[String],
    source: &Path,
    line_no: usize,
) -> Result<Condition, CompileError> {
    let canonical = crate::wks::tokenize_keyword(name).unwrap_or(name).to_ascii_uppercase();
    let kind = match canonical.as_str() {
        "TRUE" => ConditionKind::True,
        "FALSE" => ConditionKind::False,
        "STATUS" => ConditionKind::Status,
        "METHOD" => ConditionKind::Method,
        "RANDOM" => ConditionKind::Random(arg.and_then(|a| a.parse().ok()).unwrap_or(100)),
        "ACCESS" => ConditionKind::Access(arg.unwrap_or_default().to_string()),
        "COOKIE" => ConditionKind::Cookie(arg.unwrap_or_default().to_string()),
        "HEADER" => ConditionKind::Header {
            name: arg.unwrap_or_default().to_string(),
            side: Side::Client,
        },
        "CLIENT-HEADER" => ConditionKind::Header {
            name: arg.unwrap_or_default().to_string(),
            side: Side::Client,
        },
        "SERVER-HEADER" => ConditionKind::Header {
            name: arg.unwrap_or_default().to_string(),
            side: Side::Server,
        },
        "CLIENT-URL" => ConditionKind::ClientUrl(url_qualifier(arg)),
        "FROM-URL" => ConditionKind::FromUrl(url_qualifier(arg)),
        "TO-URL" => ConditionKind::ToUrl(url_qualifier(arg)),
        "DBM" => {
            let (file, key) = arg.unwrap_or_default().split_once(',').unwrap_or(("", ""));
            ConditionKind::Dbm { file: file.to_string(), key: key.to_string() }
        }
        "INTERNAL-TXN" => ConditionKind::InternalTxn,
        "IP" => ConditionKind::Ip(ip_qualifier(arg)),
        "TXN-COUNT" => ConditionKind::TxnCount,
        "NOW" => ConditionKind::Now(time_qualifier(arg)),
        "GEO" => ConditionKind::Geo(geo_qualifier(arg)),
        "ID" => ConditionKind::Id(id_qualifier(arg)),
        "CIDR" => {
            let (v4, v6) = arg.unwrap_or_default().split_once(',').unwrap_or(("32", "128"));
            ConditionKind::Cidr {
                v4_len: v4.trim().parse().unwrap_or(32),
                v6_len: v6.trim().parse().unwrap_or(128),
            }
        }
        "INBOUND" => ConditionKind::Inbound(inbound_qualifier(arg)),
        "SSN-TXN-COUNT" => ConditionKind::SsnTxnCount,
        "TCP-INFO" => ConditionKind::TcpInfo,
        "CACHE" => ConditionKind::Cache,
        "NEXT-HOP" => ConditionKind::NextHop(next_hop_qualifier(arg)),
        "HTTP-CNTL" => ConditionKind::HttpCntl(arg.unwrap_or_default().to_string()),
        "GROUP" => ConditionKind::Group,
        "STATE-FLAG" => ConditionKind::StateFlag(arg.and_then(|a| a.parse().ok()).unwrap_or(0)),
        "STATE-INT8" => ConditionKind::StateInt8(arg.and_then(|a| a.parse().ok()).unwrap_or(0)),
        "STATE-INT16" => ConditionKind::StateInt16,
        "LAST-CAPTURE" => ConditionKind::LastCapture(arg.and_then(|a| a.parse().ok()).unwrap_or(0)),
        _ => {
            return Err(CompileError::UnknownCondition {
                file: source.to_path_buf(),
                line: line_no,
                name: name.to_string(),
            })
        }
    };
    let mut cond = Condition::new(kind);
    cond.matcher = find_matcher(rest, source, line_no)?;
    cond.modifiers = parse_match_modifiers(rest);
    cond.group = parse_modifiers_for_condition(rest);
    if cond.group.and && cond.group.or {
        return Err(CompileError::ModifierConflict {
            file: source.to_path_buf(),
            line: line_no,
            msg: "AND and OR cannot both apply to the same condition".to_string(),
        });
    }
    Ok(cond)
}

fn url_qualifier(arg: Option<&str>) -> UrlQualifier {
    match arg.unwrap_or("URL").to_ascii_uppercase().as_str() {
        "HOST" => UrlQualifier::Host,
        "PATH" => UrlQualifier::Path,
        "QUERY" => UrlQualifier::Query,
        "SCHEME" => UrlQualifier::Scheme,
        "PORT" => UrlQualifier::Port,
        _ => UrlQualifier::Url,
    }
}

fn ip_qualifier(arg: Option<&str>) -> IpQualifier {
    match arg.unwrap_or("CLIENT").to_ascii_uppercase().as_str() {
        "INBOUND" => IpQualifier::Inbound,
        "SERVER" => IpQualifier::Server,
        "OUTBOUND" => IpQualifier::Outbound,
        _ => IpQualifier::Client,
    }
}

fn time_qualifier(arg: Option<&str>) -> TimeQualifier {
    match arg.unwrap_or("HOUR").to_ascii_uppercase().as_str() {
        "YEAR" => TimeQualifier::Year,
        "MONTH" => TimeQualifier::Month,
        "DAY" => TimeQualifier::Day,
        "MINUTE" => TimeQualifier::Minute,
        "WEEKDAY" => TimeQualifier::Weekday,
        "YEARDAY" => TimeQualifier::Yearday,
        _ => TimeQualifier::Hour,
    }
}

fn geo_qualifier(arg: Option<&str>) -> GeoQualifier {
    match arg.unwrap_or("COUNTRY-CODE").to_ascii_uppercase().as_str() {
        "COUNTRY" => GeoQualifier::Country,
        "ASN" => GeoQualifier::Asn,
        "ASN-NAME" => GeoQualifier::AsnName,
        _ => GeoQualifier::CountryCode,
    }
}

fn id_qualifier(arg: Option<&str>) -> IdQualifier {
    match arg.unwrap_or("REQUEST").to_ascii_uppercase().as_str() {
        "PROCESS" => IdQualifier::Process,
        "UNIQUE" => IdQualifier::Unique,
        _ => IdQualifier::Request,
    }
}

fn inbound_qualifier(arg: Option<&str>) -> InboundQualifier {
    match arg.unwrap_or("REMOTE-ADDR").to_ascii_uppercase().as_str() {
        "LOCAL-ADDR" => InboundQualifier::LocalAddr,
        "LOCAL-PORT" => InboundQualifier::LocalPort,
        "TLS-PROTO" => InboundQualifier::TlsProto,
        _ => InboundQualifier::RemoteAddr,
    }
}

fn next_hop_qualifier(arg: Option<&str>) -> NextHopQualifier {
    match arg.unwrap_or("HOST").to_ascii_uppercase().as_str() {
        "PORT" => NextHopQualifier::Port,
        _ => NextHopQualifier::Host,
    }
}

fn parse_oper_modifiers(rest: &[String]) -> OperModifiers {
    let mut m = OperModifiers::default();
    for tok in rest {
        if let Some(inner) = strip_brackets(tok) {
            for part in inner.split(',') {
                match part.trim().to_ascii_uppercase().as_str() {
                    "L" | "LAST" => m.last = true,
                    "QSA" => m.qsa = true,
                    "INV" => m.inv = true,
                    _ => {}
                }
            }
        }
    }
    m
}

fn build_operator(keyword: &str, args: &[String], source: &Path, line_no: usize) -> Result<Operator, CompileError> {
    let canonical = crate::wks::tokenize_keyword(keyword).unwrap_or(keyword).to_ascii_uppercase();
    let plain: Vec<&str> = args.iter().filter(|a| strip_brackets(a).is_none()).map(|s| s.as_str()).collect();
    let template = |s: &str| ValueTemplate(unquote(s).to_string());

    let kind = match canonical.as_str() {
        "RM-HEADER" => OperatorKind::RmHeader { name: plain.first().unwrap_or(&"").to_string(), side: Side::Client },
        "SET-HEADER" => OperatorKind::SetHeader {
            name: plain.first().unwrap_or(&"").to_string(),
            value: template(plain.get(1).unwrap_or(&"")),
            side: Side::Client,
        },
        "ADD-HEADER" => OperatorKind::AddHeader {
            name: plain.first().unwrap_or(&"").to_string(),
            value: template(plain.get(1).unwrap_or(&"")),
            side: Side::Client,
        },
        "SET-CONFIG" => OperatorKind::SetConfig {
            name: plain.first().unwrap_or(&"").to_string(),
            value: template(plain.get(1).unwrap_or(&"")),
        },
        "SET-STATUS" => OperatorKind::SetStatus {
            code: plain.first().and_then(|s| s.parse().ok()).unwrap_or(200),
        },
        "SET-STATUS-REASON" => OperatorKind::SetStatusReason {
            code: plain.first().and_then(|s| s.parse().ok()).unwrap_or(200),
            reason: template(plain.get(1).unwrap_or(&"")),
        },
        "SET-DESTINATION" => OperatorKind::SetDestination {
            qualifier: dest_qualifier(plain.first().copied()),
            value: template(plain.get(1).unwrap_or(&"")),
        },
        "RM-DESTINATION" => OperatorKind::RmDestination { qualifier: dest_qualifier(plain.first().copied()) },
        "SET-REDIRECT" => OperatorKind::SetRedirect {
            code: plain.first().and_then(|s| s.parse().ok()).unwrap_or(302),
            target: template(plain.get(1).unwrap_or(&"")),
        },
        "TIMEOUT-OUT" => OperatorKind::TimeoutOut {
            kind: timeout_kind(plain.first().copied()),
            millis: plain.get(1).and_then(|s| s.parse().ok()).unwrap_or(0),
        },
        "SKIP-REMAP" => OperatorKind::SkipRemap,
        "NO-OP" => OperatorKind::NoOp,
        "COUNTER" => OperatorKind::Counter(plain.first().unwrap_or(&"").to_string()),
        "RM-COOKIE" => OperatorKind::RmCookie(plain.first().unwrap_or(&"").to_string()),
        "SET-COOKIE" => OperatorKind::SetCookie {
            name: plain.first().unwrap_or(&"").to_string(),
            value: template(plain.get(1).unwrap_or(&"")),
        },
        "ADD-COOKIE" => OperatorKind::AddCookie {
            name: plain.first().unwrap_or(&"").to_string(),
            value: template(plain.get(1).unwrap_or(&"")),
        },
        "SET-CONN-DSCP" => OperatorKind::SetConnDscp(plain.first().and_then(|s| s.parse().ok()).unwrap_or(0)),
        "SET-CONN-MARK" => OperatorKind::SetConnMark(plain.first().and_then(|s| s.parse().ok()).unwrap_or(0)),
        "SET-DEBUG" => OperatorKind::SetDebug,
        "SET-BODY" => OperatorKind::SetBody(template(plain.first().unwrap_or(&""))),
        "SET-BODY-FROM" => OperatorKind::SetBodyFrom(plain.first().unwrap_or(&"").to_string()),
        "SET-HTTP-CNTL" => OperatorKind::SetHttpCntl {
            name: plain.first().unwrap_or(&"").to_string(),
            on: plain.get(1).map(|s| s.eq_ignore_ascii_case("true") || *s == "1").unwrap_or(true),
        },
        "SET-PLUGIN-CNTL" => OperatorKind::SetPluginCntl {
            name: plain.first().unwrap_or(&"").to_string(),
            value: template(plain.get(1).unwrap_or(&"")),
        },
        "RUN-PLUGIN" => OperatorKind::RunPlugin {
            path: plain.first().unwrap_or(&"").to_string(),
            args: plain.iter().skip(1).map(|s| s.to_string()).collect(),
        },
        "SET-STATE-FLAG" => OperatorKind::SetStateFlag {
            ix: plain.first().and_then(|s| s.parse().ok()).unwrap_or(0),
            value: plain.get(1).map(|s| s.eq_ignore_ascii_case("true") || *s == "1").unwrap_or(true),
        },
        "SET-STATE-INT8" => OperatorKind::SetStateInt8 {
            lane: plain.first().and_then(|s| s.parse().ok()).unwrap_or(0),
            value: plain.get(1).and_then(|s| s.parse().ok()).unwrap_or(0),
        },
        "SET-STATE-INT16" => OperatorKind::SetStateInt16 {
            value: plain.first().and_then(|s| s.parse().ok()).unwrap_or(0),
        },
        "SET-EFFECTIVE-ADDRESS" => OperatorKind::SetEffectiveAddress(template(plain.first().unwrap_or(&""))),
        "SET-NEXT-HOP-STRATEGY" => OperatorKind::SetNextHopStrategy(plain.first().unwrap_or(&"").to_string()),
        "SET-CC-ALG" => OperatorKind::SetCcAlgorithm(plain.first().unwrap_or(&"").to_string()),
        _ => {
            return Err(CompileError::UnknownOperator {
                file: source.to_path_buf(),
                line: line_no,
                name: keyword.to_string(),
            })
        }
    };
    let mut op = Operator::new(kind);
    op.modifiers = parse_oper_modifiers(args);
    Ok(op)
}

fn dest_qualifier(arg: Option<&str>) -> crate::model::DestQualifier {
    use crate::model::DestQualifier;
    match arg.unwrap_or("HOST").to_ascii_uppercase().as_str() {
        "PORT" => DestQualifier::Port,
        "PATH" => DestQualifier::Path,
        "QUERY" => DestQualifier::Query,
        "SCHEME" => DestQualifier::Scheme,
        "URL" => DestQualifier::Url,
        _ => DestQualifier::Host,
    }
}

fn timeout_kind(arg: Option<&str>) -> crate::model::operator::TimeoutKind {
    use crate::model::operator::TimeoutKind;
    match arg.unwrap_or("ACTIVE").to_ascii_uppercase().as_str() {
        "NO-ACTIVITY" => TimeoutKind::NoActivity,
        "CONNECT" => TimeoutKind::Connect,
        "DNS-LOOKUP" => TimeoutKind::DnsLookup,
        _ => TimeoutKind::Active,
    }
}

/// Required-resources union over every condition/operator in `config`, for
/// callers deciding what to materialize before invoking a hook.
pub fn required_resources(config: &RulesConfig) -> ResourceBits {
    let mut bits = ResourceBits::NONE;
    for hook in Hook::ALL {
        for rule in &config.chain(hook).rules {
            for c in &rule.conditions {
                bits = bits.union(c.required_resources());
            }
            for o in &rule.operators {
                bits = bits.union(o.required_resources());
            }
        }
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeaderHeap;
    use crate::mime;
    use crate::model::{Disposition, Resources};

    #[test]
    fn compiles_simple_set_header_rule() {
        let src = "cond %{METHOD} =GET\nset-header X-Seen \"yes\"\n";
        let config = compile_str(src, Path::new("<test>")).unwrap();
        assert_eq!(config.rule_count(), 1);

        let mut heap = HeaderHeap::new();
        let mime_handle = mime::create(&mut heap);
        let mut res = Resources::new(Hook::Remap, &mut heap);
        res.client_request = Some(mime_handle);
        res.method = "GET".to_string();
        config.run(Hook::Remap, &mut res);
        let head = mime::field_find(res.heap, mime_handle, "X-Seen").unwrap();
        assert_eq!(res.heap.str_str(res.heap.field_block(head.0).slot(head.1).value), "yes");
    }

    #[test]
    fn hook_selector_switches_chain() {
        let src = "cond %{READ_RESPONSE_HDR_HOOK}\ncond %{STATUS} =404\nset-header X-NotFound \"1\"\n";
        let config = compile_str(src, Path::new("<test>")).unwrap();
        assert_eq!(config.chain(Hook::ReadResponse).rules.len(), 1);
        assert_eq!(config.chain(Hook::Remap).rules.len(), 0);
    }

    #[test]
    fn unknown_operator_is_a_compile_error() {
        let src = "do-something-weird X Y\n";
        let err = compile_str(src, Path::new("<test>")).unwrap_err();
        assert!(matches!(err, CompileError::UnknownOperator { .. }));
    }

    #[test]
    fn qsa_modifier_parses_on_set_destination() {
        let src = "set-destination QUERY a=1 [L,QSA]\n";
        let config = compile_str(src, Path::new("<test>")).unwrap();
        let rule = &config.chain(Hook::Remap).rules[0];
        assert!(rule.operators[0].modifiers.qsa);
        assert!(rule.operators[0].modifiers.last);
        let _ = Disposition::Continue;
    }

    #[test]
    fn suf_and_pre_tokens_set_matcher_anchor_modifiers() {
        let src = "cond %{PATH} =html [SUF]\nset-header X-A \"1\"\n";
        let config = compile_str(src, Path::new("<test>")).unwrap();
        let cond = &config.chain(Hook::Remap).rules[0].conditions[0];
        assert!(cond.modifiers.suffix);
        assert!(!cond.modifiers.prefix);

        let src = "cond %{PATH} =index [PRE]\nset-header X-A \"1\"\n";
        let config = compile_str(src, Path::new("<test>")).unwrap();
        let cond = &config.chain(Hook::Remap).rules[0].conditions[0];
        assert!(cond.modifiers.prefix);
        assert!(!cond.modifiers.suffix);
    }

    #[test]
    fn and_or_on_same_condition_is_a_compile_error() {
        let src = "cond %{METHOD} =GET [AND,OR]\nset-header X-A \"1\"\n";
        let err = compile_str(src, Path::new("<test>")).unwrap_err();
        assert!(matches!(err, CompileError::ModifierConflict { .. }));
    }
}
