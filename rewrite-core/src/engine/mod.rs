//! The compiled rule chain and the engine that walks it.
//!
//! Grounded in `RuleSet`/`HttpHeaderRewrite` in
//! `original_source/plugins/header_rewrite/header_rewrite.cc`. A `RuleSet`
//! here is one hook's chain of `Rule`s (one condition group + its
//! operators); `RulesConfig` is every hook's chain for one loaded rule
//! file, immutably shared across transactions via `Arc` per spec.md §5.

use crate::model::{Condition, CounterTable, Disposition, Hook, Operator, Resources};
use std::sync::Arc;

/// One `cond ... cond ...` group followed by the operators it guards.
#[derive(Debug, Clone)]
pub struct Rule {
    pub conditions: Vec<Condition>,
    pub operators: Vec<Operator>,
}

impl Rule {
    /// Evaluates this rule's condition chain against `res`, honoring the
    /// `AND`/`OR`/`NOT` group modifiers on each condition. `LAST` on a
    /// condition stops evaluation of the remaining conditions in this
    /// group *and* marks the enclosing `RuleSet` as the last one the
    /// engine should evaluate in this hook, regardless of whether the
    /// group ends up true or false (spec.md §4.5).
    fn matches(&self, res: &mut Resources) -> (bool, bool) {
        if self.conditions.is_empty() {
            return (true, false);
        }
        let mut acc = true;
        let mut first = true;
        for cond in &self.conditions {
            let v = cond.eval(res);
            acc = if first {
                v
            } else if cond.group.or {
                acc || v
            } else {
                // AND is the default combinator when no modifier is given.
                acc && v
            };
            first = false;
            if cond.group.last {
                return (acc, true);
            }
        }
        (acc, false)
    }

    /// Runs this rule's operators in order if its conditions match.
    /// `RuleOutcome::stop` reflects either a condition-group `LAST` or the
    /// accumulated operator `LAST` modifier (spec.md §4.5); `skip_remap`
    /// reflects an explicit `SKIP-REMAP` operator, which short-circuits the
    /// whole chain immediately regardless of `LAST`.
    fn run(&self, res: &mut Resources) -> RuleOutcome {
        let (matched, cond_last) = self.matches(res);
        if !matched {
            return RuleOutcome::NoMatch { stop: cond_last };
        }
        let mut stop = cond_last;
        for op in &self.operators {
            if let Some(Disposition::NoRemap) = op.apply(res) {
                return RuleOutcome::Matched { stop: true, skip_remap: true };
            }
            stop |= op.modifiers.last;
        }
        RuleOutcome::Matched { stop, skip_remap: false }
    }
}

enum RuleOutcome {
    NoMatch { stop: bool },
    Matched { stop: bool, skip_remap: bool },
}

/// One hook's ordered chain of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

/// A fully compiled, immutable rule file: one chain per hook plus the
/// process-wide atomic counters `COUNTER` operators bump. Shared across
/// transactions behind an `Arc` and swapped wholesale on reload — there is
/// no in-place mutation of a live `RulesConfig` (spec.md §5).
#[derive(Debug, Default)]
pub struct RulesConfig {
    chains: [RuleSet; 6],
    pub counters: Arc<CounterTable>,
}

impl RulesConfig {
    pub fn new() -> Self {
        Self {
            chains: Default::default(),
            counters: Arc::new(CounterTable::default()),
        }
    }

    pub fn chain_mut(&mut self, hook: Hook) -> &mut RuleSet {
        &mut self.chains[hook.index()]
    }

    pub fn chain(&self, hook: Hook) -> &RuleSet {
        &self.chains[hook.index()]
    }

    pub fn rule_count(&self) -> usize {
        self.chains.iter().map(|c| c.rules.len()).sum()
    }

    /// Runs every rule in `hook`'s chain against `res`, in declared order,
    /// stopping early on an accumulated `LAST` modifier or an explicit
    /// `SKIP-REMAP`. Mirrors `HttpHeaderRewrite::doRemap`/
    /// `handleReadResponse`'s top-level loop (spec.md §4.7). For the remap
    /// hook the disposition reflects `changed_url` at exit, not merely
    /// whether a rule fired; `SKIP-REMAP` forces `NoRemap` immediately.
    pub fn run(&self, hook: Hook, res: &mut Resources) -> Disposition {
        res.counters = self.counters.clone();
        for rule in &self.chain(hook).rules {
            match rule.run(res) {
                RuleOutcome::NoMatch { stop } => {
                    if stop {
                        break;
                    }
                }
                RuleOutcome::Matched { skip_remap: true, .. } => return Disposition::NoRemap,
                RuleOutcome::Matched { stop, .. } => {
                    if stop {
                        break;
                    }
                }
            }
        }
        if hook == Hook::Remap {
            if res.changed_url {
                Disposition::DidRemap
            } else {
                Disposition::NoRemap
            }
        } else {
            Disposition::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeaderHeap;
    use crate::mime;
    use crate::model::{ConditionKind, Matcher, OperatorKind, Side, ValueTemplate};

    fn cond(kind: ConditionKind) -> Condition {
        Condition::new(kind)
    }

    #[test]
    fn set_header_rule_fires_when_condition_matches() {
        let mut heap = HeaderHeap::new();
        let mime_handle = mime::create(&mut heap);
        let mut res = Resources::new(Hook::ReadRequest, &mut heap);
        res.client_request = Some(mime_handle);
        res.method = "GET".to_string();

        let mut config = RulesConfig::new();
        let mut c = cond(ConditionKind::Method);
        c.matcher = Some(Matcher::Eq("GET".to_string()));
        config.chain_mut(Hook::ReadRequest).rules.push(Rule {
            conditions: vec![c],
            operators: vec![Operator::new(OperatorKind::SetHeader {
                name: "X-Matched".to_string(),
                value: ValueTemplate("yes".to_string()),
                side: Side::Client,
            })],
        });

        config.run(Hook::ReadRequest, &mut res);
        let head = mime::field_find(res.heap, mime_handle, "X-Matched").unwrap();
        assert_eq!(res.heap.str_str(res.heap.field_block(head.0).slot(head.1).value), "yes");
    }

    #[test]
    fn or_short_circuits_remaining_conditions() {
        let mut heap = HeaderHeap::new();
        let mime_handle = mime::create(&mut heap);
        let mut res = Resources::new(Hook::ReadRequest, &mut heap);
        res.client_request = Some(mime_handle);

        let mut first = cond(ConditionKind::True);
        first.group.last = true;
        let mut second = cond(ConditionKind::False);
        second.group.or = true;

        let mut config = RulesConfig::new();
        config.chain_mut(Hook::ReadRequest).rules.push(Rule {
            conditions: vec![first, second],
            operators: vec![Operator::new(OperatorKind::Counter("hit".to_string()))],
        });

        let d = config.run(Hook::ReadRequest, &mut res);
        assert_eq!(d, Disposition::Continue);
        assert_eq!(res.counters.get("hit"), 1);
    }

    #[test]
    fn skip_remap_operator_returns_no_remap() {
        let mut heap = HeaderHeap::new();
        let mut res = Resources::new(Hook::Remap, &mut heap);
        let mut config = RulesConfig::new();
        config.chain_mut(Hook::Remap).rules.push(Rule {
            conditions: vec![],
            operators: vec![Operator::new(OperatorKind::SkipRemap)],
        });
        assert_eq!(config.run(Hook::Remap, &mut res), Disposition::NoRemap);
    }
}
