use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use log::debug;

use crate::error::GrammarError;
use crate::grammar::Grammar;

/// Upper bound on the canonical collection before construction gives up.
/// Pathological grammars can blow up exponentially; failing beats hanging.
pub const DEFAULT_STATE_LIMIT: usize = 10_000;

/// An LR(1) item: a production, a dot position, and a lookahead set of
/// terminal indices. The derived order (production, dot, lookahead) is the
/// total order item sets are canonicalized by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LrItem {
    pub production: usize,
    pub dot: usize,
    pub lookahead: BTreeSet<usize>,
}

impl LrItem {
    /// The symbol immediately after the dot, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<usize> {
        g.productions[self.production].rhs.get(self.dot).copied()
    }

    pub fn is_end(&self, g: &Grammar) -> bool {
        self.dot == g.productions[self.production].rhs.len()
    }
}

/// A canonical item set. Items sharing (production, dot) are always merged
/// by lookahead union, so two derivations of the same state compare equal.
pub type ItemSet = BTreeSet<LrItem>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LrState {
    pub items: ItemSet,
    /// Transitions on both terminals (shifts) and nonterminals (gotos);
    /// the distinction is drawn at table-build time.
    pub edges: BTreeMap<usize, usize>,
}

/// The canonical LR(1) collection over an augmented grammar. State 0 is the
/// closure of `[S' ::= • S, {$}]`; the rest are numbered in discovery
/// order, which is deterministic for a fixed grammar because goto is
/// attempted in symbol interning order.
#[derive(Debug)]
pub struct LrAutomaton {
    pub grammar: Grammar,
    pub states: Vec<LrState>,
}

type LookaheadMap = BTreeMap<(usize, usize), BTreeSet<usize>>;

/// Closure of an item set, in (production, dot) → lookahead form. For every
/// item `[A ::= α • B β, L]` and production `B ::= γ`, the item
/// `[B ::= • γ, FIRST(β L) \ {ε}]` is added, merging lookaheads into any
/// existing (production, dot) entry. Loops until no entry is added and no
/// lookahead set grows.
fn closure(g: &Grammar, kernel: LookaheadMap) -> ItemSet {
    let mut items = kernel;
    let mut changed = true;
    while changed {
        changed = false;
        let snapshot: Vec<((usize, usize), BTreeSet<usize>)> =
            items.iter().map(|(k, v)| (*k, v.clone())).collect();
        for ((production, dot), lookahead) in snapshot {
            let next = match g.productions[production].rhs.get(dot) {
                Some(&s) => s,
                None => continue,
            };
            let nt = match g.symbols[next].non_terminal() {
                Some(nt) => nt,
                None => continue,
            };
            let beta = &g.productions[production].rhs[dot + 1..];
            let (mut propagated, beta_nullable) = g.first_of_sequence(beta);
            if beta_nullable {
                propagated.extend(lookahead.iter().copied());
            }
            for &p in &nt.productions {
                let is_new = !items.contains_key(&(p, 0));
                let entry = items.entry((p, 0)).or_default();
                let before = entry.len();
                entry.extend(propagated.iter().copied());
                if is_new || entry.len() != before {
                    changed = true;
                }
            }
        }
    }
    items
        .into_iter()
        .map(|((production, dot), lookahead)| LrItem {
            production,
            dot,
            lookahead,
        })
        .collect()
}

/// Kernel of goto(I, X): every item of I with the dot before X, advanced by
/// one, lookaheads merged per (production, dot). Empty when nothing
/// advances.
fn goto_kernel(g: &Grammar, items: &ItemSet, symbol: usize) -> LookaheadMap {
    let mut kernel = LookaheadMap::new();
    for item in items {
        if item.next_symbol(g) == Some(symbol) {
            kernel
                .entry((item.production, item.dot + 1))
                .or_default()
                .extend(item.lookahead.iter().copied());
        }
    }
    kernel
}

impl Grammar {
    /// Builds the canonical LR(1) collection with the default state bound.
    pub fn to_lr_automaton(&self) -> Result<LrAutomaton, GrammarError> {
        self.to_lr_automaton_bounded(DEFAULT_STATE_LIMIT)
    }

    /// Builds the canonical LR(1) collection over the augmented grammar.
    /// States are discovered worklist-first, goto attempted for every
    /// symbol in interning order; each nonempty unseen result set gets the
    /// next free index. Exceeding `state_limit` aborts with an error.
    pub fn to_lr_automaton_bounded(&self, state_limit: usize) -> Result<LrAutomaton, GrammarError> {
        let mut grammar = self.augmented()?;
        grammar.calculate_nullable_first_follow();

        let mut initial = LookaheadMap::new();
        initial.insert((0, 0), BTreeSet::from([grammar.end_mark()]));
        let initial = closure(&grammar, initial);

        let mut states = vec![LrState {
            items: initial.clone(),
            edges: BTreeMap::new(),
        }];
        let mut index: HashMap<ItemSet, usize> = HashMap::from([(initial, 0)]);
        let mut queue: VecDeque<usize> = VecDeque::from([0]);

        while let Some(u) = queue.pop_front() {
            for symbol in 0..grammar.symbols.len() {
                let kernel = goto_kernel(&grammar, &states[u].items, symbol);
                if kernel.is_empty() {
                    continue;
                }
                let target = closure(&grammar, kernel);
                let v = match index.get(&target) {
                    Some(&v) => v,
                    None => {
                        if states.len() >= state_limit {
                            return Err(GrammarError::StateLimitExceeded { limit: state_limit });
                        }
                        let v = states.len();
                        debug!(
                            "state {} discovered via {} on {}",
                            v,
                            u,
                            grammar.get_symbol_name(symbol)
                        );
                        states.push(LrState {
                            items: target.clone(),
                            edges: BTreeMap::new(),
                        });
                        index.insert(target, v);
                        queue.push_back(v);
                        v
                    }
                };
                states[u].edges.insert(symbol, v);
            }
        }

        debug!("canonical collection has {} states", states.len());
        Ok(LrAutomaton { grammar, states })
    }
}
