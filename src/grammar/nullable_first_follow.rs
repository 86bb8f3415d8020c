use std::collections::HashSet;

use log::debug;

use crate::grammar::{grammar::Symbol, Grammar};

impl Grammar {
    /// Computes nullable flags and FIRST/FOLLOW sets for every nonterminal.
    /// Each pass is a fixpoint loop with an explicit change guard, bounded
    /// by the finite terminal alphabet. FOLLOW of the start symbol is
    /// seeded with the end marker.
    pub fn calculate_nullable_first_follow(&mut self) {
        if self.analyzed {
            return;
        }
        if let Some(start) = self.start_symbol {
            let end = self.end_mark();
            match self.symbols[start].mut_non_terminal() {
                Some(nt) => {
                    nt.follow.insert(end);
                }
                None => unreachable!("start symbol is always a nonterminal"),
            }
        }
        self.calculate_nullable();
        self.calculate_first();
        self.calculate_follow();
        self.analyzed = true;
        debug!(
            "analyzed {} nonterminals over {} productions",
            self.non_terminal_iter().count(),
            self.productions.len()
        );
    }

    pub fn is_nullable_first_follow_valid(&self) -> bool {
        self.analyzed
    }

    pub fn reset_nullable_first_follow(&mut self) {
        for nt in self.non_terminal_iter_mut() {
            nt.nullable = false;
            nt.first = HashSet::new();
            nt.follow = HashSet::new();
        }
        self.analyzed = false;
    }

    /// FIRST of a symbol sequence under the concatenation rule. Returns the
    /// set of terminals that can begin the sequence and whether the whole
    /// sequence can derive ε. Shared between FOLLOW computation and LR(1)
    /// lookahead propagation.
    pub fn first_of_sequence(&self, symbols: &[usize]) -> (HashSet<usize>, bool) {
        let mut first = HashSet::new();
        for &idx in symbols {
            match &self.symbols[idx] {
                Symbol::Terminal(_) => {
                    first.insert(idx);
                    return (first, false);
                }
                Symbol::NonTerminal(nt) => {
                    first.extend(nt.first.iter().copied());
                    if !nt.nullable {
                        return (first, false);
                    }
                }
            }
        }
        (first, true)
    }

    fn calculate_nullable(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..self.productions.len() {
                let lhs = self.productions[i].lhs;
                if self.symbols[lhs]
                    .non_terminal()
                    .map_or(false, |nt| nt.nullable)
                {
                    continue;
                }
                let nullable = self.productions[i].rhs.iter().all(|&s| {
                    self.symbols[s]
                        .non_terminal()
                        .map_or(false, |nt| nt.nullable)
                });
                if nullable {
                    if let Some(nt) = self.symbols[lhs].mut_non_terminal() {
                        nt.nullable = true;
                    }
                    changed = true;
                }
            }
        }
    }

    fn calculate_first(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..self.symbols.len() {
                let first: HashSet<usize> = match &self.symbols[i] {
                    Symbol::Terminal(_) => continue,
                    Symbol::NonTerminal(nt) => {
                        let mut first = nt.first.clone();
                        for &p in &nt.productions {
                            let (f, _) = self.first_of_sequence(&self.productions[p].rhs);
                            first.extend(f);
                        }
                        first
                    }
                };
                if let Some(nt) = self.symbols[i].mut_non_terminal() {
                    if nt.first.len() != first.len() {
                        changed = true;
                        nt.first = first;
                    }
                }
            }
        }
    }

    fn calculate_follow(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for pi in 0..self.productions.len() {
                let production = self.productions[pi].clone();
                for (i, &sym) in production.rhs.iter().enumerate() {
                    if self.symbols[sym].non_terminal().is_none() {
                        continue;
                    }
                    let (mut addition, beta_nullable) =
                        self.first_of_sequence(&production.rhs[i + 1..]);
                    if beta_nullable {
                        if let Some(lhs_nt) = self.symbols[production.lhs].non_terminal() {
                            addition.extend(lhs_nt.follow.iter().copied());
                        }
                    }
                    if let Some(nt) = self.symbols[sym].mut_non_terminal() {
                        let before = nt.follow.len();
                        nt.follow.extend(addition);
                        if nt.follow.len() != before {
                            changed = true;
                        }
                    }
                }
            }
        }
    }
}
