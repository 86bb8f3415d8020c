use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::grammar::lr_automaton::LrAutomaton;
use crate::grammar::END_MARK;

/// One parsing decision. Reduce carries the production index; the textual
/// encoding (`s<state>`, `r<production>`, `acc`) is the contract table
/// consumers depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Shift(usize),
    Reduce(usize),
    Accept,
}

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Action::Shift(state) => format!("s{}", state),
            Action::Reduce(production) => format!("r{}", production),
            Action::Accept => "acc".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub state: usize,
    pub symbol: String,
    pub existing: Action,
    pub attempted: Action,
}

/// The LR(1) decision table. `action` rows are indexed by state, columns by
/// `terminals` (end marker last); `goto` columns by `non_terminals`.
/// `productions` is index-aligned with the augmented grammar, so `r<N>`
/// cells can be read back against it.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct LrParsingTable {
    pub terminals: Vec<String>,
    pub non_terminals: Vec<String>,
    pub productions: Vec<String>,
    pub action: Vec<Vec<Option<Action>>>,
    pub goto: Vec<Vec<Option<usize>>>,
    pub shift_reduce_conflicts: Vec<Conflict>,
    pub reduce_reduce_conflicts: Vec<Conflict>,
}

impl LrAutomaton {
    /// Derives action and goto tables from the canonical collection.
    ///
    /// Conflict policy: a Shift is never overwritten by a Reduce (the
    /// attempt is recorded as a shift-reduce conflict); a Shift attempted
    /// against a Reduce overwrites it and records the conflict; of two
    /// different Reduces the first written survives and a reduce-reduce
    /// conflict is recorded; Accept is written over anything at the end
    /// marker, recording a conflict if the cell was taken. Conflicts never
    /// abort construction.
    pub fn to_parsing_table(&self) -> LrParsingTable {
        let g = &self.grammar;
        let end = g.end_mark();

        let mut terminal_columns: Vec<usize> = (0..g.symbols.len())
            .filter(|&i| g.symbols[i].is_terminal() && i != end)
            .collect();
        terminal_columns.push(end);
        let nonterminal_columns: Vec<usize> = (0..g.symbols.len())
            .filter(|&i| !g.symbols[i].is_terminal())
            .collect();
        let terminal_column: HashMap<usize, usize> = terminal_columns
            .iter()
            .enumerate()
            .map(|(col, &sym)| (sym, col))
            .collect();
        let nonterminal_column: HashMap<usize, usize> = nonterminal_columns
            .iter()
            .enumerate()
            .map(|(col, &sym)| (sym, col))
            .collect();

        let mut action: Vec<Vec<Option<Action>>> =
            vec![vec![None; terminal_columns.len()]; self.states.len()];
        let mut goto: Vec<Vec<Option<usize>>> =
            vec![vec![None; nonterminal_columns.len()]; self.states.len()];
        let mut shift_reduce_conflicts = Vec::new();
        let mut reduce_reduce_conflicts = Vec::new();

        for (i, state) in self.states.iter().enumerate() {
            for item in &state.items {
                if item.is_end(g) {
                    if item.production == 0 {
                        let cell = &mut action[i][terminal_column[&end]];
                        if let Some(existing) = *cell {
                            shift_reduce_conflicts.push(Conflict {
                                state: i,
                                symbol: END_MARK.to_string(),
                                existing,
                                attempted: Action::Accept,
                            });
                        }
                        *cell = Some(Action::Accept);
                        continue;
                    }
                    for &t in &item.lookahead {
                        let attempted = Action::Reduce(item.production);
                        let cell = &mut action[i][terminal_column[&t]];
                        match *cell {
                            None => *cell = Some(attempted),
                            Some(existing @ Action::Shift(_)) => {
                                // Shift preference: the shift is kept.
                                shift_reduce_conflicts.push(Conflict {
                                    state: i,
                                    symbol: g.get_symbol_name(t).to_string(),
                                    existing,
                                    attempted,
                                });
                            }
                            Some(existing @ Action::Reduce(p)) => {
                                if p != item.production {
                                    // The first-written reduce is kept.
                                    reduce_reduce_conflicts.push(Conflict {
                                        state: i,
                                        symbol: g.get_symbol_name(t).to_string(),
                                        existing,
                                        attempted,
                                    });
                                }
                            }
                            Some(Action::Accept) => {}
                        }
                    }
                } else if let Some(next) = item.next_symbol(g) {
                    if !g.symbols[next].is_terminal() {
                        continue;
                    }
                    let target = match state.edges.get(&next) {
                        Some(&t) => t,
                        None => continue,
                    };
                    let attempted = Action::Shift(target);
                    let cell = &mut action[i][terminal_column[&next]];
                    match *cell {
                        None => *cell = Some(attempted),
                        Some(existing @ Action::Reduce(_)) => {
                            // Shift wins and replaces the reduce.
                            shift_reduce_conflicts.push(Conflict {
                                state: i,
                                symbol: g.get_symbol_name(next).to_string(),
                                existing,
                                attempted,
                            });
                            *cell = Some(attempted);
                        }
                        Some(Action::Shift(_)) | Some(Action::Accept) => {}
                    }
                }
            }

            for (&symbol, &target) in &state.edges {
                if !g.symbols[symbol].is_terminal() {
                    goto[i][nonterminal_column[&symbol]] = Some(target);
                }
            }
        }

        debug!(
            "parsing table built: {} states, {} shift-reduce and {} reduce-reduce conflicts",
            self.states.len(),
            shift_reduce_conflicts.len(),
            reduce_reduce_conflicts.len()
        );

        LrParsingTable {
            terminals: terminal_columns
                .iter()
                .map(|&s| g.get_symbol_name(s).to_string())
                .collect(),
            non_terminals: nonterminal_columns
                .iter()
                .map(|&s| g.get_symbol_name(s).to_string())
                .collect(),
            productions: (0..g.productions.len()).map(|p| g.production_text(p)).collect(),
            action,
            goto,
            shift_reduce_conflicts,
            reduce_reduce_conflicts,
        }
    }
}

impl LrParsingTable {
    /// Column of a terminal by name, end marker included.
    pub fn terminal_column(&self, name: &str) -> Option<usize> {
        self.terminals.iter().position(|t| t == name)
    }

    pub fn conflict_count(&self) -> usize {
        self.shift_reduce_conflicts.len() + self.reduce_reduce_conflicts.len()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Action, LrParsingTable};
    use crate::grammar::Grammar;

    fn table_for(source: &str) -> LrParsingTable {
        Grammar::parse(source)
            .unwrap()
            .to_lr_automaton()
            .unwrap()
            .to_parsing_table()
    }

    fn cell(table: &LrParsingTable, state: usize, terminal: &str) -> Option<Action> {
        table.action[state][table.terminal_column(terminal).unwrap()]
    }

    #[test]
    fn action_encoding_contract() {
        assert_eq!(Action::Shift(12).encode(), "s12");
        assert_eq!(Action::Reduce(0).encode(), "r0");
        assert_eq!(Action::Accept.encode(), "acc");
    }

    #[test]
    fn right_recursive_list_table() {
        let table = table_for("<S> ::= <A>\n<A> ::= a <A> | ε");

        // Augmented production order: 0: S'::=S, 1: S::=A, 2: A::=a A,
        // 3: A::=ε.
        assert_eq!(table.productions[0], "S' ::= S");
        assert_eq!(table.productions[3], "A ::= ε");

        // The start state shifts `a` and reduces the ε-production on `$`.
        let shifted = match cell(&table, 0, "a") {
            Some(Action::Shift(s)) => s,
            other => panic!("expected shift, got {:?}", other),
        };
        assert_eq!(cell(&table, 0, "$"), Some(Action::Reduce(3)));

        // The shifted state loops on `a` and also reduces ε on `$`.
        assert_eq!(cell(&table, shifted, "a"), Some(Action::Shift(shifted)));
        assert_eq!(cell(&table, shifted, "$"), Some(Action::Reduce(3)));

        // Exactly one accept entry, at the end-marker column.
        let accepts: Vec<(usize, usize)> = table
            .action
            .iter()
            .enumerate()
            .flat_map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, a)| **a == Some(Action::Accept))
                    .map(move |(j, _)| (i, j))
            })
            .collect();
        assert_eq!(accepts.len(), 1);
        assert_eq!(accepts[0].1, table.terminal_column("$").unwrap());

        // Gotos landed in the goto table, not the action table.
        let s_col = table.non_terminals.iter().position(|n| n == "S").unwrap();
        let a_col = table.non_terminals.iter().position(|n| n == "A").unwrap();
        assert!(table.goto[0][s_col].is_some());
        assert!(table.goto[0][a_col].is_some());

        assert!(table.shift_reduce_conflicts.is_empty());
        assert!(table.reduce_reduce_conflicts.is_empty());
    }

    #[test]
    fn dangling_otherwise_prefers_shift() {
        let table = table_for(
            "<stmt> ::= IF LPAREN expr RPAREN <stmt> <stmt_OPT>\n\
             <stmt> ::= other\n\
             <stmt_OPT> ::= OTHERWISE <stmt> | ε",
        );

        assert_eq!(table.shift_reduce_conflicts.len(), 1);
        assert!(table.reduce_reduce_conflicts.is_empty());

        let conflict = &table.shift_reduce_conflicts[0];
        assert_eq!(conflict.symbol, "OTHERWISE");
        assert!(matches!(
            (conflict.existing, conflict.attempted),
            (Action::Shift(_), Action::Reduce(_)) | (Action::Reduce(_), Action::Shift(_))
        ));

        // The surviving cell is the shift.
        assert!(matches!(
            cell(&table, conflict.state, "OTHERWISE"),
            Some(Action::Shift(_))
        ));
    }

    #[test]
    fn reduce_reduce_keeps_first_written() {
        let table = table_for("<S> ::= <A> x | <B> x\n<A> ::= a\n<B> ::= a");

        assert_eq!(table.reduce_reduce_conflicts.len(), 1);
        let conflict = &table.reduce_reduce_conflicts[0];
        assert_eq!(conflict.symbol, "x");
        assert_eq!(conflict.existing, Action::Reduce(3));
        assert_eq!(conflict.attempted, Action::Reduce(4));
        assert_eq!(cell(&table, conflict.state, "x"), Some(Action::Reduce(3)));
    }

    #[test]
    fn end_marker_is_last_terminal_column() {
        let table = table_for("<S> ::= a b");
        assert_eq!(table.terminals.last().map(String::as_str), Some("$"));
    }

    #[test]
    fn table_dimensions_match_states() {
        let table = table_for("<S> ::= <A>\n<A> ::= a <A> | ε");
        assert_eq!(table.action.len(), 5);
        assert_eq!(table.goto.len(), 5);
        for (row_a, row_g) in table.action.iter().zip(table.goto.iter()) {
            assert_eq!(row_a.len(), table.terminals.len());
            assert_eq!(row_g.len(), table.non_terminals.len());
        }
    }
}
