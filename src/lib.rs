extern crate wasm_bindgen;

use wasm_bindgen::prelude::*;

pub mod error;
mod grammar;

pub use error::GrammarError;
pub use grammar::ebnf;
pub use grammar::lr_automaton::{LrAutomaton, LrItem, LrState, DEFAULT_STATE_LIMIT};
pub use grammar::parse_table::{Action, Conflict, LrParsingTable};
pub use grammar::pretty_print::{LrAutomatonOutput, NonTerminalOutputVec, ProductionOutputVec};
pub use grammar::Grammar;

/// Runs the whole pipeline: EBNF normalization, parsing, augmentation,
/// FIRST/FOLLOW analysis, canonical LR(1) collection, table derivation.
/// Normalization is idempotent, so pure-BNF input passes through
/// unchanged.
pub fn build_lr1_table(source: &str) -> Result<LrParsingTable, GrammarError> {
    let normalized = ebnf::normalize(source)?;
    let grammar = Grammar::parse(&normalized)?;
    let automaton = grammar.to_lr_automaton()?;
    Ok(automaton.to_parsing_table())
}

#[wasm_bindgen]
pub fn lr1_table_to_json(grammar: &str) -> String {
    match build_lr1_table(grammar) {
        Ok(table) => table.to_json(),
        Err(e) => format!("{{\"error\":\"{}\"}}", e),
    }
}

#[cfg(test)]
mod pipeline_tests {
    use pretty_assertions::assert_eq;

    use crate::grammar::ebnf;
    use crate::{build_lr1_table, Action, Grammar};

    #[test]
    fn kleene_expansion_end_to_end() {
        let normalized = ebnf::normalize("<X> ::= a (b | c)* d").unwrap();
        let g = Grammar::parse(&normalized).unwrap();

        // Exactly one synthetic nonterminal, and no shorthand anywhere.
        let nonterminals: Vec<&str> = g.non_terminal_iter().map(|nt| nt.name.as_str()).collect();
        assert_eq!(nonterminals, vec!["X", "X_KLEENE"]);
        for p in 0..g.productions.len() {
            let text = g.production_text(p);
            assert!(!text.contains(['(', ')', '*', '+', '?']), "{}", text);
        }

        // X references the synthetic rule; the rule is {b G, c G, ε}.
        assert_eq!(g.production_text(0), "X ::= a X_KLEENE d");
        assert_eq!(g.production_text(1), "X_KLEENE ::= b X_KLEENE");
        assert_eq!(g.production_text(2), "X_KLEENE ::= c X_KLEENE");
        assert_eq!(g.production_text(3), "X_KLEENE ::= ε");
    }

    #[test]
    fn right_recursive_list_end_to_end() {
        let table = build_lr1_table("<S> ::= <A>\n<A> ::= a <A> | ε").unwrap();

        let a = table.terminal_column("a").unwrap();
        let end = table.terminal_column("$").unwrap();

        let accepts = table
            .action
            .iter()
            .flatten()
            .filter(|c| **c == Some(Action::Accept))
            .count();
        assert_eq!(accepts, 1);

        let shifted = match table.action[0][a] {
            Some(Action::Shift(s)) => s,
            other => panic!("expected shift from the start state, got {:?}", other),
        };
        assert_eq!(table.action[shifted][a], Some(Action::Shift(shifted)));
        assert_eq!(table.action[0][end], Some(Action::Reduce(3)));
        assert_eq!(table.conflict_count(), 0);
    }

    #[test]
    fn dangling_otherwise_shift_preference() {
        let table = build_lr1_table(
            "<stmt> ::= IF LPAREN expr RPAREN <stmt> (OTHERWISE <stmt>)?\n\
             <stmt> ::= other",
        )
        .unwrap();

        assert_eq!(table.shift_reduce_conflicts.len(), 1);
        assert!(table.reduce_reduce_conflicts.is_empty());

        let conflict = &table.shift_reduce_conflicts[0];
        assert_eq!(conflict.symbol, "OTHERWISE");
        let col = table.terminal_column("OTHERWISE").unwrap();
        assert!(matches!(
            table.action[conflict.state][col],
            Some(Action::Shift(_))
        ));
    }

    #[test]
    fn identical_input_builds_identical_tables() {
        let source = "<E> ::= <E> plus <T> | <T>\n<T> ::= id lparen <E> rparen | id";
        assert_eq!(
            build_lr1_table(source).unwrap(),
            build_lr1_table(source).unwrap()
        );
    }

    #[test]
    fn errors_propagate_through_the_pipeline() {
        assert!(build_lr1_table("<S> ::= (a").is_err());
        assert!(build_lr1_table("<S> ::= a\n<a> ::= b").is_err());
    }

    #[test]
    fn wasm_surface_reports_errors_as_json() {
        let out = crate::lr1_table_to_json("<S> ::= (a");
        assert!(out.starts_with("{\"error\":"));

        let ok = crate::lr1_table_to_json("<S> ::= a");
        assert!(ok.contains("\"action\""));
    }
}
