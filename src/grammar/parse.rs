use std::collections::HashSet;

use crate::error::GrammarError;
use crate::grammar::{Grammar, EPSILON};

impl Grammar {
    /// Parses pure-BNF rule text: one `<Name> ::= alt | alt | ...` per
    /// line, `#` lines and blank lines skipped. Angle-bracketed tokens are
    /// nonterminals, bare identifier-shaped tokens are terminals, ε is the
    /// explicit empty alternative, everything else is a separator. The
    /// first left-hand side becomes the start symbol.
    ///
    /// A name used both as a terminal and as a nonterminal is rejected
    /// rather than silently split into two symbols.
    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        let mut rules: Vec<(usize, String, &str)> = Vec::new();
        let mut lhs_names: HashSet<String> = HashSet::new();

        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.matches("::=").count() {
                0 => {
                    return Err(GrammarError::MalformedRule {
                        line: i + 1,
                        reason: "missing \"::=\"".to_string(),
                    });
                }
                1 => {
                    let (lhs, body) = match line.split_once("::=") {
                        Some(parts) => parts,
                        None => unreachable!(),
                    };
                    let name = lhs
                        .trim()
                        .strip_prefix('<')
                        .and_then(|s| s.strip_suffix('>'))
                        .map(str::trim)
                        .filter(|n| {
                            !n.is_empty()
                                && !n.contains(['<', '>'])
                                && n.split_whitespace().count() == 1
                        })
                        .ok_or_else(|| GrammarError::MalformedRule {
                            line: i + 1,
                            reason: "left side must be a single <Name>".to_string(),
                        })?;
                    lhs_names.insert(name.to_string());
                    rules.push((i + 1, name.to_string(), body));
                }
                _ => {
                    return Err(GrammarError::MalformedRule {
                        line: i + 1,
                        reason: "more than one \"::=\"".to_string(),
                    });
                }
            }
        }

        let mut g = Self::new();
        for (line, lhs, body) in rules {
            let left = match g.get_symbol_index(&lhs) {
                Some(idx) => {
                    if g.symbols[idx].is_terminal() {
                        return Err(GrammarError::InconsistentSymbol { name: lhs });
                    }
                    idx
                }
                None => g.add_non_terminal(&lhs),
            };
            if g.start_symbol.is_none() {
                g.start_symbol = Some(left);
            }
            for alternative in body.split('|') {
                let (rhs, saw_epsilon) = g.parse_symbols(line, alternative, &lhs_names)?;
                if rhs.is_empty() && !saw_epsilon {
                    continue;
                }
                g.add_production(left, rhs);
            }
        }
        Ok(g)
    }

    /// Tokenizes one alternative into interned symbol indices. Returns the
    /// rhs and whether an explicit ε was present (an empty rhs with ε is an
    /// epsilon production; without it, the alternative is dropped).
    fn parse_symbols(
        &mut self,
        line: usize,
        alternative: &str,
        lhs_names: &HashSet<String>,
    ) -> Result<(Vec<usize>, bool), GrammarError> {
        let mut rhs = Vec::new();
        let mut saw_epsilon = false;
        let mut iter = alternative.char_indices().peekable();

        while let Some((i, c)) = iter.next() {
            if c == '<' {
                let rest = &alternative[i + 1..];
                let end = rest.find('>').ok_or_else(|| GrammarError::MalformedRule {
                    line,
                    reason: "unterminated \"<\"".to_string(),
                })?;
                let name = rest[..end].trim();
                if name.split_whitespace().count() != 1 {
                    return Err(GrammarError::MalformedRule {
                        line,
                        reason: format!("\"<{}>\" is not a nonterminal name", name),
                    });
                }
                // Consume through the closing '>'.
                while iter.peek().map_or(false, |&(j, _)| j <= i + end) {
                    iter.next();
                }
                iter.next();

                match self.get_symbol_index(name) {
                    Some(idx) => {
                        if self.symbols[idx].is_terminal() {
                            return Err(GrammarError::InconsistentSymbol {
                                name: name.to_string(),
                            });
                        }
                        rhs.push(idx);
                    }
                    None => rhs.push(self.add_non_terminal(name)),
                }
            } else if c == '>' {
                return Err(GrammarError::MalformedRule {
                    line,
                    reason: "unmatched \">\"".to_string(),
                });
            } else if c.is_alphabetic() || c == '_' {
                let mut end = i + c.len_utf8();
                while let Some(&(j, d)) = iter.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '-' {
                        end = j + d.len_utf8();
                        iter.next();
                    } else {
                        break;
                    }
                }
                let token = &alternative[i..end];
                if token == EPSILON {
                    saw_epsilon = true;
                    continue;
                }
                if lhs_names.contains(token) {
                    return Err(GrammarError::InconsistentSymbol {
                        name: token.to_string(),
                    });
                }
                match self.get_symbol_index(token) {
                    Some(idx) => {
                        if !self.symbols[idx].is_terminal() {
                            return Err(GrammarError::InconsistentSymbol {
                                name: token.to_string(),
                            });
                        }
                        rhs.push(idx);
                    }
                    None => rhs.push(self.add_terminal(token.to_string())),
                }
            }
            // Anything else is a separator.
        }
        Ok((rhs, saw_epsilon))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::GrammarError;
    use crate::grammar::Grammar;

    #[test]
    fn simple_parse() {
        let g = Grammar::parse("<S> ::= a").unwrap();

        let s = g.get_symbol_index("S").unwrap();
        let a = g.get_symbol_index("a").unwrap();
        assert_eq!(g.get_symbol_name(s), "S");
        assert_eq!(g.get_symbol_name(a), "a");
        assert!(g.symbols[a].is_terminal());
        assert_eq!(g.productions[0].lhs, s);
        assert_eq!(g.productions[0].rhs, vec![a]);
        assert_eq!(g.start_symbol, Some(s));
    }

    #[test]
    fn alternatives_and_separators() {
        let g = Grammar::parse("<S> ::= a , b ; | <T>\n<T> ::= t").unwrap();

        let a = g.get_symbol_index("a").unwrap();
        let b = g.get_symbol_index("b").unwrap();
        let t_nt = g.get_symbol_index("T").unwrap();
        assert_eq!(g.productions[0].rhs, vec![a, b]);
        assert_eq!(g.productions[1].rhs, vec![t_nt]);
        assert_eq!(g.productions.len(), 3);
    }

    #[test]
    fn repeated_left_sides_accumulate() {
        let g = Grammar::parse("<S> ::= a\n<S> ::= b").unwrap();
        let s = g.get_symbol_index("S").unwrap();
        assert_eq!(g.productions.len(), 2);
        assert_eq!(g.productions[0].lhs, s);
        assert_eq!(g.productions[1].lhs, s);
    }

    #[test]
    fn explicit_epsilon_becomes_empty_production() {
        let g = Grammar::parse("<S> ::= a | ε").unwrap();
        assert_eq!(g.productions.len(), 2);
        assert!(g.productions[1].rhs.is_empty());
    }

    #[test]
    fn blank_alternative_is_dropped() {
        let g = Grammar::parse("<S> ::= a | | b").unwrap();
        assert_eq!(g.productions.len(), 2);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let g = Grammar::parse("# grammar\n\n<S> ::= a\n").unwrap();
        assert_eq!(g.productions.len(), 1);
    }

    #[test]
    fn empty_input_parses_to_empty_grammar() {
        let g = Grammar::parse("  \n  ").unwrap();
        assert!(g.productions.is_empty());
        assert_eq!(g.start_symbol, None);
    }

    #[test]
    fn start_symbol_is_first_left_side() {
        let g = Grammar::parse("<A> ::= <B>\n<B> ::= b").unwrap();
        assert_eq!(g.start_symbol, g.get_symbol_index("A"));
    }

    #[test]
    fn forward_reference_is_one_symbol() {
        let g = Grammar::parse("<S> ::= <T> <T>\n<T> ::= t").unwrap();
        let t = g.get_symbol_index("T").unwrap();
        assert_eq!(g.productions[0].rhs, vec![t, t]);
    }

    #[test]
    fn missing_assignment_is_rejected() {
        let err = Grammar::parse("<S> a b").unwrap_err();
        assert!(matches!(err, GrammarError::MalformedRule { line: 1, .. }));
    }

    #[test]
    fn doubled_assignment_is_rejected() {
        let err = Grammar::parse("<S> ::= a ::= b").unwrap_err();
        assert!(matches!(err, GrammarError::MalformedRule { line: 1, .. }));
    }

    #[test]
    fn bare_left_side_is_rejected() {
        let err = Grammar::parse("S ::= a").unwrap_err();
        assert!(matches!(err, GrammarError::MalformedRule { .. }));
    }

    #[test]
    fn unterminated_angle_bracket_is_rejected() {
        let err = Grammar::parse("<S> ::= <a").unwrap_err();
        assert!(matches!(err, GrammarError::MalformedRule { .. }));
    }

    #[test]
    fn stray_closing_angle_bracket_is_rejected() {
        let err = Grammar::parse("<S> ::= a> b").unwrap_err();
        assert!(matches!(err, GrammarError::MalformedRule { .. }));
    }

    #[test]
    fn name_as_both_terminal_and_left_side_is_rejected() {
        let err = Grammar::parse("<S> ::= a\n<a> ::= b").unwrap_err();
        assert!(matches!(err, GrammarError::InconsistentSymbol { name } if name == "a"));
    }

    #[test]
    fn name_as_both_bracketed_and_bare_is_rejected() {
        let err = Grammar::parse("<S> ::= <x> x").unwrap_err();
        assert!(matches!(err, GrammarError::InconsistentSymbol { name } if name == "x"));
    }
}
