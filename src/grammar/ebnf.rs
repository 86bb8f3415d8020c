//! Rewrites extended grammar notation (grouping, `*`, `+`, `?`) into pure
//! BNF rule text, synthesizing auxiliary nonterminals as needed.
//!
//! The rewrite order is canonical: the leftmost innermost parenthesized
//! group is eliminated first (its trailing modifier handled together with
//! the group), then the leftmost bare token carrying a modifier. Every
//! rewrite is followed by a rescan, so shorthand exposed by an earlier
//! rewrite is picked up until the alternative contains none of `( ) * + ?`.

use std::collections::VecDeque;

use log::debug;

use crate::error::GrammarError;
use crate::grammar::name_alloc::NameAllocator;
use crate::grammar::EPSILON;

/// Expands all shorthand in `source` and returns pure-BNF rule text, one
/// `<Name> ::= alt | alt | ...` line per rule. Auxiliary rules follow the
/// rule that introduced them. Comments and blank lines are dropped.
pub fn normalize(source: &str) -> Result<String, GrammarError> {
    let rules = split_rules(source)?;

    let mut alloc = NameAllocator::new();
    for (name, body) in &rules {
        alloc.reserve(name);
        reserve_body_names(&mut alloc, body);
    }

    let mut out: Vec<(String, Vec<String>)> = Vec::new();
    for (name, body) in rules {
        let alternatives = split_alternatives(&name, &body)?;
        let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
        queue.push_back((name, alternatives));

        while let Some((lhs, alternatives)) = queue.pop_front() {
            let mut done = Vec::new();
            let mut aux = Vec::new();
            for alternative in alternatives {
                let mut current = alternative;
                while let Some(next) = rewrite_step(&lhs, &current, &mut alloc, &mut aux)? {
                    current = next;
                }
                done.push(collapse_spaces(&current));
            }
            for rule in aux {
                queue.push_back(rule);
            }
            out.push((lhs, done));
        }
    }

    debug!("normalized grammar into {} pure-BNF rules", out.len());

    let mut text = String::new();
    for (lhs, alternatives) in &out {
        text.push('<');
        text.push_str(lhs);
        text.push_str("> ::= ");
        text.push_str(&alternatives.join(" | "));
        text.push('\n');
    }
    Ok(text)
}

/// Splits the source into `(name, body)` rules. A line without `::=`
/// continues the previous rule's body.
fn split_rules(source: &str) -> Result<Vec<(String, String)>, GrammarError> {
    let mut rules: Vec<(String, String)> = Vec::new();
    for (i, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.matches("::=").count() {
            0 => {
                if let Some(last) = rules.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(line);
                } else {
                    return Err(GrammarError::MalformedRule {
                        line: i + 1,
                        reason: "missing \"::=\"".to_string(),
                    });
                }
            }
            1 => {
                let (lhs, body) = match line.split_once("::=") {
                    Some(parts) => parts,
                    None => unreachable!(),
                };
                let name = rule_name(lhs.trim()).ok_or_else(|| GrammarError::MalformedRule {
                    line: i + 1,
                    reason: "left side must be a single <Name>".to_string(),
                })?;
                rules.push((name, body.trim().to_string()));
            }
            _ => {
                return Err(GrammarError::MalformedRule {
                    line: i + 1,
                    reason: "more than one \"::=\"".to_string(),
                });
            }
        }
    }
    Ok(rules)
}

fn rule_name(lhs: &str) -> Option<String> {
    let inner = lhs.strip_prefix('<')?.strip_suffix('>')?.trim();
    if inner.is_empty() || inner.contains(['<', '>']) || inner.split_whitespace().count() != 1 {
        return None;
    }
    Some(inner.to_string())
}

fn reserve_body_names(alloc: &mut NameAllocator, body: &str) {
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '<' {
            if let Some(end) = body[i + 1..].find('>') {
                alloc.reserve(body[i + 1..i + 1 + end].trim());
                while let Some(&(j, _)) = chars.peek() {
                    if j > i + end {
                        break;
                    }
                    chars.next();
                }
            }
        } else if c.is_alphabetic() || c == '_' {
            let mut end = i + c.len_utf8();
            while let Some(&(j, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' || d == '-' {
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            alloc.reserve(&body[i..end]);
        }
    }
}

/// Splits a rule body on `|` at parenthesis depth zero. Empty alternatives
/// are dropped.
fn split_alternatives(rule: &str, body: &str) -> Result<Vec<String>, GrammarError> {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in body.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| unbalanced(rule))?;
                current.push(c);
            }
            '|' if depth == 0 => {
                alternatives.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(unbalanced(rule));
    }
    alternatives.push(current.trim().to_string());
    Ok(alternatives.into_iter().filter(|a| !a.is_empty()).collect())
}

fn unbalanced(rule: &str) -> GrammarError {
    GrammarError::RuleSyntax {
        rule: rule.to_string(),
        reason: "unbalanced parentheses".to_string(),
    }
}

/// Performs one rewrite on `alternative` if it still contains shorthand.
/// Returns the rewritten alternative, or `None` when it is pure BNF.
/// Synthesized rules are appended to `aux`.
fn rewrite_step(
    lhs: &str,
    alternative: &str,
    alloc: &mut NameAllocator,
    aux: &mut Vec<(String, Vec<String>)>,
) -> Result<Option<String>, GrammarError> {
    if let Some((open, close)) = find_innermost_group(lhs, alternative)? {
        let content = alternative[open + 1..close].trim();
        let pieces: Vec<String> = content
            .split('|')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if pieces.is_empty() {
            return Err(GrammarError::RuleSyntax {
                rule: lhs.to_string(),
                reason: "empty parenthesized group".to_string(),
            });
        }
        let modifier = alternative[close + 1..].chars().next().filter(|c| "*+?".contains(*c));
        let tail_start = close + 1 + modifier.map_or(0, char::len_utf8);
        let replacement = match modifier {
            Some('*') => expand_star(lhs, &pieces, alloc, aux),
            Some('+') => expand_plus(lhs, &pieces, alloc, aux),
            Some('?') => expand_opt(lhs, &pieces, alloc, aux),
            None if pieces.len() == 1 => pieces[0].clone(),
            None => {
                let group = alloc.fresh(&format!("{}_GROUP", lhs));
                aux.push((group.clone(), pieces));
                format!("<{}>", group)
            }
            Some(_) => unreachable!(),
        };
        return Ok(Some(format!(
            "{}{}{}",
            &alternative[..open],
            replacement,
            &alternative[tail_start..]
        )));
    }

    // No groups left; rewrite the leftmost bare token carrying a modifier.
    for (i, c) in alternative.char_indices() {
        if !"*+?".contains(c) {
            continue;
        }
        let start = alternative[..i]
            .rfind(char::is_whitespace)
            .map_or(0, |p| p + 1);
        let expr = &alternative[start..i];
        if expr.is_empty() {
            return Err(GrammarError::RuleSyntax {
                rule: lhs.to_string(),
                reason: format!("\"{}\" without an operand", c),
            });
        }
        let pieces = vec![expr.to_string()];
        let replacement = match c {
            '*' => expand_star(lhs, &pieces, alloc, aux),
            '+' => expand_plus(lhs, &pieces, alloc, aux),
            '?' => expand_opt(lhs, &pieces, alloc, aux),
            _ => unreachable!(),
        };
        return Ok(Some(format!(
            "{}{}{}",
            &alternative[..start],
            replacement,
            &alternative[i + c.len_utf8()..]
        )));
    }

    Ok(None)
}

/// Locates the leftmost innermost `( ... )` span, as byte offsets of both
/// parentheses. Errors on unbalanced input.
fn find_innermost_group(
    rule: &str,
    alternative: &str,
) -> Result<Option<(usize, usize)>, GrammarError> {
    let mut open: Vec<usize> = Vec::new();
    for (i, c) in alternative.char_indices() {
        match c {
            '(' => open.push(i),
            ')' => {
                return match open.pop() {
                    Some(o) => Ok(Some((o, i))),
                    None => Err(unbalanced(rule)),
                };
            }
            _ => {}
        }
    }
    if open.is_empty() {
        Ok(None)
    } else {
        Err(unbalanced(rule))
    }
}

/// `E* -> G ::= E G | ε`, one production per alternative of E.
fn expand_star(
    lhs: &str,
    pieces: &[String],
    alloc: &mut NameAllocator,
    aux: &mut Vec<(String, Vec<String>)>,
) -> String {
    let g = alloc.fresh(&format!("{}_KLEENE", lhs));
    let mut alts: Vec<String> = pieces.iter().map(|e| format!("{} <{}>", e, g)).collect();
    alts.push(EPSILON.to_string());
    aux.push((g.clone(), alts));
    format!("<{}>", g)
}

/// `E+ -> ONE ::= E MANY; MANY ::= E MANY | ε`.
fn expand_plus(
    lhs: &str,
    pieces: &[String],
    alloc: &mut NameAllocator,
    aux: &mut Vec<(String, Vec<String>)>,
) -> String {
    let one = alloc.fresh(&format!("{}_ONE", lhs));
    let many = alloc.fresh(&format!("{}_MANY", lhs));
    let one_alts: Vec<String> = pieces.iter().map(|e| format!("{} <{}>", e, many)).collect();
    let mut many_alts: Vec<String> = pieces.iter().map(|e| format!("{} <{}>", e, many)).collect();
    many_alts.push(EPSILON.to_string());
    aux.push((one.clone(), one_alts));
    aux.push((many, many_alts));
    format!("<{}>", one)
}

/// `E? -> G ::= E | ε`.
fn expand_opt(
    lhs: &str,
    pieces: &[String],
    alloc: &mut NameAllocator,
    aux: &mut Vec<(String, Vec<String>)>,
) -> String {
    let g = alloc.fresh(&format!("{}_OPT", lhs));
    let mut alts = pieces.to_vec();
    alts.push(EPSILON.to_string());
    aux.push((g.clone(), alts));
    format!("<{}>", g)
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
