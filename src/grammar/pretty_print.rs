use std::collections::BTreeMap;

use crowbook_text_processing::escape;
use serde::Serialize;

use crate::grammar::lr_automaton::{LrAutomaton, LrItem};
use crate::grammar::parse_table::{Action, Conflict, LrParsingTable};
use crate::grammar::{Grammar, EPSILON};

#[derive(Debug, Clone, Serialize)]
pub struct ProductionOutput<'a> {
    pub left: &'a str,
    pub rights: Vec<Vec<&'a str>>,
}

impl ProductionOutput<'_> {
    pub fn to_plaintext(&self, left_width: usize, multiline: bool) -> String {
        self.rights
            .iter()
            .map(|right| right.join(" "))
            .enumerate()
            .map(|(i, right)| {
                if i == 0 {
                    format!("{:>width$} ::= {}", self.left, right, width = left_width)
                } else if multiline {
                    format!("{:>width$}   | {}", "", right, width = left_width)
                } else {
                    format!(" | {}", right)
                }
            })
            .collect::<Vec<_>>()
            .join(if multiline { "\n" } else { "" })
    }

    pub fn to_latex(&self, and_sign: bool) -> String {
        if self.rights.is_empty() {
            return String::new();
        }

        let left = if and_sign {
            format!("{} & \\rightarrow &", escape::tex(self.left))
        } else {
            format!("{} \\rightarrow ", escape::tex(self.left))
        };
        let right = self
            .rights
            .iter()
            .map(|right| {
                right
                    .iter()
                    .map(|s| escape::tex(*s))
                    .collect::<Vec<_>>()
                    .join(" \\ ")
            })
            .collect::<Vec<_>>()
            .join(" \\mid ");

        (left + &right).replace(EPSILON, "\\epsilon")
    }
}

#[derive(Serialize)]
pub struct ProductionOutputVec<'a> {
    productions: Vec<ProductionOutput<'a>>,
}

impl ProductionOutputVec<'_> {
    pub fn to_plaintext(&self) -> String {
        let left_max_len = self
            .productions
            .iter()
            .map(|p| p.left.len())
            .max()
            .unwrap_or(0);
        self.productions
            .iter()
            .map(|s| s.to_plaintext(left_max_len, true))
            .collect::<Vec<String>>()
            .join("\n")
    }

    pub fn to_latex(&self) -> String {
        std::iter::once("\\[\\begin{array}{cll}".to_string())
            .chain(self.productions.iter().map(|s| s.to_latex(true)))
            .chain(std::iter::once("\\end{array}\\]".to_string()))
            .collect::<Vec<String>>()
            .join("\\\\\n")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}

impl Grammar {
    pub fn to_production_output_vec(&self) -> ProductionOutputVec {
        let mut productions = Vec::new();
        for symbol in &self.symbols {
            if let Some(non_terminal) = symbol.non_terminal() {
                let rights: Vec<Vec<&str>> = non_terminal
                    .productions
                    .iter()
                    .map(|&p| {
                        let rhs = &self.productions[p].rhs;
                        if rhs.is_empty() {
                            vec![EPSILON]
                        } else {
                            rhs.iter().map(|&s| self.get_symbol_name(s)).collect()
                        }
                    })
                    .collect();
                productions.push(ProductionOutput {
                    left: non_terminal.name.as_str(),
                    rights,
                });
            }
        }
        ProductionOutputVec { productions }
    }
}

#[derive(Serialize)]
struct NonTerminalOutput<'a> {
    name: &'a str,
    nullable: bool,
    first: Vec<&'a str>,
    follow: Vec<&'a str>,
}

impl NonTerminalOutput<'_> {
    fn to_plaintext(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.name,
            self.nullable,
            self.first.join(", "),
            self.follow.join(", ")
        )
    }

    fn to_latex(&self) -> String {
        fn f(a: &Vec<&str>) -> String {
            a.iter()
                .map(|s| escape::tex(*s))
                .collect::<Vec<_>>()
                .join(r"\ ")
                .replace(EPSILON, r"$\epsilon$")
        }

        format!(
            "{} & {} & {} & {}",
            escape::tex(self.name),
            self.nullable,
            f(&self.first),
            f(&self.follow)
        )
    }
}

#[derive(Serialize)]
pub struct NonTerminalOutputVec<'a> {
    data: Vec<NonTerminalOutput<'a>>,
}

impl NonTerminalOutputVec<'_> {
    pub fn to_plaintext(&self) -> String {
        self.data
            .iter()
            .map(|s| s.to_plaintext())
            .collect::<Vec<String>>()
            .join("\n")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    pub fn to_latex(&self) -> String {
        let content = self
            .data
            .iter()
            .map(|e| e.to_latex())
            .collect::<Vec<_>>()
            .join("\\\\\n ");

        "\\begin{tabular}{c|c|c|c}\n".to_string()
            + "Symbol & Nullable & First & Follow\\\\\\hline\n"
            + &content
            + "\\\\\n\\end{tabular}"
    }
}

impl Grammar {
    pub fn to_non_terminal_output_vec(&self) -> NonTerminalOutputVec {
        let mut data = Vec::new();
        for symbol in &self.symbols {
            if let Some(non_terminal) = symbol.non_terminal() {
                let mut t = NonTerminalOutput {
                    name: non_terminal.name.as_str(),
                    nullable: non_terminal.nullable,
                    first: non_terminal
                        .first
                        .iter()
                        .map(|&idx| self.get_symbol_name(idx))
                        .collect(),
                    follow: non_terminal
                        .follow
                        .iter()
                        .map(|&idx| self.get_symbol_name(idx))
                        .collect(),
                };
                t.first.sort_unstable();
                t.follow.sort_unstable();

                if non_terminal.nullable {
                    t.first.push(EPSILON);
                }
                data.push(t);
            }
        }
        NonTerminalOutputVec { data }
    }
}

#[derive(Serialize)]
pub struct LrStateOutput {
    pub items: Vec<String>,
    pub edges: BTreeMap<String, usize>,
}

#[derive(Serialize)]
pub struct LrAutomatonOutput {
    pub states: Vec<LrStateOutput>,
    pub start: usize,
}

impl LrAutomaton {
    /// Renders one item as `A ::= a . <rest>, la/la`.
    pub fn item_text(&self, item: &LrItem) -> String {
        let g = &self.grammar;
        let p = &g.productions[item.production];
        let mut output = String::new();
        output.push_str(g.get_symbol_name(p.lhs));
        output.push_str(" ::= ");
        for (i, &s) in p.rhs.iter().enumerate() {
            if i != 0 {
                output.push(' ');
            }
            if i == item.dot {
                output.push_str(". ");
            }
            output.push_str(g.get_symbol_name(s));
        }
        if item.dot == p.rhs.len() {
            if !p.rhs.is_empty() {
                output.push(' ');
            }
            output.push('.');
        }
        output.push_str(", ");
        output.push_str(
            &item
                .lookahead
                .iter()
                .map(|&t| g.get_symbol_name(t))
                .collect::<Vec<_>>()
                .join("/"),
        );
        output
    }

    pub fn to_output(&self) -> LrAutomatonOutput {
        LrAutomatonOutput {
            states: self
                .states
                .iter()
                .map(|state| LrStateOutput {
                    items: state.items.iter().map(|i| self.item_text(i)).collect(),
                    edges: state
                        .edges
                        .iter()
                        .map(|(&s, &t)| (self.grammar.get_symbol_name(s).to_string(), t))
                        .collect(),
                })
                .collect(),
            start: 0,
        }
    }
}

impl LrAutomatonOutput {
    pub fn to_plaintext(&self) -> String {
        let states = self
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let edges = if s.edges.is_empty() {
                    String::new()
                } else {
                    format!(
                        "\n===\n{}",
                        s.edges
                            .iter()
                            .map(|(k, v)| format!("- {} -> {}", k, v))
                            .collect::<Vec<_>>()
                            .join("\n")
                    )
                };
                format!("I{}\n{}{}", i, s.items.join("\n"), edges)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!("{}\n\nstart: {}", states, self.start)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    fn node_to_latex(&self, id: usize) -> String {
        let content = self.states[id]
            .items
            .iter()
            .map(|e| {
                format!("${}$", escape::tex(e.as_str()))
                    .replace(EPSILON, "\\epsilon")
                    .replace("::=", "\\rightarrow")
            })
            .collect::<Vec<_>>()
            .join(" \\\\ \n");
        format!(
            "\\node [block] (I_{}){}\n{{\n$I_{}$\\\\\n{}\n}};",
            id,
            if id > 0 {
                if id % 2 == 0 {
                    format!(" [below of = I_{}] ", id - 2)
                } else {
                    format!(" [right of = I_{}] ", id - 1)
                }
            } else {
                String::new()
            },
            id,
            content
        )
    }

    fn edge_to_latex(&self, id: usize) -> String {
        self.states[id]
            .edges
            .iter()
            .map(|(e, v)| {
                format!(
                    "\\path [->] (I_{}) edge {} node [above]{{{}}} (I_{});",
                    id,
                    if id == *v { "[loop left]" } else { "[right]" },
                    escape::tex(e.as_str()),
                    v
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_latex(&self) -> String {
        format!(
            "\\begin{{tikzpicture}}[node distance=5cm,block/.style={{state, rectangle, text width=6em}}]\n{}\n\\end{{tikzpicture}}",
            (0..self.states.len())
                .map(|i| self.node_to_latex(i))
                .chain((0..self.states.len()).map(|i| self.edge_to_latex(i)))
                .collect::<Vec<_>>()
                .join("\n")
        )
    }
}

impl Action {
    fn to_latex(&self, productions: &[String]) -> String {
        match self {
            Action::Reduce(r) => {
                let text = &productions[*r];
                match text.split_once(" ::= ") {
                    Some((left, right)) => format!(
                        "reduce ${} \\rightarrow {}$",
                        escape::tex(left),
                        escape::tex(right).replace(EPSILON, "\\epsilon")
                    ),
                    None => format!("reduce {}", escape::tex(text.as_str())),
                }
            }
            Action::Shift(s) => format!("shift {}", s),
            Action::Accept => "accept".to_string(),
        }
    }
}

impl LrParsingTable {
    /// The table as an aligned grid. Action cells use the `s<state>` /
    /// `r<production>` / `acc` encoding; goto cells are bare state numbers.
    pub fn to_plaintext(&self) -> String {
        let mut output: Vec<Vec<String>> = Vec::new();

        let mut header = vec![String::new()];
        header.extend(self.terminals.iter().cloned());
        header.extend(self.non_terminals.iter().cloned());
        output.push(header);

        for (i, (actions, gotos)) in self.action.iter().zip(self.goto.iter()).enumerate() {
            let row: Vec<String> = std::iter::once(i.to_string())
                .chain(
                    actions
                        .iter()
                        .map(|a| a.map(|a| a.encode()).unwrap_or_default()),
                )
                .chain(
                    gotos
                        .iter()
                        .map(|g| g.map(|g| g.to_string()).unwrap_or_default()),
                )
                .collect();
            output.push(row);
        }

        let width: Vec<usize> = (0..output[0].len())
            .map(|j| output.iter().map(|row| row[j].len()).max().unwrap_or(0))
            .collect();

        output
            .iter()
            .map(|line| {
                line.iter()
                    .enumerate()
                    .map(|(i, s)| format!("{:>width$}", s, width = width[i]))
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One header row plus one row per state, comma-separated, empty cells
    /// left empty.
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::new();
        let mut header = vec!["State".to_string()];
        header.extend(self.terminals.iter().cloned());
        header.extend(self.non_terminals.iter().cloned());
        lines.push(header.join(","));

        for (i, (actions, gotos)) in self.action.iter().zip(self.goto.iter()).enumerate() {
            let row: Vec<String> = std::iter::once(i.to_string())
                .chain(
                    actions
                        .iter()
                        .map(|a| a.map(|a| a.encode()).unwrap_or_default()),
                )
                .chain(
                    gotos
                        .iter()
                        .map(|g| g.map(|g| g.to_string()).unwrap_or_default()),
                )
                .collect();
            lines.push(row.join(","));
        }
        lines.join("\n")
    }

    pub fn to_latex(&self) -> String {
        let header: String = format!(
            "\\begin{{tabular}}{{c{}}}\n & \\multicolumn{{{}}}{{c}}{{action}} & \\multicolumn{{{}}}{{|c}}{{goto}}\\\\",
            "|l".repeat(self.terminals.len() + self.non_terminals.len()),
            self.terminals.len(),
            self.non_terminals.len(),
        );

        let mut first_row: Vec<String> = vec![String::new()];
        for s in self.terminals.iter().chain(self.non_terminals.iter()) {
            first_row.push(escape::tex(s.as_str()).to_string());
        }
        let first_row = first_row.join(" & ");

        let content = self
            .action
            .iter()
            .zip(self.goto.iter())
            .enumerate()
            .map(|(i, (actions, gotos))| {
                std::iter::once(i.to_string())
                    .chain(actions.iter().map(|a| {
                        a.map(|a| a.to_latex(&self.productions)).unwrap_or_default()
                    }))
                    .chain(
                        gotos
                            .iter()
                            .map(|g| g.map(|g| g.to_string()).unwrap_or_default()),
                    )
                    .collect::<Vec<_>>()
                    .join(" & ")
            })
            .collect::<Vec<_>>()
            .join(" \\\\\n");

        format!(
            "{}\n{} \\\\\\hline\n{}\n\\end{{tabular}}",
            header, first_row, content
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    /// The conflict report: both ordered lists, the total, and a reminder
    /// of the shift-preference policy when anything was recorded.
    pub fn conflicts_to_plaintext(&self) -> String {
        fn section(title: &str, conflicts: &[Conflict]) -> String {
            if conflicts.is_empty() {
                return format!("No {} conflicts detected.", title);
            }
            let mut lines = vec![
                format!("{} Conflicts:", title),
                format!(
                    "{:<6}{:<12}{:<16}{:<16}",
                    "State", "Symbol", "Existing", "Attempted"
                ),
                "-".repeat(50),
            ];
            for c in conflicts {
                lines.push(format!(
                    "{:<6}{:<12}{:<16}{:<16}",
                    c.state,
                    c.symbol,
                    c.existing.encode(),
                    c.attempted.encode()
                ));
            }
            lines.join("\n")
        }

        let mut out = vec![
            section("Shift-Reduce", &self.shift_reduce_conflicts),
            section("Reduce-Reduce", &self.reduce_reduce_conflicts),
            format!("Total conflicts: {}", self.conflict_count()),
        ];
        if self.conflict_count() > 0 {
            out.push("Note: shift actions take precedence over reduce actions.".to_string());
        }
        out.join("\n\n")
    }

    pub fn conflicts_to_latex(&self) -> String {
        let rows = self
            .shift_reduce_conflicts
            .iter()
            .map(|c| ("shift-reduce", c))
            .chain(
                self.reduce_reduce_conflicts
                    .iter()
                    .map(|c| ("reduce-reduce", c)),
            )
            .map(|(kind, c)| {
                format!(
                    "{} & {} & {} & {} & {}",
                    kind,
                    c.state,
                    escape::tex(c.symbol.as_str()),
                    c.existing.encode(),
                    c.attempted.encode()
                )
            })
            .collect::<Vec<_>>()
            .join("\\\\\n");

        "\\begin{tabular}{c|c|c|c|c}\n".to_string()
            + "Kind & State & Symbol & Existing & Attempted\\\\\\hline\n"
            + &rows
            + "\\\\\n\\end{tabular}"
    }

    pub fn conflicts_to_json(&self) -> String {
        #[derive(Serialize)]
        struct ConflictReport<'a> {
            shift_reduce: &'a [Conflict],
            reduce_reduce: &'a [Conflict],
        }
        serde_json::to_string(&ConflictReport {
            shift_reduce: &self.shift_reduce_conflicts,
            reduce_reduce: &self.reduce_reduce_conflicts,
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::grammar::Grammar;

    fn analyzed(source: &str) -> Grammar {
        let mut g = Grammar::parse(source).unwrap().augmented().unwrap();
        g.calculate_nullable_first_follow();
        g
    }

    #[test]
    fn production_output_groups_by_nonterminal() {
        let g = Grammar::parse("<S> ::= a <S> | ε").unwrap();
        let text = g.to_production_output_vec().to_plaintext();
        assert_eq!(text, "S ::= a S\n    | ε");
    }

    #[test]
    fn nonterminal_output_appends_epsilon_for_nullable() {
        let g = analyzed("<S> ::= <A>\n<A> ::= a <A> | ε");
        let text = g.to_non_terminal_output_vec().to_plaintext();
        let row = text
            .lines()
            .find(|l| l.starts_with("A |"))
            .expect("row for A");
        assert_eq!(row, "A | true | a, ε | $");
    }

    #[test]
    fn automaton_plaintext_shows_items_and_edges() {
        let automaton = Grammar::parse("<S> ::= <A>\n<A> ::= a <A> | ε")
            .unwrap()
            .to_lr_automaton()
            .unwrap();
        let text = automaton.to_output().to_plaintext();

        assert!(text.starts_with("I0\n"));
        assert!(text.contains("S' ::= . S, $"));
        assert!(text.contains("A ::= ., $"));
        assert!(text.contains("- a -> "));
        assert!(text.ends_with("start: 0"));
    }

    #[test]
    fn table_plaintext_uses_cell_vocabulary() {
        let table = Grammar::parse("<S> ::= <A>\n<A> ::= a <A> | ε")
            .unwrap()
            .to_lr_automaton()
            .unwrap()
            .to_parsing_table();
        let text = table.to_plaintext();

        assert!(text.contains("acc"));
        assert!(text.contains("r3"));
        assert!(text.contains("s3"));
        // One header line plus one line per state.
        assert_eq!(text.lines().count(), table.action.len() + 1);
    }

    #[test]
    fn table_csv_has_header_and_state_rows() {
        let table = Grammar::parse("<S> ::= <A>\n<A> ::= a <A> | ε")
            .unwrap()
            .to_lr_automaton()
            .unwrap()
            .to_parsing_table();
        let csv = table.to_csv();
        let mut lines = csv.lines();

        assert_eq!(lines.next(), Some("State,a,$,S,A,S'"));
        assert_eq!(csv.lines().count(), table.action.len() + 1);
        assert!(csv.lines().nth(1).unwrap().starts_with("0,"));
    }

    #[test]
    fn conflict_report_counts_conflicts() {
        let table = Grammar::parse(
            "<stmt> ::= IF LPAREN expr RPAREN <stmt> <stmt_OPT>\n\
             <stmt> ::= other\n\
             <stmt_OPT> ::= OTHERWISE <stmt> | ε",
        )
        .unwrap()
        .to_lr_automaton()
        .unwrap()
        .to_parsing_table();

        let report = table.conflicts_to_plaintext();
        assert!(report.contains("Shift-Reduce Conflicts:"));
        assert!(report.contains("OTHERWISE"));
        assert!(report.contains("Total conflicts: 1"));
        assert!(report.contains("No Reduce-Reduce conflicts detected."));
    }

    #[test]
    fn clean_table_reports_no_conflicts() {
        let table = Grammar::parse("<S> ::= a")
            .unwrap()
            .to_lr_automaton()
            .unwrap()
            .to_parsing_table();
        let report = table.conflicts_to_plaintext();
        assert!(report.contains("No Shift-Reduce conflicts detected."));
        assert!(report.contains("Total conflicts: 0"));
    }
}
