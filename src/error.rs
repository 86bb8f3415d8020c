use thiserror::Error;

/// Errors surfaced by the grammar pipeline.
///
/// Grammar ambiguity is deliberately absent here: shift-reduce and
/// reduce-reduce conflicts are reported through the parsing table's conflict
/// lists and never abort construction.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("line {line}: {reason}")]
    MalformedRule { line: usize, reason: String },

    #[error("syntax error in rule <{rule}>: {reason}")]
    RuleSyntax { rule: String, reason: String },

    #[error("symbol \"{name}\" is used both as a terminal and as a nonterminal")]
    InconsistentSymbol { name: String },

    #[error("grammar has no start symbol")]
    NoStartSymbol,

    #[error("LR(1) state limit of {limit} exceeded")]
    StateLimitExceeded { limit: usize },

    #[error("cannot read grammar from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
