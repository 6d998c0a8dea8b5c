//! Grammar errors.

use crate::validate::GrammarIssue;

/// Errors raised while reading grammar text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GrammarError {
    /// The text is not valid grammar syntax.
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        /// 1-based line number (0 for a standalone expression)
        line: usize,
        /// What went wrong
        message: String,
    },

    /// The grammar parsed but is not well-formed.
    #[error("grammar is not well-formed: {}", format_issues(.0))]
    Invalid(Vec<GrammarIssue>),
}

/// Errors raised while applying a [`crate::Mutation`] strictly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    /// The mutation targets a rule that does not exist.
    #[error("{op}: no rule named '{name}'")]
    UnknownRule {
        /// Operation tag
        op: &'static str,
        /// Missing rule name
        name: String,
    },

    /// A replacement rule body could not be parsed.
    #[error("{op}: invalid definition for '{name}': {source}")]
    InvalidDefinition {
        /// Operation tag
        op: &'static str,
        /// Target rule name
        name: String,
        /// Parse failure
        source: GrammarError,
    },

    /// The edited grammar failed the well-formedness check.
    #[error("{op} left the grammar malformed: {}", format_issues(.issues))]
    Malformed {
        /// Operation tag
        op: &'static str,
        /// Issues found after the edit
        issues: Vec<GrammarIssue>,
    },
}

fn format_issues(issues: &[GrammarIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
