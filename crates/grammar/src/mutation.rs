//! Mutation engine - atomic structural grammar edits.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::{Expr, Grammar, RepeatKind, Rule};
use crate::error::MutationError;
use crate::parser::parse_expr;

/// Operation tags accepted on the wire (including aliases).
pub const ALLOWED_OPS: &[&str] = &[
    "rename_terminal",
    "rename",
    "remove_separators",
    "restrict_terminal",
    "replace_rule",
];

/// Regex terminal substituted for an explicit phrase delimiter.
pub const WHITESPACE_JOIN: &str = r"[ \t]+";

/// A single grammar edit.
///
/// The set of operations is closed: anything else fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Replace every literal terminal `from` with `to`.
    #[serde(alias = "rename")]
    RenameTerminal {
        /// Literal to replace
        #[serde(alias = "old")]
        from: String,
        /// Replacement literal
        #[serde(alias = "new")]
        to: String,
    },

    /// Replace the delimiter of the message-composition rule with whitespace.
    RemoveSeparators,

    /// Bind a terminal rule to a regex, creating the rule if absent.
    RestrictTerminal {
        /// Terminal rule name
        name: String,
        /// New regex pattern (surrounding slashes optional)
        pattern: String,
    },

    /// Replace a rule's whole right-hand side.
    ReplaceRule {
        /// Target rule name
        #[serde(alias = "rule", alias = "lhs")]
        name: String,
        /// New body in grammar syntax
        #[serde(alias = "body", alias = "rhs", alias = "value")]
        definition: String,
    },
}

impl Mutation {
    /// Canonical operation tag.
    pub fn op(&self) -> &'static str {
        match self {
            Mutation::RenameTerminal { .. } => "rename_terminal",
            Mutation::RemoveSeparators => "remove_separators",
            Mutation::RestrictTerminal { .. } => "restrict_terminal",
            Mutation::ReplaceRule { .. } => "replace_rule",
        }
    }

    /// Apply the edit, reporting edits that cannot be carried out.
    ///
    /// Renames of absent literals and separator removal on a grammar with no
    /// delimited composition rule are no-ops, not errors.
    pub fn try_apply(&self, grammar: &Grammar) -> Result<Grammar, MutationError> {
        match self {
            Mutation::RenameTerminal { from, to } => {
                if !grammar.rules().iter().any(|r| r.body.contains_literal(from)) {
                    debug!("rename_terminal: '{}' not present, grammar unchanged", from);
                    return Ok(grammar.clone());
                }
                Ok(grammar.map_bodies(|r| r.body.rename_literal(from, to)))
            }
            Mutation::RemoveSeparators => {
                for rule in grammar.rules() {
                    if let Some(body) = join_with_whitespace(&rule.body) {
                        debug!("remove_separators: rewriting rule '{}'", rule.name);
                        return Ok(grammar
                            .with_rule_body(&rule.name, body)
                            .unwrap_or_else(|| grammar.clone()));
                    }
                }
                debug!("remove_separators: no delimited composition rule, grammar unchanged");
                Ok(grammar.clone())
            }
            Mutation::RestrictTerminal { name, pattern } => {
                let body = Expr::regex(strip_slashes(pattern));
                Ok(match grammar.with_rule_body(name, body.clone()) {
                    Some(next) => next,
                    None => grammar.with_rule(Rule::new(name.clone(), body)),
                })
            }
            Mutation::ReplaceRule { name, definition } => {
                let body = parse_expr(definition).map_err(|source| MutationError::InvalidDefinition {
                    op: self.op(),
                    name: name.clone(),
                    source,
                })?;
                grammar
                    .with_rule_body(name, body)
                    .ok_or_else(|| MutationError::UnknownRule {
                        op: self.op(),
                        name: name.clone(),
                    })
            }
        }
    }

    /// Best-effort edit: total, returns the input unchanged when the edit
    /// cannot be carried out.
    pub fn apply(&self, grammar: &Grammar) -> Grammar {
        self.try_apply(grammar).unwrap_or_else(|e| {
            warn!("mutation skipped: {}", e);
            grammar.clone()
        })
    }
}

/// Fold mutations left to right, checking well-formedness after each edit.
///
/// Any failed edit rejects the whole sequence; the input grammar is never
/// modified.
pub fn apply_all(grammar: &Grammar, mutations: &[Mutation]) -> Result<Grammar, MutationError> {
    let mut current = grammar.clone();
    for mutation in mutations {
        let next = mutation.try_apply(&current)?;
        let issues = next.issues();
        if !issues.is_empty() {
            return Err(MutationError::Malformed {
                op: mutation.op(),
                issues,
            });
        }
        current = next;
    }
    Ok(current)
}

/// Match `x (SEP x)*` with a literal `SEP` and swap the delimiter for whitespace.
fn join_with_whitespace(body: &Expr) -> Option<Expr> {
    let Expr::Seq(items) = body else {
        return None;
    };
    let [head, Expr::Repeat { inner, kind: RepeatKind::ZeroOrMore }] = items.as_slice() else {
        return None;
    };
    let Expr::Seq(tail) = inner.as_ref() else {
        return None;
    };
    let [Expr::Literal(_), repeated] = tail.as_slice() else {
        return None;
    };
    if repeated != head {
        return None;
    }
    Some(Expr::Seq(vec![
        head.clone(),
        Expr::Repeat {
            inner: Box::new(Expr::Seq(vec![Expr::regex(WHITESPACE_JOIN), repeated.clone()])),
            kind: RepeatKind::ZeroOrMore,
        },
    ]))
}

fn strip_slashes(pattern: &str) -> &str {
    let trimmed = pattern.trim();
    trimmed
        .strip_prefix('/')
        .and_then(|p| p.strip_suffix('/'))
        .filter(|p| !p.is_empty())
        .unwrap_or(trimmed)
}
