//! Grammar layer - the message language and its edits.
//!
//! A grammar is an ordered list of Lark-style production rules with one
//! designated `start` rule. Grammars are immutable values: every edit made by
//! a [`Mutation`] produces a new [`Grammar`].

#![warn(missing_docs)]

mod ast;
mod error;
mod mutation;
mod parser;
mod validate;

pub use ast::{Expr, Grammar, GrammarComplexity, RepeatKind, Rule, BASE_GRAMMAR, START_RULE};
pub use error::{GrammarError, MutationError};
pub use mutation::{apply_all, Mutation, ALLOWED_OPS, WHITESPACE_JOIN};
pub use parser::parse_expr;
pub use validate::GrammarIssue;
