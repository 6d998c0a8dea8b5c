//! Well-formedness checks.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Grammar, START_RULE};

/// A single well-formedness problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrammarIssue {
    /// No `start` rule.
    MissingStart,
    /// A rule name is defined more than once.
    DuplicateRule {
        /// Rule name
        name: String,
    },
    /// A rule references a name nothing defines.
    UnresolvedReference {
        /// Rule containing the reference
        rule: String,
        /// The unresolved name
        name: String,
    },
    /// A regex terminal does not compile.
    InvalidRegex {
        /// Rule containing the terminal
        rule: String,
        /// The pattern as written
        pattern: String,
        /// Compiler message
        message: String,
    },
    /// A rule name the text form cannot carry.
    InvalidRuleName {
        /// The name
        name: String,
    },
    /// A regex terminal spanning more than one line.
    MultilineRegex {
        /// Rule containing the terminal
        rule: String,
        /// The pattern
        pattern: String,
    },
    /// A sequence or alternation with no members.
    EmptyExpression {
        /// Rule containing it
        rule: String,
    },
}

impl fmt::Display for GrammarIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarIssue::MissingStart => write!(f, "no '{}' rule", START_RULE),
            GrammarIssue::DuplicateRule { name } => write!(f, "rule '{}' defined more than once", name),
            GrammarIssue::UnresolvedReference { rule, name } => {
                write!(f, "rule '{}' references undefined '{}'", rule, name)
            }
            GrammarIssue::InvalidRegex { rule, pattern, message } => {
                write!(f, "rule '{}' has invalid regex /{}/: {}", rule, pattern, message)
            }
            GrammarIssue::InvalidRuleName { name } => write!(f, "'{}' is not a valid rule name", name),
            GrammarIssue::MultilineRegex { rule, pattern } => {
                write!(f, "rule '{}' has a line break in regex {:?}", rule, pattern)
            }
            GrammarIssue::EmptyExpression { rule } => write!(f, "rule '{}' has an empty expression", rule),
        }
    }
}

pub(crate) fn check(grammar: &Grammar) -> Vec<GrammarIssue> {
    let mut issues = Vec::new();

    let mut defined: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    for rule in grammar.rules() {
        if !is_identifier(&rule.name) {
            issues.push(GrammarIssue::InvalidRuleName {
                name: rule.name.clone(),
            });
        }
        if !defined.insert(rule.name.as_str()) && reported.insert(rule.name.as_str()) {
            issues.push(GrammarIssue::DuplicateRule {
                name: rule.name.clone(),
            });
        }
    }
    if !defined.contains(START_RULE) {
        issues.push(GrammarIssue::MissingStart);
    }

    let imported = imported_names(grammar.directives());

    for rule in grammar.rules() {
        let mut missing: Vec<&str> = Vec::new();
        rule.body.for_each_ref(&mut |name| {
            if !defined.contains(name) && !imported.contains(name) && !missing.contains(&name) {
                missing.push(name);
            }
        });
        issues.extend(missing.into_iter().map(|name| GrammarIssue::UnresolvedReference {
            rule: rule.name.clone(),
            name: name.to_string(),
        }));

        rule.body.walk(&mut |expr| match expr {
            Expr::Regex { pattern, .. } if pattern.contains(['\n', '\r']) => {
                issues.push(GrammarIssue::MultilineRegex {
                    rule: rule.name.clone(),
                    pattern: pattern.clone(),
                });
            }
            Expr::Regex { pattern, flags } => {
                if let Err(e) = compile_terminal(pattern, flags) {
                    issues.push(GrammarIssue::InvalidRegex {
                        rule: rule.name.clone(),
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    });
                }
            }
            Expr::Seq(items) | Expr::Alt(items) if items.is_empty() => {
                issues.push(GrammarIssue::EmptyExpression {
                    rule: rule.name.clone(),
                });
            }
            _ => {}
        });
    }

    issues
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the names a rule header can spell.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn compile_terminal(pattern: &str, flags: &str) -> Result<regex::Regex, regex::Error> {
    let inline: String = flags.chars().filter(|c| "imsx".contains(*c)).collect();
    if inline.is_empty() {
        regex::Regex::new(pattern)
    } else {
        regex::Regex::new(&format!("(?{}){}", inline, pattern))
    }
}

/// Names brought in by `%import` and `%declare` directives.
fn imported_names(directives: &[String]) -> HashSet<String> {
    let mut names = HashSet::new();
    for directive in directives {
        if let Some(rest) = directive.strip_prefix("%declare") {
            names.extend(rest.split_whitespace().map(str::to_string));
        } else if let Some(rest) = directive.strip_prefix("%import") {
            let rest = rest.trim();
            if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
                names.extend(
                    rest[open + 1..close]
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty()),
                );
            } else if let Some((_, alias)) = rest.split_once("->") {
                names.insert(alias.trim().to_string());
            } else if let Some(last) = rest.rsplit('.').next() {
                names.insert(last.trim().to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Rule;

    fn issues(text: &str) -> Vec<GrammarIssue> {
        Grammar::parse(text).unwrap().issues()
    }

    #[test]
    fn test_sound_grammar_has_no_issues() {
        assert!(issues(crate::BASE_GRAMMAR).is_empty());
    }

    #[test]
    fn test_missing_start() {
        assert_eq!(issues("msg: \"a\""), vec![GrammarIssue::MissingStart]);
    }

    #[test]
    fn test_duplicate_start_reported_once() {
        let found = issues("start: \"a\"\nstart: \"b\"\nstart: \"c\"");
        assert_eq!(
            found,
            vec![GrammarIssue::DuplicateRule {
                name: "start".into()
            }]
        );
    }

    #[test]
    fn test_unresolved_reference() {
        let found = issues("start: msg tail\nmsg: \"a\"");
        assert_eq!(
            found,
            vec![GrammarIssue::UnresolvedReference {
                rule: "start".into(),
                name: "tail".into()
            }]
        );
    }

    #[test]
    fn test_imported_names_resolve() {
        let text = "start: WORD WS* NUMBER\n%import common.WORD\n%import common (WS, NUMBER)";
        assert!(issues(text).is_empty());
    }

    #[test]
    fn test_invalid_regex() {
        let found = issues("start: /[a-z/");
        assert!(matches!(found.as_slice(), [GrammarIssue::InvalidRegex { .. }]));
    }

    #[test]
    fn test_rule_name_must_be_identifier() {
        let g = Grammar::base().with_rule(Rule::new("bad-name", Expr::regex("[a-z]+")));
        assert_eq!(
            g.issues(),
            vec![GrammarIssue::InvalidRuleName {
                name: "bad-name".into()
            }]
        );
        assert!(is_identifier("C"));
        assert!(is_identifier("_tail2"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_multiline_regex_reported() {
        let g = Grammar::base().with_rule(Rule::new("NL", Expr::regex("a\nb")));
        assert!(matches!(
            g.issues().as_slice(),
            [GrammarIssue::MultilineRegex { rule, .. }] if rule == "NL"
        ));
    }

    #[test]
    fn test_regex_flags_are_honoured() {
        assert!(issues("start: /abc/i").is_empty());
    }
}
