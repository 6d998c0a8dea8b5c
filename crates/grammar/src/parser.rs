//! Lark-style grammar text parser.
//!
//! Supports `name: body` rules, `|` continuation lines, `//` and `#` comments,
//! `%` directives, quoted literals, `/regex/flags`, grouping, `[optional]`
//! and the `*`, `+`, `?` suffixes.

use crate::ast::{Expr, Grammar, RepeatKind, Rule};
use crate::error::GrammarError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Regex { pattern: String, flags: String },
    Ident(String),
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Suffix(RepeatKind),
}

const REGEX_FLAGS: &str = "imslux";

/// Parse a full grammar text.
pub(crate) fn parse_grammar(text: &str) -> Result<Grammar, GrammarError> {
    // (name, body text, line of the header)
    let mut pending: Vec<(String, String, usize)> = Vec::new();
    let mut directives = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }
        if line.starts_with('%') {
            directives.push(line.to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix('|') {
            let Some(last) = pending.last_mut() else {
                return Err(syntax(line_no, "continuation line before any rule"));
            };
            last.1.push_str(" | ");
            last.1.push_str(rest.trim());
            continue;
        }
        let (name, body) = split_header(line).ok_or_else(|| {
            syntax(line_no, format!("expected 'name: body', found '{}'", line))
        })?;
        pending.push((name.to_string(), body.to_string(), line_no));
    }

    let mut rules = Vec::with_capacity(pending.len());
    for (name, body, line_no) in pending {
        let expr = parse_body(&body, line_no)?;
        rules.push(Rule::new(name, expr));
    }

    Ok(Grammar::new(rules, directives))
}

/// Parse a standalone right-hand side, e.g. `"c" | "s" | "z"`.
pub fn parse_expr(text: &str) -> Result<Expr, GrammarError> {
    parse_body(text, 0)
}

fn parse_body(text: &str, line: usize) -> Result<Expr, GrammarError> {
    let tokens = tokenize(text, line)?;
    if tokens.is_empty() {
        return Err(syntax(line, "empty rule body"));
    }
    let mut parser = Parser { tokens, pos: 0, line };
    let expr = parser.alternation()?;
    if let Some(tok) = parser.peek() {
        return Err(syntax(line, format!("unexpected {:?}", tok)));
    }
    Ok(expr)
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let end = line
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    let name = &line[..end];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let body = line[end..].trim_start().strip_prefix(':')?;
    Some((name, body.trim()))
}

fn syntax(line: usize, message: impl Into<String>) -> GrammarError {
    GrammarError::Syntax {
        line,
        message: message.into(),
    }
}

fn tokenize(text: &str, line: usize) -> Result<Vec<Token>, GrammarError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Suffix(RepeatKind::ZeroOrMore));
                i += 1;
            }
            '+' => {
                tokens.push(Token::Suffix(RepeatKind::OneOrMore));
                i += 1;
            }
            '?' => {
                tokens.push(Token::Suffix(RepeatKind::Optional));
                i += 1;
            }
            '"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(line, "unterminated string literal")),
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some('n') => value.push('\n'),
                                Some('t') => value.push('\t'),
                                Some('r') => value.push('\r'),
                                Some('"') => value.push('"'),
                                Some('\\') => value.push('\\'),
                                Some(other) => {
                                    value.push('\\');
                                    value.push(*other);
                                }
                                None => return Err(syntax(line, "unterminated string literal")),
                            }
                            i += 2;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '/' => {
                // `//` starts a trailing comment.
                if chars.get(i + 1) == Some(&'/') {
                    break;
                }
                let mut pattern = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(line, "unterminated regex terminal")),
                        Some('/') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some('/') => pattern.push('/'),
                                Some(next) => {
                                    pattern.push('\\');
                                    pattern.push(*next);
                                }
                                None => return Err(syntax(line, "unterminated regex terminal")),
                            }
                            i += 2;
                        }
                        Some(ch) => {
                            pattern.push(*ch);
                            i += 1;
                        }
                    }
                }
                let mut flags = String::new();
                while let Some(f) = chars.get(i).filter(|f| REGEX_FLAGS.contains(**f)) {
                    flags.push(*f);
                    i += 1;
                }
                tokens.push(Token::Regex { pattern, flags });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(syntax(line, format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn alternation(&mut self) -> Result<Expr, GrammarError> {
        let mut alts = vec![self.sequence()?];
        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            alts.push(self.sequence()?);
        }
        Ok(if alts.len() == 1 {
            alts.remove(0)
        } else {
            Expr::Alt(alts)
        })
    }

    fn sequence(&mut self) -> Result<Expr, GrammarError> {
        let mut items = Vec::new();
        while let Some(tok) = self.peek() {
            if matches!(tok, Token::Pipe | Token::RParen | Token::RBracket) {
                break;
            }
            items.push(self.postfix()?);
        }
        match items.len() {
            0 => Err(syntax(self.line, "empty alternative")),
            1 => Ok(items.remove(0)),
            _ => Ok(Expr::Seq(items)),
        }
    }

    fn postfix(&mut self) -> Result<Expr, GrammarError> {
        let mut expr = self.atom()?;
        while let Some(Token::Suffix(kind)) = self.peek() {
            let kind = *kind;
            self.pos += 1;
            expr = Expr::Repeat {
                inner: Box::new(expr),
                kind,
            };
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr, GrammarError> {
        match self.next() {
            Some(Token::Str(value)) => Ok(Expr::Literal(value)),
            Some(Token::Regex { pattern, flags }) => Ok(Expr::Regex { pattern, flags }),
            Some(Token::Ident(name)) => Ok(Expr::Ref(name)),
            Some(Token::LParen) => {
                let inner = self.alternation()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let inner = self.alternation()?;
                self.expect(Token::RBracket)?;
                Ok(Expr::Repeat {
                    inner: Box::new(inner),
                    kind: RepeatKind::Optional,
                })
            }
            Some(other) => Err(syntax(self.line, format!("unexpected {:?}", other))),
            None => Err(syntax(self.line, "unexpected end of rule body")),
        }
    }

    fn expect(&mut self, want: Token) -> Result<(), GrammarError> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(syntax(self.line, format!("expected {:?}, found {:?}", want, tok))),
            None => Err(syntax(self.line, format!("expected {:?}", want))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scenario_grammar() {
        let g = parse_grammar(crate::BASE_GRAMMAR).unwrap();
        let msg = g.rule("msg").unwrap();
        assert_eq!(
            msg.body,
            Expr::Seq(vec![
                Expr::Ref("phrase".into()),
                Expr::Repeat {
                    inner: Box::new(Expr::Seq(vec![
                        Expr::Literal(";".into()),
                        Expr::Ref("phrase".into()),
                    ])),
                    kind: RepeatKind::ZeroOrMore,
                },
            ])
        );
        assert_eq!(g.rule("value").unwrap().body, Expr::regex("[a-z]+"));
    }

    #[test]
    fn test_continuation_lines_and_comments() {
        let text = "// header comment\nstart: item\n# another\nitem: \"a\"\n    | \"b\"  // trailing\n%import common.WS\n";
        let g = parse_grammar(text).unwrap();
        assert_eq!(g.rules().len(), 2);
        assert_eq!(g.rule("item").unwrap().body.to_string(), r#""a" | "b""#);
        assert_eq!(g.directives(), &["%import common.WS".to_string()]);
    }

    #[test]
    fn test_optional_brackets_and_flags() {
        let expr = parse_expr(r#"[ "x" ] /abc/i+"#).unwrap();
        assert_eq!(expr.to_string(), r#""x"? /abc/i+"#);
    }

    #[test]
    fn test_regex_with_escaped_slash() {
        let expr = parse_expr(r"/a\/b/").unwrap();
        assert_eq!(expr, Expr::regex(r"a\/b"));
        assert_eq!(expr.to_string(), r"/a\/b/");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_grammar("start msg"),
            Err(GrammarError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            parse_grammar("start: (a"),
            Err(GrammarError::Syntax { .. })
        ));
        assert!(matches!(
            parse_grammar("| a"),
            Err(GrammarError::Syntax { .. })
        ));
        assert!(parse_expr("a | | b").is_err());
        assert!(parse_expr("\"open").is_err());
    }

    #[test]
    fn test_empty_text_is_empty_grammar() {
        let g = parse_grammar("\n\n").unwrap();
        assert!(g.rules().is_empty());
    }
}
