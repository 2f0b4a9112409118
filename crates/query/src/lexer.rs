//! Hand-written lexer for the traversal query language (spec §4.7).
//!
//! Operates over a `Vec<char>` rather than `str::char_indices` so `position`
//! is a plain character index — simpler to reason about than juggling byte
//! offsets against multi-byte UTF-8, and sufficient since every token in
//! this grammar is ASCII.

use crate::error::LexError;
use crate::token::{Token, TokenKind};

pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(), pos: 0, line: 1, column: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let position = self.pos;
            let line = self.line;
            let column = self.column;
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokenKind::Eof, position, line, column });
                break;
            };

            let kind = match c {
                '.' => {
                    self.bump();
                    TokenKind::Dot
                }
                ':' => {
                    self.bump();
                    TokenKind::Colon
                }
                '*' => {
                    self.bump();
                    TokenKind::Star
                }
                ',' => {
                    self.bump();
                    TokenKind::Comma
                }
                '?' => {
                    self.bump();
                    TokenKind::Question
                }
                '{' => {
                    self.bump();
                    TokenKind::LBrace
                }
                '}' => {
                    self.bump();
                    TokenKind::RBrace
                }
                '[' => {
                    self.bump();
                    TokenKind::LBracket
                }
                ']' => {
                    self.bump();
                    TokenKind::RBracket
                }
                '(' => {
                    self.bump();
                    TokenKind::LParen
                }
                ')' => {
                    self.bump();
                    TokenKind::RParen
                }
                '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::Gte
                    } else {
                        TokenKind::Gt
                    }
                }
                '<' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::Lte
                    } else if self.peek() == Some('-') {
                        self.bump();
                        TokenKind::ArrowReverse
                    } else {
                        TokenKind::Lt
                    }
                }
                '=' => {
                    self.bump();
                    TokenKind::Eq
                }
                '!' if self.peek_at(1) == Some('=') => {
                    self.bump();
                    self.bump();
                    TokenKind::Neq
                }
                '\'' | '"' => self.lex_string(c, position, line, column)?,
                c if c.is_ascii_digit() => self.lex_number(),
                '-' | '+' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.lex_number(),
                c if is_ident_start(c) => self.lex_identifier(),
                other => {
                    return Err(LexError { position, line, column, message: format!("unexpected character {other:?}") });
                }
            };
            tokens.push(Token { kind, position, line, column });
        }
        Ok(tokens)
    }

    fn lex_string(&mut self, quote: char, position: usize, line: usize, column: usize) -> Result<TokenKind, LexError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(LexError { position, line, column, message: "unterminated string literal".to_string() })
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => {
                        return Err(LexError {
                            position,
                            line,
                            column,
                            message: "unterminated escape sequence in string literal".to_string(),
                        })
                    }
                },
                Some(c) => out.push(c),
            }
        }
        Ok(TokenKind::String(out))
    }

    fn lex_number(&mut self) -> TokenKind {
        let mut text = String::new();
        if matches!(self.peek(), Some('-') | Some('+')) {
            text.push(self.bump().unwrap());
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
        }
        TokenKind::Number(text.parse().expect("lexer only accumulates valid numeric text"))
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            text.push(self.bump().unwrap());
        }
        match text.to_ascii_uppercase().as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            _ if text == "depth" => TokenKind::Depth,
            _ => TokenKind::Identifier(text),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_tokenizes_with_expected_positions() {
        let tokens = tokenize("user:123.friends[?age > 30]").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 4, 5, 8, 9, 16, 17, 18, 22, 24, 26, 27]);
        assert_eq!(tokens[0].kind, TokenKind::Identifier("user".to_string()));
        assert_eq!(tokens[1].kind, TokenKind::Colon);
        assert_eq!(tokens[2].kind, TokenKind::Number(123.0));
        assert_eq!(tokens[3].kind, TokenKind::Dot);
        assert_eq!(tokens[4].kind, TokenKind::Identifier("friends".to_string()));
        assert_eq!(tokens[5].kind, TokenKind::LBracket);
        assert_eq!(tokens[6].kind, TokenKind::Question);
        assert_eq!(tokens[7].kind, TokenKind::Identifier("age".to_string()));
        assert_eq!(tokens[8].kind, TokenKind::Gt);
        assert_eq!(tokens[9].kind, TokenKind::Number(30.0));
        assert_eq!(tokens[10].kind, TokenKind::RBracket);
        assert_eq!(tokens[11].kind, TokenKind::Eof);
    }

    #[test]
    fn lexes_reverse_arrow_and_comparisons() {
        let tokens = tokenize("<- <= >= != =").unwrap();
        assert_eq!(
            tokens.iter().map(|t| t.kind.clone()).collect::<Vec<_>>(),
            vec![
                TokenKind::ArrowReverse,
                TokenKind::Lte,
                TokenKind::Gte,
                TokenKind::Neq,
                TokenKind::Eq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn and_or_are_case_insensitive() {
        let tokens = tokenize("and AND or OR And").unwrap();
        assert!(tokens[..5].iter().all(|t| matches!(t.kind, TokenKind::And | TokenKind::Or)));
    }

    #[test]
    fn rejects_invalid_characters_with_position() {
        let err = tokenize("user~1").unwrap_err();
        assert_eq!(err.position, 4);
    }

    #[test]
    fn lexes_quoted_strings_with_escapes() {
        let tokens = tokenize(r#"'it\'s' "a\nb""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String("it's".to_string()));
        assert_eq!(tokens[1].kind, TokenKind::String("a\nb".to_string()));
    }
}
