//! Hand-rolled scanner for SPL source text.

use crate::error::SplError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Star,
    Dollar,
    Dot,
    Pipe,
    Semi,
    Comma,
    Colon,
    Eq,
    EqEq,
    NotEq,
    LParen,
    RParen,
    Ident(String),
    Str(String),
    Int(i64),
    Eof,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<(usize, Token)>, SplError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(pos, c)) = self.chars.peek() else {
                tokens.push((self.src.len(), Token::Eof));
                break;
            };
            let tok = match c {
                '*' => {
                    self.chars.next();
                    Token::Star
                }
                '$' => {
                    self.chars.next();
                    Token::Dollar
                }
                '.' => {
                    self.chars.next();
                    Token::Dot
                }
                '|' => {
                    self.chars.next();
                    Token::Pipe
                }
                ';' => {
                    self.chars.next();
                    Token::Semi
                }
                ',' => {
                    self.chars.next();
                    Token::Comma
                }
                ':' => {
                    self.chars.next();
                    Token::Colon
                }
                '(' => {
                    self.chars.next();
                    Token::LParen
                }
                ')' => {
                    self.chars.next();
                    Token::RParen
                }
                '=' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.chars.next();
                        Token::EqEq
                    } else {
                        Token::Eq
                    }
                }
                '!' => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.chars.next();
                        Token::NotEq
                    } else {
                        return Err(SplError::Syntax {
                            pos,
                            message: "expected '=' after '!'".to_string(),
                        });
                    }
                }
                '\'' | '"' => self.scan_string(c)?,
                c if c.is_ascii_digit() => self.scan_int(),
                c if c.is_alphabetic() || c == '_' || c == '-' => self.scan_ident(),
                other => {
                    return Err(SplError::Syntax {
                        pos,
                        message: format!("unexpected character '{other}'"),
                    })
                }
            };
            tokens.push((pos, tok));
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, SplError> {
        let start = self.chars.next().unwrap().0;
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => return Ok(Token::Str(out)),
                Some((_, '\\')) => {
                    if let Some((_, next)) = self.chars.next() {
                        out.push(next);
                    }
                }
                Some((_, c)) => out.push(c),
                None => {
                    return Err(SplError::Syntax {
                        pos: start,
                        message: "unterminated string literal".to_string(),
                    })
                }
            }
        }
    }

    fn scan_int(&mut self) -> Token {
        let mut out = String::new();
        while matches!(self.chars.peek(), Some((_, c)) if c.is_ascii_digit()) {
            out.push(self.chars.next().unwrap().1);
        }
        Token::Int(out.parse().unwrap_or(0))
    }

    fn scan_ident(&mut self) -> Token {
        let mut out = String::new();
        while matches!(self.chars.peek(), Some((_, c)) if c.is_alphanumeric() || *c == '_' || *c == '-') {
            out.push(self.chars.next().unwrap().1);
        }
        Token::Ident(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    #[test]
    fn tokenizes_where_clause() {
        let toks = kinds("* | where content = 'value_3_0'");
        assert_eq!(
            toks,
            vec![
                Token::Star,
                Token::Pipe,
                Token::Ident("where".to_string()),
                Token::Ident("content".to_string()),
                Token::Eq,
                Token::Str("value_3_0".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_hyphenated_stage_names() {
        let toks = kinds("parse-json project-rename -delims=");
        assert_eq!(
            toks,
            vec![
                Token::Ident("parse-json".to_string()),
                Token::Ident("project-rename".to_string()),
                Token::Ident("-delims".to_string()),
                Token::Eq,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_tag_ref() {
        let toks = kinds("__tag__:taiye2");
        assert_eq!(
            toks,
            vec![
                Token::Ident("__tag__".to_string()),
                Token::Colon,
                Token::Ident("taiye2".to_string()),
                Token::Eof,
            ]
        );
    }
}
