//! Recursive-descent parser turning a token stream into an [`ast::Query`].

use super::ast::{Expr, FieldRef, Pipeline, Query, Source, Stage, Statement};
use super::lexer::{Lexer, Token};
use crate::error::SplError;

pub struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    pub fn parse(src: &str) -> Result<Query, SplError> {
        let tokens = Lexer::new(src).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        parser.parse_query()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].1
    }

    fn pos_at(&self) -> usize {
        self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].1.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), SplError> {
        let got = self.advance();
        if got == expected {
            Ok(())
        } else {
            Err(SplError::Syntax {
                pos: self.pos_at(),
                message: format!("expected {expected:?}, got {got:?}"),
            })
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<(), SplError> {
        match self.advance() {
            Token::Ident(s) if s == expected => Ok(()),
            other => Err(SplError::Syntax {
                pos: self.pos_at(),
                message: format!("expected '{expected}', got {other:?}"),
            }),
        }
    }

    fn take_ident(&mut self) -> Result<String, SplError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            other => Err(SplError::Syntax {
                pos: self.pos_at(),
                message: format!("expected identifier, got {other:?}"),
            }),
        }
    }

    fn take_str(&mut self) -> Result<String, SplError> {
        match self.advance() {
            Token::Str(s) => Ok(s),
            other => Err(SplError::Syntax {
                pos: self.pos_at(),
                message: format!("expected string literal, got {other:?}"),
            }),
        }
    }

    fn parse_query(&mut self) -> Result<Query, SplError> {
        let mut statements = Vec::new();
        loop {
            if matches!(self.peek(), Token::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
            if matches!(self.peek(), Token::Semi) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(Query { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, SplError> {
        if matches!(self.peek(), Token::Dot) {
            self.advance();
            self.expect_ident("let")?;
            let name = self.take_ident()?;
            self.expect_token(Token::Eq)?;
            let pipeline = self.parse_pipeline()?;
            Ok(Statement::Let(name, pipeline))
        } else {
            Ok(Statement::Emit(self.parse_pipeline()?))
        }
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, SplError> {
        let source = match self.advance() {
            Token::Star => Source::Star,
            Token::Dollar => Source::Ref(self.take_ident()?),
            other => {
                return Err(SplError::Syntax {
                    pos: self.pos_at(),
                    message: format!("expected '*' or '$name', got {other:?}"),
                })
            }
        };
        let mut stages = Vec::new();
        while matches!(self.peek(), Token::Pipe) {
            self.advance();
            stages.push(self.parse_stage()?);
        }
        Ok(Pipeline { source, stages })
    }

    fn parse_stage(&mut self) -> Result<Stage, SplError> {
        let name = self.take_ident()?;
        match name.as_str() {
            "where" => Ok(Stage::Where(self.parse_or_expr()?)),
            "extend" => {
                let mut assigns = vec![self.parse_assign()?];
                while matches!(self.peek(), Token::Comma) {
                    self.advance();
                    assigns.push(self.parse_assign()?);
                }
                Ok(Stage::Extend(assigns))
            }
            "parse-json" => Ok(Stage::ParseJson(self.take_ident()?)),
            "parse-regexp" => {
                let field = self.take_ident()?;
                self.expect_token(Token::Comma)?;
                let pattern = self.take_str()?;
                self.expect_ident("as")?;
                let targets = self.parse_ident_list()?;
                Ok(Stage::ParseRegexp {
                    field,
                    pattern,
                    targets,
                })
            }
            "parse-csv" => {
                let field = self.take_ident()?;
                self.expect_ident("as")?;
                let targets = self.parse_ident_list()?;
                Ok(Stage::ParseCsv { field, targets })
            }
            "parse-kv" => {
                let mut delims = None;
                if let Token::Ident(flag) = self.peek() {
                    if flag == "-delims" {
                        self.advance();
                        self.expect_token(Token::Eq)?;
                        delims = Some(self.take_str()?);
                    }
                }
                let field = self.take_ident()?;
                Ok(Stage::ParseKv { delims, field })
            }
            "project-rename" => {
                let mut renames = vec![self.parse_rename()?];
                while matches!(self.peek(), Token::Comma) {
                    self.advance();
                    renames.push(self.parse_rename()?);
                }
                Ok(Stage::ProjectRename(renames))
            }
            other => Err(SplError::UnknownStage(other.to_string())),
        }
    }

    fn parse_ident_list(&mut self) -> Result<Vec<String>, SplError> {
        let mut out = vec![self.take_ident()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            out.push(self.take_ident()?);
        }
        Ok(out)
    }

    fn parse_assign(&mut self) -> Result<(String, Expr), SplError> {
        let name = self.take_ident()?;
        self.expect_token(Token::Eq)?;
        let expr = self.parse_or_expr()?;
        Ok((name, expr))
    }

    fn parse_field_ref(&mut self) -> Result<FieldRef, SplError> {
        let first = self.take_ident()?;
        if first == "__tag__" {
            self.expect_token(Token::Colon)?;
            Ok(FieldRef::Tag(self.take_ident()?))
        } else {
            Ok(FieldRef::Content(first))
        }
    }

    fn parse_rename(&mut self) -> Result<(FieldRef, FieldRef), SplError> {
        let target = self.parse_field_ref()?;
        self.expect_token(Token::Eq)?;
        let source = self.parse_field_ref()?;
        Ok((target, source))
    }

    fn parse_or_expr(&mut self) -> Result<Expr, SplError> {
        let mut left = self.parse_and_expr()?;
        while matches!(self.peek(), Token::Ident(s) if s == "or") {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, SplError> {
        let mut left = self.parse_not_expr()?;
        while matches!(self.peek(), Token::Ident(s) if s == "and") {
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, SplError> {
        if matches!(self.peek(), Token::Ident(s) if s == "not") {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_not_expr()?)));
        }
        self.parse_cmp_expr()
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, SplError> {
        let left = self.parse_primary()?;
        match self.peek() {
            Token::Eq | Token::EqEq => {
                self.advance();
                let right = self.parse_primary()?;
                Ok(Expr::Eq(Box::new(left), Box::new(right)))
            }
            Token::NotEq => {
                self.advance();
                let right = self.parse_primary()?;
                Ok(Expr::Ne(Box::new(left), Box::new(right)))
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SplError> {
        match self.advance() {
            Token::LParen => {
                let inner = self.parse_or_expr()?;
                self.expect_token(Token::RParen)?;
                Ok(inner)
            }
            Token::Str(s) => Ok(Expr::StrLit(s)),
            Token::Int(i) => Ok(Expr::IntLit(i)),
            Token::Ident(name) if name == "__tag__" => {
                self.expect_token(Token::Colon)?;
                Ok(Expr::TagColumn(self.take_ident()?))
            }
            Token::Ident(name) if name == "json_extract" => {
                self.expect_token(Token::LParen)?;
                let inner = self.parse_or_expr()?;
                self.expect_token(Token::Comma)?;
                let path = self.take_str()?;
                self.expect_token(Token::RParen)?;
                Ok(Expr::JsonExtract(Box::new(inner), path))
            }
            Token::Ident(name) => Ok(Expr::Column(name)),
            other => Err(SplError::Syntax {
                pos: self.pos_at(),
                message: format!("unexpected token in expression: {other:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_where_stage() {
        let query = Parser::parse("* | where content = 'value_3_0'").unwrap();
        assert_eq!(query.statements.len(), 1);
        match &query.statements[0] {
            Statement::Emit(p) => {
                assert!(matches!(p.source, Source::Star));
                assert_eq!(p.stages.len(), 1);
                assert!(matches!(p.stages[0], Stage::Where(_)));
            }
            _ => panic!("expected Emit"),
        }
    }

    #[test]
    fn parses_let_and_ref() {
        let query = Parser::parse(".let src = * | parse-json content; $src;").unwrap();
        assert_eq!(query.statements.len(), 2);
        assert!(matches!(&query.statements[0], Statement::Let(name, _) if name == "src"));
        match &query.statements[1] {
            Statement::Emit(p) => assert!(matches!(&p.source, Source::Ref(n) if n == "src")),
            _ => panic!("expected Emit"),
        }
    }

    #[test]
    fn parses_project_rename_with_tag() {
        let query = Parser::parse("* | project-rename __tag__:taiye2=a1").unwrap();
        match &query.statements[0] {
            Statement::Emit(p) => match &p.stages[0] {
                Stage::ProjectRename(renames) => {
                    assert_eq!(renames.len(), 1);
                    assert_eq!(renames[0].0, FieldRef::Tag("taiye2".to_string()));
                    assert_eq!(renames[0].1, FieldRef::Content("a1".to_string()));
                }
                _ => panic!("expected ProjectRename"),
            },
            _ => panic!("expected Emit"),
        }
    }

    #[test]
    fn parses_parse_kv_with_delims() {
        let query = Parser::parse("* | parse-kv -delims='&?' content").unwrap();
        match &query.statements[0] {
            Statement::Emit(p) => match &p.stages[0] {
                Stage::ParseKv { delims, field } => {
                    assert_eq!(delims.as_deref(), Some("&?"));
                    assert_eq!(field, "content");
                }
                _ => panic!("expected ParseKv"),
            },
            _ => panic!("expected Emit"),
        }
    }

    #[test]
    fn rejects_unknown_stage() {
        let err = Parser::parse("* | frobnicate content").unwrap_err();
        assert!(matches!(err, SplError::UnknownStage(s) if s == "frobnicate"));
    }
}
