//! Parsed (uncompiled) SPL syntax tree.

#[derive(Debug, Clone)]
pub enum Source {
    Star,
    Ref(String),
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub source: Source,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Let(String, Pipeline),
    Emit(Pipeline),
}

#[derive(Debug, Clone)]
pub struct Query {
    pub statements: Vec<Statement>,
}

/// A content-or-tag field reference, distinguished by the `__tag__:` prefix
/// convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef {
    Content(String),
    Tag(String),
}

#[derive(Debug, Clone)]
pub enum Stage {
    Where(Expr),
    Extend(Vec<(String, Expr)>),
    ParseJson(String),
    ParseRegexp {
        field: String,
        pattern: String,
        targets: Vec<String>,
    },
    ParseCsv {
        field: String,
        targets: Vec<String>,
    },
    ParseKv {
        delims: Option<String>,
        field: String,
    },
    ProjectRename(Vec<(FieldRef, FieldRef)>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Column(String),
    TagColumn(String),
    StrLit(String),
    IntLit(i64),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    JsonExtract(Box<Expr>, String),
}
