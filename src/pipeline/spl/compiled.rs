//! Compiled (validated) form of an SPL query: regexes are pre-built and
//! arity-checked at `Init` time rather than per event.

use std::collections::HashMap;

use regex::Regex;

use super::ast::{self, FieldRef};
use crate::error::SplError;

#[derive(Debug, Clone)]
pub enum CompiledSource {
    Star,
    Ref(String),
}

pub enum CompiledStage {
    Where(ast::Expr),
    Extend(Vec<(String, ast::Expr)>),
    ParseJson(String),
    ParseRegexp {
        field: String,
        regex: Regex,
        targets: Vec<String>,
    },
    ParseCsv {
        field: String,
        targets: Vec<String>,
    },
    ParseKv {
        delims: Vec<char>,
        field: String,
    },
    ProjectRename(Vec<(FieldRef, FieldRef)>),
}

pub struct CompiledPipeline {
    pub source: CompiledSource,
    pub stages: Vec<CompiledStage>,
}

pub struct CompiledQuery {
    /// `.let` bindings, keyed by name, in declaration order.
    pub lets: HashMap<String, CompiledPipeline>,
    /// Bare (non-`.let`) pipelines, each producing one output group.
    pub emits: Vec<CompiledPipeline>,
}

const DEFAULT_KV_DELIMS: &str = "&";

fn compile_stage(stage: ast::Stage) -> Result<CompiledStage, SplError> {
    Ok(match stage {
        ast::Stage::Where(e) => CompiledStage::Where(e),
        ast::Stage::Extend(assigns) => CompiledStage::Extend(assigns),
        ast::Stage::ParseJson(field) => CompiledStage::ParseJson(field),
        ast::Stage::ParseRegexp {
            field,
            pattern,
            targets,
        } => {
            let regex = Regex::new(&pattern)?;
            if regex.captures_len() <= 1 {
                return Err(SplError::NoCaptureGroups);
            }
            CompiledStage::ParseRegexp {
                field,
                regex,
                targets,
            }
        }
        ast::Stage::ParseCsv { field, targets } => CompiledStage::ParseCsv { field, targets },
        ast::Stage::ParseKv { delims, field } => {
            let delims = delims.as_deref().unwrap_or(DEFAULT_KV_DELIMS).chars().collect();
            CompiledStage::ParseKv { delims, field }
        }
        ast::Stage::ProjectRename(renames) => CompiledStage::ProjectRename(renames),
    })
}

fn compile_pipeline(pipeline: ast::Pipeline, known_lets: &[String]) -> Result<CompiledPipeline, SplError> {
    let source = match pipeline.source {
        ast::Source::Star => CompiledSource::Star,
        ast::Source::Ref(name) => {
            if !known_lets.contains(&name) {
                return Err(SplError::UnknownBinding(name));
            }
            CompiledSource::Ref(name)
        }
    };
    let stages = pipeline
        .stages
        .into_iter()
        .map(compile_stage)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CompiledPipeline { source, stages })
}

pub fn compile(query: ast::Query) -> Result<CompiledQuery, SplError> {
    let mut lets = HashMap::new();
    let mut known_lets = Vec::new();
    let mut emits = Vec::new();

    for statement in query.statements {
        match statement {
            ast::Statement::Let(name, pipeline) => {
                let compiled = compile_pipeline(pipeline, &known_lets)?;
                known_lets.push(name.clone());
                lets.insert(name, compiled);
            }
            ast::Statement::Emit(pipeline) => {
                emits.push(compile_pipeline(pipeline, &known_lets)?);
            }
        }
    }

    Ok(CompiledQuery { lets, emits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::spl::parser::Parser;

    #[test]
    fn compiles_valid_query() {
        let query = Parser::parse(".let src = * | parse-json content; $src;").unwrap();
        let compiled = compile(query).unwrap();
        assert_eq!(compiled.emits.len(), 1);
        assert!(compiled.lets.contains_key("src"));
    }

    #[test]
    fn rejects_unknown_ref() {
        let query = Parser::parse("$nope;").unwrap();
        let err = compile(query).unwrap_err();
        assert!(matches!(err, SplError::UnknownBinding(n) if n == "nope"));
    }

    #[test]
    fn rejects_regex_with_no_capture_groups() {
        let query = Parser::parse("* | parse-regexp content, 'nocaptures' as a").unwrap();
        let err = compile(query).unwrap_err();
        assert!(matches!(err, SplError::NoCaptureGroups));
    }
}
