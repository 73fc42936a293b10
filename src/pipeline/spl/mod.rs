//! SPL (structured pipeline language) processor: parses a small filter/
//! enrich/reshape language and runs it as a [`Processor`].

pub mod ast;
pub mod compiled;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use self::compiled::{CompiledPipeline, CompiledQuery, CompiledSource};
use self::parser::Parser;
use crate::event::EventGroup;
use crate::pipeline::processor::ComponentConfig;
use crate::pipeline::{PipelineContext, ProcessProfile};

/// Configuration for the SPL processor, deserialized from a pipeline's
/// component config block.
#[derive(Debug, Clone, Deserialize)]
pub struct SplProcessorConfig {
    pub spl: String,
    #[serde(default)]
    pub discard_unmatch: bool,
    #[serde(default)]
    pub upload_raw_log: bool,
}

/// Runs every bare (non-`.let`) pipeline in a compiled query against an
/// incoming group, memoizing `.let` bindings per `Process` call so a
/// binding referenced from multiple emits is only evaluated once.
pub struct ProcessorSpl {
    name: String,
    query: Option<CompiledQuery>,
    discard_unmatch: bool,
    upload_raw_log: bool,
    process_profile: Option<Arc<Mutex<ProcessProfile>>>,
}

impl ProcessorSpl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: None,
            discard_unmatch: false,
            upload_raw_log: false,
            process_profile: None,
        }
    }

    fn eval_source(
        &self,
        source: &CompiledSource,
        input: &EventGroup,
        lets: &HashMap<String, CompiledPipeline>,
        cache: &mut HashMap<String, EventGroup>,
        profile: &Arc<Mutex<ProcessProfile>>,
    ) -> EventGroup {
        match source {
            CompiledSource::Star => input.clone(),
            CompiledSource::Ref(name) => {
                if let Some(cached) = cache.get(name) {
                    return cached.clone();
                }
                let pipeline = lets
                    .get(name)
                    .expect("compile() validated every $ref against known .let bindings");
                let result = self.eval_pipeline(pipeline, input, lets, cache, profile);
                cache.insert(name.clone(), result.clone());
                result
            }
        }
    }

    fn eval_pipeline(
        &self,
        pipeline: &CompiledPipeline,
        input: &EventGroup,
        lets: &HashMap<String, CompiledPipeline>,
        cache: &mut HashMap<String, EventGroup>,
        profile: &Arc<Mutex<ProcessProfile>>,
    ) -> EventGroup {
        let mut group = self.eval_source(&pipeline.source, input, lets, cache, profile);
        for stage in &pipeline.stages {
            group = eval::apply_stage(stage, group, self.discard_unmatch, profile);
        }
        group
    }
}

impl crate::pipeline::processor::Processor for ProcessorSpl {
    fn init(&mut self, config: &ComponentConfig, context: &PipelineContext) -> bool {
        let ComponentConfig::Spl(cfg) = config;
        let query = match Parser::parse(&cfg.spl).and_then(compiled::compile) {
            Ok(q) => q,
            Err(err) => {
                context.raise_alarm(
                    crate::alarm::AlarmCategory::ProcessorInitFailure,
                    &format!("failed to compile spl query: {err}"),
                );
                return false;
            }
        };
        self.query = Some(query);
        self.discard_unmatch = cfg.discard_unmatch;
        self.upload_raw_log = cfg.upload_raw_log;
        self.process_profile = Some(context.process_profile_handle());
        true
    }

    fn process(&mut self, input: EventGroup, out: &mut Vec<EventGroup>) {
        let Some(query) = self.query.as_ref() else {
            out.push(input);
            return;
        };
        let profile = self
            .process_profile
            .clone()
            .unwrap_or_else(|| Arc::new(Mutex::new(ProcessProfile::default())));
        let mut cache = HashMap::new();
        for emit in &query.emits {
            let result = self.eval_pipeline(emit, &input, &query.lets, &mut cache, &profile);
            out.push(result);
        }
        if self.upload_raw_log && query.emits.is_empty() {
            out.push(input);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::NullAlarm;
    use crate::buffer::SourceBuffer;
    use crate::config::GlobalConfig;
    use crate::event::{EventKind, LogEvent, DEFAULT_CONTENT_KEY};
    use crate::pipeline::processor::Processor;
    use std::sync::Arc;

    fn context() -> PipelineContext {
        PipelineContext::new("cfg", 0, "proj", "store", "region", GlobalConfig::default())
            .with_alarm(Arc::new(NullAlarm))
    }

    fn group_with_line(line: &str) -> EventGroup {
        let buf = SourceBuffer::new();
        let mut group = EventGroup::new(buf);
        let mut event = LogEvent::new(0, 0, EventKind::Log);
        let view = group.intern(line);
        event.set_content(DEFAULT_CONTENT_KEY, view);
        group.push_event(event);
        group
    }

    #[test]
    fn where_stage_drops_non_matching_events() {
        let mut processor = ProcessorSpl::new("spl");
        let config = ComponentConfig::Spl(SplProcessorConfig {
            spl: "* | where content = 'value_3_0'".to_string(),
            discard_unmatch: false,
            upload_raw_log: false,
        });
        assert!(processor.init(&config, &context()));

        let mut out = Vec::new();
        processor.process(group_with_line("value_4_0"), &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].events().is_empty());
    }

    #[test]
    fn json_extract_promotes_a_nested_field() {
        let mut processor = ProcessorSpl::new("spl");
        let config = ComponentConfig::Spl(SplProcessorConfig {
            spl: r#"* | extend a1 = json_extract(content, '$.a1')"#.to_string(),
            discard_unmatch: false,
            upload_raw_log: false,
        });
        assert!(processor.init(&config, &context()));

        let mut out = Vec::new();
        processor.process(group_with_line(r#"{"a1": "bbbb"}"#), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].events()[0].get_content("a1").unwrap(), "bbbb");
    }

    #[test]
    fn let_binding_is_shared_across_emits() {
        let mut processor = ProcessorSpl::new("spl");
        let config = ComponentConfig::Spl(SplProcessorConfig {
            spl: ".let src = * | parse-json content; $src; $src | where a1 = 'bbbb'".to_string(),
            discard_unmatch: false,
            upload_raw_log: false,
        });
        assert!(processor.init(&config, &context()));

        let mut out = Vec::new();
        processor.process(group_with_line(r#"{"a1": "bbbb"}"#), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].events()[0].get_content("a1").unwrap(), "bbbb");
        assert_eq!(out[1].events().len(), 1);
    }

    #[test]
    fn init_fails_on_malformed_spl() {
        let mut processor = ProcessorSpl::new("spl");
        let config = ComponentConfig::Spl(SplProcessorConfig {
            spl: "* | frobnicate content".to_string(),
            discard_unmatch: false,
            upload_raw_log: false,
        });
        assert!(!processor.init(&config, &context()));
    }
}
