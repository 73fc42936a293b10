//! The processor plugin contract.

use crate::event::EventGroup;
use crate::pipeline::spl::SplProcessorConfig;
use crate::pipeline::PipelineContext;

/// Configuration handed to [`Processor::init`]. A closed enum rather than a
/// trait object: this core ships exactly one processor kind (`ProcessorSPL`)
/// and keeps `Processor` object-safe without an associated config type.
pub enum ComponentConfig {
    Spl(SplProcessorConfig),
}

/// A pipeline stage that transforms event groups.
pub trait Processor: Send {
    /// One-time compilation/validation against `config`. `false` fails
    /// pipeline startup.
    fn init(&mut self, config: &ComponentConfig, context: &PipelineContext) -> bool;

    /// Transforms `input` into zero or more groups appended to `out`. Must
    /// not block on I/O.
    fn process(&mut self, input: EventGroup, out: &mut Vec<EventGroup>);

    /// Stable identifier, used in logs and alarms.
    fn name(&self) -> &str;
}
