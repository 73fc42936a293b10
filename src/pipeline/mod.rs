//! Per-pipeline runtime context: identifiers, globals, profile counters, and
//! alarm handle.

pub mod processor;
pub mod spl;

use std::sync::{Arc, Mutex};

use crate::alarm::{Alarm, AlarmCategory, NullAlarm};
use crate::config::GlobalConfig;

/// Counters reset between flush windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessProfile {
    pub read_bytes: u64,
    pub skip_bytes: u64,
    pub feed_lines: u64,
    pub split_lines: u64,
    pub parse_failures: u64,
    pub regex_match_failures: u64,
    pub parse_time_failures: u64,
    pub history_failures: u64,
    pub log_group_size: u64,
}

impl ProcessProfile {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-pipeline runtime context. Not `Clone`/`Copy`: components are handed
/// `&PipelineContext` at `Init` and must not retain it past pipeline
/// teardown. `ProcessProfile` and the alarm handle are exposed as
/// cloneable `Arc`s so a `Processor` can keep using them across `Process`
/// calls without holding the context itself.
pub struct PipelineContext {
    config_name: String,
    create_time: u64,
    project: String,
    logstore: String,
    region: String,
    global_config: GlobalConfig,
    first_processor_is_json: bool,
    process_profile: Arc<Mutex<ProcessProfile>>,
    alarm: Arc<dyn Alarm>,
}

impl PipelineContext {
    pub fn new(
        config_name: impl Into<String>,
        create_time: u64,
        project: impl Into<String>,
        logstore: impl Into<String>,
        region: impl Into<String>,
        global_config: GlobalConfig,
    ) -> Self {
        Self {
            config_name: config_name.into(),
            create_time,
            project: project.into(),
            logstore: logstore.into(),
            region: region.into(),
            global_config,
            first_processor_is_json: false,
            process_profile: Arc::new(Mutex::new(ProcessProfile::default())),
            alarm: Arc::new(NullAlarm),
        }
    }

    pub fn with_alarm(mut self, alarm: Arc<dyn Alarm>) -> Self {
        self.alarm = alarm;
        self
    }

    pub fn set_first_processor_is_json(&mut self, value: bool) {
        self.first_processor_is_json = value;
    }

    pub fn first_processor_is_json(&self) -> bool {
        self.first_processor_is_json
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn create_time(&self) -> u64 {
        self.create_time
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn logstore(&self) -> &str {
        &self.logstore
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.global_config
    }

    /// Combines `project + logstore + region` into a stable 64-bit key used
    /// as the feedback destination key.
    pub fn logstore_key(&self) -> u64 {
        let composite = format!("{}#{}#{}", self.project, self.logstore, self.region);
        xxhash_rust::xxh64::xxh64(composite.as_bytes(), 0)
    }

    pub fn process_profile_handle(&self) -> Arc<Mutex<ProcessProfile>> {
        Arc::clone(&self.process_profile)
    }

    pub fn alarm_handle(&self) -> Arc<dyn Alarm> {
        Arc::clone(&self.alarm)
    }

    pub fn raise_alarm(&self, category: AlarmCategory, message: &str) {
        self.alarm.alarm(&self.project, &self.logstore, category, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logstore_key_is_stable_for_same_identifiers() {
        let ctx_a = PipelineContext::new("c", 0, "proj", "store", "region", GlobalConfig::default());
        let ctx_b = PipelineContext::new("c2", 99, "proj", "store", "region", GlobalConfig::default());
        assert_eq!(ctx_a.logstore_key(), ctx_b.logstore_key());
    }

    #[test]
    fn logstore_key_differs_for_different_logstore() {
        let ctx_a = PipelineContext::new("c", 0, "proj", "store-a", "region", GlobalConfig::default());
        let ctx_b = PipelineContext::new("c", 0, "proj", "store-b", "region", GlobalConfig::default());
        assert_ne!(ctx_a.logstore_key(), ctx_b.logstore_key());
    }
}
