//! The external alarm-delivery collaborator, represented as a thin trait so
//! [`crate::pipeline::PipelineContext`] can hold a handle without this crate
//! owning a full alarm subsystem.

/// The kind of condition an [`Alarm`] is raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCategory {
    ReaderOpenFailure,
    SignatureMismatch,
    ProcessorInitFailure,
    HistoryImportFailure,
    Backpressure,
}

impl AlarmCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmCategory::ReaderOpenFailure => "READER_OPEN_FAILURE",
            AlarmCategory::SignatureMismatch => "SIGNATURE_MISMATCH",
            AlarmCategory::ProcessorInitFailure => "PROCESSOR_INIT_FAILURE",
            AlarmCategory::HistoryImportFailure => "HISTORY_IMPORT_FAILURE",
            AlarmCategory::Backpressure => "BACKPRESSURE",
        }
    }
}

/// User-visible critical-error reporting, keyed by `(project, logstore,
/// category)`.
pub trait Alarm: Send + Sync {
    fn alarm(&self, project: &str, logstore: &str, category: AlarmCategory, message: &str);
}

/// Discards every alarm. Useful for tests and for embedders that surface
/// alarms some other way.
pub struct NullAlarm;

impl Alarm for NullAlarm {
    fn alarm(&self, _project: &str, _logstore: &str, _category: AlarmCategory, _message: &str) {}
}

/// Routes alarms through the `log` facade at `error` level.
pub struct LoggingAlarm;

impl Alarm for LoggingAlarm {
    fn alarm(&self, project: &str, logstore: &str, category: AlarmCategory, message: &str) {
        log::error!(
            "alarm project={project} logstore={logstore} category={} message={message}",
            category.as_str()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_alarm_does_not_panic() {
        let alarm = NullAlarm;
        alarm.alarm("p", "l", AlarmCategory::Backpressure, "ignored");
    }
}
