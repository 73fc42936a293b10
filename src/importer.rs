//! The background history-file importer: a single worker thread that drains
//! an MPSC inbox of [`HistoryFileEvent`]s and drives
//! reader → event group → feedback queue for each matching file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::buffer::StringView;
use crate::config::{DiscoveryConfig, GlobalConfig, MultilineConfig, ReaderConfig};
use crate::dev_inode::stat_dev_inode;
use crate::error::ImporterError;
use crate::event::{EventGroup, EventKind, LogEvent, MetaKey, DEFAULT_CONTENT_KEY};
use crate::feedback::FeedbackQueue;
use crate::pipeline::ProcessProfile;
use crate::reader::{LogBuffer, LogFileReader, LogFileReaderParams};

/// Cooperative backpressure poll interval.
const BACKPRESSURE_POLL: Duration = Duration::from_millis(10);
/// Long push timeout so history import yields rather than loses data.
const PUSH_TIMEOUT: Duration = Duration::from_secs(100_000);

fn bump_history_failures(process_profile: &Arc<Mutex<ProcessProfile>>) {
    let mut profile = process_profile
        .lock()
        .expect("process profile mutex poisoned");
    profile.history_failures += 1;
}

/// A request to import the backlog of one or more files.
#[derive(Debug, Clone)]
pub struct HistoryFileEvent {
    pub dir_name: PathBuf,
    pub file_name_pattern: String,
    pub start_offset: u64,
    pub reader_config: ReaderConfig,
    pub multiline_config: MultilineConfig,
    pub discovery_config: DiscoveryConfig,
    pub concurrency_hint: u32,
    pub config_name: String,
    pub logstore_key: u64,
    pub source_id: String,
    pub topic_name: String,
    pub log_group_key: u64,
    pub extra_tags: Vec<(String, String)>,
}

enum InboxMessage {
    Event(HistoryFileEvent),
    Stop,
}

/// Opens `<process_dir>/history_file_checkpoint` if present and does nothing
/// else. Mirrors `HistoryFileImporter::LoadCheckPoint` in the original
/// source; absence of the file is not an error.
pub fn load_checkpoint(process_dir: &std::path::Path) -> std::io::Result<Option<()>> {
    let path = process_dir.join("history_file_checkpoint");
    match std::fs::File::open(&path) {
        Ok(_) => Ok(Some(())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Enumerates files in `dir_name` matching `file_name_pattern`, honoring
/// `discovery_config.recursive`, sorted ascending for deterministic
/// progress logging.
pub fn enumerate_files(
    dir_name: &std::path::Path,
    file_name_pattern: &str,
    discovery_config: &DiscoveryConfig,
) -> Result<Vec<PathBuf>, ImporterError> {
    let pattern = if discovery_config.recursive {
        dir_name.join("**").join(file_name_pattern)
    } else {
        dir_name.join(file_name_pattern)
    };
    let pattern_str = pattern.to_string_lossy().into_owned();
    let mut matches: Vec<PathBuf> = glob::glob(&pattern_str)
        .map_err(|source| ImporterError::Pattern {
            pattern: pattern_str.clone(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    matches.sort();
    Ok(matches)
}

fn adjusted_timestamp(global_config: &GlobalConfig) -> (i64, u32) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let mut secs = now.as_secs() as i64;
    if global_config.enable_log_time_auto_adjust {
        secs += global_config.time_delta_secs;
    }
    (secs, now.subsec_nanos())
}

/// Builds the single-event `EventGroup` pushed for one `ReadLog` call,
/// attaching metadata/tags from the reader's accessors.
fn build_event_group(
    reader: &LogFileReader,
    buf: LogBuffer,
    global_config: &GlobalConfig,
) -> EventGroup {
    let raw = buf
        .raw_buffer
        .expect("build_event_group called only for non-empty reads");
    let group_buffer = raw.buffer().clone();
    let mut group = EventGroup::new(group_buffer);

    group.set_metadata(MetaKey::LogFilePath, group.intern(&reader.host_log_path()));
    group.set_metadata(
        MetaKey::LogFilePathResolved,
        group.intern(&reader.converted_path()),
    );
    let dev_inode = reader.dev_inode();
    group.set_metadata(
        MetaKey::LogFileInode,
        group.intern(&dev_inode.inode.to_string()),
    );
    group.set_metadata(MetaKey::SourceId, group.intern(reader.source_id()));
    group.set_metadata(MetaKey::Topic, group.intern(reader.topic_name()));
    group.set_metadata(
        MetaKey::LogGroupKey,
        group.intern(&reader.log_group_key().to_string()),
    );

    for (key, value) in reader.extra_tags() {
        let view = group.intern(value);
        group.set_tag(key.clone(), view);
    }

    let (timestamp, timestamp_ns) = adjusted_timestamp(global_config);
    let mut event = LogEvent::new(timestamp, timestamp_ns, EventKind::Log);
    event.meta.read_offset = buf.read_offset;
    event.meta.read_length = buf.read_length;
    let content_view: StringView = raw;
    event.set_content(DEFAULT_CONTENT_KEY, content_view);
    group.push_event(event);
    group
}

/// Drives the per-file read loop: poll backpressure, read one logical
/// record, push it, and stop after two consecutive empty reads.
fn drain_file(
    reader: &mut LogFileReader,
    feedback: &dyn FeedbackQueue,
    global_config: &GlobalConfig,
    stop_token: &AtomicBool,
    process_profile: &Arc<Mutex<ProcessProfile>>,
) {
    let mut seen_empty = false;
    loop {
        if stop_token.load(Ordering::Relaxed) {
            return;
        }
        while !feedback.is_valid_to_read_log(reader.logstore_key()) {
            if stop_token.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(BACKPRESSURE_POLL);
        }

        let mut buf = LogBuffer::empty();
        if reader.read_log(&mut buf).is_err() {
            log::warn!(
                "read error on {}, finalizing file",
                reader.converted_path()
            );
            bump_history_failures(process_profile);
            return;
        }

        if buf.is_empty() {
            if seen_empty {
                break;
            }
            seen_empty = true;
            continue;
        }
        seen_empty = false;

        let group = build_event_group(reader, buf, global_config);
        feedback.push_buffer(
            reader.logstore_key(),
            reader.config_name(),
            0,
            group,
            PUSH_TIMEOUT,
        );
    }
}

/// Processes one `HistoryFileEvent`: enumerates matching files and drains
/// each in turn.
pub fn process_event(
    event: &HistoryFileEvent,
    feedback: &dyn FeedbackQueue,
    global_config: &GlobalConfig,
    stop_token: &AtomicBool,
    process_profile: &Arc<Mutex<ProcessProfile>>,
) {
    let files = match enumerate_files(
        &event.dir_name,
        &event.file_name_pattern,
        &event.discovery_config,
    ) {
        Ok(files) => files,
        Err(err) => {
            log::warn!("failed to enumerate files for history event: {err}");
            return;
        }
    };
    let total = files.len();

    for (index, path) in files.into_iter().enumerate() {
        if stop_token.load(Ordering::Relaxed) {
            return;
        }
        let start = Instant::now();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let dir = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| event.dir_name.clone());

        let dev_inode = match stat_dev_inode(&path) {
            Ok(di) if di.is_valid() => di,
            _ => {
                log::warn!("skipping {}: invalid dev/inode", path.display());
                continue;
            }
        };

        let mut reader = match LogFileReader::new(LogFileReaderParams {
            dir,
            name,
            dev_inode,
            reader_config: event.reader_config.clone(),
            multiline_config: event.multiline_config.clone(),
            discovery_config: event.discovery_config.clone(),
            concurrency_hint: event.concurrency_hint,
            is_history: true,
            logstore_key: event.logstore_key,
            config_name: event.config_name.clone(),
            source_id: event.source_id.clone(),
            topic_name: event.topic_name.clone(),
            log_group_key: event.log_group_key,
            extra_tags: event.extra_tags.clone(),
        }) {
            Ok(reader) => reader,
            Err(err) => {
                log::warn!("skipping {}: {err}", path.display());
                bump_history_failures(process_profile);
                continue;
            }
        };

        if !reader.update_file_ptr() {
            log::warn!("skipping {}: path no longer matches dev/inode", path.display());
            continue;
        }
        reader.set_last_file_pos(event.start_offset);
        if let Err(err) = reader.check_file_signature_and_offset(false) {
            log::warn!("skipping {}: {err}", path.display());
            continue;
        }

        drain_file(&mut reader, feedback, global_config, stop_token, process_profile);

        log::info!(
            "[{}/{}] done file={} offset={} time(ms)={}",
            index + 1,
            total,
            reader.converted_path(),
            reader.get_last_file_pos(),
            start.elapsed().as_millis()
        );
    }
}

fn run_worker(
    inbox: Receiver<InboxMessage>,
    feedback: Arc<dyn FeedbackQueue>,
    global_config: GlobalConfig,
    stop_token: Arc<AtomicBool>,
    process_profile: Arc<Mutex<ProcessProfile>>,
) {
    loop {
        let message = match inbox.recv() {
            Ok(message) => message,
            Err(_) => return,
        };
        match message {
            InboxMessage::Stop => return,
            InboxMessage::Event(event) => {
                process_event(
                    &event,
                    feedback.as_ref(),
                    &global_config,
                    &stop_token,
                    &process_profile,
                );
            }
        }
    }
}

/// The single background worker that drains history-import requests.
/// `push_event` never blocks; the inbox is unbounded.
pub struct HistoryFileImporter {
    sender: Sender<InboxMessage>,
    stop_token: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HistoryFileImporter {
    pub fn spawn(
        feedback: Arc<dyn FeedbackQueue>,
        global_config: GlobalConfig,
        process_profile: Arc<Mutex<ProcessProfile>>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let stop_token = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop_token);
        let handle = std::thread::spawn(move || {
            run_worker(receiver, feedback, global_config, worker_stop, process_profile);
        });
        Self {
            sender,
            stop_token,
            handle: Some(handle),
        }
    }

    pub fn push_event(&self, event: HistoryFileEvent) {
        let _ = self.sender.send(InboxMessage::Event(event));
    }

    /// Signals the stop token and sends the sentinel, then joins the worker
    /// thread.
    pub fn stop(&mut self) {
        self.stop_token.store(true, Ordering::Relaxed);
        let _ = self.sender.send(InboxMessage::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HistoryFileImporter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}
