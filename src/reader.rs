//! Opens a file by `(directory, name, dev_inode)`, tracks a read cursor,
//! detects rotation/truncation via a signature window, and reads logical
//! records (single lines or regex-bounded multiline records) into a
//! [`LogBuffer`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::buffer::{SourceBuffer, StringView};
use crate::config::{DiscoveryConfig, MultilineConfig, ReaderConfig};
use crate::dev_inode::DevInode;
use crate::error::ReaderError;

/// Result of one [`LogFileReader::read_log`] call.
///
/// `raw_buffer` is `None` on end-of-file; otherwise it's a view into a
/// fresh [`SourceBuffer`] covering exactly the bytes of the logical record
/// that was read, and `read_offset`/`read_length` describe its byte range
/// in the file.
#[derive(Debug, Default)]
pub struct LogBuffer {
    pub raw_buffer: Option<StringView>,
    pub read_offset: u64,
    pub read_length: u64,
}

impl LogBuffer {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_buffer.is_none()
    }
}

struct CompiledMultiline {
    start: Option<Regex>,
    continue_pattern: Option<Regex>,
}

impl CompiledMultiline {
    fn compile(config: &MultilineConfig) -> Result<Self, ReaderError> {
        let start = config
            .start_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()?;
        let continue_pattern = config
            .continue_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()?;
        Ok(Self {
            start,
            continue_pattern,
        })
    }

    fn enabled(&self) -> bool {
        self.start.is_some()
    }
}

/// Reads a single file from a tracked offset, one logical record at a time.
pub struct LogFileReader {
    dir: PathBuf,
    name: String,
    dev_inode: DevInode,
    reader_config: ReaderConfig,
    multiline: CompiledMultiline,
    #[allow(dead_code)]
    discovery_config: DiscoveryConfig,
    /// Advisory parallelism hint. Stored but never consumed: this reader
    /// stays single-threaded per file until a concrete parallel-read design
    /// exists upstream.
    #[allow(dead_code)]
    concurrency_hint: u32,
    is_history: bool,

    current_offset: u64,
    last_signature: Option<u64>,

    logstore_key: u64,
    config_name: String,
    source_id: String,
    topic_name: String,
    log_group_key: u64,
    extra_tags: Vec<(String, String)>,
}

#[allow(clippy::too_many_arguments)]
pub struct LogFileReaderParams {
    pub dir: PathBuf,
    pub name: String,
    pub dev_inode: DevInode,
    pub reader_config: ReaderConfig,
    pub multiline_config: MultilineConfig,
    pub discovery_config: DiscoveryConfig,
    pub concurrency_hint: u32,
    pub is_history: bool,
    pub logstore_key: u64,
    pub config_name: String,
    pub source_id: String,
    pub topic_name: String,
    pub log_group_key: u64,
    pub extra_tags: Vec<(String, String)>,
}

impl LogFileReader {
    pub fn new(params: LogFileReaderParams) -> Result<Self, ReaderError> {
        let multiline = CompiledMultiline::compile(&params.multiline_config)?;
        Ok(Self {
            dir: params.dir,
            name: params.name,
            dev_inode: params.dev_inode,
            reader_config: params.reader_config,
            multiline,
            discovery_config: params.discovery_config,
            concurrency_hint: params.concurrency_hint,
            is_history: params.is_history,
            current_offset: 0,
            last_signature: None,
            logstore_key: params.logstore_key,
            config_name: params.config_name,
            source_id: params.source_id,
            topic_name: params.topic_name,
            log_group_key: params.log_group_key,
            extra_tags: params.extra_tags,
        })
    }

    fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Opens the file descriptor, verifying the path still resolves to the
    /// expected [`DevInode`]. Returns `false` (rather than an error) on any
    /// mismatch or I/O failure, matching the boolean contract used by the
    /// importer's skip-with-reason handling.
    pub fn update_file_ptr(&mut self) -> bool {
        let path = self.path();
        match crate::dev_inode::stat_dev_inode(&path) {
            Ok(actual) if actual == self.dev_inode => true,
            _ => false,
        }
    }

    /// Seeks the logical cursor. Does not touch the file descriptor until
    /// the next read.
    pub fn set_last_file_pos(&mut self, offset: u64) {
        self.current_offset = offset;
    }

    /// Reads the first `signature_window_bytes` of the file and compares
    /// their hash against the remembered fingerprint. Resets the cursor to
    /// the new window's end on truncation or signature mismatch.
    pub fn check_file_signature_and_offset(&mut self, _adjust: bool) -> Result<(), ReaderError> {
        let path = self.path();
        let mut file = File::open(&path).map_err(|source| ReaderError::Open {
            path: path.clone(),
            source,
        })?;
        let file_len = file.metadata()?.len();
        let window_len = self.reader_config.signature_window_bytes.min(file_len as usize);
        let mut window = vec![0u8; window_len];
        file.read_exact(&mut window)?;
        let signature = crate::reader::signature_hash(&window);

        let truncated = file_len < self.current_offset;
        let signature_changed = matches!(self.last_signature, Some(prev) if prev != signature);

        if truncated || signature_changed {
            self.current_offset = window_len as u64;
        }
        self.last_signature = Some(signature);
        Ok(())
    }

    /// Reads the next logical record starting at the current offset.
    ///
    /// On EOF (including a dangling partial line with no trailing newline,
    /// which may still be mid-write), `out.raw_buffer` is left `None` and
    /// the cursor is not advanced past the incomplete data.
    pub fn read_log(&mut self, out: &mut LogBuffer) -> io::Result<()> {
        *out = LogBuffer::empty();

        let path = self.path();
        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(self.current_offset))?;
        let mut reader = BufReader::new(&mut file);

        let lines = if self.multiline.enabled() {
            self.read_multiline_record(&mut reader)?
        } else {
            self.read_single_line(&mut reader)?
        };

        let Some(lines) = lines else {
            return Ok(());
        };

        let record_len: u64 = lines.iter().map(|l| l.len() as u64).sum();
        let joined = lines.join("");
        let trimmed = joined.trim_end_matches(['\n', '\r']);

        let buffer = SourceBuffer::new();
        let view = buffer.intern(trimmed);

        out.read_offset = self.current_offset;
        out.read_length = record_len;
        out.raw_buffer = Some(view);

        self.current_offset += record_len;
        Ok(())
    }

    /// Reads one complete, newline-terminated line. A trailing line with no
    /// newline is treated as not-yet-available (returns `None`).
    fn read_single_line<R: BufRead>(&self, reader: &mut R) -> io::Result<Option<Vec<String>>> {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 || !line.ends_with('\n') {
            return Ok(None);
        }
        Ok(Some(vec![line]))
    }

    /// Assembles one multiline record: a line matching `start_pattern`
    /// followed by zero or more continuation lines (lines that don't start
    /// a new record, optionally constrained to also match
    /// `continue_pattern`). Stops before a partial trailing line.
    fn read_multiline_record<R: BufRead>(
        &self,
        reader: &mut R,
    ) -> io::Result<Option<Vec<String>>> {
        let start_re = self.multiline.start.as_ref().expect("multiline enabled");

        let mut first = String::new();
        let n = reader.read_line(&mut first)?;
        if n == 0 || !first.ends_with('\n') {
            return Ok(None);
        }
        let mut lines = vec![first];

        loop {
            let mut probe = String::new();
            let n = reader.read_line(&mut probe)?;
            if n == 0 {
                break;
            }
            if !probe.ends_with('\n') {
                // Partial line: not part of this record, and not yet
                // available as the start of the next one either.
                break;
            }
            if start_re.is_match(&probe) {
                // Start of the next record; this reader call only returns
                // the record already assembled. The next read_log() call
                // re-reads from the same offset (we never advance past
                // `lines`), so nothing is lost.
                break;
            }
            if let Some(continue_re) = &self.multiline.continue_pattern {
                if !continue_re.is_match(&probe) {
                    break;
                }
            }
            lines.push(probe);
        }

        Ok(Some(lines))
    }

    pub fn logstore_key(&self) -> u64 {
        self.logstore_key
    }

    pub fn converted_path(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    pub fn host_log_path(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    pub fn dev_inode(&self) -> DevInode {
        self.dev_inode
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn log_group_key(&self) -> u64 {
        self.log_group_key
    }

    pub fn extra_tags(&self) -> &[(String, String)] {
        &self.extra_tags
    }

    pub fn get_last_file_pos(&self) -> u64 {
        self.current_offset
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn is_history(&self) -> bool {
        self.is_history
    }
}

/// The fingerprint primitive behind `CheckFileSignatureAndOffset`: the
/// `xxh64` hash of the signature window, giving O(1) comparison without
/// storing a byte-for-byte copy of it.
pub fn signature_hash(window: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(window, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_reader(dir: &Path, name: &str, multiline: MultilineConfig) -> LogFileReader {
        let path = dir.join(name);
        let dev_inode = crate::dev_inode::stat_dev_inode(&path).unwrap();
        LogFileReader::new(LogFileReaderParams {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            dev_inode,
            reader_config: ReaderConfig::default(),
            multiline_config: multiline,
            discovery_config: DiscoveryConfig::default(),
            concurrency_hint: 1,
            is_history: true,
            logstore_key: 42,
            config_name: "test-config".to_string(),
            source_id: "src-1".to_string(),
            topic_name: "topic".to_string(),
            log_group_key: 7,
            extra_tags: vec![("env".to_string(), "prod".to_string())],
        })
        .unwrap()
    }

    #[test]
    fn reads_lines_one_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"line one\nline two\n").unwrap();

        let mut reader = make_reader(dir.path(), "a.log", MultilineConfig::default());
        assert!(reader.update_file_ptr());
        reader.check_file_signature_and_offset(false).unwrap();

        let mut buf = LogBuffer::empty();
        reader.read_log(&mut buf).unwrap();
        assert_eq!(buf.raw_buffer.unwrap().resolve(), "line one");
        assert_eq!(buf.read_offset, 0);

        let mut buf = LogBuffer::empty();
        reader.read_log(&mut buf).unwrap();
        assert_eq!(buf.raw_buffer.unwrap().resolve(), "line two");

        let mut buf = LogBuffer::empty();
        reader.read_log(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_trailing_line_is_not_emitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"complete\npartial-no-newline").unwrap();

        let mut reader = make_reader(dir.path(), "a.log", MultilineConfig::default());
        reader.update_file_ptr();
        reader.check_file_signature_and_offset(false).unwrap();

        let mut buf = LogBuffer::empty();
        reader.read_log(&mut buf).unwrap();
        assert_eq!(buf.raw_buffer.unwrap().resolve(), "complete");

        let mut buf = LogBuffer::empty();
        reader.read_log(&mut buf).unwrap();
        assert!(buf.is_empty());
        assert_eq!(reader.get_last_file_pos(), "complete\n".len() as u64);
    }

    #[test]
    fn multiline_groups_continuation_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(
            &path,
            b"2024-01-01 start\n  continuation one\n  continuation two\n2024-01-02 next\n",
        )
        .unwrap();

        let multiline = MultilineConfig {
            start_pattern: Some(r"^\d{4}-\d{2}-\d{2}".to_string()),
            continue_pattern: None,
        };
        let mut reader = make_reader(dir.path(), "a.log", multiline);
        reader.update_file_ptr();
        reader.check_file_signature_and_offset(false).unwrap();

        let mut buf = LogBuffer::empty();
        reader.read_log(&mut buf).unwrap();
        let text = buf.raw_buffer.unwrap().resolve();
        assert!(text.starts_with("2024-01-01 start"));
        assert!(text.contains("continuation one"));
        assert!(text.contains("continuation two"));

        let mut buf = LogBuffer::empty();
        reader.read_log(&mut buf).unwrap();
        assert_eq!(buf.raw_buffer.unwrap().resolve(), "2024-01-02 next");
    }

    #[test]
    fn signature_reset_on_truncate_and_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, b"aaaaaaaaaa\n").unwrap();

        let mut reader = make_reader(dir.path(), "a.log", MultilineConfig::default());
        reader.update_file_ptr();
        reader.check_file_signature_and_offset(false).unwrap();
        // Simulate a stale cursor left over from before the rewrite below.
        reader.set_last_file_pos(0);

        // Truncate-and-rewrite with different content: same length window
        // but different bytes, so the signature hash changes.
        {
            let mut f = std::fs::OpenOptions::new().write(true).truncate(true).open(&path).unwrap();
            f.write_all(b"bbbbbbbbbb\n").unwrap();
        }
        reader.check_file_signature_and_offset(false).unwrap();
        assert_eq!(reader.get_last_file_pos(), 11);
    }
}
