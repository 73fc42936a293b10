use proptest::prelude::*;
use shiplog_core::config::{DiscoveryConfig, MultilineConfig, ReaderConfig};
use shiplog_core::dev_inode::stat_dev_inode;
use shiplog_core::reader::{LogBuffer, LogFileReader, LogFileReaderParams};
use shiplog_core::{EventGroup, SourceBuffer};
use tempfile::tempdir;

fn arb_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,40}".prop_map(|s| s)
}

fn arb_lines() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_line(), 0..30)
}

fn open_reader(dir: &std::path::Path, name: &str) -> LogFileReader {
    let path = dir.join(name);
    let dev_inode = stat_dev_inode(&path).unwrap();
    LogFileReader::new(LogFileReaderParams {
        dir: dir.to_path_buf(),
        name: name.to_string(),
        dev_inode,
        reader_config: ReaderConfig {
            signature_window_bytes: 0,
        },
        multiline_config: MultilineConfig::default(),
        discovery_config: DiscoveryConfig::default(),
        concurrency_hint: 1,
        is_history: true,
        logstore_key: 1,
        config_name: "props".to_string(),
        source_id: "src".to_string(),
        topic_name: "topic".to_string(),
        log_group_key: 1,
        extra_tags: vec![],
    })
    .unwrap()
}

// For any sequence of lines written to a file, reading them back one record
// at a time never moves the cursor backwards, reconstructs every line
// exactly, and the sum of read_length across records equals the file length.
proptest! {
    #[test]
    fn read_log_reconstructs_lines_with_monotonic_offsets(lines in arb_lines()) {
        let dir = tempdir().unwrap();
        let contents: String = lines.iter().map(|l| format!("{l}\n")).collect();
        std::fs::write(dir.path().join("a.log"), contents.as_bytes()).unwrap();

        let mut reader = open_reader(dir.path(), "a.log");

        let mut last_offset = 0u64;
        let mut total_read_length = 0u64;
        let mut reconstructed = Vec::new();
        loop {
            let mut buf = LogBuffer::empty();
            reader.read_log(&mut buf).unwrap();
            let Some(view) = buf.raw_buffer else { break };
            prop_assert!(buf.read_offset >= last_offset);
            last_offset = buf.read_offset;
            total_read_length += buf.read_length;
            reconstructed.push(view.resolve());
        }

        prop_assert_eq!(&reconstructed, &lines);
        prop_assert_eq!(total_read_length, contents.len() as u64);
    }
}

fn arb_tag_values() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z0-9]{0,20}", 0..10)
}

// Every view interned into an EventGroup's buffer and attached as a tag
// shares that group's arena, regardless of how many strings are interned.
proptest! {
    #[test]
    fn every_interned_view_shares_its_groups_buffer(values in arb_tag_values()) {
        let mut group = EventGroup::new(SourceBuffer::new());
        for (i, value) in values.iter().enumerate() {
            let view = group.intern(value);
            group.set_tag(format!("tag-{i}"), view);
        }

        prop_assert!(group.views_share_buffer());
    }
}
