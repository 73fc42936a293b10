#![warn(missing_docs)]

//! # shiplog-core
//!
//! The core of a log-collection agent: a historical-file importer, an
//! event-group data model with zero-copy string views, and an SPL-style
//! processor pipeline.
//!
//! shiplog-core tails pre-existing files from a known offset, carries their
//! contents through a configurable processor pipeline, and pushes the
//! resulting event groups into a backpressure-aware feedback queue. No
//! network sink, plugin ABI, or CLI front end ships here; those are
//! external collaborators this crate is designed to plug into.
//!
//! ## Quick Start
//!
//! ```
//! # use tempfile::tempdir;
//! use shiplog_core::config::{DiscoveryConfig, GlobalConfig, MultilineConfig, ReaderConfig};
//! use shiplog_core::feedback::InMemoryFeedbackQueue;
//! use shiplog_core::importer::{process_event, HistoryFileEvent};
//! use shiplog_core::ProcessProfile;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::{Arc, Mutex};
//!
//! # let dir = tempdir().unwrap();
//! std::fs::write(dir.path().join("app.log"), b"hello\nworld\n").unwrap();
//!
//! let feedback = Arc::new(InMemoryFeedbackQueue::new(64));
//! let event = HistoryFileEvent {
//!     dir_name: dir.path().to_path_buf(),
//!     file_name_pattern: "*.log".to_string(),
//!     start_offset: 0,
//!     reader_config: ReaderConfig::default(),
//!     multiline_config: MultilineConfig::default(),
//!     discovery_config: DiscoveryConfig::default(),
//!     concurrency_hint: 1,
//!     config_name: "demo".to_string(),
//!     logstore_key: 1,
//!     source_id: "src".to_string(),
//!     topic_name: "topic".to_string(),
//!     log_group_key: 1,
//!     extra_tags: vec![],
//! };
//!
//! let process_profile = Arc::new(Mutex::new(ProcessProfile::default()));
//! process_event(
//!     &event,
//!     feedback.as_ref(),
//!     &GlobalConfig::default(),
//!     &AtomicBool::new(false),
//!     &process_profile,
//! );
//! assert_eq!(feedback.len(1), 2);
//! ```
//!
//! ## Core Concepts
//!
//! - **SourceBuffer** is an append-only byte arena; every [`event::LogEvent`]
//!   content value is a [`buffer::StringView`] into one, so a batch of events
//!   shares storage without per-field copies.
//! - **EventGroup** is a batch of events plus metadata and tags, all backed
//!   by the same `SourceBuffer`.
//! - **Processors** transform one `EventGroup` into zero or more groups;
//!   [`pipeline::spl::ProcessorSpl`] applies a small filter/extract/reshape
//!   query language compiled once at `init`.
//!
//! See `DESIGN.md` in the repository root for the grounding behind each
//! module's design.

pub mod alarm;
pub mod buffer;
pub mod config;
pub mod dev_inode;
pub mod error;
pub mod event;
pub mod feedback;
pub mod importer;
pub mod pipeline;
pub mod reader;

pub use buffer::{SourceBuffer, StringView};
pub use event::{EventGroup, EventKind, LogEvent, MetaKey, OrderedMap, ReadMeta};
pub use feedback::{FeedbackQueue, InMemoryFeedbackQueue, QueuedGroup};
pub use importer::{HistoryFileEvent, HistoryFileImporter};
pub use pipeline::{PipelineContext, ProcessProfile};
pub use reader::{LogBuffer, LogFileReader, LogFileReaderParams};
