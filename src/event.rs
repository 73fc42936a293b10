//! The event and event-group data model.

use std::collections::HashMap;

use crate::buffer::{SourceBuffer, StringView};

/// The content key an ingested raw line is stored under before any
/// processor stage adds further fields.
pub const DEFAULT_CONTENT_KEY: &str = "content";

/// Variant tag identifying what kind of event a [`LogEvent`] carries. This
/// crate only produces the `Log` variant; `Metric`/`Span` are carried for
/// forward compatibility with the wider pipeline this core is part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Log,
    Metric,
    Span,
}

/// Position of an event's content within the source file it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadMeta {
    pub read_offset: u64,
    pub read_length: u64,
}

/// An insertion-order-preserving string-keyed map.
///
/// Small content maps (a handful of fields per event) don't benefit from a
/// hash map's O(1) lookup enough to be worth losing iteration order, and
/// output ordering is an explicit invariant, so this is a flat `Vec`
/// scanned linearly.
#[derive(Debug, Clone, Default)]
pub struct OrderedMap {
    entries: Vec<(String, StringView)>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`, preserving its original position on
    /// overwrite.
    pub fn insert(&mut self, key: impl Into<String>, value: StringView) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&StringView> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<StringView> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StringView)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A single log event: a timestamp, an ordered set of content fields, and
/// its position in the file it was read from.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: i64,
    pub timestamp_ns: u32,
    pub kind: EventKind,
    pub meta: ReadMeta,
    content: OrderedMap,
}

impl LogEvent {
    pub fn new(timestamp: i64, timestamp_ns: u32, kind: EventKind) -> Self {
        Self {
            timestamp,
            timestamp_ns,
            kind,
            meta: ReadMeta::default(),
            content: OrderedMap::new(),
        }
    }

    pub fn set_content(&mut self, key: impl Into<String>, value: StringView) {
        self.content.insert(key, value);
    }

    pub fn content(&self) -> &OrderedMap {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut OrderedMap {
        &mut self.content
    }

    pub fn get_content(&self, key: &str) -> Option<String> {
        self.content.get(key).map(|v| v.resolve())
    }
}

/// The closed set of metadata keys an [`EventGroup`] may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    LogFilePath,
    LogFilePathResolved,
    LogFileInode,
    SourceId,
    Topic,
    LogGroupKey,
}

/// A batch of events sharing one [`SourceBuffer`], metadata, and tags.
#[derive(Debug, Clone)]
pub struct EventGroup {
    buffer: SourceBuffer,
    events: Vec<LogEvent>,
    metadata: HashMap<MetaKey, StringView>,
    tags: HashMap<String, StringView>,
}

impl EventGroup {
    pub fn new(buffer: SourceBuffer) -> Self {
        Self {
            buffer,
            events: Vec::new(),
            metadata: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    /// Interns `s` into this group's shared buffer, producing a view that
    /// upholds the "every view points into its own group's buffer"
    /// invariant.
    pub fn intern(&self, s: &str) -> StringView {
        self.buffer.intern(s)
    }

    pub fn buffer(&self) -> &SourceBuffer {
        &self.buffer
    }

    pub fn push_event(&mut self, event: LogEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut Vec<LogEvent> {
        &mut self.events
    }

    pub fn into_events(self) -> Vec<LogEvent> {
        self.events
    }

    pub fn set_metadata(&mut self, key: MetaKey, value: StringView) {
        self.metadata.insert(key, value);
    }

    pub fn metadata(&self, key: MetaKey) -> Option<&StringView> {
        self.metadata.get(&key)
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: StringView) {
        self.tags.insert(key.into(), value);
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<StringView> {
        self.tags.remove(key)
    }

    pub fn tags(&self) -> &HashMap<String, StringView> {
        &self.tags
    }

    /// A group with the same buffer, metadata, and tags as `self`, but no
    /// events. Used by stages that rebuild the event list (`where`, parse
    /// stages that may drop events).
    pub fn fork_empty(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            events: Vec::new(),
            metadata: self.metadata.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Whether every [`StringView`] held by this group (events, metadata,
    /// tags) points into the group's own buffer. Exercised directly by
    /// tests for the invariant; never called on the hot path.
    pub fn views_share_buffer(&self) -> bool {
        let buffer = &self.buffer;
        self.metadata.values().all(|v| v.shares_arena_with(buffer))
            && self.tags.values().all(|v| v.shares_arena_with(buffer))
            && self.events.iter().all(|e| {
                e.content()
                    .iter()
                    .all(|(_, v)| v.shares_arena_with(buffer))
            })
    }
}
