//! The shared, append-only byte arena that backs zero-copy content views.
//!
//! Every [`LogEvent`](crate::event::LogEvent) content value and every group
//! metadata/tag value is a [`StringView`] into some [`SourceBuffer`]. A
//! `SourceBuffer` is cheap to clone (it's a reference-counted handle), so an
//! `EventGroup` and every event inside it can share one arena without copying
//! bytes per field.

use std::sync::{Arc, Mutex};

struct Inner {
    data: Mutex<Vec<u8>>,
}

/// A reference-counted, append-only byte arena.
///
/// Cloning a `SourceBuffer` bumps a reference count; it does not copy the
/// underlying bytes. Appending never invalidates a previously issued
/// [`StringView`]: offsets into the arena stay valid across growth because
/// the view carries an offset/length pair rather than a raw pointer.
#[derive(Clone)]
pub struct SourceBuffer(Arc<Inner>);

impl SourceBuffer {
    /// Creates a fresh, empty arena.
    pub fn new() -> Self {
        SourceBuffer(Arc::new(Inner {
            data: Mutex::new(Vec::new()),
        }))
    }

    /// Appends `bytes` to the arena and returns a view over exactly those
    /// bytes.
    pub fn append(&self, bytes: &[u8]) -> StringView {
        let mut data = self.0.data.lock().expect("source buffer mutex poisoned");
        let offset = data.len();
        data.extend_from_slice(bytes);
        StringView {
            buffer: self.clone(),
            offset,
            len: bytes.len(),
        }
    }

    /// Appends a `&str` to the arena and returns a view over it.
    pub fn intern(&self, s: &str) -> StringView {
        self.append(s.as_bytes())
    }

    /// Number of bytes currently stored in the arena.
    pub fn len(&self) -> usize {
        self.0.data.lock().expect("source buffer mutex poisoned").len()
    }

    /// Whether the arena has never been appended to.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SourceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// A stable byte range inside a [`SourceBuffer`].
///
/// Conceptually `{ptr, len}`; represented here as `(Arc<SourceBuffer>,
/// offset, len)` so the borrow checker, not a manual lifetime audit,
/// proves a view cannot outlive its arena.
#[derive(Clone)]
pub struct StringView {
    buffer: SourceBuffer,
    offset: usize,
    len: usize,
}

impl StringView {
    /// Materializes the bytes this view covers as an owned, UTF-8 lossy
    /// string.
    ///
    /// This is the one place a copy happens: the arena holds bytes behind a
    /// mutex so it stays growable for the lifetime of the owning
    /// [`EventGroup`](crate::event::EventGroup) (processors keep interning
    /// new derived fields into it), which rules out handing back a borrowed
    /// `&str` without `unsafe`.
    pub fn resolve(&self) -> String {
        let data = self.buffer.0.data.lock().expect("source buffer mutex poisoned");
        String::from_utf8_lossy(&data[self.offset..self.offset + self.len]).into_owned()
    }

    /// Number of bytes this view covers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this view covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The arena this view points into.
    pub fn buffer(&self) -> &SourceBuffer {
        &self.buffer
    }

    /// Whether this view and `other` point into the same arena.
    pub fn shares_arena_with(&self, other: &SourceBuffer) -> bool {
        Arc::ptr_eq(&self.buffer.0, &other.0)
    }
}

impl std::fmt::Debug for StringView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringView")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("value", &self.resolve())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_round_trips() {
        let buf = SourceBuffer::new();
        let view = buf.intern("hello");
        assert_eq!(view.resolve(), "hello");
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn views_share_one_arena() {
        let buf = SourceBuffer::new();
        let a = buf.intern("abc");
        let b = buf.intern("def");
        assert!(a.shares_arena_with(&buf));
        assert!(b.shares_arena_with(&buf));
        assert_eq!(a.resolve(), "abc");
        assert_eq!(b.resolve(), "def");
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn view_survives_further_growth() {
        let buf = SourceBuffer::new();
        let first = buf.intern("first");
        for i in 0..100 {
            buf.intern(&format!("padding-{i}"));
        }
        assert_eq!(first.resolve(), "first");
    }

    #[test]
    fn cloning_buffer_keeps_same_arena() {
        let buf = SourceBuffer::new();
        let clone = buf.clone();
        let view = buf.intern("shared");
        assert!(view.shares_arena_with(&clone));
    }
}
