//! Bump-pointer byte arena for short-lived name buffers.
//!
//! Directory enumeration produces a burst of small byte strings (dirent
//! names, UTF-16 conversions) that live only until the keep/skip decision
//! for the entry is made. Allocating each one on the heap churns the
//! allocator for nothing; instead every worker owns one `ByteArena`,
//! stages names in it, and rewinds it with [`ByteArena::reset`] once per
//! directory.
//!
//! Not safe for concurrent use — one arena per worker, never shared.

use crate::error::ArenaError;

/// A bump allocator over a single contiguous byte buffer.
pub struct ByteArena {
    layout: Vec<u8>,
    offset: usize,
    dynamic: bool,
}

impl ByteArena {
    /// Create an arena with `capacity` bytes. In `dynamic` mode the buffer
    /// doubles when an allocation does not fit; otherwise the allocation
    /// fails with [`ArenaError`].
    pub fn new(capacity: usize, dynamic: bool) -> Self {
        Self {
            layout: vec![0; capacity],
            offset: 0,
            dynamic,
        }
    }

    /// Allocate `size` bytes and return the zero-initialised slice.
    ///
    /// The slice borrows the arena, so only one allocation can be held at
    /// a time; copy the result out (or finish with it) before allocating
    /// again.
    pub fn alloc(&mut self, size: usize) -> Result<&mut [u8], ArenaError> {
        if self.offset + size > self.layout.len() {
            if !self.dynamic {
                return Err(ArenaError {
                    requested: size,
                    remaining: self.layout.len() - self.offset,
                });
            }

            let mut capacity = self.layout.len().max(1);
            while capacity < self.offset + size {
                capacity *= 2;
            }

            self.layout.resize(capacity, 0);
        }

        let start = self.offset;
        self.offset += size;

        Ok(&mut self.layout[start..start + size])
    }

    /// Rewind the offset without releasing memory. Previously returned
    /// slices must no longer be referenced (the borrow checker enforces
    /// this — `reset` takes `&mut self`).
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Bytes currently in use.
    pub fn used(&self) -> usize {
        self.offset
    }

    /// Current buffer capacity.
    pub fn capacity(&self) -> usize {
        self.layout.len()
    }
}
