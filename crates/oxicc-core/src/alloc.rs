//! Heap accounting
//!
//! Tag payloads grow and shrink their storage through a [`Heap`], which can
//! refuse an allocation (to bound memory use on untrusted input) and keeps
//! track of live bytes and live tag instances. A heap is shared between a
//! profile and every tag it creates via `Arc<dyn Heap>`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::{Error, Result};

/// Snapshot of heap usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Bytes currently charged to the heap
    pub live_bytes: u64,
    /// Highest value `live_bytes` has reached
    pub peak_bytes: u64,
    /// Tag instances currently alive
    pub live_tags: usize,
}

/// Allocation policy and accounting
pub trait Heap: Send + Sync + std::fmt::Debug {
    /// Approve growth by `bytes`. Zero-byte requests always succeed.
    fn allocate(&self, bytes: usize) -> Result<()>;

    /// Return `bytes` previously approved. Zero is a no-op.
    fn release(&self, bytes: usize);

    fn tag_created(&self);

    fn tag_released(&self);

    fn stats(&self) -> HeapStats;
}

/// Counting heap backed by the global allocator, with an optional byte limit
#[derive(Debug, Default)]
pub struct StdHeap {
    limit: Option<u64>,
    live_bytes: AtomicU64,
    peak_bytes: AtomicU64,
    live_tags: AtomicUsize,
}

impl StdHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heap that refuses to hold more than `limit` bytes at once
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl Heap for StdHeap {
    fn allocate(&self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        let bytes = bytes as u64;
        let mut current = self.live_bytes.load(Ordering::Relaxed);
        loop {
            let next = current
                .checked_add(bytes)
                .ok_or(Error::Alloc { bytes: bytes as usize })?;
            if self.limit.is_some_and(|limit| next > limit) {
                return Err(Error::Alloc { bytes: bytes as usize });
            }
            match self.live_bytes.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.peak_bytes.fetch_max(next, Ordering::Relaxed);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let _ = self
            .live_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(bytes as u64))
            });
    }

    fn tag_created(&self) {
        self.live_tags.fetch_add(1, Ordering::Relaxed);
    }

    fn tag_released(&self) {
        let _ = self
            .live_tags
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    fn stats(&self) -> HeapStats {
        HeapStats {
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            live_tags: self.live_tags.load(Ordering::Relaxed),
        }
    }
}

/// Resize `vec` to `len` elements, charging the difference to `heap`.
///
/// New elements are default-initialized. Shrinking to zero releases the
/// storage entirely. Fails with [`Error::Alloc`] when the byte size
/// overflows, the heap refuses, or the global allocator cannot reserve.
pub fn resize_vec<T: Clone + Default>(heap: &dyn Heap, vec: &mut Vec<T>, len: usize) -> Result<()> {
    let item = std::mem::size_of::<T>().max(1);
    let old = vec.len();
    if len > old {
        let grow = (len - old)
            .checked_mul(item)
            .ok_or(Error::Alloc { bytes: usize::MAX })?;
        heap.allocate(grow)?;
        if vec.try_reserve_exact(len - old).is_err() {
            heap.release(grow);
            return Err(Error::Alloc { bytes: grow });
        }
        vec.resize(len, T::default());
    } else if len < old {
        heap.release((old - len) * item);
        vec.truncate(len);
        if len == 0 {
            *vec = Vec::new();
        } else {
            vec.shrink_to_fit();
        }
    }
    Ok(())
}

/// Release all storage held by `vec`
pub fn free_vec<T>(heap: &dyn Heap, vec: &mut Vec<T>) {
    heap.release(vec.len() * std::mem::size_of::<T>().max(1));
    *vec = Vec::new();
}
