//! Tag objects
//!
//! A [`Tag`] wraps one [`TagData`] payload together with its bookkeeping:
//! the signature it was created for, whether it came from a file, whether
//! it has been modified, and the heap its storage is charged to. Tags are
//! shared through [`TagRef`] so that linked directory entries point at one
//! object; the last handle to go releases the storage.

use std::cell::{Ref, RefCell, RefMut};
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use super::buffer::{SnBuffer, SnContext, SnOp};
use super::compat::{CompatFlags, CompatOptions};
use super::header::HeaderSummary;
use super::tags::TagData;
use super::types::{TV_DEFAULT, TagSignature, TypeSignature};
use crate::alloc::Heap;
use crate::error::{Direction, Error, Result};

/// Shared handle on a tag; the strong count is the number of directory
/// entries (and caller handles) referring to it
pub type TagRef = Rc<RefCell<Tag>>;

pub(crate) fn borrow_tag(tag: &TagRef) -> Result<Ref<'_, Tag>> {
    tag.try_borrow()
        .map_err(|_| Error::Internal("tag is mutably borrowed elsewhere".into()))
}

pub(crate) fn borrow_tag_mut(tag: &TagRef) -> Result<RefMut<'_, Tag>> {
    tag.try_borrow_mut()
        .map_err(|_| Error::Internal("tag is borrowed elsewhere".into()))
}

/// Behaviour every tag payload provides
pub trait TagBody {
    fn type_sig(&self) -> TypeSignature;

    /// Walk the layout after the 8-byte type header in the buffer's mode
    fn serialize(&mut self, b: &mut SnBuffer<'_, '_>) -> Result<()>;

    /// Human readable listing; higher `verbose` prints more detail
    fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()>;

    /// Semantic consistency check against the profile and tag signature
    fn check(&self, _ctx: &mut SnContext<'_>, _sig: TagSignature, _dir: Direction) -> Result<()> {
        Ok(())
    }
}

/// A tag object
///
/// Array storage follows the count fields of the payload: set the counts,
/// call [`Tag::allocate`], then fill the elements in place.
#[derive(Debug)]
pub struct Tag {
    creator: TagSignature,
    touched: bool,
    from_file: bool,
    heap: Arc<dyn Heap>,
    data: TagData,
}

impl Tag {
    pub(crate) fn new(heap: Arc<dyn Heap>, creator: TagSignature, data: TagData) -> Self {
        heap.tag_created();
        Self {
            creator,
            touched: false,
            from_file: false,
            heap,
            data,
        }
    }

    pub(crate) fn into_ref(self) -> TagRef {
        Rc::new(RefCell::new(self))
    }

    pub fn type_sig(&self) -> TypeSignature {
        self.data.type_sig()
    }

    /// Signature of the tag this object was created or read for
    pub fn creator(&self) -> TagSignature {
        self.creator
    }

    /// Set when the payload has been borrowed mutably
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Whether the payload was read from a stream
    pub fn from_file(&self) -> bool {
        self.from_file
    }

    pub fn data(&self) -> &TagData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut TagData {
        self.touched = true;
        &mut self.data
    }

    pub fn heap(&self) -> &Arc<dyn Heap> {
        &self.heap
    }

    /// Context for stand-alone operations; format problems are tolerated
    /// so only structural failures surface
    fn loose_ctx(heap: &dyn Heap) -> SnContext<'_> {
        let options = CompatOptions::strict()
            .with_flags(CompatFlags::RD_FORMAT_WARN | CompatFlags::WR_FORMAT_WARN);
        SnContext::new(options, TV_DEFAULT, HeaderSummary::default(), heap)
    }

    /// Resize storage to match the count fields
    pub fn allocate(&mut self) -> Result<()> {
        let heap = Arc::clone(&self.heap);
        let mut ctx = Self::loose_ctx(heap.as_ref());
        self.touched = true;
        self.allocate_in(&mut ctx)
    }

    pub(crate) fn allocate_in(&mut self, ctx: &mut SnContext<'_>) -> Result<()> {
        let mut b = SnBuffer::dummy(ctx, SnOp::RESIZE);
        self.data.serialize(&mut b)
    }

    /// Serialized size in bytes, including the 8-byte type header
    pub fn get_size(&mut self) -> Result<usize> {
        let heap = Arc::clone(&self.heap);
        let mut ctx = Self::loose_ctx(heap.as_ref());
        self.size_in(&mut ctx)
    }

    pub(crate) fn size_in(&mut self, ctx: &mut SnContext<'_>) -> Result<usize> {
        let mut b = SnBuffer::dummy(ctx, SnOp::SIZE);
        self.data.serialize(&mut b)?;
        b.finish()
    }

    /// Read the payload from `bytes`, which hold exactly the tag's data
    pub(crate) fn read_in(&mut self, ctx: &mut SnContext<'_>, bytes: &[u8]) -> Result<()> {
        let mut b = SnBuffer::reader(ctx, bytes);
        self.data.serialize(&mut b)?;
        b.finish()?;
        self.from_file = true;
        Ok(())
    }

    /// Write the payload into `out`, returning the bytes used
    pub(crate) fn write_in(&mut self, ctx: &mut SnContext<'_>, out: &mut [u8]) -> Result<usize> {
        let mut b = SnBuffer::writer(ctx, out);
        self.data.serialize(&mut b)?;
        b.finish()
    }

    pub fn check(&self, ctx: &mut SnContext<'_>, sig: TagSignature, dir: Direction) -> Result<()> {
        self.data.check(ctx, sig, dir)
    }

    pub fn dump(&self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        self.data.dump(out, verbose)
    }

    /// Replace this payload with a copy of `other`'s, as it would be written.
    ///
    /// The copy goes through serialization so the storage is charged to
    /// this tag's heap.
    pub fn copy_from(&mut self, other: &Tag) -> Result<()> {
        if self.type_sig() != other.type_sig() {
            return Err(Error::ClassMismatch(format!(
                "cannot copy a '{}' tag into a '{}' tag",
                other.type_sig(),
                self.type_sig()
            )));
        }
        let mut source = other.data.clone();
        let heap = Arc::clone(&self.heap);
        let mut ctx = Self::loose_ctx(heap.as_ref());
        let size = {
            let mut b = SnBuffer::dummy(&mut ctx, SnOp::SIZE);
            source.serialize(&mut b)?;
            b.finish()?
        };
        let mut bytes = vec![0u8; size];
        {
            let mut b = SnBuffer::writer(&mut ctx, &mut bytes);
            source.serialize(&mut b)?;
        }
        let mut fresh = TagData::new(self.data.stored_type());
        {
            let mut b = SnBuffer::reader(&mut ctx, &bytes);
            fresh.serialize(&mut b)?;
        }
        self.free_payload();
        self.data = fresh;
        self.touched = true;
        Ok(())
    }

    /// Payload equality
    pub fn compare(&self, other: &Tag) -> bool {
        self.data == other.data
    }

    fn free_payload(&mut self) {
        let heap = Arc::clone(&self.heap);
        let mut ctx = Self::loose_ctx(heap.as_ref());
        let mut b = SnBuffer::dummy(&mut ctx, SnOp::FREE);
        if let Err(err) = self.data.serialize(&mut b) {
            tracing::debug!("freeing '{}' payload: {err}", self.type_sig());
        }
    }
}

impl Drop for Tag {
    fn drop(&mut self) {
        self.free_payload();
        self.heap.tag_released();
    }
}
