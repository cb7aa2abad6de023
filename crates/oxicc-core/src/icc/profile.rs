//! Profile container
//!
//! A [`Profile`] owns the header and the tag directory. Tags read from a
//! stream are materialized on first use; tags added or linked in memory are
//! written back out by [`Profile::write`], which lays the profile out as:
//!
//! 1. The 128-byte header
//! 2. The tag count and a 12-byte directory entry per tag
//! 3. The tag data, each tag starting on a 4-byte boundary
//!
//! Directory entries that point at the same byte range share one tag object
//! when read, and entries sharing a tag object are written once.
//!
//! Every fallible operation records its failure in the container's sticky
//! error context and refuses to run while an earlier error is pending; see
//! [`Profile::clear_err`].

use std::fmt;
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use super::buffer::{SnBuffer, SnContext};
use super::compat::{CompatFlags, CompatOptions, Diagnostics, WarningHandler};
use super::header::{
    HEADER_SIZE, IccHeader, PROFILE_FLAGS_OFFSET, PROFILE_ID_OFFSET, ProfileClass, ProfileVersion,
    RENDERING_INTENT_OFFSET,
};
use super::tables::{self, LutClass};
use super::tag::{Tag, TagRef, borrow_tag, borrow_tag_mut};
use super::tags::TagData;
use super::types::{D50, TV_40, TagSignature, Tv, TypeSignature, VersionRange, XyzNumber};
use crate::alloc::{Heap, StdHeap};
use crate::error::{Direction, Error, ErrorContext, FormatCode, Result};
use crate::math::{AdaptationMethod, Matrix3x3, adaptation_with_cone};
use crate::stream::{IccStream, Md5Stream, SharedStream};

/// Size of one tag directory entry
const DIR_ENTRY_SIZE: usize = 12;

/// Tag data alignment
const TAG_ALIGN: usize = 4;

/// Result of [`Profile::find_tag`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLookup {
    Found,
    /// Present, but its type is not understood or reading it failed
    FoundUnreadable,
    NotFound,
}

/// Result of [`Profile::check_id`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStatus {
    Match,
    /// The header holds an all-zero id
    Absent,
    Mismatch,
}

/// Tag directory entry
#[derive(Debug, Clone)]
pub struct TagEntry {
    pub sig: TagSignature,
    pub ttype: TypeSignature,
    /// Offset from the start of the profile; 0 until written for new tags
    pub offset: u32,
    pub size: u32,
    /// Size rounded up to the tag alignment
    pub padded_size: u32,
    /// Range of the tag data in the stream the profile was read from
    src_offset: u32,
    src_size: u32,
    tag: Option<TagRef>,
    read_failed: bool,
}

impl TagEntry {
    fn new(sig: TagSignature, ttype: TypeSignature, offset: u32, size: u32, tag: Option<TagRef>) -> Self {
        Self {
            sig,
            ttype,
            offset,
            size,
            padded_size: align(size as usize) as u32,
            src_offset: offset,
            src_size: size,
            tag,
            read_failed: false,
        }
    }

    /// Whether the tag object is in memory
    pub fn is_loaded(&self) -> bool {
        self.tag.is_some()
    }

    /// Whether this entry's source data is the range `offset`+`size`
    fn same_range(&self, offset: u32, size: u32) -> bool {
        size > 0 && self.src_offset == offset && self.src_size == size
    }
}

/// Stream a profile was read from
struct Source {
    stream: SharedStream,
    base: u64,
}

/// Placement of one tag in a serialized profile
#[derive(Debug, Clone, Copy)]
struct Place {
    offset: usize,
    size: usize,
    /// Data is written by an earlier entry holding the same tag
    shared: bool,
}

struct Plan {
    places: Vec<Place>,
    total: usize,
}

struct Rendered {
    image: Vec<u8>,
    plan: Plan,
    header: IccHeader,
}

const fn align(n: usize) -> usize {
    n.div_ceil(TAG_ALIGN) * TAG_ALIGN
}

/// An ICC profile: header, tag directory and tag objects
pub struct Profile {
    pub header: IccHeader,
    entries: Vec<TagEntry>,
    source: Option<Source>,
    options: CompatOptions,
    heap: Arc<dyn Heap>,
    err: ErrorContext,
    diagnostics: Diagnostics,
    handler: Option<WarningHandler>,
    adaptation: AdaptationMethod,
    illuminant: Option<XyzNumber>,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("header", &self.header)
            .field("entries", &self.entries)
            .field("options", &self.options)
            .field("err", &self.err)
            .finish_non_exhaustive()
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialization context over the container's settings
fn context<'a>(
    options: CompatOptions,
    header: &IccHeader,
    heap: &'a dyn Heap,
    diagnostics: &'a mut Diagnostics,
    handler: Option<&'a mut WarningHandler>,
) -> SnContext<'a> {
    SnContext::new(options, header.version.to_tv(), header.summary(), heap)
        .with_diagnostics(diagnostics)
        .with_handler(handler)
}

impl Profile {
    /// Empty profile with a private heap and strict options
    pub fn new() -> Self {
        Self::with_heap(Arc::new(StdHeap::new()))
    }

    /// Empty profile charging its tags to `heap`
    pub fn with_heap(heap: Arc<dyn Heap>) -> Self {
        Self {
            header: IccHeader::default(),
            entries: Vec::new(),
            source: None,
            options: CompatOptions::strict(),
            heap,
            err: ErrorContext::new(),
            diagnostics: Diagnostics::default(),
            handler: None,
            adaptation: AdaptationMethod::default(),
            illuminant: None,
        }
    }

    pub fn with_options(mut self, options: CompatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn heap(&self) -> &Arc<dyn Heap> {
        &self.heap
    }

    /// Run `op` unless an error is pending, recording its failure
    pub(super) fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.err.ensure_clear()?;
        let res = op(self);
        self.err.track(res)
    }

    // ------------------------------------------------------------------
    // Settings and status

    pub fn options(&self) -> CompatOptions {
        self.options
    }

    pub fn set_options(&mut self, options: CompatOptions) {
        self.options = options;
    }

    pub fn set_cflags(&mut self, flags: CompatFlags) {
        self.options.flags.insert(flags);
    }

    pub fn unset_cflags(&mut self, flags: CompatFlags) {
        self.options.flags.remove(flags);
    }

    /// Configured flags plus the warning status bits of the last operations
    pub fn cflags(&self) -> CompatFlags {
        self.options.flags | self.diagnostics.status()
    }

    /// Versions accepted silently on write under [`CompatFlags::ALLOW_WR_VERSION`]
    pub fn set_vcrange(&mut self, vcrange: VersionRange) {
        self.options.vcrange = vcrange;
    }

    /// Set the profile version, which governs the tags and types allowed
    pub fn set_version(&mut self, tv: Tv) -> Result<()> {
        self.err.ensure_clear()?;
        let res = ProfileVersion::from_tv(tv).and_then(|v| {
            if !(2..=5).contains(&v.major) {
                return Err(Error::UnknownVersion(tv));
            }
            self.header.version = v;
            Ok(())
        });
        self.err.track(res)
    }

    pub fn version(&self) -> Tv {
        self.header.version.to_tv()
    }

    pub fn error(&self) -> Option<&Error> {
        self.err.error()
    }

    pub fn clear_err(&mut self) {
        self.err.clear();
    }

    /// Warnings collected since the last read or write started
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn set_warning_handler(&mut self, handler: Option<WarningHandler>) {
        self.handler = handler;
    }

    // ------------------------------------------------------------------
    // Reading

    /// Read the header and tag directory from `stream` at `offset`.
    ///
    /// Tags are read on demand. Nothing changes when reading fails.
    pub fn read(&mut self, stream: SharedStream, offset: u64) -> Result<Diagnostics> {
        self.err.ensure_clear()?;
        let res = self.read_inner(stream, offset);
        self.err.track(res)
    }

    fn read_inner(&mut self, stream: SharedStream, offset: u64) -> Result<Diagnostics> {
        let mut diags = Diagnostics::default();
        let (header, entries) = {
            let mut s = stream.borrow_mut();
            let avail = s.size()?.saturating_sub(offset);
            let min_size = (HEADER_SIZE + 4) as u64;
            if avail < min_size {
                return Err(Error::HeaderLength(format!(
                    "{avail} bytes at offset {offset}, a profile needs at least {min_size}"
                )));
            }
            let mut head = [0u8; HEADER_SIZE + 4];
            s.seek(offset)?;
            s.read_exact(&mut head)?;

            let mut header = IccHeader::default();
            let mut ctx = context(
                self.options,
                &header,
                self.heap.as_ref(),
                &mut diags,
                self.handler.as_mut(),
            );
            {
                let mut b = SnBuffer::reader(&mut ctx, &head[..HEADER_SIZE]);
                header.serialize(&mut b)?;
            }
            ctx.version = header.version.to_tv();
            ctx.header = header.summary();

            let size = u64::from(header.size);
            if size < min_size || size > avail {
                return Err(Error::HeaderLength(format!(
                    "header declares {size} bytes, {avail} available"
                )));
            }
            let count = u32::from_be_bytes([head[128], head[129], head[130], head[131]]) as u64;
            let table_end = min_size + count * DIR_ENTRY_SIZE as u64;
            if table_end > size {
                return Err(Error::BufferBound(format!(
                    "tag table of {count} entries overruns the {size} byte profile"
                )));
            }
            let mut table = vec![0u8; (table_end - min_size) as usize];
            s.read_exact(&mut table)?;

            let mut entries: Vec<TagEntry> = Vec::with_capacity(count as usize);
            {
                let mut b = SnBuffer::reader(&mut ctx, &table);
                for _ in 0..count {
                    let (mut sig, mut off, mut len) = (0u32, 0u32, 0u32);
                    b.u32(&mut sig)?;
                    b.u32(&mut off)?;
                    b.u32(&mut len)?;
                    let sig = TagSignature(sig);
                    let end = u64::from(off) + u64::from(len);
                    if u64::from(off) < table_end || end > size {
                        return Err(Error::BufferBound(format!(
                            "tag '{sig}' at {off}+{len} lies outside the {size} byte profile"
                        )));
                    }
                    if len < 8 {
                        return Err(Error::BufferBound(format!(
                            "tag '{sig}' is {len} bytes, too short for a type header"
                        )));
                    }
                    if entries.iter().any(|e| e.sig == sig) {
                        return Err(Error::Duplicate(format!("tag '{sig}' appears twice")));
                    }
                    entries.push(TagEntry::new(sig, TypeSignature::UNKNOWN, off, len, None));
                }
                b.finish()?;
            }

            for (i, a) in entries.iter().enumerate() {
                for b in &entries[..i] {
                    if a.same_range(b.offset, b.size) {
                        continue;
                    }
                    let (a_end, b_end) = (a.offset + a.size, b.offset + b.size);
                    if a.offset < b_end && b.offset < a_end {
                        ctx.format_warning(
                            Direction::Read,
                            FormatCode::TAG_OVERLAP,
                            format!("tags '{}' and '{}' partially overlap", a.sig, b.sig),
                        )?;
                    }
                }
            }

            let version = header.version.to_tv();
            for entry in entries.iter_mut() {
                let mut ttype = [0u8; 4];
                s.seek(offset + u64::from(entry.offset))?;
                s.read_exact(&mut ttype)?;
                entry.ttype = TypeSignature(u32::from_be_bytes(ttype));
                tables::check_sig_type(&mut ctx, Direction::Read, entry.sig, entry.ttype, version)?;
            }
            (header, entries)
        };

        tracing::debug!(
            tags = entries.len(),
            version = %super::types::tv_to_string(header.version.to_tv()),
            "read profile directory"
        );
        self.header = header;
        self.entries = entries;
        self.source = Some(Source { stream, base: offset });
        self.diagnostics = diags.clone();
        Ok(diags)
    }

    fn index(&self, sig: TagSignature) -> Option<usize> {
        self.entries.iter().position(|e| e.sig == sig)
    }

    /// Bring the tag of entry `idx` into memory
    fn load(&mut self, idx: usize) -> Result<TagRef> {
        let (sig, ttype, offset, size) = {
            let e = &self.entries[idx];
            if let Some(tag) = &e.tag {
                return Ok(Rc::clone(tag));
            }
            (e.sig, e.ttype, e.src_offset, e.src_size)
        };
        if let Some(shared) = self
            .entries
            .iter()
            .filter(|e| e.same_range(offset, size))
            .find_map(|e| e.tag.clone())
        {
            self.entries[idx].tag = Some(Rc::clone(&shared));
            return Ok(shared);
        }

        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("tag '{sig}' has no data to read")))?;
        let mut bytes = vec![0u8; size as usize];
        {
            let mut s = source.stream.borrow_mut();
            s.seek(source.base + u64::from(offset))?;
            s.read_exact(&mut bytes)?;
        }

        let mut tag = Tag::new(Arc::clone(&self.heap), sig, TagData::new(ttype));
        let res = {
            let mut ctx = context(
                self.options,
                &self.header,
                self.heap.as_ref(),
                &mut self.diagnostics,
                self.handler.as_mut(),
            );
            tag.read_in(&mut ctx, &bytes)
                .and_then(|()| tag.check(&mut ctx, sig, Direction::Read))
        };
        if let Err(err) = res {
            tracing::debug!("reading tag '{sig}' failed: {err}");
            self.entries[idx].read_failed = true;
            return Err(err);
        }

        let tag = tag.into_ref();
        for e in self.entries.iter_mut().filter(|e| e.same_range(offset, size)) {
            e.tag = Some(Rc::clone(&tag));
            e.read_failed = false;
        }
        Ok(tag)
    }

    fn load_all(&mut self) -> Result<Vec<(TagSignature, TagRef)>> {
        (0..self.entries.len())
            .map(|idx| Ok((self.entries[idx].sig, self.load(idx)?)))
            .collect()
    }

    /// Whether a tag is present and readable
    pub fn find_tag(&self, sig: TagSignature) -> TagLookup {
        match self.index(sig).map(|i| &self.entries[i]) {
            None => TagLookup::NotFound,
            Some(e) if e.read_failed || !TagData::is_supported(e.ttype) => TagLookup::FoundUnreadable,
            Some(_) => TagLookup::Found,
        }
    }

    /// The tag object for `sig`; tags of unsupported types are not returned
    pub fn read_tag(&mut self, sig: TagSignature) -> Result<TagRef> {
        self.err.ensure_clear()?;
        let res = self.read_tag_inner(sig, false);
        self.err.track(res)
    }

    /// The tag object for `sig`, possibly [`TagData::Unknown`]
    pub fn read_tag_any(&mut self, sig: TagSignature) -> Result<TagRef> {
        self.err.ensure_clear()?;
        let res = self.read_tag_inner(sig, true);
        self.err.track(res)
    }

    fn read_tag_inner(&mut self, sig: TagSignature, any: bool) -> Result<TagRef> {
        let idx = self
            .index(sig)
            .ok_or_else(|| Error::NotFound(format!("tag '{sig}'")))?;
        let tag = self.load(idx)?;
        if !any {
            let t = borrow_tag(&tag)?;
            if t.type_sig() == TypeSignature::UNKNOWN {
                let stored = t.data().stored_type();
                return Err(Error::NotFound(format!(
                    "tag '{sig}' has unsupported type '{stored}'"
                )));
            }
            drop(t);
        }
        Ok(tag)
    }

    /// Read every tag in the directory
    pub fn read_all_tags(&mut self) -> Result<()> {
        self.err.ensure_clear()?;
        let res = self.load_all().map(|_| ());
        self.err.track(res)
    }

    // ------------------------------------------------------------------
    // Directory editing

    pub fn tag_count(&self) -> usize {
        self.entries.len()
    }

    pub fn tag_signatures(&self) -> Vec<TagSignature> {
        self.entries.iter().map(|e| e.sig).collect()
    }

    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Governance check for placing a `ttype` tag under `sig` in this profile
    fn check_new(&mut self, sig: TagSignature, ttype: TypeSignature) -> Result<()> {
        if self.index(sig).is_some() {
            return Err(Error::Duplicate(format!("tag '{sig}' already exists")));
        }
        let version = self.version();
        let mut ctx = context(
            self.options,
            &self.header,
            self.heap.as_ref(),
            &mut self.diagnostics,
            self.handler.as_mut(),
        );
        tables::check_sig_type(&mut ctx, Direction::Write, sig, ttype, version)
    }

    /// Add an empty tag of type `ttype`.
    ///
    /// Set the returned tag's counts, call [`Tag::allocate`] and fill it in.
    pub fn add_tag(&mut self, sig: TagSignature, ttype: TypeSignature) -> Result<TagRef> {
        self.err.ensure_clear()?;
        let res = self.add_tag_inner(sig, ttype);
        self.err.track(res)
    }

    pub(super) fn add_tag_inner(&mut self, sig: TagSignature, ttype: TypeSignature) -> Result<TagRef> {
        self.check_new(sig, ttype)?;
        let tag = Tag::new(Arc::clone(&self.heap), sig, TagData::new(ttype)).into_ref();
        self.entries
            .push(TagEntry::new(sig, ttype, 0, 0, Some(Rc::clone(&tag))));
        tracing::trace!("added tag '{sig}' of type '{ttype}'");
        Ok(tag)
    }

    /// Add `sig` as a second name for the tag object of `existing`
    pub fn link_tag(&mut self, sig: TagSignature, existing: TagSignature) -> Result<TagRef> {
        self.err.ensure_clear()?;
        let res = self.link_tag_inner(sig, existing);
        self.err.track(res)
    }

    pub(super) fn link_tag_inner(&mut self, sig: TagSignature, existing: TagSignature) -> Result<TagRef> {
        let idx = self
            .index(existing)
            .ok_or_else(|| Error::NotFound(format!("tag '{existing}' to link to")))?;
        let tag = self.load(idx)?;
        let ttype = borrow_tag(&tag)?.data().stored_type();
        self.check_new(sig, ttype)?;
        let existing = &self.entries[idx];
        let mut entry = TagEntry::new(sig, ttype, existing.offset, existing.size, Some(Rc::clone(&tag)));
        entry.padded_size = existing.padded_size;
        (entry.src_offset, entry.src_size) = (existing.src_offset, existing.src_size);
        self.entries.push(entry);
        Ok(tag)
    }

    pub fn rename_tag(&mut self, sig: TagSignature, new_sig: TagSignature) -> Result<()> {
        self.err.ensure_clear()?;
        let res = self.rename_tag_inner(sig, new_sig);
        self.err.track(res)
    }

    fn rename_tag_inner(&mut self, sig: TagSignature, new_sig: TagSignature) -> Result<()> {
        let idx = self
            .index(sig)
            .ok_or_else(|| Error::NotFound(format!("tag '{sig}' to rename")))?;
        let ttype = self.entries[idx].ttype;
        self.check_new(new_sig, ttype)?;
        self.entries[idx].sig = new_sig;
        Ok(())
    }

    /// Drop the in-memory copy of a tag read from the stream; the entry stays
    /// and the tag is read again on next use
    pub fn unread_tag(&mut self, sig: TagSignature) -> Result<()> {
        self.err.ensure_clear()?;
        let res = self.unread_tag_inner(sig);
        self.err.track(res)
    }

    fn unread_tag_inner(&mut self, sig: TagSignature) -> Result<()> {
        let idx = self
            .index(sig)
            .ok_or_else(|| Error::NotFound(format!("tag '{sig}'")))?;
        let entry = &mut self.entries[idx];
        let from_file = match &entry.tag {
            None => return Err(Error::NotFound(format!("tag '{sig}' has not been read"))),
            Some(tag) => borrow_tag(tag)?.from_file(),
        };
        if !from_file || entry.src_size == 0 || self.source.is_none() {
            return Err(Error::NotFound(format!(
                "tag '{sig}' was not read from a stream and cannot be read again"
            )));
        }
        entry.tag = None;
        Ok(())
    }

    /// Remove a tag; its object is freed once no other entry or handle holds it
    pub fn delete_tag(&mut self, sig: TagSignature) -> Result<()> {
        self.err.ensure_clear()?;
        let res = match self.index(sig) {
            Some(idx) => {
                self.entries.remove(idx);
                Ok(())
            }
            None => Err(Error::NotFound(format!("tag '{sig}' to delete"))),
        };
        self.err.track(res)
    }

    /// Like [`Profile::delete_tag`], but a missing tag is not an error
    pub fn delete_tag_quiet(&mut self, sig: TagSignature) -> Result<()> {
        self.err.ensure_clear()?;
        if let Some(idx) = self.index(sig) {
            self.entries.remove(idx);
        }
        Ok(())
    }

    pub fn get_tag_lut_class(&self, sig: TagSignature) -> LutClass {
        tables::lut_class(sig)
    }

    // ------------------------------------------------------------------
    // Writing

    /// Bytes [`Profile::write`] will produce
    pub fn get_size(&mut self) -> Result<u32> {
        self.err.ensure_clear()?;
        let res = self.get_size_inner();
        self.err.track(res)
    }

    fn get_size_inner(&mut self) -> Result<u32> {
        let tags = self.load_all()?;
        let mut scratch = Diagnostics::default();
        let mut ctx = context(self.options, &self.header, self.heap.as_ref(), &mut scratch, None);
        let plan = plan(&mut ctx, &tags)?;
        total_size(&plan)
    }

    /// Check that the tags present satisfy the profile class and version
    pub fn write_check(&mut self) -> Result<()> {
        self.err.ensure_clear()?;
        let res = self.write_check_inner();
        self.err.track(res)
    }

    fn write_check_inner(&mut self) -> Result<()> {
        let version = self.version();
        let present: Vec<(TagSignature, TypeSignature)> = self
            .entries
            .iter()
            .map(|e| {
                let ttype = match &e.tag {
                    Some(tag) => borrow_tag(tag).map(|t| t.data().stored_type()),
                    None => Ok(e.ttype),
                };
                ttype.map(|t| (e.sig, t))
            })
            .collect::<Result<_>>()?;
        let mut ctx = context(
            self.options,
            &self.header,
            self.heap.as_ref(),
            &mut self.diagnostics,
            self.handler.as_mut(),
        );
        for (sig, ttype) in &present {
            tables::check_sig_type(&mut ctx, Direction::Write, *sig, *ttype, version)?;
        }
        let sigs: Vec<TagSignature> = present.iter().map(|(s, _)| *s).collect();
        tables::check_class_tags(&mut ctx, Direction::Write, &sigs, version)
    }

    /// Write the profile to `stream` at `offset`.
    ///
    /// For version 4 and later the MD5 profile id is computed and stored in
    /// the header. Nothing is written when validation fails.
    pub fn write(&mut self, stream: &mut dyn IccStream, offset: u64) -> Result<Diagnostics> {
        self.err.ensure_clear()?;
        let res = self.write_inner(stream, offset);
        self.err.track(res)
    }

    fn write_inner(&mut self, stream: &mut dyn IccStream, offset: u64) -> Result<Diagnostics> {
        let mut diags = Diagnostics::default();
        let rendered = self.render(&mut diags, true)?;
        stream.seek(offset)?;
        stream.write(&rendered.image)?;
        stream.flush()?;

        for (entry, place) in self.entries.iter_mut().zip(&rendered.plan.places) {
            entry.offset = place.offset as u32;
            entry.size = place.size as u32;
            entry.padded_size = align(place.size) as u32;
            if let Some(tag) = &entry.tag {
                entry.ttype = borrow_tag(tag)?.data().stored_type();
            }
        }
        self.header.size = rendered.header.size;
        self.header.profile_id = rendered.header.profile_id;
        tracing::debug!(bytes = rendered.image.len(), offset, "wrote profile");
        self.diagnostics = diags.clone();
        Ok(diags)
    }

    /// Serialize the whole profile into memory
    fn render(&mut self, diags: &mut Diagnostics, validate: bool) -> Result<Rendered> {
        let tags = self.load_all()?;
        let version = self.version();
        let mut header = self.header.clone();
        let handler = if validate { self.handler.as_mut() } else { None };
        let mut ctx = context(self.options, &self.header, self.heap.as_ref(), diags, handler);

        if validate {
            for (sig, tag) in &tags {
                let tag = borrow_tag(tag)?;
                let ttype = tag.data().stored_type();
                tables::check_sig_type(&mut ctx, Direction::Write, *sig, ttype, version)?;
                tag.check(&mut ctx, *sig, Direction::Write)?;
            }
            if !self.options.has(CompatFlags::NO_REQUIRED_CHECK) {
                let sigs: Vec<TagSignature> = tags.iter().map(|(s, _)| *s).collect();
                tables::check_class_tags(&mut ctx, Direction::Write, &sigs, version)?;
            }
        }

        let plan = plan(&mut ctx, &tags)?;
        header.size = total_size(&plan)?;
        header.profile_id = [0; 16];
        let mut image = emit(&mut ctx, &mut header, &tags, &plan)?;
        if version >= TV_40 {
            header.profile_id = profile_id(&image)?;
            image[PROFILE_ID_OFFSET..PROFILE_ID_OFFSET + 16].copy_from_slice(&header.profile_id);
        }
        Ok(Rendered { image, plan, header })
    }

    /// Compare the stored profile id with the MD5 of the profile as it would
    /// be written now
    pub fn check_id(&mut self) -> Result<IdStatus> {
        self.err.ensure_clear()?;
        let res = self.check_id_inner();
        self.err.track(res)
    }

    fn check_id_inner(&mut self) -> Result<IdStatus> {
        if self.header.profile_id == [0; 16] {
            return Ok(IdStatus::Absent);
        }
        let mut scratch = Diagnostics::default();
        let rendered = self.render(&mut scratch, false)?;
        let id = profile_id(&rendered.image)?;
        Ok(if id == self.header.profile_id {
            IdStatus::Match
        } else {
            IdStatus::Mismatch
        })
    }

    // ------------------------------------------------------------------
    // White points and chromatic adaptation

    pub fn set_adaptation_method(&mut self, method: AdaptationMethod) {
        self.adaptation = method;
    }

    pub fn adaptation_method(&self) -> AdaptationMethod {
        self.adaptation
    }

    /// Illuminant set by [`Profile::set_illuminant`]
    pub fn illuminant(&self) -> Option<XyzNumber> {
        self.illuminant
    }

    fn require_class(&self) -> Result<()> {
        if self.header.device_class.is_known() {
            return Ok(());
        }
        Err(Error::ClassMismatch(
            "the device class must be set before white point calculations".into(),
        ))
    }

    /// Matrix of a 3x3 s15Fixed16 tag, if present
    fn matrix_tag(&mut self, sig: TagSignature) -> Result<Option<Matrix3x3>> {
        if self.index(sig).is_none() {
            return Ok(None);
        }
        let tag = self.read_tag_inner(sig, false)?;
        let t = borrow_tag(&tag)?;
        Ok(t.data()
            .as_s15f16_array()
            .and_then(|a| Matrix3x3::from_slice(&a.data)))
    }

    fn xyz_tag(&mut self, sig: TagSignature) -> Result<Option<XyzNumber>> {
        if self.index(sig).is_none() {
            return Ok(None);
        }
        let tag = self.read_tag_inner(sig, false)?;
        let t = borrow_tag(&tag)?;
        Ok(t.data().as_xyz().and_then(|x| x.first()))
    }

    /// Matrix adapting XYZ values from `src_wp` to `dst_wp`.
    ///
    /// The cone space comes from the profile's `arts` tag when present and
    /// from the adaptation method otherwise.
    pub fn chrom_adapt_matrix(&mut self, dst_wp: XyzNumber, src_wp: XyzNumber) -> Result<Matrix3x3> {
        self.err.ensure_clear()?;
        let res = self.chrom_adapt_inner(dst_wp, src_wp);
        self.err.track(res)
    }

    fn chrom_adapt_inner(&mut self, dst_wp: XyzNumber, src_wp: XyzNumber) -> Result<Matrix3x3> {
        self.require_class()?;
        let cone = match self.matrix_tag(TagSignature::ABS_TO_REL_TRANS)? {
            Some(m) => m,
            None if self.adaptation == AdaptationMethod::None => return Ok(Matrix3x3::identity()),
            None => self.adaptation.cone_matrix(),
        };
        adaptation_with_cone(&cone, src_wp, dst_wp)
            .ok_or_else(|| Error::Internal("cone space matrix is singular".into()))
    }

    /// Media white and black points.
    ///
    /// A missing white point is taken as D50 and a missing black point as
    /// zero. Display and Output profiles with a `chad` tag report the points
    /// before adaptation.
    pub fn get_wb_points(&mut self) -> Result<(XyzNumber, XyzNumber)> {
        self.err.ensure_clear()?;
        let res = self.get_wb_points_inner();
        self.err.track(res)
    }

    fn get_wb_points_inner(&mut self) -> Result<(XyzNumber, XyzNumber)> {
        self.require_class()?;
        let white = self.xyz_tag(TagSignature::MEDIA_WHITE)?.unwrap_or(D50);
        let black = self.xyz_tag(TagSignature::MEDIA_BLACK)?.unwrap_or_default();
        if matches!(self.header.device_class, ProfileClass::Display | ProfileClass::Output) {
            if let Some(chad) = self.matrix_tag(TagSignature::CHAD)? {
                let inv = chad
                    .inverse()
                    .ok_or_else(|| Error::Internal("'chad' matrix is singular".into()))?;
                return Ok((inv.apply(white), inv.apply(black)));
            }
        }
        Ok((white, black))
    }

    /// Set the illuminant of an Output profile.
    ///
    /// Any existing `chad` tag is removed; for an Output profile with an
    /// illuminant, a `chad` tag adapting from it to D50 is created.
    pub fn set_illuminant(&mut self, illuminant: Option<XyzNumber>) -> Result<()> {
        self.err.ensure_clear()?;
        let res = self.set_illuminant_inner(illuminant);
        self.err.track(res)
    }

    fn set_illuminant_inner(&mut self, illuminant: Option<XyzNumber>) -> Result<()> {
        self.illuminant = illuminant;
        if let Some(idx) = self.index(TagSignature::CHAD) {
            self.entries.remove(idx);
        }
        let (ProfileClass::Output, Some(ill)) = (self.header.device_class, illuminant) else {
            return Ok(());
        };
        let m = self.chrom_adapt_inner(D50, ill)?;
        let tag = self.add_tag_inner(TagSignature::CHAD, TypeSignature::S15F16_ARRAY)?;
        let mut t = borrow_tag_mut(&tag)?;
        if let Some(a) = t.data_mut().as_s15f16_array_mut() {
            a.count = 9;
        }
        t.allocate()?;
        if let Some(a) = t.data_mut().as_s15f16_array_mut() {
            a.data.copy_from_slice(&m.to_vec());
        }
        Ok(())
    }

    // ------------------------------------------------------------------

    /// Print the header, the directory and, when `verbose > 0`, every tag
    pub fn dump(&mut self, out: &mut dyn io::Write, verbose: u32) -> io::Result<()> {
        self.header.dump(out, verbose)?;
        writeln!(out, "Tag table, {} tags:", self.entries.len())?;
        for (i, e) in self.entries.iter().enumerate() {
            writeln!(
                out,
                "  {i:2}: '{}' type '{}' offset {} size {}",
                e.sig, e.ttype, e.offset, e.size
            )?;
        }
        if verbose == 0 {
            return Ok(());
        }
        for idx in 0..self.entries.len() {
            let sig = self.entries[idx].sig;
            writeln!(out, "Tag '{sig}':")?;
            let tag = match self.load(idx) {
                Ok(tag) => tag,
                Err(err) => {
                    writeln!(out, "  unreadable: {err}")?;
                    continue;
                }
            };
            let Ok(t) = tag.try_borrow() else {
                writeln!(out, "  (in use)")?;
                continue;
            };
            t.dump(out, verbose)?;
        }
        Ok(())
    }
}

/// Place every tag: header, directory, then tag data in directory order
fn plan(ctx: &mut SnContext<'_>, tags: &[(TagSignature, TagRef)]) -> Result<Plan> {
    let mut places: Vec<Place> = Vec::with_capacity(tags.len());
    let mut pos = HEADER_SIZE + 4 + DIR_ENTRY_SIZE * tags.len();
    for (i, (_, tag)) in tags.iter().enumerate() {
        if let Some(j) = tags[..i].iter().position(|(_, t)| Rc::ptr_eq(t, tag)) {
            let first = places[j];
            places.push(Place { shared: true, ..first });
            continue;
        }
        let size = borrow_tag_mut(tag)?.size_in(ctx)?;
        pos = align(pos);
        places.push(Place {
            offset: pos,
            size,
            shared: false,
        });
        pos += size;
    }
    Ok(Plan {
        places,
        total: align(pos),
    })
}

fn total_size(plan: &Plan) -> Result<u32> {
    u32::try_from(plan.total).map_err(|_| {
        Error::format(
            Direction::Write,
            FormatCode::RANGE,
            format!("profile of {} bytes exceeds the 32-bit size field", plan.total),
        )
    })
}

/// Serialize header, directory and tags as placed by `plan`
fn emit(
    ctx: &mut SnContext<'_>,
    header: &mut IccHeader,
    tags: &[(TagSignature, TagRef)],
    plan: &Plan,
) -> Result<Vec<u8>> {
    let mut image = vec![0u8; plan.total];
    {
        let mut b = SnBuffer::writer(ctx, &mut image[..HEADER_SIZE]);
        header.serialize(&mut b)?;
    }
    let table_end = HEADER_SIZE + 4 + DIR_ENTRY_SIZE * tags.len();
    {
        let mut b = SnBuffer::writer(ctx, &mut image[HEADER_SIZE..table_end]);
        let mut count = tags.len();
        b.count32(&mut count)?;
        for ((sig, _), place) in tags.iter().zip(&plan.places) {
            let (mut sig, mut offset, mut size) = (sig.0, place.offset as u32, place.size as u32);
            b.u32(&mut sig)?;
            b.u32(&mut offset)?;
            b.u32(&mut size)?;
        }
    }
    for ((sig, tag), place) in tags.iter().zip(&plan.places) {
        if place.shared {
            continue;
        }
        let out = &mut image[place.offset..place.offset + place.size];
        let used = borrow_tag_mut(tag)?.write_in(ctx, out)?;
        if used != place.size {
            return Err(Error::Internal(format!(
                "tag '{sig}' wrote {used} bytes but was sized at {}",
                place.size
            )));
        }
    }
    Ok(image)
}

/// MD5 over a serialized profile with the flags, intent and id fields zeroed
fn profile_id(image: &[u8]) -> Result<[u8; 16]> {
    let mut md5 = Md5Stream::new();
    md5.write(&image[..PROFILE_FLAGS_OFFSET])?;
    md5.seek((PROFILE_FLAGS_OFFSET + 4) as u64)?;
    md5.write(&image[PROFILE_FLAGS_OFFSET + 4..RENDERING_INTENT_OFFSET])?;
    md5.seek((RENDERING_INTENT_OFFSET + 4) as u64)?;
    md5.write(&image[RENDERING_INTENT_OFFSET + 4..PROFILE_ID_OFFSET])?;
    md5.seek((PROFILE_ID_OFFSET + 16) as u64)?;
    md5.write(&image[PROFILE_ID_OFFSET + 16..])?;
    Ok(md5.digest())
}
