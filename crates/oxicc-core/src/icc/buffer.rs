//! Serialization buffer
//!
//! Every tag type describes its binary layout once, as a sequence of calls on
//! an [`SnBuffer`]. The same description is then driven in one of five
//! modes ([`SnOp`]): compute the serialized size, write, read, resize storage
//! to the count fields, or free storage. Primitive calls take `&mut` to the
//! in-memory field so the layout code is symmetric between read and write.
//!
//! Positions are relative to the start of the buffer (for a tag, the start
//! of its 8-byte type header), which lets types with internal offsets seek
//! around inside their own data.

use bitflags::bitflags;

use super::compat::{CompatFlags, CompatOptions, Diagnostics, Warning, WarningHandler, WarningKind};
use super::header::HeaderSummary;
use super::types::{DateTimeNumber, Tv, VersionRange, XyzNumber};
use crate::alloc::{Heap, free_vec, resize_vec};
use crate::error::{Direction, Error, FormatCode, Result, VersionCode};

bitflags! {
    /// Serialization mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SnOp: u8 {
        const DUMMY = 0x1;
        const SERIALISE = 0x2;
        const ALLOC = 0x4;

        /// Resize storage to match the count fields
        const RESIZE = Self::ALLOC.bits() | Self::DUMMY.bits();
        /// Release storage
        const FREE = Self::DUMMY.bits();
        /// Compute the serialized size
        const SIZE = Self::SERIALISE.bits() | Self::DUMMY.bits();
        const WRITE = Self::SERIALISE.bits();
        /// Read, allocating storage as counts are discovered
        const READ = Self::ALLOC.bits() | Self::SERIALISE.bits();
    }
}

impl SnOp {
    /// No bytes are transferred
    pub const fn is_dummy(self) -> bool {
        self.contains(Self::DUMMY)
    }

    /// Walks the serialized layout
    pub const fn serialises(self) -> bool {
        self.contains(Self::SERIALISE)
    }

    /// May allocate storage
    pub const fn allocates(self) -> bool {
        self.contains(Self::ALLOC)
    }

    pub const fn is_read(self) -> bool {
        self.bits() == Self::READ.bits()
    }

    pub const fn is_write(self) -> bool {
        self.bits() == Self::WRITE.bits()
    }

    pub const fn is_size(self) -> bool {
        self.bits() == Self::SIZE.bits()
    }

    pub const fn is_resize(self) -> bool {
        self.bits() == Self::RESIZE.bits()
    }

    pub const fn is_free(self) -> bool {
        self.bits() == Self::FREE.bits()
    }

    /// Direction used when reporting problems
    pub const fn direction(self) -> Direction {
        if self.is_read() {
            Direction::Read
        } else {
            Direction::Write
        }
    }
}

/// State shared by every buffer of one serialization pass
pub struct SnContext<'a> {
    pub options: CompatOptions,
    pub version: Tv,
    pub header: HeaderSummary,
    pub heap: &'a dyn Heap,
    diagnostics: Option<&'a mut Diagnostics>,
    handler: Option<&'a mut WarningHandler>,
}

impl<'a> SnContext<'a> {
    pub fn new(
        options: CompatOptions,
        version: Tv,
        header: HeaderSummary,
        heap: &'a dyn Heap,
    ) -> Self {
        Self {
            options,
            version,
            header,
            heap,
            diagnostics: None,
            handler: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: &'a mut Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_handler(mut self, handler: Option<&'a mut WarningHandler>) -> Self {
        self.handler = handler;
        self
    }

    fn emit(&mut self, kind: WarningKind, err: &Error) {
        let warning = Warning::from_error(kind, err);
        tracing::warn!(code = warning.code, "{}", warning.message);
        if let Some(handler) = self.handler.as_deref_mut() {
            handler(&warning);
        }
        if let Some(diagnostics) = self.diagnostics.as_deref_mut() {
            diagnostics.push(warning);
        }
    }

    /// Report a format deviation. Returns the error unless the matching
    /// warn flag is set and the sub-code is not always fatal.
    pub fn format_warning(
        &mut self,
        dir: Direction,
        sub: FormatCode,
        message: impl Into<String>,
    ) -> Result<()> {
        let err = Error::format(dir, sub, message);
        let flag = match dir {
            Direction::Read => CompatFlags::RD_FORMAT_WARN,
            Direction::Write => CompatFlags::WR_FORMAT_WARN,
        };
        if sub.is_always_fatal() || !self.options.has(flag) {
            return Err(err);
        }
        self.emit(WarningKind::Format, &err);
        Ok(())
    }

    /// Report an item that is not legal in the profile version.
    ///
    /// On write, [`CompatFlags::ALLOW_WR_VERSION`] accepts the item silently
    /// when its legal range `item` overlaps the configured version range.
    pub fn version_warning(
        &mut self,
        dir: Direction,
        sub: VersionCode,
        item: VersionRange,
        message: impl Into<String>,
    ) -> Result<()> {
        if dir == Direction::Write
            && self.options.has(CompatFlags::ALLOW_WR_VERSION)
            && item.overlaps(&self.options.vcrange)
        {
            return Ok(());
        }
        let err = Error::Version {
            dir,
            sub,
            message: message.into(),
        };
        let flag = match dir {
            Direction::Read => CompatFlags::RD_VERSION_WARN,
            Direction::Write => CompatFlags::WR_VERSION_WARN,
        };
        if !self.options.has(flag) {
            return Err(err);
        }
        self.emit(WarningKind::Version, &err);
        Ok(())
    }

    /// Report a known real-world deviation, tolerated under [`CompatFlags::ALLOW_QUIRKS`]
    pub fn quirk(&mut self, dir: Direction, sub: FormatCode, message: impl Into<String>) -> Result<()> {
        if self.options.has(CompatFlags::ALLOW_QUIRKS) && !sub.is_always_fatal() {
            self.emit(WarningKind::Quirk, &Error::format(dir, sub, message));
            return Ok(());
        }
        self.format_warning(dir, sub, message)
    }
}

enum Store<'b> {
    Dummy,
    Read(&'b [u8]),
    Write(&'b mut [u8]),
}

/// Cursor over one region of serialized data
pub struct SnBuffer<'b, 'c> {
    ctx: &'b mut SnContext<'c>,
    op: SnOp,
    store: Store<'b>,
    pos: usize,
    size: usize,
    used: usize,
    bounded: bool,
}

impl<'b, 'c> SnBuffer<'b, 'c> {
    /// Buffer for the size, resize and free modes
    pub fn dummy(ctx: &'b mut SnContext<'c>, op: SnOp) -> Self {
        debug_assert!(op.is_dummy());
        Self {
            ctx,
            op,
            store: Store::Dummy,
            pos: 0,
            size: usize::MAX,
            used: 0,
            bounded: false,
        }
    }

    /// Buffer reading `data`; unconsumed bytes raise a short-tag warning
    pub fn reader(ctx: &'b mut SnContext<'c>, data: &'b [u8]) -> Self {
        Self {
            ctx,
            op: SnOp::READ,
            size: data.len(),
            store: Store::Read(data),
            pos: 0,
            used: 0,
            bounded: true,
        }
    }

    pub fn writer(ctx: &'b mut SnContext<'c>, data: &'b mut [u8]) -> Self {
        Self {
            ctx,
            op: SnOp::WRITE,
            size: data.len(),
            store: Store::Write(data),
            pos: 0,
            used: 0,
            bounded: true,
        }
    }

    pub fn op(&self) -> SnOp {
        self.op
    }

    pub fn ctx(&mut self) -> &mut SnContext<'c> {
        self.ctx
    }

    pub fn heap(&self) -> &dyn Heap {
        self.ctx.heap
    }

    pub fn version(&self) -> Tv {
        self.ctx.version
    }

    /// Current position relative to the buffer start
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes between the current position and the bound
    pub fn space(&self) -> usize {
        self.size.saturating_sub(self.pos)
    }

    /// Report a format deviation in this buffer's direction.
    ///
    /// During the dummy passes only fatality is decided; nothing is recorded,
    /// so a warning surfaces once, from the write pass.
    pub fn warn(&mut self, sub: FormatCode, message: impl Into<String>) -> Result<()> {
        if self.op.is_dummy() {
            let tolerated = !sub.is_always_fatal() && self.ctx.options.has(CompatFlags::WR_FORMAT_WARN);
            if tolerated || !self.op.serialises() {
                return Ok(());
            }
            return Err(Error::format(Direction::Write, sub, message));
        }
        let dir = self.op.direction();
        self.ctx.format_warning(dir, sub, message)
    }

    /// Report a known real-world deviation in this buffer's direction
    pub fn quirk(&mut self, sub: FormatCode, message: impl Into<String>) -> Result<()> {
        if self.op.is_dummy() {
            return Ok(());
        }
        let dir = self.op.direction();
        self.ctx.quirk(dir, sub, message)
    }

    fn range_error(&mut self, what: &str, v: f64) -> Result<()> {
        self.ctx.format_warning(
            Direction::Write,
            FormatCode::RANGE,
            format!("{what} value {v} cannot be encoded"),
        )
    }

    fn bound_error(&self, need: usize) -> Error {
        Error::BufferBound(format!(
            "{need} bytes at offset {} exceed buffer of {} bytes",
            self.pos, self.size
        ))
    }

    fn moved(&mut self, pos: usize) {
        self.pos = pos;
        self.used = self.used.max(pos);
    }

    /// Transfer `bytes.len()` raw bytes
    pub fn raw(&mut self, bytes: &mut [u8]) -> Result<()> {
        let n = bytes.len();
        let end = self.pos.checked_add(n).ok_or_else(|| self.bound_error(n))?;
        if !self.op.is_dummy() && end > self.size {
            return Err(self.bound_error(n));
        }
        match &mut self.store {
            Store::Dummy => {}
            Store::Read(data) => bytes.copy_from_slice(&data[self.pos..end]),
            Store::Write(data) => data[self.pos..end].copy_from_slice(bytes),
        }
        self.moved(end);
        Ok(())
    }

    /// Transfer a byte vector whose length is already settled
    pub fn bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        if self.op.serialises() {
            self.raw(bytes)
        } else {
            Ok(())
        }
    }

    pub fn u8(&mut self, v: &mut u8) -> Result<()> {
        let mut b = [*v];
        self.raw(&mut b)?;
        *v = b[0];
        Ok(())
    }

    pub fn u16(&mut self, v: &mut u16) -> Result<()> {
        let mut b = v.to_be_bytes();
        self.raw(&mut b)?;
        if self.op.is_read() {
            *v = u16::from_be_bytes(b);
        }
        Ok(())
    }

    pub fn u32(&mut self, v: &mut u32) -> Result<()> {
        let mut b = v.to_be_bytes();
        self.raw(&mut b)?;
        if self.op.is_read() {
            *v = u32::from_be_bytes(b);
        }
        Ok(())
    }

    pub fn u64(&mut self, v: &mut u64) -> Result<()> {
        let mut b = v.to_be_bytes();
        self.raw(&mut b)?;
        if self.op.is_read() {
            *v = u64::from_be_bytes(b);
        }
        Ok(())
    }

    /// A `u32` count held in memory as `usize`
    pub fn count32(&mut self, v: &mut usize) -> Result<()> {
        let mut raw = u32::try_from(*v).unwrap_or(u32::MAX);
        if self.op.is_write() && *v > u32::MAX as usize {
            self.range_error("count", *v as f64)?;
        }
        self.u32(&mut raw)?;
        if self.op.is_read() {
            *v = raw as usize;
        }
        Ok(())
    }

    /// A `u16` count held in memory as `usize`
    pub fn count16(&mut self, v: &mut usize) -> Result<()> {
        let mut raw = u16::try_from(*v).unwrap_or(u16::MAX);
        if self.op.is_write() && *v > u16::MAX as usize {
            self.range_error("count", *v as f64)?;
        }
        self.u16(&mut raw)?;
        if self.op.is_read() {
            *v = raw as usize;
        }
        Ok(())
    }

    /// A `u8` count held in memory as `usize`
    pub fn count8(&mut self, v: &mut usize) -> Result<()> {
        let mut raw = u8::try_from(*v).unwrap_or(u8::MAX);
        if self.op.is_write() && *v > u8::MAX as usize {
            self.range_error("count", *v as f64)?;
        }
        self.u8(&mut raw)?;
        if self.op.is_read() {
            *v = raw as usize;
        }
        Ok(())
    }

    /// 16.16 fixed-point value stored as `i32` or `u32`
    fn fixed32(&mut self, v: &mut f64, signed: bool, what: &str) -> Result<()> {
        let scaled = (*v * 65536.0).round();
        let (lo, hi) = if signed {
            (i32::MIN as f64, i32::MAX as f64)
        } else {
            (0.0, u32::MAX as f64)
        };
        if self.op.is_write() && !(lo..=hi).contains(&scaled) {
            self.range_error(what, *v)?;
        }
        let mut raw = if signed {
            scaled.clamp(lo, hi) as i32 as u32
        } else {
            scaled.clamp(lo, hi) as u32
        };
        self.u32(&mut raw)?;
        if self.op.is_read() {
            *v = if signed {
                raw as i32 as f64 / 65536.0
            } else {
                raw as f64 / 65536.0
            };
        }
        Ok(())
    }

    pub fn s15f16(&mut self, v: &mut f64) -> Result<()> {
        self.fixed32(v, true, "s15Fixed16")
    }

    pub fn u16f16(&mut self, v: &mut f64) -> Result<()> {
        self.fixed32(v, false, "u16Fixed16")
    }

    pub fn u8f8(&mut self, v: &mut f64) -> Result<()> {
        let scaled = (*v * 256.0).round();
        if self.op.is_write() && !(0.0..=65535.0).contains(&scaled) {
            self.range_error("u8Fixed8", *v)?;
        }
        let mut raw = scaled.clamp(0.0, 65535.0) as u16;
        self.u16(&mut raw)?;
        if self.op.is_read() {
            *v = raw as f64 / 256.0;
        }
        Ok(())
    }

    /// Value in 0..=1 stored as a normalized byte
    pub fn n8(&mut self, v: &mut f64) -> Result<()> {
        if self.op.is_write() && !(0.0..=1.0).contains(v) {
            self.range_error("8-bit normalized", *v)?;
        }
        let mut raw = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.u8(&mut raw)?;
        if self.op.is_read() {
            *v = raw as f64 / 255.0;
        }
        Ok(())
    }

    /// Value in 0..=1 stored as a normalized 16-bit word
    pub fn n16(&mut self, v: &mut f64) -> Result<()> {
        if self.op.is_write() && !(0.0..=1.0).contains(v) {
            self.range_error("16-bit normalized", *v)?;
        }
        let mut raw = (v.clamp(0.0, 1.0) * 65535.0).round() as u16;
        self.u16(&mut raw)?;
        if self.op.is_read() {
            *v = raw as f64 / 65535.0;
        }
        Ok(())
    }

    pub fn xyz(&mut self, v: &mut XyzNumber) -> Result<()> {
        self.s15f16(&mut v.x)?;
        self.s15f16(&mut v.y)?;
        self.s15f16(&mut v.z)
    }

    /// Date-time; an all-zero value is accepted as "unset"
    pub fn date_time(&mut self, v: &mut DateTimeNumber) -> Result<()> {
        self.u16(&mut v.year)?;
        self.u16(&mut v.month)?;
        self.u16(&mut v.day)?;
        self.u16(&mut v.hour)?;
        self.u16(&mut v.minute)?;
        self.u16(&mut v.second)?;
        if self.op.serialises() && *v != DateTimeNumber::default() && !v.is_valid() {
            self.warn(FormatCode::DATETIME, format!("invalid date-time {v}"))?;
        }
        Ok(())
    }

    /// NUL-padded ASCII field of exactly `len` bytes
    pub fn fixed_ascii(&mut self, s: &mut String, len: usize) -> Result<()> {
        if !self.op.serialises() {
            return Ok(());
        }
        let mut field = vec![0u8; len];
        if self.op.is_write() {
            let bytes = s.as_bytes();
            if bytes.len() >= len {
                self.warn(
                    FormatCode::FZ8STRING,
                    format!("string of {} bytes does not fit a {len}-byte field", bytes.len()),
                )?;
            }
            let n = bytes.len().min(len.saturating_sub(1));
            field[..n].copy_from_slice(&bytes[..n]);
        }
        self.raw(&mut field)?;
        if self.op.is_read() {
            let end = match field.iter().position(|&b| b == 0) {
                Some(end) => end,
                None => {
                    self.warn(FormatCode::FZ8STRING, "fixed string is not NUL terminated")?;
                    len
                }
            };
            *s = String::from_utf8_lossy(&field[..end]).into_owned();
        }
        Ok(())
    }

    /// Read `n` bytes, checking the bound before anything is allocated
    pub fn take(&mut self, n: usize) -> Result<Vec<u8>> {
        if n > self.space() {
            return Err(self.bound_error(n));
        }
        let mut block = vec![0u8; n];
        self.raw(&mut block)?;
        Ok(block)
    }

    /// NUL-terminated ASCII running to the end of the buffer.
    ///
    /// `sub` is raised when a read string has no terminator.
    pub fn ascii_to_end(&mut self, s: &mut String, sub: FormatCode) -> Result<()> {
        if !self.op.serialises() {
            return Ok(());
        }
        if self.op.is_read() {
            let block = self.take(self.space())?;
            let end = match block.iter().position(|&b| b == 0) {
                Some(end) => end,
                None => {
                    self.warn(sub, "string is not NUL terminated")?;
                    block.len()
                }
            };
            *s = String::from_utf8_lossy(&block[..end]).into_owned();
        } else {
            if s.contains('\0') {
                self.warn(FormatCode::VZ8STRING, "string contains an embedded NUL")?;
            }
            let mut block = Vec::with_capacity(s.len() + 1);
            block.extend_from_slice(s.as_bytes());
            block.push(0);
            self.raw(&mut block)?;
        }
        Ok(())
    }

    /// Skip `n` bytes on read, write `n` zero bytes otherwise
    pub fn pad(&mut self, n: usize) -> Result<()> {
        if self.op.is_write() {
            let end = self.pos.checked_add(n).ok_or_else(|| self.bound_error(n))?;
            if end > self.size {
                return Err(self.bound_error(n));
            }
            if let Store::Write(data) = &mut self.store {
                data[self.pos..end].fill(0);
            }
            self.moved(end);
            Ok(())
        } else {
            self.advance(n)
        }
    }

    /// Pad to a multiple of `align` bytes from the buffer start
    pub fn align(&mut self, align: usize) -> Result<()> {
        let rem = self.pos % align;
        if rem == 0 { Ok(()) } else { self.pad(align - rem) }
    }

    /// Move forward by `n` bytes without transferring data
    pub fn advance(&mut self, n: usize) -> Result<()> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.bound_error(n))?;
        if !self.op.is_dummy() && end > self.size {
            return Err(self.bound_error(n));
        }
        self.moved(end);
        Ok(())
    }

    /// Move to an absolute position relative to the buffer start
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if !self.op.is_dummy() && pos > self.size {
            return Err(Error::BufferBound(format!(
                "seek to {pos} beyond buffer of {} bytes",
                self.size
            )));
        }
        self.moved(pos);
        Ok(())
    }

    /// Number of whole `item`-byte elements left after `fixed` trailing bytes.
    ///
    /// A trailing partial element raises a `PARTIALEL` warning.
    pub fn count_from_space(&mut self, item: usize, fixed: usize) -> Result<usize> {
        let avail = self.space().saturating_sub(fixed);
        if avail % item != 0 {
            self.warn(
                FormatCode::PARTIALEL,
                format!("{} trailing bytes do not form a whole element", avail % item),
            )?;
        }
        Ok(avail / item)
    }

    /// Bring `vec` in line with `count` according to the mode.
    ///
    /// `item` is the serialized size of one element and `fixed` the number
    /// of bytes the layout still needs after the array. On read the count is
    /// checked against the remaining space before anything is allocated.
    pub fn resize_checked<T: Clone + Default>(
        &mut self,
        count: &mut usize,
        vec: &mut Vec<T>,
        item: usize,
        fixed: usize,
        what: &str,
    ) -> Result<()> {
        if self.op.is_free() {
            free_vec(self.ctx.heap, vec);
            *count = 0;
        } else if self.op.is_read() {
            let need = count.checked_mul(item).ok_or_else(|| {
                Error::BufferBound(format!("{what}: {count} elements overflow"))
            })?;
            let avail = self.space().saturating_sub(fixed);
            if need > avail {
                return Err(Error::BufferBound(format!(
                    "{what}: {count} elements need {need} bytes, {avail} available"
                )));
            }
            resize_vec(self.ctx.heap, vec, *count)?;
        } else if self.op.is_resize() {
            resize_vec(self.ctx.heap, vec, *count)?;
        } else if vec.len() != *count {
            return Err(Error::Internal(format!(
                "{what}: count is {count} but {} elements are allocated",
                vec.len()
            )));
        }
        Ok(())
    }

    /// Array whose elements own storage of their own.
    ///
    /// Like [`SnBuffer::resize_checked`], then `f` serializes each element.
    /// When freeing, elements are visited before the array is released.
    pub fn array_of<T: Clone + Default>(
        &mut self,
        count: &mut usize,
        vec: &mut Vec<T>,
        item: usize,
        fixed: usize,
        what: &str,
        mut f: impl FnMut(&mut Self, &mut T) -> Result<()>,
    ) -> Result<()> {
        if self.op.is_free() {
            for el in vec.iter_mut() {
                f(self, el)?;
            }
        }
        self.resize_checked(count, vec, item, fixed, what)?;
        if !self.op.is_free() {
            for el in vec.iter_mut() {
                f(self, el)?;
            }
        }
        Ok(())
    }

    /// Run `f` on a child buffer starting at the current position.
    ///
    /// With `Some(size)` the child is bounded to `size` bytes, must fit in
    /// this buffer, and the parent advances by `size`. With `None` the child
    /// may use the remaining space, skips the short-data check, and the
    /// parent advances by what the child used.
    pub fn sub_buffer<R>(
        &mut self,
        size: Option<usize>,
        f: impl FnOnce(&mut SnBuffer<'_, 'c>) -> Result<R>,
    ) -> Result<R> {
        let limit = match size {
            Some(n) if !self.op.is_dummy() && n > self.space() => {
                return Err(self.bound_error(n));
            }
            Some(n) => n,
            None => self.space(),
        };
        let start = self.pos;
        let end = start.saturating_add(limit);
        let store = match &mut self.store {
            Store::Dummy => Store::Dummy,
            Store::Read(data) => Store::Read(&data[start..end]),
            Store::Write(data) => Store::Write(&mut data[start..end]),
        };
        let mut child = SnBuffer {
            ctx: &mut *self.ctx,
            op: self.op,
            store,
            pos: 0,
            size: limit,
            used: 0,
            bounded: size.is_some(),
        };
        let out = f(&mut child)?;
        let used = child.finish()?;
        let advance = size.unwrap_or(used);
        self.moved(start.saturating_add(advance));
        Ok(out)
    }

    /// Finish the buffer, returning the number of bytes used.
    ///
    /// A bounded read that left data unconsumed raises a `SHORTTAG` warning.
    pub fn finish(&mut self) -> Result<usize> {
        let used = self.used.max(self.pos);
        if self.op.is_read() && self.bounded && used < self.size {
            self.warn(
                FormatCode::SHORTTAG,
                format!("{} of {} bytes left unread", self.size - used, self.size),
            )?;
        }
        Ok(used)
    }
}
