//! RAM_G allocator
//!
//! Bump allocation of named objects in the chip's general purpose RAM,
//! with compaction on removal. The host cannot address RAM_G directly, so
//! every byte that moves is moved by `CMD_MEMCPY`/`CMD_MEMZERO` pairs sent
//! through the [`CommandBuffer`].
//!
//! ```text
//! before remove(a):  [ a ........ ][ b ][ c .. ]            hwm
//! after compact:     [ b ][ c .. ]  hwm
//! ```
//!
//! Objects live in a fixed arena and are addressed by [`ObjectId`], so
//! compaction renumbers addresses without invalidating handles.

mod object;

pub use object::{ObjectId, ObjectKind, StoredObject, MAX_NAME_LEN};

use heapless::{String, Vec};

use crate::buffer::{BufferError, CommandBuffer, Flush};
use crate::bus::Bus;
use crate::canvas::CanvasExt;
use crate::config::EngineConfig;
use crate::encode::cmd::{self, opt};
use crate::encode::dl::{self, Primitive};
use crate::encode::{BitmapFormat, SketchFormat, SnapshotFormat};
use crate::regs::{RAM_DL, REG_CMD_DL};

/// Most objects stored at once
pub const MAX_OBJECTS: usize = 32;

/// Errors from the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AllocError {
    /// Command buffer refused or lost the work
    Buffer(BufferError),
    /// Coprocessor was reset before the object was written
    Faulted,
    /// Region cannot hold the object
    OutOfMemory { requested: u32, available: u32 },
    /// Another object already has this name
    DuplicateName,
    NameTooLong,
    /// No such object (or a stale id)
    NotFound,
    /// Arena has no free slot
    PoolFull,
    /// Object cannot be drawn that way
    WrongKind,
}

impl From<BufferError> for AllocError {
    fn from(e: BufferError) -> Self {
        AllocError::Buffer(e)
    }
}

/// Image container for [`RamG::save_image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageKind {
    Jpeg,
    Png,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u16,
    object: Option<StoredObject>,
}

/// Allocator state for one chip
#[derive(Debug)]
pub struct RamG {
    start: u32,
    end: u32,
    /// Bump pointer; next object goes here
    hwm: u32,
    slots: Vec<Slot, MAX_OBJECTS>,
}

impl RamG {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            start: config.ramg_start,
            end: config.ramg_end,
            hwm: config.ramg_start,
            slots: Vec::new(),
        }
    }

    pub fn high_water_mark(&self) -> u32 {
        self.hwm
    }

    pub fn free_bytes(&self) -> u32 {
        self.end - self.hwm
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.object.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ObjectId) -> Option<&StoredObject> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.slots.iter().enumerate().find_map(|(i, slot)| {
            let object = slot.object.as_ref()?;
            (object.name.as_str() == name).then_some(ObjectId {
                index: i as u8,
                generation: slot.generation,
            })
        })
    }

    /// Live objects in no particular order
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &StoredObject)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.object.as_ref().map(|object| {
                (
                    ObjectId {
                        index: i as u8,
                        generation: slot.generation,
                    },
                    object,
                )
            })
        })
    }

    /// Copy the display list built so far into RAM_G
    ///
    /// Flushes first so `REG_CMD_DL` reflects everything drawn, then starts
    /// a fresh display list. Returns `None` if nothing was drawn.
    pub fn save_display_list<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        name: &str,
    ) -> Result<Option<ObjectId>, AllocError> {
        let name = self.check_name(name)?;
        let index = self.free_slot()?;
        let size = drawn_size(buffer)?;
        if size == 0 {
            return Ok(None);
        }
        let address = self.reserve(size)?;
        emit_display_list(buffer, address, size)?;
        commit(buffer)?;
        Ok(Some(self.insert(index, name, address, size, ObjectKind::DisplayList)))
    }

    /// Capture a screen rectangle into RAM_G
    #[allow(clippy::too_many_arguments)]
    pub fn save_snapshot<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        name: &str,
        format: SnapshotFormat,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    ) -> Result<Option<ObjectId>, AllocError> {
        let kind = ObjectKind::Snapshot {
            format,
            x,
            y,
            width,
            height,
        };
        self.save_with(buffer, name, format.size(width, height), kind, |buffer, address| {
            buffer.push_all(&cmd::snapshot2(format.raw(), address, x, y, width, height))
        })
    }

    /// Reserve a cleared sketch surface and start `CMD_SKETCH` on it
    ///
    /// The sketch runs until [`CanvasExt::stop`].
    #[allow(clippy::too_many_arguments)]
    pub fn save_sketch<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        name: &str,
        format: SketchFormat,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    ) -> Result<Option<ObjectId>, AllocError> {
        let size = format.size(width, height);
        let kind = ObjectKind::Sketch {
            format,
            x,
            y,
            width,
            height,
        };
        self.save_with(buffer, name, size, kind, |buffer, address| {
            buffer.push_all(&cmd::memzero(address, size))?;
            buffer.push_all(&cmd::sketch(
                x,
                y,
                width,
                height,
                address,
                format.bitmap().raw(),
            ))
        })
    }

    /// Decode a JPEG or PNG into RAM_G
    ///
    /// `format`, `width` and `height` describe the decoded bitmap and
    /// decide how much RAM_G is claimed.
    #[allow(clippy::too_many_arguments)]
    pub fn save_image<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        name: &str,
        image: ImageKind,
        format: BitmapFormat,
        width: u16,
        height: u16,
        data: &[u8],
    ) -> Result<Option<ObjectId>, AllocError> {
        let kind = match image {
            ImageKind::Jpeg => ObjectKind::Jpeg {
                format,
                width,
                height,
            },
            ImageKind::Png => ObjectKind::Png {
                format,
                width,
                height,
            },
        };
        let mut options = opt::NODL as u32;
        if format == BitmapFormat::L8 {
            options |= opt::MONO as u32;
        }
        self.save_with(buffer, name, format.size(width, height), kind, |buffer, address| {
            buffer.stream(&cmd::loadimage(address, options), data)
        })
    }

    /// Inflate a deflate-compressed bitmap into RAM_G
    #[allow(clippy::too_many_arguments)]
    pub fn save_compressed<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        name: &str,
        format: BitmapFormat,
        width: u16,
        height: u16,
        data: &[u8],
    ) -> Result<Option<ObjectId>, AllocError> {
        let kind = ObjectKind::Compressed {
            format,
            width,
            height,
        };
        self.save_with(buffer, name, format.size(width, height), kind, |buffer, address| {
            buffer.stream(&cmd::inflate(address), data)
        })
    }

    fn save_with<B, F>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        name: &str,
        size: u32,
        kind: ObjectKind,
        emit: F,
    ) -> Result<Option<ObjectId>, AllocError>
    where
        B: Bus,
        F: FnOnce(&mut CommandBuffer<B>, u32) -> Result<(), BufferError>,
    {
        let name = self.check_name(name)?;
        let index = self.free_slot()?;
        buffer.flush()?;
        if size == 0 {
            return Ok(None);
        }
        let address = self.reserve(size)?;
        emit(buffer, address)?;
        commit(buffer)?;
        Ok(Some(self.insert(index, name, address, size, kind)))
    }

    /// Replace a stored display list with the one built so far
    ///
    /// Same size overwrites in place. A different size removes the old
    /// object and stores the new one at the end, keeping `id`. An empty
    /// display list removes the object.
    pub fn update_display_list<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        id: ObjectId,
    ) -> Result<(), AllocError> {
        let current = self.get(id).ok_or(AllocError::NotFound)?;
        if current.kind != ObjectKind::DisplayList {
            return Err(AllocError::WrongKind);
        }
        let size = drawn_size(buffer)?;
        self.update_with(buffer, id, size, ObjectKind::DisplayList, |buffer, address| {
            emit_display_list(buffer, address, size)
        })
    }

    /// Re-capture a snapshot, possibly with a new rectangle or format
    #[allow(clippy::too_many_arguments)]
    pub fn update_snapshot<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        id: ObjectId,
        format: SnapshotFormat,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
    ) -> Result<(), AllocError> {
        let current = self.get(id).ok_or(AllocError::NotFound)?;
        if !matches!(current.kind, ObjectKind::Snapshot { .. }) {
            return Err(AllocError::WrongKind);
        }
        buffer.flush()?;
        let kind = ObjectKind::Snapshot {
            format,
            x,
            y,
            width,
            height,
        };
        self.update_with(buffer, id, format.size(width, height), kind, |buffer, address| {
            buffer.push_all(&cmd::snapshot2(format.raw(), address, x, y, width, height))
        })
    }

    /// Rewrite `id` with `size` bytes produced by `emit`
    ///
    /// Once the old block has been released, any failure drops the object
    /// and bumps its generation, as [`remove`](Self::remove) does.
    fn update_with<B, F>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        id: ObjectId,
        size: u32,
        kind: ObjectKind,
        emit: F,
    ) -> Result<(), AllocError>
    where
        B: Bus,
        F: FnOnce(&mut CommandBuffer<B>, u32) -> Result<(), BufferError>,
    {
        let current = self.get(id).ok_or(AllocError::NotFound)?.clone();
        if size == 0 {
            return self.remove(buffer, id);
        }
        if size == current.size {
            emit(buffer, current.address)?;
            commit(buffer)?;
            self.place(id, current.address, size, kind);
            return Ok(());
        }

        let available = self.free_bytes() + current.size;
        if size > available {
            warn!("ramg: {} bytes requested, {} free", size, available);
            return Err(AllocError::OutOfMemory {
                requested: size,
                available,
            });
        }
        let written = self.relocate(buffer, id, current, size).and_then(|address| {
            emit(buffer, address)?;
            commit(buffer)?;
            Ok(address)
        });
        match written {
            Ok(address) => {
                self.place(id, address, size, kind);
                Ok(())
            }
            Err(e) => {
                warn!("ramg: update of slot {} failed, object dropped", id.index);
                self.forget(id);
                Err(e)
            }
        }
    }

    /// Free `current`'s old block and find room for `size` bytes at the end
    ///
    /// Leaves a zero-sized record in the slot until [`place`] fills it.
    fn relocate<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        id: ObjectId,
        current: StoredObject,
        size: u32,
    ) -> Result<u32, AllocError> {
        buffer.push_all(&cmd::memzero(current.address, current.size))?;
        // zero-sized records are skipped by compaction
        self.slots[id.index as usize].object = Some(StoredObject {
            address: self.end,
            size: 0,
            ..current
        });
        self.compact(buffer)?;
        self.reserve(size)
    }

    /// Drop `id` without touching chip memory
    fn forget(&mut self, id: ObjectId) {
        let slot = &mut self.slots[id.index as usize];
        slot.object = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.hwm = self
            .by_address()
            .last()
            .map_or(self.start, |&(_, address, size)| address + size);
    }

    fn place(&mut self, id: ObjectId, address: u32, size: u32, kind: ObjectKind) {
        if let Some(object) = self.slots[id.index as usize].object.as_mut() {
            object.address = address;
            object.size = size;
            object.kind = kind;
        }
        self.hwm = self.hwm.max(address + size);
    }

    /// Zero an object's memory, forget it and compact
    pub fn remove<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        id: ObjectId,
    ) -> Result<(), AllocError> {
        let object = self.get(id).ok_or(AllocError::NotFound)?.clone();
        buffer.push_all(&cmd::memzero(object.address, object.size))?;
        let slot = &mut self.slots[id.index as usize];
        slot.object = None;
        slot.generation = slot.generation.wrapping_add(1);
        debug!("ramg: removed {} bytes at {:#x}", object.size, object.address);
        self.compact(buffer)?;
        commit(buffer)
    }

    pub fn remove_by_name<B: Bus>(
        &mut self,
        buffer: &mut CommandBuffer<B>,
        name: &str,
    ) -> Result<(), AllocError> {
        let id = self.find(name).ok_or(AllocError::NotFound)?;
        self.remove(buffer, id)
    }

    /// Slide objects down until they are packed from the region start
    ///
    /// Emits nothing when the pool is already packed. Commands are queued,
    /// not flushed.
    pub fn compact<B: Bus>(&mut self, buffer: &mut CommandBuffer<B>) -> Result<(), AllocError> {
        loop {
            let order = self.by_address();
            let mut expected = self.start;
            let mut displaced = None;
            for (pos, &(_, address, size)) in order.iter().enumerate() {
                if address != expected {
                    displaced = Some(pos);
                    break;
                }
                expected += size;
            }

            let Some(pos) = displaced else {
                self.hwm = expected;
                return Ok(());
            };

            let (_, old_start, _) = order[pos];
            let gap = old_start - expected;
            for &(index, _, _) in &order[pos..] {
                if let Some(object) = self.slots[index].object.as_mut() {
                    object.address -= gap;
                }
            }

            let old_hwm = self.hwm;
            let mut src = old_start;
            while src < old_hwm {
                let n = gap.min(old_hwm - src);
                buffer.push_all(&cmd::memcpy(src - gap, src, n))?;
                buffer.push_all(&cmd::memzero(src, n))?;
                src += n;
            }
            self.hwm = old_hwm - gap;
            debug!("ramg: closed {} byte gap at {:#x}", gap, expected);
        }
    }

    /// Draw a stored bitmap with its top-left corner at (`x`, `y`)
    pub fn draw<B: Bus>(
        &self,
        buffer: &mut CommandBuffer<B>,
        id: ObjectId,
        x: i16,
        y: i16,
    ) -> Result<(), AllocError> {
        let object = self.get(id).ok_or(AllocError::NotFound)?;
        let (format, width, height) = object.kind.bitmap().ok_or(AllocError::WrongKind)?;
        buffer.push_all(&cmd::setbitmap(
            object.address,
            format.raw() as u16,
            width,
            height,
        ))?;
        buffer.push(dl::begin(Primitive::Bitmaps))?;
        buffer.push(dl::vertex2f(x, y))?;
        buffer.push(dl::end())?;
        Ok(())
    }

    /// Replay a stored display list into the current one
    pub fn call<B: Bus>(
        &self,
        buffer: &mut CommandBuffer<B>,
        id: ObjectId,
    ) -> Result<(), AllocError> {
        let object = self.get(id).ok_or(AllocError::NotFound)?;
        if object.kind != ObjectKind::DisplayList {
            return Err(AllocError::WrongKind);
        }
        buffer.append(object.address, object.size)?;
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<String<MAX_NAME_LEN>, AllocError> {
        if self.find(name).is_some() {
            return Err(AllocError::DuplicateName);
        }
        String::try_from(name).map_err(|_| AllocError::NameTooLong)
    }

    fn free_slot(&self) -> Result<usize, AllocError> {
        match self.slots.iter().position(|s| s.object.is_none()) {
            Some(index) => Ok(index),
            None if !self.slots.is_full() => Ok(self.slots.len()),
            None => Err(AllocError::PoolFull),
        }
    }

    fn reserve(&self, size: u32) -> Result<u32, AllocError> {
        let available = self.free_bytes();
        if size > available {
            warn!("ramg: {} bytes requested, {} free", size, available);
            return Err(AllocError::OutOfMemory {
                requested: size,
                available,
            });
        }
        Ok(self.hwm)
    }

    fn insert(
        &mut self,
        index: usize,
        name: String<MAX_NAME_LEN>,
        address: u32,
        size: u32,
        kind: ObjectKind,
    ) -> ObjectId {
        let object = Some(StoredObject {
            name,
            address,
            size,
            kind,
        });
        if index == self.slots.len() {
            // free_slot checked capacity
            let _ = self.slots.push(Slot {
                generation: 0,
                object,
            });
        } else {
            self.slots[index].object = object;
        }
        self.hwm = address + size;
        ObjectId {
            index: index as u8,
            generation: self.slots[index].generation,
        }
    }

    /// Live (slot, address, size) triples sorted by address
    fn by_address(&self) -> Vec<(usize, u32, u32), MAX_OBJECTS> {
        let mut order: Vec<(usize, u32, u32), MAX_OBJECTS> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let object = slot.object.as_ref()?;
                (object.size > 0).then_some((i, object.address, object.size))
            })
            .collect();
        order.sort_unstable_by_key(|&(_, address, _)| address);
        order
    }
}

fn emit_display_list<B: Bus>(
    buffer: &mut CommandBuffer<B>,
    address: u32,
    size: u32,
) -> Result<(), BufferError> {
    buffer.push_all(&cmd::memcpy(address, RAM_DL, size))?;
    buffer.push_all(&cmd::dlstart())
}

/// Flush what has been drawn and read back its display list size
fn drawn_size<B: Bus>(buffer: &mut CommandBuffer<B>) -> Result<u32, AllocError> {
    if buffer.flush()? == Flush::Recovered {
        return Err(AllocError::Faulted);
    }
    Ok(buffer.bus_mut().rd16(REG_CMD_DL).map_err(BufferError::from)? as u32)
}

fn commit<B: Bus>(buffer: &mut CommandBuffer<B>) -> Result<(), AllocError> {
    match buffer.flush()? {
        Flush::Recovered => Err(AllocError::Faulted),
        Flush::Empty | Flush::Sent { .. } => Ok(()),
    }
}
