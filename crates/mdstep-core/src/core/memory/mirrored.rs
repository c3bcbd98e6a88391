use std::cell::{Cell, Ref, RefCell, RefMut};
use std::ops::{Deref, DerefMut};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BufferError {
    #[error("Conflicting access to buffer '{buffer}': {requested} requested while {held} is held")]
    AccessConflict {
        buffer: &'static str,
        requested: &'static str,
        held: &'static str,
    },
}

/// Where the caller wants to touch the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLocation {
    Host,
    Device,
}

/// How a write handle treats the existing contents.
///
/// `ReadWrite` brings the requested copy up to date before handing it out. `Overwrite`
/// promises that every element will be replaced, so a stale copy is handed out as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadWrite,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Residency {
    Host,
    Device,
    Both,
}

impl Residency {
    fn is_valid_on(self, location: AccessLocation) -> bool {
        matches!(
            (self, location),
            (Residency::Both, _)
                | (Residency::Host, AccessLocation::Host)
                | (Residency::Device, AccessLocation::Device)
        )
    }
}

impl From<AccessLocation> for Residency {
    fn from(location: AccessLocation) -> Self {
        match location {
            AccessLocation::Host => Residency::Host,
            AccessLocation::Device => Residency::Device,
        }
    }
}

/// An array mirrored between host memory and accelerator memory.
///
/// The array tracks which copy is current and transfers only when a handle is requested
/// on a stale location. Handles are scoped: dropping a handle releases it. Any number of
/// read handles may coexist; a write handle is exclusive across both locations, and
/// requests that would break this return [`BufferError::AccessConflict`] instead of
/// blocking.
#[derive(Debug)]
pub struct MirroredArray<T> {
    name: &'static str,
    len: usize,
    host: RefCell<Vec<T>>,
    device: RefCell<Vec<T>>,
    residency: Cell<Residency>,
    readers: Cell<usize>,
    writer: Cell<bool>,
    transfers: Cell<usize>,
}

impl<T: Clone> MirroredArray<T> {
    pub fn from_vec(name: &'static str, data: Vec<T>) -> Self {
        Self {
            name,
            len: data.len(),
            host: RefCell::new(data),
            device: RefCell::new(Vec::new()),
            residency: Cell::new(Residency::Host),
            readers: Cell::new(0),
            writer: Cell::new(false),
            transfers: Cell::new(0),
        }
    }

    pub fn filled(name: &'static str, len: usize, value: T) -> Self {
        Self::from_vec(name, vec![value; len])
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of host/device copies performed so far.
    pub fn transfer_count(&self) -> usize {
        self.transfers.get()
    }

    pub fn is_valid_on(&self, location: AccessLocation) -> bool {
        self.residency.get().is_valid_on(location)
    }

    pub fn read(&self, location: AccessLocation) -> Result<ReadHandle<'_, T>, BufferError> {
        if self.writer.get() {
            return Err(self.conflict("read", "a write handle"));
        }
        self.make_current(location);
        self.readers.set(self.readers.get() + 1);
        Ok(ReadHandle {
            data: self.copy(location).borrow(),
            readers: &self.readers,
        })
    }

    pub fn write(
        &self,
        location: AccessLocation,
        mode: AccessMode,
    ) -> Result<WriteHandle<'_, T>, BufferError> {
        if self.writer.get() {
            return Err(self.conflict("write", "a write handle"));
        }
        if self.readers.get() > 0 {
            return Err(self.conflict("write", "a read handle"));
        }
        match mode {
            AccessMode::ReadWrite => self.make_current(location),
            AccessMode::Overwrite => self.ensure_allocated(location),
        }
        self.residency.set(location.into());
        self.writer.set(true);
        Ok(WriteHandle {
            data: self.copy(location).borrow_mut(),
            writer: &self.writer,
        })
    }

    /// Copies the current contents out through the host.
    pub fn to_vec(&self) -> Result<Vec<T>, BufferError> {
        Ok(self.read(AccessLocation::Host)?.to_vec())
    }

    fn conflict(&self, requested: &'static str, held: &'static str) -> BufferError {
        BufferError::AccessConflict {
            buffer: self.name,
            requested,
            held,
        }
    }

    fn copy(&self, location: AccessLocation) -> &RefCell<Vec<T>> {
        match location {
            AccessLocation::Host => &self.host,
            AccessLocation::Device => &self.device,
        }
    }

    fn make_current(&self, location: AccessLocation) {
        if self.residency.get().is_valid_on(location) {
            return;
        }
        let source = match location {
            AccessLocation::Host => &self.device,
            AccessLocation::Device => &self.host,
        };
        self.copy(location).borrow_mut().clone_from(&source.borrow());
        self.transfers.set(self.transfers.get() + 1);
        self.residency.set(Residency::Both);
        trace!(buffer = self.name, ?location, "mirrored array transfer");
    }

    fn ensure_allocated(&self, location: AccessLocation) {
        if self.copy(location).borrow().len() != self.len {
            self.make_current(location);
        }
    }
}

/// Shared access to one copy of a [`MirroredArray`].
pub struct ReadHandle<'a, T> {
    data: Ref<'a, Vec<T>>,
    readers: &'a Cell<usize>,
}

impl<T> Deref for ReadHandle<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> Drop for ReadHandle<'_, T> {
    fn drop(&mut self) {
        self.readers.set(self.readers.get() - 1);
    }
}

/// Exclusive access to one copy of a [`MirroredArray`].
pub struct WriteHandle<'a, T> {
    data: RefMut<'a, Vec<T>>,
    writer: &'a Cell<bool>,
}

impl<T> Deref for WriteHandle<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for WriteHandle<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for WriteHandle<'_, T> {
    fn drop(&mut self) {
        self.writer.set(false);
    }
}
