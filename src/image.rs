/*!
    the process image: one contiguous little-endian buffer holding every mapped PDO

    The driver lays all cyclic data into this buffer once during initialization; after
    the segment reached SAFE-OP the layout is frozen. Subdevices do not own any of it,
    they only carry [PdoWindow] views handed out while linking buffers.
*/

use core::ops::Range;

/// floor for the process image allocation, whatever the mapped PDO sizes sum to
pub const IOMAP_MIN: usize = 655_360;

/// a byte window into the process image, owned by exactly one subdevice and direction
#[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
pub struct PdoWindow {
    /// byte offset in the image
    pub offset: usize,
    /// window length in bytes
    pub len: usize,
}

impl PdoWindow {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// true when both windows address at least one common byte
    pub fn overlaps(&self, other: &PdoWindow) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.offset < other.offset + other.len
            && other.offset < self.offset + self.len
    }
}

/**
    the I/O map

    A single heap allocation with a stable address for the master's lifetime, so the
    driver can hand it to the kernel socket directly. Values inside are little-endian
    as everywhere on an EtherCAT segment; the accessors only deal in raw bytes and
    leave decoding to the subdevice code generated or written by the host.

    No synchronization happens here: every output window has a single writer and every
    input window a single reader, established by the frozen layout.
*/
pub struct ProcessImage {
    buffer: Box<[u8]>,
}

impl ProcessImage {
    /// placeholder before initialization
    pub(crate) fn unallocated() -> Self {
        Self { buffer: Box::new([]) }
    }

    /// allocate a zeroed image of `max(required, IOMAP_MIN)` bytes
    pub(crate) fn allocate(required: usize) -> Self {
        Self {
            buffer: vec![0u8; required.max(IOMAP_MIN)].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// read-only view of an input window
    pub fn inputs(&self, window: PdoWindow) -> &[u8] {
        &self.buffer[window.range()]
    }

    /// writable view of an output window
    pub fn outputs_mut(&mut self, window: PdoWindow) -> &mut [u8] {
        &mut self.buffer[window.range()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_floored() {
        assert_eq!(ProcessImage::allocate(0).len(), IOMAP_MIN);
        assert_eq!(ProcessImage::allocate(IOMAP_MIN - 1).len(), IOMAP_MIN);
        assert_eq!(ProcessImage::allocate(IOMAP_MIN + 3).len(), IOMAP_MIN + 3);
    }

    #[test]
    fn window_overlap() {
        let a = PdoWindow { offset: 0, len: 4 };
        let b = PdoWindow { offset: 4, len: 4 };
        let c = PdoWindow { offset: 2, len: 4 };
        let empty = PdoWindow { offset: 0, len: 0 };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert!(!a.overlaps(&empty));
    }

    #[test]
    fn windows_view_the_buffer() {
        let mut image = ProcessImage::allocate(0);
        let out = PdoWindow { offset: 8, len: 2 };
        image.outputs_mut(out).copy_from_slice(&[0x34, 0x12]);
        assert_eq!(image.inputs(out), &[0x34, 0x12]);
    }
}
