//! Banked Z80 memory: 64 pages of 1KB for reads and writes separately.
//!
//! A page either points into a shared byte buffer at some offset (ROM,
//! work RAM, a banked window) or dispatches to an I/O handler (the shared
//! bus gate, the video ports). Banking registers remap pages between
//! `run` slices; during a slice the tables are read-only.

use std::cell::RefCell;
use std::rc::Rc;

/// Number of 1KB pages covering the 64KB address space.
pub const NUM_BANKS: usize = 64;
/// Size of one bank in bytes.
pub const BANK_SIZE: usize = 0x400;

/// A shared backing buffer; several pages usually window into one buffer
/// (8KB of RAM mirrored over 16KB, for instance).
pub type BankBuf = Rc<RefCell<Vec<u8>>>;

/// Byte read handler for an I/O page.
pub type ReadHandler = Rc<dyn Fn(u16) -> u8>;
/// Byte write handler for an I/O page.
pub type WriteHandler = Rc<dyn Fn(u16, u8)>;

/// One page of the read map.
#[derive(Clone, Default)]
pub enum ReadBank {
    /// Unmapped: reads float high.
    #[default]
    Open,
    /// Window into a shared buffer at `offset`.
    Direct { mem: BankBuf, offset: usize },
    /// I/O handler.
    Io(ReadHandler),
}

/// One page of the write map.
#[derive(Clone, Default)]
pub enum WriteBank {
    /// Unmapped: writes are dropped.
    #[default]
    Open,
    /// Window into a shared buffer at `offset`.
    Direct { mem: BankBuf, offset: usize },
    /// I/O handler.
    Io(WriteHandler),
}

/// The Z80's address space: independent read and write page tables.
pub struct Z80Memory {
    read: Vec<ReadBank>,
    write: Vec<WriteBank>,
}

impl Default for Z80Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80Memory {
    /// A fully unmapped address space.
    #[must_use]
    pub fn new() -> Self {
        Self {
            read: vec![ReadBank::default(); NUM_BANKS],
            write: vec![WriteBank::default(); NUM_BANKS],
        }
    }

    /// Window `count` read pages starting at `first` into `mem`,
    /// beginning at `offset` and wrapping at the buffer length (mirrors).
    pub fn map_read_ram(&mut self, first: u8, count: u8, mem: &BankBuf, offset: usize) {
        let len = mem.borrow().len();
        for i in 0..usize::from(count) {
            self.read[usize::from(first) + i] = ReadBank::Direct {
                mem: mem.clone(),
                offset: (offset + i * BANK_SIZE) % len,
            };
        }
    }

    /// Window `count` write pages into `mem` (see `map_read_ram`).
    pub fn map_write_ram(&mut self, first: u8, count: u8, mem: &BankBuf, offset: usize) {
        let len = mem.borrow().len();
        for i in 0..usize::from(count) {
            self.write[usize::from(first) + i] = WriteBank::Direct {
                mem: mem.clone(),
                offset: (offset + i * BANK_SIZE) % len,
            };
        }
    }

    /// Route `count` read pages to a handler.
    pub fn map_read_handler(&mut self, first: u8, count: u8, handler: ReadHandler) {
        for i in 0..usize::from(count) {
            self.read[usize::from(first) + i] = ReadBank::Io(handler.clone());
        }
    }

    /// Route `count` write pages to a handler.
    pub fn map_write_handler(&mut self, first: u8, count: u8, handler: WriteHandler) {
        for i in 0..usize::from(count) {
            self.write[usize::from(first) + i] = WriteBank::Io(handler.clone());
        }
    }

    /// Unmap `count` pages in both directions.
    pub fn unmap(&mut self, first: u8, count: u8) {
        for i in 0..usize::from(count) {
            self.read[usize::from(first) + i] = ReadBank::Open;
            self.write[usize::from(first) + i] = WriteBank::Open;
        }
    }

    /// Read a byte.
    #[must_use]
    pub fn read(&self, address: u16) -> u8 {
        match &self.read[usize::from(address >> 10)] {
            ReadBank::Open => 0xFF,
            ReadBank::Direct { mem, offset } => {
                mem.borrow()[offset + usize::from(address & 0x3FF)]
            }
            ReadBank::Io(handler) => handler(address),
        }
    }

    /// Write a byte.
    pub fn write(&self, address: u16, value: u8) {
        match &self.write[usize::from(address >> 10)] {
            WriteBank::Open => {}
            WriteBank::Direct { mem, offset } => {
                mem.borrow_mut()[offset + usize::from(address & 0x3FF)] = value;
            }
            WriteBank::Io(handler) => handler(address, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram(len: usize) -> BankBuf {
        Rc::new(RefCell::new(vec![0u8; len]))
    }

    #[test]
    fn direct_pages_window_into_buffer() {
        let mut mem = Z80Memory::new();
        let buf = ram(0x2000);
        mem.map_read_ram(0, 8, &buf, 0);
        mem.map_write_ram(0, 8, &buf, 0);

        mem.write(0x1234, 0xA5);
        assert_eq!(buf.borrow()[0x1234], 0xA5);
        assert_eq!(mem.read(0x1234), 0xA5);
    }

    #[test]
    fn mirrored_pages_wrap_at_buffer_length() {
        let mut mem = Z80Memory::new();
        let buf = ram(0x2000);
        // 8KB RAM mirrored over 16KB
        mem.map_read_ram(0, 16, &buf, 0);
        mem.map_write_ram(0, 16, &buf, 0);

        mem.write(0x0042, 0x11);
        assert_eq!(mem.read(0x2042), 0x11, "mirror reads the same cell");
    }

    #[test]
    fn io_pages_dispatch_and_open_bus_floats() {
        let mut mem = Z80Memory::new();
        let hits: Rc<RefCell<Vec<(u16, u8)>>> = Rc::new(RefCell::new(Vec::new()));
        let log = hits.clone();
        mem.map_write_handler(0x1F, 1, Rc::new(move |addr, val| {
            log.borrow_mut().push((addr, val));
        }));

        mem.write(0x7C05, 0x99);
        assert_eq!(*hits.borrow(), vec![(0x7C05, 0x99)]);
        assert_eq!(mem.read(0x8000), 0xFF, "open bus");
    }
}
