//! Shared-bus memory map: 256 pages of 64KB, direct or indirect.
//!
//! Every CPU owns its own map, keyed by address bits 23..16. A page is
//! either a byte-addressable backing buffer (ordinary loads and stores,
//! big-endian word order) or a set of I/O handler callbacks. The two can
//! mix per direction: a cartridge page may read directly from ROM while
//! routing writes to a serial EEPROM handler.
//!
//! Maps are mutated only between `run` calls (init, reset, hot-swap);
//! during a run slice they are read-only. Long accesses are always two
//! word accesses in ascending address order so memory-mapped devices
//! observe two discrete transfers.

use std::cell::RefCell;
use std::rc::Rc;

/// Number of 64KB pages covering the 24-bit address space.
pub const NUM_PAGES: usize = 256;
/// Size of one page in bytes.
pub const PAGE_SIZE: usize = 0x1_0000;
/// 24-bit address mask applied before handlers see an address.
pub const ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// A shared 64KB backing buffer. Buffers may be installed into several
/// maps at once (e.g. work RAM visible to both 68000s); execution is
/// serialized by the scheduler so interior mutability is sufficient.
pub type PageBuf = Rc<RefCell<Box<[u8; PAGE_SIZE]>>>;

/// Allocate a zeroed page buffer.
#[must_use]
pub fn page_buf() -> PageBuf {
    Rc::new(RefCell::new(vec![0u8; PAGE_SIZE].into_boxed_slice().try_into().expect("page size")))
}

/// Byte read handler: masked 24-bit address in, value in bits 0..8 out.
pub type Read8Fn = Rc<dyn Fn(u32) -> u32>;
/// Word read handler: masked 24-bit address in, value in bits 0..16 out.
pub type Read16Fn = Rc<dyn Fn(u32) -> u32>;
/// Byte write handler.
pub type Write8Fn = Rc<dyn Fn(u32, u32)>;
/// Word write handler.
pub type Write16Fn = Rc<dyn Fn(u32, u32)>;

/// The callback quartet registered for an indirect page.
#[derive(Clone)]
pub struct IoHandlers {
    pub read8: Read8Fn,
    pub read16: Read16Fn,
    pub write8: Write8Fn,
    pub write16: Write16Fn,
}

impl IoHandlers {
    /// Open-bus handlers: reads return all ones, writes are dropped.
    #[must_use]
    pub fn open_bus() -> Self {
        Self {
            read8: Rc::new(|_| 0xFF),
            read16: Rc::new(|_| 0xFFFF),
            write8: Rc::new(|_, _| {}),
            write16: Rc::new(|_, _| {}),
        }
    }
}

/// One 64KB page entry. Callbacks win over the buffer per direction.
#[derive(Clone, Default)]
struct Page {
    base: Option<PageBuf>,
    read8: Option<Read8Fn>,
    read16: Option<Read16Fn>,
    write8: Option<Write8Fn>,
    write16: Option<Write16Fn>,
}

/// Address-error fault raised by a word or long access to an odd address.
///
/// Carries everything the group-0 exception frame needs: the fault
/// address, the transfer direction, and the function code of the access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// The odd address that was accessed.
    pub address: u32,
    /// True for a write access.
    pub write: bool,
    /// 3-bit function code of the access.
    pub fc: u32,
}

/// Per-CPU memory map.
pub struct MemoryMap {
    pages: Vec<Page>,
    default_io: IoHandlers,
}

impl MemoryMap {
    /// Create a map with every page routed to `default_io` (the per-CPU
    /// "bus read" behavior for unmapped regions).
    #[must_use]
    pub fn new(default_io: IoHandlers) -> Self {
        Self {
            pages: vec![Page::default(); NUM_PAGES],
            default_io,
        }
    }

    /// Install a direct byte-addressable buffer, replacing any handlers.
    pub fn install_direct(&mut self, page: u8, buffer: PageBuf) {
        self.pages[page as usize] = Page {
            base: Some(buffer),
            ..Page::default()
        };
    }

    /// Install the full I/O handler quartet, replacing any buffer.
    pub fn install_indirect(&mut self, page: u8, handlers: IoHandlers) {
        self.pages[page as usize] = Page {
            base: None,
            read8: Some(handlers.read8),
            read16: Some(handlers.read16),
            write8: Some(handlers.write8),
            write16: Some(handlers.write16),
        };
    }

    /// Route only the write side through handlers, keeping direct reads.
    ///
    /// Used for ROM pages backed by serial EEPROM or mapper latches.
    pub fn install_indirect_writes(&mut self, page: u8, write8: Write8Fn, write16: Write16Fn) {
        let entry = &mut self.pages[page as usize];
        entry.write8 = Some(write8);
        entry.write16 = Some(write16);
    }

    /// Restore a page to the unmapped default.
    pub fn uninstall(&mut self, page: u8) {
        self.pages[page as usize] = Page::default();
    }

    #[inline]
    fn page(&self, address: u32) -> &Page {
        &self.pages[((address >> 16) & 0xFF) as usize]
    }

    /// Byte read. Unmapped pages fall back to the default handler.
    #[must_use]
    pub fn read_8(&self, address: u32) -> u32 {
        let address = address & ADDRESS_MASK;
        let page = self.page(address);
        if let Some(read8) = &page.read8 {
            return read8(address);
        }
        if let Some(base) = &page.base {
            return u32::from(base.borrow()[(address & 0xFFFF) as usize]);
        }
        (self.default_io.read8)(address)
    }

    /// Word read. The low address bit is ignored at this layer; odd-address
    /// detection is the caller's responsibility.
    #[must_use]
    pub fn read_16(&self, address: u32) -> u32 {
        let address = address & ADDRESS_MASK;
        let page = self.page(address);
        if let Some(read16) = &page.read16 {
            return read16(address);
        }
        if let Some(base) = &page.base {
            let offset = (address & 0xFFFE) as usize;
            let mem = base.borrow();
            return u32::from(u16::from_be_bytes([mem[offset], mem[offset + 1]]));
        }
        (self.default_io.read16)(address)
    }

    /// Long read: two word reads at `address` and `address + 2`.
    #[must_use]
    pub fn read_32(&self, address: u32) -> u32 {
        (self.read_16(address) << 16) | (self.read_16(address.wrapping_add(2)) & 0xFFFF)
    }

    /// Byte write. Unmapped pages drop the value.
    pub fn write_8(&self, address: u32, value: u32) {
        let address = address & ADDRESS_MASK;
        let page = self.page(address);
        if let Some(write8) = &page.write8 {
            write8(address, value & 0xFF);
            return;
        }
        if let Some(base) = &page.base {
            base.borrow_mut()[(address & 0xFFFF) as usize] = value as u8;
            return;
        }
        (self.default_io.write8)(address, value & 0xFF);
    }

    /// Word write. Low address bit ignored at this layer.
    pub fn write_16(&self, address: u32, value: u32) {
        let address = address & ADDRESS_MASK;
        let page = self.page(address);
        if let Some(write16) = &page.write16 {
            write16(address, value & 0xFFFF);
            return;
        }
        if let Some(base) = &page.base {
            let offset = (address & 0xFFFE) as usize;
            let mut mem = base.borrow_mut();
            let bytes = (value as u16).to_be_bytes();
            mem[offset] = bytes[0];
            mem[offset + 1] = bytes[1];
            return;
        }
        (self.default_io.write16)(address, value & 0xFFFF);
    }

    /// Long write: two word writes at `address` then `address + 2`.
    pub fn write_32(&self, address: u32, value: u32) {
        self.write_16(address, value >> 16);
        self.write_16(address.wrapping_add(2), value & 0xFFFF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_page_word_access_is_big_endian() {
        let mut map = MemoryMap::new(IoHandlers::open_bus());
        let ram = page_buf();
        map.install_direct(0x00, ram.clone());

        map.write_16(0x1234, 0xBEEF);
        assert_eq!(ram.borrow()[0x1234], 0xBE);
        assert_eq!(ram.borrow()[0x1235], 0xEF);
        assert_eq!(map.read_16(0x1234), 0xBEEF);
    }

    #[test]
    fn long_access_is_two_words_in_order() {
        use std::cell::RefCell;
        let log: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let mut map = MemoryMap::new(IoHandlers::open_bus());
        let log_r = log.clone();
        let log_w = log.clone();
        map.install_indirect(
            0x00,
            IoHandlers {
                read8: Rc::new(|_| 0),
                read16: Rc::new(move |addr| {
                    log_r.borrow_mut().push(addr);
                    0
                }),
                write8: Rc::new(|_, _| {}),
                write16: Rc::new(move |addr, _| {
                    log_w.borrow_mut().push(addr);
                }),
            },
        );

        map.read_32(0x100);
        map.write_32(0x200, 0xDEAD_BEEF);
        assert_eq!(*log.borrow(), vec![0x100, 0x102, 0x200, 0x202]);
    }

    #[test]
    fn unmapped_reads_hit_default_handler() {
        let map = MemoryMap::new(IoHandlers::open_bus());
        assert_eq!(map.read_8(0x123456), 0xFF);
        assert_eq!(map.read_16(0x123456), 0xFFFF);
        map.write_16(0x123456, 0x5555); // dropped
    }

    #[test]
    fn shared_buffer_is_visible_through_two_maps() {
        let mut main = MemoryMap::new(IoHandlers::open_bus());
        let mut sub = MemoryMap::new(IoHandlers::open_bus());
        let ram = page_buf();
        main.install_direct(0xFF, ram.clone());
        sub.install_direct(0x20, ram);

        main.write_8(0xFF_0042, 0xA5);
        assert_eq!(sub.read_8(0x20_0042), 0xA5);
    }

    #[test]
    fn indirect_writes_keep_direct_reads() {
        let hits: Rc<RefCell<u32>> = Rc::new(RefCell::new(0));
        let mut map = MemoryMap::new(IoHandlers::open_bus());
        let rom = page_buf();
        rom.borrow_mut()[0] = 0x42;
        map.install_direct(0x00, rom);
        let h8 = hits.clone();
        let h16 = hits.clone();
        map.install_indirect_writes(
            0x00,
            Rc::new(move |_, _| *h8.borrow_mut() += 1),
            Rc::new(move |_, _| *h16.borrow_mut() += 1),
        );

        assert_eq!(map.read_8(0), 0x42);
        map.write_8(0, 0);
        map.write_16(2, 0);
        assert_eq!(*hits.borrow(), 2);
    }
}
