//! Shared-bus memory topology.
//!
//! Work RAM occupies the top 64KB page and mirrors across the whole
//! 0xE0-0xFF range on the MAIN bus. Cartridge ROM fills pages from zero
//! up. The 8KB sound RAM is shared: the Z80 sees it mirrored over its
//! low 16KB, the MAIN CPU reaches it bytewise through the bank gate.

use std::cell::RefCell;
use std::rc::Rc;

use cpu_68000::memmap::{MemoryMap, PageBuf};
use cpu_68000::page_buf;
use cpu_z80::memmap::{BankBuf, Z80Memory};

/// First work-RAM mirror page on the MAIN bus.
pub const WRAM_FIRST_PAGE: u8 = 0xE0;
/// Size of the Z80 sound RAM.
pub const ZRAM_SIZE: usize = 0x2000;

/// Allocate work RAM and install it (mirrored) into a 68000 map.
pub fn install_work_ram(map: &mut MemoryMap) -> PageBuf {
    let wram = page_buf();
    for page in WRAM_FIRST_PAGE..=0xFF {
        map.install_direct(page, wram.clone());
    }
    wram
}

/// Allocate the Z80 sound RAM and map it mirrored over 0x0000-0x3FFF.
pub fn install_z80_ram(mem: &mut Z80Memory) -> BankBuf {
    let zram: BankBuf = Rc::new(RefCell::new(vec![0u8; ZRAM_SIZE]));
    mem.map_read_ram(0, 16, &zram, 0);
    mem.map_write_ram(0, 16, &zram, 0);
    zram
}

/// Chunk a cartridge image into 64KB pages and install them from page 0.
/// The last partial page is padded with 0xFF (unprogrammed ROM).
pub fn install_cartridge(map: &mut MemoryMap, rom: &[u8]) -> Vec<PageBuf> {
    let mut pages = Vec::new();
    for (index, chunk) in rom.chunks(0x1_0000).enumerate() {
        let page = page_buf();
        {
            let mut mem = page.borrow_mut();
            mem[..chunk.len()].copy_from_slice(chunk);
            for byte in &mut mem[chunk.len()..] {
                *byte = 0xFF;
            }
        }
        map.install_direct(index as u8, page.clone());
        pages.push(page);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpu_68000::memmap::IoHandlers;

    #[test]
    fn work_ram_mirrors_across_high_pages() {
        let mut map = MemoryMap::new(IoHandlers::open_bus());
        let _wram = install_work_ram(&mut map);
        map.write_16(0xFF_0000, 0x1234);
        assert_eq!(map.read_16(0xE0_0000), 0x1234);
        assert_eq!(map.read_16(0xE8_0000), 0x1234);
    }

    #[test]
    fn cartridge_pads_partial_pages() {
        let mut map = MemoryMap::new(IoHandlers::open_bus());
        let rom = vec![0xAB; 0x8000];
        let pages = install_cartridge(&mut map, &rom);
        assert_eq!(pages.len(), 1);
        assert_eq!(map.read_8(0x7FFF), 0xAB);
        assert_eq!(map.read_8(0x8000), 0xFF, "pad reads as unprogrammed");
    }

    #[test]
    fn z80_ram_mirrors_over_16k() {
        let mut mem = Z80Memory::new();
        let _zram = install_z80_ram(&mut mem);
        mem.write(0x0100, 0x42);
        assert_eq!(mem.read(0x2100), 0x42);
    }
}
