//! Machine integration: MAIN 68000, Z80, and (with the CD stack attached)
//! a SUB 68000, all paced by one master clock.
//!
//! The frame runner advances one scanline at a time: every active
//! processor runs to the same master-cycle deadline, then the caller may
//! drive interrupt lines (the video chip's horizontal interrupt must be
//! asserted before the slice in which it should be serviced) and the next
//! line begins. At frame end every counter is rebased by the frame length
//! so the u32 cycle counters never approach wrap.
//!
//! The video display processor, sound chips, and CD controller are
//! external: they attach through indirect page handlers and the
//! interrupt-acknowledge callback.

pub mod config;
pub mod memory;

use std::cell::Cell;
use std::rc::Rc;

use cpu_68000::memmap::{IoHandlers, PageBuf};
use cpu_68000::{page_buf, Cpu68000};
use cpu_z80::memmap::BankBuf;
use cpu_z80::Z80;
use emu_core::{MasterClock, Processor};

pub use config::{Config, Model, Region};

/// Master cycles per scanline, identical in both regions.
pub const MCYCLES_PER_LINE: u32 = 3420;

/// Z80 bus-control lines, shared with the MAIN bus gate handlers.
#[derive(Debug, Clone, Copy)]
struct ZBus {
    /// MAIN holds the Z80 bus (Z80 stalled).
    busreq: bool,
    /// Z80 reset line asserted.
    reset: bool,
    /// Reset was released since the last slice.
    reset_latch: bool,
}

impl Default for ZBus {
    fn default() -> Self {
        // The Z80 powers up held in reset with the bus free
        Self {
            busreq: false,
            reset: true,
            reset_latch: false,
        }
    }
}

/// The machine: processors, shared memory, and the line scheduler.
pub struct System {
    pub config: Config,
    pub main: Cpu68000,
    pub sub: Option<Cpu68000>,
    pub z80: Z80,

    work_ram: PageBuf,
    z80_ram: BankBuf,
    cartridge: Vec<PageBuf>,
    zbus: Rc<Cell<ZBus>>,

    /// Deadline of the most recently completed line.
    line_deadline: u32,
    line: u32,
}

impl System {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut main = Cpu68000::new();
        let work_ram = memory::install_work_ram(main.map_mut());

        let mut z80 = Z80::new();
        let z80_ram = memory::install_z80_ram(&mut z80.mem);

        let zbus = Rc::new(Cell::new(ZBus::default()));
        Self::install_bus_gate(&mut main, &zbus, &z80_ram);

        let sub = match config.model {
            Model::Stock => None,
            Model::CdAttached => Some(Self::build_sub_cpu(&mut main)),
        };

        Self {
            config,
            main,
            sub,
            z80,
            work_ram,
            z80_ram,
            cartridge: Vec::new(),
            zbus,
            line_deadline: 0,
            line: 0,
        }
    }

    /// The SUB 68000: its own program RAM, plus word RAM shared with the
    /// MAIN CPU's 0x20-0x23 pages. Serialized execution makes the shared
    /// buffers safe.
    fn build_sub_cpu(main: &mut Cpu68000) -> Cpu68000 {
        let mut sub = Cpu68000::new();
        for page in 0u8..8 {
            sub.map_mut().install_direct(page, page_buf());
        }
        for page in 0u8..4 {
            let word_ram = page_buf();
            main.map_mut().install_direct(0x20 + page, word_ram.clone());
            sub.map_mut().install_direct(0x08 + page, word_ram);
        }
        sub
    }

    /// MAIN-bus gate to the Z80 side: the sound RAM window at page 0xA0
    /// (bytewise, valid only while the bus is requested away from the
    /// Z80) and the bus-control registers at page 0xA1.
    fn install_bus_gate(main: &mut Cpu68000, zbus: &Rc<Cell<ZBus>>, z80_ram: &BankBuf) {
        let ram_r = z80_ram.clone();
        let bus_r = zbus.clone();
        let read8 = Rc::new(move |addr: u32| {
            if bus_r.get().busreq && addr & 0x7FFF < 0x4000 {
                u32::from(ram_r.borrow()[(addr & 0x1FFF) as usize])
            } else {
                0xFF
            }
        });
        let r16_inner = read8.clone();
        let read16 = Rc::new(move |addr: u32| {
            // Word access sees the single byte on both bus halves
            let byte = r16_inner(addr);
            byte << 8 | byte
        });
        let ram_w = z80_ram.clone();
        let bus_w = zbus.clone();
        let write8 = Rc::new(move |addr: u32, data: u32| {
            if bus_w.get().busreq && addr & 0x7FFF < 0x4000 {
                ram_w.borrow_mut()[(addr & 0x1FFF) as usize] = data as u8;
            }
        });
        let w16_inner = write8.clone();
        let write16 = Rc::new(move |addr: u32, data: u32| {
            // Word writes land the high byte only
            w16_inner(addr, data >> 8);
        });
        main.map_mut().install_indirect(
            0xA0,
            IoHandlers {
                read8,
                read16,
                write8,
                write16,
            },
        );

        let bus_r = zbus.clone();
        let ctrl_read = Rc::new(move |addr: u32| -> u32 {
            match addr & 0xFFFF {
                // Bit 8 low once the bus has been granted to MAIN
                0x1100 | 0x1101 => {
                    if bus_r.get().busreq {
                        0x0000
                    } else {
                        0x0100
                    }
                }
                _ => 0xFFFF,
            }
        });
        let bus_w = zbus.clone();
        let ctrl_write = Rc::new(move |addr: u32, data: u32| {
            let mut state = bus_w.get();
            match addr & 0xFFFF {
                0x1100 => state.busreq = data & 0x0100 != 0,
                0x1200 => {
                    let asserted = data & 0x0100 == 0;
                    if state.reset && !asserted {
                        state.reset_latch = true;
                    }
                    state.reset = asserted;
                }
                _ => {}
            }
            bus_w.set(state);
        });
        let r8 = ctrl_read.clone();
        let w8 = ctrl_write.clone();
        main.map_mut().install_indirect(
            0xA1,
            IoHandlers {
                read8: Rc::new(move |addr| r8(addr) & 0xFF),
                read16: ctrl_read,
                write8: Rc::new(move |addr, data| w8(addr, data << 8 | data)),
                write16: ctrl_write,
            },
        );
    }

    /// Load a cartridge image into the MAIN map (between frames only).
    pub fn load_cartridge(&mut self, rom: &[u8]) {
        self.cartridge = memory::install_cartridge(self.main.map_mut(), rom);
    }

    /// Attach the video chip's register window (page 0xC0) and its
    /// interrupt-acknowledge callback.
    pub fn attach_vdp(
        &mut self,
        handlers: IoHandlers,
        int_ack: impl FnMut(u32) -> u32 + 'static,
    ) {
        self.main.map_mut().install_indirect(0xC0, handlers);
        self.main.set_int_ack_callback(int_ack);
    }

    /// The machine's master clock.
    #[must_use]
    pub fn master_clock(&self) -> MasterClock {
        MasterClock::new(self.config.region.crystal_hz())
    }

    /// Work RAM, for host inspection and loaders.
    #[must_use]
    pub fn work_ram(&self) -> &PageBuf {
        &self.work_ram
    }

    /// Z80 sound RAM.
    #[must_use]
    pub fn z80_ram(&self) -> &BankBuf {
        &self.z80_ram
    }

    /// Cartridge pages as installed into the MAIN map.
    #[must_use]
    pub fn cartridge(&self) -> &[PageBuf] {
        &self.cartridge
    }

    /// Reset every processor and the bus lines.
    pub fn reset(&mut self) {
        self.main.reset();
        if let Some(sub) = &mut self.sub {
            sub.reset();
        }
        self.z80.reset();
        self.zbus.set(ZBus::default());
        self.line = 0;
    }

    /// Current scanline within the frame.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Advance every processor one scanline.
    ///
    /// A Z80 held in reset or with its bus requested away does not
    /// execute; its counter still advances so the schedule stays aligned.
    pub fn run_line(&mut self) {
        let deadline = self.line_deadline + MCYCLES_PER_LINE;

        self.main.run(deadline);
        if let Some(sub) = &mut self.sub {
            sub.run(deadline);
        }

        // Bus-line changes the MAIN CPU made this line take effect here
        let mut zbus = self.zbus.get();
        if zbus.reset_latch {
            zbus.reset_latch = false;
            self.zbus.set(zbus);
            self.z80.reset();
        }
        if zbus.reset || zbus.busreq {
            self.z80.set_cycles(deadline);
        } else {
            self.z80.run(deadline);
        }

        self.line_deadline = deadline;
        self.line += 1;
    }

    /// Run a full frame, then rebase all cycle counters by its length.
    pub fn run_frame(&mut self) {
        let lines = self.config.region.lines_per_frame();
        for _ in 0..lines {
            self.run_line();
        }

        let frame_cycles = lines * MCYCLES_PER_LINE;
        self.main.rebase_cycles(frame_cycles);
        if let Some(sub) = &mut self.sub {
            sub.rebase_cycles(frame_cycles);
        }
        self.z80.rebase_cycles(frame_cycles);
        self.line_deadline -= frame_cycles;
        self.line = 0;
    }
}

// === Whole-machine save state ===

#[cfg(feature = "native")]
#[derive(serde::Serialize, serde::Deserialize)]
struct MachineState {
    main: cpu_68000::Context,
    sub: Option<cpu_68000::Context>,
    z80: cpu_z80::Context,
    work_ram: Vec<u8>,
    z80_ram: Vec<u8>,
    busreq: bool,
    z80_reset: bool,
    line_deadline: u32,
    line: u32,
}

#[cfg(feature = "native")]
impl System {
    /// Serialize the machine (memory maps excluded; they are rebuilt from
    /// the cartridge/RAM topology on load).
    #[must_use]
    pub fn save_state(&self) -> Vec<u8> {
        let zbus = self.zbus.get();
        let state = MachineState {
            main: self.main.save_context(),
            sub: self.sub.as_ref().map(Cpu68000::save_context),
            z80: self.z80.save_context(),
            work_ram: self.work_ram.borrow().to_vec(),
            z80_ram: self.z80_ram.borrow().clone(),
            busreq: zbus.busreq,
            z80_reset: zbus.reset,
            line_deadline: self.line_deadline,
            line: self.line,
        };
        serde_json::to_vec(&state).unwrap_or_default()
    }

    /// Restore a machine state captured by `save_state`.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        let state: MachineState = serde_json::from_slice(bytes)?;
        self.main.restore_context(&state.main);
        if let (Some(sub), Some(ctx)) = (self.sub.as_mut(), state.sub.as_ref()) {
            sub.restore_context(ctx);
        }
        self.z80.restore_context(&state.z80);
        self.work_ram.borrow_mut()[..state.work_ram.len()]
            .copy_from_slice(&state.work_ram);
        self.z80_ram.borrow_mut().copy_from_slice(&state.z80_ram);
        self.zbus.set(ZBus {
            busreq: state.busreq,
            reset: state.z80_reset,
            reset_latch: false,
        });
        self.line_deadline = state.line_deadline;
        self.line = state.line;
        Ok(())
    }
}
