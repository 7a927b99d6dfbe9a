//! Host interface to the MIPS III/IV recompiler.
//!
//! A [`CpuContext`] owns one guest CPU together with its code cache,
//! handle table and hash table. Contexts share nothing, so a
//! multi-core guest creates one per core.

mod error;
mod guest;

pub use drc_exec::DrcError;
pub use drc_frontend::mips3::tlb::{Fault, Intent};
pub use drc_frontend::mips3::{FastRamRegion, Hotspot, Memory, Mips3Config, Mips3State};
pub use error::{ConfigError, ContextError};

use drc_backend::{Backend, Interpreter};
use drc_exec::{cpu_exec_loop, ExecEnv};
use drc_frontend::mips3::config::{MAX_FASTRAM, MAX_HOTSPOTS};
use drc_frontend::mips3::cpu::{BUDGET, CYCLES_BASE, ICOUNT, STATE_SLOTS};
use drc_frontend::mips3::state::StateImage;
use drc_frontend::mips3::{Mips3Describer, RegisterMap};

use guest::Mips3Cpu;

/// Address spaces visible to `translate_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    Program,
    Data,
}

/// One guest CPU and its translation environment.
pub struct CpuContext {
    env: ExecEnv<Interpreter>,
    cpu: Mips3Cpu,
}

impl CpuContext {
    /// Create a context in its power-on state.
    pub fn init(config: Mips3Config, memory: Box<dyn Memory>) -> Result<Self, DrcError> {
        let backend = Interpreter::new(config.host_registers);
        let regmap = RegisterMap::new(backend.host_registers());
        let env = ExecEnv::new(backend, config.cache_size)?;
        let describer = Mips3Describer::new(
            config.window_end,
            config.max_sequence,
            config.max_instructions,
        );
        tracing::debug!(
            cache_size = config.cache_size,
            fast_registers = regmap.fast_count(),
            "mips3 context created"
        );
        let cpu = Mips3Cpu {
            state: Mips3State::new(&config, memory),
            config,
            regmap,
            describer,
            handles: None,
            hotspots: Vec::new(),
        };
        Ok(Self { env, cpu })
    }

    /// Return to the power-on state and drop all compiled code.
    pub fn reset(&mut self) {
        self.cpu.state.reset(&self.cpu.config);
        self.env.dirty = true;
    }

    /// Run for `cycles` cycles and return how many were consumed.
    ///
    /// At least one sequence always runs. The budget is checked at
    /// sequence boundaries, so the result may exceed it by up to one
    /// sequence.
    pub fn execute(&mut self, cycles: u64) -> Result<u64, DrcError> {
        let mut consumed = 0u64;
        loop {
            let state = &mut self.cpu.state;
            state.update_timer();
            let mut slice = cycles.saturating_sub(consumed);
            if let Some(until) = state.cycles_until_timer() {
                slice = slice.min(until);
            }
            state.set_reg(BUDGET, slice);
            state.set_reg(ICOUNT, slice);

            let result = cpu_exec_loop(&mut self.env, &mut self.cpu);

            let state = &mut self.cpu.state;
            let used = (slice as i64).wrapping_sub(state.reg(ICOUNT) as i64).max(0) as u64;
            let base = state.reg(CYCLES_BASE).wrapping_add(used);
            state.set_reg(CYCLES_BASE, base);
            state.set_reg(BUDGET, 0);
            state.set_reg(ICOUNT, 0);
            consumed += used;
            result?;

            if consumed > cycles || used == 0 {
                break;
            }
        }
        self.cpu.state.update_timer();
        Ok(consumed)
    }

    /// Tear the context down.
    pub fn exit(self) {
        tracing::debug!(
            cycles = self.cpu.state.total_cycles(),
            code_bytes = self.env.cache.code_size(),
            "mips3 context released"
        );
    }

    /// Serialize the architectural state.
    pub fn get_context(&self) -> Result<Vec<u8>, ContextError> {
        Ok(bincode::serialize(&self.cpu.state.image())?)
    }

    /// Restore state produced by `get_context`.
    pub fn set_context(&mut self, blob: &[u8]) -> Result<(), ContextError> {
        let image: StateImage = bincode::deserialize(blob)?;
        if image.regs.len() != STATE_SLOTS {
            return Err(ContextError::SlotCount {
                expected: STATE_SLOTS,
                found: image.regs.len(),
            });
        }
        let expected = self.cpu.config.tlb_entries;
        if image.tlb.len() != expected {
            return Err(ContextError::TlbSize {
                expected,
                found: image.tlb.len(),
            });
        }
        self.cpu.state.restore(image);
        Ok(())
    }

    /// Translate `vaddr` the way compiled code would at the current
    /// privilege level.
    pub fn translate_address(
        &self,
        space: AddressSpace,
        intent: Intent,
        vaddr: u32,
    ) -> Option<u32> {
        let intent = match (space, intent) {
            (AddressSpace::Program, Intent::Read) => Intent::Fetch,
            (_, intent) => intent,
        };
        match self.cpu.state.translate(vaddr, intent) {
            Ok(paddr) => Some(paddr),
            Err(fault) => {
                tracing::trace!(vaddr, ?fault, "address does not translate");
                None
            }
        }
    }

    /// Serve physical `start..=end` directly from `data`.
    pub fn add_fastram(
        &mut self,
        start: u32,
        end: u32,
        readonly: bool,
        data: Vec<u8>,
    ) -> Result<(), ConfigError> {
        if end < start {
            return Err(ConfigError::InvertedWindow { start, end });
        }
        let regions = &mut self.cpu.state.fastram;
        if regions.len() >= MAX_FASTRAM {
            return Err(ConfigError::TooManyFastRam { max: MAX_FASTRAM });
        }
        let big_endian = self.cpu.config.big_endian;
        regions.push(FastRamRegion::new(start, end, readonly, big_endian, data));
        self.env.dirty = true;
        Ok(())
    }

    /// Charge `cycles` extra whenever `opcode` is compiled at `pc`.
    pub fn add_hotspot(&mut self, pc: u32, opcode: u32, cycles: u32) -> Result<(), ConfigError> {
        if self.cpu.hotspots.len() >= MAX_HOTSPOTS {
            return Err(ConfigError::TooManyHotspots { max: MAX_HOTSPOTS });
        }
        self.cpu.hotspots.push(Hotspot { pc, opcode, cycles });
        self.env.dirty = true;
        Ok(())
    }

    /// Drive external interrupt line `line` (IP2..IP6).
    pub fn set_irq_line(&mut self, line: u32, asserted: bool) {
        self.cpu.state.set_irq_line(line, asserted);
    }

    pub fn config(&self) -> &Mips3Config {
        &self.cpu.config
    }

    pub fn state(&self) -> &Mips3State {
        &self.cpu.state
    }

    pub fn state_mut(&mut self) -> &mut Mips3State {
        &mut self.cpu.state
    }

    pub fn fastram(&self, index: usize) -> Option<&FastRamRegion> {
        self.cpu.state.fastram.get(index)
    }

    pub fn fastram_mut(&mut self, index: usize) -> Option<&mut FastRamRegion> {
        self.cpu.state.fastram.get_mut(index)
    }

    /// Whether the next `execute` regenerates all code.
    pub fn is_dirty(&self) -> bool {
        self.env.dirty
    }
}
