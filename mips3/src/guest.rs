use drc_backend::{CacheError, HandleTable, Machine};
use drc_core::{Block, Handle, HashTable};
use drc_exec::{ExitReason, GuestCpu};
use drc_frontend::mips3::cpu::{exit, ARG0, ARG1};
use drc_frontend::mips3::{
    compile_block, generate_static, CompileContext, Hotspot, Mips3Config, Mips3Describer,
    Mips3State, RegisterMap, StaticHandles,
};

/// The MIPS guest as driven by the execution loop.
pub(crate) struct Mips3Cpu {
    pub config: Mips3Config,
    pub state: Mips3State,
    pub regmap: RegisterMap,
    pub describer: Mips3Describer,
    pub handles: Option<StaticHandles>,
    pub hotspots: Vec<Hotspot>,
}

impl GuestCpu for Mips3Cpu {
    fn static_blocks(&mut self, table: &mut HandleTable) -> Result<Vec<Block>, CacheError> {
        let handles = match self.handles.take() {
            Some(h) => h,
            None => StaticHandles::alloc(table)?,
        };
        let blocks = generate_static(&handles, &self.regmap, &self.state.fastram);
        self.handles = Some(handles);
        Ok(blocks)
    }

    fn translate(&mut self, hash: &HashTable, mode: u8, pc: u32, block: &mut Block) {
        let Some(handles) = self.handles.as_ref() else {
            return;
        };
        let descs = self.describer.describe(&mut self.state, mode, pc);
        let ctx = CompileContext {
            handles,
            regmap: &self.regmap,
            config: &self.config,
            hotspots: &self.hotspots,
        };
        compile_block(block, hash, ctx, mode, &descs);
    }

    fn entry_handle(&self) -> Option<Handle> {
        self.handles.as_ref().map(|h| h.entry)
    }

    fn machine(&mut self) -> &mut dyn Machine {
        &mut self.state
    }

    fn exit_reason(&self, code: u32) -> ExitReason {
        let pc = self.state.pc();
        match code {
            exit::OUT_OF_CYCLES => ExitReason::OutOfCycles,
            exit::MISSING_CODE => ExitReason::MissingCode {
                mode: self.state.mode(),
                pc,
            },
            exit::UNMAPPED_CODE => ExitReason::UnmappedCode { pc },
            exit::RESET_CACHE => ExitReason::ResetCache,
            exit::UNIMPLEMENTED => ExitReason::Unimplemented {
                pc: self.state.reg(ARG0) as u32,
                opcode: self.state.reg(ARG1) as u32,
            },
            _ => {
                tracing::error!(code, pc, "unknown exit code");
                ExitReason::OutOfCycles
            }
        }
    }
}
