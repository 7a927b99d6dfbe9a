use drc_backend::{Backend, CacheError};
use crate::{DrcError, ExecEnv, GuestCpu};

/// Why generated code returned to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The cycle budget ran out.
    OutOfCycles,
    /// No compiled code for (mode, pc).
    MissingCode { mode: u8, pc: u32 },
    /// Instruction fetch from memory nothing backs.
    UnmappedCode { pc: u32 },
    /// The translation environment changed; flush before continuing.
    ResetCache,
    /// An instruction the translator does not handle.
    Unimplemented { pc: u32, opcode: u32 },
}

/// Run the guest until its cycle budget is spent.
///
/// Missing code is compiled on demand. A compile that does not fit
/// flushes the cache and is retried once; failing again is fatal.
pub fn cpu_exec_loop<B, C>(env: &mut ExecEnv<B>, cpu: &mut C) -> Result<(), DrcError>
where
    B: Backend,
    C: GuestCpu,
{
    loop {
        if env.dirty {
            env.flush(cpu)?;
        }
        let Some(entry) = cpu.entry_handle() else {
            env.dirty = true;
            continue;
        };

        let code = env
            .backend
            .execute(&env.cache, &env.handles, &mut env.hash, entry, cpu.machine())?;

        match cpu.exit_reason(code) {
            ExitReason::OutOfCycles => return Ok(()),
            ExitReason::MissingCode { mode, pc } => compile(env, cpu, mode, pc)?,
            ExitReason::UnmappedCode { pc } => {
                tracing::error!(pc, "attempt to execute unmapped memory");
                return Err(DrcError::UnmappedCode { pc });
            }
            ExitReason::ResetCache => env.dirty = true,
            ExitReason::Unimplemented { pc, opcode } => {
                tracing::error!(pc, opcode, "unimplemented instruction");
                return Err(DrcError::Unimplemented { pc, opcode });
            }
        }
    }
}

fn compile<B, C>(env: &mut ExecEnv<B>, cpu: &mut C, mode: u8, pc: u32) -> Result<(), DrcError>
where
    B: Backend,
    C: GuestCpu,
{
    for attempt in 0..2 {
        env.block.reset();
        cpu.translate(&env.hash, mode, pc, &mut env.block);
        tracing::debug!(
            mode,
            pc,
            insts = env.block.len(),
            records = env.block.record_count(),
            "compiled"
        );

        if !env.block.overflowed() {
            match env
                .backend
                .generate(&mut env.cache, &mut env.handles, &mut env.hash, &env.block)
            {
                Ok(_) => return Ok(()),
                Err(CacheError::Full { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if attempt == 0 {
            tracing::warn!(mode, pc, "code cache full, flushing and retrying");
            env.flush(cpu)?;
        }
    }
    tracing::error!(mode, pc, "unable to compile even after flush");
    Err(DrcError::CacheExhausted { mode, pc })
}
