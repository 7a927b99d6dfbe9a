use drc_backend::{CacheError, HandleTable, Interpreter, Machine};
use drc_core::{Block, Handle, HashTable, Operand, Type};
use drc_exec::{cpu_exec_loop, DrcError, ExecEnv, ExitReason, GuestCpu};

use crate::backend::TestMachine;

const PC: u16 = 0;
const SEEN: u16 = 1;
const RUNS: u16 = 2;

/// Behaviour of blocks produced by `ToyCpu::translate`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Body {
    Record,
    Unmapped,
    Huge,
}

/// Minimal guest: the entry dispatches on slot 0, compiled blocks
/// record the pc they were compiled for.
struct ToyCpu {
    m: TestMachine,
    handles: Option<(Handle, Handle)>,
    body: Body,
    translations: Vec<u32>,
    flushes: usize,
}

impl ToyCpu {
    fn new(body: Body) -> Self {
        Self {
            m: TestMachine::new(),
            handles: None,
            body,
            translations: Vec::new(),
            flushes: 0,
        }
    }
}

impl GuestCpu for ToyCpu {
    fn static_blocks(&mut self, table: &mut HandleTable) -> Result<Vec<Block>, CacheError> {
        let (entry, nocode) = match self.handles {
            Some(h) => h,
            None => (table.alloc("entry")?, table.alloc("nocode")?),
        };
        self.handles = Some((entry, nocode));
        self.flushes += 1;

        let mut e = Block::new();
        e.gen_handle(entry);
        e.gen_hashjmp(Operand::Imm(0), Operand::Mem(PC), nocode);

        let mut n = Block::new();
        n.gen_handle(nocode);
        n.gen_getexp(Operand::I0);
        n.gen_mov(Type::I32, Operand::Mem(PC), Operand::I0);
        n.gen_exit(Operand::Imm(1));
        Ok(vec![e, n])
    }

    fn translate(&mut self, _hash: &HashTable, mode: u8, pc: u32, block: &mut Block) {
        self.translations.push(pc);
        block.gen_hash(mode, pc);
        match self.body {
            Body::Record => {
                block.gen_mov(Type::I64, Operand::Mem(SEEN), Operand::Imm(pc as u64));
                block.gen_add(Type::I64, Operand::Mem(RUNS), Operand::Mem(RUNS), Operand::Imm(1));
                block.gen_exit(Operand::Imm(0));
            }
            Body::Unmapped => block.gen_exit(Operand::Imm(2)),
            Body::Huge => {
                for _ in 0..4096 {
                    block.gen_mov(Type::I64, Operand::Mem(SEEN), Operand::Imm(pc as u64));
                }
                block.gen_exit(Operand::Imm(0));
            }
        }
    }

    fn entry_handle(&self) -> Option<Handle> {
        self.handles.map(|(entry, _)| entry)
    }

    fn machine(&mut self) -> &mut dyn Machine {
        &mut self.m
    }

    fn exit_reason(&self, code: u32) -> ExitReason {
        let pc = self.m.state[PC as usize] as u32;
        match code {
            0 => ExitReason::OutOfCycles,
            1 => ExitReason::MissingCode { mode: 0, pc },
            2 => ExitReason::UnmappedCode { pc },
            _ => ExitReason::ResetCache,
        }
    }
}

fn env(cache_size: usize) -> ExecEnv<Interpreter> {
    ExecEnv::new(Interpreter::new(9), cache_size).unwrap()
}

#[test]
fn missing_code_is_compiled_once() {
    let mut env = env(256 * 1024);
    let mut cpu = ToyCpu::new(Body::Record);
    cpu.m.state[PC as usize] = 0x40;
    assert!(env.dirty);

    cpu_exec_loop(&mut env, &mut cpu).unwrap();
    assert!(!env.dirty);
    assert_eq!(cpu.translations, vec![0x40]);
    assert_eq!(cpu.m.state[SEEN as usize], 0x40);
    assert!(env.hash.exists(0, 0x40));

    cpu_exec_loop(&mut env, &mut cpu).unwrap();
    assert_eq!(cpu.translations, vec![0x40]);
    assert_eq!(cpu.m.state[RUNS as usize], 2);
    assert_eq!(cpu.flushes, 1);
}

#[test]
fn flush_drops_compiled_code() {
    let mut env = env(256 * 1024);
    let mut cpu = ToyCpu::new(Body::Record);
    cpu.m.state[PC as usize] = 0x40;
    cpu_exec_loop(&mut env, &mut cpu).unwrap();

    env.dirty = true;
    cpu_exec_loop(&mut env, &mut cpu).unwrap();
    assert_eq!(cpu.flushes, 2);
    assert_eq!(cpu.translations, vec![0x40, 0x40]);
    assert_eq!(env.hash.len(), 1);
}

#[test]
fn unmapped_code_is_an_error() {
    let mut env = env(256 * 1024);
    let mut cpu = ToyCpu::new(Body::Unmapped);
    cpu.m.state[PC as usize] = 0x80;
    let err = cpu_exec_loop(&mut env, &mut cpu).unwrap_err();
    assert!(matches!(err, DrcError::UnmappedCode { pc: 0x80 }));
}

#[test]
fn oversized_block_fails_after_one_flush() {
    let mut env = env(64 * 1024);
    let mut cpu = ToyCpu::new(Body::Huge);
    cpu.m.state[PC as usize] = 0x10;
    let err = cpu_exec_loop(&mut env, &mut cpu).unwrap_err();
    assert!(matches!(err, DrcError::CacheExhausted { mode: 0, pc: 0x10 }));
    assert_eq!(cpu.translations.len(), 2);
    assert_eq!(cpu.flushes, 2);
}
