pub mod block;
pub mod dump;
pub mod handle;
pub mod hash;
pub mod ir_builder;
pub mod label;
pub mod op;
pub mod opcode;
pub mod operand;
pub mod types;

pub use block::{Block, MAX_BLOCK_INSTS};
pub use handle::{Handle, MapVar, MAPVAR_COUNT};
pub use hash::{HashEntry, HashTable, JumpCache, HASH_SIZE, JMP_CACHE_SIZE};
pub use label::{Label, LabelAlloc};
pub use op::{Inst, MAX_OP_ARGS};
pub use opcode::{OpDef, OpFlags, Opcode, OPCODE_DEFS};
pub use operand::{FieldOffset, Operand, MAX_HOST_REGS};
pub use types::{flags, Cond, MemSize, RoundMode, Type, TYPE_COUNT};
