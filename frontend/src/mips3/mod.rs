//! MIPS III/IV guest.
//!
//! The describer walks guest code into instruction descriptors, the
//! compiler turns them into UML blocks that dispatch through the hash
//! table, and the static handlers provide the shared entry, exit,
//! exception and memory access code those blocks call.

pub mod compiler;
pub mod config;
pub mod cpu;
pub mod describe;
pub mod handlers;
pub mod memory;
pub mod regmap;
pub mod state;
pub mod tlb;
mod trans;
mod trans_cop;

pub use compiler::{compile_block, CompileContext};
pub use config::Mips3Config;
pub use describe::{InstructionDescriptor, Mips3Describer};
pub use handlers::{generate_static, StaticHandles};
pub use memory::{FastRamRegion, Hotspot, Memory};
pub use regmap::RegisterMap;
pub use state::Mips3State;
