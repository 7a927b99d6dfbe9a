use crate::label::{Label, LabelAlloc};
use crate::op::Inst;
use crate::opcode::Opcode;

/// Maximum number of instructions one block may hold.
pub const MAX_BLOCK_INSTS: usize = 32768;

/// A unit of UML under construction.
///
/// One block is built per `compile_block` request or per static
/// handler, then handed to the backend in a single `generate` call.
#[derive(Debug, Clone)]
pub struct Block {
    insts: Vec<Inst>,
    labels: LabelAlloc,
}

impl Block {
    pub fn new() -> Self {
        Self {
            insts: Vec::with_capacity(1024),
            labels: LabelAlloc::new(),
        }
    }

    /// Discard all instructions and labels.
    pub fn reset(&mut self) {
        self.insts.clear();
        self.labels.reset();
    }

    // -- Instruction emission --

    pub fn emit(&mut self, inst: Inst) -> usize {
        let idx = self.insts.len();
        self.insts.push(inst);
        idx
    }

    pub fn next_idx(&self) -> usize {
        self.insts.len()
    }

    pub fn inst(&self, idx: usize) -> &Inst {
        &self.insts[idx]
    }

    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Whether the block exceeds the record limit.
    pub fn overflowed(&self) -> bool {
        self.insts.len() > MAX_BLOCK_INSTS
    }

    /// Number of records the backend will store, excluding
    /// pseudo-ops that only carry assembler information.
    pub fn record_count(&self) -> usize {
        self.insts
            .iter()
            .filter(|i| {
                !i.opc
                    .def()
                    .flags
                    .contains(crate::opcode::OpFlags::PSEUDO)
            })
            .count()
    }

    /// Count instructions with the given opcode.
    pub fn count_op(&self, opc: Opcode) -> usize {
        self.insts.iter().filter(|i| i.opc == opc).count()
    }

    // -- Labels --

    pub fn new_label(&mut self) -> Label {
        self.labels.alloc()
    }

    pub fn nb_labels(&self) -> u32 {
        self.labels.count()
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}
