/// A branch target within one block.
///
/// Labels support forward references: a jump may name a label before
/// the `Label` op that places it, and the backend resolves every use
/// when the block is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

/// Allocator for labels local to a compiled unit.
#[derive(Debug, Clone, Default)]
pub struct LabelAlloc {
    next: u32,
}

impl LabelAlloc {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn alloc(&mut self) -> Label {
        let l = Label(self.next);
        self.next += 1;
        l
    }

    /// Number of labels handed out so far.
    pub fn count(&self) -> u32 {
        self.next
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
