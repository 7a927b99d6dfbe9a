/// Opaque token naming a re-entrant piece of generated code.
///
/// Handles are allocated up front and may be referenced by `Callh`,
/// `Exh` and `Hashjmp` before the block that defines them has been
/// generated. The backend resolves them when the referencing code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u32);

/// Logical values that exception handlers recover from the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MapVar {
    Pc = 0,
    Cycles = 1,
}

pub const MAPVAR_COUNT: usize = 2;

impl MapVar {
    pub const fn name(self) -> &'static str {
        match self {
            MapVar::Pc => "PC",
            MapVar::Cycles => "CYCLES",
        }
    }

    pub const fn from_index(idx: u64) -> Option<MapVar> {
        match idx {
            0 => Some(MapVar::Pc),
            1 => Some(MapVar::Cycles),
            _ => None,
        }
    }
}
