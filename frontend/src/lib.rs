//! DRC frontend: guest state, code description and UML generation.

pub mod mips3;
