//! UML dump: human-readable text output for a block.

use std::fmt::Write as FmtWrite;
use std::io::{self, Write};

use crate::block::Block;
use crate::op::Inst;
use crate::opcode::{OpFlags, Opcode};
use crate::types::Type;

/// Build the opcode name with a type suffix for polymorphic ops.
fn op_name(inst: &Inst) -> String {
    let def = inst.opc.def();
    let suffix = if def.flags.contains(OpFlags::INT) {
        match inst.ty {
            Type::I32 => ".i32",
            Type::I64 => ".i64",
            _ => "",
        }
    } else if def.flags.contains(OpFlags::FLOAT) {
        match inst.ty {
            Type::F32 => ".s",
            Type::F64 => ".d",
            _ => "",
        }
    } else {
        ""
    };
    let cond = inst.cond.name();
    if cond.is_empty() {
        format!("{}{}", def.name, suffix)
    } else {
        format!("{}{},{}", def.name, suffix, cond)
    }
}

/// Format one instruction.
pub fn format_inst(inst: &Inst) -> String {
    let mut buf = String::new();
    if inst.opc == Opcode::Comment {
        let _ = write!(buf, "; {}", inst.args[0]);
        return buf;
    }
    buf.push_str(&op_name(inst));
    let n = inst.opc.def().nb_args() as usize;
    for (i, arg) in inst.args[..n].iter().enumerate() {
        buf.push_str(if i == 0 { " " } else { ", " });
        let _ = write!(buf, "{arg}");
    }
    buf
}

/// Write every instruction of `block` to `out`, one per line.
pub fn dump_block(block: &Block, out: &mut impl Write) -> io::Result<()> {
    for (i, inst) in block.insts().iter().enumerate() {
        match inst.opc {
            Opcode::Label | Opcode::Handle | Opcode::Hash => {
                writeln!(out, "{}:", format_inst(inst))?;
            }
            _ => writeln!(out, "  {i:5}  {}", format_inst(inst))?,
        }
    }
    Ok(())
}
