use color_print::cformat;

use crate::imm;
use crate::isa::{InstrType, ParamShape};
use crate::opcode::{FieldMap, FieldRole};
use crate::reg::Reg;

fn reg(fields: &FieldMap, role: FieldRole) -> Reg {
    Reg::from(fields.get(&role).copied().unwrap_or(0) as u8)
}

fn field(fields: &FieldMap, role: FieldRole) -> u32 {
    fields.get(&role).copied().unwrap_or(0)
}

/// Operand text of a decoded instruction, reassembled from its fields.
/// Only real (base-ISA) shapes reach here; pseudo forms never decode.
pub fn operands(it: &InstrType, fields: &FieldMap) -> String {
    use FieldRole::*;
    match it.shape {
        ParamShape::RdRs1Rs2 => format!(
            "{}, {}, {}",
            reg(fields, Rd),
            reg(fields, Rs1),
            reg(fields, Rs2)
        ),
        ParamShape::RdRs1Imm => format!(
            "{}, {}, {}",
            reg(fields, Rd),
            reg(fields, Rs1),
            imm::itype_imm(field(fields, Imm12))
        ),
        ParamShape::RdRs1Shamt => format!(
            "{}, {}, {}",
            reg(fields, Rd),
            reg(fields, Rs1),
            field(fields, Shamt)
        ),
        ParamShape::RdOffset => format!(
            "{}, {}({})",
            reg(fields, Rd),
            imm::itype_imm(field(fields, Imm12)),
            reg(fields, Rs1)
        ),
        ParamShape::Rs2Offset => format!(
            "{}, {}({})",
            reg(fields, Rs2),
            imm::stype_imm(field(fields, Imm5), field(fields, Imm7)),
            reg(fields, Rs1)
        ),
        ParamShape::RsRsLabel => format!(
            "{}, {}, {}",
            reg(fields, Rs1),
            reg(fields, Rs2),
            imm::btype_offset(field(fields, Imm5), field(fields, Imm7))
        ),
        ParamShape::RdImm20 => format!(
            "{}, 0x{:X}",
            reg(fields, Rd),
            field(fields, Imm20)
        ),
        ParamShape::RdLabel => format!(
            "{}, {}",
            reg(fields, Rd),
            imm::jtype_offset(field(fields, Imm20))
        ),
        ParamShape::NoParams => String::new(),
        _ => String::new(),
    }
}

pub fn cformat(it: &InstrType, fields: &FieldMap) -> String {
    cformat!(
        "<r>{:<6}</><b>{}</>",
        it.mnemonic.to_string(),
        operands(it, fields)
    )
}
