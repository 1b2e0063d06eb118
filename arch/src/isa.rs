use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::mnemonic::Mnemonic;
use crate::opcode::{Field, FieldMap, FieldRole, OpCode};

/// Operand syntax family of a mnemonic, as written in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    /// `add rd, rs1, rs2`
    RdRs1Rs2,
    /// `addi rd, rs1, imm`
    RdRs1Imm,
    /// `slli rd, rs1, shamt`
    RdRs1Shamt,
    /// `lw rd, imm(rs1)`
    RdOffset,
    /// `sw rs2, imm(rs1)`
    Rs2Offset,
    /// `beq rs1, rs2, label`
    RsRsLabel,
    /// `jal rd, label` / `la rd, label`
    RdLabel,
    /// `lui rd, imm20`
    RdImm20,
    /// `li rd, imm32`
    RdImm32,
    /// `mv rd, rs`
    RdRs1,
    /// `beqz rs, label`
    RsLabel,
    /// `jr rs`
    Rs,
    /// `j label`
    Label,
    /// `nop` / `ret` / `ecall`
    NoParams,
}

/// One catalogue entry. Real forms own exactly one OpCode; pseudo forms
/// carry the real mnemonic their lowering targets and the number of
/// words the expansion occupies.
#[derive(Debug, Clone)]
pub struct InstrType {
    pub mnemonic: Mnemonic,
    pub pseudo: bool,
    pub shape: ParamShape,
    pub opcode: Option<OpCode>,
    pub words: u32,
    pub base: Option<Mnemonic>,
}

// ----------------------------------------------------------------------------
// Field layouts

const OP: u32 = 0b0110011;
const OP_IMM: u32 = 0b0010011;
const LOAD: u32 = 0b0000011;
const STORE: u32 = 0b0100011;
const BRANCH: u32 = 0b1100011;
const OPC_LUI: u32 = 0b0110111;
const OPC_AUIPC: u32 = 0b0010111;
const OPC_JAL: u32 = 0b1101111;
const OPC_JALR: u32 = 0b1100111;
const SYSTEM: u32 = 0b1110011;

fn r_type(funct3: u32, funct7: u32) -> OpCode {
    OpCode(vec![
        Field::fix(FieldRole::Opcode, 7, OP),
        Field::dynamic(FieldRole::Rd, 5),
        Field::fix(FieldRole::Funct3, 3, funct3),
        Field::dynamic(FieldRole::Rs1, 5),
        Field::dynamic(FieldRole::Rs2, 5),
        Field::fix(FieldRole::Funct7, 7, funct7),
    ])
}

fn i_type(opcode: u32, funct3: u32) -> OpCode {
    OpCode(vec![
        Field::fix(FieldRole::Opcode, 7, opcode),
        Field::dynamic(FieldRole::Rd, 5),
        Field::fix(FieldRole::Funct3, 3, funct3),
        Field::dynamic(FieldRole::Rs1, 5),
        Field::dynamic(FieldRole::Imm12, 12),
    ])
}

fn shift_type(funct3: u32, funct7: u32) -> OpCode {
    OpCode(vec![
        Field::fix(FieldRole::Opcode, 7, OP_IMM),
        Field::dynamic(FieldRole::Rd, 5),
        Field::fix(FieldRole::Funct3, 3, funct3),
        Field::dynamic(FieldRole::Rs1, 5),
        Field::dynamic(FieldRole::Shamt, 5),
        Field::fix(FieldRole::Funct7, 7, funct7),
    ])
}

fn s_type(opcode: u32, funct3: u32) -> OpCode {
    OpCode(vec![
        Field::fix(FieldRole::Opcode, 7, opcode),
        Field::dynamic(FieldRole::Imm5, 5),
        Field::fix(FieldRole::Funct3, 3, funct3),
        Field::dynamic(FieldRole::Rs1, 5),
        Field::dynamic(FieldRole::Rs2, 5),
        Field::dynamic(FieldRole::Imm7, 7),
    ])
}

fn u_type(opcode: u32) -> OpCode {
    OpCode(vec![
        Field::fix(FieldRole::Opcode, 7, opcode),
        Field::dynamic(FieldRole::Rd, 5),
        Field::dynamic(FieldRole::Imm20, 20),
    ])
}

fn sys_type(imm12: u32) -> OpCode {
    OpCode(vec![
        Field::fix(FieldRole::Opcode, 7, SYSTEM),
        Field::fix(FieldRole::Rd, 5, 0),
        Field::fix(FieldRole::Funct3, 3, 0),
        Field::fix(FieldRole::Rs1, 5, 0),
        Field::fix(FieldRole::Imm12, 12, imm12),
    ])
}

// ----------------------------------------------------------------------------
// Catalogue

fn real(mnemonic: Mnemonic, shape: ParamShape, opcode: OpCode) -> InstrType {
    InstrType {
        mnemonic,
        pseudo: false,
        shape,
        opcode: Some(opcode),
        words: 1,
        base: None,
    }
}

fn pseudo(mnemonic: Mnemonic, shape: ParamShape, words: u32, base: Mnemonic) -> InstrType {
    InstrType {
        mnemonic,
        pseudo: true,
        shape,
        opcode: None,
        words,
        base: Some(base),
    }
}

pub static CATALOGUE: Lazy<Vec<InstrType>> = Lazy::new(|| {
    use Mnemonic::*;
    use ParamShape::*;
    vec![
        real(ADD, RdRs1Rs2, r_type(0b000, 0)),
        real(SUB, RdRs1Rs2, r_type(0b000, 0b0100000)),
        real(SLL, RdRs1Rs2, r_type(0b001, 0)),
        real(SLT, RdRs1Rs2, r_type(0b010, 0)),
        real(SLTU, RdRs1Rs2, r_type(0b011, 0)),
        real(XOR, RdRs1Rs2, r_type(0b100, 0)),
        real(SRL, RdRs1Rs2, r_type(0b101, 0)),
        real(SRA, RdRs1Rs2, r_type(0b101, 0b0100000)),
        real(OR, RdRs1Rs2, r_type(0b110, 0)),
        real(AND, RdRs1Rs2, r_type(0b111, 0)),
        real(ADDI, RdRs1Imm, i_type(OP_IMM, 0b000)),
        real(SLTI, RdRs1Imm, i_type(OP_IMM, 0b010)),
        real(SLTIU, RdRs1Imm, i_type(OP_IMM, 0b011)),
        real(XORI, RdRs1Imm, i_type(OP_IMM, 0b100)),
        real(ORI, RdRs1Imm, i_type(OP_IMM, 0b110)),
        real(ANDI, RdRs1Imm, i_type(OP_IMM, 0b111)),
        real(SLLI, RdRs1Shamt, shift_type(0b001, 0)),
        real(SRLI, RdRs1Shamt, shift_type(0b101, 0)),
        real(SRAI, RdRs1Shamt, shift_type(0b101, 0b0100000)),
        real(LB, RdOffset, i_type(LOAD, 0b000)),
        real(LH, RdOffset, i_type(LOAD, 0b001)),
        real(LW, RdOffset, i_type(LOAD, 0b010)),
        real(LBU, RdOffset, i_type(LOAD, 0b100)),
        real(LHU, RdOffset, i_type(LOAD, 0b101)),
        real(SB, Rs2Offset, s_type(STORE, 0b000)),
        real(SH, Rs2Offset, s_type(STORE, 0b001)),
        real(SW, Rs2Offset, s_type(STORE, 0b010)),
        real(BEQ, RsRsLabel, s_type(BRANCH, 0b000)),
        real(BNE, RsRsLabel, s_type(BRANCH, 0b001)),
        real(BLT, RsRsLabel, s_type(BRANCH, 0b100)),
        real(BGE, RsRsLabel, s_type(BRANCH, 0b101)),
        real(BLTU, RsRsLabel, s_type(BRANCH, 0b110)),
        real(BGEU, RsRsLabel, s_type(BRANCH, 0b111)),
        real(LUI, RdImm20, u_type(OPC_LUI)),
        real(AUIPC, RdImm20, u_type(OPC_AUIPC)),
        real(JAL, RdLabel, u_type(OPC_JAL)),
        real(JALR, RdRs1Imm, i_type(OPC_JALR, 0b000)),
        real(ECALL, NoParams, sys_type(0)),
        real(EBREAK, NoParams, sys_type(1)),
        pseudo(NOP, NoParams, 1, ADDI),
        pseudo(MV, RdRs1, 1, ADDI),
        pseudo(NOT, RdRs1, 1, XORI),
        pseudo(NEG, RdRs1, 1, SUB),
        pseudo(SEQZ, RdRs1, 1, SLTIU),
        pseudo(SNEZ, RdRs1, 1, SLTU),
        pseudo(SLTZ, RdRs1, 1, SLT),
        pseudo(SGTZ, RdRs1, 1, SLT),
        pseudo(BEQZ, RsLabel, 1, BEQ),
        pseudo(BNEZ, RsLabel, 1, BNE),
        pseudo(BLEZ, RsLabel, 1, BGE),
        pseudo(BGEZ, RsLabel, 1, BGE),
        pseudo(BLTZ, RsLabel, 1, BLT),
        pseudo(BGTZ, RsLabel, 1, BLT),
        pseudo(J, Label, 1, JAL),
        pseudo(JR, Rs, 1, JALR),
        pseudo(RET, NoParams, 1, JALR),
        pseudo(LI, RdImm32, 2, LUI),
        pseudo(LA, RdLabel, 2, LUI),
    ]
});

static INDEX: Lazy<HashMap<Mnemonic, usize>> = Lazy::new(|| {
    CATALOGUE
        .iter()
        .enumerate()
        .map(|(i, it)| (it.mnemonic, i))
        .collect()
});

pub fn lookup(mnemonic: Mnemonic) -> &'static InstrType {
    &CATALOGUE[INDEX[&mnemonic]]
}

/// Match a 32-bit word against the catalogue: the low-order 7-bit
/// opcode segment first, then the remaining static fields. First exact
/// match wins; None means "no instruction".
pub fn decode(word: u32) -> Option<(&'static InstrType, FieldMap)> {
    let low = word & 0x7F;
    for it in CATALOGUE.iter() {
        let Some(op) = &it.opcode else { continue };
        if op.opcode_bits() != Some(low) {
            continue;
        }
        if let Some(fields) = op.decode(word) {
            return Some((it, fields));
        }
    }
    None
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample dynamic values, distinct per role so swapped fields fail.
    fn sample_fields(op: &OpCode) -> FieldMap {
        let mut fields = FieldMap::new();
        for f in op.0.iter().filter(|f| f.value.is_none()) {
            let v = match f.role {
                FieldRole::Rd => 1,
                FieldRole::Rs1 => 2,
                FieldRole::Rs2 => 3,
                FieldRole::Shamt => 4,
                FieldRole::Imm5 => 0x15,
                FieldRole::Imm7 => 0x2A,
                FieldRole::Imm12 => 5,
                FieldRole::Imm20 => 0x12345,
                _ => 0,
            };
            fields.insert(f.role, v);
        }
        fields
    }

    macro_rules! test_roundtrip {
        ($($name:ident: $mnemonic:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let it = lookup($mnemonic);
                    let op = it.opcode.as_ref().unwrap();
                    let fields = sample_fields(op);
                    let word = op.encode(&fields).unwrap();
                    let (decoded, back) = decode(word).unwrap();
                    assert_eq!(decoded.mnemonic, $mnemonic);
                    assert_eq!(back, fields);
                }
            )*
        }
    }

    test_roundtrip! {
        test_add: Mnemonic::ADD,
        test_sub: Mnemonic::SUB,
        test_sll: Mnemonic::SLL,
        test_slt: Mnemonic::SLT,
        test_sltu: Mnemonic::SLTU,
        test_xor: Mnemonic::XOR,
        test_srl: Mnemonic::SRL,
        test_sra: Mnemonic::SRA,
        test_or: Mnemonic::OR,
        test_and: Mnemonic::AND,
        test_addi: Mnemonic::ADDI,
        test_slti: Mnemonic::SLTI,
        test_sltiu: Mnemonic::SLTIU,
        test_xori: Mnemonic::XORI,
        test_ori: Mnemonic::ORI,
        test_andi: Mnemonic::ANDI,
        test_slli: Mnemonic::SLLI,
        test_srli: Mnemonic::SRLI,
        test_srai: Mnemonic::SRAI,
        test_lb: Mnemonic::LB,
        test_lh: Mnemonic::LH,
        test_lw: Mnemonic::LW,
        test_lbu: Mnemonic::LBU,
        test_lhu: Mnemonic::LHU,
        test_sb: Mnemonic::SB,
        test_sh: Mnemonic::SH,
        test_sw: Mnemonic::SW,
        test_beq: Mnemonic::BEQ,
        test_bne: Mnemonic::BNE,
        test_blt: Mnemonic::BLT,
        test_bge: Mnemonic::BGE,
        test_bltu: Mnemonic::BLTU,
        test_bgeu: Mnemonic::BGEU,
        test_lui: Mnemonic::LUI,
        test_auipc: Mnemonic::AUIPC,
        test_jal: Mnemonic::JAL,
        test_jalr: Mnemonic::JALR,
        test_ecall: Mnemonic::ECALL,
        test_ebreak: Mnemonic::EBREAK,
    }

    #[test]
    fn every_opcode_is_32_bits_wide() {
        for it in CATALOGUE.iter() {
            if let Some(op) = &it.opcode {
                assert_eq!(op.width(), 32, "{}", it.mnemonic);
            }
        }
    }

    #[test]
    fn real_forms_own_an_opcode_and_one_word() {
        for it in CATALOGUE.iter() {
            if it.pseudo {
                assert!(it.opcode.is_none(), "{}", it.mnemonic);
                assert!(it.base.is_some(), "{}", it.mnemonic);
            } else {
                assert!(it.opcode.is_some(), "{}", it.mnemonic);
                assert_eq!(it.words, 1, "{}", it.mnemonic);
            }
        }
    }

    #[test]
    fn known_words() {
        // addi x1, x0, 5
        let (it, fields) = decode(0x0050_0093).unwrap();
        assert_eq!(it.mnemonic, Mnemonic::ADDI);
        assert_eq!(fields[&FieldRole::Rd], 1);
        assert_eq!(fields[&FieldRole::Rs1], 0);
        assert_eq!(fields[&FieldRole::Imm12], 5);

        // jal x0, -4
        let (it, fields) = decode(0xFFDF_F06F).unwrap();
        assert_eq!(it.mnemonic, Mnemonic::JAL);
        assert_eq!(crate::imm::jtype_offset(fields[&FieldRole::Imm20]), -4);

        // beq x0, x0, -4
        let (it, fields) = decode(0xFE00_0EE3).unwrap();
        assert_eq!(it.mnemonic, Mnemonic::BEQ);
        assert_eq!(
            crate::imm::btype_offset(fields[&FieldRole::Imm5], fields[&FieldRole::Imm7]),
            -4
        );
    }

    #[test]
    fn unknown_word_is_none() {
        assert_eq!(decode(0xFFFF_FFFF).map(|(it, _)| it.mnemonic), None);
        assert_eq!(decode(0).map(|(it, _)| it.mnemonic), None);
    }
}
