use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    FromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[repr(u8)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum Mnemonic {
    // R-type
    ADD,
    SUB,
    SLL,
    SLT,
    SLTU,
    XOR,
    SRL,
    SRA,
    OR,
    AND,
    // I-type
    ADDI,
    SLTI,
    SLTIU,
    XORI,
    ORI,
    ANDI,
    SLLI,
    SRLI,
    SRAI,
    // Loads
    LB,
    LH,
    LW,
    LBU,
    LHU,
    // Stores
    SB,
    SH,
    SW,
    // Branches
    BEQ,
    BNE,
    BLT,
    BGE,
    BLTU,
    BGEU,
    // Upper immediate / jumps
    LUI,
    AUIPC,
    JAL,
    JALR,
    // System
    ECALL,
    EBREAK,
    // Pseudo instructions, lowered before encoding
    #[default]
    NOP,
    MV,
    NOT,
    NEG,
    SEQZ,
    SNEZ,
    SLTZ,
    SGTZ,
    BEQZ,
    BNEZ,
    BLEZ,
    BGEZ,
    BLTZ,
    BGTZ,
    J,
    JR,
    RET,
    LI,
    LA,
}

impl Mnemonic {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Undefined instruction: {s}")),
        }
    }
}

#[test]
fn test() {
    assert_eq!(Mnemonic::parse("add"), Ok(Mnemonic::ADD));
    assert_eq!(Mnemonic::parse("ADDI"), Ok(Mnemonic::ADDI));
    assert_eq!(Mnemonic::parse("bgeu"), Ok(Mnemonic::BGEU));
    assert_eq!(Mnemonic::LI.to_string(), "li");
    assert!(Mnemonic::parse("hoge").is_err());
}
