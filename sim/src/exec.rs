use arch::imm;
use arch::isa;
use arch::mnemonic::Mnemonic;
use arch::opcode::{FieldMap, FieldRole};
use arch::reg::Reg;

use crate::machine::{Machine, StyleMark};

/// Outcome of one fetch-decode-execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Executed { pc: u32, word: u32 },
    Halted { pc: u32, word: u32 },
    /// The fetched word matched no catalogued instruction
    Unknown { pc: u32, word: u32 },
}

fn reg(fields: &FieldMap, role: FieldRole) -> Reg {
    Reg::from(fields.get(&role).copied().unwrap_or(0) as u8)
}

fn field(fields: &FieldMap, role: FieldRole) -> u32 {
    fields.get(&role).copied().unwrap_or(0)
}

/// Execute the instruction at pc. Arithmetic is fixed-width 32-bit
/// two's complement; branches and jumps set pc explicitly, everything
/// else advances it by 4. Only base-ISA shapes ever reach this point,
/// pseudo forms were lowered at assembly time.
pub fn step(m: &mut Machine) -> Step {
    use FieldRole::*;
    use Mnemonic::*;

    let pc = m.regs.pc();
    let word = m.mem.load(pc, 4);
    let Some((it, fields)) = isa::decode(word) else {
        m.halted = true;
        return Step::Unknown { pc, word };
    };

    let rd = reg(&fields, Rd);
    let rs1v = m.regs.get(reg(&fields, Rs1));
    let rs2v = m.regs.get(reg(&fields, Rs2));
    let imm_i = imm::itype_imm(field(&fields, Imm12));
    let shamt = field(&fields, Shamt) & 0x1F;
    let mut next = pc.wrapping_add(4);

    match it.mnemonic {
        ADD => m.regs.set(rd, rs1v.wrapping_add(rs2v)),
        SUB => m.regs.set(rd, rs1v.wrapping_sub(rs2v)),
        SLL => m.regs.set(rd, rs1v.wrapping_shl(rs2v & 0x1F)),
        SLT => m.regs.set(rd, ((rs1v as i32) < (rs2v as i32)) as u32),
        SLTU => m.regs.set(rd, (rs1v < rs2v) as u32),
        XOR => m.regs.set(rd, rs1v ^ rs2v),
        SRL => m.regs.set(rd, rs1v.wrapping_shr(rs2v & 0x1F)),
        SRA => m.regs.set(rd, ((rs1v as i32) >> (rs2v & 0x1F)) as u32),
        OR => m.regs.set(rd, rs1v | rs2v),
        AND => m.regs.set(rd, rs1v & rs2v),

        ADDI => m.regs.set(rd, rs1v.wrapping_add(imm_i as u32)),
        SLTI => m.regs.set(rd, ((rs1v as i32) < imm_i) as u32),
        SLTIU => m.regs.set(rd, (rs1v < imm_i as u32) as u32),
        XORI => m.regs.set(rd, rs1v ^ imm_i as u32),
        ORI => m.regs.set(rd, rs1v | imm_i as u32),
        ANDI => m.regs.set(rd, rs1v & imm_i as u32),
        SLLI => m.regs.set(rd, rs1v.wrapping_shl(shamt)),
        SRLI => m.regs.set(rd, rs1v.wrapping_shr(shamt)),
        SRAI => m.regs.set(rd, ((rs1v as i32) >> shamt) as u32),

        LB => {
            let v = m.mem.load(rs1v.wrapping_add(imm_i as u32), 1);
            m.regs.set(rd, imm::sign_extend(v, 8) as u32);
        }
        LH => {
            let v = m.mem.load(rs1v.wrapping_add(imm_i as u32), 2);
            m.regs.set(rd, imm::sign_extend(v, 16) as u32);
        }
        LW => {
            let v = m.mem.load(rs1v.wrapping_add(imm_i as u32), 4);
            m.regs.set(rd, v);
        }
        LBU => {
            let v = m.mem.load(rs1v.wrapping_add(imm_i as u32), 1);
            m.regs.set(rd, v);
        }
        LHU => {
            let v = m.mem.load(rs1v.wrapping_add(imm_i as u32), 2);
            m.regs.set(rd, v);
        }

        SB | SH | SW => {
            let imm_s = imm::stype_imm(field(&fields, Imm5), field(&fields, Imm7));
            let addr = rs1v.wrapping_add(imm_s as u32);
            let count = match it.mnemonic {
                SB => 1,
                SH => 2,
                _ => 4,
            };
            m.mem.save(addr, rs2v as u64, count, StyleMark::Data);
        }

        BEQ | BNE | BLT | BGE | BLTU | BGEU => {
            let taken = match it.mnemonic {
                BEQ => rs1v == rs2v,
                BNE => rs1v != rs2v,
                BLT => (rs1v as i32) < (rs2v as i32),
                BGE => (rs1v as i32) >= (rs2v as i32),
                BLTU => rs1v < rs2v,
                _ => rs1v >= rs2v,
            };
            if taken {
                let offset = imm::btype_offset(field(&fields, Imm5), field(&fields, Imm7));
                next = pc.wrapping_add(offset as u32);
            }
        }

        LUI => m.regs.set(rd, field(&fields, Imm20) << 12),
        AUIPC => m.regs.set(rd, pc.wrapping_add(field(&fields, Imm20) << 12)),
        JAL => {
            m.regs.set(rd, pc.wrapping_add(4));
            let offset = imm::jtype_offset(field(&fields, Imm20));
            next = pc.wrapping_add(offset as u32);
        }
        JALR => {
            let target = rs1v.wrapping_add(imm_i as u32) & !1;
            m.regs.set(rd, pc.wrapping_add(4));
            next = target;
        }

        ECALL => match m.regs.get(Reg::A7) {
            // The modeled subset: exit and console byte write
            93 => m.halted = true,
            64 => m.console.push(m.regs.get(Reg::A0) as u8),
            _ => {}
        },
        EBREAK => m.halted = true,

        // Pseudo forms never decode
        _ => unreachable!("pseudo instruction reached the executor"),
    }

    m.regs.set_pc(next);
    if m.halted {
        Step::Halted { pc, word }
    } else {
        Step::Executed { pc, word }
    }
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run(words: &[u32], steps: usize) -> Machine {
        let mut m = Machine::new();
        m.load_words(0, words);
        for _ in 0..steps {
            if m.halted {
                break;
            }
            step(&mut m);
        }
        m
    }

    #[test]
    fn addi_writes_rd() {
        // addi x1, x0, 5
        let m = run(&[0x0050_0093], 1);
        assert_eq!(m.regs.get(Reg::RA), 5);
        assert_eq!(m.regs.pc(), 4);
    }

    #[test]
    fn slt_is_signed_sltu_is_not() {
        // addi x5, x0, -1 ; slt x6, x5, x0 ; sltu x7, x5, x0
        let m = run(&[0xFFF0_0293, 0x0002_A333, 0x0002_B3B3], 3);
        assert_eq!(m.regs.get(Reg::T0), 0xFFFF_FFFF);
        assert_eq!(m.regs.get(Reg::T1), 1);
        assert_eq!(m.regs.get(Reg::T2), 0);
    }

    #[test]
    fn sra_keeps_sign_srl_does_not() {
        // addi x5, x0, -8 ; srai x6, x5, 1 ; srli x7, x5, 1
        let m = run(&[0xFF80_0293, 0x4012_D313, 0x0012_D393], 3);
        assert_eq!(m.regs.get(Reg::T1), (-4i32) as u32);
        assert_eq!(m.regs.get(Reg::T2), 0x7FFF_FFFC);
    }

    #[test]
    fn branch_taken_sets_pc() {
        // beq x0, x0, -4 at pc 4
        let mut m = Machine::new();
        m.load_words(0, &[0x0000_0013, 0xFE00_0EE3]);
        step(&mut m);
        step(&mut m);
        assert_eq!(m.regs.pc(), 0);
    }

    #[test]
    fn jal_links_and_jumps() {
        // jal x1, -4 at pc 0 wraps pc backwards
        let mut m = Machine::new();
        m.load_words(0, &[0xFFDF_F0EF]);
        step(&mut m);
        assert_eq!(m.regs.get(Reg::RA), 4);
        assert_eq!(m.regs.pc(), (-4i32) as u32);
    }

    #[test]
    fn load_from_unbacked_address_is_zero() {
        // lw x5, 64(x0)
        let m = run(&[0x0400_2283], 1);
        assert_eq!(m.regs.get(Reg::T0), 0);
    }

    #[test]
    fn store_then_load() {
        // addi x5, x0, 77 ; sw x5, 64(x0) ; lw x6, 64(x0)
        let m = run(&[0x04D0_0293, 0x0450_2023, 0x0400_2303], 3);
        assert_eq!(m.regs.get(Reg::T1), 77);
        assert_eq!(m.mem.mark(64), StyleMark::Data);
    }

    #[test]
    fn unknown_word_halts() {
        let mut m = Machine::new();
        m.load_words(0, &[0xFFFF_FFFF]);
        let step = step(&mut m);
        assert_eq!(step, Step::Unknown { pc: 0, word: 0xFFFF_FFFF });
        assert!(m.halted);
    }

    #[test]
    fn ebreak_halts() {
        let m = run(&[0x0010_0073], 5);
        assert!(m.halted);
        assert_eq!(m.regs.pc(), 4);
    }

    #[test]
    fn ecall_console_write() {
        // addi a7, x0, 64 ; addi a0, x0, 65 ; ecall
        let m = run(&[0x0400_0893, 0x0410_0513, 0x0000_0073], 3);
        assert_eq!(m.console, b"A");
    }
}
