use bimap::BiMap;

use arch::disasm;
use arch::imm;
use arch::isa;
use arch::mnemonic::Mnemonic;
use arch::opcode::{FieldMap, FieldRole};
use arch::reg::Reg;

use crate::diag::DiagSink;
use crate::element::{EmitKind, Param};
use crate::labels::{LabelInfo, LabelKind, Labels};
use crate::lexer::Constant;
use crate::row::{InstrRow, Row};
use crate::section::{Section, SectionKind};

pub const TEXT_BASE: u32 = 0;

/// One data allocation: where the label landed, the element width and
/// the values that pre-populate memory. `init: false` entries only
/// reserve zero-filled space.
#[derive(Debug, Clone)]
pub struct MemAllocEntry {
    pub label: String,
    pub addr: u32,
    pub width: u32,
    pub values: Vec<u64>,
    pub init: bool,
}

/// Per-address disassembly view of the emitted code.
#[derive(Debug, Clone)]
pub struct TranscriptRow {
    pub addr: u32,
    pub labels: Vec<String>,
    pub mnemonic: String,
    pub operands: String,
}

/// Everything one compile produces, rebuilt from scratch every time.
#[derive(Debug)]
pub struct Artifact {
    pub words: Vec<u32>,
    pub transcript: Vec<TranscriptRow>,
    pub line_map: BiMap<u32, usize>,
    pub entry: u32,
    pub mem_init: Vec<MemAllocEntry>,
    pub labels: Labels,
    pub text_end: u32,
    pub end: u32,
}

/// Three passes: place `.text` and record its labels, allocate
/// `.data`/`.rodata`/`.bss` with natural alignment, then lower and
/// encode every instruction now that all addresses are known.
pub fn generate(
    sections: &[Section],
    entry_label: Option<&str>,
    diags: &mut DiagSink,
) -> Artifact {
    let mut labels = Labels::new();

    // Pass 1: word-aligned instruction addresses
    let mut pc = TEXT_BASE;
    let mut placed: Vec<(u32, &InstrRow)> = Vec::new();
    for sec in sections.iter().filter(|s| s.kind == SectionKind::Text) {
        for row in &sec.rows {
            if let Row::Instr(ir) = row {
                for label in &ir.labels {
                    define(&mut labels, &label.qualified, LabelKind::Instr, pc, label.pos, diags);
                }
                placed.push((pc, ir));
                pc += 4 * ir.ty.words;
            }
        }
    }
    let text_end = pc;

    // Pass 2: data allocation, aligned to each item's width
    let mut ptr = text_end;
    let mut mem_init = Vec::new();
    for sec in sections.iter().filter(|s| s.kind != SectionKind::Text) {
        for row in &sec.rows {
            match row {
                Row::InitData(r) => {
                    let width = r.emit.width();
                    if r.emit.aligned() {
                        ptr = align_up(ptr, width);
                    }
                    define(
                        &mut labels,
                        &r.label.qualified,
                        LabelKind::InitData,
                        ptr,
                        r.label.pos,
                        diags,
                    );
                    let values = expand_values(&r.value, r.emit, r.line, diags);
                    let count = values.len() as u32;
                    mem_init.push(MemAllocEntry {
                        label: r.label.qualified.clone(),
                        addr: ptr,
                        width,
                        values,
                        init: true,
                    });
                    ptr += width * count;
                }
                Row::UninitData(r) => {
                    let width = r.emit.width();
                    if r.emit.aligned() {
                        ptr = align_up(ptr, width);
                    }
                    define(
                        &mut labels,
                        &r.label.qualified,
                        LabelKind::UninitData,
                        ptr,
                        r.label.pos,
                        diags,
                    );
                    mem_init.push(MemAllocEntry {
                        label: r.label.qualified.clone(),
                        addr: ptr,
                        width,
                        values: vec![0],
                        init: false,
                    });
                    ptr += width;
                }
                _ => {}
            }
        }
    }
    let end = ptr;

    // Pass 3: lower and encode
    let mut words = Vec::new();
    let mut transcript = Vec::new();
    let mut line_map = BiMap::new();
    let mut first_encoded: Option<u32> = None;
    for &(addr, ir) in &placed {
        let (emitted, ok) = lower(ir, addr, &labels, diags);
        line_map.insert(addr, ir.line);
        for (k, word) in emitted.iter().enumerate() {
            let a = addr + 4 * k as u32;
            let (mnemonic, operands) = match isa::decode(*word) {
                Some((it, fields)) => (it.mnemonic.to_string(), disasm::operands(it, &fields)),
                None => ("?".to_string(), format!("0x{word:08X}")),
            };
            transcript.push(TranscriptRow {
                addr: a,
                labels: labels.at_addr(a).iter().map(|s| s.to_string()).collect(),
                mnemonic,
                operands,
            });
            words.push(*word);
        }
        if ok && first_encoded.is_none() {
            first_encoded = Some(addr);
        }
    }

    let marked = entry_label.and_then(|name| {
        let info = labels.get(name);
        if info.is_none() {
            diags.warning(format!("Entry label `{name}` is not defined"), None);
        }
        info.filter(|i| i.kind == LabelKind::Instr).map(|i| i.addr)
    });
    let entry = marked.or(first_encoded).unwrap_or(TEXT_BASE);

    Artifact {
        words,
        transcript,
        line_map,
        entry,
        mem_init,
        labels,
        text_end,
        end,
    }
}

fn align_up(ptr: u32, width: u32) -> u32 {
    ptr.next_multiple_of(width)
}

fn define(
    labels: &mut Labels,
    name: &str,
    kind: LabelKind,
    addr: u32,
    pos: crate::lexer::Pos,
    diags: &mut DiagSink,
) {
    let info = LabelInfo { pos, kind, addr };
    if labels.insert(name.to_string(), info).is_some() {
        diags.error_at(format!("Multiple labels with same name: `{name}`"), pos);
    }
}

/// Values one initialized row contributes, in element-width units.
fn expand_values(value: &Constant, emit: EmitKind, line: usize, diags: &mut DiagSink) -> Vec<u64> {
    let pos = crate::lexer::Pos { line, col: 0 };
    match value {
        Constant::Str(s) => {
            if emit.width() != 1 {
                diags.error_at("String data requires a byte-width directive", pos);
            }
            let mut values: Vec<u64> = s.bytes().map(u64::from).collect();
            if emit.zero_terminated() {
                values.push(0);
            }
            values
        }
        c => {
            let v = c.value().unwrap_or(0);
            let bits = emit.width() * 8;
            if bits < 64 {
                let lo = -(1i64 << (bits - 1));
                let hi = (1i64 << bits) - 1;
                if v < lo || v > hi {
                    diags.warning_at(
                        format!("Value {v} doesn't fit in {bits} bits and was truncated"),
                        pos,
                    );
                }
            }
            let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
            vec![(v as u64) & mask]
        }
    }
}

// ----------------------------------------------------------------------------
// Lowering

fn fields(pairs: &[(FieldRole, u32)]) -> FieldMap {
    pairs.iter().copied().collect()
}

fn param_reg(ir: &InstrRow, i: usize, diags: &mut DiagSink) -> Option<Reg> {
    match ir.params.get(i) {
        Some(Param::Register(r)) => Some(*r),
        _ => {
            diags.error_at(
                format!("`{}`: parameter {} must be a register", ir.mnemonic, i + 1),
                ir.pos,
            );
            None
        }
    }
}

fn param_imm(ir: &InstrRow, i: usize, diags: &mut DiagSink) -> Option<i64> {
    match ir.params.get(i) {
        Some(Param::Constant(c)) => match c.value() {
            Some(v) => Some(v),
            None => {
                diags.error_at(
                    format!("`{}`: parameter {} must be numeric", ir.mnemonic, i + 1),
                    ir.pos,
                );
                None
            }
        },
        _ => {
            diags.error_at(
                format!("`{}`: parameter {} must be a constant", ir.mnemonic, i + 1),
                ir.pos,
            );
            None
        }
    }
}

fn param_offset(ir: &InstrRow, i: usize, diags: &mut DiagSink) -> Option<(i32, Reg)> {
    match ir.params.get(i) {
        Some(Param::Offset { imm, reg }) => Some((*imm, *reg)),
        _ => {
            diags.error_at(
                format!("`{}`: parameter {} must be `imm(reg)`", ir.mnemonic, i + 1),
                ir.pos,
            );
            None
        }
    }
}

/// Resolve a link (or absolute constant) to a target address. A name no
/// label claims is a warning and resolves to zero so encoding proceeds.
fn param_target(ir: &InstrRow, i: usize, labels: &Labels, diags: &mut DiagSink) -> Option<u32> {
    match ir.params.get(i) {
        Some(Param::Link { name, pos }) => match labels.addr_of(name) {
            Some(addr) => Some(addr),
            None => {
                diags.warning_at(format!("Label `{name}` couldn't get linked"), *pos);
                Some(0)
            }
        },
        Some(Param::Constant(c)) => c.value().map(|v| v as u32),
        _ => {
            diags.error_at(
                format!("`{}`: parameter {} must be a label", ir.mnemonic, i + 1),
                ir.pos,
            );
            None
        }
    }
}

fn check_signed(ir: &InstrRow, v: i64, bits: u32, diags: &mut DiagSink) {
    // Accepts the signed range plus raw unsigned bit patterns
    let lo = -(1i64 << (bits - 1));
    let hi = (1i64 << bits) - 1;
    if v < lo || v > hi {
        diags.warning_at(
            format!("`{}`: immediate {v} doesn't fit in {bits} bits", ir.mnemonic),
            ir.pos,
        );
    }
}

fn check_unsigned(ir: &InstrRow, v: i64, bits: u32, diags: &mut DiagSink) {
    if v < 0 || v > (1i64 << bits) - 1 {
        diags.warning_at(
            format!("`{}`: immediate {v} doesn't fit in {bits} bits", ir.mnemonic),
            ir.pos,
        );
    }
}

fn enc(m: Mnemonic, f: &FieldMap, ir: &InstrRow, diags: &mut DiagSink) -> u32 {
    let it = isa::lookup(m);
    let Some(op) = it.opcode.as_ref() else {
        diags.error_at(format!("`{}` has no binary form", ir.mnemonic), ir.pos);
        return 0;
    };
    for role in op.check(f) {
        diags.warning_at(
            format!(
                "`{}`: field {:?} is missing or oversized; zero bits substituted",
                ir.mnemonic, role
            ),
            ir.pos,
        );
    }
    match op.encode(f) {
        Some(word) => word,
        None => {
            diags.error_at(format!("No encoding for `{}`", ir.mnemonic), ir.pos);
            0
        }
    }
}

fn enc_branch(
    m: Mnemonic,
    rs1: Reg,
    rs2: Reg,
    target: u32,
    addr: u32,
    ir: &InstrRow,
    diags: &mut DiagSink,
) -> u32 {
    let offset = target.wrapping_sub(addr) as i32;
    if !(-4096..=4094).contains(&offset) {
        diags.warning_at(
            format!("`{}`: branch offset {offset} is out of range", ir.mnemonic),
            ir.pos,
        );
    }
    let (imm5, imm7) = imm::split_btype(offset);
    enc(
        m,
        &fields(&[
            (FieldRole::Rs1, rs1.num() as u32),
            (FieldRole::Rs2, rs2.num() as u32),
            (FieldRole::Imm5, imm5),
            (FieldRole::Imm7, imm7),
        ]),
        ir,
        diags,
    )
}

fn enc_jal(rd: Reg, target: u32, addr: u32, ir: &InstrRow, diags: &mut DiagSink) -> u32 {
    let offset = target.wrapping_sub(addr) as i32;
    if !(-0x100000..=0xFFFFE).contains(&offset) {
        diags.warning_at(
            format!("`{}`: jump offset {offset} is out of range", ir.mnemonic),
            ir.pos,
        );
    }
    enc(
        Mnemonic::JAL,
        &fields(&[
            (FieldRole::Rd, rd.num() as u32),
            (FieldRole::Imm20, imm::split_jtype(offset)),
        ]),
        ir,
        diags,
    )
}

fn rrr(rd: Reg, rs1: Reg, rs2: Reg) -> FieldMap {
    fields(&[
        (FieldRole::Rd, rd.num() as u32),
        (FieldRole::Rs1, rs1.num() as u32),
        (FieldRole::Rs2, rs2.num() as u32),
    ])
}

fn rri(rd: Reg, rs1: Reg, imm12: i64) -> FieldMap {
    fields(&[
        (FieldRole::Rd, rd.num() as u32),
        (FieldRole::Rs1, rs1.num() as u32),
        (FieldRole::Imm12, (imm12 as u32) & 0xFFF),
    ])
}

/// Lower one instruction row to its word(s). Pseudo forms expand to
/// base-ISA shapes here, so the encoder and the executor never see
/// them. The result is always `ty.words` long; addresses were fixed in
/// pass 1, so failed rows pad with zero words and `ok: false`.
fn lower(
    ir: &InstrRow,
    addr: u32,
    labels: &Labels,
    diags: &mut DiagSink,
) -> (Vec<u32>, bool) {
    use Mnemonic::*;

    let errors_before = diags.error_count();
    let words: Option<Vec<u32>> = (|| {
        Some(match ir.mnemonic {
            ADD | SUB | SLL | SLT | SLTU | XOR | SRL | SRA | OR | AND => {
                let rd = param_reg(ir, 0, diags)?;
                let rs1 = param_reg(ir, 1, diags)?;
                let rs2 = param_reg(ir, 2, diags)?;
                vec![enc(ir.mnemonic, &rrr(rd, rs1, rs2), ir, diags)]
            }
            ADDI | SLTI | SLTIU | XORI | ORI | ANDI | JALR => {
                let rd = param_reg(ir, 0, diags)?;
                let rs1 = param_reg(ir, 1, diags)?;
                let v = param_imm(ir, 2, diags)?;
                check_signed(ir, v, 12, diags);
                vec![enc(ir.mnemonic, &rri(rd, rs1, v), ir, diags)]
            }
            SLLI | SRLI | SRAI => {
                let rd = param_reg(ir, 0, diags)?;
                let rs1 = param_reg(ir, 1, diags)?;
                let v = param_imm(ir, 2, diags)?;
                check_unsigned(ir, v, 5, diags);
                vec![enc(
                    ir.mnemonic,
                    &fields(&[
                        (FieldRole::Rd, rd.num() as u32),
                        (FieldRole::Rs1, rs1.num() as u32),
                        (FieldRole::Shamt, (v as u32) & 0x1F),
                    ]),
                    ir,
                    diags,
                )]
            }
            LB | LH | LW | LBU | LHU => {
                let rd = param_reg(ir, 0, diags)?;
                let (imm, rs1) = param_offset(ir, 1, diags)?;
                check_signed(ir, imm as i64, 12, diags);
                vec![enc(ir.mnemonic, &rri(rd, rs1, imm as i64), ir, diags)]
            }
            SB | SH | SW => {
                let rs2 = param_reg(ir, 0, diags)?;
                let (v, rs1) = param_offset(ir, 1, diags)?;
                check_signed(ir, v as i64, 12, diags);
                let (imm5, imm7) = imm::split_stype(v);
                vec![enc(
                    ir.mnemonic,
                    &fields(&[
                        (FieldRole::Rs1, rs1.num() as u32),
                        (FieldRole::Rs2, rs2.num() as u32),
                        (FieldRole::Imm5, imm5),
                        (FieldRole::Imm7, imm7),
                    ]),
                    ir,
                    diags,
                )]
            }
            BEQ | BNE | BLT | BGE | BLTU | BGEU => {
                let rs1 = param_reg(ir, 0, diags)?;
                let rs2 = param_reg(ir, 1, diags)?;
                let target = param_target(ir, 2, labels, diags)?;
                vec![enc_branch(ir.mnemonic, rs1, rs2, target, addr, ir, diags)]
            }
            LUI | AUIPC => {
                let rd = param_reg(ir, 0, diags)?;
                let v = param_imm(ir, 1, diags)?;
                check_unsigned(ir, v, 20, diags);
                vec![enc(
                    ir.mnemonic,
                    &fields(&[
                        (FieldRole::Rd, rd.num() as u32),
                        (FieldRole::Imm20, (v as u32) & 0xFFFFF),
                    ]),
                    ir,
                    diags,
                )]
            }
            JAL => {
                let rd = param_reg(ir, 0, diags)?;
                let target = param_target(ir, 1, labels, diags)?;
                vec![enc_jal(rd, target, addr, ir, diags)]
            }
            ECALL | EBREAK => vec![enc(ir.mnemonic, &FieldMap::new(), ir, diags)],

            NOP => vec![enc(ADDI, &rri(Reg::ZERO, Reg::ZERO, 0), ir, diags)],
            MV => {
                let rd = param_reg(ir, 0, diags)?;
                let rs = param_reg(ir, 1, diags)?;
                vec![enc(ADDI, &rri(rd, rs, 0), ir, diags)]
            }
            NOT => {
                let rd = param_reg(ir, 0, diags)?;
                let rs = param_reg(ir, 1, diags)?;
                vec![enc(XORI, &rri(rd, rs, -1), ir, diags)]
            }
            NEG => {
                let rd = param_reg(ir, 0, diags)?;
                let rs = param_reg(ir, 1, diags)?;
                vec![enc(SUB, &rrr(rd, Reg::ZERO, rs), ir, diags)]
            }
            SEQZ => {
                let rd = param_reg(ir, 0, diags)?;
                let rs = param_reg(ir, 1, diags)?;
                vec![enc(SLTIU, &rri(rd, rs, 1), ir, diags)]
            }
            SNEZ => {
                let rd = param_reg(ir, 0, diags)?;
                let rs = param_reg(ir, 1, diags)?;
                vec![enc(SLTU, &rrr(rd, Reg::ZERO, rs), ir, diags)]
            }
            SLTZ => {
                let rd = param_reg(ir, 0, diags)?;
                let rs = param_reg(ir, 1, diags)?;
                vec![enc(SLT, &rrr(rd, rs, Reg::ZERO), ir, diags)]
            }
            SGTZ => {
                let rd = param_reg(ir, 0, diags)?;
                let rs = param_reg(ir, 1, diags)?;
                vec![enc(SLT, &rrr(rd, Reg::ZERO, rs), ir, diags)]
            }
            BEQZ | BNEZ | BLEZ | BGEZ | BLTZ | BGTZ => {
                let rs = param_reg(ir, 0, diags)?;
                let target = param_target(ir, 1, labels, diags)?;
                let (base, rs1, rs2) = match ir.mnemonic {
                    BEQZ => (BEQ, rs, Reg::ZERO),
                    BNEZ => (BNE, rs, Reg::ZERO),
                    BLEZ => (BGE, Reg::ZERO, rs),
                    BGEZ => (BGE, rs, Reg::ZERO),
                    BLTZ => (BLT, rs, Reg::ZERO),
                    _ => (BLT, Reg::ZERO, rs),
                };
                vec![enc_branch(base, rs1, rs2, target, addr, ir, diags)]
            }
            J => {
                let target = param_target(ir, 0, labels, diags)?;
                vec![enc_jal(Reg::ZERO, target, addr, ir, diags)]
            }
            JR => {
                let rs = param_reg(ir, 0, diags)?;
                vec![enc(JALR, &rri(Reg::ZERO, rs, 0), ir, diags)]
            }
            RET => vec![enc(JALR, &rri(Reg::ZERO, Reg::RA, 0), ir, diags)],
            LI => {
                let rd = param_reg(ir, 0, diags)?;
                let v = param_imm(ir, 1, diags)?;
                if v < i32::MIN as i64 || v > u32::MAX as i64 {
                    diags.warning_at(
                        format!("`li`: value {v} doesn't fit in 32 bits"),
                        ir.pos,
                    );
                }
                li_pair(rd, v as u32, ir, diags)
            }
            LA => {
                let rd = param_reg(ir, 0, diags)?;
                let target = param_target(ir, 1, labels, diags)?;
                li_pair(rd, target, ir, diags)
            }
        })
    })();

    let ok = words.is_some() && diags.error_count() == errors_before;
    let mut words = words.unwrap_or_default();
    words.resize(ir.ty.words as usize, 0);
    (words, ok)
}

/// The LUI/ADDI expansion shared by `li` and `la`: always two words,
/// upper 20 sign-adjusted against ADDI's extension of the lower 12.
fn li_pair(rd: Reg, value: u32, ir: &InstrRow, diags: &mut DiagSink) -> Vec<u32> {
    let (hi, lo) = imm::split_hi_lo(value);
    vec![
        enc(
            Mnemonic::LUI,
            &fields(&[(FieldRole::Rd, rd.num() as u32), (FieldRole::Imm20, hi)]),
            ir,
            diags,
        ),
        enc(Mnemonic::ADDI, &rri(rd, rd, lo as i64), ir, diags),
    ]
}
