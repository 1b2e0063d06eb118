use arch::opcode::FieldRole;
use rvasm::diag::Severity;
use rvasm::{compile, Siblings, Unit};

fn build(src: &str) -> Unit {
    compile("test", src, &Siblings::new())
}

fn error_messages(unit: &Unit) -> Vec<&str> {
    unit.diags
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.as_str())
        .collect()
}

fn warning_messages(unit: &Unit) -> Vec<&str> {
    unit.diags
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .map(|d| d.message.as_str())
        .collect()
}

#[test]
fn single_addi() {
    let unit = build("addi x1, x0, 5\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.words, vec![0x0050_0093]);

    let (it, fields) = arch::isa::decode(unit.artifact.words[0]).unwrap();
    assert_eq!(it.mnemonic, arch::mnemonic::Mnemonic::ADDI);
    assert_eq!(fields[&FieldRole::Rd], 1);
    assert_eq!(fields[&FieldRole::Rs1], 0);
    assert_eq!(fields[&FieldRole::Imm12], 5);
}

#[test]
fn backward_jump_resolves_to_minus_four() {
    let unit = build("loop: addi x1, x1, 1\nj loop\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.labels.addr_of("loop"), Some(0));
    // j lowers to jal x0 with offset loop - here = -4
    assert_eq!(unit.artifact.words[1], 0xFFDF_F06F);
}

#[test]
fn data_word_lands_aligned_after_text() {
    let unit = build("addi x1, x0, 5\n.data\nval: .word 0xCAFEBABE\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.text_end, 4);
    assert_eq!(unit.artifact.labels.addr_of("val"), Some(4));
    let entry = &unit.artifact.mem_init[0];
    assert_eq!(entry.addr, 4);
    assert_eq!(entry.width, 4);
    assert_eq!(entry.values, vec![0xCAFE_BABE]);
    assert!(entry.init);
}

#[test]
fn duplicate_labels_report_once_and_compile_continues() {
    let unit = build("L: addi x1, x0, 1\nL: addi x2, x0, 2\nfrobnicate x1\n");
    assert!(!unit.ok);
    let errors = error_messages(&unit);
    let duplicates = errors
        .iter()
        .filter(|m| m.contains("Multiple labels"))
        .count();
    assert_eq!(duplicates, 1);
    // The unknown instruction is still reported in the same compile
    assert!(errors.iter().any(|m| m.contains("frobnicate")));
    // Both rows were still placed and encoded
    assert_eq!(unit.artifact.words.len(), 2);
}

#[test]
fn unresolved_branch_target_is_a_warning() {
    let unit = build("beqz x5, target\n");
    assert!(unit.ok, "{:?}", unit.diags);
    let warnings = warning_messages(&unit);
    assert!(warnings.iter().any(|m| m.contains("couldn't get linked")));
    // Best-effort encoding still decodes as a beq
    assert_eq!(unit.artifact.words.len(), 1);
    let (it, _) = arch::isa::decode(unit.artifact.words[0]).unwrap();
    assert_eq!(it.mnemonic, arch::mnemonic::Mnemonic::BEQ);
}

#[test]
fn li_always_lowers_to_two_words() {
    for value in ["5", "0x12345678", "0xCAFEBABE", "-1"] {
        let unit = build(&format!("li t0, {value}\n"));
        assert!(unit.ok, "{:?}", unit.diags);
        assert_eq!(unit.artifact.words.len(), 2, "li t0, {value}");
        let (lui, _) = arch::isa::decode(unit.artifact.words[0]).unwrap();
        let (addi, _) = arch::isa::decode(unit.artifact.words[1]).unwrap();
        assert_eq!(lui.mnemonic, arch::mnemonic::Mnemonic::LUI);
        assert_eq!(addi.mnemonic, arch::mnemonic::Mnemonic::ADDI);
    }
}

#[test]
fn natural_alignment_inserts_unlabeled_padding() {
    let unit = build(".data\nb: .byte 1\nw: .word 2\nh: .half 3\nd: .dword 4\n");
    assert!(unit.ok, "{:?}", unit.diags);
    let labels = &unit.artifact.labels;
    assert_eq!(labels.addr_of("b"), Some(0));
    assert_eq!(labels.addr_of("w"), Some(4));
    assert_eq!(labels.addr_of("h"), Some(8));
    assert_eq!(labels.addr_of("d"), Some(16));
    // Padding bytes own no label
    for gap in [1, 2, 3, 10, 12] {
        assert!(labels.at_addr(gap).is_empty(), "addr {gap}");
    }
}

#[test]
fn unaligned_emitters_pack_tight() {
    let unit = build(".data\nb: .byte 1\nw: .4byte 2\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.labels.addr_of("w"), Some(1));
}

#[test]
fn asciz_emits_nul_terminated_bytes() {
    let unit = build(".data\nmsg: .asciz \"Hi\"\n");
    assert!(unit.ok, "{:?}", unit.diags);
    let entry = &unit.artifact.mem_init[0];
    assert_eq!(entry.values, vec![0x48, 0x69, 0]);
    assert_eq!(entry.width, 1);
}

#[test]
fn bss_reserves_zero_filled_space() {
    let unit = build(".bss\nbuf: .word\nnext: .word\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.labels.addr_of("buf"), Some(0));
    assert_eq!(unit.artifact.labels.addr_of("next"), Some(4));
    assert!(unit.artifact.mem_init.iter().all(|e| !e.init));
}

#[test]
fn sub_labels_qualify_under_their_parent() {
    let unit = build("main: addi x1, x0, 1\n.loop: addi x1, x1, 1\nj .loop\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.labels.addr_of("main.loop"), Some(4));
    // j at 8 targets 4
    let (it, fields) = arch::isa::decode(unit.artifact.words[2]).unwrap();
    assert_eq!(it.mnemonic, arch::mnemonic::Mnemonic::JAL);
    assert_eq!(arch::imm::jtype_offset(fields[&FieldRole::Imm20]), -4);
}

#[test]
fn same_sub_label_under_two_parents_is_fine() {
    let unit = build(
        "f: addi x1, x0, 1\n.done: ret\ng: addi x2, x0, 2\n.done: ret\n",
    );
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.labels.addr_of("f.done"), Some(4));
    assert_eq!(unit.artifact.labels.addr_of("g.done"), Some(12));
}

#[test]
fn store_and_branch_bit_interleaving() {
    // Known encodings, worked out by hand from the S/B field layouts
    let unit = build("sw t0, 64(x0)\nloop: beq x0, x0, loop\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.words[0], 0x0450_2023);
    // beq to itself: offset 0
    let (it, fields) = arch::isa::decode(unit.artifact.words[1]).unwrap();
    assert_eq!(it.mnemonic, arch::mnemonic::Mnemonic::BEQ);
    assert_eq!(
        arch::imm::btype_offset(fields[&FieldRole::Imm5], fields[&FieldRole::Imm7]),
        0
    );
}

#[test]
fn entry_defaults_to_first_instruction() {
    let unit = build("nop\nmain: nop\n");
    assert_eq!(unit.artifact.entry, 0);
}

#[test]
fn global_label_marks_the_entry() {
    let unit = build(".global main\nstart: nop\nmain: nop\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.entry, 4);
}

#[test]
fn instruction_in_data_section_is_an_error() {
    let unit = build(".data\naddi x1, x0, 1\n");
    assert!(!unit.ok);
    assert!(error_messages(&unit)
        .iter()
        .any(|m| m.contains("not allowed in a `.data` section")));
}

#[test]
fn data_directive_without_label_is_an_error() {
    let unit = build(".data\n.word 5\n");
    assert!(!unit.ok);
    assert!(error_messages(&unit)
        .iter()
        .any(|m| m.contains("requires a label")));
}

#[test]
fn pending_label_binds_to_the_next_instruction() {
    let unit = build("start:\nnop\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.labels.addr_of("start"), Some(0));
}

#[test]
fn transcript_covers_every_address() {
    let unit = build("start: li t0, 7\nbeqz t0, start\n");
    assert!(unit.ok, "{:?}", unit.diags);
    let rows = &unit.artifact.transcript;
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows.iter().map(|r| r.addr).collect::<Vec<_>>(),
        vec![0, 4, 8]
    );
    assert_eq!(rows[0].mnemonic, "lui");
    assert_eq!(rows[1].mnemonic, "addi");
    assert_eq!(rows[2].mnemonic, "beq");
    assert_eq!(rows[0].labels, vec!["start".to_string()]);
}

#[test]
fn line_map_points_back_at_source_lines() {
    let unit = build("nop\n\nloop: nop\nj loop\n");
    assert!(unit.ok, "{:?}", unit.diags);
    let map = &unit.artifact.line_map;
    assert_eq!(map.get_by_left(&0), Some(&0));
    assert_eq!(map.get_by_left(&4), Some(&2));
    assert_eq!(map.get_by_left(&8), Some(&3));
    assert_eq!(map.get_by_right(&3), Some(&8));
}

#[test]
fn comment_only_lines_produce_nothing() {
    let unit = build("# a comment\nnop # trailing\n");
    assert!(unit.ok, "{:?}", unit.diags);
    assert_eq!(unit.artifact.words, vec![0x0000_0013]);
}
