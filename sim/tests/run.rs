use arch::reg::Reg;
use rvsim::exec;
use rvsim::machine::{Machine, StyleMark};

/// Assemble a source text and load the artifact the way a host would:
/// code words at the text base, initialized data at its allocated
/// addresses, pc at the entry address.
fn load(src: &str) -> Machine {
    let unit = rvasm::compile("test", src, &rvasm::Siblings::new());
    assert!(unit.ok, "{:?}", unit.diags);
    let mut machine = Machine::new();
    machine.load_words(0, &unit.artifact.words);
    for entry in unit.artifact.mem_init.iter().filter(|e| e.init) {
        for (i, value) in entry.values.iter().enumerate() {
            machine.mem.save(
                entry.addr + i as u32 * entry.width,
                *value,
                entry.width,
                StyleMark::Data,
            );
        }
    }
    machine.regs.set_pc(unit.artifact.entry);
    machine
}

fn run(machine: &mut Machine, max_steps: usize) {
    for _ in 0..max_steps {
        if machine.halted {
            return;
        }
        exec::step(machine);
    }
    panic!("program did not halt within {max_steps} steps");
}

#[test]
fn li_round_trips_through_lui_addi() {
    for value in [5u32, 0x12345678, 0xCAFEBABE, 0xFFFFFFFF, 0x7FFFF800] {
        let mut m = load(&format!("start: li t0, 0x{value:X}\nebreak\n"));
        run(&mut m, 10);
        assert_eq!(m.regs.get(Reg::T0), value, "li t0, 0x{value:X}");
    }
}

#[test]
fn countdown_loop() {
    let mut m = load(
        "start: li t0, 5\n\
         li t1, 0\n\
         loop: addi t1, t1, 1\n\
         addi t0, t0, -1\n\
         bnez t0, loop\n\
         ebreak\n",
    );
    run(&mut m, 100);
    assert_eq!(m.regs.get(Reg::T0), 0);
    assert_eq!(m.regs.get(Reg::T1), 5);
}

#[test]
fn data_section_is_preloaded() {
    let mut m = load(
        "start: la a0, val\n\
         lw a1, 0(a0)\n\
         ebreak\n\
         .data\n\
         val: .word 0xCAFEBABE\n",
    );
    run(&mut m, 10);
    assert_eq!(m.regs.get(Reg::A1), 0xCAFEBABE);
}

#[test]
fn byte_loads_sign_and_zero_extend() {
    let mut m = load(
        "start: la a0, msg\n\
         lb a1, 0(a0)\n\
         lb a2, 2(a0)\n\
         lbu a3, 3(a0)\n\
         ebreak\n\
         .data\n\
         msg: .asciz \"Hi\"\n\
         neg: .byte 0xFF\n",
    );
    run(&mut m, 10);
    assert_eq!(m.regs.get(Reg::A1), 'H' as u32);
    assert_eq!(m.regs.get(Reg::A2), 0);
    assert_eq!(m.regs.get(Reg::A3), 0xFF);
}

#[test]
fn stores_hit_the_data_section() {
    let mut m = load(
        "start: la a0, buf\n\
         li a1, 0x11223344\n\
         sw a1, 0(a0)\n\
         lh a2, 0(a0)\n\
         ebreak\n\
         .bss\n\
         buf: .word\n",
    );
    run(&mut m, 10);
    assert_eq!(m.regs.get(Reg::A2), 0x3344);
}

#[test]
fn function_call_and_return() {
    let mut m = load(
        "start: li a0, 20\n\
         jal ra, double\n\
         ebreak\n\
         double: add a0, a0, a0\n\
         ret\n",
    );
    run(&mut m, 20);
    assert_eq!(m.regs.get(Reg::A0), 40);
}

#[test]
fn exit_ecall_halts() {
    let mut m = load("start: li a7, 93\necall\nnop\n");
    run(&mut m, 10);
    assert!(m.halted);
}

#[test]
fn console_ecall_collects_bytes() {
    let mut m = load(
        "start: li a7, 64\n\
         li a0, 72\n\
         ecall\n\
         li a0, 105\n\
         ecall\n\
         ebreak\n",
    );
    run(&mut m, 20);
    assert_eq!(m.console, b"Hi");
}

#[test]
fn entry_address_skips_leading_code() {
    let mut m = load(".global main\nhelper: ret\nmain: li t0, 9\nebreak\n");
    assert_eq!(m.regs.pc(), 4);
    run(&mut m, 10);
    assert_eq!(m.regs.get(Reg::T0), 9);
}
