use clap::Parser;
use color_print::cprintln;

use rvsim::exec::{self, Step};
use rvsim::hooks::{console::Console, dump::Dump, Hook};
use rvsim::machine::Machine;

#[derive(Parser, Debug)]
#[clap(
    name = "RV32 Simulator",
    version,
    about = "Simulator for the RV32 educational ISA"
)]
struct Args {
    /// Stop after this many steps
    #[arg(short = 't', long)]
    tmax: Option<u64>,

    /// YAML watch list mapping pc values to register/memory dumps
    #[arg(short, long)]
    dump_cfg: Option<String>,

    /// Dump the register table on every step
    #[arg(short = 'a', long)]
    dump_all: bool,

    /// Mirror console output into a file
    #[arg(short, long)]
    console_out: Option<String>,

    /// Decorate console output instead of writing it raw
    #[arg(short, long)]
    style: bool,

    #[arg(default_value = "main.bin")]
    input_file: String,
}

fn main() {
    let args = Args::parse();
    println!("RV32 Simulator");

    println!("+-----------------------------------------------+");
    println!("| {:<45} |", args.input_file);
    println!("+-----------------------------------------------+");

    // ------------------------------------------------------------------------
    // Initialize the machine model
    let mut machine = {
        let bytes = std::fs::read(&args.input_file).unwrap_or_else(|e| {
            cprintln!("<red,bold>error</>: cannot read {}: {}", args.input_file, e);
            std::process::exit(1);
        });
        let mut machine = Machine::new();
        machine.load_bytes(0, &bytes);
        machine
    };

    // ------------------------------------------------------------------------
    // Initialize hooks
    println!("[INIT]");
    let mut hooks: Vec<Box<dyn Hook>> = vec![
        Box::new(Dump::arg(args.dump_cfg, args.dump_all)),
        Box::new(Console::arg(args.style, args.console_out)),
    ];
    machine = hooks
        .iter_mut()
        .fold(machine, |machine, hook| hook.init(machine));

    // ------------------------------------------------------------------------
    // Main loop
    for time in match args.tmax {
        Some(t) => 0_u64..t,
        None => 0_u64..u64::MAX,
    } {
        let (pc, word, unknown) = match exec::step(&mut machine) {
            Step::Executed { pc, word } | Step::Halted { pc, word } => (pc, word, false),
            Step::Unknown { pc, word } => (pc, word, true),
        };
        machine = hooks
            .iter_mut()
            .fold(machine, |machine, hook| hook.exec(time, pc, word, machine));
        if unknown {
            cprintln!(
                "<red,bold>error</>: no instruction matches 0x{:0>8X} at pc 0x{:0>8X}",
                word,
                pc
            );
            break;
        }
        if machine.halted {
            break;
        }
    }

    println!("=================================================");
}
