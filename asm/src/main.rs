use std::io::Write;

use color_print::{cformat, cprintln};

use rvasm::diag::Error;
use rvasm::{compile, Siblings};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input files; later files can `.import` earlier ones
    #[clap(default_value = "main.s")]
    input: Vec<String>,

    /// Output image
    #[clap(short, long, default_value = "main.bin")]
    output: String,

    /// Dump the transcript (per-address disassembly)
    #[clap(short, long)]
    dump: bool,
}

fn main() {
    use clap::Parser;

    let args: Args = Args::parse();
    println!("RV32 Assembler");

    println!("1. Read Files and Compile");
    let mut units = Siblings::new();
    let mut failed = false;
    for path in &args.input {
        println!("  < {}", path);
        match run_one(path, &units) {
            Ok(unit) => {
                failed |= !unit.ok;
                units.insert(unit.name.clone(), unit);
            }
            Err(err) => {
                cprintln!("<red,bold>error</>: {}", err);
                failed = true;
            }
        }
    }
    if failed {
        cprintln!("<red,bold>error</>: compilation failed, no image written");
        std::process::exit(1);
    }

    println!("2. Write Image");
    println!("  > {}", &args.output);
    let Some(unit) = units.values().last() else {
        return;
    };
    if let Err(err) = write_image(&args.output, unit) {
        cprintln!("<red,bold>error</>: {}", err);
        std::process::exit(1);
    }

    if args.dump {
        dump(unit);
    }
}

fn run_one(path: &str, units: &Siblings) -> Result<rvasm::Unit, Error> {
    let source =
        std::fs::read_to_string(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
    let name = path
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .trim_end_matches(".s")
        .to_string();
    let unit = compile(&name, &source, units);

    let lines: Vec<String> = source.lines().map(str::to_string).collect();
    for diag in &unit.diags {
        diag.print(path, &lines);
    }
    Ok(unit)
}

/// The image is byte-addressed from the text base: code words little
/// endian, then the initialized data at its allocated addresses. `.bss`
/// space stays out of the file; memory reads back zero there anyway.
fn write_image(path: &str, unit: &rvasm::Unit) -> Result<(), Error> {
    let art = &unit.artifact;
    let mut image: Vec<u8> = Vec::new();
    for word in &art.words {
        image.extend_from_slice(&word.to_le_bytes());
    }
    for entry in art.mem_init.iter().filter(|e| e.init) {
        for (i, value) in entry.values.iter().enumerate() {
            let addr = entry.addr as usize + i * entry.width as usize;
            let end = addr + entry.width as usize;
            if image.len() < end {
                image.resize(end, 0);
            }
            image[addr..end].copy_from_slice(&value.to_le_bytes()[..entry.width as usize]);
        }
    }

    let mut file =
        std::fs::File::create(path).map_err(|e| Error::FileCreate(path.to_string(), e))?;
    file.write_all(&image)
        .map_err(|e| Error::FileWrite(path.to_string(), e))?;
    Ok(())
}

fn dump(unit: &rvasm::Unit) {
    let art = &unit.artifact;
    println!("------+----------+----------------------------------------");
    for row in &art.transcript {
        let labels = row.labels.join(", ");
        let line = art
            .line_map
            .get_by_left(&row.addr)
            .map(|l| (l + 1).to_string())
            .unwrap_or_default();
        println!(
            "{}",
            cformat!(
                "<g>{:>5}</> | <y>{:0>8X}</> | {:<12} <r>{:<6}</><b>{}</>",
                line,
                row.addr,
                labels,
                row.mnemonic,
                row.operands
            )
        );
    }
    println!("------+----------+----------------------------------------");
    cprintln!("entry = <y>0x{:0>8X}</>", art.entry);
}
