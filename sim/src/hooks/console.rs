use std::io::Write;

use color_print::cprintln;

use super::Hook;
use crate::machine::Machine;

/// Renders console ecall output to stdout, optionally mirroring it into
/// a capture file.
pub struct Console {
    style: bool,
    capture: Option<Box<dyn std::io::Write>>,
}

impl Console {
    pub fn arg(style: bool, capture_file: Option<String>) -> Self {
        let capture = capture_file.map(|file| {
            let file = std::fs::File::create(file).unwrap();
            Box::new(std::io::BufWriter::new(file)) as Box<dyn std::io::Write>
        });
        Console { style, capture }
    }
}

impl Hook for Console {
    fn init(&mut self, machine: Machine) -> Machine {
        println!(" * Console");
        machine
    }

    fn exec(&mut self, _time: u64, _pc: u32, _word: u32, mut machine: Machine) -> Machine {
        for byte in machine.console.drain(..) {
            let c = byte as char;
            match self.style {
                true => cprintln!(" > <r,s>{}</>", c),
                false => print!("{}", c),
            }
            if let Some(buf) = self.capture.as_mut() {
                buf.write_all(&[byte]).unwrap();
            }
        }
        machine
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        if let Some(buf) = self.capture.as_mut() {
            buf.flush().unwrap();
        }
    }
}
