use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use arch::reg::Reg;
use serde::{Deserialize, Serialize};

use super::Hook;
use crate::machine::Machine;

/// Register/memory dump hook. A YAML watch list maps pc values to what
/// to print when execution passes them; `--dump-all` prints the
/// register table on every step instead.
#[derive(Debug)]
pub struct Dump {
    file: Option<String>,
    all: bool,
    list: List,
}

#[derive(Debug, Serialize, Deserialize)]
struct List(HashMap<u32, Config>);

#[derive(Debug, Serialize, Deserialize)]
struct Config {
    regs: bool,
    mem: Vec<u32>,
}

impl Dump {
    pub fn arg(file: Option<String>, all: bool) -> Self {
        match file {
            Some(fname) => {
                let file = File::open(&fname).unwrap();
                let list: List = serde_yaml::from_reader(BufReader::new(file)).unwrap();
                Self {
                    file: Some(fname),
                    list,
                    all,
                }
            }
            None => Self {
                file,
                list: List(HashMap::new()),
                all,
            },
        }
    }

    fn get(&self, pc: u32) -> Option<&Config> {
        self.list.0.get(&pc)
    }
}

impl Hook for Dump {
    fn init(&mut self, machine: Machine) -> Machine {
        if self.all {
            println!(" * Dump all");
        }
        if let Some(fname) = &self.file {
            println!(" * Dump[{}] {:?}", self.list.0.len(), fname);
        }
        machine
    }

    fn exec(&mut self, _time: u64, pc: u32, _word: u32, machine: Machine) -> Machine {
        if let Some(cfg) = self.get(pc) {
            if cfg.regs {
                self.print_reg(&machine);
            }
            self.print_mem(&machine, &cfg.mem);
        } else if self.all {
            self.print_reg(&machine);
        }
        machine
    }
}

impl Dump {
    fn print_reg(&self, machine: &Machine) {
        println!(" +--------------+--------------+--------------+--------------+");
        println!(
            " |   pc: {:0>8X}                                              |",
            machine.regs.pc()
        );
        for row in 0..8 {
            let cell = |i: u8| {
                let reg = Reg::from(i);
                format!("{:>4}: {:0>8X}", reg.to_string(), machine.regs.get(reg))
            };
            println!(
                " | {} | {} | {} | {} |",
                cell(row),
                cell(row + 8),
                cell(row + 16),
                cell(row + 24)
            );
        }
        println!(" +--------------+--------------+--------------+--------------+");
    }

    fn print_mem(&self, machine: &Machine, addrs: &[u32]) {
        for addr in addrs {
            println!(
                " | {:0>8X} : {:0>8X}                                         |",
                addr,
                machine.mem.load(*addr, 4)
            );
        }
        if !addrs.is_empty() {
            println!(" +-------------------------------------------------------------+");
        }
    }
}
