pub mod console;
pub mod dump;

use crate::machine::Machine;

/// Side effects folded over every executed step, the machine threaded
/// through by value.
pub trait Hook {
    fn init(&mut self, machine: Machine) -> Machine;
    fn exec(&mut self, time: u64, pc: u32, word: u32, machine: Machine) -> Machine;
}
