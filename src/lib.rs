//! grimoire: embedded scripting VM for game entities and world events
//!
//! Scripts are stack-based bytecode. Most instructions only touch the
//! script's own stack, memory slots and call frames; API instructions call
//! into the engine through the traits in `host`, and may suspend the script
//! until an asynchronous engine operation completes.

#[macro_use]
extern crate lazy_static;

pub mod assembler;
pub mod bytecode;
pub mod config;
pub mod disassembler;
pub mod error;
pub mod host;
pub mod host_headless;
pub mod instruction;
pub mod interpreter;
pub mod opcode_tables;
pub mod random;
pub mod script;
pub mod suspension;
pub mod value;

mod opcodes_combat;
mod opcodes_flow;
mod opcodes_gui;
mod opcodes_math;
mod opcodes_memory;
mod opcodes_stack;
mod opcodes_world;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod branch_tests;
#[cfg(test)]
mod call_tests;
