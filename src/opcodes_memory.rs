/// Memory operations for the script VM
///
/// This module handles value movement between memory slots, literals and
/// the value stack:
/// - load/store between a memory slot and the stack top
/// - push of Number, String (via the string table) and Entity literals
use crate::error::ScriptError;
use crate::instruction::{Instruction, Operand};
use crate::interpreter::{ExecutionResult, Executor};
use crate::opcode_tables::Opcode;
use crate::value::StackValue;
use log::debug;

impl Executor<'_> {
    /// Handle memory access opcodes
    pub fn execute_memory_op(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.operand {
            // load: push a copy of the slot's value
            Operand::Slot(slot) if inst.opcode == Opcode::Load => {
                let value = self.script.get_value_at(slot)?.clone();
                debug!("load ${} = {}", slot, value);
                self.script.push(value)?;
                Ok(ExecutionResult::Continue)
            }

            // store: move the stack top into the slot
            Operand::Slot(slot) => {
                // check the slot before consuming the operand
                self.script.get_value_at(slot)?;
                let value = self.script.pop()?;
                debug!("store ${} = {}", slot, value);
                self.script.set_value_at(slot, value)?;
                Ok(ExecutionResult::Continue)
            }

            Operand::Number(n) => {
                self.script.push(StackValue::Number(n))?;
                Ok(ExecutionResult::Continue)
            }

            Operand::StringIndex(index) => {
                let text = self.script.get_string(index)?;
                self.script.push(StackValue::String(text))?;
                Ok(ExecutionResult::Continue)
            }

            Operand::Entity(handle) => {
                self.script.push(StackValue::Entity(handle))?;
                Ok(ExecutionResult::Continue)
            }

            _ => Err(ScriptError::UnhandledOpcode(inst.opcode.name())),
        }
    }
}
