/// Stack and call operations for the script VM
///
/// This module handles:
/// - Stack manipulation (nop, pop, dup)
/// - Nested calls and returns
///
/// In a global script every return ends the script. In an entity script a
/// return pops the current frame, and ends the script when none is left.
use crate::error::ScriptError;
use crate::instruction::{Instruction, Operand};
use crate::interpreter::{ExecutionResult, Executor};
use crate::opcode_tables::Opcode;
use log::debug;

impl Executor<'_> {
    /// Handle stack and call-related opcodes
    pub fn execute_stack_op(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.opcode {
            Opcode::Nop => Ok(ExecutionResult::Continue),

            Opcode::Pop => {
                let discarded = self.script.pop()?;
                debug!("pop {}", discarded);
                Ok(ExecutionResult::Continue)
            }

            Opcode::Dup => {
                let copy = self.script.peek()?.clone();
                debug!("dup {}", copy);
                self.script.push(copy)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Call => {
                let Operand::CallTarget(target) = inst.operand else {
                    return Err(ScriptError::UnhandledOpcode(inst.opcode.name()));
                };
                debug!(
                    "call {} (depth {})",
                    target,
                    self.script.frame_depth() + 1
                );
                self.script.push_stack_frame(target)?;
                Ok(ExecutionResult::Called)
            }

            Opcode::Return => {
                if self.script.is_global_script() {
                    debug!("ret in global script, stopping");
                    self.script.stop();
                    return Ok(ExecutionResult::Stopped);
                }
                match self.script.pop_stack_frame() {
                    Some(frame) => {
                        debug!(
                            "ret to {} (called from {})",
                            frame.return_pos, frame.call_site
                        );
                        Ok(ExecutionResult::Returned)
                    }
                    None => {
                        debug!("ret at outermost level of entity script");
                        self.script.stop();
                        Ok(ExecutionResult::Stopped)
                    }
                }
            }

            _ => Err(ScriptError::UnhandledOpcode(inst.opcode.name())),
        }
    }
}
