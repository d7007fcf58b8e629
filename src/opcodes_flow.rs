/// Jump and comparison-jump operations for the script VM
///
/// Every jump carries a pre-decoded absolute code position. Conditional
/// jumps pop their operand(s), evaluate, and either redirect the
/// instruction pointer (taken) or fall through.
///
/// - jf: taken when the popped Number is below 1.0
/// - jt: taken when the popped Number is 1.0 or more
/// - jeq/jne, jstr_eq/jstr_ne, jent_eq/jent_ne: equality per value kind
/// - jge/jgt/jlt/jle: taken when `first-popped OP second-popped` holds
use crate::error::ScriptError;
use crate::instruction::{Instruction, Operand};
use crate::interpreter::{ExecutionResult, Executor};
use crate::opcode_tables::Opcode;
use log::debug;
use std::cmp::Ordering;

impl Executor<'_> {
    fn branch(&mut self, inst: &Instruction, taken: bool) -> Result<ExecutionResult, ScriptError> {
        let Operand::CodeOffset(target) = inst.operand else {
            return Err(ScriptError::UnhandledOpcode(inst.opcode.name()));
        };
        if taken {
            debug!("{} taken -> {}", inst.opcode.name(), target);
            self.script.set_code_pos(target)?;
            Ok(ExecutionResult::Branched)
        } else {
            Ok(ExecutionResult::Continue)
        }
    }

    fn equality_jump(
        &mut self,
        inst: &Instruction,
        kind: &'static str,
        on_equal: bool,
    ) -> Result<ExecutionResult, ScriptError> {
        let (lhs, rhs) = self.pop_operands()?;
        if lhs.kind_name() != kind {
            return Err(ScriptError::TypeMismatch {
                expected: kind,
                found: lhs.kind_name(),
            });
        }
        let equal = lhs.equals(&rhs)?;
        self.branch(inst, equal == on_equal)
    }

    fn ordering_jump(
        &mut self,
        inst: &Instruction,
        pred: fn(Ordering) -> bool,
    ) -> Result<ExecutionResult, ScriptError> {
        let (lhs, rhs) = self.pop_operands()?;
        let lhs = lhs.as_number()?;
        let rhs = rhs.as_number()?;
        let taken = lhs.partial_cmp(&rhs).is_some_and(pred);
        self.branch(inst, taken)
    }

    /// Handle jump opcodes
    pub fn execute_flow_op(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.opcode {
            Opcode::Jump => self.branch(inst, true),

            Opcode::JumpIfFalse => {
                let value = self.script.pop_number()?;
                self.branch(inst, value < 1.0)
            }

            Opcode::JumpIfTrue => {
                let value = self.script.pop_number()?;
                self.branch(inst, value >= 1.0)
            }

            Opcode::JumpIfEqual => self.equality_jump(inst, "number", true),
            Opcode::JumpIfNotEqual => self.equality_jump(inst, "number", false),
            Opcode::JumpIfStrEqual => self.equality_jump(inst, "string", true),
            Opcode::JumpIfStrNotEqual => self.equality_jump(inst, "string", false),
            Opcode::JumpIfEntityEqual => self.equality_jump(inst, "entity", true),
            Opcode::JumpIfEntityNotEqual => self.equality_jump(inst, "entity", false),

            Opcode::JumpIfGreaterEqual => self.ordering_jump(inst, Ordering::is_ge),
            Opcode::JumpIfGreater => self.ordering_jump(inst, Ordering::is_gt),
            Opcode::JumpIfLess => self.ordering_jump(inst, Ordering::is_lt),
            Opcode::JumpIfLessEqual => self.ordering_jump(inst, Ordering::is_le),

            _ => Err(ScriptError::UnhandledOpcode(inst.opcode.name())),
        }
    }
}
