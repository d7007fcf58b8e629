/// Arithmetic, comparison and cast operations for the script VM
///
/// This module handles all value-computing opcodes:
/// - Arithmetic (neg, mul, add, mod, div, sub) and string concatenation
/// - Logical operations over Number truthiness (not, and, or)
/// - Non-jumping comparisons that push 1 or 0
/// - Number <-> String casts
///
/// Binary operators pop the left operand first (it is on top of the
/// stack), then the right operand.
use crate::error::ScriptError;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Executor};
use crate::opcode_tables::Opcode;
use crate::value::StackValue;
use log::debug;
use std::cmp::Ordering;

impl Executor<'_> {
    /// Pop left then right operand
    pub(crate) fn pop_operands(&mut self) -> Result<(StackValue, StackValue), ScriptError> {
        let lhs = self.script.pop()?;
        let rhs = self.script.pop()?;
        Ok((lhs, rhs))
    }

    /// Pop two operands, compare them and push the boolean outcome
    fn compare_op(&mut self, pred: fn(Ordering) -> bool) -> Result<ExecutionResult, ScriptError> {
        let (lhs, rhs) = self.pop_operands()?;
        let ordering = lhs.compare(&rhs)?;
        // NaN compares false to everything
        let result = ordering.is_some_and(pred);
        self.script.push(StackValue::from_bool(result))?;
        Ok(ExecutionResult::Continue)
    }

    /// Pop two operands that must both be of `kind` and push equality
    fn equality_op(&mut self, kind: &'static str, equal: bool) -> Result<ExecutionResult, ScriptError> {
        let (lhs, rhs) = self.pop_operands()?;
        if lhs.kind_name() != kind {
            return Err(ScriptError::TypeMismatch {
                expected: kind,
                found: lhs.kind_name(),
            });
        }
        let same = lhs.equals(&rhs)?;
        self.script.push(StackValue::from_bool(same == equal))?;
        Ok(ExecutionResult::Continue)
    }

    /// Handle arithmetic, logical, comparison and cast opcodes
    pub fn execute_math_op(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.opcode {
            // ---- ARITHMETIC ----
            Opcode::Negate => {
                let value = self.script.pop()?;
                debug!("neg {}", value);
                self.script.push(value.neg()?)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Add => {
                let (lhs, rhs) = self.pop_operands()?;
                debug!("add {} {}", lhs, rhs);
                self.script.push(lhs.add(&rhs)?)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Subtract => {
                let (lhs, rhs) = self.pop_operands()?;
                debug!("sub {} {}", lhs, rhs);
                self.script.push(lhs.sub(&rhs)?)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Multiply => {
                let (lhs, rhs) = self.pop_operands()?;
                debug!("mul {} {}", lhs, rhs);
                self.script.push(lhs.mul(&rhs)?)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Divide => {
                let (lhs, rhs) = self.pop_operands()?;
                debug!("div {} {}", lhs, rhs);
                if rhs.as_number()? == 0.0 {
                    return Err(ScriptError::DivisionByZero);
                }
                self.script.push(lhs.div(&rhs)?)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Modulo => {
                let (lhs, rhs) = self.pop_operands()?;
                debug!("mod {} {}", lhs, rhs);
                if rhs.as_number()? == 0.0 {
                    return Err(ScriptError::DivisionByZero);
                }
                self.script.push(lhs.rem(&rhs)?)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Concat => {
                let lhs = self.script.pop_string()?;
                let rhs = self.script.pop_string()?;
                debug!("concat {:?} {:?}", lhs, rhs);
                self.script.push(StackValue::String(lhs + &rhs))?;
                Ok(ExecutionResult::Continue)
            }

            // ---- LOGICAL ----
            Opcode::Not => {
                let value = self.script.pop()?.is_true()?;
                self.script.push(StackValue::from_bool(!value))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::And => {
                let (lhs, rhs) = self.pop_operands()?;
                let result = lhs.is_true()? && rhs.is_true()?;
                self.script.push(StackValue::from_bool(result))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::Or => {
                let (lhs, rhs) = self.pop_operands()?;
                let (a, b) = (lhs.is_true()?, rhs.is_true()?);
                self.script.push(StackValue::from_bool(a || b))?;
                Ok(ExecutionResult::Continue)
            }

            // ---- COMPARISONS ----
            Opcode::Equal => self.equality_op("number", true),
            Opcode::NotEqual => self.equality_op("number", false),
            Opcode::StrEqual => self.equality_op("string", true),
            Opcode::StrNotEqual => self.equality_op("string", false),
            Opcode::EntityEqual => self.equality_op("entity", true),
            Opcode::EntityNotEqual => self.equality_op("entity", false),
            Opcode::Less => self.compare_op(Ordering::is_lt),
            Opcode::LessEqual => self.compare_op(Ordering::is_le),
            Opcode::Greater => self.compare_op(Ordering::is_gt),
            Opcode::GreaterEqual => self.compare_op(Ordering::is_ge),

            // ---- CASTS ----
            Opcode::NumberToString => {
                let value = self.script.pop()?;
                debug!("num2str {}", value);
                self.script.push(value.to_string_value()?)?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::StringToNumber => {
                let value = self.script.pop()?;
                debug!("str2num {}", value);
                self.script.push(value.to_number_value()?)?;
                Ok(ExecutionResult::Continue)
            }

            _ => Err(ScriptError::UnhandledOpcode(inst.opcode.name())),
        }
    }
}
