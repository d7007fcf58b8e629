/// Combat API operations for the script VM
use crate::error::ScriptError;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Executor};
use crate::opcode_tables::Opcode;
use crate::suspension::WaitKind;
use crate::value::StackValue;
use log::debug;

impl Executor<'_> {
    /// Handle combat API opcodes
    pub fn execute_combat_op(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.opcode {
            Opcode::InCombat => {
                let active = self.engine.in_combat();
                self.script.push(StackValue::from_bool(active))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::StartCombat => {
                self.require_main_interface("combat start outside the main interface")?;
                if self.engine.in_combat() {
                    return Err(ScriptError::Disallowed("combat already active"));
                }
                debug!("start_combat");
                self.engine.start_combat();
                Ok(ExecutionResult::Continue)
            }

            Opcode::EndCombat => {
                if !self.engine.in_combat() {
                    return Err(ScriptError::Disallowed("no combat to end"));
                }
                debug!("end_combat");
                self.engine.end_combat();
                Ok(ExecutionResult::Continue)
            }

            Opcode::Attack => {
                let attacker = self.script.pop_entity()?;
                let target = self.script.pop_entity()?;
                let wait = self.pop_flag()?;
                if !self.engine.in_combat() {
                    return Err(ScriptError::Disallowed("attack outside combat"));
                }
                self.require_creature(attacker)?;
                self.require_creature(target)?;
                let points = self
                    .engine
                    .action_points(attacker)
                    .ok_or(ScriptError::InvalidHandle(attacker))?;
                if points < self.engine.attack_cost() {
                    return Err(ScriptError::Disallowed("not enough action points"));
                }
                debug!("attack {} -> {} ({} AP)", attacker, target, points);
                if !wait {
                    self.engine.issue_attack(attacker, target, None);
                    return Ok(ExecutionResult::Continue);
                }
                let token = self.begin_wait(WaitKind::Command, Some(attacker), true)?;
                self.engine.issue_attack(attacker, target, Some(token));
                Ok(self.finish_wait())
            }

            Opcode::GetActionPoints => {
                let creature = self.script.pop_entity()?;
                self.require_creature(creature)?;
                let points = self
                    .engine
                    .action_points(creature)
                    .ok_or(ScriptError::InvalidHandle(creature))?;
                self.script.push(StackValue::Number(points as f32))?;
                Ok(ExecutionResult::Continue)
            }

            _ => Err(ScriptError::UnhandledOpcode(inst.opcode.name())),
        }
    }
}
