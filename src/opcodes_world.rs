/// World API operations for the script VM
///
/// This module handles the API instructions that query or change world
/// entities:
/// - Entity queries (self, exists, name, distance, equipment, alignment)
/// - Entity mutation (hit points, walls, alignment, destruction)
/// - Suspending requests (timed wait, movement, speech)
///
/// Arguments are popped first-argument-first. Every precondition is checked
/// before the engine is touched, so a failing instruction leaves the world
/// exactly as it found it.
use crate::error::ScriptError;
use crate::host::{Alignment, EntityKind, EquipSlot, InterfaceState};
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Executor};
use crate::opcode_tables::Opcode;
use crate::suspension::WaitKind;
use crate::value::{EntityHandle, StackValue};
use log::debug;

impl Executor<'_> {
    /// Pop a Number that encodes an enumeration or count: it must be
    /// integral and below `limit`
    pub(crate) fn pop_index(&mut self, what: &'static str, limit: u32) -> Result<u32, ScriptError> {
        let value = self.script.pop_number()?;
        if value < 0.0 || value.fract() != 0.0 || value >= limit as f32 {
            return Err(ScriptError::OutOfRange { what, value });
        }
        Ok(value as u32)
    }

    /// Pop a non-negative, finite duration in seconds
    pub(crate) fn pop_seconds(&mut self) -> Result<f32, ScriptError> {
        let seconds = self.script.pop_number()?;
        if !(seconds >= 0.0) || !seconds.is_finite() {
            return Err(ScriptError::OutOfRange {
                what: "seconds",
                value: seconds,
            });
        }
        Ok(seconds)
    }

    pub(crate) fn pop_flag(&mut self) -> Result<bool, ScriptError> {
        self.script.pop()?.is_true()
    }

    /// Check that `handle` resolves to an entity of `kind`
    pub(crate) fn require_kind(
        &self,
        handle: EntityHandle,
        kind: EntityKind,
    ) -> Result<(), ScriptError> {
        match self.engine.entity_kind(handle) {
            None => Err(ScriptError::InvalidHandle(handle)),
            Some(k) if k == kind => Ok(()),
            Some(_) => Err(ScriptError::WrongEntityKind {
                handle,
                expected: kind.name(),
            }),
        }
    }

    pub(crate) fn require_creature(&self, handle: EntityHandle) -> Result<(), ScriptError> {
        self.require_kind(handle, EntityKind::Creature)
    }

    pub(crate) fn require_entity(&self, handle: EntityHandle) -> Result<(), ScriptError> {
        if handle.is_null() || !self.engine.entity_exists(handle) {
            return Err(ScriptError::InvalidHandle(handle));
        }
        Ok(())
    }

    pub(crate) fn require_main_interface(&self, what: &'static str) -> Result<(), ScriptError> {
        let state = self.engine.interface_state();
        if state != InterfaceState::Main {
            debug!("{} refused in interface state {:?}", what, state);
            return Err(ScriptError::Disallowed(what));
        }
        Ok(())
    }

    /// Handle world API opcodes
    pub fn execute_world_op(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.opcode {
            // ---- QUERIES ----
            Opcode::Random => {
                let max = self.script.pop_number()?;
                if !(max >= 1.0) || !max.is_finite() {
                    return Err(ScriptError::OutOfRange {
                        what: "random range",
                        value: max,
                    });
                }
                let roll = self.rng.below(max as u32);
                debug!("random {} -> {}", max, roll);
                self.script.push(StackValue::Number(roll as f32))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::GetSelf => {
                let owner = self
                    .script
                    .owner()
                    .ok_or(ScriptError::Disallowed("self in a global script"))?;
                self.require_entity(owner)?;
                self.script.push(StackValue::Entity(owner))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::EntityExists => {
                let handle = self.script.pop_entity()?;
                let exists = !handle.is_null() && self.engine.entity_exists(handle);
                self.script.push(StackValue::from_bool(exists))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::GetName => {
                let handle = self.script.pop_entity()?;
                let name = self
                    .engine
                    .entity_name(handle)
                    .ok_or(ScriptError::InvalidHandle(handle))?;
                self.script.push(StackValue::String(name))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::GetHitPoints => {
                let creature = self.script.pop_entity()?;
                self.require_creature(creature)?;
                let hp = self
                    .engine
                    .hit_points(creature)
                    .ok_or(ScriptError::InvalidHandle(creature))?;
                self.script.push(StackValue::Number(hp as f32))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::GetDistance => {
                let a = self.script.pop_entity()?;
                let b = self.script.pop_entity()?;
                let pa = self.engine.position(a).ok_or(ScriptError::InvalidHandle(a))?;
                let pb = self.engine.position(b).ok_or(ScriptError::InvalidHandle(b))?;
                let distance = ((pa.0 - pb.0).powi(2) + (pa.1 - pb.1).powi(2)).sqrt();
                self.script.push(StackValue::Number(distance))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::IsWallOpen => {
                let wall = self.script.pop_entity()?;
                self.require_kind(wall, EntityKind::Wall)?;
                let open = self
                    .engine
                    .wall_is_open(wall)
                    .ok_or(ScriptError::InvalidHandle(wall))?;
                self.script.push(StackValue::from_bool(open))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::GetEquipped => {
                let creature = self.script.pop_entity()?;
                let index = self.pop_index("equip slot", EquipSlot::COUNT as u32)?;
                self.require_creature(creature)?;
                let slot = EquipSlot::from_index(index).ok_or(ScriptError::OutOfRange {
                    what: "equip slot",
                    value: index as f32,
                })?;
                let item = self
                    .engine
                    .equipped_item(creature, slot)
                    .ok_or(ScriptError::InvalidHandle(creature))?;
                self.script.push(StackValue::Entity(item))?;
                Ok(ExecutionResult::Continue)
            }

            Opcode::GetAlignment => {
                let creature = self.script.pop_entity()?;
                self.require_creature(creature)?;
                let alignment = self
                    .engine
                    .alignment(creature)
                    .ok_or(ScriptError::InvalidHandle(creature))?;
                self.script
                    .push(StackValue::Number(alignment.index() as f32))?;
                Ok(ExecutionResult::Continue)
            }

            // ---- MUTATIONS ----
            Opcode::SetHitPoints => {
                let creature = self.script.pop_entity()?;
                let hp = self.script.pop_number()?;
                self.require_creature(creature)?;
                if hp < 0.0 || hp.fract() != 0.0 || hp > i32::MAX as f32 {
                    return Err(ScriptError::OutOfRange {
                        what: "hit points",
                        value: hp,
                    });
                }
                debug!("set_hp {} = {}", creature, hp);
                self.engine.set_hit_points(creature, hp as i32);
                Ok(ExecutionResult::Continue)
            }

            Opcode::SetWallOpen => {
                let wall = self.script.pop_entity()?;
                let open = self.pop_flag()?;
                self.require_kind(wall, EntityKind::Wall)?;
                debug!("set_wall_open {} = {}", wall, open);
                self.engine.set_wall_open(wall, open);
                Ok(ExecutionResult::Continue)
            }

            Opcode::SetAlignment => {
                let creature = self.script.pop_entity()?;
                let index = self.pop_index("alignment", 3)?;
                self.require_creature(creature)?;
                let alignment = Alignment::from_index(index).ok_or(ScriptError::OutOfRange {
                    what: "alignment",
                    value: index as f32,
                })?;
                self.engine.set_alignment(creature, alignment);
                Ok(ExecutionResult::Continue)
            }

            Opcode::DestroyEntity => {
                let handle = self.script.pop_entity()?;
                self.require_entity(handle)?;
                debug!("destroy {}", handle);
                self.engine.destroy_entity(handle);
                Ok(ExecutionResult::Continue)
            }

            // ---- SUSPENDING ----
            Opcode::Wait => {
                let seconds = self.pop_seconds()?;
                let token = self.begin_wait(WaitKind::Alarm, None, false)?;
                debug!("wait {}s as {}", seconds, token);
                self.engine.set_alarm(token, seconds);
                Ok(self.finish_wait())
            }

            Opcode::MoveTo => {
                let creature = self.script.pop_entity()?;
                let x = self.script.pop_number()?;
                let y = self.script.pop_number()?;
                let wait = self.pop_flag()?;
                self.require_creature(creature)?;
                if !x.is_finite() || !y.is_finite() {
                    return Err(ScriptError::OutOfRange {
                        what: "coordinate",
                        value: if x.is_finite() { y } else { x },
                    });
                }
                if !wait {
                    self.engine.issue_move(creature, (x, y), None);
                    return Ok(ExecutionResult::Continue);
                }
                let token = self.begin_wait(WaitKind::Command, Some(creature), false)?;
                self.engine.issue_move(creature, (x, y), Some(token));
                Ok(self.finish_wait())
            }

            Opcode::Speak => {
                let speaker = self.script.pop_entity()?;
                let text = self.script.pop_string()?;
                let wait = self.pop_flag()?;
                self.require_entity(speaker)?;
                if !wait {
                    self.engine.issue_speech(speaker, &text, None);
                    return Ok(ExecutionResult::Continue);
                }
                let token = self.begin_wait(WaitKind::Command, Some(speaker), false)?;
                self.engine.issue_speech(speaker, &text, Some(token));
                Ok(self.finish_wait())
            }

            _ => Err(ScriptError::UnhandledOpcode(inst.opcode.name())),
        }
    }
}
