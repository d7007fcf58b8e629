use crate::bytecode::CodeUnit;
use crate::config::VmConfig;
use crate::error::ScriptError;
use crate::instruction::Instruction;
use crate::value::{EntityHandle, StackValue};
use log::{debug, error, warn};
use std::fmt;
use std::rc::Rc;

/// Identifies one running script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub u32);

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script-{}", self.0)
    }
}

/// Lifecycle state of a script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptState {
    /// Executing instructions
    Running,
    /// Blocked on an outstanding engine wait
    Paused,
    /// Finished normally
    Stopped,
    /// Abandoned by an error interrupt
    Interrupted(ScriptError),
}

impl ScriptState {
    pub fn is_finished(&self) -> bool {
        matches!(self, ScriptState::Stopped | ScriptState::Interrupted(_))
    }
}

/// Saved return position for a nested call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// Code position to continue at after return
    pub return_pos: usize,
    /// Code position of the call instruction
    pub call_site: usize,
}

/// Execution context of one script instance
///
/// Owns the instruction pointer, value stack, memory slots and call frames.
/// Memory slots are one flat array shared by every call depth, so a
/// recursive call sees (and clobbers) its caller's slots.
pub struct Script {
    pub id: ScriptId,
    code: Rc<CodeUnit>,
    /// Next instruction to execute
    ip: usize,
    /// Position of the instruction currently executing
    current_pos: usize,
    stack: Vec<StackValue>,
    slots: Vec<StackValue>,
    frames: Vec<StackFrame>,
    /// Entity the script is attached to; `None` for global scripts
    owner: Option<EntityHandle>,
    state: ScriptState,
    max_stack_depth: usize,
    max_call_depth: usize,
}

impl Script {
    pub fn new(
        id: ScriptId,
        code: Rc<CodeUnit>,
        owner: Option<EntityHandle>,
        config: &VmConfig,
    ) -> Self {
        let slots = vec![StackValue::FALSE; code.slot_count as usize];
        Script {
            id,
            code,
            ip: 0,
            current_pos: 0,
            stack: Vec::with_capacity(64),
            slots,
            frames: Vec::new(),
            owner,
            state: ScriptState::Running,
            max_stack_depth: config.max_stack_depth,
            max_call_depth: config.max_call_depth,
        }
    }

    /// Reset to the first instruction with empty stack and cleared slots
    pub fn reset(&mut self) {
        self.ip = 0;
        self.current_pos = 0;
        self.stack.clear();
        self.frames.clear();
        self.slots = vec![StackValue::FALSE; self.code.slot_count as usize];
        self.state = ScriptState::Running;
    }

    pub fn code(&self) -> &Rc<CodeUnit> {
        &self.code
    }

    /// Take the next instruction and advance the instruction pointer.
    /// Returns `None` when execution runs off the end of the code.
    pub fn fetch(&mut self) -> Option<Instruction> {
        let inst = self.code.instructions.get(self.ip)?.clone();
        self.current_pos = self.ip;
        self.ip += 1;
        Some(inst)
    }

    pub fn code_pos(&self) -> usize {
        self.ip
    }

    pub fn current_pos(&self) -> usize {
        self.current_pos
    }

    pub fn state(&self) -> &ScriptState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ScriptState::Running
    }

    pub fn owner(&self) -> Option<EntityHandle> {
        self.owner
    }

    pub fn is_global_script(&self) -> bool {
        self.owner.is_none()
    }

    pub fn stack(&self) -> &[StackValue] {
        &self.stack
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, value: StackValue) -> Result<(), ScriptError> {
        if self.stack.len() >= self.max_stack_depth {
            return Err(ScriptError::StackOverflow(self.max_stack_depth));
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<StackValue, ScriptError> {
        self.stack.pop().ok_or(ScriptError::StackUnderflow)
    }

    pub fn pop_number(&mut self) -> Result<f32, ScriptError> {
        self.pop()?.as_number()
    }

    pub fn pop_entity(&mut self) -> Result<EntityHandle, ScriptError> {
        self.pop()?.as_entity()
    }

    pub fn pop_string(&mut self) -> Result<String, ScriptError> {
        self.pop()?.into_string()
    }

    pub fn peek(&self) -> Result<&StackValue, ScriptError> {
        self.stack.last().ok_or(ScriptError::StackUnderflow)
    }

    pub fn get_value_at(&self, slot: u16) -> Result<&StackValue, ScriptError> {
        self.slots
            .get(slot as usize)
            .ok_or(ScriptError::SlotOutOfRange {
                slot,
                count: self.slots.len(),
            })
    }

    pub fn set_value_at(&mut self, slot: u16, value: StackValue) -> Result<(), ScriptError> {
        let count = self.slots.len();
        let cell = self
            .slots
            .get_mut(slot as usize)
            .ok_or(ScriptError::SlotOutOfRange { slot, count })?;
        *cell = value;
        Ok(())
    }

    pub fn set_code_pos(&mut self, target: u32) -> Result<(), ScriptError> {
        if target as usize > self.code.len() {
            return Err(ScriptError::CodePositionOutOfRange {
                target,
                len: self.code.len(),
            });
        }
        self.ip = target as usize;
        Ok(())
    }

    /// Enter a nested call at `target`, remembering where to come back to
    pub fn push_stack_frame(&mut self, target: u16) -> Result<(), ScriptError> {
        if self.frames.len() >= self.max_call_depth {
            return Err(ScriptError::CallDepthExceeded(self.max_call_depth));
        }
        let frame = StackFrame {
            return_pos: self.ip,
            call_site: self.current_pos,
        };
        self.set_code_pos(target as u32)?;
        self.frames.push(frame);
        Ok(())
    }

    /// Leave the current call. Returns `None` at the outermost level.
    pub fn pop_stack_frame(&mut self) -> Option<StackFrame> {
        let frame = self.frames.pop()?;
        self.ip = frame.return_pos;
        Some(frame)
    }

    pub fn get_string(&self, index: u32) -> Result<String, ScriptError> {
        self.code
            .get_string(index)
            .map(str::to_string)
            .ok_or(ScriptError::StringOutOfRange {
                index,
                count: self.code.strings.len(),
            })
    }

    pub fn pause(&mut self) {
        if self.state != ScriptState::Running {
            error!("{}: pause requested while {:?}; ignoring", self.id, self.state);
            return;
        }
        debug!("{}: paused at code position {}", self.id, self.current_pos);
        self.state = ScriptState::Paused;
    }

    /// Returns false (and changes nothing) if the script was not paused
    pub fn resume(&mut self) -> bool {
        if self.state != ScriptState::Paused {
            error!("{}: resume requested while {:?}; ignoring", self.id, self.state);
            return false;
        }
        debug!("{}: resumed at code position {}", self.id, self.ip);
        self.state = ScriptState::Running;
        true
    }

    pub fn stop(&mut self) {
        if self.state.is_finished() {
            return;
        }
        debug!("{}: stopped", self.id);
        self.state = ScriptState::Stopped;
    }

    /// Abandon execution. The script keeps its stack for inspection but
    /// runs no further instructions.
    pub fn error_interrupt(&mut self, reason: ScriptError) {
        if self.state.is_finished() {
            return;
        }
        warn!(
            "{}: error interrupt at code position {}: {}",
            self.id, self.current_pos, reason
        );
        self.state = ScriptState::Interrupted(reason);
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({:?})", self.id, self.state)?;
        writeln!(f, "  ip: {}  frames: {}", self.ip, self.frames.len())?;
        let stack: Vec<String> = self.stack.iter().map(|v| v.to_string()).collect();
        write!(f, "  stack: [{}]", stack.join(", "))
    }
}
