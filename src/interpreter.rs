use crate::bytecode::CodeUnit;
use crate::config::VmConfig;
use crate::error::ScriptError;
use crate::host::Engine;
use crate::instruction::Instruction;
use crate::opcode_tables::OpcodeFamily;
use crate::random::ScriptRng;
use crate::script::{Script, ScriptId, ScriptState};
use crate::suspension::{
    InstructionSite, PendingWait, SuspensionBridge, WaitKind, WaitToken, Wakeup,
};
use crate::value::EntityHandle;
use indexmap::IndexMap;
use log::{debug, error, info};
use std::rc::Rc;

/// Result of executing an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Continue with the next instruction
    Continue,
    /// Branch taken, code position already updated
    Branched,
    /// Nested call entered
    Called,
    /// Returned from a nested call
    Returned,
    /// Script paused on an engine wait
    Paused,
    /// Script finished
    Stopped,
    /// Script abandoned by an error interrupt
    Interrupted,
}

/// Everything one instruction may touch while it executes
pub struct Executor<'a> {
    pub script: &'a mut Script,
    pub engine: &'a mut dyn Engine,
    pub bridge: &'a mut SuspensionBridge,
    pub rng: &'a mut ScriptRng,
}

impl Executor<'_> {
    /// Execute one decoded instruction against the script. An `Err` means
    /// the caller must error-interrupt the script; no engine state has been
    /// changed in that case.
    pub fn execute(&mut self, inst: &Instruction) -> Result<ExecutionResult, ScriptError> {
        match inst.opcode.family() {
            OpcodeFamily::Math => self.execute_math_op(inst),
            OpcodeFamily::Flow => self.execute_flow_op(inst),
            OpcodeFamily::Memory => self.execute_memory_op(inst),
            OpcodeFamily::Stack => self.execute_stack_op(inst),
            OpcodeFamily::World => self.execute_world_op(inst),
            OpcodeFamily::Gui => self.execute_gui_op(inst),
            OpcodeFamily::Combat => self.execute_combat_op(inst),
        }
    }

    /// Register a wait for the executing instruction. Must be called after
    /// all preconditions passed and before the engine request is issued.
    pub fn begin_wait(
        &mut self,
        kind: WaitKind,
        awaited: Option<EntityHandle>,
        push_result: bool,
    ) -> Result<WaitToken, ScriptError> {
        let site = InstructionSite {
            script: self.script.id,
            index: self.script.current_pos(),
        };
        self.bridge.register(site, kind, awaited, push_result)
    }

    /// Pause the script once the engine request carrying the wait token has
    /// been issued
    pub fn finish_wait(&mut self) -> ExecutionResult {
        self.script.pause();
        ExecutionResult::Paused
    }
}

/// Drives scripts, routes engine notifications and owns the suspension
/// bridge. Single-threaded: scripts only interleave across pauses.
pub struct Interpreter<E: Engine> {
    engine: E,
    scripts: IndexMap<ScriptId, Script>,
    bridge: SuspensionBridge,
    rng: ScriptRng,
    config: VmConfig,
    next_id: u32,
    /// Instruction count for debugging
    instruction_count: u64,
}

impl<E: Engine> Interpreter<E> {
    pub fn new(engine: E, config: VmConfig) -> Self {
        let rng = ScriptRng::from_seed(config.random_seed);
        Interpreter {
            engine,
            scripts: IndexMap::new(),
            bridge: SuspensionBridge::new(),
            rng,
            config,
            next_id: 0,
            instruction_count: 0,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn bridge(&self) -> &SuspensionBridge {
        &self.bridge
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Start a script. `owner` is the entity it is attached to; `None`
    /// makes it a global script.
    pub fn spawn(&mut self, code: Rc<CodeUnit>, owner: Option<EntityHandle>) -> ScriptId {
        self.next_id += 1;
        let id = ScriptId(self.next_id);
        debug!(
            "Spawning {} from unit {:?} ({} instructions, owner {:?})",
            id,
            code.id,
            code.len(),
            owner
        );
        self.scripts
            .insert(id, Script::new(id, code, owner, &self.config));
        id
    }

    pub fn script(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.get(&id)
    }

    pub fn script_mut(&mut self, id: ScriptId) -> Option<&mut Script> {
        self.scripts.get_mut(&id)
    }

    pub fn state(&self, id: ScriptId) -> Option<&ScriptState> {
        self.scripts.get(&id).map(Script::state)
    }

    pub fn script_ids(&self) -> Vec<ScriptId> {
        self.scripts.keys().copied().collect()
    }

    /// True once no script is running or paused
    pub fn all_finished(&self) -> bool {
        self.scripts.values().all(|s| s.state().is_finished())
    }

    /// Execute a single instruction of a running script. Returns `None` if
    /// the script is unknown or not running.
    pub fn step(&mut self, id: ScriptId) -> Option<ExecutionResult> {
        let Interpreter {
            engine,
            scripts,
            bridge,
            rng,
            config,
            instruction_count,
            ..
        } = self;
        let script = scripts.get_mut(&id)?;
        if !script.is_running() {
            return None;
        }

        let inst = match script.fetch() {
            Some(inst) => inst,
            None => {
                debug!("{}: ran off the end of its code", id);
                script.stop();
                return Some(ExecutionResult::Stopped);
            }
        };
        *instruction_count += 1;
        if config.trace {
            info!("{} @{:04}: {}", id, script.current_pos(), inst);
        } else {
            debug!("{} @{:04}: {}", id, script.current_pos(), inst);
        }

        let mut exec = Executor {
            script,
            engine,
            bridge,
            rng,
        };
        match exec.execute(&inst) {
            Ok(result) => Some(result),
            Err(reason) => {
                exec.script.error_interrupt(reason);
                Some(ExecutionResult::Interrupted)
            }
        }
    }

    /// Run a script until it pauses, finishes, or uses up its instruction
    /// budget for this slice. Returns the resulting state.
    pub fn run(&mut self, id: ScriptId) -> Option<ScriptState> {
        for _ in 0..self.config.instruction_budget {
            match self.step(id) {
                None
                | Some(ExecutionResult::Paused)
                | Some(ExecutionResult::Stopped)
                | Some(ExecutionResult::Interrupted) => break,
                Some(_) => {}
            }
        }
        self.state(id).cloned()
    }

    /// Drain engine notifications and apply the resulting wakeups.
    /// Returns the number of scripts woken.
    pub fn pump_events(&mut self) -> usize {
        let events = self.engine.drain_events();
        let mut woken = 0;
        for event in events {
            debug!("Engine event: {:?}", event);
            for wakeup in self.bridge.deliver(event) {
                if self.apply_wakeup(wakeup) {
                    woken += 1;
                }
            }
        }
        woken
    }

    fn apply_wakeup(&mut self, wakeup: Wakeup) -> bool {
        match wakeup {
            Wakeup::Resume { script, value } => {
                let Some(s) = self.scripts.get_mut(&script) else {
                    error!("Wakeup for unknown {}", script);
                    return false;
                };
                if !s.resume() {
                    return false;
                }
                if let Some(value) = value {
                    if let Err(e) = s.push(value) {
                        s.error_interrupt(e);
                    }
                }
                true
            }
            Wakeup::Interrupt { script, reason } => {
                let Some(s) = self.scripts.get_mut(&script) else {
                    error!("Interrupt for unknown {}", script);
                    return false;
                };
                if s.state() != &ScriptState::Paused {
                    error!("{}: interrupt delivered while {:?}", script, s.state());
                    return false;
                }
                s.error_interrupt(reason);
                true
            }
        }
    }

    /// One game-loop pass: deliver notifications, then give every running
    /// script one slice
    pub fn tick(&mut self) -> usize {
        self.pump_events();
        let mut ran = 0;
        for id in self.script_ids() {
            if self.state(id) == Some(&ScriptState::Running) {
                self.run(id);
                ran += 1;
            }
        }
        ran
    }

    fn cancel_engine_side(engine: &mut E, token: WaitToken, wait: &PendingWait) {
        match wait.kind {
            WaitKind::Alarm => engine.cancel_alarm(token),
            WaitKind::Command | WaitKind::Window => engine.forget_notification(token),
        }
    }

    /// Tear down a script, dropping any outstanding wait without waking it
    pub fn unload_script(&mut self, id: ScriptId) -> Option<Script> {
        if let Some((token, wait)) = self.bridge.release_script(id) {
            Self::cancel_engine_side(&mut self.engine, token, &wait);
        }
        let script = self.scripts.shift_remove(&id)?;
        debug!("Unloaded {}", id);
        Some(script)
    }

    /// Tear down every script attached to `owner` (entity or area unload)
    pub fn unload_owner(&mut self, owner: EntityHandle) -> usize {
        let ids: Vec<ScriptId> = self
            .scripts
            .values()
            .filter(|s| s.owner() == Some(owner))
            .map(|s| s.id)
            .collect();
        for id in &ids {
            self.unload_script(*id);
        }
        ids.len()
    }

    /// Drop finished scripts, returning how many were removed
    pub fn reap_finished(&mut self) -> usize {
        let before = self.scripts.len();
        self.scripts.retain(|_, s| !s.state().is_finished());
        before - self.scripts.len()
    }

    /// Release every registration and drop all scripts
    pub fn shutdown(&mut self) {
        for (token, wait) in self.bridge.release_all() {
            Self::cancel_engine_side(&mut self.engine, token, &wait);
        }
        info!(
            "Shutting down with {} scripts after {} instructions",
            self.scripts.len(),
            self.instruction_count
        );
        self.scripts.clear();
    }
}
