//! Suspension bridge between paused scripts and asynchronous engine work
//!
//! A suspending API instruction registers a wait here and pauses its
//! script. The registration is keyed by an opaque `WaitToken` handed to the
//! engine with the request; the script itself is only ever referred to by
//! `ScriptId`, so a torn-down script cannot be woken through a stale
//! reference.
//!
//! Each registration may also observe one entity. If that entity is
//! destroyed while the wait is outstanding, the wait completes early and
//! the script resumes without a result.
//!
//! Invariants:
//! - at most one outstanding wait per instruction instance and per script
//! - a wait is removed from every index before its wakeup is produced, so
//!   a script is resumed (or interrupted) at most once per wait

use crate::error::ScriptError;
use crate::host::EngineEvent;
use crate::script::ScriptId;
use crate::value::{EntityHandle, StackValue};
use indexmap::IndexMap;
use log::{debug, error, info};
use std::fmt;

/// Opaque handle for one outstanding wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaitToken(pub u64);

impl fmt::Display for WaitToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait-{}", self.0)
    }
}

/// Which completion notification a wait expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Alarm,
    Command,
    Window,
}

/// One instruction instance: a code position within one running script.
/// Scripts sharing a code unit have distinct sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionSite {
    pub script: ScriptId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingWait {
    pub script: ScriptId,
    pub site: InstructionSite,
    pub kind: WaitKind,
    /// Entity whose destruction completes the wait early
    pub awaited: Option<EntityHandle>,
    /// Whether a normal completion pushes a result onto the stack
    pub push_result: bool,
}

/// What the interpreter must do to a script after an event
#[derive(Debug, Clone, PartialEq)]
pub enum Wakeup {
    Resume {
        script: ScriptId,
        value: Option<StackValue>,
    },
    Interrupt {
        script: ScriptId,
        reason: ScriptError,
    },
}

#[derive(Debug, Default)]
pub struct SuspensionBridge {
    next_token: u64,
    pending: IndexMap<WaitToken, PendingWait>,
    /// Observer registrations: awaited entity -> waits
    observers: IndexMap<EntityHandle, Vec<WaitToken>>,
    busy_sites: IndexMap<InstructionSite, WaitToken>,
    by_script: IndexMap<ScriptId, WaitToken>,
    world_paused: bool,
}

impl SuspensionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new wait. Fails if the instruction instance or the
    /// script already has one outstanding.
    pub fn register(
        &mut self,
        site: InstructionSite,
        kind: WaitKind,
        awaited: Option<EntityHandle>,
        push_result: bool,
    ) -> Result<WaitToken, ScriptError> {
        let script = site.script;
        if self.busy_sites.contains_key(&site) || self.by_script.contains_key(&script) {
            error!(
                "Refusing second outstanding wait for {} at code position {}",
                script, site.index
            );
            return Err(ScriptError::WaitAlreadyPending(site.index));
        }

        self.next_token += 1;
        let token = WaitToken(self.next_token);
        if let Some(entity) = awaited {
            self.observers.entry(entity).or_default().push(token);
        }
        self.busy_sites.insert(site, token);
        self.by_script.insert(script, token);
        self.pending.insert(
            token,
            PendingWait {
                script,
                site,
                kind,
                awaited,
                push_result,
            },
        );
        debug!(
            "Registered {} ({:?}) for {} at code position {}, awaiting {:?}",
            token, kind, script, site.index, awaited
        );
        Ok(token)
    }

    /// Remove a wait from every index
    fn release(&mut self, token: WaitToken) -> Option<PendingWait> {
        let wait = self.pending.shift_remove(&token)?;
        self.busy_sites.shift_remove(&wait.site);
        self.by_script.shift_remove(&wait.script);
        if let Some(entity) = wait.awaited {
            if let Some(tokens) = self.observers.get_mut(&entity) {
                tokens.retain(|t| *t != token);
                if tokens.is_empty() {
                    self.observers.shift_remove(&entity);
                }
            }
        }
        Some(wait)
    }

    /// Release the wait (if any) held by a script that is being torn down.
    /// No wakeup is produced.
    pub fn release_script(&mut self, script: ScriptId) -> Option<(WaitToken, PendingWait)> {
        let token = *self.by_script.get(&script)?;
        let wait = self.release(token)?;
        debug!("Released {} for torn-down {}", token, script);
        Some((token, wait))
    }

    /// Release every outstanding wait. No wakeups are produced.
    pub fn release_all(&mut self) -> Vec<(WaitToken, PendingWait)> {
        let tokens: Vec<WaitToken> = self.pending.keys().copied().collect();
        tokens
            .into_iter()
            .filter_map(|t| self.release(t).map(|w| (t, w)))
            .collect()
    }

    /// Take a completion matching `kind` for `token`
    fn complete(
        &mut self,
        token: WaitToken,
        kind: WaitKind,
        result: Option<StackValue>,
    ) -> Option<Wakeup> {
        match self.pending.get(&token) {
            None => {
                debug!("Ignoring {:?} completion for unknown {}", kind, token);
                return None;
            }
            Some(wait) if wait.kind != kind => {
                debug!(
                    "Ignoring {:?} completion for {}, which waits on {:?}",
                    kind, token, wait.kind
                );
                return None;
            }
            Some(_) => {}
        }
        let wait = self.release(token)?;
        let value = if wait.push_result {
            Some(result.unwrap_or(StackValue::FALSE))
        } else {
            None
        };
        Some(Wakeup::Resume {
            script: wait.script,
            value,
        })
    }

    /// Route one engine notification to the waits it concerns
    pub fn deliver(&mut self, event: EngineEvent) -> Vec<Wakeup> {
        match event {
            EngineEvent::AlarmFired(token) => {
                self.complete(token, WaitKind::Alarm, None).into_iter().collect()
            }
            EngineEvent::CommandFinished { token, result } => self
                .complete(token, WaitKind::Command, result)
                .into_iter()
                .collect(),
            EngineEvent::WindowClosed { token, result } => self
                .complete(token, WaitKind::Window, result)
                .into_iter()
                .collect(),
            EngineEvent::CommandDisqualified { token, reason } => {
                match self.pending.get(&token) {
                    Some(wait) if wait.kind == WaitKind::Command => {}
                    _ => {
                        debug!("Ignoring disqualification of {}", token);
                        return Vec::new();
                    }
                }
                match self.release(token) {
                    Some(wait) => {
                        info!("{} disqualified for {}: {}", token, wait.script, reason);
                        vec![Wakeup::Interrupt {
                            script: wait.script,
                            reason: ScriptError::Disqualified(reason),
                        }]
                    }
                    None => Vec::new(),
                }
            }
            EngineEvent::EntityDestroyed(entity) => {
                let tokens = self.observers.shift_remove(&entity).unwrap_or_default();
                tokens
                    .into_iter()
                    .filter_map(|token| {
                        let wait = self.release(token)?;
                        debug!(
                            "Awaited entity {} destroyed; completing {} for {} early",
                            entity, token, wait.script
                        );
                        Some(Wakeup::Resume {
                            script: wait.script,
                            value: None,
                        })
                    })
                    .collect()
            }
            EngineEvent::WorldPaused(paused) => {
                // Alarms stop in the engine; paused scripts stay paused.
                debug!("World paused: {}", paused);
                self.world_paused = paused;
                Vec::new()
            }
        }
    }

    pub fn pending_for(&self, script: ScriptId) -> Option<WaitToken> {
        self.by_script.get(&script).copied()
    }

    pub fn wait(&self, token: WaitToken) -> Option<&PendingWait> {
        self.pending.get(&token)
    }

    pub fn is_site_busy(&self, site: InstructionSite) -> bool {
        self.busy_sites.contains_key(&site)
    }

    pub fn observers_of(&self, entity: EntityHandle) -> usize {
        self.observers.get(&entity).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn world_paused(&self) -> bool {
        self.world_paused
    }
}
