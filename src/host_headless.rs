//! Headless engine implementation for testing and CI environments
//!
//! Keeps a small in-memory world and simulates the asynchronous parts of
//! a real engine (movement, speech, attacks, alarms, dialogs and fades) on
//! a fixed time step driven by `advance`. All text output is collected
//! instead of displayed.

use crate::config::{EntitySpec, HeadlessConfig, WorldConfig};
use crate::host::{
    Alignment, AlarmClock, CombatSystem, Engine, EngineEvent, EntityKind, EquipSlot, GuiManager,
    InterfaceState, World,
};
use crate::suspension::WaitToken;
use crate::value::{EntityHandle, StackValue};
use indexmap::IndexMap;
use log::{debug, info};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct HeadlessEntity {
    name: String,
    kind: EntityKind,
    hit_points: i32,
    position: (f32, f32),
    alignment: Alignment,
    action_points: i32,
    open: bool,
    equipment: [EntityHandle; EquipSlot::COUNT],
}

impl From<&EntitySpec> for HeadlessEntity {
    fn from(spec: &EntitySpec) -> Self {
        HeadlessEntity {
            name: spec.name.clone(),
            kind: spec.kind,
            hit_points: spec.hit_points,
            position: (spec.x, spec.y),
            alignment: spec.alignment,
            action_points: spec.action_points,
            open: spec.open,
            equipment: [EntityHandle::NULL; EquipSlot::COUNT],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CommandKind {
    Move { target: (f32, f32) },
    Speak { remaining: f32 },
    Attack { target: EntityHandle },
}

#[derive(Debug, Clone)]
struct Command {
    kind: CommandKind,
    notify: Option<WaitToken>,
}

#[derive(Debug, Clone)]
struct OpenDialog {
    text: String,
    notify: Option<WaitToken>,
}

#[derive(Debug, Clone)]
struct Fade {
    remaining: f32,
    notify: Option<WaitToken>,
}

#[derive(Debug)]
pub struct HeadlessEngine {
    config: HeadlessConfig,
    entities: IndexMap<EntityHandle, HeadlessEntity>,
    /// One active command per creature
    commands: IndexMap<EntityHandle, Command>,
    alarms: IndexMap<WaitToken, f32>,
    dialogs: VecDeque<OpenDialog>,
    fades: Vec<Fade>,
    events: Vec<EngineEvent>,
    interface_state: InterfaceState,
    combat: bool,
    paused: bool,
    auto_answer: Option<f32>,
    clock: f32,
    /// Everything printed, shown or spoken, in order
    output: Vec<String>,
}

impl HeadlessEngine {
    pub fn new(config: HeadlessConfig, world: &WorldConfig) -> Self {
        let entities = world
            .entities
            .iter()
            .filter(|spec| spec.handle != 0)
            .map(|spec| (EntityHandle(spec.handle), HeadlessEntity::from(spec)))
            .collect();
        let auto_answer = Some(config.dialog_choice);
        HeadlessEngine {
            config,
            entities,
            commands: IndexMap::new(),
            alarms: IndexMap::new(),
            dialogs: VecDeque::new(),
            fades: Vec::new(),
            events: Vec::new(),
            interface_state: InterfaceState::Main,
            combat: false,
            paused: false,
            auto_answer,
            clock: 0.0,
            output: Vec::new(),
        }
    }

    /// Add (or replace) an entity after construction
    pub fn add_entity(&mut self, spec: EntitySpec) {
        self.entities
            .insert(EntityHandle(spec.handle), HeadlessEntity::from(&spec));
    }

    /// Put an item into a creature's equipment slot
    pub fn equip(&mut self, creature: EntityHandle, slot: EquipSlot, item: EntityHandle) -> bool {
        match self.entities.get_mut(&creature) {
            Some(entity) => {
                entity.equipment[slot.index()] = item;
                true
            }
            None => false,
        }
    }

    pub fn set_action_points(&mut self, creature: EntityHandle, points: i32) {
        if let Some(entity) = self.entities.get_mut(&creature) {
            entity.action_points = points;
        }
    }

    pub fn set_interface_state(&mut self, state: InterfaceState) {
        self.interface_state = state;
    }

    /// Pause or unpause world time. Alarms and commands stop progressing
    /// while paused; dialogs and fades keep running.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            info!("World {}", if paused { "paused" } else { "resumed" });
            self.paused = paused;
            self.events.push(EngineEvent::WorldPaused(paused));
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Choice used to close dialogs automatically; `None` leaves them open
    /// until `answer_dialog` is called
    pub fn set_auto_answer(&mut self, choice: Option<f32>) {
        self.auto_answer = choice;
    }

    /// Close the oldest open dialog with `choice`. Returns false if no
    /// dialog is open.
    pub fn answer_dialog(&mut self, choice: f32) -> bool {
        let Some(dialog) = self.dialogs.pop_front() else {
            return false;
        };
        debug!("Headless: dialog {:?} answered with {}", dialog.text, choice);
        if let Some(token) = dialog.notify {
            self.events.push(EngineEvent::WindowClosed {
                token,
                result: Some(StackValue::Number(choice)),
            });
        }
        if self.dialogs.is_empty() && self.interface_state == InterfaceState::Dialog {
            self.interface_state = InterfaceState::Main;
        }
        true
    }

    pub fn open_dialogs(&self) -> usize {
        self.dialogs.len()
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn pending_alarms(&self) -> usize {
        self.alarms.len()
    }

    pub fn has_command(&self, creature: EntityHandle) -> bool {
        self.commands.contains_key(&creature)
    }

    /// Events produced since the last drain
    pub fn peek_events(&self) -> &[EngineEvent] {
        &self.events
    }

    /// Advance simulated time by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        if let Some(choice) = self.auto_answer {
            while self.answer_dialog(choice) {}
        }
        self.advance_fades(dt);
        if self.paused {
            return;
        }
        self.clock += dt;
        self.advance_alarms(dt);
        self.advance_commands(dt);
    }

    fn advance_fades(&mut self, dt: f32) {
        let mut finished = Vec::new();
        self.fades.retain_mut(|fade| {
            fade.remaining -= dt;
            if fade.remaining <= 0.0 {
                finished.extend(fade.notify);
                false
            } else {
                true
            }
        });
        for token in finished {
            self.events
                .push(EngineEvent::WindowClosed { token, result: None });
        }
    }

    fn advance_alarms(&mut self, dt: f32) {
        let mut fired = Vec::new();
        self.alarms.retain(|token, remaining| {
            *remaining -= dt;
            if *remaining <= 0.0 {
                fired.push(*token);
                false
            } else {
                true
            }
        });
        for token in fired {
            debug!("Headless: alarm {} fired", token);
            self.events.push(EngineEvent::AlarmFired(token));
        }
    }

    fn advance_commands(&mut self, dt: f32) {
        let actors: Vec<EntityHandle> = self.commands.keys().copied().collect();
        for actor in actors {
            let Some(command) = self.commands.get(&actor).cloned() else {
                continue;
            };
            let outcome = match command.kind {
                CommandKind::Move { target } => self.step_move(actor, target, dt),
                CommandKind::Speak { remaining } => {
                    let remaining = remaining - dt;
                    if remaining <= 0.0 {
                        Some(Ok(None))
                    } else {
                        if let Some(c) = self.commands.get_mut(&actor) {
                            c.kind = CommandKind::Speak { remaining };
                        }
                        None
                    }
                }
                CommandKind::Attack { target } => Some(self.resolve_attack(actor, target)),
            };
            let Some(outcome) = outcome else {
                continue;
            };
            self.commands.shift_remove(&actor);
            let Some(token) = command.notify else {
                continue;
            };
            match outcome {
                Ok(result) => self
                    .events
                    .push(EngineEvent::CommandFinished { token, result }),
                Err(reason) => self
                    .events
                    .push(EngineEvent::CommandDisqualified { token, reason }),
            }
        }
    }

    /// Walk towards `target`; `Some` once arrived
    fn step_move(
        &mut self,
        actor: EntityHandle,
        target: (f32, f32),
        dt: f32,
    ) -> Option<Result<Option<StackValue>, String>> {
        let speed = self.config.move_speed;
        let entity = self.entities.get_mut(&actor)?;
        let (dx, dy) = (target.0 - entity.position.0, target.1 - entity.position.1);
        let remaining = (dx * dx + dy * dy).sqrt();
        let step = speed * dt;
        if remaining <= step.max(0.0) {
            entity.position = target;
            debug!("Headless: {} arrived at {:?}", actor, target);
            return Some(Ok(None));
        }
        if speed <= 0.0 {
            return None;
        }
        entity.position.0 += dx / remaining * step;
        entity.position.1 += dy / remaining * step;
        None
    }

    /// Spend the attack cost and roll the outcome: a hit while the target
    /// still has hit points, which costs it one.
    fn resolve_attack(
        &mut self,
        attacker: EntityHandle,
        target: EntityHandle,
    ) -> Result<Option<StackValue>, String> {
        let cost = self.config.attack_cost;
        let Some(entity) = self.entities.get_mut(&attacker) else {
            return Err(format!("attacker {} is gone", attacker));
        };
        if entity.action_points < cost {
            return Err(format!(
                "attacker {} has {} action points, needs {}",
                attacker, entity.action_points, cost
            ));
        }
        entity.action_points -= cost;
        let hit = match self.entities.get_mut(&target) {
            Some(victim) if victim.hit_points > 0 => {
                victim.hit_points -= 1;
                true
            }
            _ => false,
        };
        debug!("Headless: {} attacks {}: hit={}", attacker, target, hit);
        Ok(Some(StackValue::from_bool(hit)))
    }

    /// Install a creature's new command, disqualifying the one it replaces
    fn replace_command(&mut self, actor: EntityHandle, command: Command) {
        if let Some(previous) = self.commands.insert(actor, command) {
            if let Some(token) = previous.notify {
                debug!("Headless: {} superseded for {}", token, actor);
                self.events.push(EngineEvent::CommandDisqualified {
                    token,
                    reason: format!("{} received a new command", actor),
                });
            }
        }
    }
}

impl World for HeadlessEngine {
    fn entity_kind(&self, entity: EntityHandle) -> Option<EntityKind> {
        self.entities.get(&entity).map(|e| e.kind)
    }

    fn entity_name(&self, entity: EntityHandle) -> Option<String> {
        self.entities.get(&entity).map(|e| e.name.clone())
    }

    fn position(&self, entity: EntityHandle) -> Option<(f32, f32)> {
        self.entities.get(&entity).map(|e| e.position)
    }

    fn hit_points(&self, creature: EntityHandle) -> Option<i32> {
        self.entities.get(&creature).map(|e| e.hit_points)
    }

    fn set_hit_points(&mut self, creature: EntityHandle, hit_points: i32) {
        if let Some(entity) = self.entities.get_mut(&creature) {
            entity.hit_points = hit_points;
        }
    }

    fn wall_is_open(&self, wall: EntityHandle) -> Option<bool> {
        self.entities
            .get(&wall)
            .filter(|e| e.kind == EntityKind::Wall)
            .map(|e| e.open)
    }

    fn set_wall_open(&mut self, wall: EntityHandle, open: bool) {
        if let Some(entity) = self.entities.get_mut(&wall) {
            entity.open = open;
        }
    }

    fn equipped_item(&self, creature: EntityHandle, slot: EquipSlot) -> Option<EntityHandle> {
        self.entities
            .get(&creature)
            .map(|e| e.equipment[slot.index()])
    }

    fn alignment(&self, creature: EntityHandle) -> Option<Alignment> {
        self.entities.get(&creature).map(|e| e.alignment)
    }

    fn set_alignment(&mut self, creature: EntityHandle, alignment: Alignment) {
        if let Some(entity) = self.entities.get_mut(&creature) {
            entity.alignment = alignment;
        }
    }

    fn destroy_entity(&mut self, entity: EntityHandle) {
        if self.entities.shift_remove(&entity).is_none() {
            return;
        }
        info!("Headless: {} destroyed", entity);
        // Its own command dies with it; waiters learn through the event.
        self.commands.shift_remove(&entity);
        for other in self.entities.values_mut() {
            for item in other.equipment.iter_mut() {
                if *item == entity {
                    *item = EntityHandle::NULL;
                }
            }
        }
        self.events.push(EngineEvent::EntityDestroyed(entity));
    }

    fn issue_move(&mut self, creature: EntityHandle, target: (f32, f32), notify: Option<WaitToken>) {
        debug!("Headless: {} moves to {:?}", creature, target);
        self.replace_command(
            creature,
            Command {
                kind: CommandKind::Move { target },
                notify,
            },
        );
    }

    fn issue_speech(&mut self, entity: EntityHandle, text: &str, notify: Option<WaitToken>) {
        let name = self.entity_name(entity).unwrap_or_default();
        self.output.push(format!("{}: {}", name, text));
        self.replace_command(
            entity,
            Command {
                kind: CommandKind::Speak {
                    remaining: self.config.speech_seconds,
                },
                notify,
            },
        );
    }
}

impl CombatSystem for HeadlessEngine {
    fn in_combat(&self) -> bool {
        self.combat
    }

    fn start_combat(&mut self) {
        info!("Headless: combat started");
        self.combat = true;
    }

    fn end_combat(&mut self) {
        info!("Headless: combat ended");
        self.combat = false;
    }

    fn action_points(&self, creature: EntityHandle) -> Option<i32> {
        self.entities.get(&creature).map(|e| e.action_points)
    }

    fn attack_cost(&self) -> i32 {
        self.config.attack_cost
    }

    fn issue_attack(&mut self, attacker: EntityHandle, target: EntityHandle, notify: Option<WaitToken>) {
        self.replace_command(
            attacker,
            Command {
                kind: CommandKind::Attack { target },
                notify,
            },
        );
    }
}

impl GuiManager for HeadlessEngine {
    fn interface_state(&self) -> InterfaceState {
        self.interface_state
    }

    fn print(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn show_message(&mut self, text: &str) {
        self.output.push(format!("[MESSAGE: {}]", text));
    }

    fn open_dialog(&mut self, text: &str, notify: Option<WaitToken>) {
        self.output.push(format!("[DIALOG: {}]", text));
        self.interface_state = InterfaceState::Dialog;
        self.dialogs.push_back(OpenDialog {
            text: text.to_string(),
            notify,
        });
    }

    fn fade(&mut self, fade_in: bool, seconds: f32, notify: Option<WaitToken>) {
        debug!(
            "Headless: fade {} over {}s",
            if fade_in { "in" } else { "out" },
            seconds
        );
        self.fades.push(Fade {
            remaining: seconds,
            notify,
        });
    }
}

impl AlarmClock for HeadlessEngine {
    fn set_alarm(&mut self, token: WaitToken, seconds: f32) {
        self.alarms.insert(token, seconds);
    }

    fn cancel_alarm(&mut self, token: WaitToken) {
        self.alarms.shift_remove(&token);
    }
}

impl Engine for HeadlessEngine {
    fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn forget_notification(&mut self, token: WaitToken) {
        for command in self.commands.values_mut() {
            if command.notify == Some(token) {
                command.notify = None;
            }
        }
        for dialog in self.dialogs.iter_mut() {
            if dialog.notify == Some(token) {
                dialog.notify = None;
            }
        }
        for fade in self.fades.iter_mut() {
            if fade.notify == Some(token) {
                fade.notify = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn create_engine() -> HeadlessEngine {
        let world = WorldConfig {
            entities: vec![
                EntitySpec {
                    handle: 1,
                    name: "Guard".to_string(),
                    kind: EntityKind::Creature,
                    ..EntitySpec::default()
                },
                EntitySpec {
                    handle: 2,
                    name: "Rat".to_string(),
                    kind: EntityKind::Creature,
                    hit_points: 1,
                    x: 3.0,
                    y: 4.0,
                    ..EntitySpec::default()
                },
            ],
        };
        HeadlessEngine::new(HeadlessConfig::default(), &world)
    }

    #[test]
    fn test_alarm_fires_after_interval() {
        let mut engine = create_engine();
        engine.set_alarm(WaitToken(1), 0.25);
        engine.advance(0.1);
        engine.advance(0.1);
        assert!(engine.drain_events().is_empty());
        engine.advance(0.1);
        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::AlarmFired(WaitToken(1))]
        );
    }

    #[test]
    fn test_alarm_stops_while_paused() {
        let mut engine = create_engine();
        engine.set_alarm(WaitToken(1), 0.1);
        engine.set_paused(true);
        engine.advance(1.0);
        assert_eq!(engine.drain_events(), vec![EngineEvent::WorldPaused(true)]);
        assert_eq!(engine.pending_alarms(), 1);
        engine.set_paused(false);
        engine.advance(0.2);
        let events = engine.drain_events();
        assert!(events.contains(&EngineEvent::AlarmFired(WaitToken(1))));
    }

    #[test]
    fn test_move_arrives() {
        let mut engine = create_engine();
        let guard = EntityHandle(1);
        engine.issue_move(guard, (4.0, 0.0), Some(WaitToken(9)));
        engine.advance(0.5);
        assert!(engine.drain_events().is_empty());
        engine.advance(0.6);
        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::CommandFinished {
                token: WaitToken(9),
                result: None
            }]
        );
        assert_eq!(engine.position(guard), Some((4.0, 0.0)));
    }

    #[test]
    fn test_new_command_disqualifies_previous() {
        let mut engine = create_engine();
        let guard = EntityHandle(1);
        engine.issue_move(guard, (100.0, 0.0), Some(WaitToken(1)));
        engine.issue_speech(guard, "Halt!", None);
        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            EngineEvent::CommandDisqualified { token: WaitToken(1), .. }
        ));
        assert_eq!(engine.output(), &["Guard: Halt!".to_string()]);
    }

    #[test]
    fn test_attack_without_points_is_disqualified() {
        let mut engine = create_engine();
        let guard = EntityHandle(1);
        engine.issue_attack(guard, EntityHandle(2), Some(WaitToken(3)));
        engine.set_action_points(guard, 0);
        engine.advance(0.1);
        let events = engine.drain_events();
        assert!(matches!(
            events[0],
            EngineEvent::CommandDisqualified { token: WaitToken(3), .. }
        ));
    }

    #[test]
    fn test_attack_hits_living_target() {
        let mut engine = create_engine();
        engine.issue_attack(EntityHandle(1), EntityHandle(2), Some(WaitToken(4)));
        engine.advance(0.1);
        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::CommandFinished {
                token: WaitToken(4),
                result: Some(StackValue::TRUE)
            }]
        );
        assert_eq!(engine.hit_points(EntityHandle(2)), Some(0));
        assert_eq!(engine.action_points(EntityHandle(1)), Some(4));
    }

    #[test]
    fn test_dialog_manual_answer() {
        let mut engine = create_engine();
        engine.set_auto_answer(None);
        engine.open_dialog("Pay the toll?", Some(WaitToken(5)));
        assert_eq!(engine.interface_state(), InterfaceState::Dialog);
        engine.advance(0.1);
        assert_eq!(engine.open_dialogs(), 1);
        assert!(engine.answer_dialog(2.0));
        assert_eq!(engine.interface_state(), InterfaceState::Main);
        assert_eq!(
            engine.drain_events(),
            vec![EngineEvent::WindowClosed {
                token: WaitToken(5),
                result: Some(StackValue::Number(2.0))
            }]
        );
    }

    #[test]
    fn test_destroy_emits_event_and_drops_command() {
        let mut engine = create_engine();
        let rat = EntityHandle(2);
        engine.equip(EntityHandle(1), EquipSlot::RightHand, rat);
        engine.issue_move(rat, (0.0, 0.0), Some(WaitToken(6)));
        engine.destroy_entity(rat);
        assert!(!engine.entity_exists(rat));
        assert!(!engine.has_command(rat));
        assert_eq!(
            engine.equipped_item(EntityHandle(1), EquipSlot::RightHand),
            Some(EntityHandle::NULL)
        );
        assert_eq!(engine.drain_events(), vec![EngineEvent::EntityDestroyed(rat)]);
    }

    #[test]
    fn test_forgotten_notification_is_silent() {
        let mut engine = create_engine();
        engine.issue_move(EntityHandle(1), (0.1, 0.0), Some(WaitToken(7)));
        engine.forget_notification(WaitToken(7));
        engine.advance(0.1);
        assert!(engine.drain_events().is_empty());
    }
}
