//! Save/restore of the global intensity around combat encounters.

use std::collections::HashSet;

/// What the engine should do after a combat ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEnd {
    /// Another encounter is still running; leave everything alone.
    StillActive,
    /// Fade back to the saved pre-combat intensity.
    Restore(f32),
    /// The user changed intensity during combat (or nothing was saved).
    Keep,
}

#[derive(Debug, Clone, Default)]
pub struct CombatPolicy {
    pre_combat_intensity: Option<f32>,
    user_override: bool,
    encounters: HashSet<String>,
}

impl CombatPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_combat_intensity(&self) -> Option<f32> {
        self.pre_combat_intensity
    }

    pub fn user_overrode(&self) -> bool {
        self.user_override
    }

    pub fn active_encounters(&self) -> usize {
        self.encounters.len()
    }

    /// True while a pre-combat snapshot is held.
    pub fn in_override_window(&self) -> bool {
        self.pre_combat_intensity.is_some()
    }

    /// Record a started encounter. When `enabled`, snapshot `current`
    /// unless a snapshot is already held, and return `true` so the caller
    /// fades to the combat intensity.
    pub fn encounter_started(&mut self, combat_id: &str, current: f32, enabled: bool) -> bool {
        self.encounters.insert(combat_id.to_string());
        if !enabled {
            return false;
        }
        if self.pre_combat_intensity.is_none() {
            self.pre_combat_intensity = Some(current);
            self.user_override = false;
        }
        true
    }

    /// Record an ended encounter and decide what to do with intensity.
    pub fn encounter_ended(&mut self, combat_id: &str) -> CombatEnd {
        self.encounters.remove(combat_id);
        if !self.encounters.is_empty() {
            return CombatEnd::StillActive;
        }

        let decision = match (self.pre_combat_intensity, self.user_override) {
            (Some(previous), false) => CombatEnd::Restore(previous),
            _ => CombatEnd::Keep,
        };
        self.pre_combat_intensity = None;
        self.user_override = false;
        decision
    }

    /// A manual intensity change happened.
    pub fn note_manual_change(&mut self) {
        if self.in_override_window() {
            self.user_override = true;
        }
    }
}
