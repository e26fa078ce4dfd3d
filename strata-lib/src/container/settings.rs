use serde::{Deserialize, Serialize};

use crate::mix::{clamp_unit, LayerKind, MixLevels, MixState};

/// Persisted engine configuration.
///
/// `current_intensity` and the custom mix fields are shared across every
/// client of a session; `master_volume` is local to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub default_intensity: f32,
    pub combat_intensity: f32,
    pub auto_combat_intensity: bool,
    pub master_volume: f32,
    pub current_intensity: Option<f32>,
    pub custom_mix_enabled: bool,
    pub custom_high_volume: f32,
    pub custom_mid_volume: f32,
    pub custom_low_volume: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_intensity: 0.5,
            combat_intensity: 1.0,
            auto_combat_intensity: true,
            master_volume: 1.0,
            current_intensity: None,
            custom_mix_enabled: false,
            custom_high_volume: 1.0,
            custom_mid_volume: 1.0,
            custom_low_volume: 1.0,
        }
    }
}

impl EngineSettings {
    /// Clamp every scalar into `[0, 1]`.
    pub fn sanitized(mut self) -> Self {
        self.default_intensity = clamp_unit(self.default_intensity);
        self.combat_intensity = clamp_unit(self.combat_intensity);
        self.master_volume = clamp_unit(self.master_volume);
        self.current_intensity = self.current_intensity.map(clamp_unit);
        self.custom_high_volume = clamp_unit(self.custom_high_volume);
        self.custom_mid_volume = clamp_unit(self.custom_mid_volume);
        self.custom_low_volume = clamp_unit(self.custom_low_volume);
        self
    }

    /// Initial mix state at engine start.
    pub fn mix_state(&self) -> MixState {
        let settings = self.clone().sanitized();
        MixState {
            intensity: settings
                .current_intensity
                .unwrap_or(settings.default_intensity),
            custom_mix_enabled: settings.custom_mix_enabled,
            custom_volumes: MixLevels::new(
                settings.custom_low_volume,
                settings.custom_mid_volume,
                settings.custom_high_volume,
            ),
            master_volume: settings.master_volume,
        }
    }

    /// Fold a persisted change back into the record.
    pub fn apply(&mut self, change: &SettingChange) {
        match *change {
            SettingChange::Intensity(value) => self.current_intensity = Some(clamp_unit(value)),
            SettingChange::MasterVolume(value) => self.master_volume = clamp_unit(value),
            SettingChange::CustomMixEnabled(enabled) => self.custom_mix_enabled = enabled,
            SettingChange::CustomVolume(kind, value) => {
                let value = clamp_unit(value);
                match kind {
                    LayerKind::High => self.custom_high_volume = value,
                    LayerKind::Mid => self.custom_mid_volume = value,
                    LayerKind::Low => self.custom_low_volume = value,
                }
            }
        }
    }
}

/// A single persisted setting write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingChange {
    Intensity(f32),
    MasterVolume(f32),
    CustomMixEnabled(bool),
    CustomVolume(LayerKind, f32),
}

impl SettingChange {
    /// Whether the setting is world-shared (only the authoritative client
    /// may write it).
    pub fn is_shared(&self) -> bool {
        !matches!(self, SettingChange::MasterVolume(_))
    }
}
