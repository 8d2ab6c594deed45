//! Feature settings shared by the background daemon and content runtime.

use serde::{Deserialize, Serialize};

fn enabled_default() -> bool {
    true
}

/// Persisted feature flags. A missing `enabled` field decodes as `true`
/// so a damaged store never silently switches exchange paste off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub swap_mode_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            swap_mode_enabled: false,
        }
    }
}

/// Partial update for [`Settings`]. `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_mode_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn enabled(value: bool) -> Self {
        Self {
            enabled: Some(value),
            ..Self::default()
        }
    }

    pub fn swap_mode(value: bool) -> Self {
        Self {
            swap_mode_enabled: Some(value),
            ..Self::default()
        }
    }

    /// Apply to `settings`. Returns true if any value changed.
    pub fn apply(&self, settings: &mut Settings) -> bool {
        let before = *settings;
        if let Some(v) = self.enabled {
            settings.enabled = v;
        }
        if let Some(v) = self.swap_mode_enabled {
            settings.swap_mode_enabled = v;
        }
        before != *settings
    }
}
