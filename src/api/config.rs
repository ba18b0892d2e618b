use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_CHART_GROUP;
use crate::error::{ChartError, ChartResult};

/// Bootstrap configuration of a [`super::RefreshState`].
///
/// This type is serializable so embedding dashboards can ship it next to
/// their own settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Group used when callers pass no group name.
    #[serde(default = "default_group_name")]
    pub default_group: String,
    /// Initial state of the global refresh switch.
    #[serde(default)]
    pub refresh_disabled: bool,
    /// Legacy passes draw count widgets last while any chart samples.
    #[serde(default = "default_legacy_count_widget_last")]
    pub legacy_count_widget_last: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            default_group: default_group_name(),
            refresh_disabled: false,
            legacy_count_widget_last: default_legacy_count_widget_last(),
        }
    }
}

impl RefreshConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_group(mut self, group: impl Into<String>) -> Self {
        self.default_group = group.into();
        self
    }

    /// Starts with every refresh entry point short-circuited.
    #[must_use]
    pub fn with_refresh_disabled(mut self, disabled: bool) -> Self {
        self.refresh_disabled = disabled;
        self
    }

    #[must_use]
    pub fn with_legacy_count_widget_last(mut self, enabled: bool) -> Self {
        self.legacy_count_widget_last = enabled;
        self
    }

    pub fn validate(&self) -> ChartResult<()> {
        if self.default_group.trim().is_empty() {
            return Err(ChartError::InvalidConfig(
                "default group name must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    /// Serializes config to pretty JSON for debug/config files.
    pub fn to_json_pretty(&self) -> ChartResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ChartError::InvalidData(format!("failed to serialize config: {e}")))
    }

    /// Deserializes and validates config from JSON.
    pub fn from_json_str(input: &str) -> ChartResult<Self> {
        let config: Self = serde_json::from_str(input)
            .map_err(|e| ChartError::InvalidData(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

fn default_group_name() -> String {
    DEFAULT_CHART_GROUP.to_owned()
}

fn default_legacy_count_widget_last() -> bool {
    true
}
