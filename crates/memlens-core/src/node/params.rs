use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Divisor applied to UI-space coordinates
pub const WINDOW_SCALE: &str = "window_scale";

/// Consumer-supplied values that feed derived-field computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    values: BTreeMap<String, f64>,
}

impl Default for Parameters {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert(WINDOW_SCALE.to_string(), 1.0);
        Self { values }
    }
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous value
    pub fn set(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    /// Window scale, falling back to 1.0 for zero or non-finite values
    pub fn window_scale(&self) -> f32 {
        let scale = self.get_or(WINDOW_SCALE, 1.0) as f32;
        if scale.is_finite() && scale != 0.0 {
            scale
        } else {
            1.0
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }
}
