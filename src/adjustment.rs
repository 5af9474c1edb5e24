//! Adjustment parameters and style selection
//!
//! The adjustment vector is what the colour endpoint receives as its `params`
//! field. It lives only as long as the current media asset: every new
//! acquisition puts it back to defaults.

use crate::error::{MediaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric adjustment vector sent to the adjust endpoint
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentVector {
    /// Saturation multiplier (0.0 to 2.0, 1.0 = unchanged)
    pub saturation: f32,

    /// Hue rotation (-1.0 to 1.0, 0.0 = unchanged)
    pub hue: f32,

    /// Brightness multiplier (0.0 to 2.0, 1.0 = unchanged)
    pub brightness: f32,

    /// Colour temperature shift (-1.0 cooler to 1.0 warmer)
    pub temperature: f32,

    /// Shadow lift (-1.0 to 1.0)
    pub shadow: f32,
}

impl Default for AdjustmentVector {
    fn default() -> Self {
        Self {
            saturation: 1.0,
            hue: 0.0,
            brightness: 1.0,
            temperature: 0.0,
            shadow: 0.0,
        }
    }
}

impl AdjustmentVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, parameter: Parameter) -> f32 {
        match parameter {
            Parameter::Saturation => self.saturation,
            Parameter::Hue => self.hue,
            Parameter::Brightness => self.brightness,
            Parameter::Temperature => self.temperature,
            Parameter::Shadow => self.shadow,
        }
    }

    /// Set one parameter. Range checking belongs to the input control
    /// (see [`ParameterSpec::clamp`]); the value is stored as given.
    pub fn set(&mut self, parameter: Parameter, value: f32) {
        let slot = match parameter {
            Parameter::Saturation => &mut self.saturation,
            Parameter::Hue => &mut self.hue,
            Parameter::Brightness => &mut self.brightness,
            Parameter::Temperature => &mut self.temperature,
            Parameter::Shadow => &mut self.shadow,
        };
        *slot = value;
    }

    /// JSON text for the multipart `params` field
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Names of the adjustable parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Saturation,
    Hue,
    Brightness,
    Temperature,
    Shadow,
}

impl Parameter {
    pub const ALL: [Parameter; 5] = [
        Parameter::Saturation,
        Parameter::Hue,
        Parameter::Brightness,
        Parameter::Temperature,
        Parameter::Shadow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Saturation => "saturation",
            Parameter::Hue => "hue",
            Parameter::Brightness => "brightness",
            Parameter::Temperature => "temperature",
            Parameter::Shadow => "shadow",
        }
    }

    pub fn spec(&self) -> ParameterSpec {
        let (label, min, max, default) = match self {
            Parameter::Saturation => ("Saturation", 0.0, 2.0, 1.0),
            Parameter::Hue => ("Hue", -1.0, 1.0, 0.0),
            Parameter::Brightness => ("Brightness", 0.0, 2.0, 1.0),
            Parameter::Temperature => ("Temperature", -1.0, 1.0, 0.0),
            Parameter::Shadow => ("Shadow", -1.0, 1.0, 0.0),
        };
        ParameterSpec {
            parameter: *self,
            label,
            min,
            max,
            step: 0.1,
            default,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self> {
        Parameter::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MediaError::ValidationFailed(format!("Unknown parameter: {}", s)))
    }
}

/// Slider description for one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub parameter: Parameter,
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

impl ParameterSpec {
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Bring an arbitrary control value into range. NaN maps to the default.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// One entry of the style catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Style {
    pub id: &'static str,
    pub name: &'static str,
}

pub const STYLE_CATALOG: [Style; 5] = [
    Style { id: "starry_night", name: "Starry Night - Van Gogh" },
    Style { id: "kandinsky", name: "Composition VII - Kandinsky" },
    Style { id: "picasso", name: "The Old Guitarist - Picasso" },
    Style { id: "monet", name: "Water Lilies - Monet" },
    Style { id: "van_gogh", name: "The Cafe Terrace - Van Gogh" },
];

pub fn find_style(id: &str) -> Option<&'static Style> {
    STYLE_CATALOG.iter().find(|style| style.id == id)
}

/// Per-screen parameter state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustmentState {
    vector: AdjustmentVector,
    style: Option<&'static Style>,
}

impl AdjustmentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector(&self) -> &AdjustmentVector {
        &self.vector
    }

    pub fn set_parameter(&mut self, parameter: Parameter, value: f32) {
        self.vector.set(parameter, value);
    }

    /// Restore the vector defaults. The style choice survives new media.
    pub fn reset(&mut self) {
        self.vector.reset();
    }

    pub fn select_style(&mut self, id: &str) -> Result<&'static Style> {
        let style = find_style(id)
            .ok_or_else(|| MediaError::ValidationFailed(format!("Unknown style: {}", id)))?;
        self.style = Some(style);
        Ok(style)
    }

    pub fn clear_style(&mut self) {
        self.style = None;
    }

    pub fn style(&self) -> Option<&'static Style> {
        self.style
    }
}
