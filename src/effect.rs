use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::LedError;

/// How the controller has to drive an effect once it is accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Rendered once on submission
    Static,
    /// Rendered on every scheduler tick
    Periodic,
    /// Runs to completion inside the submission and leaves the current effect alone
    Transient,
}

#[derive(Hash, Eq, PartialEq, Copy, Clone, Debug)]
pub enum EffectKind {
    Fill,
    Fade,
    Wipe,
    Blink,
    BlinkFast,
    Flash,
    Rainbow,
    RainbowFill,
}

impl EffectKind {
    /// Every effect, in the order we advertise them
    pub const ALL: [EffectKind; 8] = [
        EffectKind::Fill,
        EffectKind::Fade,
        EffectKind::Wipe,
        EffectKind::Blink,
        EffectKind::BlinkFast,
        EffectKind::Flash,
        EffectKind::Rainbow,
        EffectKind::RainbowFill,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Fill => "fill",
            EffectKind::Fade => "fade",
            EffectKind::Wipe => "wipe",
            EffectKind::Blink => "blink",
            EffectKind::BlinkFast => "blink_fast",
            EffectKind::Flash => "flash",
            EffectKind::Rainbow => "rainbow",
            EffectKind::RainbowFill => "rainbow_fill",
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            EffectKind::Fill => Mode::Static,
            EffectKind::Flash => Mode::Transient,
            _ => Mode::Periodic,
        }
    }
}

impl FromStr for EffectKind {
    type Err = LedError;

    /// An empty name means `fill`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.is_empty() {
            return Ok(EffectKind::Fill);
        }

        EffectKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| LedError::UnknownEffect(name.to_string()))
    }
}

/// An inbound `set_effect` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectRequest {
    pub effect: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl EffectRequest {
    #[cfg(test)]
    pub fn new(effect: &str, color: Color) -> EffectRequest {
        EffectRequest {
            effect: effect.to_string(),
            r: color.r,
            g: color.g,
            b: color.b,
        }
    }

    pub fn color(&self) -> Color {
        Color::new(self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectResponse {
    pub success: bool,
    pub message: String,
}

impl EffectResponse {
    pub fn ok() -> EffectResponse {
        EffectResponse {
            success: true,
            message: String::new(),
        }
    }

    pub fn skipped() -> EffectResponse {
        EffectResponse {
            success: true,
            message: "Effect already set, skip".to_string(),
        }
    }

    pub fn failed(error: &LedError) -> EffectResponse {
        EffectResponse {
            success: false,
            message: error.to_string(),
        }
    }
}
