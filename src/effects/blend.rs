//! Per-channel blend formulas.
//!
//! Every function takes the backdrop channel `cb` and the source channel `cs`, both straight
//! (non-premultiplied) values in `[0, 1]`, and returns the blended channel. Alpha is never touched
//! here; [`crate::effects::composite`] folds the blended color back in with source-over.

use std::fmt;
use std::str::FromStr;

/// Photographic blend mode of a print layer.
///
/// Parsing is lenient: unknown names resolve to [`BlendMode::Normal`] instead of failing the
/// request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Source replaces backdrop.
    #[default]
    Normal,
    /// `cb * cs`.
    Multiply,
    /// `cb + cs - cb * cs`.
    Screen,
    /// Multiply or screen, keyed on the backdrop.
    Overlay,
    /// Smooth overlay variant (W3C compositing definition).
    SoftLight,
    /// Overlay with backdrop and source swapped.
    HardLight,
    /// Brightens the backdrop towards the source.
    ColorDodge,
    /// Darkens the backdrop towards the source.
    ColorBurn,
    /// `min(cb, cs)`.
    Darken,
    /// `max(cb, cs)`.
    Lighten,
    /// `|cb - cs|`.
    Difference,
    /// `cb + cs - 2 * cb * cs`.
    Exclusion,
}

impl BlendMode {
    /// All modes, in declaration order.
    pub const ALL: [BlendMode; 12] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::SoftLight,
        BlendMode::HardLight,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::Difference,
        BlendMode::Exclusion,
    ];

    /// Canonical kebab-case name (CSS `mix-blend-mode` spelling).
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::SoftLight => "soft-light",
            Self::HardLight => "hard-light",
            Self::ColorDodge => "color-dodge",
            Self::ColorBurn => "color-burn",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
        }
    }

    /// Stable tag used by the composite fingerprint. Never reorder.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Multiply => 1,
            Self::Screen => 2,
            Self::Overlay => 3,
            Self::SoftLight => 4,
            Self::HardLight => 5,
            Self::ColorDodge => 6,
            Self::ColorBurn => 7,
            Self::Darken => 8,
            Self::Lighten => 9,
            Self::Difference => 10,
            Self::Exclusion => 11,
        }
    }

    /// Parse a mode name, returning `None` for unknown names.
    ///
    /// Case, `-`, `_` and spaces are ignored, so `"soft-light"`, `"softLight"` and `"SOFT_LIGHT"`
    /// all match.
    pub fn parse_strict(s: &str) -> Option<Self> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        let mode = match folded.as_str() {
            "normal" | "sourceover" => Self::Normal,
            "multiply" => Self::Multiply,
            "screen" => Self::Screen,
            "overlay" => Self::Overlay,
            "softlight" => Self::SoftLight,
            "hardlight" => Self::HardLight,
            "colordodge" => Self::ColorDodge,
            "colorburn" => Self::ColorBurn,
            "darken" => Self::Darken,
            "lighten" => Self::Lighten,
            "difference" => Self::Difference,
            "exclusion" => Self::Exclusion,
            _ => return None,
        };
        Some(mode)
    }

    /// Parse a mode name, falling back to [`BlendMode::Normal`].
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse_strict(s).unwrap_or_else(|| {
            tracing::debug!(blend_mode = s, "unknown blend mode, using normal");
            Self::Normal
        })
    }

    /// Blend one channel. See [`blend_channel`].
    pub fn apply(self, cb: f32, cs: f32) -> f32 {
        blend_channel(self, cb, cs)
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BlendMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl serde::Serialize for BlendMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> serde::Deserialize<'de> for BlendMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Other(serde::de::IgnoredAny),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(s) => Self::parse_lenient(&s),
            Repr::Other(_) => Self::Normal,
        })
    }
}

/// Blend a single straight-alpha channel: backdrop `cb`, source `cs`.
///
/// Inputs are clamped to `[0, 1]` and so is the result.
pub fn blend_channel(mode: BlendMode, cb: f32, cs: f32) -> f32 {
    let cb = cb.clamp(0.0, 1.0);
    let cs = cs.clamp(0.0, 1.0);
    let out = match mode {
        BlendMode::Normal => cs,
        BlendMode::Multiply => multiply(cb, cs),
        BlendMode::Screen => screen(cb, cs),
        BlendMode::Overlay => overlay(cb, cs),
        BlendMode::SoftLight => soft_light(cb, cs),
        BlendMode::HardLight => hard_light(cb, cs),
        BlendMode::ColorDodge => color_dodge(cb, cs),
        BlendMode::ColorBurn => color_burn(cb, cs),
        BlendMode::Darken => cb.min(cs),
        BlendMode::Lighten => cb.max(cs),
        BlendMode::Difference => (cb - cs).abs(),
        BlendMode::Exclusion => exclusion(cb, cs),
    };
    out.clamp(0.0, 1.0)
}

pub fn multiply(cb: f32, cs: f32) -> f32 {
    cb * cs
}

pub fn screen(cb: f32, cs: f32) -> f32 {
    cb + cs - cb * cs
}

pub fn overlay(cb: f32, cs: f32) -> f32 {
    if cb <= 0.5 {
        2.0 * cb * cs
    } else {
        1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
    }
}

pub fn hard_light(cb: f32, cs: f32) -> f32 {
    overlay(cs, cb)
}

pub fn soft_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        let d = if cb <= 0.25 {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        } else {
            cb.sqrt()
        };
        cb + (2.0 * cs - 1.0) * (d - cb)
    }
}

pub fn color_dodge(cb: f32, cs: f32) -> f32 {
    if cs >= 1.0 {
        1.0
    } else {
        (cb / (1.0 - cs)).min(1.0)
    }
}

pub fn color_burn(cb: f32, cs: f32) -> f32 {
    if cs <= 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - cb) / cs).min(1.0)
    }
}

pub fn exclusion(cb: f32, cs: f32) -> f32 {
    cb + cs - 2.0 * cb * cs
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blend.rs"]
mod tests;
