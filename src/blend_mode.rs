//! Layer blend modes and their four character codes.
//!
//! # [Adobe Docs](https://www.adobe.com/devnet-apps/photoshop/fileformatashtml/)
//!
//! Blend mode key: 'pass' = pass through, 'norm' = normal, 'diss' = dissolve,
//! 'dark' = darken, 'mul ' = multiply, 'idiv' = color burn, 'lbrn' = linear
//! burn, 'dkCl' = darker color, 'lite' = lighten, 'scrn' = screen,
//! 'div ' = color dodge, 'lddg' = linear dodge, 'lgCl' = lighter color,
//! 'over' = overlay, 'sLit' = soft light, 'hLit' = hard light,
//! 'vLit' = vivid light, 'lLit' = linear light, 'pLit' = pin light,
//! 'hMix' = hard mix, 'diff' = difference, 'smud' = exclusion,
//! 'fsub' = subtract, 'fdiv' = divide, 'hue ' = hue, 'sat ' = saturation,
//! 'colr' = color, 'lum ' = luminosity

use serde::Serialize;

use crate::error::{PsdError, Result};

/// How a layer blends with the layers below it.
///
/// `PassThrough` only ever appears on groups, and even there it is stored
/// asymmetrically: the layer record itself says `Normal` while the group's
/// section divider block carries the `pass` key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[allow(missing_docs)]
pub enum BlendMode {
    PassThrough,
    Normal,
    Dissolve,
    Darken,
    Multiply,
    ColorBurn,
    LinearBurn,
    DarkerColor,
    Lighten,
    Screen,
    ColorDodge,
    LinearDodge,
    LighterColor,
    Overlay,
    SoftLight,
    HardLight,
    VividLight,
    LinearLight,
    PinLight,
    HardMix,
    Difference,
    Exclusion,
    Subtract,
    Divide,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Decode a blend mode from its four character code.
    pub fn from_fourcc(key: [u8; 4]) -> Result<BlendMode> {
        let mode = match &key {
            b"pass" => BlendMode::PassThrough,
            b"norm" => BlendMode::Normal,
            b"diss" => BlendMode::Dissolve,
            b"dark" => BlendMode::Darken,
            b"mul " => BlendMode::Multiply,
            b"idiv" => BlendMode::ColorBurn,
            b"lbrn" => BlendMode::LinearBurn,
            b"dkCl" => BlendMode::DarkerColor,
            b"lite" => BlendMode::Lighten,
            b"scrn" => BlendMode::Screen,
            b"div " => BlendMode::ColorDodge,
            b"lddg" => BlendMode::LinearDodge,
            b"lgCl" => BlendMode::LighterColor,
            b"over" => BlendMode::Overlay,
            b"sLit" => BlendMode::SoftLight,
            b"hLit" => BlendMode::HardLight,
            b"vLit" => BlendMode::VividLight,
            b"lLit" => BlendMode::LinearLight,
            b"pLit" => BlendMode::PinLight,
            b"hMix" => BlendMode::HardMix,
            b"diff" => BlendMode::Difference,
            b"smud" => BlendMode::Exclusion,
            b"fsub" => BlendMode::Subtract,
            b"fdiv" => BlendMode::Divide,
            b"hue " => BlendMode::Hue,
            b"sat " => BlendMode::Saturation,
            b"colr" => BlendMode::Color,
            b"lum " => BlendMode::Luminosity,
            _ => {
                return Err(PsdError::InvalidSignature {
                    expected: &["a blend mode key"],
                    found: key,
                })
            }
        };
        Ok(mode)
    }

    /// The four character code written to disk.
    pub fn fourcc(self) -> [u8; 4] {
        *match self {
            BlendMode::PassThrough => b"pass",
            BlendMode::Normal => b"norm",
            BlendMode::Dissolve => b"diss",
            BlendMode::Darken => b"dark",
            BlendMode::Multiply => b"mul ",
            BlendMode::ColorBurn => b"idiv",
            BlendMode::LinearBurn => b"lbrn",
            BlendMode::DarkerColor => b"dkCl",
            BlendMode::Lighten => b"lite",
            BlendMode::Screen => b"scrn",
            BlendMode::ColorDodge => b"div ",
            BlendMode::LinearDodge => b"lddg",
            BlendMode::LighterColor => b"lgCl",
            BlendMode::Overlay => b"over",
            BlendMode::SoftLight => b"sLit",
            BlendMode::HardLight => b"hLit",
            BlendMode::VividLight => b"vLit",
            BlendMode::LinearLight => b"lLit",
            BlendMode::PinLight => b"pLit",
            BlendMode::HardMix => b"hMix",
            BlendMode::Difference => b"diff",
            BlendMode::Exclusion => b"smud",
            BlendMode::Subtract => b"fsub",
            BlendMode::Divide => b"fdiv",
            BlendMode::Hue => b"hue ",
            BlendMode::Saturation => b"sat ",
            BlendMode::Color => b"colr",
            BlendMode::Luminosity => b"lum ",
        }
    }
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_round_trips_through_its_fourcc() {
        let modes = [
            BlendMode::PassThrough,
            BlendMode::Normal,
            BlendMode::Dissolve,
            BlendMode::Darken,
            BlendMode::Multiply,
            BlendMode::ColorBurn,
            BlendMode::LinearBurn,
            BlendMode::DarkerColor,
            BlendMode::Lighten,
            BlendMode::Screen,
            BlendMode::ColorDodge,
            BlendMode::LinearDodge,
            BlendMode::LighterColor,
            BlendMode::Overlay,
            BlendMode::SoftLight,
            BlendMode::HardLight,
            BlendMode::VividLight,
            BlendMode::LinearLight,
            BlendMode::PinLight,
            BlendMode::HardMix,
            BlendMode::Difference,
            BlendMode::Exclusion,
            BlendMode::Subtract,
            BlendMode::Divide,
            BlendMode::Hue,
            BlendMode::Saturation,
            BlendMode::Color,
            BlendMode::Luminosity,
        ];
        for mode in modes {
            assert_eq!(BlendMode::from_fourcc(mode.fourcc()).unwrap(), mode);
        }
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(BlendMode::from_fourcc(*b"nope").is_err());
    }
}
