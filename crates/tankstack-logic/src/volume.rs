//! Geometry-volume models and structural scaling laws.
//!
//! Every fueled segment carries a [`VolumeModel`] that turns a placed piece's
//! absolute diameter and height into an internal volume. Tanks are
//! cylindrically symmetric, so the models are closed-form solids of
//! revolution:
//!
//! ```text
//!   Cylinder        Frustum          Dome
//!   ┌──────┐         ┌──┐            .--.
//!   │      │        /    \          /    \
//!   │      │       /      \        |      |
//!   └──────┘      └────────┘       └──────┘
//! ```
//!
//! ```
//! use tankstack_logic::volume::VolumeModel;
//!
//! let v = VolumeModel::Cylinder.evaluate(2.0, 3.0);
//! assert!((v - std::f32::consts::PI * 3.0).abs() < 1e-4);
//! ```

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Closed-form volume of a placed piece.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum VolumeModel {
    /// Straight cylinder of the placement's diameter.
    #[default]
    Cylinder,
    /// Truncated cone; `top_ratio` is top diameter ÷ bottom diameter.
    Frustum { top_ratio: f32 },
    /// Half of an ellipsoid of revolution (nose/bulkhead domes).
    Dome,
    /// Non-fueled (accessories).
    None,
}

impl VolumeModel {
    /// Volume in cubic units for a piece `diameter` wide and `height` tall.
    ///
    /// Negative or zero extents yield zero.
    pub fn evaluate(&self, diameter: f32, height: f32) -> f32 {
        if diameter <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        let r = diameter * 0.5;
        match self {
            Self::Cylinder => PI * r * r * height,
            Self::Frustum { top_ratio } => {
                let r2 = r * top_ratio.max(0.0);
                PI * height * (r * r + r * r2 + r2 * r2) / 3.0
            }
            // V = (2/3)π r² h for a half-ellipsoid with semi-axes r, r, h.
            Self::Dome => 2.0 / 3.0 * PI * r * r * height,
            Self::None => 0.0,
        }
    }

    pub fn is_fueled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Structural cost or mass law for one segment type.
///
/// A placed piece contributes `factor × diameter^exponent × aspect`, where
/// `aspect` is the height it actually occupies divided by its diameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingLaw {
    pub factor: f32,
    pub exponent: f32,
}

impl ScalingLaw {
    pub fn evaluate(&self, diameter: f32, height: f32) -> f32 {
        if diameter <= 0.0 {
            return 0.0;
        }
        let aspect = height.abs() / diameter;
        self.factor * diameter.powf(self.exponent) * aspect
    }
}

/// Aspect ratio of a cylinder holding `volume` at `diameter`.
///
/// Inverse of [`VolumeModel::Cylinder`]; used to convert volumetric
/// tolerances into aspect-ratio tolerances.
pub fn cylinder_aspect_for_volume(volume: f32, diameter: f32) -> f32 {
    if diameter <= 0.0 {
        return 0.0;
    }
    let r = diameter * 0.5;
    volume / (PI * r * r * diameter)
}
