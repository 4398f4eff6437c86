//! Solved stacks: absolute-unit placements and their derived queries.
//!
//! A [`SegmentStack`] is one layer's immutable result. Placements are listed
//! bottom to top; vertical offsets are relative to the stack's centre so a
//! renderer can place meshes directly.
//!
//! [`SegmentStacks`] pairs the skin and core layers and checks, once at
//! construction, that both share one height and diameter.

use std::sync::Arc;

use crate::diagnostics::{categories, Diagnostics};
use crate::segment::{Asset, CapPosition, SegmentDef, SegmentRole};

/// One placed piece.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlacement {
    pub role: SegmentRole,
    pub segment: Arc<SegmentDef>,
    /// Index into `segment.assets`.
    pub asset: usize,
    /// Terminator end, if this piece terminates the stack.
    pub cap: Option<CapPosition>,
    /// Flex region ordinal, for body pieces.
    pub compartment: Option<usize>,
    /// Height of the piece's bottom face above the stack bottom.
    pub base: f32,
    /// Height the piece occupies.
    pub height: f32,
    /// Outward padding inserted next to this piece.
    pub padding: f32,
    /// Mesh scale; a negative Y flips the piece.
    pub scale: [f32; 3],
    /// Mesh origin relative to the stack centre.
    pub offset: [f32; 3],
}

impl SegmentPlacement {
    pub fn asset(&self) -> Option<&Asset> {
        self.segment.asset(self.asset)
    }

    pub fn asset_name(&self) -> &str {
        self.asset().map(|a| a.name.as_str()).unwrap_or("")
    }

    pub fn is_flipped(&self) -> bool {
        self.scale[1] < 0.0
    }

    /// Diameter the piece is placed at.
    pub fn diameter(&self) -> f32 {
        self.asset()
            .map(|a| a.native_diameter * self.scale[0])
            .unwrap_or(0.0)
    }

    /// `| |scaleY / scaleX| − 1 |`.
    pub fn distortion(&self) -> f32 {
        if self.scale[0] == 0.0 {
            return 0.0;
        }
        ((self.scale[1] / self.scale[0]).abs() - 1.0).abs()
    }

    pub fn is_fueled(&self) -> bool {
        self.role.is_fueled() && self.segment.volume.is_fueled()
    }

    pub fn volume(&self) -> f32 {
        if !self.is_fueled() {
            return 0.0;
        }
        self.segment.volume.evaluate(self.diameter(), self.height)
    }

    pub fn cost(&self) -> Option<f32> {
        self.segment
            .cost
            .map(|law| law.evaluate(self.diameter(), self.height))
    }

    pub fn mass(&self) -> Option<f32> {
        self.segment
            .mass
            .map(|law| law.evaluate(self.diameter(), self.height))
    }
}

/// One solved layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStack {
    pub diameter: f32,
    pub height: f32,
    pub placements: Vec<SegmentPlacement>,
}

impl SegmentStack {
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn half_height(&self) -> f32 {
        self.height * 0.5
    }

    pub fn diameter(&self) -> f32 {
        self.diameter
    }

    pub fn placements(&self) -> &[SegmentPlacement] {
        &self.placements
    }

    /// Sum of fueled placements' volumes.
    pub fn evaluate_tank_volume(&self) -> f32 {
        self.placements.iter().map(SegmentPlacement::volume).sum()
    }

    /// Sum over placements whose segment defines a cost law.
    pub fn evaluate_structural_cost(&self) -> f32 {
        self.placements.iter().filter_map(SegmentPlacement::cost).sum()
    }

    /// Sum over placements whose segment defines a mass law.
    pub fn evaluate_structural_mass(&self) -> f32 {
        self.placements.iter().filter_map(SegmentPlacement::mass).sum()
    }

    /// Largest distortion of any placement; zero for an empty stack.
    pub fn worst_distortion(&self) -> f32 {
        self.placements
            .iter()
            .map(SegmentPlacement::distortion)
            .fold(0.0, f32::max)
    }

    /// Interior face of the terminator at `position`, centred coordinates.
    pub fn cap_boundary(&self, position: CapPosition) -> Option<f32> {
        let cap = self.placements.iter().find(|p| p.cap == Some(position))?;
        let face = match position {
            CapPosition::Bottom => cap.base + cap.height,
            CapPosition::Top => cap.base,
        };
        Some(face - self.half_height())
    }

    /// Vertical extent of each body compartment, centred coordinates.
    pub fn compartment_bounds(&self) -> Vec<(f32, f32)> {
        let mut bounds: Vec<(usize, f32, f32)> = Vec::new();
        for p in &self.placements {
            let Some(c) = p.compartment else { continue };
            let (low, high) = (p.base, p.base + p.height);
            match bounds.iter_mut().find(|(id, _, _)| *id == c) {
                Some(entry) => {
                    entry.1 = entry.1.min(low);
                    entry.2 = entry.2.max(high);
                }
                None => bounds.push((c, low, high)),
            }
        }
        let half = self.half_height();
        bounds
            .into_iter()
            .map(|(_, low, high)| (low - half, high - half))
            .collect()
    }

    pub fn count_role(&self, role: SegmentRole) -> usize {
        self.placements.iter().filter(|p| p.role == role).count()
    }
}

/// Tolerances for the skin/core consistency check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackTolerance {
    /// Absolute height difference.
    pub height: f32,
    /// Relative diameter difference.
    pub diameter: f32,
}

impl Default for StackTolerance {
    fn default() -> Self {
        Self {
            height: 1e-3,
            diameter: 1e-4,
        }
    }
}

/// Skin and core layers of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStacks {
    pub skin: SegmentStack,
    pub core: SegmentStack,
    /// Both layers matched within tolerance.
    pub consistent: bool,
}

impl SegmentStacks {
    /// Pair two layers, reporting any height or diameter mismatch.
    pub fn new(
        skin: SegmentStack,
        core: SegmentStack,
        tolerance: StackTolerance,
        diag: &mut Diagnostics,
    ) -> Self {
        let mut consistent = true;
        if (skin.height - core.height).abs() > tolerance.height {
            diag.error(
                categories::MISMATCH,
                format!(
                    "skin height {:.4} does not match core height {:.4}",
                    skin.height, core.height
                ),
            );
            consistent = false;
        }
        let scale = skin.diameter.abs().max(core.diameter.abs()).max(f32::MIN_POSITIVE);
        if (skin.diameter - core.diameter).abs() / scale > tolerance.diameter {
            diag.error(
                categories::MISMATCH,
                format!(
                    "skin diameter {:.4} does not match core diameter {:.4}",
                    skin.diameter, core.diameter
                ),
            );
            consistent = false;
        }
        Self {
            skin,
            core,
            consistent,
        }
    }

    pub fn diameter(&self) -> f32 {
        self.skin.diameter
    }

    pub fn height(&self) -> f32 {
        self.skin.height
    }

    pub fn half_height(&self) -> f32 {
        self.skin.half_height()
    }

    /// Worse of the two layers' distortion.
    pub fn worst_distortion(&self) -> f32 {
        self.skin.worst_distortion().max(self.core.worst_distortion())
    }
}
