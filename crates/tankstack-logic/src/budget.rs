//! Flex-budget negotiation.
//!
//! Each Flex region's aspect-ratio budget starts as its share of the layer's
//! fueled height minus the fixed pieces bordering it. Skin and core regions
//! are then reconciled pairwise: a region below its segment's minimum is
//! raised (or collapsed to zero when that is the smaller move) by a shift
//! applied to both layers and taken back from its neighbouring regions.
//!
//! When a shift is larger than the tolerated deviation, or would push a
//! neighbour out of range, both layers drop their intertanks and retry with
//! a single merged region.

use crate::diagnostics::{categories, Diagnostics};
use crate::proto::ProtoSegmentStack;
use crate::volume::{cylinder_aspect_for_volume, VolumeModel};

/// Why reconciling a region pair failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetFailure {
    /// The required shift exceeds the tolerated deviation.
    ShiftTooLarge { region: usize, shift: f32 },
    /// Propagating the shift made a neighbouring region invalid.
    NeighborInvalid { region: usize, shift: f32 },
}

impl BudgetFailure {
    pub fn shift(&self) -> f32 {
        match self {
            Self::ShiftTooLarge { shift, .. } | Self::NeighborInvalid { shift, .. } => *shift,
        }
    }
}

/// Summary of a negotiation run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BudgetOutcome {
    /// Intertanks were excised.
    pub excised: bool,
    /// Every region ended up within its constraints.
    pub satisfied: bool,
}

/// Aspect-ratio equivalent of a volumetric deviation fraction.
///
/// Treats each layer as a plain cylinder and takes the smaller of the two.
pub fn max_aspect_deviation(
    skin: &ProtoSegmentStack,
    core: &ProtoSegmentStack,
    max_volume_deviation: f32,
) -> f32 {
    let layer = |stack: &ProtoSegmentStack| {
        let volume = VolumeModel::Cylinder.evaluate(stack.diameter, stack.height);
        cylinder_aspect_for_volume(volume * max_volume_deviation, stack.diameter)
    };
    layer(skin).min(layer(core))
}

/// Set every Flex region's tentative budget.
pub fn assign_budgets(stack: &mut ProtoSegmentStack) {
    let fueled = stack.fueled_aspect();
    for index in stack.flex_indices() {
        let neighbors = stack.fixed_neighbor_aspect(index);
        if let Some(region) = stack.flex_mut(index) {
            region.aspect = fueled * region.weight - neighbors;
        }
    }
}

/// Shift bringing both sides of a region pair to a valid budget.
///
/// Zero when both are already valid. Otherwise the smallest symmetric raise
/// reaching both minimums, or a collapse to zero when both sides are equal
/// and collapsing moves less.
pub fn required_shift(
    skin_aspect: f32,
    skin_min: f32,
    core_aspect: f32,
    core_min: f32,
    epsilon: f32,
) -> f32 {
    let valid = |aspect: f32, min: f32| aspect.abs() <= epsilon || aspect >= min - epsilon;
    if valid(skin_aspect, skin_min) && valid(core_aspect, core_min) {
        return 0.0;
    }
    let skin_excess = skin_aspect - skin_min;
    let core_excess = core_aspect - core_min;
    let shift = (-skin_excess).max(-core_excess);
    if (skin_aspect - core_aspect).abs() <= epsilon && skin_aspect.abs() < shift.abs() {
        return -skin_aspect;
    }
    shift
}

/// Apply `shift` to the region at `index` and take it back from its neighbours.
///
/// Returns false when a neighbour that was valid becomes invalid.
fn apply_shift(stack: &mut ProtoSegmentStack, index: usize, shift: f32, epsilon: f32) -> bool {
    let Some(region) = stack.flex_mut(index) else {
        return true;
    };
    region.aspect += shift;
    let neighbors: Vec<usize> = region.neighbors().collect();
    if neighbors.is_empty() {
        return true;
    }

    // Split evenly between neighbours.
    let share = shift / neighbors.len() as f32;
    let mut intact = true;
    for n in neighbors {
        if let Some(neighbor) = stack.flex_mut(n) {
            let was_valid = neighbor.is_valid(epsilon);
            neighbor.aspect -= share;
            if was_valid && !neighbor.is_valid(epsilon) {
                intact = false;
            }
        }
    }
    intact
}

/// Reconcile every paired Flex region, bottom to top.
///
/// Stops at the first pair that cannot be reconciled.
pub fn reconcile(
    skin: &mut ProtoSegmentStack,
    core: &mut ProtoSegmentStack,
    max_deviation: f32,
    epsilon: f32,
    diag: &mut Diagnostics,
) -> Result<(), BudgetFailure> {
    let skin_flex = skin.flex_indices();
    let core_flex = core.flex_indices();
    if skin_flex.len() != core_flex.len() {
        diag.error(
            categories::STRUCTURE,
            format!(
                "skin has {} body regions but core has {}",
                skin_flex.len(),
                core_flex.len()
            ),
        );
    }

    for (region, (&si, &ci)) in skin_flex.iter().zip(&core_flex).enumerate() {
        let (Some(s), Some(c)) = (skin.flex(si), core.flex(ci)) else {
            continue;
        };
        let shift = required_shift(s.aspect, s.min_aspect(), c.aspect, c.min_aspect(), epsilon);
        if shift == 0.0 {
            continue;
        }
        if shift.abs() > max_deviation {
            return Err(BudgetFailure::ShiftTooLarge { region, shift });
        }
        let skin_intact = apply_shift(skin, si, shift, epsilon);
        let core_intact = apply_shift(core, ci, shift, epsilon);
        if !(skin_intact && core_intact) {
            return Err(BudgetFailure::NeighborInvalid { region, shift });
        }
        diag.info(
            categories::BUDGET,
            format!("body region {} shifted by {:.4}", region, shift),
        );
    }
    Ok(())
}

/// Budget and reconcile both layers, excising intertanks on failure.
pub fn negotiate(
    skin: &mut ProtoSegmentStack,
    core: &mut ProtoSegmentStack,
    max_deviation: f32,
    epsilon: f32,
    diag: &mut Diagnostics,
) -> BudgetOutcome {
    assign_budgets(skin);
    assign_budgets(core);

    let failure = match reconcile(skin, core, max_deviation, epsilon, diag) {
        Ok(()) => {
            return BudgetOutcome {
                excised: false,
                satisfied: true,
            }
        }
        Err(failure) => failure,
    };

    diag.warn(
        categories::BUDGET,
        format!(
            "{:?} (tolerance {:.4}); excising intertanks",
            failure, max_deviation
        ),
    );
    skin.excise_intertanks();
    core.excise_intertanks();

    match reconcile(skin, core, max_deviation, epsilon, diag) {
        Ok(()) => BudgetOutcome {
            excised: true,
            satisfied: true,
        },
        Err(failure) => {
            diag.error(
                categories::BUDGET,
                format!(
                    "body budget still infeasible after excision (shift {:.4}, tolerance {:.4})",
                    failure.shift(),
                    max_deviation
                ),
            );
            for stack in [&mut *skin, &mut *core] {
                for index in stack.flex_indices() {
                    if let Some(region) = stack.flex_mut(index) {
                        region.aspect = region.aspect.max(0.0);
                    }
                }
            }
            BudgetOutcome {
                excised: true,
                satisfied: false,
            }
        }
    }
}
