//! The full solve: selection → proto-stacks → alignment → budgets →
//! packing → elaboration → stack pair.
//!
//! A solve is synchronous, deterministic and free of shared mutable state:
//! the same request against the same catalog always yields bit-identical
//! placements. Only unreadable configuration (unknown segments, role or
//! position violations) fails; every other problem is recorded in the
//! report's diagnostics and a best-effort stack pair is still returned.
//!
//! ```
//! use tankstack_logic::catalog::SegmentCatalog;
//! use tankstack_logic::diagnostics::Diagnostics;
//! use tankstack_logic::segment::{Asset, RoleSet, SegmentDef};
//! use tankstack_logic::selection::SelectedSegments;
//! use tankstack_logic::solver::{solve, SolverConfig, StackRequest};
//!
//! let mut diag = Diagnostics::new();
//! let mut catalog = SegmentCatalog::new();
//! catalog.insert(SegmentDef::new("tank", RoleSet::TANK_BODY)
//!     .with_asset(Asset::new("tank-1", 1.0)), &mut diag).unwrap();
//! catalog.insert(SegmentDef::new("dome", RoleSet::CAP_TERMINAL)
//!     .with_asset(Asset::new("dome-1", 0.5)), &mut diag).unwrap();
//!
//! let layer = SelectedSegments::new("tank", "dome", "dome");
//! let request = StackRequest::new(2.0, 8.0, layer.clone(), layer);
//! let report = solve(&catalog, &request, &SolverConfig::default()).unwrap();
//! assert!((report.stacks.height() - 8.0).abs() < 1e-3);
//! ```

use serde::{Deserialize, Serialize};

use crate::align;
use crate::budget::{self, BudgetOutcome};
use crate::catalog::{CatalogError, SegmentCatalog};
use crate::diagnostics::{categories, Diagnostics};
use crate::elaborate::elaborate;
use crate::proto::ProtoSegmentStack;
use crate::selection::SelectedSegments;
use crate::stack::{SegmentStacks, StackTolerance};

/// Solver tolerances and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Largest fraction of tank volume a single budget shift may move.
    pub max_volume_deviation: f32,
    /// Largest skin/core height difference, absolute units.
    pub height_tolerance: f32,
    /// Largest skin/core diameter difference, relative.
    pub diameter_tolerance: f32,
    /// Numeric slack on aspect-ratio comparisons.
    pub aspect_epsilon: f32,
    /// Upper bound on pieces packed into one body region.
    pub max_body_pieces: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_volume_deviation: 0.05,
            height_tolerance: 1e-3,
            diameter_tolerance: 1e-4,
            aspect_epsilon: 1e-4,
            max_body_pieces: 256,
        }
    }
}

impl SolverConfig {
    pub fn tolerance(&self) -> StackTolerance {
        StackTolerance {
            height: self.height_tolerance,
            diameter: self.diameter_tolerance,
        }
    }
}

/// Inputs of one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRequest {
    pub diameter: f32,
    pub height: f32,
    pub skin: SelectedSegments,
    pub core: SelectedSegments,
    /// Relative volumes of the fueled compartments, bottom to top.
    pub volume_fractions: Vec<f32>,
}

impl StackRequest {
    /// Single-compartment request.
    pub fn new(diameter: f32, height: f32, skin: SelectedSegments, core: SelectedSegments) -> Self {
        Self {
            diameter,
            height,
            skin,
            core,
            volume_fractions: vec![1.0],
        }
    }

    pub fn with_fractions(mut self, fractions: Vec<f32>) -> Self {
        self.volume_fractions = fractions;
        self
    }
}

/// Result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub stacks: SegmentStacks,
    /// Height actually achieved; may differ from the request.
    pub achieved_height: f32,
    pub budget: BudgetOutcome,
    pub diagnostics: Diagnostics,
}

impl SolveReport {
    /// Whether the requested height was met within tolerance.
    pub fn height_met(&self, requested: f32, tolerance: f32) -> bool {
        (self.achieved_height - requested).abs() <= tolerance
    }
}

/// Run the full pipeline for both layers.
pub fn solve(
    catalog: &SegmentCatalog,
    request: &StackRequest,
    config: &SolverConfig,
) -> Result<SolveReport, CatalogError> {
    let mut diag = Diagnostics::new();
    let skin_sel = request.skin.resolve(catalog, &mut diag)?;
    let core_sel = request.core.resolve(catalog, &mut diag)?;

    // Both layers must agree on the compartment count to stay index-aligned.
    let mut fractions = request.volume_fractions.clone();
    if fractions.len() > 1 && (skin_sel.intertank.is_none() || core_sel.intertank.is_none()) {
        diag.warn(
            categories::STRUCTURE,
            "a layer has no intertank; using a single compartment for both layers",
        );
        fractions = vec![1.0];
    }

    let mut skin = ProtoSegmentStack::build(
        request.diameter,
        request.height,
        &skin_sel,
        &fractions,
        &mut diag,
    );
    let mut core = ProtoSegmentStack::build(
        request.diameter,
        request.height,
        &core_sel,
        &fractions,
        &mut diag,
    );

    align::negotiate(&mut skin, &mut core, config.aspect_epsilon, &mut diag);

    let max_deviation = budget::max_aspect_deviation(&skin, &core, config.max_volume_deviation);
    let outcome = budget::negotiate(
        &mut skin,
        &mut core,
        max_deviation,
        config.aspect_epsilon,
        &mut diag,
    );

    skin.pack_bodies(config.max_body_pieces, config.aspect_epsilon, &mut diag);
    core.pack_bodies(config.max_body_pieces, config.aspect_epsilon, &mut diag);

    let (skin_stack, skin_aspect) = elaborate(&skin);
    let (core_stack, core_aspect) = elaborate(&core);
    check_target(&skin, skin_aspect, "skin", config, &mut diag);
    check_target(&core, core_aspect, "core", config, &mut diag);

    let stacks = SegmentStacks::new(skin_stack, core_stack, config.tolerance(), &mut diag);
    let achieved_height = stacks.height();
    log::info!(
        "solved {:.3}×{:.3} stack: height {:.3}, {} skin / {} core pieces, distortion {:.3}",
        request.diameter,
        request.height,
        achieved_height,
        stacks.skin.placements.len(),
        stacks.core.placements.len(),
        stacks.worst_distortion()
    );

    Ok(SolveReport {
        stacks,
        achieved_height,
        budget: outcome,
        diagnostics: diag,
    })
}

/// Report a layer whose achieved height misses its target.
fn check_target(
    proto: &ProtoSegmentStack,
    achieved_aspect: f32,
    layer: &str,
    config: &SolverConfig,
    diag: &mut Diagnostics,
) {
    let achieved = achieved_aspect * proto.diameter;
    if (achieved - proto.height).abs() > config.height_tolerance {
        diag.warn(
            categories::HEIGHT,
            format!(
                "{} reached height {:.4} instead of {:.4}",
                layer, achieved, proto.height
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::segment::{Alignment, AlignmentSet, Asset, RoleSet, SegmentDef, SegmentRole};

    fn catalog() -> SegmentCatalog {
        let mut diag = Diagnostics::new();
        let mut catalog = SegmentCatalog::new();
        let defs = vec![
            SegmentDef::new("tank", RoleSet::TANK_BODY)
                .with_min_tank_aspect(0.25)
                .with_asset(Asset::new("t-0.5", 0.5))
                .with_asset(Asset::new("t-1", 1.0))
                .with_asset(Asset::new("t-2", 2.0)),
            SegmentDef::new("ring", RoleSet::INTERTANK).with_asset(Asset::new("r", 0.2)),
            SegmentDef::new("dome", RoleSet::CAP_TERMINAL)
                .with_alignments(AlignmentSet::ALL)
                .with_asset(Asset::new("d", 0.4)),
            SegmentDef::new("nose", RoleSet::CAP_TERMINAL)
                .with_alignments(AlignmentSet::ALL)
                .with_asset(Asset::new("n", 1.2)),
        ];
        for def in defs {
            catalog.insert(def, &mut diag).unwrap();
        }
        catalog
    }

    #[test]
    fn single_compartment_hits_height() {
        let layer = SelectedSegments::new("tank", "dome", "dome");
        let request = StackRequest::new(1.0, 5.0, layer.clone(), layer);
        let report = solve(&catalog(), &request, &SolverConfig::default()).unwrap();
        assert!(report.stacks.consistent);
        assert!(report.height_met(5.0, 1e-3));
        assert!(!report.diagnostics.has_errors());
        assert!(!report.budget.excised);
    }

    #[test]
    fn two_compartments_keep_intertank() {
        let layer = SelectedSegments::new("tank", "dome", "dome").with_intertank("ring");
        let request =
            StackRequest::new(1.0, 6.0, layer.clone(), layer).with_fractions(vec![1.0, 1.0]);
        let report = solve(&catalog(), &request, &SolverConfig::default()).unwrap();
        assert_eq!(report.stacks.skin.count_role(SegmentRole::Intertank), 1);
        assert_eq!(report.stacks.skin.compartment_bounds().len(), 2);
        assert!(report.height_met(6.0, 1e-3));
    }

    #[test]
    fn missing_intertank_on_one_layer_merges_both() {
        let skin = SelectedSegments::new("tank", "dome", "dome").with_intertank("ring");
        let core = SelectedSegments::new("tank", "dome", "dome");
        let request = StackRequest::new(1.0, 6.0, skin, core).with_fractions(vec![1.0, 1.0]);
        let report = solve(&catalog(), &request, &SolverConfig::default()).unwrap();
        assert_eq!(report.stacks.skin.count_role(SegmentRole::Intertank), 0);
        assert!(report
            .diagnostics
            .has(categories::STRUCTURE, Severity::Warning));
        assert!(report.stacks.consistent);
    }

    #[test]
    fn interior_pinned_terminators_keep_heights_equal() {
        let skin = SelectedSegments::new("tank", "dome", "dome")
            .with_alignment(Alignment::PinInteriorEnd, Alignment::PinInteriorEnd);
        let core = SelectedSegments::new("tank", "nose", "dome")
            .with_alignment(Alignment::PinInteriorEnd, Alignment::PinInteriorEnd);
        let request = StackRequest::new(1.0, 6.0, skin, core);
        let report = solve(&catalog(), &request, &SolverConfig::default()).unwrap();
        assert!(report.stacks.consistent);
        let skin_top = report.stacks.skin.cap_boundary(crate::segment::CapPosition::Top);
        let core_top = report.stacks.core.cap_boundary(crate::segment::CapPosition::Top);
        assert!((skin_top.unwrap() - core_top.unwrap()).abs() < 1e-4);
    }

    #[test]
    fn unknown_segment_is_error() {
        let layer = SelectedSegments::new("tank", "dome", "missing");
        let request = StackRequest::new(1.0, 5.0, layer.clone(), layer);
        let err = solve(&catalog(), &request, &SolverConfig::default()).unwrap_err();
        assert_eq!(err, CatalogError::UnknownSegment("missing".into()));
    }

    #[test]
    fn too_short_request_reports_height() {
        // caps alone are 0.8 tall
        let layer = SelectedSegments::new("tank", "dome", "dome");
        let request = StackRequest::new(1.0, 0.5, layer.clone(), layer);
        let report = solve(&catalog(), &request, &SolverConfig::default()).unwrap();
        assert!(!report.height_met(0.5, 1e-3));
        assert!(report.diagnostics.has(categories::HEIGHT, Severity::Warning));
        assert!(report.stacks.consistent);
    }

    #[test]
    fn config_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.max_volume_deviation, 0.05);
        assert_eq!(config.max_body_pieces, 256);
        assert_eq!(config.tolerance().height, 1e-3);
    }
}
