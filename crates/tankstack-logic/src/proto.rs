//! Proto-stacks: the working representation negotiated between layers.
//!
//! A [`ProtoSegmentStack`] is one layer's ordered, bottom-to-top list of
//! [`ProtoSegment`]s. Fixed pieces (terminators, internal caps, intertanks)
//! hold a single asset; flexible body regions hold an aspect-ratio budget
//! that is later packed from discrete pieces.
//!
//! ```text
//!   top terminator          Terminator
//!   top internal cap        Fixed        (optional)
//!   body region N           Flex
//!   intertank               Fixed
//!   ...
//!   body region 1           Flex
//!   bottom internal cap     Fixed        (optional)
//!   bottom terminator       Terminator
//! ```
//!
//! Flex regions link to their neighbouring Flex regions by index into the
//! owning stack.

use std::sync::Arc;

use crate::diagnostics::{categories, Diagnostics};
use crate::packer::{self, BodySolution};
use crate::segment::{Alignment, Asset, CapPosition, SegmentDef, SegmentRole};
use crate::selection::{ResolvedSelection, ResolvedTerminator};

/// A single-asset segment.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSegment {
    pub role: SegmentRole,
    pub segment: Arc<SegmentDef>,
    /// Index into `segment.assets`, chosen during alignment.
    pub asset: Option<usize>,
    /// Uniform vertical stretch forced by alignment.
    pub force_stretch: f32,
}

impl FixedSegment {
    pub fn new(role: SegmentRole, segment: Arc<SegmentDef>) -> Self {
        Self {
            role,
            segment,
            asset: None,
            force_stretch: 1.0,
        }
    }

    /// Chosen asset, or the first one applicable at `diameter`.
    pub fn resolved_asset(&self, diameter: f32) -> Option<usize> {
        self.asset.or_else(|| self.segment.first_asset_for(diameter))
    }

    pub fn native_aspect(&self, diameter: f32) -> f32 {
        self.resolved_asset(diameter)
            .and_then(|i| self.segment.asset(i))
            .map(|a| a.aspect)
            .unwrap_or(0.0)
    }

    /// Aspect ratio after forced stretching.
    pub fn aspect(&self, diameter: f32) -> f32 {
        self.native_aspect(diameter) * self.force_stretch
    }
}

/// A cap bounding the top or bottom of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Terminator {
    pub fixed: FixedSegment,
    pub position: CapPosition,
    pub alignment: Alignment,
    /// Extra aspect ratio inserted on the outward side.
    pub padding: f32,
}

impl Terminator {
    /// Stretched aspect plus padding.
    pub fn aspect(&self, diameter: f32) -> f32 {
        self.fixed.aspect(diameter) + self.padding
    }
}

/// A flexible body region packed from discrete pieces.
#[derive(Debug, Clone, PartialEq)]
pub struct FlexRegion {
    pub segment: Arc<SegmentDef>,
    /// Applicable asset indices, ascending aspect ratio.
    pub assets: Vec<usize>,
    /// Normalized volume fraction of this compartment.
    pub weight: f32,
    /// Aspect-ratio budget.
    pub aspect: f32,
    /// Index of the Flex region below, within the owning stack.
    pub prev: Option<usize>,
    /// Index of the Flex region above, within the owning stack.
    pub next: Option<usize>,
    pub solution: Option<BodySolution>,
}

impl FlexRegion {
    pub fn min_aspect(&self) -> f32 {
        self.segment.min_tank_aspect
    }

    /// Zero or at least the segment's minimum tank aspect.
    pub fn is_valid(&self, epsilon: f32) -> bool {
        self.aspect.abs() <= epsilon || self.aspect >= self.min_aspect() - epsilon
    }

    pub fn neighbors(&self) -> impl Iterator<Item = usize> {
        self.prev.into_iter().chain(self.next)
    }

    fn asset_aspects(&self) -> Vec<f32> {
        self.assets
            .iter()
            .filter_map(|&i| self.segment.asset(i))
            .map(|a| a.aspect)
            .collect()
    }

    /// Pack the current budget into a [`BodySolution`] over segment asset indices.
    ///
    /// A positive budget that greedy selection leaves empty is filled with
    /// the smallest piece stretched to fit.
    pub fn pack(&mut self, max_pieces: usize, epsilon: f32, diag: &mut Diagnostics) {
        let aspects = self.asset_aspects();
        let mut solution = packer::pack(&aspects, self.aspect, max_pieces);
        if solution.is_empty() && self.aspect > epsilon && !aspects.is_empty() {
            diag.warn(
                categories::PACKING,
                format!(
                    "no piece of '{}' fits budget {:.4}; stretching the smallest",
                    self.segment.name, self.aspect
                ),
            );
            solution = BodySolution {
                pieces: vec![0],
                height: aspects[0],
                stretch: packer::uniform_stretch(aspects[0], self.aspect),
            };
        }
        self.solution = Some(solution.remap(&self.assets));
    }

    /// Assets of the packed solution, bottom to top.
    pub fn packed_assets(&self) -> impl Iterator<Item = &Asset> {
        self.solution
            .iter()
            .flat_map(|s| s.pieces.iter())
            .filter_map(|&i| self.segment.asset(i))
    }
}

/// One entry of a proto-stack.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoSegment {
    Fixed(FixedSegment),
    Terminator(Terminator),
    Flex(FlexRegion),
}

impl ProtoSegment {
    pub fn role(&self) -> SegmentRole {
        match self {
            Self::Fixed(f) => f.role,
            Self::Terminator(t) => t.fixed.role,
            Self::Flex(_) => SegmentRole::TankBody,
        }
    }

    pub fn segment(&self) -> &Arc<SegmentDef> {
        match self {
            Self::Fixed(f) => &f.segment,
            Self::Terminator(t) => &t.fixed.segment,
            Self::Flex(r) => &r.segment,
        }
    }

    /// Fixed part of a Fixed or Terminator entry.
    pub fn fixed(&self) -> Option<&FixedSegment> {
        match self {
            Self::Fixed(f) => Some(f),
            Self::Terminator(t) => Some(&t.fixed),
            Self::Flex(_) => None,
        }
    }

    pub fn fixed_mut(&mut self) -> Option<&mut FixedSegment> {
        match self {
            Self::Fixed(f) => Some(f),
            Self::Terminator(t) => Some(&mut t.fixed),
            Self::Flex(_) => None,
        }
    }

    pub fn as_flex(&self) -> Option<&FlexRegion> {
        match self {
            Self::Flex(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_flex_mut(&mut self) -> Option<&mut FlexRegion> {
        match self {
            Self::Flex(r) => Some(r),
            _ => None,
        }
    }

    /// Current aspect ratio: fixed height incl. padding, or the Flex budget.
    pub fn aspect(&self, diameter: f32) -> f32 {
        match self {
            Self::Fixed(f) => f.aspect(diameter),
            Self::Terminator(t) => t.aspect(diameter),
            Self::Flex(r) => r.aspect,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed(_) => "fixed",
            Self::Terminator(_) => "terminator",
            Self::Flex(_) => "flex",
        }
    }
}

/// One layer's full proto-stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoSegmentStack {
    pub diameter: f32,
    pub height: f32,
    pub segments: Vec<ProtoSegment>,
}

impl ProtoSegmentStack {
    /// Assemble the bottom-to-top proto-stack for one layer.
    ///
    /// `volume_fractions` are normalized to sum to one. Without an intertank
    /// segment the compartments cannot be separated and a single body
    /// region is emitted.
    pub fn build(
        diameter: f32,
        height: f32,
        selection: &ResolvedSelection,
        volume_fractions: &[f32],
        diag: &mut Diagnostics,
    ) -> Self {
        let mut fractions = normalize_fractions(volume_fractions, diag);
        if fractions.len() > 1 && selection.intertank.is_none() {
            diag.warn(
                categories::STRUCTURE,
                format!(
                    "{} compartments requested without an intertank; merging into one",
                    fractions.len()
                ),
            );
            fractions = vec![1.0];
        }

        let mut segments = Vec::with_capacity(fractions.len() * 2 + 4);
        segments.push(terminator(&selection.bottom, CapPosition::Bottom));
        if let Some(cap) = &selection.bottom_internal_cap {
            segments.push(ProtoSegment::Fixed(FixedSegment::new(
                SegmentRole::CapInternal,
                cap.clone(),
            )));
        }

        let assets = selection.body.assets_applicable_at(diameter);
        let mut prev_flex: Option<usize> = None;
        for (i, &weight) in fractions.iter().enumerate() {
            if i > 0 {
                if let Some(intertank) = &selection.intertank {
                    segments.push(ProtoSegment::Fixed(FixedSegment::new(
                        SegmentRole::Intertank,
                        intertank.clone(),
                    )));
                }
            }
            let index = segments.len();
            if let Some(p) = prev_flex {
                if let Some(prev) = segments[p].as_flex_mut() {
                    prev.next = Some(index);
                }
            }
            segments.push(ProtoSegment::Flex(FlexRegion {
                segment: selection.body.clone(),
                assets: assets.clone(),
                weight,
                aspect: 0.0,
                prev: prev_flex,
                next: None,
                solution: None,
            }));
            prev_flex = Some(index);
        }

        if let Some(cap) = &selection.top_internal_cap {
            segments.push(ProtoSegment::Fixed(FixedSegment::new(
                SegmentRole::CapInternal,
                cap.clone(),
            )));
        }
        segments.push(terminator(&selection.top, CapPosition::Top));

        Self {
            diameter,
            height,
            segments,
        }
    }

    /// Requested total aspect ratio.
    pub fn target_aspect(&self) -> f32 {
        if self.diameter > 0.0 {
            self.height / self.diameter
        } else {
            0.0
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Indices of Flex regions, bottom to top.
    pub fn flex_indices(&self) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, ProtoSegment::Flex(_)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn flex(&self, index: usize) -> Option<&FlexRegion> {
        self.segments.get(index).and_then(ProtoSegment::as_flex)
    }

    pub fn flex_mut(&mut self, index: usize) -> Option<&mut FlexRegion> {
        self.segments.get_mut(index).and_then(ProtoSegment::as_flex_mut)
    }

    /// Aspect ratio of accessory-role entries.
    pub fn accessory_aspect(&self) -> f32 {
        self.segments
            .iter()
            .filter(|s| s.role() == SegmentRole::Accessory)
            .map(|s| s.aspect(self.diameter))
            .sum()
    }

    /// Aspect ratio of every non-Flex entry, accessories included.
    pub fn fixed_aspect(&self) -> f32 {
        self.segments
            .iter()
            .filter(|s| !matches!(s, ProtoSegment::Flex(_)))
            .map(|s| s.aspect(self.diameter))
            .sum()
    }

    /// Aspect ratio of fueled content: target minus accessories.
    pub fn fueled_aspect(&self) -> f32 {
        self.target_aspect() - self.accessory_aspect()
    }

    /// Total current aspect ratio (fixed pieces plus Flex budgets).
    pub fn total_aspect(&self) -> f32 {
        self.segments.iter().map(|s| s.aspect(self.diameter)).sum()
    }

    /// Fueled fixed aspect bordering the Flex region at `index`.
    ///
    /// Walks outward in both directions until the next Flex region or the
    /// end of the stack. Intertanks count at half weight since each borders
    /// two regions; accessories do not count.
    pub fn fixed_neighbor_aspect(&self, index: usize) -> f32 {
        let contribution = |s: &ProtoSegment| match s {
            ProtoSegment::Flex(_) => 0.0,
            _ => match s.role() {
                SegmentRole::Accessory => 0.0,
                SegmentRole::Intertank => 0.5 * s.aspect(self.diameter),
                _ => s.aspect(self.diameter),
            },
        };
        let below: f32 = self.segments[..index]
            .iter()
            .rev()
            .take_while(|s| !matches!(s, ProtoSegment::Flex(_)))
            .map(contribution)
            .sum();
        let above: f32 = self.segments[index + 1..]
            .iter()
            .take_while(|s| !matches!(s, ProtoSegment::Flex(_)))
            .map(contribution)
            .sum();
        below + above
    }

    /// Remove intertanks and merge every Flex region into one.
    ///
    /// The merged region takes the whole remaining height:
    /// `target − fixed − accessories`.
    pub fn excise_intertanks(&mut self) {
        let mut merged: Option<FlexRegion> = None;
        let mut kept = Vec::with_capacity(self.segments.len());
        let mut merged_at = 0;

        for segment in self.segments.drain(..) {
            match segment {
                ProtoSegment::Fixed(ref f) if f.role == SegmentRole::Intertank => {}
                ProtoSegment::Flex(region) => {
                    if merged.is_none() {
                        merged_at = kept.len();
                        merged = Some(region);
                    }
                }
                other => kept.push(other),
            }
        }

        if let Some(mut region) = merged {
            region.weight = 1.0;
            region.prev = None;
            region.next = None;
            region.solution = None;
            kept.insert(merged_at, ProtoSegment::Flex(region));
        }
        self.segments = kept;

        let remaining = self.target_aspect() - self.fixed_aspect();
        for index in self.flex_indices() {
            if let Some(region) = self.flex_mut(index) {
                region.aspect = remaining;
            }
        }
    }

    /// Pack every Flex region's current budget.
    pub fn pack_bodies(&mut self, max_pieces: usize, epsilon: f32, diag: &mut Diagnostics) {
        for segment in &mut self.segments {
            if let ProtoSegment::Flex(region) = segment {
                region.pack(max_pieces, epsilon, diag);
            }
        }
    }
}

fn terminator(resolved: &ResolvedTerminator, position: CapPosition) -> ProtoSegment {
    ProtoSegment::Terminator(Terminator {
        fixed: FixedSegment::new(resolved.role, resolved.segment.clone()),
        position,
        alignment: resolved.alignment,
        padding: 0.0,
    })
}

/// Normalize fractions to sum to one; invalid input collapses to `[1.0]`.
pub fn normalize_fractions(fractions: &[f32], diag: &mut Diagnostics) -> Vec<f32> {
    let cleaned: Vec<f32> = fractions
        .iter()
        .map(|&f| if f.is_finite() && f > 0.0 { f } else { 0.0 })
        .collect();
    let sum: f32 = cleaned.iter().sum();
    if cleaned.is_empty() || !(sum > 0.0) {
        if !fractions.is_empty() {
            diag.warn(
                categories::STRUCTURE,
                "volume fractions sum to zero; using a single compartment",
            );
        }
        return vec![1.0];
    }
    if cleaned.iter().zip(fractions).any(|(c, f)| c != f) {
        diag.warn(
            categories::STRUCTURE,
            "negative or non-finite volume fractions treated as zero",
        );
    }
    cleaned.into_iter().map(|f| f / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::RoleSet;

    fn def(name: &str, roles: RoleSet, aspect: f32) -> Arc<SegmentDef> {
        let mut diag = Diagnostics::new();
        Arc::new(
            SegmentDef::new(name, roles)
                .with_asset(Asset::new(format!("{name}-a"), aspect))
                .validate(&mut diag),
        )
    }

    fn selection(intertank: bool, internal_caps: bool) -> ResolvedSelection {
        let cap = def("cap", RoleSet::CAP_TERMINAL, 0.5);
        let internal = def("bulkhead", RoleSet::CAP_INTERNAL, 0.25);
        ResolvedSelection {
            body: def("tank", RoleSet::TANK_BODY, 1.0),
            intertank: intertank.then(|| def("ring", RoleSet::INTERTANK, 0.4)),
            top: ResolvedTerminator {
                segment: cap.clone(),
                role: SegmentRole::CapTerminal,
                alignment: Alignment::PinBothEnds,
            },
            bottom: ResolvedTerminator {
                segment: cap,
                role: SegmentRole::CapTerminal,
                alignment: Alignment::PinBothEnds,
            },
            top_internal_cap: internal_caps.then(|| internal.clone()),
            bottom_internal_cap: internal_caps.then(|| internal.clone()),
        }
    }

    #[test]
    fn build_orders_segments() {
        let mut diag = Diagnostics::new();
        let stack =
            ProtoSegmentStack::build(2.0, 10.0, &selection(true, true), &[1.0, 1.0], &mut diag);
        let kinds: Vec<&str> = stack.segments.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec!["terminator", "fixed", "flex", "fixed", "flex", "fixed", "terminator"]
        );
        assert_eq!(stack.segments[3].role(), SegmentRole::Intertank);
        assert_eq!(stack.segments[1].role(), SegmentRole::CapInternal);
        assert!(diag.is_empty());
    }

    #[test]
    fn build_links_flex_neighbors() {
        let mut diag = Diagnostics::new();
        let stack = ProtoSegmentStack::build(
            2.0,
            10.0,
            &selection(true, false),
            &[1.0, 2.0, 1.0],
            &mut diag,
        );
        let flex = stack.flex_indices();
        assert_eq!(flex, vec![1, 3, 5]);
        let middle = stack.flex(3).unwrap();
        assert_eq!(middle.prev, Some(1));
        assert_eq!(middle.next, Some(5));
        assert_eq!(stack.flex(1).unwrap().prev, None);
        assert_eq!(stack.flex(5).unwrap().next, None);
        assert!((middle.weight - 0.5).abs() < 1e-6);
    }

    #[test]
    fn build_without_intertank_merges_compartments() {
        let mut diag = Diagnostics::new();
        let stack =
            ProtoSegmentStack::build(2.0, 10.0, &selection(false, false), &[1.0, 1.0], &mut diag);
        assert_eq!(stack.flex_indices().len(), 1);
        assert!(diag.has(categories::STRUCTURE, crate::diagnostics::Severity::Warning));
    }

    #[test]
    fn normalize_handles_bad_input() {
        let mut diag = Diagnostics::new();
        assert_eq!(normalize_fractions(&[], &mut diag), vec![1.0]);
        assert!(diag.is_empty());
        assert_eq!(normalize_fractions(&[0.0, 0.0], &mut diag), vec![1.0]);
        let n = normalize_fractions(&[3.0, -1.0, 1.0], &mut diag);
        assert_eq!(n, vec![0.75, 0.0, 0.25]);
    }

    #[test]
    fn neighbor_aspect_counts_intertank_half() {
        let mut diag = Diagnostics::new();
        let stack =
            ProtoSegmentStack::build(2.0, 10.0, &selection(true, true), &[1.0, 1.0], &mut diag);
        // bottom region: terminator 0.5 + internal cap 0.25 + half intertank 0.2
        assert!((stack.fixed_neighbor_aspect(2) - 0.95).abs() < 1e-6);
        assert!((stack.fixed_neighbor_aspect(4) - 0.95).abs() < 1e-6);
    }

    #[test]
    fn excision_merges_regions() {
        let mut diag = Diagnostics::new();
        let mut stack =
            ProtoSegmentStack::build(2.0, 10.0, &selection(true, false), &[1.0, 1.0], &mut diag);
        assert_eq!(stack.flex_indices().len(), 2);
        stack.excise_intertanks();

        assert_eq!(stack.flex_indices().len(), 1);
        assert!(stack
            .segments
            .iter()
            .all(|s| s.role() != SegmentRole::Intertank));
        let region = stack.flex(1).unwrap();
        // 10 / 2 = 5 total, caps 0.5 + 0.5
        assert!((region.aspect - 4.0).abs() < 1e-6);
        assert_eq!(region.prev, None);
        assert_eq!(region.next, None);
        assert_eq!(region.weight, 1.0);
    }

    #[test]
    fn flex_validity() {
        let mut diag = Diagnostics::new();
        let segment = Arc::new(
            SegmentDef::new("t", RoleSet::TANK_BODY)
                .with_min_tank_aspect(0.5)
                .with_asset(Asset::new("a", 1.0))
                .validate(&mut diag),
        );
        let mut region = FlexRegion {
            segment,
            assets: vec![0],
            weight: 1.0,
            aspect: 0.0,
            prev: None,
            next: None,
            solution: None,
        };
        assert!(region.is_valid(1e-4));
        region.aspect = 0.3;
        assert!(!region.is_valid(1e-4));
        region.aspect = 0.5;
        assert!(region.is_valid(1e-4));
    }

    #[test]
    fn pack_fills_small_budget_with_stretched_piece() {
        let mut diag = Diagnostics::new();
        let mut stack =
            ProtoSegmentStack::build(1.0, 2.0, &selection(false, false), &[1.0], &mut diag);
        let index = stack.flex_indices()[0];
        stack.flex_mut(index).unwrap().aspect = 0.2;
        stack.pack_bodies(256, 1e-4, &mut diag);
        let solution = stack.flex(index).unwrap().solution.clone().unwrap();
        assert_eq!(solution.pieces, vec![0]);
        assert!((solution.stretched_height() - 0.2).abs() < 1e-6);
        assert!(diag.has(categories::PACKING, crate::diagnostics::Severity::Warning));
    }
}
