//! Stack elaboration: negotiated proto-stack → absolute placements.
//!
//! Walks the proto-stack bottom to top with a running baseline in aspect
//! units. Terminators contribute their stretched height plus padding (below
//! a bottom cap, above a top cap); other fixed pieces their stretched
//! height; Flex regions every packed piece at the region's uniform stretch.
//! Each piece is then scaled to the stack diameter and positioned from its
//! asset's native baseline.

use std::sync::Arc;

use crate::proto::{FixedSegment, ProtoSegment, ProtoSegmentStack};
use crate::segment::{Asset, CapPosition, SegmentDef, SegmentRole};
use crate::stack::{SegmentPlacement, SegmentStack};

/// Whether a piece is mirrored vertically.
///
/// Caps are flipped when used at the opposite end from the one their assets
/// are authored for; an inverted asset flips once more.
pub fn needs_flip(
    role: SegmentRole,
    segment: &SegmentDef,
    position: Option<CapPosition>,
    asset: &Asset,
) -> bool {
    let reversed = match position {
        Some(p) if role.is_cap() => segment.positions.authored() != p,
        _ => false,
    };
    reversed != asset.inverted
}

/// Builder for one layer's placements.
struct Walker {
    diameter: f32,
    /// Running baseline in aspect units.
    base: f32,
    placements: Vec<SegmentPlacement>,
}

struct Piece<'a> {
    role: SegmentRole,
    segment: &'a Arc<SegmentDef>,
    asset: usize,
    stretch: f32,
    cap: Option<CapPosition>,
    position: Option<CapPosition>,
    compartment: Option<usize>,
    padding: f32,
}

impl Walker {
    fn place(&mut self, piece: Piece<'_>) {
        let Some(asset) = piece.segment.asset(piece.asset) else {
            return;
        };
        let d = self.diameter;
        let aspect = asset.aspect * piece.stretch;
        let s = d / asset.native_diameter;
        let flip = needs_flip(piece.role, piece.segment, piece.position, asset);
        let sy = s * piece.stretch;

        let base = self.base * d;
        let origin = if flip {
            asset.native_height() - asset.baseline
        } else {
            asset.baseline
        };

        self.placements.push(SegmentPlacement {
            role: piece.role,
            segment: piece.segment.clone(),
            asset: piece.asset,
            cap: piece.cap,
            compartment: piece.compartment,
            base,
            height: aspect * d,
            padding: piece.padding * d,
            scale: [s, if flip { -sy } else { sy }, s],
            offset: [0.0, base + origin * sy, 0.0],
        });
        self.base += aspect;
    }

    fn place_fixed(
        &mut self,
        fixed: &FixedSegment,
        cap: Option<CapPosition>,
        position: Option<CapPosition>,
        padding: f32,
    ) {
        if let Some(asset) = fixed.resolved_asset(self.diameter) {
            self.place(Piece {
                role: fixed.role,
                segment: &fixed.segment,
                asset,
                stretch: fixed.force_stretch,
                cap,
                position,
                compartment: None,
                padding,
            });
        }
    }
}

/// Elaborate one layer. Returns the stack and the achieved total aspect ratio.
pub fn elaborate(proto: &ProtoSegmentStack) -> (SegmentStack, f32) {
    let mut walker = Walker {
        diameter: proto.diameter,
        base: 0.0,
        placements: Vec::with_capacity(proto.len() * 2),
    };
    let mut compartment = 0;
    let mut seen_body = false;

    for segment in &proto.segments {
        match segment {
            ProtoSegment::Terminator(t) => match t.position {
                CapPosition::Bottom => {
                    walker.base += t.padding;
                    walker.place_fixed(&t.fixed, Some(t.position), Some(t.position), t.padding);
                }
                CapPosition::Top => {
                    walker.place_fixed(&t.fixed, Some(t.position), Some(t.position), t.padding);
                    walker.base += t.padding;
                }
            },
            ProtoSegment::Fixed(f) => {
                let position = match (f.role, seen_body) {
                    (SegmentRole::CapInternal, false) => Some(CapPosition::Bottom),
                    (SegmentRole::CapInternal, true) => Some(CapPosition::Top),
                    _ => None,
                };
                walker.place_fixed(f, None, position, 0.0);
            }
            ProtoSegment::Flex(region) => {
                seen_body = true;
                if let Some(solution) = &region.solution {
                    for &asset in &solution.pieces {
                        walker.place(Piece {
                            role: SegmentRole::TankBody,
                            segment: &region.segment,
                            asset,
                            stretch: solution.stretch,
                            cap: None,
                            position: None,
                            compartment: Some(compartment),
                            padding: 0.0,
                        });
                    }
                }
                compartment += 1;
            }
        }
    }

    let achieved = walker.base;
    let height = achieved * proto.diameter;
    let half = height * 0.5;
    for placement in &mut walker.placements {
        placement.offset[1] -= half;
    }

    (
        SegmentStack {
            diameter: proto.diameter,
            height,
            placements: walker.placements,
        },
        achieved,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::packer::BodySolution;
    use crate::proto::{FlexRegion, Terminator};
    use crate::segment::{Alignment, PositionPolicy, RoleSet};

    fn segment(name: &str, roles: RoleSet, asset: Asset) -> Arc<SegmentDef> {
        let mut diag = Diagnostics::new();
        Arc::new(
            SegmentDef::new(name, roles)
                .with_positions(PositionPolicy::Top)
                .with_asset(asset)
                .validate(&mut diag),
        )
    }

    fn term(seg: &Arc<SegmentDef>, position: CapPosition, padding: f32) -> ProtoSegment {
        ProtoSegment::Terminator(Terminator {
            fixed: FixedSegment::new(SegmentRole::CapTerminal, seg.clone()),
            position,
            alignment: Alignment::PinInteriorEnd,
            padding,
        })
    }

    fn proto() -> ProtoSegmentStack {
        let cap = segment(
            "cap",
            RoleSet::CAP_TERMINAL,
            Asset::new("cap", 0.5).with_baseline(0.1),
        );
        let body = segment("tank", RoleSet::TANK_BODY, Asset::new("tank", 1.0));
        ProtoSegmentStack {
            diameter: 2.0,
            height: 7.0,
            segments: vec![
                term(&cap, CapPosition::Bottom, 0.25),
                ProtoSegment::Flex(FlexRegion {
                    segment: body,
                    assets: vec![0],
                    weight: 1.0,
                    aspect: 2.5,
                    prev: None,
                    next: None,
                    solution: Some(BodySolution {
                        pieces: vec![0, 0],
                        height: 2.0,
                        stretch: 1.25,
                    }),
                }),
                term(&cap, CapPosition::Top, 0.0),
            ],
        }
    }

    #[test]
    fn walks_bottom_to_top() {
        let (stack, achieved) = elaborate(&proto());
        // 0.25 padding + 0.5 + 2 × 1.25 + 0.5
        assert!((achieved - 3.75).abs() < 1e-6);
        assert!((stack.height() - 7.5).abs() < 1e-5);
        assert_eq!(stack.placements.len(), 4);

        let bases: Vec<f32> = stack.placements.iter().map(|p| p.base).collect();
        assert_eq!(bases, vec![0.5, 1.5, 4.0, 6.5]);
        assert_eq!(stack.placements[0].padding, 0.5);
        assert_eq!(stack.placements[1].compartment, Some(0));
    }

    #[test]
    fn bottom_cap_is_flipped() {
        let (stack, _) = elaborate(&proto());
        let bottom = &stack.placements[0];
        let top = &stack.placements[3];
        assert!(bottom.is_flipped());
        assert!(!top.is_flipped());
        // flipped origin sits (native height − baseline) above the base
        let half = stack.half_height();
        assert!((bottom.offset[1] - (0.5 + 0.4 * 2.0 - half)).abs() < 1e-5);
        assert!((top.offset[1] - (6.5 + 0.1 * 2.0 - half)).abs() < 1e-5);
    }

    #[test]
    fn body_pieces_carry_stretch() {
        let (stack, _) = elaborate(&proto());
        let body = &stack.placements[1];
        assert_eq!(body.scale, [2.0, 2.5, 2.0]);
        assert!((body.distortion() - 0.25).abs() < 1e-6);
        assert!((stack.worst_distortion() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn inverted_asset_flips_once_more() {
        let mut diag = Diagnostics::new();
        let seg = SegmentDef::new("mount", RoleSet::ACCESSORY)
            .with_positions(PositionPolicy::Top)
            .with_asset(Asset::new("m", 1.0).inverted())
            .validate(&mut diag);
        let asset = seg.assets[0].clone();
        assert!(needs_flip(SegmentRole::Accessory, &seg, Some(CapPosition::Top), &asset));
        assert!(!needs_flip(SegmentRole::Accessory, &seg, Some(CapPosition::Bottom), &asset));
        assert!(needs_flip(SegmentRole::Intertank, &seg, None, &asset));
    }

    #[test]
    fn unpacked_region_contributes_nothing() {
        let mut p = proto();
        if let ProtoSegment::Flex(region) = &mut p.segments[1] {
            region.solution = None;
        }
        let (stack, achieved) = elaborate(&p);
        assert_eq!(stack.placements.len(), 2);
        assert!((achieved - 1.25).abs() < 1e-6);
    }
}
