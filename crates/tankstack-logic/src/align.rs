//! Alignment of fixed segments between the skin and core layers.
//!
//! Entries are paired by index. For every Fixed/Terminator pair the core
//! picks its first applicable asset and the skin picks the asset closest in
//! aspect ratio to the core's. Interior-pinned terminators are then padded
//! so their interior faces line up; strictly aligned segments are stretched
//! to a shared, bias-weighted height.
//!
//! This stage never fails: anything it cannot align is reported and left
//! for the flex budgets to absorb.

use crate::diagnostics::{categories, Diagnostics};
use crate::proto::{FixedSegment, ProtoSegment, ProtoSegmentStack};
use crate::segment::Alignment;

/// Forced stretches bringing both sides to a bias-weighted shared aspect.
///
/// Returns `(stretch_skin, stretch_core)`; the shared target is
/// `bias × skin + (1 − bias) × core`.
pub fn negotiate_aspect_ratio(skin_aspect: f32, core_aspect: f32, bias: f32) -> (f32, f32) {
    let target = bias * skin_aspect + (1.0 - bias) * core_aspect;
    let stretch = |native: f32| if native > 0.0 { target / native } else { 1.0 };
    (stretch(skin_aspect), stretch(core_aspect))
}

/// Outward padding equalizing two interior-pinned terminators.
///
/// Returns `(skin_padding, core_padding)`; the shorter side gets the
/// difference, the taller none.
pub fn terminator_padding(skin_aspect: f32, core_aspect: f32) -> (f32, f32) {
    let diff = (skin_aspect - core_aspect).abs();
    if skin_aspect < core_aspect {
        (diff, 0.0)
    } else {
        (0.0, diff)
    }
}

/// Choose assets and reconcile heights of paired fixed entries, in place.
///
/// Pairs still differing by more than `epsilon` afterwards are reported
/// under `alignment` and left as they are.
pub fn negotiate(
    skin: &mut ProtoSegmentStack,
    core: &mut ProtoSegmentStack,
    epsilon: f32,
    diag: &mut Diagnostics,
) {
    if skin.len() != core.len() {
        diag.error(
            categories::STRUCTURE,
            format!(
                "skin has {} entries but core has {}; aligning the first {}",
                skin.len(),
                core.len(),
                skin.len().min(core.len())
            ),
        );
    }

    let (skin_d, core_d) = (skin.diameter, core.diameter);
    for (index, (s, c)) in skin
        .segments
        .iter_mut()
        .zip(core.segments.iter_mut())
        .enumerate()
    {
        match (s, c) {
            (ProtoSegment::Flex(_), ProtoSegment::Flex(_)) => {}
            (ProtoSegment::Terminator(st), ProtoSegment::Terminator(ct)) => {
                choose_assets(&mut st.fixed, skin_d, &mut ct.fixed, core_d);
                if st.position != ct.position {
                    diag.error(
                        categories::ALIGNMENT,
                        format!("terminators at entry {} sit at different ends", index),
                    );
                    continue;
                }
                let interior_pinned = st.alignment == Alignment::PinInteriorEnd
                    && ct.alignment == Alignment::PinInteriorEnd;
                if interior_pinned {
                    let (sp, cp) =
                        terminator_padding(st.fixed.aspect(skin_d), ct.fixed.aspect(core_d));
                    st.padding = sp;
                    ct.padding = cp;
                } else {
                    if st.alignment != ct.alignment {
                        diag.warn(
                            categories::ALIGNMENT,
                            format!(
                                "{} terminators use different alignments ({:?} / {:?})",
                                st.position.name(),
                                st.alignment,
                                ct.alignment
                            ),
                        );
                    }
                    apply_strict(&mut st.fixed, skin_d, &mut ct.fixed, core_d);
                }
                report_unmet(
                    index,
                    st.fixed.role.name(),
                    st.aspect(skin_d),
                    ct.aspect(core_d),
                    epsilon,
                    diag,
                );
            }
            (s, c) => match (s.fixed_mut(), c.fixed_mut()) {
                (Some(sf), Some(cf)) => {
                    choose_assets(sf, skin_d, cf, core_d);
                    if sf.role != cf.role {
                        diag.error(
                            categories::ALIGNMENT,
                            format!(
                                "entry {} pairs {} with {}",
                                index,
                                sf.role.name(),
                                cf.role.name()
                            ),
                        );
                        continue;
                    }
                    apply_strict(sf, skin_d, cf, core_d);
                    report_unmet(
                        index,
                        sf.role.name(),
                        sf.aspect(skin_d),
                        cf.aspect(core_d),
                        epsilon,
                        diag,
                    );
                }
                _ => diag.error(
                    categories::ALIGNMENT,
                    format!("entry {} pairs a body region with a fixed segment", index),
                ),
            },
        }
    }
}

/// Warn about a pair whose effective heights still differ.
fn report_unmet(
    index: usize,
    role: &str,
    skin_aspect: f32,
    core_aspect: f32,
    epsilon: f32,
    diag: &mut Diagnostics,
) {
    if (skin_aspect - core_aspect).abs() > epsilon {
        diag.warn(
            categories::ALIGNMENT,
            format!(
                "{} at entry {} stays unaligned: skin {:.4}, core {:.4}",
                role, index, skin_aspect, core_aspect
            ),
        );
    }
}

/// Core takes its first applicable asset; skin takes the closest match.
fn choose_assets(skin: &mut FixedSegment, skin_d: f32, core: &mut FixedSegment, core_d: f32) {
    core.asset = core.segment.first_asset_for(core_d);
    let core_aspect = core.native_aspect(core_d);
    skin.asset = if core.asset.is_some() {
        skin.segment.best_asset_for(skin_d, core_aspect)
    } else {
        skin.segment.first_asset_for(skin_d)
    };
}

/// Stretch both sides to a shared height when either segment demands it.
fn apply_strict(skin: &mut FixedSegment, skin_d: f32, core: &mut FixedSegment, core_d: f32) {
    let bias = if core.segment.strict_alignment {
        core.segment.alignment_bias
    } else if skin.segment.strict_alignment {
        skin.segment.alignment_bias
    } else {
        return;
    };
    let (ss, cs) = negotiate_aspect_ratio(
        skin.native_aspect(skin_d),
        core.native_aspect(core_d),
        bias,
    );
    skin.force_stretch = ss;
    core.force_stretch = cs;
}
