//! Per-layer segment selection.
//!
//! A [`SelectedSegments`] names the segments chosen for one layer. It is
//! resolved against a [`SegmentCatalog`] into a [`ResolvedSelection`] holding
//! shared handles to the definitions; role and position violations are hard
//! errors, unsupported alignment choices fall back to the segment's
//! preferred policy with a warning.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{CatalogError, SegmentCatalog};
use crate::diagnostics::{categories, Diagnostics};
use crate::segment::{Alignment, CapPosition, SegmentDef, SegmentRole};

/// Segment names chosen for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSegments {
    pub body: String,
    pub top: String,
    pub bottom: String,
    pub intertank: Option<String>,
    pub top_internal_cap: Option<String>,
    pub bottom_internal_cap: Option<String>,
    #[serde(default)]
    pub top_alignment: Alignment,
    #[serde(default)]
    pub bottom_alignment: Alignment,
}

impl SelectedSegments {
    /// Selection with a body and both terminators, pin-both-ends alignment.
    pub fn new(body: impl Into<String>, top: impl Into<String>, bottom: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            top: top.into(),
            bottom: bottom.into(),
            intertank: None,
            top_internal_cap: None,
            bottom_internal_cap: None,
            top_alignment: Alignment::PinBothEnds,
            bottom_alignment: Alignment::PinBothEnds,
        }
    }

    pub fn with_intertank(mut self, name: impl Into<String>) -> Self {
        self.intertank = Some(name.into());
        self
    }

    pub fn with_internal_caps(mut self, top: Option<&str>, bottom: Option<&str>) -> Self {
        self.top_internal_cap = top.map(str::to_string);
        self.bottom_internal_cap = bottom.map(str::to_string);
        self
    }

    pub fn with_alignment(mut self, top: Alignment, bottom: Alignment) -> Self {
        self.top_alignment = top;
        self.bottom_alignment = bottom;
        self
    }

    /// Look every name up and check it against the role it is used in.
    pub fn resolve(
        &self,
        catalog: &SegmentCatalog,
        diag: &mut Diagnostics,
    ) -> Result<ResolvedSelection, CatalogError> {
        let body = lookup_role(catalog, &self.body, &[SegmentRole::TankBody])?;
        let intertank = self
            .intertank
            .as_deref()
            .map(|name| lookup_role(catalog, name, &[SegmentRole::Intertank]))
            .transpose()?;

        let top = resolve_terminator(
            catalog,
            &self.top,
            CapPosition::Top,
            self.top_alignment,
            diag,
        )?;
        let bottom = resolve_terminator(
            catalog,
            &self.bottom,
            CapPosition::Bottom,
            self.bottom_alignment,
            diag,
        )?;

        let top_internal_cap = self
            .top_internal_cap
            .as_deref()
            .map(|name| resolve_internal_cap(catalog, name, CapPosition::Top))
            .transpose()?;
        let bottom_internal_cap = self
            .bottom_internal_cap
            .as_deref()
            .map(|name| resolve_internal_cap(catalog, name, CapPosition::Bottom))
            .transpose()?;

        Ok(ResolvedSelection {
            body,
            intertank,
            top,
            bottom,
            top_internal_cap,
            bottom_internal_cap,
        })
    }
}

/// A terminator resolved for one end of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTerminator {
    pub segment: Arc<SegmentDef>,
    /// `CapTerminal` or `Accessory`.
    pub role: SegmentRole,
    pub alignment: Alignment,
}

/// A selection whose names have been resolved to catalog definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    pub body: Arc<SegmentDef>,
    pub intertank: Option<Arc<SegmentDef>>,
    pub top: ResolvedTerminator,
    pub bottom: ResolvedTerminator,
    pub top_internal_cap: Option<Arc<SegmentDef>>,
    pub bottom_internal_cap: Option<Arc<SegmentDef>>,
}

fn lookup_role(
    catalog: &SegmentCatalog,
    name: &str,
    roles: &[SegmentRole],
) -> Result<Arc<SegmentDef>, CatalogError> {
    let segment = catalog.lookup(name)?;
    if roles.iter().any(|&r| segment.has_role(r)) {
        Ok(segment)
    } else {
        Err(CatalogError::RoleMismatch {
            segment: name.to_string(),
            role: roles[0],
        })
    }
}

fn check_position(segment: &SegmentDef, position: CapPosition) -> Result<(), CatalogError> {
    if segment.positions.permits(position) {
        Ok(())
    } else {
        Err(CatalogError::PositionNotPermitted {
            segment: segment.name.clone(),
            position,
        })
    }
}

fn resolve_terminator(
    catalog: &SegmentCatalog,
    name: &str,
    position: CapPosition,
    alignment: Alignment,
    diag: &mut Diagnostics,
) -> Result<ResolvedTerminator, CatalogError> {
    let segment = lookup_role(
        catalog,
        name,
        &[SegmentRole::CapTerminal, SegmentRole::Accessory],
    )?;
    check_position(&segment, position)?;

    let role = if segment.is_accessory() {
        SegmentRole::Accessory
    } else {
        SegmentRole::CapTerminal
    };
    let alignment = if segment.alignments.supports(alignment) {
        alignment
    } else {
        let fallback = segment.alignments.preferred();
        diag.warn(
            categories::SELECTION,
            format!(
                "{} terminator '{}' does not support {:?}; using {:?}",
                position.name(),
                name,
                alignment,
                fallback
            ),
        );
        fallback
    };

    Ok(ResolvedTerminator {
        segment,
        role,
        alignment,
    })
}

fn resolve_internal_cap(
    catalog: &SegmentCatalog,
    name: &str,
    position: CapPosition,
) -> Result<Arc<SegmentDef>, CatalogError> {
    let segment = lookup_role(catalog, name, &[SegmentRole::CapInternal])?;
    check_position(&segment, position)?;
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::segment::{AlignmentSet, Asset, PositionPolicy, RoleSet};

    fn catalog() -> SegmentCatalog {
        let mut diag = Diagnostics::new();
        let mut catalog = SegmentCatalog::new();
        let defs = vec![
            SegmentDef::new("tank", RoleSet::TANK_BODY).with_asset(Asset::new("t", 1.0)),
            SegmentDef::new("ring", RoleSet::INTERTANK).with_asset(Asset::new("r", 0.2)),
            SegmentDef::new("nose", RoleSet::CAP_TERMINAL)
                .with_positions(PositionPolicy::Top)
                .with_alignments(AlignmentSet::ALL)
                .with_asset(Asset::new("n", 1.0)),
            SegmentDef::new("dome", RoleSet::CAP_TERMINAL.union(RoleSet::CAP_INTERNAL))
                .with_asset(Asset::new("d", 0.4)),
            SegmentDef::new("mount", RoleSet::ACCESSORY)
                .with_positions(PositionPolicy::Bottom)
                .with_asset(Asset::new("m", 0.5)),
        ];
        for def in defs {
            catalog.insert(def, &mut diag).unwrap();
        }
        catalog
    }

    #[test]
    fn resolves_full_selection() {
        let sel = SelectedSegments::new("tank", "nose", "mount")
            .with_intertank("ring")
            .with_internal_caps(Some("dome"), Some("dome"))
            .with_alignment(Alignment::PinInteriorEnd, Alignment::PinBothEnds);
        let mut diag = Diagnostics::new();
        let resolved = sel.resolve(&catalog(), &mut diag).unwrap();
        assert_eq!(resolved.body.name, "tank");
        assert_eq!(resolved.top.role, SegmentRole::CapTerminal);
        assert_eq!(resolved.top.alignment, Alignment::PinInteriorEnd);
        assert_eq!(resolved.bottom.role, SegmentRole::Accessory);
        assert!(resolved.intertank.is_some());
        assert!(resolved.bottom_internal_cap.is_some());
        assert!(diag.is_empty());
    }

    #[test]
    fn unknown_name_is_hard_error() {
        let sel = SelectedSegments::new("missing", "nose", "dome");
        let mut diag = Diagnostics::new();
        assert_eq!(
            sel.resolve(&catalog(), &mut diag).unwrap_err(),
            CatalogError::UnknownSegment("missing".into())
        );
    }

    #[test]
    fn wrong_role_is_hard_error() {
        let sel = SelectedSegments::new("ring", "nose", "dome");
        let mut diag = Diagnostics::new();
        assert!(matches!(
            sel.resolve(&catalog(), &mut diag),
            Err(CatalogError::RoleMismatch { .. })
        ));
    }

    #[test]
    fn position_not_permitted() {
        let sel = SelectedSegments::new("tank", "mount", "dome");
        let mut diag = Diagnostics::new();
        assert_eq!(
            sel.resolve(&catalog(), &mut diag).unwrap_err(),
            CatalogError::PositionNotPermitted {
                segment: "mount".into(),
                position: CapPosition::Top
            }
        );
    }

    #[test]
    fn unsupported_alignment_falls_back() {
        let sel = SelectedSegments::new("tank", "dome", "dome")
            .with_alignment(Alignment::PinInteriorEnd, Alignment::PinBothEnds);
        let mut diag = Diagnostics::new();
        let resolved = sel.resolve(&catalog(), &mut diag).unwrap();
        assert_eq!(resolved.top.alignment, Alignment::PinBothEnds);
        assert!(diag.has(categories::SELECTION, Severity::Warning));
    }
}
