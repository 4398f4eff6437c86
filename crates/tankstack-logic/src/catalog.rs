//! Segment catalog and the loader registry that populates it.
//!
//! Catalog entries arrive as plain [`SegmentRecord`]s tagged with a type
//! (`body`, `intertank`, `cap`, `accessory`). The [`LoaderRegistry`] maps
//! each tag to a typed loader function that fills in that type's defaults
//! and produces a validated [`SegmentDef`]. The registry is built once at
//! start-up; hosts can register extra tags before loading.
//!
//! ```
//! use tankstack_logic::catalog::{LoaderRegistry, SegmentCatalog, SegmentRecord, AssetRecord};
//! use tankstack_logic::diagnostics::Diagnostics;
//!
//! let records = vec![SegmentRecord {
//!     tag: "body".into(),
//!     name: "tank".into(),
//!     assets: vec![AssetRecord::new("tank-1", 1.0)],
//!     ..SegmentRecord::default()
//! }];
//! let mut diag = Diagnostics::new();
//! let catalog = SegmentCatalog::load(&records, &LoaderRegistry::default(), &mut diag).unwrap();
//! assert!(catalog.lookup("tank").is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diagnostics::{categories, Diagnostics};
use crate::segment::{
    AlignmentSet, Asset, CapPosition, DiameterRange, PositionPolicy, RoleSet, SegmentDef,
    SegmentRole,
};
use crate::volume::{ScalingLaw, VolumeModel};

/// Hard catalog/selection errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// No segment with this name.
    UnknownSegment(String),
    /// No loader registered for this type tag.
    UnknownLoader { tag: String, segment: String },
    /// Two records share a name.
    DuplicateSegment(String),
    /// Segment selected for a role it does not declare.
    RoleMismatch { segment: String, role: SegmentRole },
    /// Segment selected at a cap position it does not permit.
    PositionNotPermitted {
        segment: String,
        position: CapPosition,
    },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::UnknownSegment(name) => write!(f, "unknown segment '{}'", name),
            CatalogError::UnknownLoader { tag, segment } => {
                write!(f, "no loader for type '{}' (segment '{}')", tag, segment)
            }
            CatalogError::DuplicateSegment(name) => {
                write!(f, "segment '{}' defined more than once", name)
            }
            CatalogError::RoleMismatch { segment, role } => {
                write!(
                    f,
                    "segment '{}' cannot be used as {}",
                    segment,
                    role.name()
                )
            }
            CatalogError::PositionNotPermitted { segment, position } => {
                write!(
                    f,
                    "segment '{}' is not permitted at the {} of a stack",
                    segment,
                    position.name()
                )
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Raw asset entry of a catalog record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRecord {
    pub name: String,
    pub aspect: f32,
    pub min_diameter: Option<f32>,
    pub max_diameter: Option<f32>,
    pub native_diameter: Option<f32>,
    pub baseline: f32,
    pub inverted: bool,
    pub materials: Vec<String>,
}

impl AssetRecord {
    pub fn new(name: impl Into<String>, aspect: f32) -> Self {
        Self {
            name: name.into(),
            aspect,
            ..Self::default()
        }
    }

    fn to_asset(&self) -> Asset {
        Asset {
            name: self.name.clone(),
            aspect: self.aspect,
            diameters: DiameterRange::new(
                self.min_diameter.unwrap_or(0.0),
                self.max_diameter.unwrap_or(f32::INFINITY),
            ),
            native_diameter: self.native_diameter.unwrap_or(1.0),
            baseline: self.baseline,
            inverted: self.inverted,
            materials: self.materials.clone(),
        }
    }
}

/// Raw, untyped catalog entry. Unset fields take the loader's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRecord {
    /// Type tag selecting the loader.
    pub tag: String,
    pub name: String,
    /// Role bits overriding the loader default.
    pub roles: Option<u8>,
    pub positions: Option<PositionPolicy>,
    /// Alignment bits overriding the loader default.
    pub alignments: Option<u8>,
    pub strict_alignment: bool,
    pub alignment_bias: Option<f32>,
    pub min_tank_aspect: f32,
    pub volume: Option<VolumeModel>,
    pub cost: Option<ScalingLaw>,
    pub mass: Option<ScalingLaw>,
    pub assets: Vec<AssetRecord>,
}

impl SegmentRecord {
    /// Build an unvalidated definition with the given type defaults.
    fn to_def(&self, roles: RoleSet, alignments: AlignmentSet, volume: VolumeModel) -> SegmentDef {
        let mut def = SegmentDef::new(
            self.name.clone(),
            self.roles.map(RoleSet::from_bits).unwrap_or(roles),
        );
        def.positions = self.positions.unwrap_or_default();
        def.alignments = self
            .alignments
            .map(AlignmentSet::from_bits)
            .unwrap_or(alignments);
        def.strict_alignment = self.strict_alignment;
        def.alignment_bias = self.alignment_bias.unwrap_or(0.5);
        def.min_tank_aspect = self.min_tank_aspect;
        def.volume = self.volume.unwrap_or(volume);
        def.cost = self.cost;
        def.mass = self.mass;
        def.assets = self.assets.iter().map(AssetRecord::to_asset).collect();
        def
    }
}

/// Typed loader: record → unvalidated definition.
pub type SegmentLoader = fn(&SegmentRecord) -> SegmentDef;

fn load_body(record: &SegmentRecord) -> SegmentDef {
    record.to_def(
        RoleSet::TANK_BODY,
        AlignmentSet::PIN_BOTH_ENDS,
        VolumeModel::Cylinder,
    )
}

fn load_intertank(record: &SegmentRecord) -> SegmentDef {
    record.to_def(
        RoleSet::INTERTANK,
        AlignmentSet::PIN_BOTH_ENDS,
        VolumeModel::Cylinder,
    )
}

fn load_cap(record: &SegmentRecord) -> SegmentDef {
    record.to_def(
        RoleSet::CAP_TERMINAL.union(RoleSet::CAP_INTERNAL),
        AlignmentSet::ALL,
        VolumeModel::Dome,
    )
}

fn load_accessory(record: &SegmentRecord) -> SegmentDef {
    record.to_def(RoleSet::ACCESSORY, AlignmentSet::ALL, VolumeModel::None)
}

/// Mapping from type tag to typed loader.
#[derive(Debug, Clone)]
pub struct LoaderRegistry {
    loaders: BTreeMap<String, SegmentLoader>,
}

impl LoaderRegistry {
    /// Registry without any loaders.
    pub fn empty() -> Self {
        Self {
            loaders: BTreeMap::new(),
        }
    }

    /// Register (or replace) the loader for `tag`.
    pub fn register(&mut self, tag: impl Into<String>, loader: SegmentLoader) {
        self.loaders.insert(tag.into(), loader);
    }

    pub fn get(&self, tag: &str) -> Option<SegmentLoader> {
        self.loaders.get(tag).copied()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("body", load_body);
        registry.register("intertank", load_intertank);
        registry.register("cap", load_cap);
        registry.register("accessory", load_accessory);
        registry
    }
}

/// Immutable name → segment mapping, shared read-only across solves.
#[derive(Debug, Clone, Default)]
pub struct SegmentCatalog {
    segments: BTreeMap<String, Arc<SegmentDef>>,
}

impl SegmentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every record through its type's loader.
    ///
    /// Configuration defects are corrected and reported in `diag`; unknown
    /// tags and duplicate names are hard errors.
    pub fn load(
        records: &[SegmentRecord],
        registry: &LoaderRegistry,
        diag: &mut Diagnostics,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for record in records {
            let loader = registry
                .get(&record.tag)
                .ok_or_else(|| CatalogError::UnknownLoader {
                    tag: record.tag.clone(),
                    segment: record.name.clone(),
                })?;
            catalog.insert(loader(record), diag)?;
        }
        diag.info(
            categories::CATALOG,
            format!("loaded {} segment definitions", catalog.len()),
        );
        Ok(catalog)
    }

    /// Validate and add one definition.
    pub fn insert(&mut self, def: SegmentDef, diag: &mut Diagnostics) -> Result<(), CatalogError> {
        if self.segments.contains_key(&def.name) {
            return Err(CatalogError::DuplicateSegment(def.name));
        }
        let def = def.validate(diag);
        self.segments.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<SegmentDef>, CatalogError> {
        self.segments
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownSegment(name.to_string()))
    }

    /// Segments declaring `role`, in name order.
    pub fn segments_with_role(&self, role: SegmentRole) -> Vec<Arc<SegmentDef>> {
        self.segments
            .values()
            .filter(|s| s.has_role(role))
            .cloned()
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Alignment;

    fn record(tag: &str, name: &str) -> SegmentRecord {
        SegmentRecord {
            tag: tag.into(),
            name: name.into(),
            assets: vec![AssetRecord::new(format!("{name}-a"), 1.0)],
            ..SegmentRecord::default()
        }
    }

    #[test]
    fn default_registry_tags() {
        let registry = LoaderRegistry::default();
        let tags: Vec<&str> = registry.tags().collect();
        assert_eq!(tags, vec!["accessory", "body", "cap", "intertank"]);
    }

    #[test]
    fn loaders_apply_type_defaults() {
        let records = vec![
            record("body", "tank"),
            record("intertank", "ring"),
            record("cap", "dome"),
            record("accessory", "mount"),
        ];
        let mut diag = Diagnostics::new();
        let catalog =
            SegmentCatalog::load(&records, &LoaderRegistry::default(), &mut diag).unwrap();
        assert_eq!(catalog.len(), 4);

        let dome = catalog.lookup("dome").unwrap();
        assert!(dome.has_role(SegmentRole::CapTerminal));
        assert!(dome.has_role(SegmentRole::CapInternal));
        assert_eq!(dome.volume, VolumeModel::Dome);
        assert!(dome.alignments.supports(Alignment::PinInteriorEnd));

        let mount = catalog.lookup("mount").unwrap();
        assert!(mount.is_accessory());
        assert_eq!(mount.volume, VolumeModel::None);

        let tank = catalog.lookup("tank").unwrap();
        assert_eq!(tank.volume, VolumeModel::Cylinder);
        assert!(!diag.has_errors());
    }

    #[test]
    fn record_overrides_roles_and_diameters() {
        let mut rec = record("cap", "nose");
        rec.roles = Some(RoleSet::CAP_TERMINAL.bits());
        rec.positions = Some(PositionPolicy::Top);
        rec.assets = vec![AssetRecord {
            name: "nose-small".into(),
            aspect: 0.8,
            min_diameter: Some(0.5),
            max_diameter: Some(2.0),
            ..AssetRecord::default()
        }];
        let mut diag = Diagnostics::new();
        let catalog = SegmentCatalog::load(&[rec], &LoaderRegistry::default(), &mut diag).unwrap();
        let nose = catalog.lookup("nose").unwrap();
        assert!(!nose.has_role(SegmentRole::CapInternal));
        assert_eq!(nose.positions, PositionPolicy::Top);
        assert_eq!(nose.supported, DiameterRange::new(0.5, 2.0));
    }

    #[test]
    fn unknown_tag_is_error() {
        let mut diag = Diagnostics::new();
        let err = SegmentCatalog::load(
            &[record("fairing", "f")],
            &LoaderRegistry::default(),
            &mut diag,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnknownLoader {
                tag: "fairing".into(),
                segment: "f".into()
            }
        );
    }

    #[test]
    fn custom_loader_can_be_registered() {
        fn load_fairing(record: &SegmentRecord) -> SegmentDef {
            SegmentDef::new(record.name.clone(), RoleSet::ACCESSORY)
                .with_volume(VolumeModel::None)
                .with_asset(Asset::new("fairing", 2.0))
        }
        let mut registry = LoaderRegistry::default();
        registry.register("fairing", load_fairing);
        let mut diag = Diagnostics::new();
        let catalog =
            SegmentCatalog::load(&[record("fairing", "f")], &registry, &mut diag).unwrap();
        assert!(catalog.lookup("f").unwrap().is_accessory());
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut diag = Diagnostics::new();
        let err = SegmentCatalog::load(
            &[record("body", "tank"), record("body", "tank")],
            &LoaderRegistry::default(),
            &mut diag,
        )
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateSegment("tank".into()));
    }

    #[test]
    fn lookup_unknown_fails() {
        let catalog = SegmentCatalog::new();
        assert_eq!(
            catalog.lookup("nope").unwrap_err(),
            CatalogError::UnknownSegment("nope".into())
        );
        assert_eq!(
            CatalogError::UnknownSegment("nope".into()).to_string(),
            "unknown segment 'nope'"
        );
    }

    #[test]
    fn segments_with_role_in_name_order() {
        let records = vec![record("body", "b2"), record("body", "b1"), record("cap", "c")];
        let mut diag = Diagnostics::new();
        let catalog =
            SegmentCatalog::load(&records, &LoaderRegistry::default(), &mut diag).unwrap();
        let names: Vec<String> = catalog
            .segments_with_role(SegmentRole::TankBody)
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(names, vec!["b1", "b2"]);
    }
}
