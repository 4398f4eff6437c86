//! Segment definitions and their concrete assets.
//!
//! A [`SegmentDef`] is one reusable segment type (a tank body, an intertank
//! divider, a nose cone, an engine mount...). It owns an aspect-ratio-sorted
//! list of [`Asset`]s, each a concrete mesh-equivalent variant valid over a
//! half-open diameter interval.
//!
//! Definitions are validated once when they enter a catalog; configuration
//! defects are corrected to safe defaults and reported as warnings, so the
//! solver only ever sees well-formed segments.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{categories, Diagnostics};
use crate::volume::{ScalingLaw, VolumeModel};

// ── Roles ──────────────────────────────────────────────────────────────

/// Bitset of roles a segment may fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet(0);
    pub const TANK_BODY: RoleSet = RoleSet(1 << 0);
    pub const INTERTANK: RoleSet = RoleSet(1 << 1);
    pub const CAP_INTERNAL: RoleSet = RoleSet(1 << 2);
    pub const CAP_TERMINAL: RoleSet = RoleSet(1 << 3);
    pub const ACCESSORY: RoleSet = RoleSet(1 << 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        RoleSet(bits & 0x1f)
    }

    pub const fn union(self, other: RoleSet) -> RoleSet {
        RoleSet(self.0 | other.0)
    }

    pub const fn contains(self, other: RoleSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: RoleSet) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn has(self, role: SegmentRole) -> bool {
        self.contains(role.flag())
    }
}

/// The single role a segment plays at one position of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentRole {
    TankBody,
    Intertank,
    CapInternal,
    CapTerminal,
    Accessory,
}

impl SegmentRole {
    pub fn flag(self) -> RoleSet {
        match self {
            Self::TankBody => RoleSet::TANK_BODY,
            Self::Intertank => RoleSet::INTERTANK,
            Self::CapInternal => RoleSet::CAP_INTERNAL,
            Self::CapTerminal => RoleSet::CAP_TERMINAL,
            Self::Accessory => RoleSet::ACCESSORY,
        }
    }

    /// Accessories carry no propellant and are excluded from volume accounting.
    pub fn is_fueled(self) -> bool {
        self != Self::Accessory
    }

    pub fn is_cap(self) -> bool {
        matches!(
            self,
            Self::CapInternal | Self::CapTerminal | Self::Accessory
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TankBody => "body",
            Self::Intertank => "intertank",
            Self::CapInternal => "internal cap",
            Self::CapTerminal => "terminal cap",
            Self::Accessory => "accessory",
        }
    }
}

// ── Cap position & alignment ───────────────────────────────────────────

/// End of the stack a cap sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapPosition {
    Top,
    Bottom,
}

impl CapPosition {
    pub fn name(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

/// Cap position(s) a segment is permitted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositionPolicy {
    Top,
    Bottom,
    #[default]
    Either,
}

impl PositionPolicy {
    pub fn permits(self, position: CapPosition) -> bool {
        match self {
            Self::Either => true,
            Self::Top => position == CapPosition::Top,
            Self::Bottom => position == CapPosition::Bottom,
        }
    }

    /// Position the segment's assets are modelled for.
    pub fn authored(self) -> CapPosition {
        match self {
            Self::Bottom => CapPosition::Bottom,
            Self::Top | Self::Either => CapPosition::Top,
        }
    }
}

/// How a cap is aligned against its counterpart in the other layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Alignment {
    /// Both faces line up; height differences are absorbed by the body.
    #[default]
    PinBothEnds,
    /// Only the face towards the tank interior lines up; the shorter cap
    /// is padded outward.
    PinInteriorEnd,
}

/// Bitset of alignment policies a segment supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlignmentSet(u8);

impl AlignmentSet {
    pub const PIN_BOTH_ENDS: AlignmentSet = AlignmentSet(1 << 0);
    pub const PIN_INTERIOR_END: AlignmentSet = AlignmentSet(1 << 1);
    pub const ALL: AlignmentSet = AlignmentSet(0b11);

    pub const fn from_bits(bits: u8) -> Self {
        AlignmentSet(bits & 0b11)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn supports(self, alignment: Alignment) -> bool {
        let flag = match alignment {
            Alignment::PinBothEnds => Self::PIN_BOTH_ENDS,
            Alignment::PinInteriorEnd => Self::PIN_INTERIOR_END,
        };
        self.0 & flag.0 != 0
    }

    /// Policy used when a requested one is not supported.
    pub fn preferred(self) -> Alignment {
        if self.supports(Alignment::PinBothEnds) || self.0 == 0 {
            Alignment::PinBothEnds
        } else {
            Alignment::PinInteriorEnd
        }
    }
}

impl Default for AlignmentSet {
    fn default() -> Self {
        Self::PIN_BOTH_ENDS
    }
}

// ── Assets ─────────────────────────────────────────────────────────────

/// Half-open diameter interval `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiameterRange {
    pub min: f32,
    pub max: f32,
}

impl DiameterRange {
    pub const ANY: DiameterRange = DiameterRange {
        min: 0.0,
        max: f32::INFINITY,
    };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, diameter: f32) -> bool {
        diameter >= self.min && diameter < self.max
    }

    /// Distance from `diameter` to the interval (zero inside).
    pub fn distance(&self, diameter: f32) -> f32 {
        if diameter < self.min {
            self.min - diameter
        } else if diameter >= self.max {
            diameter - self.max
        } else {
            0.0
        }
    }

    fn is_valid(&self) -> bool {
        self.min >= 0.0 && self.min < self.max && !self.min.is_nan() && !self.max.is_nan()
    }
}

impl Default for DiameterRange {
    fn default() -> Self {
        Self::ANY
    }
}

/// One concrete variant of a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Identifier used for mesh instancing.
    pub name: String,
    /// Native height ÷ native diameter.
    pub aspect: f32,
    /// Diameters this variant may be used at.
    pub diameters: DiameterRange,
    /// Diameter the asset is modelled at.
    pub native_diameter: f32,
    /// Height of the mesh origin above the asset's bottom face, native units.
    pub baseline: f32,
    /// Native "up" points down the stack.
    pub inverted: bool,
    /// Material overrides applied by the renderer.
    pub materials: Vec<String>,
}

impl Asset {
    pub fn new(name: impl Into<String>, aspect: f32) -> Self {
        Self {
            name: name.into(),
            aspect,
            diameters: DiameterRange::ANY,
            native_diameter: 1.0,
            baseline: 0.0,
            inverted: false,
            materials: Vec::new(),
        }
    }

    pub fn with_diameters(mut self, min: f32, max: f32) -> Self {
        self.diameters = DiameterRange::new(min, max);
        self
    }

    pub fn with_baseline(mut self, baseline: f32) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_native_diameter(mut self, native_diameter: f32) -> Self {
        self.native_diameter = native_diameter;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Native height in native units.
    pub fn native_height(&self) -> f32 {
        self.aspect * self.native_diameter
    }
}

// ── Segment definitions ────────────────────────────────────────────────

/// A reusable segment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDef {
    pub name: String,
    pub roles: RoleSet,
    pub positions: PositionPolicy,
    pub alignments: AlignmentSet,
    /// Force both layers' copies of this segment to a shared height.
    pub strict_alignment: bool,
    /// Weight of the skin's height in a strict alignment (0–1).
    pub alignment_bias: f32,
    /// Body regions built from this segment never shrink below this.
    pub min_tank_aspect: f32,
    pub volume: VolumeModel,
    pub cost: Option<ScalingLaw>,
    pub mass: Option<ScalingLaw>,
    /// Sorted by ascending aspect ratio once validated.
    pub assets: Vec<Asset>,
    /// Union of asset diameter intervals, derived on validation.
    pub supported: DiameterRange,
}

impl SegmentDef {
    pub fn new(name: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            name: name.into(),
            roles,
            positions: PositionPolicy::Either,
            alignments: AlignmentSet::default(),
            strict_alignment: false,
            alignment_bias: 0.5,
            min_tank_aspect: 0.0,
            volume: VolumeModel::Cylinder,
            cost: None,
            mass: None,
            assets: Vec::new(),
            supported: DiameterRange::ANY,
        }
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn with_positions(mut self, positions: PositionPolicy) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_alignments(mut self, alignments: AlignmentSet) -> Self {
        self.alignments = alignments;
        self
    }

    pub fn with_strict_alignment(mut self, bias: f32) -> Self {
        self.strict_alignment = true;
        self.alignment_bias = bias;
        self
    }

    pub fn with_min_tank_aspect(mut self, min: f32) -> Self {
        self.min_tank_aspect = min;
        self
    }

    pub fn with_volume(mut self, volume: VolumeModel) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_cost(mut self, cost: ScalingLaw) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_mass(mut self, mass: ScalingLaw) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Correct configuration defects and derive the supported diameter range.
    ///
    /// Every correction is reported as a warning under `catalog`.
    pub fn validate(mut self, diag: &mut Diagnostics) -> Self {
        let name = self.name.clone();

        if self.roles.is_empty() {
            diag.warn(
                categories::CATALOG,
                format!("segment '{}' declares no role; treating it as a tank body", name),
            );
            self.roles = RoleSet::TANK_BODY;
        }
        if self.roles.contains(RoleSet::ACCESSORY) && self.roles != RoleSet::ACCESSORY {
            diag.warn(
                categories::CATALOG,
                format!(
                    "segment '{}' mixes accessory with other roles; keeping accessory only",
                    name
                ),
            );
            self.roles = RoleSet::ACCESSORY;
        }

        let may_pin_interior = self
            .roles
            .intersects(RoleSet::CAP_TERMINAL.union(RoleSet::ACCESSORY));
        if self.alignments.supports(Alignment::PinInteriorEnd) && !may_pin_interior {
            diag.warn(
                categories::CATALOG,
                format!(
                    "segment '{}' cannot pin its interior end \
                     without a terminal-cap or accessory role",
                    name
                ),
            );
            self.alignments = AlignmentSet::from_bits(
                self.alignments.bits() & !AlignmentSet::PIN_INTERIOR_END.bits(),
            );
        }
        if self.alignments.bits() == 0 {
            self.alignments = AlignmentSet::PIN_BOTH_ENDS;
        }

        if !(0.0..=1.0).contains(&self.alignment_bias) {
            let clamped = if self.alignment_bias.is_nan() {
                0.5
            } else {
                self.alignment_bias.clamp(0.0, 1.0)
            };
            diag.warn(
                categories::CATALOG,
                format!(
                    "segment '{}' alignment bias {} out of range; using {}",
                    name, self.alignment_bias, clamped
                ),
            );
            self.alignment_bias = clamped;
        }

        if !(self.min_tank_aspect >= 0.0) {
            diag.warn(
                categories::CATALOG,
                format!(
                    "segment '{}' minimum tank aspect {} is invalid; using 0",
                    name, self.min_tank_aspect
                ),
            );
            self.min_tank_aspect = 0.0;
        }

        if !self.roles.contains(RoleSet::ACCESSORY) && !self.volume.is_fueled() {
            diag.warn(
                categories::CATALOG,
                format!("segment '{}' is fueled but has no volume model; using cylinder", name),
            );
            self.volume = VolumeModel::Cylinder;
        }

        if self.assets.is_empty() {
            diag.warn(
                categories::CATALOG,
                format!("segment '{}' has no assets; adding a unit asset", name),
            );
            self.assets.push(Asset::new(format!("{}-default", name), 1.0));
        }

        for asset in &mut self.assets {
            if !(asset.aspect > 0.0) || !asset.aspect.is_finite() {
                diag.warn(
                    categories::CATALOG,
                    format!(
                        "asset '{}' of '{}' has non-positive aspect {}; using 1",
                        asset.name, name, asset.aspect
                    ),
                );
                asset.aspect = 1.0;
            }
            if !(asset.native_diameter > 0.0) || !asset.native_diameter.is_finite() {
                diag.warn(
                    categories::CATALOG,
                    format!(
                        "asset '{}' of '{}' has non-positive native diameter; using 1",
                        asset.name, name
                    ),
                );
                asset.native_diameter = 1.0;
            }
            if !asset.diameters.is_valid() {
                diag.warn(
                    categories::CATALOG,
                    format!(
                        "asset '{}' of '{}' has invalid diameter range [{}, {}); \
                         accepting any diameter",
                        asset.name, name, asset.diameters.min, asset.diameters.max
                    ),
                );
                asset.diameters = DiameterRange::ANY;
            }
        }

        self.assets.sort_by(|a, b| a.aspect.total_cmp(&b.aspect));
        self.supported = close_diameter_gaps(&name, &mut self.assets, diag);
        self
    }

    pub fn has_role(&self, role: SegmentRole) -> bool {
        self.roles.has(role)
    }

    pub fn is_accessory(&self) -> bool {
        self.roles.contains(RoleSet::ACCESSORY)
    }

    /// Indices of assets usable at `diameter`, ascending by aspect ratio.
    ///
    /// When nothing covers `diameter` the assets whose interval lies
    /// nearest to it are returned instead.
    pub fn assets_applicable_at(&self, diameter: f32) -> Vec<usize> {
        let exact: Vec<usize> = (0..self.assets.len())
            .filter(|&i| self.assets[i].diameters.contains(diameter))
            .collect();
        if !exact.is_empty() || self.assets.is_empty() {
            return exact;
        }

        let nearest = self
            .assets
            .iter()
            .map(|a| a.diameters.distance(diameter))
            .fold(f32::INFINITY, f32::min);
        (0..self.assets.len())
            .filter(|&i| self.assets[i].diameters.distance(diameter) <= nearest)
            .collect()
    }

    /// First (smallest) asset applicable at `diameter`.
    pub fn first_asset_for(&self, diameter: f32) -> Option<usize> {
        self.assets_applicable_at(diameter).first().copied()
    }

    /// Applicable asset whose aspect is closest to `target_aspect`.
    ///
    /// Ties resolve to the smaller asset.
    pub fn best_asset_for(&self, diameter: f32, target_aspect: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for i in self.assets_applicable_at(diameter) {
            let err = (self.assets[i].aspect - target_aspect).abs();
            match best {
                Some((_, best_err)) if err >= best_err => {}
                _ => best = Some((i, err)),
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn asset(&self, index: usize) -> Option<&Asset> {
        self.assets.get(index)
    }
}

/// Extend intervals across gaps so the supported range is contiguous.
fn close_diameter_gaps(name: &str, assets: &mut [Asset], diag: &mut Diagnostics) -> DiameterRange {
    let mut order: Vec<usize> = (0..assets.len()).collect();
    order.sort_by(|&a, &b| assets[a].diameters.min.total_cmp(&assets[b].diameters.min));

    let Some(&first) = order.first() else {
        return DiameterRange::ANY;
    };
    let low = assets[first].diameters.min;
    let mut reach = assets[first].diameters.max;

    for &i in &order[1..] {
        let next = assets[i].diameters;
        if next.min > reach {
            diag.warn(
                categories::CATALOG,
                format!(
                    "segment '{}' has no asset for diameters [{}, {}); extending lower assets",
                    name, reach, next.min
                ),
            );
            for asset in assets.iter_mut() {
                if asset.diameters.max == reach {
                    asset.diameters.max = next.min;
                }
            }
            reach = next.min;
        }
        reach = reach.max(next.max);
    }

    DiameterRange::new(low, reach)
}
