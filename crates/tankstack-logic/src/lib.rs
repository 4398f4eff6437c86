//! Pure solver logic for modular tank stacks.
//!
//! A tank stack is a vertical column of cylindrical segments (terminator
//! caps, optional internal caps, tank bodies and intertanks) built twice:
//! once as a structural skin and once as an inner core. Given a diameter,
//! a height and a per-layer segment selection, the solver chooses discrete
//! pieces, stretches them to fit, and keeps the two layers aligned.
//!
//! Nothing here touches a renderer, an engine or the filesystem. Functions
//! take plain data and return results, so the whole pipeline is
//! unit-testable and reusable from native tools.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`align`] | Asset choice, terminator padding, strict alignment |
//! | [`budget`] | Flex-region budgets, skin/core reconciliation, excision |
//! | [`catalog`] | Segment catalog, record loaders, catalog errors |
//! | [`diagnostics`] | Categorized, logged solver issues |
//! | [`elaborate`] | Proto-stack → absolute placements, flip rule |
//! | [`packer`] | Greedy body packing and uniform stretch |
//! | [`proto`] | Proto-stack construction and aspect accounting |
//! | [`segment`] | Segment definitions, roles, assets, validation |
//! | [`selection`] | Per-layer segment choice and role checks |
//! | [`solver`] | End-to-end solve, configuration, report |
//! | [`stack`] | Solved stacks and their derived queries |
//! | [`volume`] | Volume models and cost/mass scaling laws |

pub mod align;
pub mod budget;
pub mod catalog;
pub mod diagnostics;
pub mod elaborate;
pub mod packer;
pub mod proto;
pub mod segment;
pub mod selection;
pub mod solver;
pub mod stack;
pub mod volume;
