//! TankStack Headless Solve Harness
//!
//! Loads the demo segment catalog, runs the solver over a set of canned
//! requests and checks the results against the solver's guarantees.
//! Runs entirely in-process, no rendering.
//!
//! Usage:
//!   cargo run -p tankstack-simtest
//!   cargo run -p tankstack-simtest -- --verbose
//!   cargo run -p tankstack-simtest -- --json

use serde::{Deserialize, Serialize};
use tankstack_logic::align;
use tankstack_logic::catalog::{LoaderRegistry, SegmentCatalog, SegmentRecord};
use tankstack_logic::diagnostics::{categories, Diagnostic, Diagnostics, Severity};
use tankstack_logic::packer;
use tankstack_logic::segment::{Alignment, CapPosition, SegmentRole};
use tankstack_logic::selection::SelectedSegments;
use tankstack_logic::solver::{self, SolveReport, SolverConfig, StackRequest};
use tankstack_logic::stack::SegmentStack;

// ── Demo data (same JSON the editor tooling ships) ──────────────────────
const CATALOG_JSON: &str = include_str!("../../../data/demo_catalog.json");
const REQUESTS_JSON: &str = include_str!("../../../data/demo_requests.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    request: StackRequest,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    let json = std::env::args().any(|a| a == "--json");
    println!("=== TankStack Solve Harness ===\n");

    let mut results = Vec::new();
    let config = SolverConfig::default();

    // 1. Catalog loading and auto-correction
    let catalog = match validate_catalog(&mut results, verbose) {
        Some(c) => c,
        None => finish(results, verbose),
    };

    // 2. Packer and alignment primitives
    results.extend(validate_primitives(verbose));

    // 3. Canned requests
    let reports = validate_scenarios(&catalog, &config, &mut results, verbose);

    // 4. Fallback paths
    results.extend(validate_fallbacks(&catalog, &config, verbose));

    if json {
        let summaries: Vec<ScenarioSummary> = reports
            .iter()
            .map(|(name, report)| ScenarioSummary::new(name, report))
            .collect();
        match serde_json::to_string_pretty(&summaries) {
            Ok(text) => println!("{}", text),
            Err(e) => results.push(TestResult {
                name: "json_output".into(),
                passed: false,
                detail: format!("serialization error: {}", e),
            }),
        }
    }

    finish(results, verbose);
}

fn finish(results: Vec<TestResult>, verbose: bool) -> ! {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    std::process::exit(if failed > 0 { 1 } else { 0 });
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(results: &mut Vec<TestResult>, verbose: bool) -> Option<SegmentCatalog> {
    println!("--- Catalog ---");

    let records: Vec<SegmentRecord> = match serde_json::from_str(CATALOG_JSON) {
        Ok(r) => r,
        Err(e) => {
            results.push(TestResult {
                name: "catalog_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return None;
        }
    };

    let mut diag = Diagnostics::new();
    let catalog = match SegmentCatalog::load(&records, &LoaderRegistry::default(), &mut diag) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult {
                name: "catalog_load".into(),
                passed: false,
                detail: e.to_string(),
            });
            return None;
        }
    };

    results.push(TestResult {
        name: "catalog_all_loaded".into(),
        passed: catalog.len() == records.len(),
        detail: format!("{} of {} records loaded", catalog.len(), records.len()),
    });

    // Every role needed for a stack is present
    let missing: Vec<&str> = [
        SegmentRole::TankBody,
        SegmentRole::Intertank,
        SegmentRole::CapTerminal,
        SegmentRole::CapInternal,
        SegmentRole::Accessory,
    ]
    .iter()
    .filter(|&&role| catalog.segments_with_role(role).is_empty())
    .map(|role| role.name())
    .collect();
    results.push(TestResult {
        name: "catalog_roles_covered".into(),
        passed: missing.is_empty(),
        detail: if missing.is_empty() {
            "every role has at least one segment".into()
        } else {
            format!("no segment for: {}", missing.join(", "))
        },
    });

    // The legacy record is repaired, not rejected
    let legacy_warnings = diag
        .warnings()
        .filter(|d| d.category == categories::CATALOG && d.message.contains("legacy"))
        .count();
    let legacy_ok = catalog
        .lookup("legacy-tank")
        .map(|s| s.assets.iter().all(|a| a.aspect > 0.0))
        .unwrap_or(false);
    results.push(TestResult {
        name: "catalog_legacy_corrected".into(),
        passed: legacy_ok && legacy_warnings >= 2,
        detail: format!("{} corrections logged for legacy-tank", legacy_warnings),
    });

    results.push(TestResult {
        name: "catalog_no_errors".into(),
        passed: !diag.has_errors(),
        detail: format!("{} catalog diagnostics, none fatal", diag.len()),
    });

    if verbose {
        for name in catalog.names() {
            if let Ok(segment) = catalog.lookup(name) {
                println!(
                    "  {:14} {} assets, diameters [{}, {})",
                    name,
                    segment.assets.len(),
                    segment.supported.min,
                    segment.supported.max
                );
            }
        }
    }

    Some(catalog)
}

// ── 2. Primitives ───────────────────────────────────────────────────────

fn validate_primitives(verbose: bool) -> Vec<TestResult> {
    println!("--- Packer & Alignment ---");
    let mut results = Vec::new();

    let solution = packer::pack(&[1.0, 2.0, 3.0], 5.9, 256);
    results.push(TestResult {
        name: "pack_within_one_piece".into(),
        passed: (solution.height - 5.9).abs() <= 1.0 && solution.stretch > 0.0,
        detail: format!(
            "5.9 → {:?}, height {:.2}, stretch {:.4}",
            solution.pieces, solution.height, solution.stretch
        ),
    });

    let empty = packer::pack(&[], 4.0, 256);
    let non_positive = packer::pack(&[1.0, 2.0], 0.0, 256);
    results.push(TestResult {
        name: "pack_degenerate_empty".into(),
        passed: empty.is_empty()
            && empty.height == 0.0
            && non_positive.is_empty()
            && non_positive.height == 0.0,
        detail: "no assets or zero target → empty solution".into(),
    });

    let tie = packer::pack(&[1.0, 2.0], 3.5, 256);
    results.push(TestResult {
        name: "pack_half_piece_rounds_up".into(),
        passed: tie.height == 4.0 && (tie.stretch - 0.875).abs() < 1e-6,
        detail: format!("3.5 → height {:.2}, stretch {:.4}", tie.height, tie.stretch),
    });

    if verbose {
        for target in [0.4_f32, 2.2, 3.5, 5.9, 12.3] {
            let s = packer::pack(&[1.0, 2.0, 3.0], target, 256);
            println!(
                "  pack {:5.2} → {:?} height {:.2} stretch {:.4}",
                target, s.pieces, s.height, s.stretch
            );
        }
    }

    let (skin_pad, core_pad) = align::terminator_padding(2.0, 2.7);
    results.push(TestResult {
        name: "align_interior_padding".into(),
        passed: (skin_pad - 0.7).abs() < 1e-5 && core_pad == 0.0,
        detail: format!("2.0 / 2.7 → padding {:.3} / {:.3}", skin_pad, core_pad),
    });
    if verbose {
        for (skin, core) in [(0.5_f32, 1.2_f32), (1.4, 0.25), (0.5, 0.5)] {
            let (sp, cp) = align::terminator_padding(skin, core);
            println!("  pad {:.2} / {:.2} → {:.3} / {:.3}", skin, core, sp, cp);
        }
    }

    let (ss, cs) = align::negotiate_aspect_ratio(0.35, 0.2, 0.5);
    results.push(TestResult {
        name: "align_strict_shared_height".into(),
        passed: (0.35 * ss - 0.2 * cs).abs() < 1e-5,
        detail: format!("0.35 / 0.2 → both {:.3}", 0.35 * ss),
    });

    results
}

// ── 3. Scenarios ────────────────────────────────────────────────────────

fn validate_scenarios(
    catalog: &SegmentCatalog,
    config: &SolverConfig,
    results: &mut Vec<TestResult>,
    verbose: bool,
) -> Vec<(String, SolveReport)> {
    println!("--- Scenarios ---");
    let mut reports = Vec::new();

    let scenarios: Vec<Scenario> = match serde_json::from_str(REQUESTS_JSON) {
        Ok(s) => s,
        Err(e) => {
            results.push(TestResult {
                name: "scenarios_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return reports;
        }
    };

    for scenario in scenarios {
        let request = &scenario.request;
        let report = match solver::solve(catalog, request, config) {
            Ok(r) => r,
            Err(e) => {
                results.push(TestResult {
                    name: format!("{}_solve", scenario.name),
                    passed: false,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        results.push(TestResult {
            name: format!("{}_consistent", scenario.name),
            passed: report.stacks.consistent
                && !report.diagnostics.has(categories::MISMATCH, Severity::Error),
            detail: format!(
                "skin {:.4} / core {:.4}",
                report.stacks.skin.height(),
                report.stacks.core.height()
            ),
        });

        results.push(TestResult {
            name: format!("{}_height", scenario.name),
            passed: report.height_met(
                request.height,
                config.height_tolerance * request.height.max(1.0),
            ),
            detail: format!(
                "requested {:.3}, achieved {:.3}",
                request.height, report.achieved_height
            ),
        });

        let interior_aligned = [CapPosition::Top, CapPosition::Bottom].iter().all(|&p| {
            let pinned = match p {
                CapPosition::Top => request.skin.top_alignment,
                CapPosition::Bottom => request.skin.bottom_alignment,
            } == Alignment::PinInteriorEnd;
            !pinned
                || match (
                    report.stacks.skin.cap_boundary(p),
                    report.stacks.core.cap_boundary(p),
                ) {
                    (Some(s), Some(c)) => (s - c).abs() < 1e-3,
                    _ => false,
                }
        });
        results.push(TestResult {
            name: format!("{}_interior_faces", scenario.name),
            passed: interior_aligned,
            detail: "interior-pinned cap faces coincide".into(),
        });

        let again = solver::solve(catalog, request, config);
        results.push(TestResult {
            name: format!("{}_idempotent", scenario.name),
            passed: again.map(|r| r.stacks == report.stacks).unwrap_or(false),
            detail: "second solve yields identical placements".into(),
        });

        if verbose {
            print_stack("skin", &report.stacks.skin);
            print_stack("core", &report.stacks.core);
            for d in report.diagnostics.entries() {
                println!("    [{:?}] {}: {}", d.severity, d.category, d.message);
            }
        }

        reports.push((scenario.name, report));
    }

    reports
}

fn print_stack(layer: &str, stack: &SegmentStack) {
    println!(
        "  {} h={:.3} volume={:.3} cost={:.1} mass={:.2} distortion={:.3}",
        layer,
        stack.height(),
        stack.evaluate_tank_volume(),
        stack.evaluate_structural_cost(),
        stack.evaluate_structural_mass(),
        stack.worst_distortion()
    );
    for p in stack.placements() {
        println!(
            "    {:12} {:14} base={:7.3} h={:6.3}{}",
            p.role.name(),
            p.asset_name(),
            p.base,
            p.height,
            if p.is_flipped() { " (flipped)" } else { "" }
        );
    }
}

// ── 4. Fallbacks ────────────────────────────────────────────────────────

fn validate_fallbacks(
    catalog: &SegmentCatalog,
    config: &SolverConfig,
    verbose: bool,
) -> Vec<TestResult> {
    println!("--- Fallbacks ---");
    let mut results = Vec::new();

    // Compartment too short to raise or collapse within tolerance
    let heavy = SelectedSegments::new("tank-heavy", "dome", "dome").with_intertank("truss");
    let request =
        StackRequest::new(1.0, 6.0, heavy.clone(), heavy).with_fractions(vec![0.05, 0.95]);
    match solver::solve(catalog, &request, config) {
        Ok(report) => {
            if verbose {
                for d in report.diagnostics.entries() {
                    println!("    [{:?}] {}: {}", d.severity, d.category, d.message);
                }
            }
            results.push(TestResult {
                name: "fallback_excision".into(),
                passed: report.budget.excised
                    && report.stacks.skin.count_role(SegmentRole::Intertank) == 0
                    && report.height_met(6.0, config.height_tolerance),
                detail: format!(
                    "excised={} satisfied={} height {:.3}",
                    report.budget.excised, report.budget.satisfied, report.achieved_height
                ),
            })
        }
        Err(e) => results.push(TestResult {
            name: "fallback_excision".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    // Mismatched intertank availability merges both layers
    let skin = SelectedSegments::new("tank", "dome", "dome").with_intertank("ring");
    let core = SelectedSegments::new("tank", "dome", "dome");
    let request = StackRequest::new(1.0, 8.0, skin, core).with_fractions(vec![1.0, 1.0]);
    match solver::solve(catalog, &request, config) {
        Ok(report) => results.push(TestResult {
            name: "fallback_single_compartment".into(),
            passed: report.stacks.consistent
                && report.diagnostics.has(categories::STRUCTURE, Severity::Warning),
            detail: format!(
                "{} skin / {} core compartments",
                report.stacks.skin.compartment_bounds().len(),
                report.stacks.core.compartment_bounds().len()
            ),
        }),
        Err(e) => results.push(TestResult {
            name: "fallback_single_compartment".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    // Request shorter than its caps
    let layer = SelectedSegments::new("tank", "dome", "dome");
    let request = StackRequest::new(1.0, 0.5, layer.clone(), layer);
    match solver::solve(catalog, &request, config) {
        Ok(report) => results.push(TestResult {
            name: "fallback_short_request".into(),
            passed: report.stacks.consistent
                && report.diagnostics.has(categories::HEIGHT, Severity::Warning),
            detail: format!("0.5 requested, {:.3} achieved", report.achieved_height),
        }),
        Err(e) => results.push(TestResult {
            name: "fallback_short_request".into(),
            passed: false,
            detail: e.to_string(),
        }),
    }

    // Misplaced cap is a hard error
    let layer = SelectedSegments::new("tank", "engine-plate", "dome");
    let request = StackRequest::new(1.0, 5.0, layer.clone(), layer);
    let err = solver::solve(catalog, &request, config).err();
    results.push(TestResult {
        name: "fallback_position_rejected".into(),
        passed: err.is_some(),
        detail: err.map(|e| e.to_string()).unwrap_or_else(|| "accepted".into()),
    });

    results
}

// ── JSON output ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PlacementSummary {
    role: &'static str,
    segment: String,
    asset: String,
    compartment: Option<usize>,
    base: f32,
    height: f32,
    scale: [f32; 3],
    offset: [f32; 3],
}

#[derive(Serialize)]
struct LayerSummary {
    height: f32,
    tank_volume: f32,
    structural_cost: f32,
    structural_mass: f32,
    worst_distortion: f32,
    placements: Vec<PlacementSummary>,
}

impl LayerSummary {
    fn new(stack: &SegmentStack) -> Self {
        Self {
            height: stack.height(),
            tank_volume: stack.evaluate_tank_volume(),
            structural_cost: stack.evaluate_structural_cost(),
            structural_mass: stack.evaluate_structural_mass(),
            worst_distortion: stack.worst_distortion(),
            placements: stack
                .placements()
                .iter()
                .map(|p| PlacementSummary {
                    role: p.role.name(),
                    segment: p.segment.name.clone(),
                    asset: p.asset_name().to_string(),
                    compartment: p.compartment,
                    base: p.base,
                    height: p.height,
                    scale: p.scale,
                    offset: p.offset,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ScenarioSummary<'a> {
    name: &'a str,
    diameter: f32,
    height: f32,
    excised: bool,
    skin: LayerSummary,
    core: LayerSummary,
    diagnostics: &'a [Diagnostic],
}

impl<'a> ScenarioSummary<'a> {
    fn new(name: &'a str, report: &'a SolveReport) -> Self {
        Self {
            name,
            diameter: report.stacks.diameter(),
            height: report.achieved_height,
            excised: report.budget.excised,
            skin: LayerSummary::new(&report.stacks.skin),
            core: LayerSummary::new(&report.stacks.core),
            diagnostics: report.diagnostics.entries(),
        }
    }
}
