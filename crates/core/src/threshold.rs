//! Threshold crossing evaluation for bin fill levels.
//!
//! Pure logic, no store access. The caller fetches bin snapshots, owns the
//! [`ThresholdRegistry`], and applies the returned crossings to it; this
//! module only decides which boundaries were crossed.

use crate::error::CoreError;
use crate::registry::ThresholdRegistry;
use crate::types::BinId;

/// Fill level at which a bin is considered close to capacity.
pub const WARNING_BOUNDARY: f64 = 80.0;

/// Fill level at which a bin is considered full.
pub const CRITICAL_BOUNDARY: f64 = 100.0;

/// Severity of a threshold, in ascending order of urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The bin is filling up and should be scheduled for collection.
    Warning,
    /// The bin is at capacity and needs immediate attention.
    Critical,
}

/// A configured fill-level boundary together with its alert copy.
#[derive(Debug, Clone)]
pub struct ThresholdDefinition {
    /// Fill level (percent) at which this threshold trips. Inclusive going
    /// up, exclusive going down.
    pub boundary: f64,
    pub severity: Severity,
    /// Short alert title ("Capacity alert", ...).
    pub title: String,
    /// Message template. `{name}` and `{level}` are replaced at render time.
    pub template: String,
}

impl ThresholdDefinition {
    /// Render the message template for a concrete bin and level.
    pub fn render(&self, bin_name: &str, level: f64) -> String {
        self.template
            .replace("{name}", bin_name)
            .replace("{level}", &level.to_string())
    }
}

/// The ordered set of thresholds a coordinator watches.
///
/// Boundaries are validated to be finite and strictly ascending so that a
/// single upward jump reports its crossings lowest boundary first.
#[derive(Debug, Clone)]
pub struct ThresholdCatalog {
    thresholds: Vec<ThresholdDefinition>,
}

impl ThresholdCatalog {
    pub fn new(thresholds: Vec<ThresholdDefinition>) -> Result<Self, CoreError> {
        if thresholds.is_empty() {
            return Err(CoreError::Validation(
                "threshold catalog must contain at least one threshold".to_string(),
            ));
        }
        let mut previous: Option<f64> = None;
        for threshold in &thresholds {
            let boundary = threshold.boundary;
            if !boundary.is_finite() {
                return Err(CoreError::Validation(format!(
                    "threshold boundary must be finite, got {boundary}"
                )));
            }
            if let Some(prev) = previous {
                if boundary <= prev {
                    return Err(CoreError::Validation(format!(
                        "threshold boundaries must be strictly ascending, got {boundary} after {prev}"
                    )));
                }
            }
            previous = Some(boundary);
        }
        Ok(Self { thresholds })
    }

    /// The catalog the dashboard ships with: warning at 80%, critical at 100%.
    pub fn standard() -> Self {
        Self {
            thresholds: vec![
                ThresholdDefinition {
                    boundary: WARNING_BOUNDARY,
                    severity: Severity::Warning,
                    title: "Capacity alert".to_string(),
                    template: "⚠️ Bin {name} is approaching its maximum capacity ({level}%). Plan a collection soon.".to_string(),
                },
                ThresholdDefinition {
                    boundary: CRITICAL_BOUNDARY,
                    severity: Severity::Critical,
                    title: "Critical alert".to_string(),
                    template: "🚨 Bin {name} is FULL ({level}%). It needs immediate attention.".to_string(),
                },
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThresholdDefinition> {
        self.thresholds.iter()
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

/// Direction of a detected threshold transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The level moved from below the boundary to at or above it.
    Up,
    /// The level moved back below the boundary of a fired threshold.
    Down,
}

/// A single threshold transition detected for one bin.
#[derive(Debug, Clone)]
pub struct Crossing {
    pub bin_id: BinId,
    pub threshold: ThresholdDefinition,
    pub direction: Direction,
    /// The fill level that caused the transition.
    pub new_level: f64,
}

/// Evaluate one level change against every threshold in the catalog.
///
/// A threshold reports [`Direction::Up`] when the level reaches or passes
/// its boundary from below and the registry has not fired it yet, and
/// [`Direction::Down`] when the level of a fired threshold falls strictly
/// below the boundary. Landing exactly on the boundary counts as up, never
/// as down.
///
/// The registry is read but never written: the caller applies each crossing
/// with [`ThresholdRegistry::set_fired`] after it has handled the side
/// effects, so a failed delivery can still be recorded as fired.
pub fn evaluate(
    bin_id: BinId,
    old_level: f64,
    new_level: f64,
    catalog: &ThresholdCatalog,
    registry: &ThresholdRegistry,
) -> Vec<Crossing> {
    let mut crossings = Vec::new();

    for threshold in catalog.iter() {
        let boundary = threshold.boundary;
        let fired = registry.fired(bin_id, boundary);

        if old_level < boundary && new_level >= boundary && !fired {
            crossings.push(Crossing {
                bin_id,
                threshold: threshold.clone(),
                direction: Direction::Up,
                new_level,
            });
        } else if new_level < boundary && fired {
            crossings.push(Crossing {
                bin_id,
                threshold: threshold.clone(),
                direction: Direction::Down,
                new_level,
            });
        }
    }

    crossings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ThresholdCatalog {
        ThresholdCatalog::standard()
    }

    /// Advance one bin to a new level the way the coordinator does: evaluate,
    /// apply the fired-flag changes, then record the level.
    fn step(
        registry: &mut ThresholdRegistry,
        catalog: &ThresholdCatalog,
        bin_id: BinId,
        new_level: f64,
    ) -> Vec<Crossing> {
        let old_level = registry.last_level(bin_id);
        let crossings = evaluate(bin_id, old_level, new_level, catalog, registry);
        for crossing in &crossings {
            let fired = crossing.direction == Direction::Up;
            registry.set_fired(bin_id, crossing.threshold.boundary, fired);
        }
        registry.set_last_level(bin_id, new_level);
        crossings
    }

    #[test]
    fn no_crossings_when_level_stays_below() {
        let registry = ThresholdRegistry::new();
        let crossings = evaluate(1, 10.0, 79.9, &catalog(), &registry);
        assert!(crossings.is_empty());
    }

    #[test]
    fn cross_up_at_exact_boundary() {
        let registry = ThresholdRegistry::new();
        let crossings = evaluate(1, 79.9, 80.0, &catalog(), &registry);
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].threshold.boundary, WARNING_BOUNDARY);
        assert_eq!(crossings[0].direction, Direction::Up);
    }

    #[test]
    fn repeated_pair_is_suppressed_by_fired_flag() {
        let mut registry = ThresholdRegistry::new();

        let first = evaluate(1, 70.0, 85.0, &catalog(), &registry);
        assert_eq!(first.len(), 1);
        registry.set_fired(1, WARNING_BOUNDARY, true);

        // Same pair delivered again, e.g. an at-least-once redelivery.
        let second = evaluate(1, 70.0, 85.0, &catalog(), &registry);
        assert!(second.is_empty());
    }

    #[test]
    fn jump_to_midband_fires_only_lower_threshold() {
        let registry = ThresholdRegistry::new();
        let crossings = evaluate(1, 0.0, 85.0, &catalog(), &registry);
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].threshold.boundary, WARNING_BOUNDARY);
    }

    #[test]
    fn single_jump_fires_every_crossed_threshold_in_order() {
        let registry = ThresholdRegistry::new();
        let crossings = evaluate(1, 70.0, 100.0, &catalog(), &registry);
        assert_eq!(crossings.len(), 2);
        assert_eq!(crossings[0].threshold.boundary, WARNING_BOUNDARY);
        assert_eq!(crossings[1].threshold.boundary, CRITICAL_BOUNDARY);
        assert!(crossings.iter().all(|c| c.direction == Direction::Up));
    }

    #[test]
    fn landing_on_boundary_from_above_is_not_a_reset() {
        let mut registry = ThresholdRegistry::new();
        registry.set_fired(1, WARNING_BOUNDARY, true);

        // 85 -> 80 stays at the boundary; down requires strictly below.
        let crossings = evaluate(1, 85.0, 80.0, &catalog(), &registry);
        assert!(crossings.is_empty());
    }

    #[test]
    fn drop_below_boundary_resets_fired_threshold() {
        let mut registry = ThresholdRegistry::new();
        registry.set_fired(1, WARNING_BOUNDARY, true);

        let crossings = evaluate(1, 80.0, 79.9, &catalog(), &registry);
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].direction, Direction::Down);
        assert_eq!(crossings[0].threshold.boundary, WARNING_BOUNDARY);
    }

    #[test]
    fn full_cycle_resets_and_refires() {
        let mut registry = ThresholdRegistry::new();
        let catalog = catalog();

        let up = step(&mut registry, &catalog, 1, 85.0);
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].direction, Direction::Up);

        let top = step(&mut registry, &catalog, 1, 100.0);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].threshold.boundary, CRITICAL_BOUNDARY);

        // Collection empties the bin; both thresholds reset silently.
        let down = step(&mut registry, &catalog, 1, 20.0);
        assert_eq!(down.len(), 2);
        assert!(down.iter().all(|c| c.direction == Direction::Down));

        // Filling back up fires the warning again.
        let again = step(&mut registry, &catalog, 1, 85.0);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].direction, Direction::Up);
        assert_eq!(again[0].threshold.boundary, WARNING_BOUNDARY);
    }

    #[test]
    fn cross_up_count_matches_transition_count() {
        let mut registry = ThresholdRegistry::new();
        let catalog = catalog();

        // Three below-to-at-or-above transitions for the 80 boundary.
        let levels = [10.0, 85.0, 85.0, 60.0, 90.0, 100.0, 20.0, 80.0];
        let mut ups = 0;
        for level in levels {
            ups += step(&mut registry, &catalog, 1, level)
                .iter()
                .filter(|c| {
                    c.direction == Direction::Up && c.threshold.boundary == WARNING_BOUNDARY
                })
                .count();
        }
        assert_eq!(ups, 3);
    }

    #[test]
    fn unseen_bin_evaluates_from_zero() {
        let mut registry = ThresholdRegistry::new();
        let crossings = step(&mut registry, &catalog(), 42, 85.0);
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].direction, Direction::Up);
    }

    #[test]
    fn bins_are_tracked_independently() {
        let mut registry = ThresholdRegistry::new();
        let catalog = catalog();

        assert_eq!(step(&mut registry, &catalog, 1, 90.0).len(), 1);
        // Bin 2 crossing is unaffected by bin 1's fired flag.
        assert_eq!(step(&mut registry, &catalog, 2, 90.0).len(), 1);
        // Bin 1 staying high stays quiet.
        assert!(step(&mut registry, &catalog, 1, 95.0).is_empty());
    }

    #[test]
    fn catalog_rejects_empty() {
        assert!(ThresholdCatalog::new(Vec::new()).is_err());
    }

    #[test]
    fn catalog_rejects_unordered_boundaries() {
        let result = ThresholdCatalog::new(vec![
            ThresholdDefinition {
                boundary: 100.0,
                severity: Severity::Critical,
                title: "a".to_string(),
                template: "a".to_string(),
            },
            ThresholdDefinition {
                boundary: 80.0,
                severity: Severity::Warning,
                title: "b".to_string(),
                template: "b".to_string(),
            },
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn catalog_rejects_duplicate_boundaries() {
        let definition = ThresholdDefinition {
            boundary: 80.0,
            severity: Severity::Warning,
            title: "a".to_string(),
            template: "a".to_string(),
        };
        assert!(ThresholdCatalog::new(vec![definition.clone(), definition]).is_err());
    }

    #[test]
    fn catalog_rejects_non_finite_boundary() {
        let result = ThresholdCatalog::new(vec![ThresholdDefinition {
            boundary: f64::NAN,
            severity: Severity::Warning,
            title: "a".to_string(),
            template: "a".to_string(),
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn template_render_substitutes_name_and_level() {
        let definition = ThresholdDefinition {
            boundary: 80.0,
            severity: Severity::Warning,
            title: "Capacity alert".to_string(),
            template: "Bin {name} is at {level}%.".to_string(),
        };
        assert_eq!(definition.render("Cafeteria", 85.0), "Bin Cafeteria is at 85%.");
        assert_eq!(definition.render("Cafeteria", 85.5), "Bin Cafeteria is at 85.5%.");
    }

    #[test]
    fn standard_catalog_matches_dashboard_defaults() {
        let catalog = ThresholdCatalog::standard();
        let boundaries: Vec<f64> = catalog.iter().map(|t| t.boundary).collect();
        assert_eq!(boundaries, vec![80.0, 100.0]);
        let severities: Vec<Severity> = catalog.iter().map(|t| t.severity).collect();
        assert_eq!(severities, vec![Severity::Warning, Severity::Critical]);
    }
}
