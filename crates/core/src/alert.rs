//! Alert types for fill-level threshold crossings.

use chrono::Utc;
use serde::Serialize;

use crate::threshold::{Crossing, Severity};
use crate::types::{BinId, Timestamp};

/// A single upward threshold crossing, rendered and ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdAlert {
    /// The bin that crossed the threshold.
    pub bin_id: BinId,
    /// Display name of the bin at the time of the crossing.
    pub bin_name: String,
    /// The boundary that was crossed (percent).
    pub boundary: f64,
    pub severity: Severity,
    /// The fill level that tripped the threshold.
    pub level: f64,
    /// Short title taken from the threshold definition.
    pub title: String,
    /// Rendered, human-readable message.
    pub message: String,
    /// When the crossing was detected.
    pub timestamp: Timestamp,
}

impl ThresholdAlert {
    /// Build an alert from an upward crossing.
    pub fn from_crossing(crossing: &Crossing, bin_name: &str) -> Self {
        Self {
            bin_id: crossing.bin_id,
            bin_name: bin_name.to_string(),
            boundary: crossing.threshold.boundary,
            severity: crossing.threshold.severity,
            level: crossing.new_level,
            title: crossing.threshold.title.clone(),
            message: crossing.threshold.render(bin_name, crossing.new_level),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::{Direction, ThresholdCatalog};

    #[test]
    fn alert_carries_rendered_message() {
        let catalog = ThresholdCatalog::standard();
        let registry = crate::registry::ThresholdRegistry::new();
        let crossings = crate::threshold::evaluate(3, 70.0, 85.0, &catalog, &registry);
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].direction, Direction::Up);

        let alert = ThresholdAlert::from_crossing(&crossings[0], "Cafeteria");
        assert_eq!(alert.bin_id, 3);
        assert_eq!(alert.boundary, 80.0);
        assert_eq!(alert.severity, Severity::Warning);
        assert!(alert.message.contains("Cafeteria"));
        assert!(alert.message.contains("85%"));
    }

    #[test]
    fn severity_serializes_lowercase() {
        let catalog = ThresholdCatalog::standard();
        let registry = crate::registry::ThresholdRegistry::new();
        let crossings = crate::threshold::evaluate(1, 0.0, 100.0, &catalog, &registry);
        let alert = ThresholdAlert::from_crossing(&crossings[1], "Dock");

        let json = serde_json::to_value(&alert).expect("serializable");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["bin_name"], "Dock");
    }
}
