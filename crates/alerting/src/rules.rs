//! Fixed threshold rules over sensor readings

use chrono::{DateTime, Utc};
use storage::{Category, NewAlert, Reading, Severity};

/// Water temperature above which an alert is critical (°C)
const HIGH_TEMPERATURE: f64 = 35.0;
/// Water temperature below which an alert is raised (°C)
const LOW_TEMPERATURE: f64 = 10.0;
/// Acceptable pH band
const PH_MIN: f64 = 6.0;
const PH_MAX: f64 = 8.5;
/// Reference midpoint reported as the pH threshold
const PH_REFERENCE: f64 = 7.0;
/// Turbidity above which pollution is assumed (NTU)
const HIGH_TURBIDITY: f64 = 50.0;

/// An alert proposed by the evaluator, not yet deduplicated or persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub message: String,
    pub category: Category,
    pub severity: Severity,
    pub wetland_id: i64,
    pub sensor_id: Option<i64>,
    pub threshold_value: f64,
    pub actual_value: f64,
    pub rule: ThresholdRule,
}

impl Candidate {
    pub fn to_new_alert(&self, created_at: DateTime<Utc>) -> NewAlert {
        NewAlert {
            title: self.title.clone(),
            message: self.message.clone(),
            category: self.category,
            severity: self.severity,
            wetland_id: Some(self.wetland_id),
            sensor_id: self.sensor_id,
            threshold_value: Some(self.threshold_value),
            actual_value: Some(self.actual_value),
            created_at,
        }
    }
}

/// The rule set. New rules are new variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdRule {
    HighTemperature,
    LowTemperature,
    PhOutOfRange,
    HighTurbidity,
}

impl ThresholdRule {
    pub const ALL: [ThresholdRule; 4] = [
        ThresholdRule::HighTemperature,
        ThresholdRule::LowTemperature,
        ThresholdRule::PhOutOfRange,
        ThresholdRule::HighTurbidity,
    ];

    /// Apply this rule to one reading. A missing metric never fires.
    pub fn check(self, reading: &Reading) -> Option<Candidate> {
        let fire = |title: &str,
                    message: String,
                    category: Category,
                    severity: Severity,
                    threshold: f64,
                    actual: f64| Candidate {
            title: title.to_string(),
            message,
            category,
            severity,
            wetland_id: reading.wetland_id,
            sensor_id: reading.sensor_id,
            threshold_value: threshold,
            actual_value: actual,
            rule: self,
        };

        match self {
            ThresholdRule::HighTemperature => reading
                .temperature
                .filter(|t| *t > HIGH_TEMPERATURE)
                .map(|t| {
                    fire(
                        "High Temperature",
                        format!("Temperature: {}°C", t),
                        Category::Critical,
                        Severity::High,
                        HIGH_TEMPERATURE,
                        t,
                    )
                }),
            ThresholdRule::LowTemperature => reading
                .temperature
                .filter(|t| *t < LOW_TEMPERATURE)
                .map(|t| {
                    fire(
                        "Low Temperature",
                        format!("Temperature: {}°C", t),
                        Category::Warning,
                        Severity::Medium,
                        LOW_TEMPERATURE,
                        t,
                    )
                }),
            ThresholdRule::PhOutOfRange => reading
                .ph
                .filter(|ph| *ph < PH_MIN || *ph > PH_MAX)
                .map(|ph| {
                    fire(
                        "pH Out of Range",
                        format!("pH Level: {}", ph),
                        Category::Warning,
                        Severity::Medium,
                        PH_REFERENCE,
                        ph,
                    )
                }),
            ThresholdRule::HighTurbidity => reading
                .turbidity
                .filter(|v| *v > HIGH_TURBIDITY)
                .map(|v| {
                    fire(
                        "High Turbidity",
                        format!("Turbidity: {} NTU", v),
                        Category::Critical,
                        Severity::High,
                        HIGH_TURBIDITY,
                        v,
                    )
                }),
        }
    }
}

/// Applies every threshold rule to every reading in a window
#[derive(Debug, Clone, Default)]
pub struct ThresholdEvaluator;

impl ThresholdEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Candidates for a single reading, in rule order
    pub fn evaluate_reading(&self, reading: &Reading) -> Vec<Candidate> {
        ThresholdRule::ALL.iter().filter_map(|rule| rule.check(reading)).collect()
    }

    /// Candidates for a window of readings, in reading order
    pub fn evaluate(&self, readings: &[Reading]) -> Vec<Candidate> {
        readings.iter().flat_map(|r| self.evaluate_reading(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reading() -> Reading {
        let mut reading = Reading::new(1, Utc::now());
        reading.sensor_id = Some(12);
        reading
    }

    #[test]
    fn test_high_temperature() {
        let mut r = reading();
        r.temperature = Some(36.5);

        let candidates = ThresholdEvaluator::new().evaluate_reading(&r);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.title, "High Temperature");
        assert_eq!(c.message, "Temperature: 36.5°C");
        assert_eq!(c.category, Category::Critical);
        assert_eq!(c.severity, Severity::High);
        assert_eq!(c.sensor_id, Some(12));
    }

    #[test]
    fn test_boundaries_do_not_fire() {
        let mut r = reading();
        r.temperature = Some(35.0);
        r.ph = Some(8.5);
        r.turbidity = Some(50.0);
        assert!(ThresholdEvaluator::new().evaluate_reading(&r).is_empty());

        r.temperature = Some(10.0);
        r.ph = Some(6.0);
        assert!(ThresholdEvaluator::new().evaluate_reading(&r).is_empty());
    }

    #[test]
    fn test_several_rules_fire_for_one_reading() {
        let mut r = reading();
        r.temperature = Some(4.0);
        r.ph = Some(9.1);
        r.turbidity = Some(80.0);

        let rules: Vec<ThresholdRule> = ThresholdEvaluator::new()
            .evaluate_reading(&r)
            .iter()
            .map(|c| c.rule)
            .collect();
        assert_eq!(
            rules,
            vec![
                ThresholdRule::LowTemperature,
                ThresholdRule::PhOutOfRange,
                ThresholdRule::HighTurbidity
            ]
        );
    }

    #[test]
    fn test_ph_reports_reference_midpoint() {
        let mut r = reading();
        r.ph = Some(5.2);
        let candidates = ThresholdEvaluator::new().evaluate_reading(&r);
        assert_eq!(candidates[0].threshold_value, 7.0);
        assert_eq!(candidates[0].actual_value, 5.2);
        assert_eq!(candidates[0].message, "pH Level: 5.2");
    }

    #[test]
    fn test_null_metrics_are_skipped() {
        let mut r = reading();
        r.dissolved_oxygen = Some(0.5);
        assert!(ThresholdEvaluator::new().evaluate(&[r]).is_empty());
    }

    #[test]
    fn test_candidate_to_new_alert() {
        let mut r = reading();
        r.turbidity = Some(70.0);
        let now = Utc::now();
        let alert = ThresholdEvaluator::new().evaluate_reading(&r)[0].to_new_alert(now);
        assert_eq!(alert.wetland_id, Some(1));
        assert_eq!(alert.threshold_value, Some(50.0));
        assert_eq!(alert.actual_value, Some(70.0));
        assert_eq!(alert.created_at, now);
    }

    proptest! {
        #[test]
        fn prop_high_temperature_is_critical(temp in 35.0001f64..200.0) {
            let mut r = reading();
            r.temperature = Some(temp);
            let candidates = ThresholdEvaluator::new().evaluate_reading(&r);
            prop_assert_eq!(candidates.len(), 1);
            prop_assert_eq!(candidates[0].category, Category::Critical);
            prop_assert_eq!(candidates[0].severity, Severity::High);
            prop_assert_eq!(candidates[0].threshold_value, 35.0);
            prop_assert_eq!(candidates[0].actual_value, temp);
        }

        #[test]
        fn prop_ph_in_band_never_fires(ph in 6.0f64..=8.5) {
            let mut r = reading();
            r.ph = Some(ph);
            let candidates = ThresholdEvaluator::new().evaluate_reading(&r);
            prop_assert!(candidates.iter().all(|c| c.rule != ThresholdRule::PhOutOfRange));
        }

        #[test]
        fn prop_one_candidate_per_firing_rule(
            temp in proptest::option::of(-10.0f64..60.0),
            ph in proptest::option::of(0.0f64..14.0),
            turbidity in proptest::option::of(0.0f64..200.0),
        ) {
            let mut r = reading();
            r.temperature = temp;
            r.ph = ph;
            r.turbidity = turbidity;
            let expected = ThresholdRule::ALL
                .iter()
                .filter(|rule| rule.check(&r).is_some())
                .count();
            let window = vec![r.clone(), r];
            prop_assert_eq!(ThresholdEvaluator::new().evaluate(&window).len(), expected * 2);
        }
    }
}
