use crate::config::HumidityConfig;
use crate::models::SeriesRecord;
use crate::utils::constants::{KELVIN_OFFSET, MAGNUS_B, MAGNUS_C};

/// Relative humidity (percent) from 2 m temperature and dew point in
/// Kelvin, via the Magnus-form approximation.
pub fn relative_humidity(temperature_k: f64, dewpoint_k: f64) -> f64 {
    let t = temperature_k - KELVIN_OFFSET;
    let td = dewpoint_k - KELVIN_OFFSET;
    100.0 * (MAGNUS_C * MAGNUS_B * (td - t) / ((MAGNUS_C + t) * (MAGNUS_C + td))).exp()
}

/// Adds derived fields to a record from its raw statistics.
///
/// Must run before sentinel substitution: a sentinel fed into the Magnus
/// formula would produce a meaningless number. Missing inputs propagate as
/// a null output, which the substitutor then turns into the sentinel.
pub struct DerivedVariableComputer {
    config: HumidityConfig,
}

impl DerivedVariableComputer {
    pub fn new(config: HumidityConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, record: &mut SeriesRecord) {
        if !self.config.enabled {
            return;
        }
        let humidity = match (
            record.value(&self.config.temperature_field),
            record.value(&self.config.dewpoint_field),
        ) {
            (Some(t), Some(td)) => Some(relative_humidity(t, td)),
            _ => None,
        };
        record.set_value(self.config.output_field.clone(), humidity);
    }
}

/// Uniform missing-data policy: for a fixed ordered field list, replace a
/// null value with the sentinel and pass everything else through. Fields
/// absent from the record are inserted as sentinel. No interpolation, no
/// propagation from neighboring dates.
pub struct MissingValueSubstitutor {
    fields: Vec<String>,
    sentinel: f64,
}

impl MissingValueSubstitutor {
    pub fn new(fields: Vec<String>, sentinel: f64) -> Self {
        Self { fields, sentinel }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn apply(&self, record: &mut SeriesRecord) {
        for field in &self.fields {
            let value = record.value(field).unwrap_or(self.sentinel);
            record.set_value(field.clone(), Some(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::SENTINEL;
    use chrono::NaiveDate;

    fn record() -> SeriesRecord {
        SeriesRecord::new("r1", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
    }

    #[test]
    fn test_magnus_reference_point() {
        // 20 C air, 10 C dew point
        let rh = relative_humidity(293.15, 283.15);
        assert!((rh - 52.6).abs() < 0.5, "got {}", rh);
    }

    #[test]
    fn test_saturated_air_is_100_percent() {
        let rh = relative_humidity(283.15, 283.15);
        assert!((rh - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_humidity_from_record_fields() {
        let computer = DerivedVariableComputer::new(HumidityConfig::default());
        let mut rec = record();
        rec.set_value("temperature_2m", Some(293.15));
        rec.set_value("dewpoint_temperature_2m", Some(283.15));
        computer.apply(&mut rec);

        let rh = rec.value("humidity").unwrap();
        assert!((rh - 52.6).abs() < 0.5);
    }

    #[test]
    fn test_missing_inputs_propagate_null() {
        let computer = DerivedVariableComputer::new(HumidityConfig::default());
        let mut rec = record();
        rec.set_value("temperature_2m", Some(293.15));
        rec.set_value("dewpoint_temperature_2m", None);
        computer.apply(&mut rec);

        assert!(rec.values.contains_key("humidity"));
        assert_eq!(rec.value("humidity"), None);
    }

    #[test]
    fn test_substitutor_fills_nulls_and_absent_fields() {
        let substitutor = MissingValueSubstitutor::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            SENTINEL,
        );
        let mut rec = record();
        rec.set_value("a", Some(1.5));
        rec.set_value("b", None);
        substitutor.apply(&mut rec);

        assert_eq!(rec.value("a"), Some(1.5));
        assert_eq!(rec.value("b"), Some(SENTINEL));
        assert_eq!(rec.value("c"), Some(SENTINEL));
    }

    #[test]
    fn test_substitutor_is_idempotent() {
        let substitutor =
            MissingValueSubstitutor::new(vec!["a".to_string(), "b".to_string()], SENTINEL);
        let mut rec = record();
        rec.set_value("a", Some(2.0));
        substitutor.apply(&mut rec);
        let once = rec.clone();
        substitutor.apply(&mut rec);

        assert_eq!(rec.value("a"), once.value("a"));
        assert_eq!(rec.value("b"), once.value("b"));
    }
}
