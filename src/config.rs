use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::{BandRename, Reducer, VariableGroup};
use crate::utils::constants::{
    BAND_DEWPOINT, BAND_MAX_TEMPERATURE, BAND_MIN_TEMPERATURE, BAND_NO2, BAND_NO2_TROPOSPHERIC,
    BAND_PRECIPITATION, BAND_SURFACE_PRESSURE, BAND_TEMPERATURE, BAND_WIND_U, BAND_WIND_V,
    DEFAULT_SCALE_METERS, FIELD_HUMIDITY, SENTINEL,
};

/// Derived relative-humidity settings. Humidity is computed from raw
/// Kelvin temperatures before sentinel substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumidityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_temperature_field")]
    pub temperature_field: String,
    #[serde(default = "default_dewpoint_field")]
    pub dewpoint_field: String,
    #[serde(default = "default_humidity_field")]
    pub output_field: String,
}

fn default_true() -> bool {
    true
}

fn default_temperature_field() -> String {
    BAND_TEMPERATURE.to_string()
}

fn default_dewpoint_field() -> String {
    BAND_DEWPOINT.to_string()
}

fn default_humidity_field() -> String {
    FIELD_HUMIDITY.to_string()
}

impl Default for HumidityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temperature_field: default_temperature_field(),
            dewpoint_field: default_dewpoint_field(),
            output_field: default_humidity_field(),
        }
    }
}

/// Pipeline run configuration: date range, variable groups with their
/// reducers, extraction scale, sentinel and exported field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub start_date: NaiveDate,
    /// Exclusive end of the date range
    pub end_date: NaiveDate,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_sentinel")]
    pub sentinel: f64,
    pub groups: Vec<VariableGroup>,
    pub output_fields: Vec<String>,
    #[serde(default)]
    pub humidity: HumidityConfig,
}

fn default_scale() -> f64 {
    DEFAULT_SCALE_METERS
}

fn default_sentinel() -> f64 {
    SENTINEL
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: PipelineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Band schema of the fully joined daily sequence
    pub fn joined_schema(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.output_bands())
            .collect()
    }

    /// Fail-fast checks, run before any aggregation begins.
    pub fn validate(&self) -> Result<()> {
        if self.start_date >= self.end_date {
            return Err(PipelineError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.scale <= 0.0 {
            return Err(PipelineError::Config(format!(
                "Extraction scale must be positive, got {}",
                self.scale
            )));
        }
        if !self.sentinel.is_finite() {
            return Err(PipelineError::Config(
                "Sentinel must be a finite number".to_string(),
            ));
        }
        if self.groups.is_empty() {
            return Err(PipelineError::Config(
                "At least one variable group is required".to_string(),
            ));
        }

        for group in &self.groups {
            if group.bands.is_empty() {
                return Err(PipelineError::Config(format!(
                    "Variable group '{}' has no bands",
                    group.name
                )));
            }
            for rename in &group.renames {
                if !group.bands.contains(&rename.from) {
                    return Err(PipelineError::UnknownBand {
                        band: rename.from.clone(),
                        context: format!("renames of group '{}'", group.name),
                    });
                }
            }
        }

        // Band-name collisions across groups surface here, before any frame
        // is aggregated or joined
        let schema = self.joined_schema();
        let mut seen = std::collections::BTreeSet::new();
        for band in &schema {
            if !seen.insert(band.clone()) {
                return Err(PipelineError::BandCollision { band: band.clone() });
            }
        }

        if self.output_fields.is_empty() {
            return Err(PipelineError::Config(
                "At least one output field is required".to_string(),
            ));
        }
        for field in &self.output_fields {
            let is_band = seen.contains(field);
            let is_derived = self.humidity.enabled && field == &self.humidity.output_field;
            if !is_band && !is_derived {
                return Err(PipelineError::UnknownBand {
                    band: field.clone(),
                    context: "output_fields".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn day_count(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// The ERA5-Land + Sentinel-5P layout used by the reference data
    /// collection: an hourly-mean meteorology group, separate min/max
    /// temperature groups renamed to avoid collision, daily precipitation
    /// totals, and daily-mean NO2 columns.
    pub fn era5_no2(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let era5_mean = VariableGroup {
            name: "era5_mean".to_string(),
            source: "era5".to_string(),
            bands: vec![
                BAND_TEMPERATURE.to_string(),
                BAND_DEWPOINT.to_string(),
                BAND_SURFACE_PRESSURE.to_string(),
                BAND_WIND_U.to_string(),
                BAND_WIND_V.to_string(),
            ],
            reducer: Reducer::Mean,
            renames: vec![],
        };
        let era5_min = VariableGroup {
            name: "era5_min".to_string(),
            source: "era5".to_string(),
            bands: vec![BAND_TEMPERATURE.to_string()],
            reducer: Reducer::Min,
            renames: vec![BandRename {
                from: BAND_TEMPERATURE.to_string(),
                to: BAND_MIN_TEMPERATURE.to_string(),
            }],
        };
        let era5_max = VariableGroup {
            name: "era5_max".to_string(),
            source: "era5".to_string(),
            bands: vec![BAND_TEMPERATURE.to_string()],
            reducer: Reducer::Max,
            renames: vec![BandRename {
                from: BAND_TEMPERATURE.to_string(),
                to: BAND_MAX_TEMPERATURE.to_string(),
            }],
        };
        let era5_sum = VariableGroup {
            name: "era5_sum".to_string(),
            source: "era5".to_string(),
            bands: vec![BAND_PRECIPITATION.to_string()],
            reducer: Reducer::Sum,
            renames: vec![],
        };
        let no2_mean = VariableGroup {
            name: "no2_mean".to_string(),
            source: "no2".to_string(),
            bands: vec![BAND_NO2.to_string(), BAND_NO2_TROPOSPHERIC.to_string()],
            reducer: Reducer::Mean,
            renames: vec![],
        };

        let output_fields = vec![
            BAND_TEMPERATURE.to_string(),
            BAND_MIN_TEMPERATURE.to_string(),
            BAND_MAX_TEMPERATURE.to_string(),
            BAND_DEWPOINT.to_string(),
            BAND_SURFACE_PRESSURE.to_string(),
            BAND_WIND_U.to_string(),
            BAND_WIND_V.to_string(),
            BAND_PRECIPITATION.to_string(),
            BAND_NO2.to_string(),
            BAND_NO2_TROPOSPHERIC.to_string(),
            FIELD_HUMIDITY.to_string(),
        ];

        Self {
            start_date,
            end_date,
            scale: DEFAULT_SCALE_METERS,
            sentinel: SENTINEL,
            groups: vec![era5_mean, era5_min, era5_max, era5_sum, no2_mean],
            output_fields,
            humidity: HumidityConfig::default(),
        }
    }
}
