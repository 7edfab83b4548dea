/// Sentinel substituted for missing statistics in exported records
pub const SENTINEL: f64 = -999.0;

/// Magnus approximation coefficients (over water, in °C)
pub const MAGNUS_B: f64 = 17.625;
pub const MAGNUS_C: f64 = 243.04;

/// Kelvin to Celsius offset
pub const KELVIN_OFFSET: f64 = 273.15;

/// Approximate meridional meters per degree of latitude
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// ERA5-Land band names
pub const BAND_TEMPERATURE: &str = "temperature_2m";
pub const BAND_DEWPOINT: &str = "dewpoint_temperature_2m";
pub const BAND_SURFACE_PRESSURE: &str = "surface_pressure";
pub const BAND_WIND_U: &str = "u_component_of_wind_10m";
pub const BAND_WIND_V: &str = "v_component_of_wind_10m";
pub const BAND_PRECIPITATION: &str = "total_precipitation";
pub const BAND_MIN_TEMPERATURE: &str = "min_temperature_2m";
pub const BAND_MAX_TEMPERATURE: &str = "max_temperature_2m";

/// Sentinel-5P band names
pub const BAND_NO2: &str = "NO2_column_number_density";
pub const BAND_NO2_TROPOSPHERIC: &str = "tropospheric_NO2_column_number_density";

/// Derived field name
pub const FIELD_HUMIDITY: &str = "humidity";

/// Grid sidecar file expected next to frame Parquet files
pub const GRID_SIDECAR_FILE: &str = "grid.json";

/// Processing defaults
pub const DEFAULT_SCALE_METERS: f64 = 9000.0;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
