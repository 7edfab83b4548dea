use serde::{Deserialize, Serialize};

/// Band-wise statistic applied across the frames of one time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Min,
    Max,
    Sum,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Sum => "sum",
        }
    }
}

impl std::fmt::Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rename applied to a band after aggregation, so that independently
/// reduced series over the same source band can coexist after joining
/// (e.g. min/max temperature next to the mean group's temperature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandRename {
    pub from: String,
    pub to: String,
}

/// A set of source bands aggregated together with one reducer, drawn from
/// one named frame source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableGroup {
    pub name: String,
    pub source: String,
    pub bands: Vec<String>,
    pub reducer: Reducer,
    #[serde(default)]
    pub renames: Vec<BandRename>,
}

impl VariableGroup {
    /// Band names this group contributes to the joined schema, with
    /// renames applied
    pub fn output_bands(&self) -> Vec<String> {
        self.bands
            .iter()
            .map(|band| {
                self.renames
                    .iter()
                    .find(|r| &r.from == band)
                    .map(|r| r.to.clone())
                    .unwrap_or_else(|| band.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducer_serde_tag() {
        let reducer: Reducer = serde_json::from_str("\"mean\"").unwrap();
        assert_eq!(reducer, Reducer::Mean);
        assert_eq!(serde_json::to_string(&Reducer::Sum).unwrap(), "\"sum\"");
    }

    #[test]
    fn test_output_bands_apply_renames() {
        let group = VariableGroup {
            name: "era5_min".to_string(),
            source: "era5".to_string(),
            bands: vec!["temperature_2m".to_string()],
            reducer: Reducer::Min,
            renames: vec![BandRename {
                from: "temperature_2m".to_string(),
                to: "min_temperature_2m".to_string(),
            }],
        };
        assert_eq!(group.output_bands(), vec!["min_temperature_2m".to_string()]);
    }
}
