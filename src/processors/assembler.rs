use rayon::prelude::*;

use crate::models::{FrameSequence, RecordTable};
use crate::processors::{DerivedVariableComputer, MissingValueSubstitutor, ZonalStatisticsExtractor};

/// Flattens a daily frame sequence into the terminal (region, date) table.
///
/// Every frame is extracted independently (frames in parallel), derived
/// variables are computed on raw statistics, and sentinel substitution runs
/// last. Output order is date-major, then region order as supplied. No
/// deduplication: duplicate region identifiers produce duplicate records.
pub struct SeriesAssembler {
    extractor: ZonalStatisticsExtractor,
    computer: DerivedVariableComputer,
    substitutor: MissingValueSubstitutor,
}

impl SeriesAssembler {
    pub fn new(
        extractor: ZonalStatisticsExtractor,
        computer: DerivedVariableComputer,
        substitutor: MissingValueSubstitutor,
    ) -> Self {
        Self {
            extractor,
            computer,
            substitutor,
        }
    }

    pub fn assemble(&self, sequence: &FrameSequence) -> RecordTable {
        let batches: Vec<Vec<crate::models::SeriesRecord>> = sequence
            .frames()
            .par_iter()
            .map(|frame| {
                let mut records = self.extractor.extract(frame);
                for record in &mut records {
                    self.computer.apply(record);
                    self.substitutor.apply(record);
                }
                records
            })
            .collect();

        let mut table = RecordTable::new(
            self.substitutor.fields().to_vec(),
            self.extractor.metadata_fields(),
        );
        table.records = batches.into_iter().flatten().collect();
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HumidityConfig;
    use crate::models::{Frame, GridSpec, Region};
    use crate::utils::constants::SENTINEL;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array2;
    use std::collections::BTreeMap;

    fn grid() -> GridSpec {
        GridSpec::new(0.0, 2.0, 1.0, 1.0, 4, 4).unwrap()
    }

    fn sequence(days: i64, value: f64) -> FrameSequence {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let frames = (0..days)
            .map(|i| {
                let mut bands = BTreeMap::new();
                bands.insert("NO2_column_number_density".to_string(), Array2::from_elem((4, 4), value));
                Frame::new(d0 + Duration::days(i), grid(), bands)
            })
            .collect();
        FrameSequence::new(grid(), frames).unwrap()
    }

    fn assembler(regions: Vec<Region>) -> SeriesAssembler {
        let extractor = ZonalStatisticsExtractor::new(regions, &grid(), 9000.0);
        let computer = DerivedVariableComputer::new(HumidityConfig {
            enabled: false,
            ..HumidityConfig::default()
        });
        let substitutor = MissingValueSubstitutor::new(
            vec!["NO2_column_number_density".to_string()],
            SENTINEL,
        );
        SeriesAssembler::new(extractor, computer, substitutor)
    }

    #[test]
    fn test_date_major_region_minor_order() {
        let regions = vec![
            Region::point("a", 0.5, 1.5).with_metadata("Countrycode", "IT"),
            Region::point("b", 2.5, 0.5),
        ];
        let table = assembler(regions).assemble(&sequence(3, 5.0));

        assert_eq!(table.len(), 6);
        let keys: Vec<(String, String)> = table
            .records
            .iter()
            .map(|r| (r.date_string(), r.region_id.clone()))
            .collect();
        assert_eq!(keys[0], ("2020-01-01".to_string(), "a".to_string()));
        assert_eq!(keys[1], ("2020-01-01".to_string(), "b".to_string()));
        assert_eq!(keys[2], ("2020-01-02".to_string(), "a".to_string()));
        assert_eq!(table.metadata_fields, vec!["Countrycode".to_string()]);
    }

    #[test]
    fn test_constant_raster_end_to_end_values() {
        let table = assembler(vec![Region::point("a", 0.5, 1.5)]).assemble(&sequence(3, 5.0));
        assert_eq!(table.len(), 3);
        for record in &table.records {
            assert_eq!(record.value("NO2_column_number_density"), Some(5.0));
        }
    }

    #[test]
    fn test_duplicate_regions_duplicate_records() {
        let regions = vec![Region::point("a", 0.5, 1.5), Region::point("a", 0.5, 1.5)];
        let table = assembler(regions).assemble(&sequence(1, 5.0));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_empty_sequence_yields_empty_table() {
        let table =
            assembler(vec![Region::point("a", 0.5, 1.5)]).assemble(&FrameSequence::empty(grid()));
        assert!(table.is_empty());
    }
}
