use std::path::Path;

use crate::error::Result;
use crate::models::RecordTable;

/// Writes the flat record table as CSV with `yyyy-MM-dd` dates and fields
/// in the configured order.
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_table(&self, table: &RecordTable, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["region_id".to_string(), "date".to_string()];
        header.extend(table.metadata_fields.iter().cloned());
        header.extend(table.fields.iter().cloned());
        writer.write_record(&header)?;

        for record in &table.records {
            let mut row = vec![record.region_id.clone(), record.date_string()];
            for field in &table.metadata_fields {
                row.push(record.metadata.get(field).cloned().unwrap_or_default());
            }
            for field in &table.fields {
                match record.value(field) {
                    Some(value) => row.push(value.to_string()),
                    None => row.push(String::new()),
                }
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeriesRecord;
    use chrono::NaiveDate;

    #[test]
    fn test_write_table_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");

        let mut table = RecordTable::new(
            vec!["temperature_2m".to_string(), "humidity".to_string()],
            vec!["Countrycode".to_string()],
        );
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut record = SeriesRecord::new("IT1680A", date);
        record.metadata.insert("Countrycode".to_string(), "IT".to_string());
        record.set_value("temperature_2m", Some(288.25));
        record.set_value("humidity", Some(-999.0));
        table.records.push(record);

        CsvWriter::new().write_table(&table, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "region_id,date,Countrycode,temperature_2m,humidity"
        );
        assert_eq!(lines.next().unwrap(), "IT1680A,2020-01-01,IT,288.25,-999");
    }
}
