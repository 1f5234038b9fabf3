//! Spreadsheet to CSV and JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use super::ConvertError;
use super::spreadsheet::read_first_sheet;

/// Byte order mark so spreadsheet applications detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn excel_to_csv(input: &Path, output: &Path) -> Result<(), ConvertError> {
    let table = read_first_sheet(input)?;

    let mut file = BufWriter::new(File::create(output)?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn excel_to_json(input: &Path, output: &Path) -> Result<(), ConvertError> {
    let table = read_first_sheet(input)?;

    let records: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let record: Map<String, Value> = table
                .header
                .iter()
                .cloned()
                .zip(row.iter().map(|cell| cell.to_json()))
                .collect();
            Value::Object(record)
        })
        .collect();

    let mut file = BufWriter::new(File::create(output)?);
    serde_json::to_writer_pretty(&mut file, &records)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::CellValue;
    use crate::test_utils::{WorkbookFixture, write_workbook};
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("cities.xlsx");
        write_workbook(
            &path,
            &WorkbookFixture::new("Cities")
                .row(&["City", "Population", "Note"])
                .row(&["São Paulo", "12300000", "big, busy"])
                .row(&["Quito", "2.8", ""]),
        );
        path
    }

    #[test]
    fn test_excel_to_csv() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cities.csv");

        excel_to_csv(&sample(&dir), &output).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(
            text,
            "City,Population,Note\nSão Paulo,12300000,\"big, busy\"\nQuito,2.8,\n"
        );
    }

    #[test]
    fn test_excel_to_json() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cities.json");

        excel_to_json(&sample(&dir), &output).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        // non-ASCII is written verbatim and indentation is two spaces
        assert!(text.contains("\"São Paulo\""));
        assert!(text.starts_with("[\n  {\n    \""));

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!([
                { "City": "São Paulo", "Population": 12300000, "Note": "big, busy" },
                { "City": "Quito", "Population": 2.8, "Note": null },
            ])
        );
        // integral numbers are written without a fraction
        assert!(!text.contains("12300000.0"));
    }

    fn typed_sample(dir: &TempDir) -> std::path::PathBuf {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let path = dir.path().join("visits.xlsx");
        write_workbook(
            &path,
            &WorkbookFixture::new("Visits")
                .row(&["Day", "Open", "Name", "Name"])
                .value(1, 0, CellValue::DateTime(day))
                .value(1, 1, CellValue::Bool(true))
                .cell(1, 2, "Ana")
                .cell(1, 3, "Díaz"),
        );
        path
    }

    #[test]
    fn test_excel_to_json_typed_cells_and_repeated_headers() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("visits.json");

        excel_to_json(&typed_sample(&dir), &output).unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(
            value,
            json!([
                { "Day": "2024-03-05T00:00:00", "Open": true, "Name": "Ana", "Name.1": "Díaz" },
            ])
        );
    }

    #[test]
    fn test_excel_to_csv_typed_cells() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("visits.csv");

        excel_to_csv(&typed_sample(&dir), &output).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "Day,Open,Name,Name.1\n2024-03-05 00:00:00,true,Ana,Díaz\n");
    }
}
