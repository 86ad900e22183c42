//! CSV download of ad hoc query results.

use crate::errors::{AppError, AppResult};
use crate::models::QueryResultTable;
use std::fs;
use std::path::{Path, PathBuf};

pub const CSV_FILE_NAME: &str = "query_result.csv";
pub const CSV_MIME_TYPE: &str = "text/csv";

/// Header row plus one line per row, columns in engine order, RFC 4180 quoting.
pub fn to_csv(table: &QueryResultTable) -> String {
    let mut csv = String::new();
    push_record(&mut csv, table.columns.iter().map(String::as_str));

    for row in &table.rows {
        let cells = row.iter().map(|cell| cell.to_display_string()).collect::<Vec<_>>();
        push_record(&mut csv, cells.iter().map(String::as_str));
    }

    csv
}

/// What a download button hands the browser: body, suggested file name and content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDownload {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub body: String,
}

impl CsvDownload {
    /// A directory target gets the suggested file name appended.
    pub fn target_path(&self, out: &Path) -> PathBuf {
        if out.is_dir() {
            out.join(self.file_name)
        } else {
            out.to_path_buf()
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        fs::write(path, &self.body).map_err(|err| AppError::Io(format!("failed to write {}: {}", path.display(), err)))?;
        tracing::info!(path = %path.display(), mime = self.mime_type, bytes = self.body.len(), "saved query result");
        Ok(())
    }
}

pub fn download(table: &QueryResultTable) -> CsvDownload {
    CsvDownload {
        file_name: CSV_FILE_NAME,
        mime_type: CSV_MIME_TYPE,
        body: to_csv(table),
    }
}

pub fn write_csv(table: &QueryResultTable, path: &Path) -> AppResult<()> {
    download(table).save(path)
}

fn push_record<'a>(csv: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (index, field) in fields.enumerate() {
        if index > 0 {
            csv.push(',');
        }
        csv.push_str(&escape_csv_field(field));
    }
    csv.push('\n');
}

/// Quote fields containing a comma, double quote or line break; double inner quotes.
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{download, to_csv, write_csv, CSV_FILE_NAME};
    use crate::models::{CellValue, QueryResultTable};

    fn table() -> QueryResultTable {
        QueryResultTable {
            columns: vec!["vehicle_type".to_string(), "rides".to_string(), "note".to_string()],
            rows: vec![
                vec![CellValue::Text("Auto".to_string()), CellValue::Integer(12), CellValue::Null],
                vec![
                    CellValue::Text("Prime, Sedan".to_string()),
                    CellValue::Real(2.5),
                    CellValue::Text("said \"late\"\nagain".to_string()),
                ],
            ],
        }
    }

    #[test]
    fn writes_header_and_quotes() {
        let csv = to_csv(&table());
        assert_eq!(
            csv,
            "vehicle_type,rides,note\nAuto,12,\n\"Prime, Sedan\",2.5,\"said \"\"late\"\"\nagain\"\n"
        );
    }

    #[test]
    fn empty_result_still_has_header() {
        let empty = QueryResultTable {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: Vec::new(),
        };
        assert_eq!(to_csv(&empty), "a,b\n");
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join(CSV_FILE_NAME);
        write_csv(&table(), &path).expect("write");
        let written = std::fs::read_to_string(&path).expect("read back");
        assert!(written.starts_with("vehicle_type,rides,note\n"));
    }

    #[test]
    fn download_carries_name_and_content_type() {
        let payload = download(&table());
        assert_eq!(payload.file_name, "query_result.csv");
        assert_eq!(payload.mime_type, "text/csv");
        assert_eq!(payload.body, to_csv(&table()));
    }

    #[test]
    fn directory_target_gets_default_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let payload = download(&table());
        assert_eq!(payload.target_path(dir.path()), dir.path().join(CSV_FILE_NAME));

        let explicit = dir.path().join("rides.csv");
        assert_eq!(payload.target_path(&explicit), explicit);
    }
}
