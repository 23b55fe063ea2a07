//! Delimited file source

use crate::error::PipelineError;
use crate::etl::Extractor;
use crate::table::{Cell, Table};

use std::path::{Path, PathBuf};

/// Read a delimited file with a header row into a [`Table`]
///
/// Empty cells become [`Cell::Null`]. Each column gets one type: Number when
/// every non-empty cell parses as a number, Boolean when every non-empty cell
/// is `true`/`false`, Text otherwise.
pub struct CsvReader {
    path: PathBuf,
    delimiter: u8,
}

impl CsvReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file
    pub fn read(&self) -> Result<Table, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .delimiter(self.delimiter)
            .from_path(&self.path)
            .map_err(|e| self.format_error(e))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| self.format_error(e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            return Err(self.format_error("no header row"));
        }

        let mut raw: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| self.format_error(e))?;
            raw.push(record.iter().map(str::to_string).collect());
        }

        let kinds: Vec<ColumnKind> = (0..headers.len())
            .map(|col| ColumnKind::infer(raw.iter().map(|row| row[col].as_str())))
            .collect();

        let mut table = Table::new(headers).map_err(|m| self.format_error(m))?;
        for row in raw {
            let cells = row
                .into_iter()
                .zip(&kinds)
                .map(|(value, kind)| kind.parse(value))
                .collect();
            table.push_cells(cells).map_err(|m| self.format_error(m))?;
        }

        log::debug!(
            "Parsed {} rows x {} columns from {}",
            table.len(),
            table.columns().len(),
            self.path.display()
        );
        Ok(table)
    }

    fn format_error(&self, err: impl std::fmt::Display) -> PipelineError {
        PipelineError::SourceFormat {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl Extractor for CsvReader {
    async fn extract(&self) -> Result<Table, PipelineError> {
        self.read()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Number,
    Boolean,
    Text,
}

impl ColumnKind {
    fn infer<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let mut numeric = true;
        let mut boolean = true;
        let mut any = false;

        for value in values.filter(|v| !v.trim().is_empty()) {
            any = true;
            numeric &= parse_number(value).is_some();
            boolean &= parse_bool(value).is_some();
            if !numeric && !boolean {
                return Self::Text;
            }
        }

        match (any, numeric, boolean) {
            (false, _, _) => Self::Text,
            (true, true, _) => Self::Number,
            (true, false, true) => Self::Boolean,
            _ => Self::Text,
        }
    }

    fn parse(&self, value: String) -> Cell {
        if value.trim().is_empty() {
            return Cell::Null;
        }
        match self {
            Self::Number => parse_number(&value).map_or(Cell::Text(value), Cell::Number),
            Self::Boolean => parse_bool(&value).map_or(Cell::Text(value), Cell::Boolean),
            Self::Text => Cell::Text(value),
        }
    }
}

fn parse_number(value: &str) -> Option<serde_json::Number> {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i.into());
    }
    // Rust accepts "inf" and "NaN" as floats; only finite values are numbers here
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_read_people() {
        let file = csv_file("name,age\njohn smith,30\nJANE DOE,25\nal,40\n");
        let table = CsvReader::new(file.path()).read().unwrap();

        assert_eq!(table.columns(), &["name".to_string(), "age".to_string()]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0]["name"], Cell::from("john smith"));
        assert_eq!(table.rows()[0]["age"], Cell::from(30));
        assert_eq!(table.rows()[1]["name"], Cell::from("JANE DOE"));
    }

    #[test]
    fn test_column_type_inference() {
        let file = csv_file("id,score,active,zip,note\n1,1.5,TRUE,02134,\n2,,false,x1,hi\n");
        let table = CsvReader::new(file.path()).read().unwrap();
        let first = &table.rows()[0];
        let second = &table.rows()[1];

        assert_eq!(first["id"], Cell::from(1));
        assert_eq!(
            first["score"],
            Cell::Number(serde_json::Number::from_f64(1.5).unwrap())
        );
        assert_eq!(second["score"], Cell::Null);
        assert_eq!(first["active"], Cell::Boolean(true));
        assert_eq!(second["active"], Cell::Boolean(false));
        // Mixed column stays text, including the numeric-looking cell
        assert_eq!(first["zip"], Cell::from("02134"));
        assert_eq!(first["note"], Cell::Null);
        assert_eq!(second["note"], Cell::from("hi"));
    }

    #[test]
    fn test_non_finite_floats_are_text() {
        let file = csv_file("v\ninf\nNaN\n");
        let table = CsvReader::new(file.path()).read().unwrap();
        assert_eq!(table.rows()[0]["v"], Cell::from("inf"));
    }

    #[test]
    fn test_custom_delimiter() {
        let file = csv_file("a;b\nx;1\n");
        let table = CsvReader::new(file.path())
            .with_delimiter(b';')
            .read()
            .unwrap();
        assert_eq!(table.rows()[0]["b"], Cell::from(1));
    }

    #[test]
    fn test_ragged_rows_are_format_errors() {
        let file = csv_file("a,b\n1,2\n3\n");
        let err = CsvReader::new(file.path()).read().unwrap_err();
        assert!(matches!(err, PipelineError::SourceFormat { .. }));
    }

    #[test]
    fn test_duplicate_header_is_format_error() {
        let file = csv_file("a,a\n1,2\n");
        let err = CsvReader::new(file.path()).read().unwrap_err();
        assert!(err.to_string().contains("duplicate column 'a'"));
    }

    #[test]
    fn test_missing_file_is_format_error() {
        let err = CsvReader::new("/definitely/not/here.csv").read().unwrap_err();
        assert!(matches!(err, PipelineError::SourceFormat { .. }));
    }

    #[test]
    fn test_empty_file_is_format_error() {
        let file = csv_file("");
        let err = CsvReader::new(file.path()).read().unwrap_err();
        assert!(err.to_string().contains("no header row"));
    }

    #[test]
    fn test_header_only_file_is_empty_table() {
        let file = csv_file("a,b\n");
        let table = CsvReader::new(file.path()).read().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[tokio::test]
    async fn test_extractor_impl() {
        let file = csv_file("a\n1\n");
        let table = CsvReader::new(file.path()).extract().await.unwrap();
        assert_eq!(table.len(), 1);
    }
}
