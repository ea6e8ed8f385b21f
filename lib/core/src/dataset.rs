//! Dataset loading and schema validation
//!
//! Reads a tabular file, checks it carries every required column and returns
//! the table restricted and reordered to exactly those columns.

use crate::config::{PipelineConfig, PRICE_COLUMN};
use crate::record::Record;
use crate::{Error, Result};
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Supported tabular file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    JsonLines,
    /// Excel workbook; the first worksheet is read
    Excel,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "tsv" => Ok(TableFormat::Tsv),
            "jsonl" | "ndjson" => Ok(TableFormat::JsonLines),
            "xlsx" | "xlsm" | "xls" => Ok(TableFormat::Excel),
            _ => Err(Error::UnsupportedFileFormat(format!(".{ext}"))),
        }
    }
}

/// A validated table: `columns` are exactly the required columns, and every
/// row holds one cell per column (`None` for a missing or empty cell)
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Convert rows into typed records. A present `price` column must hold a
    /// positive finite number in every row.
    pub fn into_records(self) -> Result<Vec<Record>> {
        let price_idx = self.column_index(PRICE_COLUMN);
        let mut records = Vec::with_capacity(self.rows.len());

        for (row_idx, row) in self.rows.into_iter().enumerate() {
            let mut record = Record::default();
            for (col_idx, cell) in row.into_iter().enumerate() {
                if Some(col_idx) == price_idx {
                    record.price = Some(parse_price(row_idx, cell.as_deref())?);
                } else if let Some(value) = cell {
                    record.set_field(&self.columns[col_idx], value);
                }
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn parse_price(row: usize, cell: Option<&str>) -> Result<f64> {
    let raw = cell.ok_or_else(|| Error::InvalidRecord {
        row,
        reason: "missing price".to_string(),
    })?;
    let price: f64 = raw.trim().parse().map_err(|_| Error::InvalidRecord {
        row,
        reason: format!("price {raw:?} is not a number"),
    })?;
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::InvalidRecord {
            row,
            reason: format!("price {price} must be a positive finite number"),
        });
    }
    Ok(price)
}

/// Loads and schema-validates dataset files
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    required_columns: Vec<String>,
}

impl DatasetLoader {
    pub fn new(required_columns: Vec<String>) -> Self {
        Self { required_columns }
    }

    /// Loader for training tables (price required)
    pub fn training(config: &PipelineConfig) -> Self {
        Self::new(config.required_columns.clone())
    }

    /// Loader for query tables (price not required)
    pub fn inference(config: &PipelineConfig) -> Self {
        Self::new(config.inference_columns())
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    /// Load a table restricted and reordered to the required columns
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Table> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::DatasetNotFound(path.to_path_buf()));
        }

        let format = TableFormat::from_path(path)?;
        let (columns, rows) = match format {
            TableFormat::Csv => read_delimited(path, b',')?,
            TableFormat::Tsv => read_delimited(path, b'\t')?,
            TableFormat::JsonLines => read_json_lines(path)?,
            TableFormat::Excel => read_excel(path)?,
        };
        debug!(?path, ?format, rows = rows.len(), columns = columns.len(), "Read raw table");

        self.select_required(columns, rows)
    }

    /// Load and convert to typed records in one step
    pub fn load_records<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Record>> {
        self.load(path)?.into_records()
    }

    fn select_required(
        &self,
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Table> {
        let missing: Vec<String> = self
            .required_columns
            .iter()
            .filter(|c| !columns.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingRequiredColumns(missing));
        }

        let positions: Vec<usize> = self
            .required_columns
            .iter()
            .filter_map(|req| columns.iter().position(|c| c == req))
            .collect();

        let rows = rows
            .into_iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|&p| row.get(p).cloned().flatten())
                    .collect()
            })
            .collect();

        Ok(Table {
            columns: self.required_columns.clone(),
            rows,
        })
    }
}

type RawTable = (Vec<String>, Vec<Vec<Option<String>>>);

fn read_delimited(path: &Path, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| if cell.is_empty() { None } else { Some(cell.to_string()) })
                .collect(),
        );
    }

    Ok((columns, rows))
}

fn read_excel(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Spreadsheet(format!("{} has no worksheets", path.display())))??;

    let mut sheet_rows = range.rows();
    let columns: Vec<String> = match sheet_rows.next() {
        Some(header) => header.iter().map(|h| h.to_string().trim().to_string()).collect(),
        None => Vec::new(),
    };
    let rows = sheet_rows
        .map(|row| row.iter().map(excel_cell).collect())
        .collect();

    Ok((columns, rows))
}

fn excel_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn read_json_lines(path: &Path) -> Result<RawTable> {
    let reader = BufReader::new(File::open(path)?);
    let mut columns: Vec<String> = Vec::new();
    let mut objects = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| Error::InvalidRecord {
            row: line_no,
            reason: format!("malformed JSON: {e}"),
        })?;
        let Value::Object(object) = value else {
            return Err(Error::InvalidRecord {
                row: line_no,
                reason: "expected a JSON object per line".to_string(),
            });
        };
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        objects.push(object);
    }

    let rows = objects
        .into_iter()
        .map(|object| {
            columns
                .iter()
                .map(|c| object.get(c).and_then(json_cell))
                .collect()
        })
        .collect();

    Ok((columns, rows))
}

fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
