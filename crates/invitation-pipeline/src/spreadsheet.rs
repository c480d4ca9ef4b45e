//! Guest list spreadsheets
//!
//! Reads the first worksheet of an uploaded `.xlsx` file into a [`Sheet`],
//! extracts the `name` and `code` columns as [`GuestRow`]s, and writes the
//! sheet back out with the generated `event_name` and `id` columns.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use invitation_common::{Error, GuestRow, Result};
use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

pub const NAME_COLUMN: &str = "name";
pub const CODE_COLUMN: &str = "code";
pub const EVENT_NAME_COLUMN: &str = "event_name";
pub const ID_COLUMN: &str = "id";

/// A single cell value, kept so the sheet can be written back unchanged
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Number(f64),
    /// Excel serial date, written back with a date format
    DateTime(f64),
    Bool(bool),
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    fn as_header(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Number(n) | Cell::DateTime(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) if dt.is_duration() => Cell::Number(dt.as_f64()),
            Data::DateTime(dt) => Cell::DateTime(dt.as_f64()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// First worksheet of a guest list: a header row plus data rows
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Parse raw `.xlsx` bytes. Fully empty rows are dropped.
pub fn read_sheet(bytes: &[u8]) -> Result<Sheet> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::MalformedInput(format!("Not a readable .xlsx workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::MalformedInput("Workbook has no worksheet".to_string()))?
        .map_err(|e| Error::MalformedInput(format!("Failed to read worksheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|d| Cell::from(d).as_header()).collect(),
        None => return Err(Error::MalformedInput("Worksheet is empty".to_string())),
    };

    let rows: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(Cell::from).collect::<Vec<_>>())
        .filter(|row| !row.iter().all(Cell::is_empty))
        .collect();

    debug!("Read worksheet with {} columns and {} rows", headers.len(), rows.len());

    Ok(Sheet { headers, rows })
}

impl Sheet {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    fn required_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| Error::MalformedInput(format!("Missing required column: {}", name)))
    }

    /// Extract the guest rows in sheet order
    pub fn guest_rows(&self) -> Result<Vec<GuestRow>> {
        let name_col = self.required_column(NAME_COLUMN)?;
        let code_col = self.required_column(CODE_COLUMN)?;

        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                // header is spreadsheet row 1
                let line = i + 2;
                let name = parse_name(row.get(name_col).unwrap_or(&Cell::Empty))
                    .ok_or_else(|| Error::MalformedInput(format!("Row {}: empty name", line)))?;
                let code = parse_code(row.get(code_col).unwrap_or(&Cell::Empty)).ok_or_else(
                    || Error::MalformedInput(format!("Row {}: code is not an integer", line)),
                )?;
                Ok(GuestRow { name, code })
            })
            .collect()
    }

    /// Set the `event_name` and `id` columns, appending them when absent.
    /// `ids` must line up with `rows`.
    pub fn with_generated_columns(mut self, event_name: &str, ids: &[String]) -> Result<Self> {
        if ids.len() != self.rows.len() {
            return Err(Error::Processing(format!(
                "Got {} identifiers for {} rows",
                ids.len(),
                self.rows.len()
            )));
        }

        let event_col = self.column_or_append(EVENT_NAME_COLUMN);
        let id_col = self.column_or_append(ID_COLUMN);
        let width = self.headers.len();

        for (row, id) in self.rows.iter_mut().zip(ids) {
            row.resize(width, Cell::Empty);
            row[event_col] = Cell::Text(event_name.to_string());
            row[id_col] = Cell::Text(id.clone());
        }

        Ok(self)
    }

    fn column_or_append(&mut self, name: &str) -> usize {
        match self.column(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        }
    }

    /// Serialize back to `.xlsx` bytes
    pub fn to_xlsx(&self) -> Result<Vec<u8>> {
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, header) in self.headers.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, header.as_str())
                .map_err(xlsx_error)?;
        }

        for (r, row) in self.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        worksheet.write_string(r, col, s.as_str()).map_err(xlsx_error)?;
                    }
                    Cell::Int(i) => {
                        worksheet.write_number(r, col, *i as f64).map_err(xlsx_error)?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(r, col, *n).map_err(xlsx_error)?;
                    }
                    Cell::DateTime(serial) => {
                        let format = if serial.fract() == 0.0 {
                            &date_format
                        } else {
                            &datetime_format
                        };
                        worksheet
                            .write_number_with_format(r, col, *serial, format)
                            .map_err(xlsx_error)?;
                    }
                    Cell::Bool(b) => {
                        worksheet.write_boolean(r, col, *b).map_err(xlsx_error)?;
                    }
                }
            }
        }

        workbook.save_to_buffer().map_err(xlsx_error)
    }
}

fn xlsx_error(err: rust_xlsxwriter::XlsxError) -> Error {
    Error::Processing(format!("Failed to write spreadsheet: {}", err))
}

fn parse_name(cell: &Cell) -> Option<String> {
    let name = match cell {
        Cell::Empty => return None,
        Cell::Text(s) => s.trim().to_string(),
        Cell::Int(i) => i.to_string(),
        Cell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        Cell::Number(n) | Cell::DateTime(n) => n.to_string(),
        Cell::Bool(b) => b.to_string(),
    };
    (!name.is_empty()).then_some(name)
}

fn parse_code(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(i) => Some(*i),
        Cell::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            Some(*n as i64)
        }
        Cell::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}
