use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use log::debug;
use poll_validity::Table;
use snafu::prelude::*;

use crate::pipeline::*;

/// Reads the first row as the header and every other row as text cells.
pub fn read_excel_table(path: &str, worksheet_name: Option<&str>) -> PipelineResult<Table> {
    let wrange = get_range(path, worksheet_name)?;
    range_to_table(&wrange, path)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> PipelineResult<Range<DataType>> {
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

fn range_to_table(wrange: &Range<DataType>, path: &str) -> PipelineResult<Table> {
    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu { path })?;
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| read_cell(cell, 0, path).map(|s| header_name(s, idx)))
        .collect::<PipelineResult<_>>()?;
    debug!("read_excel_table: header: {:?}", columns);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| read_cell(cell, idx + 1, path))
            .collect::<PipelineResult<_>>()?;
        // Trailing blank lines of a sheet are part of the range.
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(cells);
    }
    Table::new(columns, rows).context(InvalidDataSnafu { path })
}

fn header_name(name: String, idx: usize) -> String {
    if name.is_empty() {
        format!("column_{}", idx + 1)
    } else {
        name
    }
}

fn read_cell(cell: &DataType, lineno: usize, path: &str) -> PipelineResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Int(i) => Ok(i.to_string()),
        // Whole numbers are written without a fractional part, as in a CSV export.
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        DataType::DateTime(serial) => Ok(excel_date(*serial)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| serial.to_string())),
        DataType::Empty => Ok("".to_string()),
        DataType::Error(e) => ExcelWrongCellTypeSnafu {
            lineno,
            path,
            content: format!("{:?}", e),
        }
        .fail(),
    }
}

// Excel counts days from 1899-12-30.
fn excel_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        let p = "polls.xlsx";
        assert_eq!(read_cell(&DataType::Float(49.0), 1, p).unwrap(), "49");
        assert_eq!(read_cell(&DataType::Float(0.5), 1, p).unwrap(), "0.5");
        assert_eq!(read_cell(&DataType::String("*".to_string()), 1, p).unwrap(), "*");
        assert_eq!(read_cell(&DataType::Empty, 1, p).unwrap(), "");
        assert_eq!(read_cell(&DataType::Bool(true), 1, p).unwrap(), "true");
        // 1936-08-24
        assert_eq!(
            read_cell(&DataType::DateTime(13386.0), 1, p).unwrap(),
            "1936-08-24"
        );
    }

    #[test]
    fn range_with_header() {
        let mut r: Range<DataType> = Range::new((0, 0), (3, 2));
        r.set_value((0, 0), DataType::String("QuestionID".to_string()));
        r.set_value((0, 1), DataType::String("RespTxt".to_string()));
        r.set_value((1, 0), DataType::String("Q1".to_string()));
        r.set_value((1, 1), DataType::String("Roosevelt".to_string()));
        r.set_value((1, 2), DataType::Float(49.0));
        let t = range_to_table(&r, "polls.xlsx").unwrap();
        assert_eq!(t.columns(), &["QuestionID", "RespTxt", "column_3"]);
        // The blank rows at the end are skipped.
        assert_eq!(t.len(), 1);
        assert_eq!(t.rows()[0], vec!["Q1", "Roosevelt", "49"]);
    }
}
