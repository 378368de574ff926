// Primitives for reading and writing CSV files.

use std::io;

use log::debug;
use poll_validity::Table;
use snafu::prelude::*;

use crate::pipeline::*;

pub fn read_csv_table(path: &str) -> PipelineResult<Table> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    read_records(rdr, path)
}

/// Reads the header and every record. Rows that do not have as many cells
/// as the header are an error.
fn read_records<R: io::Read>(mut rdr: csv::Reader<R>, path: &str) -> PipelineResult<Table> {
    let columns: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { path, lineno: 1usize })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    debug!("read_records: header: {:?}", columns);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        rows.push(line.iter().map(|s| s.to_string()).collect());
    }
    Table::new(columns, rows).context(InvalidDataSnafu { path })
}

pub fn write_csv_table(path: &str, table: &Table) -> PipelineResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu { path })?;
    write_records(&mut wtr, table, path)
}

fn write_records<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    table: &Table,
    path: &str,
) -> PipelineResult<()> {
    wtr.write_record(table.columns())
        .context(CsvWriteSnafu { path })?;
    for row in table.rows() {
        wtr.write_record(row).context(CsvWriteSnafu { path })?;
    }
    wtr.flush()
        .map_err(csv::Error::from)
        .context(CsvWriteSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROPER: &str = "\
QuestionID,QuestionTxt,RespTxt,RespPct,SurveyOrg
USGALLUP.090636.R01,\"Whom do you prefer for President?\",Roosevelt,49,Gallup
USGALLUP.090636.R01,\"Whom do you prefer for President?\",Others,*,Gallup
";

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn reads_header_and_rows() {
        let t = read_records(reader(ROPER), "roper.csv").unwrap();
        assert_eq!(
            t.columns(),
            &["QuestionID", "QuestionTxt", "RespTxt", "RespPct", "SurveyOrg"]
        );
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows()[1][3], "*");
    }

    #[test]
    fn ragged_line_is_reported() {
        let data = "QuestionID,RespTxt\nQ1,A\nQ2\n";
        match read_records(reader(data), "bad.csv") {
            Err(PipelineError::CsvLineParse { lineno, .. }) => assert_eq!(lineno, 3),
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[test]
    fn write_keeps_columns_and_cells() {
        let t = read_records(reader(ROPER), "roper.csv").unwrap();
        let mut wtr = csv::Writer::from_writer(vec![]);
        write_records(&mut wtr, &t, "out.csv").unwrap();
        let bytes = wtr.into_inner().unwrap();
        let written = String::from_utf8(bytes).unwrap();
        let back = read_records(reader(&written), "out.csv").unwrap();
        assert_eq!(back, t);
        assert!(written.starts_with("QuestionID,QuestionTxt,RespTxt,RespPct,SurveyOrg\n"));
    }
}
