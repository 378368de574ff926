use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::config::PollError;

/// Row-level tabular data: one header and rows of text cells.
///
/// This is the in-memory form of every poll file. The pipeline never
/// reorders or renames columns; at most it appends the verdict column.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Table, PollError> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PollError::RaggedRow {
                    row: idx,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Table { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, PollError> {
        self.column_index(name).ok_or_else(|| PollError::MissingColumn {
            column: name.to_string(),
        })
    }

    /// Keeps the rows for which the predicate holds, in order.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[String]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| keep(r.as_slice()))
                .cloned()
                .collect(),
        }
    }
}

/// The named data contract of a poll file.
///
/// Columns are always looked up by name. The defaults follow the Roper
/// Center iPoll export used by the poll archives.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PollSchema {
    pub question_id: String,
    pub question_text: String,
    pub response_text: String,
    pub response_pct: String,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub verdict: String,
    /// The descriptive columns two datasets must share byte-for-byte to be
    /// reconciled. When absent, every shared column but the verdict is used.
    pub descriptive: Option<Vec<String>>,
}

impl Default for PollSchema {
    fn default() -> Self {
        PollSchema {
            question_id: "QuestionID".to_string(),
            question_text: "QuestionTxt".to_string(),
            response_text: "RespTxt".to_string(),
            response_pct: "RespPct".to_string(),
            begin_date: Some("BegDate".to_string()),
            end_date: Some("EndDate".to_string()),
            verdict: "isValid".to_string(),
            descriptive: None,
        }
    }
}

/// Column positions of a schema in one particular table.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct ResolvedSchema {
    pub question_id: usize,
    pub question_text: usize,
    pub response_text: usize,
    pub response_pct: usize,
    pub begin_date: Option<usize>,
    pub end_date: Option<usize>,
    pub verdict: Option<usize>,
}

impl PollSchema {
    /// Resolves the column names against the header of a table.
    /// The dates and the verdict are optional; everything else is required.
    pub fn resolve(&self, table: &Table) -> Result<ResolvedSchema, PollError> {
        let optional = |name: &Option<String>| -> Option<usize> {
            let idx = name.as_ref().and_then(|n| table.column_index(n));
            if idx.is_none() && name.is_some() {
                debug!("resolve: optional column {:?} not found", name);
            }
            idx
        };
        Ok(ResolvedSchema {
            question_id: table.require_column(&self.question_id)?,
            question_text: table.require_column(&self.question_text)?,
            response_text: table.require_column(&self.response_text)?,
            response_pct: table.require_column(&self.response_pct)?,
            begin_date: optional(&self.begin_date),
            end_date: optional(&self.end_date),
            verdict: table.column_index(&self.verdict),
        })
    }
}

pub fn format_verdict(verdict: Option<bool>) -> String {
    match verdict {
        Some(true) => "true".to_string(),
        Some(false) => "false".to_string(),
        None => "".to_string(),
    }
}

/// Reads a verdict cell. Empty cells (and the usual spellings of a missing
/// value) mean that the question carries no verdict.
pub fn parse_verdict(value: &str, row: usize) -> Result<Option<bool>, PollError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        "" | "nan" | "null" | "none" => Ok(None),
        _ => Err(PollError::InvalidVerdict {
            row,
            value: value.to_string(),
        }),
    }
}

/// Parses the date formats found in poll exports.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .ok()
}
