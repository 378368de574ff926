use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::config::*;
use crate::table::{format_verdict, PollSchema, Table};

/// What happens to the rows of questions that received no verdict.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MergePolicy {
    /// Only classified questions flow downstream.
    DropUnmatched,
    /// The output stays a superset of the input, with an empty verdict cell.
    KeepUnmatched,
}

impl MergePolicy {
    pub fn from_drop_unmatched(drop_unmatched: bool) -> MergePolicy {
        if drop_unmatched {
            MergePolicy::DropUnmatched
        } else {
            MergePolicy::KeepUnmatched
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MergeOutcome {
    pub table: Table,
    /// Question ids without a verdict, in order of first appearance.
    pub unclassified: Vec<String>,
    pub dropped_rows: usize,
}

/// Attaches the verdicts to the row-level table, joined on the question id.
///
/// The columns of the input are kept as they are. The verdict column is
/// appended, or overwritten in place when the input already has one. Row
/// order is preserved. When the same question has several verdicts, the
/// first one is used.
pub fn merge(
    table: &Table,
    schema: &PollSchema,
    verdicts: &[Verdict],
    policy: MergePolicy,
) -> Result<MergeOutcome, PollError> {
    let qid_idx = table.require_column(&schema.question_id)?;
    let existing = table.column_index(&schema.verdict);

    let mut by_id: HashMap<&str, bool> = HashMap::new();
    for v in verdicts.iter() {
        by_id.entry(v.question_id.as_str()).or_insert(v.is_valid);
    }

    let mut columns: Vec<String> = table.columns().to_vec();
    if existing.is_none() {
        columns.push(schema.verdict.clone());
    }
    debug!(
        "merge: {} verdicts, verdict column {:?} at {:?}",
        by_id.len(),
        schema.verdict,
        existing
    );

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(table.len());
    let mut unclassified: Vec<String> = Vec::new();
    let mut seen_unclassified: HashSet<&str> = HashSet::new();
    let mut dropped_rows = 0;
    for row in table.rows() {
        let qid = row[qid_idx].as_str();
        let verdict = by_id.get(qid).copied();
        if verdict.is_none() {
            if seen_unclassified.insert(qid) {
                unclassified.push(qid.to_string());
            }
            if policy == MergePolicy::DropUnmatched {
                dropped_rows += 1;
                continue;
            }
        }
        let mut out = row.clone();
        let cell = format_verdict(verdict);
        match existing {
            Some(idx) => out[idx] = cell,
            None => out.push(cell),
        }
        rows.push(out);
    }

    info!(
        "Merged verdicts: {} rows out, {} rows dropped, {} unclassified questions",
        rows.len(),
        dropped_rows,
        unclassified.len()
    );
    Ok(MergeOutcome {
        table: Table::new(columns, rows)?,
        unclassified,
        dropped_rows,
    })
}
