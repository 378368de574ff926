use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::*;
use crate::table::{parse_verdict, PollSchema, Table};

/// The columns on which the rows of two datasets are paired.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum KeyColumns {
    /// The descriptive columns of the schema when it lists them, otherwise
    /// every column present in both tables, except the verdict.
    Shared,
    /// An explicit list. Every column must exist in both tables.
    Named(Vec<String>),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
pub enum Side {
    A,
    B,
}

/// A question whose rows carry different verdicts within one dataset.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InconsistentVerdicts {
    pub question_id: String,
    pub side: Side,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub key_columns: Vec<String>,
    /// Distinct questions in the join.
    pub total_questions: usize,
    /// Questions with a verdict on both sides.
    pub compared: usize,
    pub matches: usize,
    /// Percentage of the questions of the join on which both sides agree.
    /// A question without a verdict on either side counts as a disagreement.
    pub agreement_rate: Option<f64>,
    /// Every question that is not a match, unclassified ones included.
    pub disagreements: Vec<DisagreementGroup>,
    /// Questions without a verdict on at least one side.
    pub unclassified: Vec<String>,
    pub inconsistent: Vec<InconsistentVerdicts>,
    /// Rows of each side that joined no row of the other side.
    pub unjoined_a: usize,
    pub unjoined_b: usize,
}

impl ReconciliationReport {
    pub fn errors(&self) -> usize {
        self.disagreements.len()
    }

    /// True when some rows could not be paired, which usually means that
    /// the two files do not come from the same version of the data.
    pub fn has_join_failures(&self) -> bool {
        self.unjoined_a > 0 || self.unjoined_b > 0
    }
}

// Per-question accumulator, in order of first appearance in the join.
// The outer option is unset until the first joined row is read.
struct QuestionPairs {
    question_id: String,
    verdict_a: Option<Option<bool>>,
    verdict_b: Option<Option<bool>>,
    inconsistent_a: bool,
    inconsistent_b: bool,
    rows_a: Vec<usize>,
}

/// Compares the verdicts of two datasets over the same questions.
///
/// The rows are inner-joined on the key columns. Duplicate keys pair up as
/// in a relational join. For every question of the join, the first verdict
/// of each side is compared. A question that is not a match, because the
/// verdicts differ or one of them is missing, is a disagreement. Neither
/// input is modified.
pub fn reconcile(
    a: &Table,
    b: &Table,
    schema: &PollSchema,
    keys: &KeyColumns,
) -> Result<ReconciliationReport, PollError> {
    let key_columns = resolve_keys(a, b, schema, keys)?;
    let key_a: Vec<usize> = key_columns
        .iter()
        .map(|c| a.require_column(c))
        .collect::<Result<_, _>>()?;
    let key_b: Vec<usize> = key_columns
        .iter()
        .map(|c| b.require_column(c))
        .collect::<Result<_, _>>()?;
    let cols_a = schema.resolve(a)?;
    let verdict_a_idx = a.require_column(&schema.verdict)?;
    let verdict_b_idx = b.require_column(&schema.verdict)?;
    debug!("reconcile: key columns: {:?}", key_columns);

    let mut index_b: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
    for (idx, row) in b.rows().iter().enumerate() {
        let key: Vec<&str> = key_b.iter().map(|&c| row[c].as_str()).collect();
        index_b.entry(key).or_default().push(idx);
    }

    let mut questions: Vec<QuestionPairs> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut joined_b: HashSet<usize> = HashSet::new();
    let mut unjoined_a = 0;
    for (ia, row_a) in a.rows().iter().enumerate() {
        let key: Vec<&str> = key_a.iter().map(|&c| row_a[c].as_str()).collect();
        let partners = match index_b.get(&key) {
            Some(p) => p,
            None => {
                unjoined_a += 1;
                continue;
            }
        };
        let qid = row_a[cols_a.question_id].as_str();
        let pos = *positions.entry(qid).or_insert_with(|| {
            questions.push(QuestionPairs {
                question_id: qid.to_string(),
                verdict_a: None,
                verdict_b: None,
                inconsistent_a: false,
                inconsistent_b: false,
                rows_a: Vec::new(),
            });
            questions.len() - 1
        });
        let va = parse_verdict(&row_a[verdict_a_idx], ia)?;
        let q = &mut questions[pos];
        q.rows_a.push(ia);
        for &ib in partners.iter() {
            joined_b.insert(ib);
            let vb = parse_verdict(&b.rows()[ib][verdict_b_idx], ib)?;
            record(&mut q.verdict_a, &mut q.inconsistent_a, va);
            record(&mut q.verdict_b, &mut q.inconsistent_b, vb);
        }
    }
    let unjoined_b = b.len() - joined_b.len();

    let mut disagreements: Vec<DisagreementGroup> = Vec::new();
    let mut unclassified: Vec<String> = Vec::new();
    let mut inconsistent: Vec<InconsistentVerdicts> = Vec::new();
    let mut matches = 0;
    for q in questions.iter() {
        if q.inconsistent_a {
            inconsistent.push(InconsistentVerdicts {
                question_id: q.question_id.clone(),
                side: Side::A,
            });
        }
        if q.inconsistent_b {
            inconsistent.push(InconsistentVerdicts {
                question_id: q.question_id.clone(),
                side: Side::B,
            });
        }
        let va = q.verdict_a.flatten();
        let vb = q.verdict_b.flatten();
        match (va, vb) {
            (Some(x), Some(y)) if x == y => matches += 1,
            _ => {
                if va.is_none() || vb.is_none() {
                    unclassified.push(q.question_id.clone());
                }
                let first = &a.rows()[q.rows_a[0]];
                disagreements.push(DisagreementGroup {
                    question_id: q.question_id.clone(),
                    question_text: first[cols_a.question_text].clone(),
                    responses: q
                        .rows_a
                        .iter()
                        .map(|&ia| {
                            let row = &a.rows()[ia];
                            Response {
                                text: row[cols_a.response_text].clone(),
                                percentage: Percentage::parse(&row[cols_a.response_pct]),
                            }
                        })
                        .collect(),
                    verdict_a: va,
                    verdict_b: vb,
                });
            }
        }
    }

    let total_questions = questions.len();
    let compared = total_questions - unclassified.len();
    let agreement_rate = if total_questions == 0 {
        None
    } else {
        Some(matches as f64 / total_questions as f64 * 100.0)
    };
    if unjoined_a > 0 || unjoined_b > 0 {
        warn!(
            "reconcile: {} rows of the first dataset and {} rows of the second did not join",
            unjoined_a, unjoined_b
        );
    }
    for iv in inconsistent.iter() {
        warn!(
            "reconcile: question {} has several verdicts on side {:?}",
            iv.question_id, iv.side
        );
    }
    info!(
        "Reconciled {} questions: {} matches, {} disagreements, {} unclassified",
        total_questions,
        matches,
        disagreements.len(),
        unclassified.len()
    );
    Ok(ReconciliationReport {
        key_columns,
        total_questions,
        compared,
        matches,
        agreement_rate,
        disagreements,
        unclassified,
        inconsistent,
        unjoined_a,
        unjoined_b,
    })
}

// The first value read is kept, an empty cell included. Any later value
// that differs from it marks the side as inconsistent.
fn record(current: &mut Option<Option<bool>>, inconsistent: &mut bool, value: Option<bool>) {
    match *current {
        None => *current = Some(value),
        Some(first) if first != value => *inconsistent = true,
        _ => {}
    }
}

// The question id always comes first in the key.
fn resolve_keys(
    a: &Table,
    b: &Table,
    schema: &PollSchema,
    keys: &KeyColumns,
) -> Result<Vec<String>, PollError> {
    let requested: Vec<String> = match (keys, &schema.descriptive) {
        (KeyColumns::Named(l), _) => l.clone(),
        (KeyColumns::Shared, Some(l)) => l.clone(),
        (KeyColumns::Shared, None) => a
            .columns()
            .iter()
            .filter(|c| **c != schema.verdict && b.column_index(c).is_some())
            .cloned()
            .collect(),
    };
    let mut res: Vec<String> = vec![schema.question_id.clone()];
    for c in requested {
        if !res.contains(&c) {
            res.push(c);
        }
    }
    Ok(res)
}
