//! The boundary with the human reviewer.
//!
//! The reviewer works on one item per question and hands back the same
//! items with possibly changed verdicts. How the items are edited is not
//! the concern of this crate.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::*;
use crate::grouper::{group, GroupOrder};
use crate::merger::{merge, MergeOutcome, MergePolicy};
use crate::table::{parse_verdict, PollSchema, Table};

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub question_id: String,
    pub question_text: String,
    pub responses: Vec<Response>,
    pub is_valid: Option<bool>,
}

/// One item per question of a merged table, in order of first appearance.
/// The verdict is read from the first row of the question.
pub fn review_items(table: &Table, schema: &PollSchema) -> Result<Vec<ReviewItem>, PollError> {
    let questions = group(table, schema, GroupOrder::Input)?;
    let qid_idx = table.require_column(&schema.question_id)?;
    let verdict_idx = table.column_index(&schema.verdict);

    let mut first_verdict: HashMap<&str, Option<bool>> = HashMap::new();
    if let Some(vidx) = verdict_idx {
        for (idx, row) in table.rows().iter().enumerate() {
            if !first_verdict.contains_key(row[qid_idx].as_str()) {
                let v = parse_verdict(&row[vidx], idx)?;
                first_verdict.insert(row[qid_idx].as_str(), v);
            }
        }
    }

    let items: Vec<ReviewItem> = questions
        .into_iter()
        .map(|q| ReviewItem {
            is_valid: first_verdict
                .get(q.question_id.as_str())
                .copied()
                .flatten(),
            question_id: q.question_id,
            question_text: q.question_text,
            responses: q.responses,
        })
        .collect();
    debug!("review_items: {} items", items.len());
    Ok(items)
}

/// Writes the reviewed verdicts onto every row of their question. Rows of
/// questions left without a verdict are kept with an empty cell.
pub fn apply_review(
    table: &Table,
    schema: &PollSchema,
    items: &[ReviewItem],
) -> Result<MergeOutcome, PollError> {
    let verdicts: Vec<Verdict> = items
        .iter()
        .filter_map(|item| {
            item.is_valid.map(|is_valid| Verdict {
                question_id: item.question_id.clone(),
                is_valid,
            })
        })
        .collect();
    merge(table, schema, &verdicts, MergePolicy::KeepUnmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::table;

    fn merged() -> Table {
        table(
            &["QuestionID", "QuestionTxt", "RespTxt", "RespPct", "isValid"],
            &[
                &["Q1", "Whom do you prefer?", "Roosevelt", "49", "true"],
                &["Q1", "Whom do you prefer?", "Landon", "44", "true"],
                &["Q2", "Who will win?", "Landon", "36", ""],
            ],
        )
    }

    #[test]
    fn items_per_question() {
        let items = review_items(&merged(), &PollSchema::default()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].question_id, "Q1");
        assert_eq!(items[0].responses.len(), 2);
        assert_eq!(items[0].is_valid, Some(true));
        assert_eq!(items[1].is_valid, None);
    }

    #[test]
    fn items_without_verdict_column() {
        let t = table(
            &["QuestionID", "QuestionTxt", "RespTxt", "RespPct"],
            &[&["Q1", "T", "A", "1"]],
        );
        let items = review_items(&t, &PollSchema::default()).unwrap();
        assert_eq!(items[0].is_valid, None);
    }

    #[test]
    fn reviewed_verdicts_are_written_back() {
        let schema = PollSchema::default();
        let mut items = review_items(&merged(), &schema).unwrap();
        items[0].is_valid = Some(false);
        items[1].is_valid = Some(false);
        let out = apply_review(&merged(), &schema, &items).unwrap();
        assert_eq!(out.table.columns().len(), 5);
        let cells: Vec<&str> = out.table.rows().iter().map(|r| r[4].as_str()).collect();
        assert_eq!(cells, vec!["false", "false", "false"]);
        assert!(out.unclassified.is_empty());
    }

    #[test]
    fn items_survive_json() {
        let items = review_items(&merged(), &PollSchema::default()).unwrap();
        let js = serde_json::to_string(&items).unwrap();
        assert!(js.contains(r#""isValid":true"#));
        let back: Vec<ReviewItem> = serde_json::from_str(&js).unwrap();
        assert_eq!(back, items);
    }
}
