use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use log::debug;

use crate::config::*;
use crate::table::{parse_date, PollSchema, Table};

/// The order in which the rows are visited before grouping.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum GroupOrder {
    /// The order of the file.
    Input,
    /// Sorted by begin date, end date and question id. Rows without a
    /// readable date come last. The sort is stable.
    ByDates,
}

/// Groups per-response rows into questions.
///
/// Questions appear in the order of their first row. The text and the dates
/// of a question are taken from that first row; later rows are not checked
/// against it.
pub fn group(
    table: &Table,
    schema: &PollSchema,
    order: GroupOrder,
) -> Result<Vec<PollQuestion>, PollError> {
    let cols = schema.resolve(table)?;
    let rows = table.rows();

    let date_at = |row: &[String], col: Option<usize>| -> Option<NaiveDate> {
        col.and_then(|c| parse_date(&row[c]))
    };

    let mut row_order: Vec<usize> = (0..rows.len()).collect();
    if order == GroupOrder::ByDates {
        let keys: Vec<(Option<NaiveDate>, Option<NaiveDate>)> = rows
            .iter()
            .map(|r| (date_at(r, cols.begin_date), date_at(r, cols.end_date)))
            .collect();
        row_order.sort_by(|&a, &b| {
            cmp_dates(keys[a].0, keys[b].0)
                .then(cmp_dates(keys[a].1, keys[b].1))
                .then_with(|| rows[a][cols.question_id].cmp(&rows[b][cols.question_id]))
        });
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut questions: Vec<PollQuestion> = Vec::new();
    for idx in row_order {
        let row = &rows[idx];
        let question_id = row[cols.question_id].as_str();
        let response = Response {
            text: row[cols.response_text].clone(),
            percentage: Percentage::parse(&row[cols.response_pct]),
        };
        match positions.get(question_id) {
            Some(&pos) => questions[pos].responses.push(response),
            None => {
                positions.insert(question_id, questions.len());
                questions.push(PollQuestion {
                    question_id: question_id.to_string(),
                    question_text: row[cols.question_text].clone(),
                    begin_date: date_at(row, cols.begin_date),
                    end_date: date_at(row, cols.end_date),
                    responses: vec![response],
                });
            }
        }
    }
    debug!(
        "group: {} rows grouped into {} questions",
        rows.len(),
        questions.len()
    );
    Ok(questions)
}

/// The inverse of grouping: one (question id, question text, response) per
/// response.
pub fn flatten(questions: &[PollQuestion]) -> Vec<(String, String, Response)> {
    questions
        .iter()
        .flat_map(|q| {
            q.responses
                .iter()
                .map(move |r| (q.question_id.clone(), q.question_text.clone(), r.clone()))
        })
        .collect()
}

fn cmp_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::table;

    const COLUMNS: &[&str] = &[
        "QuestionID",
        "QuestionTxt",
        "RespTxt",
        "RespPct",
        "BegDate",
        "SurveyOrg",
    ];

    fn sample() -> Table {
        table(
            COLUMNS,
            &[
                &["Q2", "Who will win?", "Landon", "36", "1936-09-28", "Gallup"],
                &["Q1", "Whom do you prefer?", "Roosevelt", "49", "1936-08-24", "Gallup"],
                &["Q2", "Who will win?", "Roosevelt", "63", "1936-09-28", "Gallup"],
                &["Q1", "Whom do you prefer?", "Landon", "44", "1936-08-24", "Gallup"],
                &["Q1", "Whom do you prefer?", "Others", "*", "1936-08-24", "Gallup"],
                &["Q3", "Undated", "Thomas", "1", "", "Gallup"],
            ],
        )
    }

    #[test]
    fn groups_in_order_of_first_appearance() {
        let qs = group(&sample(), &PollSchema::default(), GroupOrder::Input).unwrap();
        let ids: Vec<&str> = qs.iter().map(|q| q.question_id.as_str()).collect();
        assert_eq!(ids, vec!["Q2", "Q1", "Q3"]);
        let q1 = &qs[1];
        assert_eq!(q1.question_text, "Whom do you prefer?");
        assert_eq!(q1.begin_date, NaiveDate::from_ymd_opt(1936, 8, 24));
        assert_eq!(q1.end_date, None);
        let texts: Vec<&str> = q1.responses.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Roosevelt", "Landon", "Others"]);
        assert_eq!(q1.responses[2].percentage, Percentage::BelowThreshold);
    }

    #[test]
    fn groups_by_dates() {
        let qs = group(&sample(), &PollSchema::default(), GroupOrder::ByDates).unwrap();
        let ids: Vec<&str> = qs.iter().map(|q| q.question_id.as_str()).collect();
        assert_eq!(ids, vec!["Q1", "Q2", "Q3"]);
        // The sort is stable: responses keep their relative order.
        let texts: Vec<&str> = qs[1].responses.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Landon", "Roosevelt"]);
    }

    #[test]
    fn first_row_wins_on_conflicting_text() {
        let t = table(
            &["QuestionID", "QuestionTxt", "RespTxt", "RespPct"],
            &[&["Q1", "first", "A", "1"], &["Q1", "second", "B", "2"]],
        );
        let qs = group(&t, &PollSchema::default(), GroupOrder::Input).unwrap();
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].question_text, "first");
        assert_eq!(qs[0].responses.len(), 2);
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let t = table(&["QuestionID", "QuestionTxt", "RespPct"], &[]);
        let res = group(&t, &PollSchema::default(), GroupOrder::Input);
        assert_eq!(
            res,
            Err(PollError::MissingColumn {
                column: "RespTxt".to_string()
            })
        );
    }

    #[test]
    fn grouping_is_deterministic() {
        for order in [GroupOrder::Input, GroupOrder::ByDates] {
            let first = group(&sample(), &PollSchema::default(), order).unwrap();
            let second = group(&sample(), &PollSchema::default(), order).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn flatten_recovers_the_rows() {
        let t = sample();
        let qs = group(&t, &PollSchema::default(), GroupOrder::ByDates).unwrap();
        let mut flat: Vec<(String, String, String, String)> = flatten(&qs)
            .into_iter()
            .map(|(id, txt, r)| (id, txt, r.text, r.percentage.to_string()))
            .collect();
        let mut original: Vec<(String, String, String, String)> = t
            .rows()
            .iter()
            .map(|r| (r[0].clone(), r[1].clone(), r[2].clone(), r[3].clone()))
            .collect();
        flat.sort();
        original.sort();
        assert_eq!(flat, original);
    }
}
