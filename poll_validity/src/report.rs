use std::fmt::Write;

use crate::reconcile::{ReconciliationReport, Side};

/// Renders the report as text. The labels name the two datasets, for
/// example `llm` and `final`.
pub fn render_text(report: &ReconciliationReport, label_a: &str, label_b: &str) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, report, label_a, label_b);
    out
}

fn write_report(
    out: &mut String,
    report: &ReconciliationReport,
    label_a: &str,
    label_b: &str,
) -> std::fmt::Result {
    if !report.disagreements.is_empty() {
        writeln!(out, "Disagreements:")?;
        for d in report.disagreements.iter() {
            writeln!(out)?;
            writeln!(out, "QuestionID: {}", d.question_id)?;
            writeln!(out, "QuestionTxt: {}", d.question_text)?;
            writeln!(out, "Responses:")?;
            for r in d.responses.iter() {
                writeln!(out, "{} ({}%)", r.text, r.percentage)?;
            }
            writeln!(out, "isValid_{}: {}", label_a, verdict_text(d.verdict_a))?;
            writeln!(out, "isValid_{}: {}", label_b, verdict_text(d.verdict_b))?;
        }
        writeln!(out)?;
    }

    match report.agreement_rate {
        Some(rate) => writeln!(out, "Success Rate: {:.2}%", rate)?,
        None => writeln!(out, "Success Rate: n/a (no question to compare)")?,
    }
    writeln!(out, "Number of errors: {}", report.errors())?;
    writeln!(out, "Total questions: {}", report.total_questions)?;

    if !report.unclassified.is_empty() {
        writeln!(
            out,
            "Unclassified questions: {} ({})",
            report.unclassified.len(),
            report.unclassified.join(", ")
        )?;
    }
    for iv in report.inconsistent.iter() {
        let label = match iv.side {
            Side::A => label_a,
            Side::B => label_b,
        };
        writeln!(
            out,
            "Inconsistent verdicts: {} in {}",
            iv.question_id, label
        )?;
    }
    if report.has_join_failures() {
        writeln!(
            out,
            "Unjoined rows: {} in {}, {} in {}",
            report.unjoined_a, label_a, report.unjoined_b, label_b
        )?;
    }
    Ok(())
}

fn verdict_text(v: Option<bool>) -> &'static str {
    match v {
        Some(true) => "true",
        Some(false) => "false",
        None => "missing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{reconcile, KeyColumns};
    use crate::table::tests::table;
    use crate::table::PollSchema;

    const COLUMNS: &[&str] = &["QuestionID", "QuestionTxt", "RespTxt", "RespPct", "isValid"];

    #[test]
    fn text_report() {
        let llm = table(
            COLUMNS,
            &[
                &["Q1", "Whom do you prefer?", "Roosevelt", "49", "true"],
                &["Q2", "Who will win?", "Landon", "36", "false"],
                &["Q2", "Who will win?", "Others", "*", "false"],
            ],
        );
        let fin = table(
            COLUMNS,
            &[
                &["Q1", "Whom do you prefer?", "Roosevelt", "49", "true"],
                &["Q2", "Who will win?", "Landon", "36", "true"],
                &["Q2", "Who will win?", "Others", "*", "true"],
            ],
        );
        let report = reconcile(&llm, &fin, &PollSchema::default(), &KeyColumns::Shared).unwrap();
        let text = render_text(&report, "llm", "final");
        let expected = "Disagreements:

QuestionID: Q2
QuestionTxt: Who will win?
Responses:
Landon (36%)
Others (*%)
isValid_llm: false
isValid_final: true

Success Rate: 50.00%
Number of errors: 1
Total questions: 2
";
        assert_eq!(text, expected);
    }

    #[test]
    fn missing_verdict_is_an_error() {
        let llm = table(
            COLUMNS,
            &[
                &["Q1", "Whom do you prefer?", "Roosevelt", "49", "true"],
                &["Q2", "Who will win?", "Landon", "36", "true"],
            ],
        );
        let fin = table(
            COLUMNS,
            &[
                &["Q1", "Whom do you prefer?", "Roosevelt", "49", ""],
                &["Q2", "Who will win?", "Landon", "36", "true"],
            ],
        );
        let report = reconcile(&llm, &fin, &PollSchema::default(), &KeyColumns::Shared).unwrap();
        let text = render_text(&report, "llm", "final");
        assert!(text.contains("isValid_llm: true\nisValid_final: missing\n"));
        assert!(text.contains("Success Rate: 50.00%\nNumber of errors: 1\nTotal questions: 2\n"));
        assert!(text.contains("Unclassified questions: 1 (Q1)"));
    }

    #[test]
    fn json_report() {
        let t = table(COLUMNS, &[&["Q1", "T", "A", "1", "true"]]);
        let report = reconcile(&t, &t, &PollSchema::default(), &KeyColumns::Shared).unwrap();
        let js = serde_json::to_value(&report).unwrap();
        assert_eq!(js["agreementRate"], 100.0);
        assert_eq!(js["totalQuestions"], 1);
        assert_eq!(js["unjoinedA"], 0);
        assert!(js["disagreements"].as_array().unwrap().is_empty());
    }

    #[test]
    fn text_report_lists_join_failures() {
        let a = table(COLUMNS, &[&["Q1", "T", "A", "1", "true"]]);
        let b = table(COLUMNS, &[&["Q1", "T", "A", "2", ""]]);
        let report = reconcile(&a, &b, &PollSchema::default(), &KeyColumns::Shared).unwrap();
        let text = render_text(&report, "llm", "final");
        assert!(text.contains("Success Rate: n/a"));
        assert!(text.contains("Unjoined rows: 1 in llm, 1 in final"));
    }
}
