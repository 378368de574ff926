// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The share of respondents that selected a response.
///
/// Poll archives report a trace amount (less than half a percent) with a
/// `*` sentinel instead of a number. Anything else that does not read as a
/// number is kept verbatim so that it can be written back unchanged.
#[derive(PartialEq, Debug, Clone)]
pub enum Percentage {
    Numeric(f64),
    /// Reported, but below the measurable threshold.
    BelowThreshold,
    Unreported(String),
}

impl Percentage {
    pub const BELOW_THRESHOLD_MARKER: &'static str = "*";

    pub fn parse(s: &str) -> Percentage {
        let trimmed = s.trim();
        if trimmed == Percentage::BELOW_THRESHOLD_MARKER {
            return Percentage::BelowThreshold;
        }
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        match number.parse::<f64>() {
            Ok(x) if x.is_finite() => Percentage::Numeric(x),
            _ => Percentage::Unreported(trimmed.to_string()),
        }
    }

    /// A value usable in sums: trace amounts count as zero, and so does
    /// anything that was not reported as a number.
    pub fn value_or_zero(&self) -> f64 {
        match self {
            Percentage::Numeric(x) => *x,
            Percentage::BelowThreshold | Percentage::Unreported(_) => 0.0,
        }
    }

    /// True for numbers and for the trace sentinel.
    pub fn is_reported(&self) -> bool {
        !matches!(self, Percentage::Unreported(_))
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Percentage::Numeric(x) => write!(f, "{}", x),
            Percentage::BelowThreshold => write!(f, "{}", Percentage::BELOW_THRESHOLD_MARKER),
            Percentage::Unreported(s) => write!(f, "{}", s),
        }
    }
}

// Serialized as text, the way the archives write it.
impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum TextOrNumber {
            Text(String),
            Number(f64),
        }
        Ok(match TextOrNumber::deserialize(deserializer)? {
            TextOrNumber::Text(s) => Percentage::parse(&s),
            TextOrNumber::Number(x) => Percentage::Numeric(x),
        })
    }
}

/// One named option of a question.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "responseText")]
    pub text: String,
    #[serde(rename = "responsePct")]
    pub percentage: Percentage,
}

/// A poll question with all its responses, in the order they were read.
#[derive(PartialEq, Debug, Clone)]
pub struct PollQuestion {
    pub question_id: String,
    pub question_text: String,
    pub begin_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    // Invariant: never empty when produced by the grouper.
    pub responses: Vec<Response>,
}

/// The canonical candidates of one election.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateSet {
    year: i32,
    candidates: Vec<String>,
}

impl CandidateSet {
    /// At least two distinct, non-empty names are required: a head-to-head
    /// poll needs two candidates to compare.
    pub fn new(year: i32, candidates: &[String]) -> Result<CandidateSet, PollError> {
        let mut names: Vec<String> = Vec::new();
        for c in candidates.iter() {
            let name = c.trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        if names.len() < 2 {
            return Err(PollError::NotEnoughCandidates { found: names.len() });
        }
        Ok(CandidateSet {
            year,
            candidates: names,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

// ******** Output data structures *********

/// The judgment of the classifier for one question.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Verdict {
    pub question_id: String,
    pub is_valid: bool,
}

/// A question on which two datasets do not agree.
///
/// A missing verdict never agrees with anything, another missing verdict
/// included.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisagreementGroup {
    pub question_id: String,
    pub question_text: String,
    pub responses: Vec<Response>,
    pub verdict_a: Option<bool>,
    pub verdict_b: Option<bool>,
}

/// Errors that prevent an operation from completing.
///
/// Problems that only affect part of a run (a batch that failed to parse, a
/// verdict for an unknown question, rows that did not join) are not errors:
/// they are returned as data alongside the results.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PollError {
    /// A column required by the schema is absent.
    MissingColumn { column: String },
    /// A row does not have as many cells as the header.
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A verdict cell that is neither a boolean nor empty.
    InvalidVerdict { row: usize, value: String },
    NotEnoughCandidates { found: usize },
    InvalidBatchSize,
    /// A prompt template that does not embed a required placeholder.
    MissingPlaceholder { placeholder: String },
}

impl Error for PollError {}

impl Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::MissingColumn { column } => write!(f, "missing required column {:?}", column),
            PollError::RaggedRow {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {} has {} cells, the header has {} columns",
                row, found, expected
            ),
            PollError::InvalidVerdict { row, value } => {
                write!(f, "row {}: cannot read verdict {:?}", row, value)
            }
            PollError::NotEnoughCandidates { found } => write!(
                f,
                "at least two distinct candidates are required, found {}",
                found
            ),
            PollError::InvalidBatchSize => write!(f, "the batch size must be at least 1"),
            PollError::MissingPlaceholder { placeholder } => {
                write!(f, "the prompt template does not contain {}", placeholder)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_sentinel() {
        assert_eq!(Percentage::parse("*"), Percentage::BelowThreshold);
        assert_eq!(Percentage::parse(" 49 "), Percentage::Numeric(49.0));
        assert_eq!(Percentage::parse("0.5%"), Percentage::Numeric(0.5));
        assert_eq!(
            Percentage::parse("n/a"),
            Percentage::Unreported("n/a".to_string())
        );
        assert_eq!(Percentage::parse(""), Percentage::Unreported("".to_string()));
        assert!(!Percentage::parse("NaN").is_reported());
    }

    #[test]
    fn percentage_sums() {
        let total: f64 = ["49", "44", "*", "x"]
            .iter()
            .map(|s| Percentage::parse(s).value_or_zero())
            .sum();
        assert_eq!(total, 93.0);
    }

    #[test]
    fn percentage_display() {
        assert_eq!(Percentage::parse("49").to_string(), "49");
        assert_eq!(Percentage::parse("*").to_string(), "*");
        assert_eq!(Percentage::parse("12.5").to_string(), "12.5");
    }

    #[test]
    fn response_json() {
        let r = Response {
            text: "Others".to_string(),
            percentage: Percentage::BelowThreshold,
        };
        let js = serde_json::to_string(&r).unwrap();
        assert_eq!(js, r#"{"responseText":"Others","responsePct":"*"}"#);
        let back: Response = serde_json::from_str(r#"{"responseText":"A","responsePct":44}"#).unwrap();
        assert_eq!(back.percentage, Percentage::Numeric(44.0));
    }

    #[test]
    fn candidate_set_needs_two() {
        let one = vec!["Alf Landon".to_string(), " Alf Landon ".to_string()];
        assert_eq!(
            CandidateSet::new(1936, &one),
            Err(PollError::NotEnoughCandidates { found: 1 })
        );
        let two = vec!["Franklin D. Roosevelt".to_string(), "Alf Landon".to_string()];
        let cs = CandidateSet::new(1936, &two).unwrap();
        assert_eq!(cs.year(), 1936);
        assert_eq!(cs.candidates(), &two[..]);
    }
}
