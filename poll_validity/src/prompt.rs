//! Versioned instruction templates for the classification service.
//!
//! A template is data: a version tag and a body with `{year}` and
//! `{candidates}` placeholders. Building an instruction is a pure function
//! of the template and the candidate set.

use std::borrow::Cow;

use crate::config::{CandidateSet, PollError};

pub const YEAR_PLACEHOLDER: &str = "{year}";
pub const CANDIDATES_PLACEHOLDER: &str = "{candidates}";

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PromptTemplate {
    version: Cow<'static, str>,
    body: Cow<'static, str>,
}

/// The text sent to the service along with every batch.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Instruction {
    pub text: String,
    pub version: String,
    /// SHA-256 of the text.
    pub fingerprint: String,
}

impl PromptTemplate {
    pub const DEFAULT: PromptTemplate = PromptTemplate {
        version: Cow::Borrowed("head-to-head-v2"),
        body: Cow::Borrowed(HEAD_TO_HEAD_V2),
    };

    /// A template loaded from elsewhere. It must at least embed the
    /// candidate list.
    pub fn custom(
        version: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<PromptTemplate, PollError> {
        let body: String = body.into();
        if !body.contains(CANDIDATES_PLACEHOLDER) {
            return Err(PollError::MissingPlaceholder {
                placeholder: CANDIDATES_PLACEHOLDER.to_string(),
            });
        }
        Ok(PromptTemplate {
            version: Cow::Owned(version.into()),
            body: Cow::Owned(body),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn build(&self, candidates: &CandidateSet) -> Instruction {
        let text = self
            .body
            .replace(YEAR_PLACEHOLDER, &candidates.year().to_string())
            .replace(CANDIDATES_PLACEHOLDER, &candidates.candidates().join(", "));
        let fingerprint = sha256::digest(text.as_str());
        Instruction {
            text,
            version: self.version.to_string(),
            fingerprint,
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        PromptTemplate::DEFAULT
    }
}

/// Builds the instruction with the default template.
pub fn build(candidates: &CandidateSet) -> Instruction {
    PromptTemplate::DEFAULT.build(candidates)
}

const HEAD_TO_HEAD_V2: &str = r#"You are a polling analyst for the {year} presidential election between the following candidates: {candidates}.
Your task is to determine whether each given poll is a valid general election poll between the specified candidates.

A poll is valid only if all of the following hold:
1. It asks respondents directly who they would vote for, prefer or support in the {year} presidential election.
2. It has numerical percentages for at least two different response options.
3. It includes at least two of the following candidates in the response options: {candidates}.
4. It does not rest on implausible or off-topic hypothetical scenarios.
   - A hypothetical matchup between candidates who have not yet announced their candidacy is valid.
   - A scenario about external events (a war, an economic change) is not valid.
   - A ticket with vice presidential candidates who were not the actual running mates is not valid.

Exclude polls that:
1. Ask which candidate will win, rather than who the respondent would vote for.
2. Ask about favorable media coverage.
3. Ask which candidate is more trustworthy, is a better leader, or would handle an issue better.
4. Have only one response option, or no numerical percentages.
5. Do not include at least two of the specified candidates in the response options.
6. Name candidates in the question that differ from the candidates in the response options.
7. Offer several candidates of the same party for the same office.

The input is a JSON array of polls:
[{"questionId": string, "questionText": string, "responses": [{"responseText": string, "responsePct": string}]}]
A responsePct of "*" means less than half a percent.

Examples:

Input:
[
    {"questionId": "USGALLUP.090636.R01", "questionText": "Whom do you prefer for President?", "responses": [{"responseText": "Roosevelt", "responsePct": "49"}, {"responseText": "Landon", "responsePct": "44"}, {"responseText": "Lemke", "responsePct": "5"}, {"responseText": "Thomas", "responsePct": "1"}, {"responseText": "Others", "responsePct": "*"}]},
    {"questionId": "USGALLUP.36-053.Q4B", "questionText": "WHICH (1936 PRESIDENTIAL) CANDIDATE DO YOU THINK WILL WIN IN YOUR STATE?", "responses": [{"responseText": "LANDON", "responsePct": "36"}, {"responseText": "ROOSEVELT", "responsePct": "63"}, {"responseText": "LEMKE", "responsePct": "1"}]},
    {"questionId": "USPR.56.R03", "questionText": "If President Roosevelt runs for a third term on the Democratic ticket against Wendell Willkie on the Republican ticket, which one would you prefer?", "responses": [{"responseText": "Roosevelt", "responsePct": "53"}, {"responseText": "Dewey", "responsePct": "25"}, {"responseText": "No opinion", "responsePct": "23"}]},
    {"questionId": "USGALLUP.40-203.QK02", "questionText": "If the Presidential election were held today, would you vote for the Republican ticket of Willkie and McNary, or the Democratic ticket of Roosevelt and Wallace?", "responses": [{"responseText": "Willkie and McNary", "responsePct": "43"}, {"responseText": "Roosevelt and Wallace", "responsePct": "42"}, {"responseText": "Other", "responsePct": "*"}, {"responseText": "Undecided", "responsePct": "14"}]},
    {"questionId": "USGALLUP.44-319.QT04A", "questionText": "Will you look over all these possible candidates and tell me which one man you'd like to see as the next President of the United States?", "responses": [{"responseText": "Hull", "responsePct": "3"}, {"responseText": "Roosevelt", "responsePct": "48"}, {"responseText": "Wallace", "responsePct": "2"}, {"responseText": "Dewey", "responsePct": "36"}, {"responseText": "Bricker", "responsePct": "7"}, {"responseText": "Stassen", "responsePct": "5"}]}
]

Output:
[
    {"questionId": "USGALLUP.090636.R01", "isValid": true},
    {"questionId": "USGALLUP.36-053.Q4B", "isValid": false},
    {"questionId": "USPR.56.R03", "isValid": false},
    {"questionId": "USGALLUP.40-203.QK02", "isValid": true},
    {"questionId": "USGALLUP.44-319.QT04A", "isValid": false}
]

The first poll asks for a preference between the candidates. The second asks who will win. The third names Willkie in the question but offers Dewey in the responses. The fourth matches its question. The fifth offers several candidates of the same party.
These reasons are for your understanding only. Do not include any explanation in your output.

Output contract: return a JSON array with exactly one object per input poll, in the input order. Each object has exactly two keys:
{"questionId": string, "isValid": boolean}
Do not add any other key or any text outside the JSON array."#;

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> CandidateSet {
        CandidateSet::new(
            1936,
            &["Franklin D. Roosevelt".to_string(), "Alf Landon".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn embeds_the_candidates_and_the_year() {
        let inst = build(&candidates());
        assert!(inst
            .text
            .contains("between the following candidates: Franklin D. Roosevelt, Alf Landon."));
        assert!(inst.text.contains("the 1936 presidential election"));
        assert!(!inst.text.contains(CANDIDATES_PLACEHOLDER));
        assert!(!inst.text.contains(YEAR_PLACEHOLDER));
        assert!(inst.text.contains(r#"{"questionId": string, "isValid": boolean}"#));
        assert_eq!(inst.version, "head-to-head-v2");
    }

    #[test]
    fn build_is_deterministic() {
        let a = build(&candidates());
        let b = build(&candidates());
        assert_eq!(a, b);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn fingerprint_follows_the_candidates() {
        let other = CandidateSet::new(
            1940,
            &["Franklin D. Roosevelt".to_string(), "Wendell Willkie".to_string()],
        )
        .unwrap();
        assert_ne!(build(&candidates()).fingerprint, build(&other).fingerprint);
    }

    #[test]
    fn custom_templates() {
        let t = PromptTemplate::custom("short-v1", "Polls for {year}: {candidates}").unwrap();
        let inst = t.build(&candidates());
        assert_eq!(inst.text, "Polls for 1936: Franklin D. Roosevelt, Alf Landon");
        assert_eq!(inst.version, "short-v1");

        assert_eq!(
            PromptTemplate::custom("broken", "Polls for {year}"),
            Err(PollError::MissingPlaceholder {
                placeholder: "{candidates}".to_string()
            })
        );
    }
}
