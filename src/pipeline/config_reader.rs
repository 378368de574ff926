use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;
use poll_validity::*;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::pipeline::gemini::GeminiSettings;
use crate::pipeline::io_common::resolve_path;
use crate::pipeline::*;

/// Overrides of the column names of the poll files.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnNames {
    #[serde(rename = "questionId")]
    pub question_id: Option<String>,
    #[serde(rename = "questionText")]
    pub question_text: Option<String>,
    #[serde(rename = "responseText")]
    pub response_text: Option<String>,
    #[serde(rename = "responsePct")]
    pub response_pct: Option<String>,
    #[serde(rename = "beginDate")]
    pub begin_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub verdict: Option<String>,
    pub descriptive: Option<Vec<String>>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,
    pub temperature: Option<f64>,
    #[serde(rename = "topP")]
    pub top_p: Option<f64>,
    #[serde(rename = "topK")]
    pub top_k: Option<u32>,
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: Option<u32>,
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(rename = "maxAttempts")]
    pub max_attempts: Option<u32>,
    #[serde(rename = "backoffMillis")]
    pub backoff_millis: Option<u64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub year: i32,
    pub candidates: Vec<String>,
    #[serde(rename = "inputFile")]
    pub input_file: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
    #[serde(rename = "batchSize")]
    pub batch_size: Option<usize>,
    #[serde(rename = "dropUnmatched")]
    pub drop_unmatched: Option<bool>,
    #[serde(rename = "sortByDates")]
    pub sort_by_dates: Option<bool>,
    #[serde(rename = "electionWindow")]
    pub election_window: Option<bool>,
    pub columns: Option<ColumnNames>,
    #[serde(rename = "promptTemplateFile")]
    pub prompt_template_file: Option<String>,
    #[serde(rename = "promptVersion")]
    pub prompt_version: Option<String>,
    pub service: Option<ServiceSettings>,
    pub retry: Option<RetrySettings>,
}

pub fn read_config(path: &str) -> PipelineResult<RunConfig> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    let config: RunConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

impl RunConfig {
    pub fn candidate_set(&self) -> PipelineResult<CandidateSet> {
        CandidateSet::new(self.year, &self.candidates).context(InvalidConfigSnafu {})
    }

    pub fn schema(&self) -> PollSchema {
        let mut schema = PollSchema::default();
        if let Some(c) = &self.columns {
            let set = |target: &mut String, value: &Option<String>| {
                if let Some(v) = value {
                    *target = v.clone();
                }
            };
            set(&mut schema.question_id, &c.question_id);
            set(&mut schema.question_text, &c.question_text);
            set(&mut schema.response_text, &c.response_text);
            set(&mut schema.response_pct, &c.response_pct);
            set(&mut schema.verdict, &c.verdict);
            if c.begin_date.is_some() {
                schema.begin_date = c.begin_date.clone();
            }
            if c.end_date.is_some() {
                schema.end_date = c.end_date.clone();
            }
            schema.descriptive = c.descriptive.clone();
        }
        schema
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::DEFAULT;
        match &self.retry {
            None => default,
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.unwrap_or(default.max_attempts),
                backoff: r
                    .backoff_millis
                    .map(Duration::from_millis)
                    .unwrap_or(default.backoff),
            },
        }
    }

    /// The default template, or the one read from `promptTemplateFile`.
    pub fn prompt_template(&self, root: &Path) -> PipelineResult<PromptTemplate> {
        match &self.prompt_template_file {
            None => Ok(PromptTemplate::DEFAULT),
            Some(p) => {
                let path = resolve_path(root, p);
                let body = fs::read_to_string(&path).context(ReadingFileSnafu { path: &path })?;
                let version = self.prompt_version.clone().unwrap_or_else(|| {
                    Path::new(&path)
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.clone())
                });
                PromptTemplate::custom(version, body).context(InvalidConfigSnafu {})
            }
        }
    }

    pub fn classification_settings(&self, root: &Path) -> PipelineResult<ClassificationSettings> {
        let batch_size = self
            .batch_size
            .unwrap_or(BatchClassifier::DEFAULT_BATCH_SIZE);
        let classifier =
            BatchClassifier::new(batch_size, self.retry_policy()).context(InvalidConfigSnafu {})?;
        Ok(ClassificationSettings {
            classifier,
            template: self.prompt_template(root)?,
            order: if self.sort_by_dates.unwrap_or(false) {
                GroupOrder::ByDates
            } else {
                GroupOrder::Input
            },
            policy: MergePolicy::from_drop_unmatched(self.drop_unmatched.unwrap_or(true)),
            window: if self.election_window.unwrap_or(false) {
                Some(ElectionWindow::for_year(self.year))
            } else {
                None
            },
        })
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings::from_config(self.service.as_ref())
    }
}
