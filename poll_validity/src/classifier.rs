use std::collections::HashSet;
use std::error::Error;
use std::fmt::Display;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value as JSValue;

use crate::config::*;
use crate::prompt::Instruction;

/// A failed call to the classification service (transport, quota, ...).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> ServiceError {
        ServiceError {
            message: message.into(),
        }
    }
}

impl Error for ServiceError {}

impl Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "classification service error: {}", self.message)
    }
}

/// The external text classifier.
///
/// One call per batch. The call is synchronous and holds no state between
/// batches. Generation parameters (temperature, ...) belong to the
/// implementation.
pub trait ClassificationService {
    fn classify(&self, payload: &str, instruction: &str) -> Result<String, ServiceError>;
}

impl<F> ClassificationService for F
where
    F: Fn(&str, &str) -> Result<String, ServiceError>,
{
    fn classify(&self, payload: &str, instruction: &str) -> Result<String, ServiceError> {
        self(payload, instruction)
    }
}

/// How often a failing service call is attempted before the batch is
/// given up. The wait grows linearly with the attempt number.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_secs(2),
    };

    pub const NO_RETRY: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        backoff: Duration::from_secs(0),
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::DEFAULT
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChunkFailureReason {
    /// The service call failed on every attempt.
    Service(String),
    /// The payload could not be serialized.
    Payload(String),
    /// The response is not JSON.
    Parse(String),
    /// The response is JSON, but not verdicts.
    Schema(String),
}

/// A batch whose verdicts were all discarded.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub question_ids: Vec<String>,
    pub reason: ChunkFailureReason,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum IgnoredReason {
    /// The question id was not sent in this batch.
    UnknownQuestion,
    /// A second verdict for a question of this batch.
    Duplicate,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IgnoredVerdict {
    pub chunk: usize,
    pub question_id: String,
    pub reason: IgnoredReason,
}

/// The outcome of classifying a list of questions.
///
/// Coverage is not guaranteed: a question without a verdict is unclassified.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ClassificationRun {
    pub verdicts: Vec<Verdict>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub ignored: Vec<IgnoredVerdict>,
    pub chunk_count: usize,
}

impl ClassificationRun {
    /// The ids of the questions that did not receive a verdict.
    pub fn unclassified<'a>(&self, questions: &'a [PollQuestion]) -> Vec<&'a str> {
        let classified: HashSet<&str> = self
            .verdicts
            .iter()
            .map(|v| v.question_id.as_str())
            .collect();
        questions
            .iter()
            .map(|q| q.question_id.as_str())
            .filter(|id| !classified.contains(id))
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PayloadQuestion<'a> {
    question_id: &'a str,
    question_text: &'a str,
    responses: &'a [Response],
}

/// Serializes the minimal projection of a batch sent to the service.
pub fn chunk_payload(questions: &[PollQuestion]) -> Result<String, serde_json::Error> {
    let projection: Vec<PayloadQuestion> = questions
        .iter()
        .map(|q| PayloadQuestion {
            question_id: &q.question_id,
            question_text: &q.question_text,
            responses: &q.responses,
        })
        .collect();
    serde_json::to_string(&projection)
}

/// Reads the text returned by the service: one verdict object or an array
/// of them. Any element that is not an object with a string `questionId`
/// and a boolean `isValid` invalidates the whole response.
pub fn parse_verdicts(raw: &str) -> Result<Vec<Verdict>, ChunkFailureReason> {
    let js: JSValue =
        serde_json::from_str(raw.trim()).map_err(|e| ChunkFailureReason::Parse(e.to_string()))?;
    let items: Vec<JSValue> = match js {
        JSValue::Array(l) => l,
        obj @ JSValue::Object(_) => vec![obj],
        other => {
            return Err(ChunkFailureReason::Schema(format!(
                "expected an object or an array, got {}",
                other
            )))
        }
    };
    let mut res: Vec<Verdict> = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            ChunkFailureReason::Schema(format!("element {} is not an object", idx))
        })?;
        let question_id = obj
            .get("questionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ChunkFailureReason::Schema(format!("element {}: missing questionId", idx))
            })?;
        let is_valid = obj.get("isValid").and_then(|v| v.as_bool()).ok_or_else(|| {
            ChunkFailureReason::Schema(format!(
                "element {} ({}): isValid is missing or not a boolean",
                idx, question_id
            ))
        })?;
        res.push(Verdict {
            question_id: question_id.to_string(),
            is_valid,
        });
    }
    Ok(res)
}

/// Sends questions to the classification service in bounded batches.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BatchClassifier {
    batch_size: usize,
    retry: RetryPolicy,
}

impl Default for BatchClassifier {
    fn default() -> Self {
        BatchClassifier {
            batch_size: BatchClassifier::DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::DEFAULT,
        }
    }
}

impl BatchClassifier {
    pub const DEFAULT_BATCH_SIZE: usize = 40;

    pub fn new(batch_size: usize, retry: RetryPolicy) -> Result<BatchClassifier, PollError> {
        if batch_size == 0 {
            return Err(PollError::InvalidBatchSize);
        }
        Ok(BatchClassifier { batch_size, retry })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Classifies the questions, one service call per batch.
    ///
    /// Batches are contiguous and keep the input order. A batch whose
    /// response cannot be read is discarded as a whole and reported in
    /// `failed_chunks`; the other batches are not affected. Verdicts for
    /// questions that were not part of the batch are dropped.
    pub fn classify<S>(
        &self,
        service: &S,
        questions: &[PollQuestion],
        instruction: &Instruction,
    ) -> ClassificationRun
    where
        S: ClassificationService + ?Sized,
    {
        let chunks: Vec<&[PollQuestion]> = questions.chunks(self.batch_size).collect();
        let num_chunks = chunks.len();
        info!(
            "Classifying {} questions in {} batches of at most {} (prompt {} {})",
            questions.len(),
            num_chunks,
            self.batch_size,
            instruction.version,
            short_fingerprint(&instruction.fingerprint)
        );

        let mut run = ClassificationRun {
            chunk_count: num_chunks,
            ..Default::default()
        };
        for (chunk_idx, chunk) in chunks.into_iter().enumerate() {
            debug!(
                "classify: chunk {}/{}: {} questions",
                chunk_idx + 1,
                num_chunks,
                chunk.len()
            );
            match self.classify_chunk(service, chunk, instruction) {
                Ok(verdicts) => {
                    let (accepted, mut ignored) = check_provenance(chunk_idx, chunk, verdicts);
                    for iv in ignored.iter() {
                        warn!(
                            "classify: chunk {}: ignoring verdict for {:?} ({:?})",
                            chunk_idx, iv.question_id, iv.reason
                        );
                    }
                    run.verdicts.extend(accepted);
                    run.ignored.append(&mut ignored);
                }
                Err(reason) => {
                    warn!(
                        "classify: chunk {}/{} discarded: {:?}",
                        chunk_idx + 1,
                        num_chunks,
                        reason
                    );
                    run.failed_chunks.push(ChunkFailure {
                        chunk: chunk_idx,
                        question_ids: chunk.iter().map(|q| q.question_id.clone()).collect(),
                        reason,
                    });
                }
            }
        }
        info!(
            "Classified {} of {} questions, {} failed batches, {} ignored verdicts",
            run.verdicts.len(),
            questions.len(),
            run.failed_chunks.len(),
            run.ignored.len()
        );
        run
    }

    fn classify_chunk<S>(
        &self,
        service: &S,
        chunk: &[PollQuestion],
        instruction: &Instruction,
    ) -> Result<Vec<Verdict>, ChunkFailureReason>
    where
        S: ClassificationService + ?Sized,
    {
        let payload =
            chunk_payload(chunk).map_err(|e| ChunkFailureReason::Payload(e.to_string()))?;
        let raw = self.call_with_retry(service, &payload, &instruction.text)?;
        debug!("classify_chunk: raw response: {:?}", raw);
        parse_verdicts(&raw)
    }

    // Only service errors are retried. Unreadable answers fail the chunk.
    fn call_with_retry<S>(
        &self,
        service: &S,
        payload: &str,
        instruction: &str,
    ) -> Result<String, ChunkFailureReason>
    where
        S: ClassificationService + ?Sized,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match service.classify(payload, instruction) {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    warn!(
                        "call_with_retry: attempt {}/{} failed: {}",
                        attempt, attempts, e
                    );
                    last_error = e.message;
                    if attempt < attempts {
                        thread::sleep(self.retry.backoff * attempt);
                    }
                }
            }
        }
        Err(ChunkFailureReason::Service(last_error))
    }
}

fn short_fingerprint(fingerprint: &str) -> String {
    fingerprint.chars().take(12).collect()
}

// Keeps the verdicts that refer to questions of the batch, first one wins.
fn check_provenance(
    chunk_idx: usize,
    chunk: &[PollQuestion],
    verdicts: Vec<Verdict>,
) -> (Vec<Verdict>, Vec<IgnoredVerdict>) {
    let sent: HashSet<&str> = chunk.iter().map(|q| q.question_id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut accepted: Vec<Verdict> = Vec::new();
    let mut ignored: Vec<IgnoredVerdict> = Vec::new();
    for v in verdicts {
        let reason = if !sent.contains(v.question_id.as_str()) {
            Some(IgnoredReason::UnknownQuestion)
        } else if seen.contains(&v.question_id) {
            Some(IgnoredReason::Duplicate)
        } else {
            None
        };
        match reason {
            Some(reason) => ignored.push(IgnoredVerdict {
                chunk: chunk_idx,
                question_id: v.question_id,
                reason,
            }),
            None => {
                seen.insert(v.question_id.clone());
                accepted.push(v);
            }
        }
    }
    (accepted, ignored)
}
