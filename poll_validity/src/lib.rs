//! Classification of poll questions as head-to-head voting intention polls.
//!
//! The pipeline takes row-level poll data (one row per question and
//! response), groups the rows into questions, asks an external text
//! classifier whether each question is a valid general election poll
//! between the candidates of one election, and writes the verdicts back
//! onto the rows. Two labelled datasets can then be reconciled into an
//! agreement rate and a list of disagreements.
//!
//! ```
//! use poll_validity::*;
//!
//! let table = Table::new(
//!     vec!["QuestionID".into(), "QuestionTxt".into(), "RespTxt".into(), "RespPct".into()],
//!     vec![
//!         vec!["Q1".into(), "Whom do you prefer?".into(), "Roosevelt".into(), "49".into()],
//!         vec!["Q1".into(), "Whom do you prefer?".into(), "Landon".into(), "44".into()],
//!     ],
//! )
//! .unwrap();
//! let candidates = CandidateSet::new(
//!     1936,
//!     &["Franklin D. Roosevelt".to_string(), "Alf Landon".to_string()],
//! )
//! .unwrap();
//! // Any function of (payload, instruction) can stand in for the service.
//! let service = |_payload: &str, _instruction: &str| -> Result<String, ServiceError> {
//!     Ok(r#"{"questionId": "Q1", "isValid": true}"#.to_string())
//! };
//! let settings = ClassificationSettings::default();
//! let res = classify_table(&table, &PollSchema::default(), &candidates, &settings, &service).unwrap();
//! assert_eq!(res.merged.table.columns().last().unwrap(), "isValid");
//! assert_eq!(res.merged.table.rows()[1][4], "true");
//! ```

mod config;
pub mod calendar;
pub mod classifier;
pub mod grouper;
pub mod merger;
pub mod prompt;
pub mod reconcile;
pub mod report;
pub mod review;
pub mod table;

use log::info;

pub use crate::calendar::ElectionWindow;
pub use crate::classifier::{
    BatchClassifier, ClassificationRun, ClassificationService, RetryPolicy, ServiceError,
};
pub use crate::config::*;
pub use crate::grouper::GroupOrder;
pub use crate::merger::{MergeOutcome, MergePolicy};
pub use crate::prompt::{Instruction, PromptTemplate};
pub use crate::reconcile::{reconcile, KeyColumns, ReconciliationReport};
pub use crate::table::{PollSchema, Table};

/// How a table is classified end to end.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ClassificationSettings {
    pub classifier: BatchClassifier,
    pub template: PromptTemplate,
    pub order: GroupOrder,
    pub policy: MergePolicy,
    /// When set, only the rows polled within the window are classified.
    pub window: Option<ElectionWindow>,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        ClassificationSettings {
            classifier: BatchClassifier::default(),
            template: PromptTemplate::DEFAULT,
            order: GroupOrder::Input,
            policy: MergePolicy::DropUnmatched,
            window: None,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ClassifiedTable {
    pub instruction: Instruction,
    pub num_questions: usize,
    pub run: ClassificationRun,
    pub merged: MergeOutcome,
}

/// Runs the whole classification over a row-level table: filter, group,
/// classify and merge.
///
/// The window only restricts which questions are sent to the service. The
/// verdicts are merged onto the full table, so the rows polled outside the
/// window are unclassified and follow the merge policy.
pub fn classify_table<S>(
    table: &Table,
    schema: &PollSchema,
    candidates: &CandidateSet,
    settings: &ClassificationSettings,
    service: &S,
) -> Result<ClassifiedTable, PollError>
where
    S: ClassificationService + ?Sized,
{
    info!(
        "Processing {} rows, candidates: {:?}, year: {}",
        table.len(),
        candidates.candidates(),
        candidates.year()
    );
    let filtered;
    let rows = match &settings.window {
        Some(w) => {
            filtered = w.filter(table, schema)?;
            &filtered
        }
        None => table,
    };
    let questions = grouper::group(rows, schema, settings.order)?;
    let instruction = settings.template.build(candidates);
    let run = settings
        .classifier
        .classify(service, &questions, &instruction);
    let merged = merger::merge(table, schema, &run.verdicts, settings.policy)?;
    Ok(ClassifiedTable {
        instruction,
        num_questions: questions.len(),
        run,
        merged,
    })
}
