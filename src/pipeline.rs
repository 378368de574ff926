use log::{debug, info, warn};

use poll_validity::report::render_text;
use poll_validity::review::{apply_review, review_items, ReviewItem};
use poll_validity::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use text_diff::print_diff;

use crate::pipeline::config_reader::*;
use crate::pipeline::gemini::GeminiClient;
use crate::pipeline::io_common::{
    default_output_path, input_kind, resolve_path, InputKind, LLM_SUFFIX,
};

mod config_reader;
mod gemini;
mod io_common;
mod io_csv;
mod io_excel;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {name:?} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("Empty workbook or worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Cannot read cell at row {lineno} in {path}: {content}"))]
    ExcelWrongCellType {
        lineno: usize,
        path: String,
        content: String,
    },
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing {what} to JSON"))]
    SerializingJson {
        source: serde_json::Error,
        what: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("The environment variable {var} with the API key is not set"))]
    MissingApiKey {
        source: std::env::VarError,
        var: String,
    },
    #[snafu(display("Cannot create the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("{path}: {source}"))]
    InvalidData { source: PollError, path: String },
    #[snafu(display("Invalid configuration: {source}"))]
    InvalidConfig { source: PollError },
    #[snafu(display("The report differs from the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Reads a table from a CSV or an Excel file.
fn read_table(
    path: &str,
    input_type: Option<&str>,
    worksheet: Option<&str>,
) -> PipelineResult<Table> {
    info!("Attempting to read poll file {:?}", path);
    let table = match input_kind(path, input_type)? {
        InputKind::Csv => io_csv::read_csv_table(path)?,
        InputKind::Excel => io_excel::read_excel_table(path, worksheet)?,
    };
    info!(
        "Read {} rows and {} columns from {:?}",
        table.len(),
        table.columns().len(),
        path
    );
    Ok(table)
}

fn log_run_summary(res: &ClassifiedTable) {
    let run = &res.run;
    info!(
        "Run summary: prompt {} ({}), {} questions, {} batches, {} verdicts",
        res.instruction.version,
        res.instruction.fingerprint,
        res.num_questions,
        run.chunk_count,
        run.verdicts.len()
    );
    for failure in run.failed_chunks.iter() {
        warn!(
            "Batch {} failed ({:?}), questions: {}",
            failure.chunk,
            failure.reason,
            failure.question_ids.join(", ")
        );
    }
    if !run.ignored.is_empty() {
        warn!("{} verdicts were ignored", run.ignored.len());
    }
    if !res.merged.unclassified.is_empty() {
        warn!(
            "{} questions without verdict ({} rows dropped): {}",
            res.merged.unclassified.len(),
            res.merged.dropped_rows,
            res.merged.unclassified.join(", ")
        );
    }
}

pub fn run_classification(
    config_path: &str,
    input: Option<String>,
    out: Option<String>,
    keep_unmatched: bool,
) -> PipelineResult<()> {
    let config = read_config(config_path)?;
    debug!("run_classification: config: {:?}", config);
    let root = config_root(config_path);

    let input_path = match input
        .or_else(|| config.input_file.as_ref().map(|p| resolve_path(root, p)))
    {
        Some(p) => p,
        None => whatever!(
            "No input file: use --input or set inputFile in {}",
            config_path
        ),
    };
    let output_path = out
        .or_else(|| config.output_file.as_ref().map(|p| resolve_path(root, p)))
        .unwrap_or_else(|| default_output_path(&input_path, LLM_SUFFIX));

    let table = read_table(
        &input_path,
        config.input_type.as_deref(),
        config.excel_worksheet_name.as_deref(),
    )?;
    let schema = config.schema();
    let candidates = config.candidate_set()?;
    let mut settings = config.classification_settings(root)?;
    if keep_unmatched {
        settings.policy = MergePolicy::KeepUnmatched;
    }

    let client = GeminiClient::new(&config.gemini_settings())?;
    let res = classify_table(&table, &schema, &candidates, &settings, &client)
        .context(InvalidDataSnafu { path: input_path })?;
    log_run_summary(&res);

    io_csv::write_csv_table(&output_path, &res.merged.table)?;
    info!(
        "Wrote {} rows to {:?}",
        res.merged.table.len(),
        output_path
    );
    Ok(())
}

pub fn print_prompt(config_path: &str) -> PipelineResult<()> {
    let config = read_config(config_path)?;
    let root = config_root(config_path);
    let candidates = config.candidate_set()?;
    let template = config.prompt_template(root)?;
    let instruction = template.build(&candidates);
    println!("{}", instruction.text);
    println!();
    println!("version: {}", instruction.version);
    println!("fingerprint: {}", instruction.fingerprint);
    Ok(())
}

pub fn run_reconciliation(
    llm_path: &str,
    final_path: &str,
    keys: Vec<String>,
    as_json: bool,
    reference: Option<String>,
) -> PipelineResult<()> {
    let llm = read_table(llm_path, None, None)?;
    let fin = read_table(final_path, None, None)?;
    let key_columns = if keys.is_empty() {
        KeyColumns::Shared
    } else {
        KeyColumns::Named(keys)
    };
    let report = reconcile(&llm, &fin, &PollSchema::default(), &key_columns).context(
        InvalidDataSnafu {
            path: format!("{} / {}", llm_path, final_path),
        },
    )?;

    let rendered = if as_json {
        serde_json::to_string_pretty(&report).context(SerializingJsonSnafu {
            what: "the report".to_string(),
        })?
    } else {
        render_text(&report, "llm", "final")
    };
    println!("{}", rendered);

    // The reference report, if provided for comparison
    if let Some(reference_path) = reference {
        let expected = fs::read_to_string(&reference_path).context(ReadingFileSnafu {
            path: reference_path.clone(),
        })?;
        if expected.trim_end() != rendered.trim_end() {
            warn!("Found differences with the reference report");
            print_diff(expected.trim_end(), rendered.trim_end(), "\n");
            return ReferenceMismatchSnafu {
                path: reference_path,
            }
            .fail();
        }
        info!("The report matches the reference {:?}", reference_path);
    }
    Ok(())
}

pub fn export_review(input: &str, out: &str) -> PipelineResult<()> {
    let table = read_table(input, None, None)?;
    let items = review_items(&table, &PollSchema::default()).context(InvalidDataSnafu {
        path: input.to_string(),
    })?;
    let js = serde_json::to_string_pretty(&items).context(SerializingJsonSnafu {
        what: "the review items".to_string(),
    })?;
    fs::write(out, js).context(WritingFileSnafu {
        path: out.to_string(),
    })?;
    info!("Wrote {} review items to {:?}", items.len(), out);
    Ok(())
}

pub fn import_review(input: &str, review: &str, out: &str) -> PipelineResult<()> {
    let table = read_table(input, None, None)?;
    let contents = fs::read_to_string(review).context(ReadingFileSnafu {
        path: review.to_string(),
    })?;
    let items: Vec<ReviewItem> = serde_json::from_str(&contents).context(ParsingJsonSnafu {
        path: review.to_string(),
    })?;
    let merged = apply_review(&table, &PollSchema::default(), &items).context(InvalidDataSnafu {
        path: input.to_string(),
    })?;
    if !merged.unclassified.is_empty() {
        warn!(
            "{} questions left without verdict after review",
            merged.unclassified.len()
        );
    }
    io_csv::write_csv_table(out, &merged.table)?;
    info!("Wrote reviewed table to {:?}", out);
    Ok(())
}

fn config_root(config_path: &str) -> &Path {
    Path::new(config_path).parent().unwrap_or_else(|| Path::new(""))
}
