use std::path::Path;

use snafu::prelude::*;

use crate::pipeline::PipelineResult;

/// Added to the input file name for the machine-labelled output.
pub const LLM_SUFFIX: &str = "_isvalid_llm";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputKind {
    Csv,
    Excel,
}

/// Relative paths in a configuration file are relative to the file itself.
pub fn resolve_path(root: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        path.to_string()
    } else {
        root.join(p).display().to_string()
    }
}

/// `polls/gallup_1936.xlsx` becomes `polls/gallup_1936<suffix>.csv`.
pub fn default_output_path(input: &str, suffix: &str) -> String {
    let p = Path::new(input);
    let stem = p
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    p.with_file_name(format!("{}{}.csv", stem, suffix))
        .display()
        .to_string()
}

/// The explicit input type wins over the extension of the file.
pub fn input_kind(path: &str, input_type: Option<&str>) -> PipelineResult<InputKind> {
    let extension = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match (input_type, extension.as_deref()) {
        (Some("csv"), _) => Ok(InputKind::Csv),
        (Some("excel") | Some("xlsx"), _) => Ok(InputKind::Excel),
        (Some(x), _) => whatever!("Input type {:?} not implemented", x),
        (None, Some("xlsx") | Some("xlsm")) => Ok(InputKind::Excel),
        (None, _) => Ok(InputKind::Csv),
    }
}
