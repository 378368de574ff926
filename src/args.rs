use clap::{Parser, Subcommand};

/// Classifies poll questions as head-to-head voting intention polls and
/// compares machine verdicts with reviewed ones.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Classifies the questions of a poll file and writes it back with an isValid column.
    Classify {
        /// (file path) The JSON file describing the run: election year, candidates, input file and
        /// service settings.
        #[clap(short, long, value_parser)]
        config: String,
        /// (file path, optional) The poll file (CSV or Excel). Overrides inputFile in the configuration.
        #[clap(short, long, value_parser)]
        input: Option<String>,
        /// (file path, optional) Where to write the labelled CSV. By default, next to the input
        /// with the suffix _isvalid_llm.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// Keeps the rows of the questions that received no verdict, with an empty isValid cell.
        #[clap(long, takes_value = false)]
        keep_unmatched: bool,
    },
    /// Prints the instruction sent to the classification service, with its version and fingerprint.
    Prompt {
        #[clap(short, long, value_parser)]
        config: String,
    },
    /// Compares the verdicts of a machine-labelled file with a reviewed one.
    Reconcile {
        /// (file path) The machine-labelled file.
        #[clap(long, value_parser)]
        llm: String,
        /// (file path) The reviewed file.
        #[clap(long = "final", value_parser)]
        final_file: String,
        /// (column name, repeatable) The columns on which rows are paired. By default, every
        /// column shared by both files except isValid.
        #[clap(long = "key", value_parser)]
        keys: Vec<String>,
        /// Prints the report in JSON format.
        #[clap(long, takes_value = false)]
        json: bool,
        /// (file path) A stored report. If provided, the command fails when the report differs.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Writes one review item per question, in JSON format.
    ReviewExport {
        #[clap(short, long, value_parser)]
        input: String,
        #[clap(short, long, value_parser)]
        out: String,
    },
    /// Writes the verdicts of reviewed items back onto a poll file.
    ReviewApply {
        #[clap(short, long, value_parser)]
        input: String,
        #[clap(long, value_parser)]
        review: String,
        #[clap(short, long, value_parser)]
        out: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_args() {
        let args = Args::try_parse_from([
            "pollcheck",
            "classify",
            "--config",
            "run.json",
            "--keep-unmatched",
            "--verbose",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Classify {
                config,
                input,
                keep_unmatched,
                ..
            } => {
                assert_eq!(config, "run.json");
                assert_eq!(input, None);
                assert!(keep_unmatched);
            }
            x => panic!("unexpected command {:?}", x),
        }
    }

    #[test]
    fn reconcile_args() {
        let args = Args::try_parse_from([
            "pollcheck",
            "reconcile",
            "--llm",
            "a_isvalid_llm.csv",
            "--final",
            "a_isvalid_final.csv",
            "--key",
            "QuestionID",
            "--key",
            "RespTxt",
        ])
        .unwrap();
        match args.command {
            Command::Reconcile {
                final_file, keys, json, ..
            } => {
                assert_eq!(final_file, "a_isvalid_final.csv");
                assert_eq!(keys, vec!["QuestionID", "RespTxt"]);
                assert!(!json);
            }
            x => panic!("unexpected command {:?}", x),
        }
    }

    #[test]
    fn subcommand_names() {
        assert!(Args::try_parse_from(["pollcheck", "review-export", "-i", "a.csv", "-o", "a.json"]).is_ok());
        assert!(Args::try_parse_from(["pollcheck", "prompt"]).is_err());
    }
}
