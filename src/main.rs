mod args;
mod pipeline;

use clap::Parser;
use log::debug;
use snafu::ErrorCompat;

use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    debug!("main: args: {:?}", args);

    let res = match args.command {
        Command::Classify {
            config,
            input,
            out,
            keep_unmatched,
        } => pipeline::run_classification(&config, input, out, keep_unmatched),
        Command::Prompt { config } => pipeline::print_prompt(&config),
        Command::Reconcile {
            llm,
            final_file,
            keys,
            json,
            reference,
        } => pipeline::run_reconciliation(&llm, &final_file, keys, json, reference),
        Command::ReviewExport { input, out } => pipeline::export_review(&input, &out),
        Command::ReviewApply { input, review, out } => {
            pipeline::import_review(&input, &review, &out)
        }
    };

    if let Err(e) = res {
        eprintln!("An error occurred: {}", e);
        for cause in ErrorCompat::iter_chain(&e).skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
