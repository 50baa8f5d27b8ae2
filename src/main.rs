// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use trt_annotate::cli::args::{Cli, Commands};
use trt_annotate::cli::logging::set_verbose;
use trt_annotate::cli::{export, names, predict, video};
use trt_annotate::{AnnotateError, error};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let result = match &cli.command {
        Commands::Video(args) => {
            set_verbose(args.verbose);
            video::run_video(args).map(|_| ())
        }
        Commands::Predict(args) => {
            set_verbose(args.verbose);
            predict::run_prediction(args)
        }
        Commands::Names(args) => names::run_names(args),
        Commands::Export(args) => export::run_export(args),
    };

    if let Err(e) = result {
        error!("{e}");
        if let AnnotateError::FrameFailed { stdout, stderr, .. } = &e {
            if !stdout.is_empty() {
                eprintln!("{stdout}");
            }
            if !stderr.is_empty() {
                eprintln!("{stderr}");
            }
        }
        process::exit(e.exit_code());
    }
}
