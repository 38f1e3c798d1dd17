use crate::commands::load_data;
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use osml_engine::{DataContext, EvaluatorKind, ExpressionEngine};

/// Evaluate an expression against a JSON data document
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Expression body, without the surrounding ${ }
    pub expression: String,

    /// JSON document bound as the `Top` scope
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Use the single-pass legacy evaluator
    #[arg(long)]
    pub legacy: bool,
}

pub fn execute(args: EvalArgs) -> Result<()> {
    let kind = if args.legacy {
        EvaluatorKind::Legacy
    } else {
        EvaluatorKind::Full
    };
    let context = DataContext::new(load_data(args.data.as_deref())?);
    let engine = ExpressionEngine::new(kind);

    match engine.evaluate(&args.expression, &context) {
        Ok(value) => {
            println!("{}", value.to_json());
            Ok(())
        }
        Err(e) => {
            output::failure(&e, Some(e.fragment()));
            std::process::exit(1);
        }
    }
}
