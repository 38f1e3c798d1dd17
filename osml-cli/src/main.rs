mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use commands::eval::EvalArgs;
use commands::render::RenderArgs;
use commands::tokens::TokensArgs;

#[derive(Parser, Debug)]
#[command(name = "osml")]
#[command(version, about = "Render OpenSocial templates and evaluate ${...} expressions", long_about = None)]
struct Cli {
    /// Log engine activity at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process a template document and print the result
    Render(RenderArgs),

    /// Evaluate an expression against a JSON data document
    Eval(EvalArgs),

    /// Print the lexer's token stream for an expression
    Tokens(TokensArgs),
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Render(args) => commands::render::execute(args),
        Commands::Eval(args) => commands::eval::execute(args),
        Commands::Tokens(args) => commands::tokens::execute(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
