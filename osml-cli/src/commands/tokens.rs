use crate::output;

use clap::Args;
use color_eyre::Result;

use osml_engine::Lexer;

/// Print the lexer's token stream for an expression
#[derive(Args, Debug)]
pub struct TokensArgs {
    /// Expression body, without the surrounding ${ }
    pub expression: String,
}

pub fn execute(args: TokensArgs) -> Result<()> {
    let tokens = match Lexer::process(&args.expression) {
        Ok(tokens) => tokens,
        Err(e) => {
            output::failure(&e, Some(e.fragment.as_str()));
            std::process::exit(1);
        }
    };

    for token in &tokens {
        println!("{:<10} {}", token.token_type().to_string(), token);
    }
    output::summary(format_args!("{} tokens", tokens.len()));
    Ok(())
}
