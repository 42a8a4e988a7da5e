use std::process::ExitCode;

use clap::Parser;
use haste::cli::{AppContext, Cli, Commands};
use haste::core::error::HasteError;
use haste::infra::logging::init_tracing;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
    };

    let result = match cli.command {
        Commands::Select(args) => haste::select_run(args, &ctx),
        Commands::Batch(args) => haste::batch_run(args, &ctx),
        Commands::Init(args) => haste::infra::config::init(args, &ctx),
        Commands::Completions(args) => haste::completion::run(args, &ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(err, &ctx),
    }
}

/// Print `err` and pick the exit code; selector errors get miette rendering
fn report(err: anyhow::Error, ctx: &AppContext) -> ExitCode {
    match err.downcast::<HasteError>() {
        Ok(haste_err) => {
            if ctx.no_color {
                let _ = miette::set_hook(Box::new(|_| {
                    Box::new(miette::MietteHandlerOpts::new().color(false).build())
                }));
            }
            let code = haste_err.exit_code();
            eprintln!("{:?}", miette::Report::new(haste_err));
            ExitCode::from(code)
        }
        Err(other) => {
            eprintln!("Error: {other:#}");
            ExitCode::FAILURE
        }
    }
}
