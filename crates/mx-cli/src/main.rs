//! Metrix CLI - compile, render, run, and diagnose semantic metrics

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod context;

use cli::Cli;
use commands::common::ExitCode;
use commands::{compile, doctor, ls, run, sql};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result: Result<()> = match &cli.command {
        cli::Commands::Ls(args) => ls::execute(args, &cli.global).await,
        cli::Commands::Compile(args) => compile::execute(args, &cli.global).await,
        cli::Commands::Sql(args) => sql::execute(args, &cli.global).await,
        cli::Commands::Run(args) => run::execute(args, &cli.global).await,
        cli::Commands::Doctor(args) => doctor::execute(args, &cli.global).await,
    };

    if let Err(err) = result {
        if let Some(ExitCode(code)) = err.downcast_ref::<ExitCode>() {
            std::process::exit(*code);
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
