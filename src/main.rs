use clap::Parser;
use quantledger::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
