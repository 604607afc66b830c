use clap::Parser;
use tapesim::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
