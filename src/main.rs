use clap::Parser;
use kestrel::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
