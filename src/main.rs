use clap::Parser;
use factortrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
