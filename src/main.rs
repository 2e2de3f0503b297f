use clap::Parser;
use mpjob::cli::{Cli, Output};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli.run() {
        Output::new(false, false).error(&format!("{err:#}"));
        std::process::exit(1);
    }
}
