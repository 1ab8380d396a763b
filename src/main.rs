use anyhow::Result;
use maintkit::cli::Cli;

fn main() -> Result<()> {
    Cli::parse().run()
}
