use anyhow::Result;

fn main() -> Result<()> {
    dzmods::cli::run()
}
