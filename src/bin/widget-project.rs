use anyhow::Result;
use widget_language_server::cli::run;

fn main() -> Result<()> {
    run()
}
