#![recursion_limit = "256"]

use clap::Parser;
use stylize_cli::{Cli, ProgressUi, run_on_device};

fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();

    #[cfg(feature = "tracing")]
    {
        tracing::subscriber::set_global_default(tracing_subscriber::fmt().finish())
            .expect("Failed to set tracing subscriber");
    }

    env_logger::builder()
        .target(env_logger::Target::Stdout)
        .init();

    let mut ui = ProgressUi::new();
    run_on_device(&args.stylize, &mut ui)?;
    Ok(())
}
