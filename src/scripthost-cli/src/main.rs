mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use scripthost::Config;

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&config_path)?;

    let log_file = cli.log_file.as_deref().or(config.log_file.as_deref());
    logging::init(log_file)?;

    match cli.command {
        Commands::Scan {
            image,
            pattern,
            base,
            all,
            context,
        } => {
            commands::scan::scan(&image, &pattern, base, all, context)?;
        }

        Commands::Resolve {
            image,
            base,
            keep_going,
        } => {
            commands::scan::resolve(&image, base, &config, keep_going)?;
        }

        Commands::Run {
            ticks,
            tick_ms,
            press,
            hang,
            timeout_ms,
        } => {
            commands::run::handle(
                config,
                commands::run::RunOptions {
                    ticks,
                    tick_ms,
                    press,
                    hang,
                    timeout_ms,
                },
            )?;
        }

        Commands::Call {
            hash,
            args,
            returns,
        } => {
            commands::call::handle(hash as u64, &args, &returns)?;
        }

        Commands::Settings { file, section } => {
            commands::settings::show(&file, section.as_deref())?;
        }

        Commands::Configure {
            scripts_dir,
            timeout_ms,
            log_file,
            show,
        } => {
            let changes = commands::configure::Changes {
                scripts_dir,
                timeout_ms,
                log_file,
            };
            commands::configure::handle(&config_path, changes, show)?;
        }
    }

    Ok(())
}
