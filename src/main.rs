mod config;
mod logging;
mod organizer;
mod ports;
mod scope;
mod soundcloud;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context, eyre::eyre};

use crate::{
    config::Config,
    logging::setup_logging,
    organizer::processor::{StreamOrganizer, TrackLengthFilter},
    organizer::report::ConsoleReporter,
    soundcloud::auth,
    soundcloud::client::SoundCloudClient,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Console log level
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "SOUNDCLOUD_ORGANIZER_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authorize the application with your SoundCloud account
    Login {
        /// Your SoundCloud application client ID
        #[arg(long, env = "SOUNDCLOUD_CLIENT_ID")]
        client_id: String,

        /// Your SoundCloud application client secret
        #[arg(long, env = "SOUNDCLOUD_CLIENT_SECRET")]
        client_secret: String,
    },
    /// Fetch, filter, and organize tracks from your SoundCloud stream
    Organize {
        /// Filter tracks by length
        #[arg(short = 'f', long, value_enum, default_value = "all")]
        length_filter: TrackLengthFilter,

        /// Show what tracks would be organized without making any changes
        #[arg(long)]
        dry_run: bool,

        /// Filter by time interval, e.g. 'last-month', 'ytd', '2023', '2023-01'
        #[arg(short, long)]
        scope: Option<String>,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("SoundCloud organizer starting");

    match args.command {
        Commands::Login {
            client_id,
            client_secret,
        } => {
            log::info!("Starting SoundCloud authentication");
            let response = auth::login(&client_id, &client_secret)
                .await
                .wrap_err("Authentication failed")?;

            let mut config =
                Config::load_or_default().wrap_err("Failed to load soundcloud-organizer config")?;
            config.client_id = Some(client_id);
            config.client_secret = Some(client_secret);
            config.token = Some(auth::store_token(&response, chrono::Utc::now()));
            config.save()?;
            log::info!("Authentication successful, credentials saved");
        }
        Commands::Organize {
            length_filter,
            dry_run,
            scope,
        } => {
            let config =
                Config::load_or_default().wrap_err("Failed to load soundcloud-organizer config")?;
            let (Some(client_id), Some(client_secret), Some(token)) = (
                config.client_id.clone(),
                config.client_secret.clone(),
                config.token.clone(),
            ) else {
                return Err(eyre!(
                    "You are not logged in. Run 'soundcloud-organizer login' first."
                ));
            };

            // Persist refreshed tokens straight back to the config file.
            let token = auth::ensure_fresh_token(&client_id, &client_secret, token, {
                let mut config = config;
                move |refreshed| {
                    config.token = Some(refreshed.clone());
                    config.save()
                }
            })
            .await?;

            let client = SoundCloudClient::new(token.access_token);
            StreamOrganizer::new(client)
                .process(length_filter, scope.as_deref(), dry_run, &ConsoleReporter)
                .await?;
            log::info!("Organize command completed");
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                Config::create_default()?;
                log::info!("Default config created");
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}
