// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Harambee - a mobile-money donation bot.
//!
//! This is the binary entry point: it loads configuration, initialises
//! logging and dispatches to the subcommands.

mod commands;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use harambee_config::model::HarambeeConfig;

/// Harambee - a mobile-money donation bot.
#[derive(Parser, Debug)]
#[command(name = "harambee", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the verification engine until SIGINT or SIGTERM.
    Serve,
    /// Create the database schema if it does not exist.
    InitDb,
    /// Start a donation and wait until its verification settles.
    Donate {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        chat_id: i64,
        /// Payer phone in the form 07XXXXXXXX.
        #[arg(long)]
        phone: String,
        #[arg(long)]
        amount: i64,
    },
    /// Show a payment and its verification attempts.
    Status {
        reference: String,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Cancel a pending payment.
    Cancel { reference: String },
}

fn load_config(path: Option<&PathBuf>) -> HarambeeConfig {
    let loaded = match path {
        Some(path) => harambee_config::load_and_validate_path(path),
        None => harambee_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            harambee_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    serve::init_tracing(&config.bot.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::InitDb) => commands::run_init_db(&config).await,
        Some(Commands::Donate {
            user_id,
            chat_id,
            phone,
            amount,
        }) => commands::run_donate(&config, user_id, chat_id, phone, amount).await,
        Some(Commands::Status { reference, json }) => {
            commands::run_status(&config, &reference, json).await
        }
        Some(Commands::Cancel { reference }) => commands::run_cancel(&config, &reference).await,
        None => {
            println!("harambee: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("harambee: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_donate_arguments() {
        let cli = Cli::try_parse_from([
            "harambee", "donate", "--user-id", "42", "--chat-id", "4200", "--phone",
            "0712345678", "--amount", "500",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Donate {
                user_id,
                chat_id,
                phone,
                amount,
            }) => {
                assert_eq!((user_id, chat_id, amount), (42, 4200, 500));
                assert_eq!(phone, "0712345678");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from([
            "harambee", "status", "DON-1-20260101000000-abcd", "--config", "/tmp/h.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
        assert!(matches!(cli.command, Some(Commands::Status { json: false, .. })));
    }

    #[test]
    fn donate_requires_amount() {
        assert!(
            Cli::try_parse_from([
                "harambee", "donate", "--user-id", "1", "--chat-id", "1", "--phone", "0712345678",
            ])
            .is_err()
        );
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = harambee_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.bot.name, "harambee");
    }
}
