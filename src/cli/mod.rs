//! CLI module for neatrix-session.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - Session commands backed by the synchronizer
//!
//! # Usage
//!
//! ```ignore
//! use neatrix_session::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! runtime.block_on(run_cli_command(command, config))?;
//! ```

pub mod args;
pub mod commands;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use version::{handle_version_command, VERSION};

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::config::BackendConfig;
use crate::sync::SessionSynchronizer;

/// Run a parsed command against the backend described by `config`.
pub async fn run_cli_command(command: CliCommand, config: BackendConfig) -> Result<()> {
    let sync = match &command {
        CliCommand::Version => {
            handle_version_command();
            return Ok(());
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        CliCommand::Invalid(message) => {
            return Err(eyre!("{}\n\n{}", message, USAGE));
        }
        _ => SessionSynchronizer::from_config(config)
            .map_err(|e| eyre!("{} ({})", e.user_message(), e))?,
    };

    let result = match command {
        CliCommand::Status => commands::handle_status_command(&sync).await,
        CliCommand::Login { email } => commands::handle_login_command(&sync, email).await,
        CliCommand::Signup {
            email,
            full_name,
            phone,
        } => commands::handle_signup_command(&sync, &email, full_name, phone).await,
        CliCommand::Logout => commands::handle_logout_command(&sync).await,
        CliCommand::Resend { email } => commands::handle_resend_command(&sync, &email).await,
        CliCommand::OAuthUrl {
            provider,
            redirect_to,
            open_browser,
        } => commands::handle_oauth_url_command(&sync, &provider, &redirect_to, open_browser),
        CliCommand::OAuthComplete { callback, verifier } => {
            commands::handle_oauth_complete_command(&sync, &callback, &verifier).await
        }
        CliCommand::Watch => commands::handle_watch_command(&sync).await,
        CliCommand::Version | CliCommand::Help | CliCommand::Invalid(_) => Ok(()),
    };

    sync.dispose();
    result
}
