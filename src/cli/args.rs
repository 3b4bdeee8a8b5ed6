//! Command-line argument parsing for the neatrix-session CLI.
//!
//! This module handles parsing command-line arguments and determining
//! which CLI command to execute.

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Restore the persisted session and print the auth state (default)
    Status,
    /// Password sign-in; prompts for whatever is missing
    Login { email: Option<String> },
    /// Create an account
    Signup {
        email: String,
        full_name: Option<String>,
        phone: Option<String>,
    },
    /// Sign out locally and revoke remotely
    Logout,
    /// Re-send the sign-up confirmation email
    Resend { email: String },
    /// Print a provider authorize URL and its PKCE verifier
    OAuthUrl {
        provider: String,
        redirect_to: String,
        open_browser: bool,
    },
    /// Exchange an OAuth callback for a session
    OAuthComplete { callback: String, verifier: String },
    /// Follow auth and realtime state until interrupted
    Watch,
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Arguments could not be parsed
    Invalid(String),
}

pub const DEFAULT_OAUTH_PROVIDER: &str = "google";
pub const DEFAULT_OAUTH_REDIRECT: &str = "http://localhost:3000/auth/callback";

pub const USAGE: &str = "\
Usage: neatrix-session [COMMAND]

Commands:
  status                                    Show the current auth state (default)
  login [EMAIL]                             Sign in with email and password
  signup EMAIL [--name NAME] [--phone PHONE]
                                            Create an account
  logout                                    Sign out
  resend EMAIL                              Re-send the confirmation email
  oauth-url [--provider P] [--redirect URL] [--open]
                                            Start a provider sign-in
  oauth-complete CALLBACK --verifier V      Finish a provider sign-in
  watch                                     Follow auth and realtime state

Options:
  -V, --version   Print version
  -h, --help      Print this help

Environment:
  NEATRIX_SUPABASE_URL, NEATRIX_SUPABASE_ANON_KEY   Backend coordinates
  NEATRIX_STORAGE_KEY                              Session storage key
  NEATRIX_REALTIME_TOPICS                          Comma-separated channel topics
  RUST_LOG                                         Log filter";

/// Parse command-line arguments and return the appropriate command.
///
/// # Examples
///
/// ```
/// use neatrix_session::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["neatrix-session".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let args: Vec<String> = args.skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        return CliCommand::Version;
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return CliCommand::Help;
    }

    let Some((command, rest)) = args.split_first() else {
        return CliCommand::Status;
    };
    let mut rest = Options::parse(rest);

    let parsed = match command.as_str() {
        "status" => Ok(CliCommand::Status),
        "login" => Ok(CliCommand::Login {
            email: rest.positional(),
        }),
        "signup" => rest.required("EMAIL").map(|email| CliCommand::Signup {
            email,
            full_name: rest.flag("--name"),
            phone: rest.flag("--phone"),
        }),
        "logout" => Ok(CliCommand::Logout),
        "resend" => rest.required("EMAIL").map(|email| CliCommand::Resend { email }),
        "oauth-url" => Ok(CliCommand::OAuthUrl {
            provider: rest
                .flag("--provider")
                .unwrap_or_else(|| DEFAULT_OAUTH_PROVIDER.to_string()),
            redirect_to: rest
                .flag("--redirect")
                .unwrap_or_else(|| DEFAULT_OAUTH_REDIRECT.to_string()),
            open_browser: rest.switch("--open"),
        }),
        "oauth-complete" => rest.required("CALLBACK").and_then(|callback| {
            rest.flag("--verifier")
                .map(|verifier| CliCommand::OAuthComplete { callback, verifier })
                .ok_or_else(|| "missing --verifier".to_string())
        }),
        "watch" => Ok(CliCommand::Watch),
        other => Err(format!("unknown command '{}'", other)),
    };

    match parsed.and_then(|command| rest.finish().map(|_| command)) {
        Ok(command) => command,
        Err(message) => CliCommand::Invalid(message),
    }
}

/// Arguments after the command name.
struct Options {
    positional: Vec<String>,
    flags: Vec<(String, Option<String>)>,
}

impl Options {
    fn parse(args: &[String]) -> Self {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut iter = args.iter().peekable();
        while let Some(arg) = iter.next() {
            if let Some((name, value)) = arg.split_once('=').filter(|_| arg.starts_with("--")) {
                flags.push((name.to_string(), Some(value.to_string())));
            } else if arg.starts_with("--") {
                let value = iter.next_if(|next| !next.starts_with("--")).cloned();
                flags.push((arg.clone(), value));
            } else {
                positional.push(arg.clone());
            }
        }
        Self { positional, flags }
    }

    fn positional(&mut self) -> Option<String> {
        if self.positional.is_empty() {
            None
        } else {
            Some(self.positional.remove(0))
        }
    }

    fn required(&mut self, name: &str) -> Result<String, String> {
        self.positional()
            .ok_or_else(|| format!("missing {}", name))
    }

    fn flag(&mut self, name: &str) -> Option<String> {
        let index = self.flags.iter().position(|(n, v)| n == name && v.is_some())?;
        self.flags.remove(index).1
    }

    /// A value-less flag. A value captured after it goes back to positional.
    fn switch(&mut self, name: &str) -> bool {
        let Some(index) = self.flags.iter().position(|(n, _)| n == name) else {
            return false;
        };
        if let (_, Some(value)) = self.flags.remove(index) {
            self.positional.push(value);
        }
        true
    }

    fn finish(self) -> Result<(), String> {
        if let Some(arg) = self.positional.first() {
            return Err(format!("unexpected argument '{}'", arg));
        }
        if let Some((name, _)) = self.flags.first() {
            return Err(format!("unexpected option '{}'", name));
        }
        Ok(())
    }
}
