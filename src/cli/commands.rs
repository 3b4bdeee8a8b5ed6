//! Handlers for the session commands.
//!
//! Each handler drives a [`SessionSynchronizer`] and prints the outcome.
//! Rejections are printed with their user-facing message and reported as
//! a failed command.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::{json, Map, Value};

use crate::auth::pkce::code_from_callback;
use crate::auth::{OAuthOptions, SignUpOutcome};
use crate::error::SessionError;
use crate::realtime::RealtimeClient;
use crate::sync::{AuthSnapshot, SessionSynchronizer};
use crate::traits::RealtimeConnection;

pub async fn handle_status_command(sync: &SessionSynchronizer) -> Result<()> {
    let snapshot = sync.initialize().await;
    print_snapshot(&snapshot);
    Ok(())
}

pub async fn handle_login_command(sync: &SessionSynchronizer, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    print!("Password: ");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;

    let session = sync.sign_in(&email, &password).await.map_err(report)?;
    println!(
        "Signed in as {}",
        session.email().unwrap_or_else(|| session.user_id())
    );
    if !session.is_email_verified() {
        println!("Your email address is not confirmed yet. Run `neatrix-session resend {}`.", email);
    }
    Ok(())
}

pub async fn handle_signup_command(
    sync: &SessionSynchronizer,
    email: &str,
    full_name: Option<String>,
    phone: Option<String>,
) -> Result<()> {
    print!("Choose a password: ");
    io::stdout().flush()?;
    let password = rpassword::read_password()?;
    print!("Repeat password: ");
    io::stdout().flush()?;
    if rpassword::read_password()? != password {
        return Err(eyre!("Passwords do not match"));
    }

    let mut profile = Map::new();
    if let Some(name) = full_name {
        profile.insert("full_name".to_string(), Value::String(name));
    }
    if let Some(phone) = phone {
        profile.insert("phone".to_string(), Value::String(phone));
    }

    match sync
        .sign_up(email, &password, &Value::Object(profile))
        .await
        .map_err(report)?
    {
        SignUpOutcome::SignedIn(session) => {
            println!("Account created. Signed in as {}", session.email().unwrap_or(email));
        }
        SignUpOutcome::VerificationRequired(_) => {
            println!("Account created. Check {} for a confirmation link.", email);
        }
    }
    Ok(())
}

pub async fn handle_logout_command(sync: &SessionSynchronizer) -> Result<()> {
    sync.initialize().await;
    let report = sync.sign_out().await;
    if !report.was_signed_in {
        println!("Not signed in.");
    } else if report.remote_revoked {
        println!("Signed out.");
    } else {
        println!("Signed out on this device. The server could not be reached to revoke the session.");
    }
    Ok(())
}

pub async fn handle_resend_command(sync: &SessionSynchronizer, email: &str) -> Result<()> {
    sync.resend_verification(email).await.map_err(report)?;
    println!("Confirmation email sent to {}.", email);
    Ok(())
}

pub fn handle_oauth_url_command(
    sync: &SessionSynchronizer,
    provider: &str,
    redirect_to: &str,
    open_browser: bool,
) -> Result<()> {
    let options = if provider == "google" {
        OAuthOptions::google(redirect_to)
    } else {
        OAuthOptions::new(provider, redirect_to)
    };
    let redirect = sync.begin_oauth(&options);

    println!("Open this URL to sign in:\n\n  {}\n", redirect.url);
    println!("Then finish with:\n");
    println!(
        "  neatrix-session oauth-complete '<callback url>' --verifier {}",
        redirect.code_verifier
    );

    if open_browser {
        if let Err(e) = webbrowser::open(&redirect.url) {
            eprintln!("Could not open a browser: {}", e);
        }
    }
    Ok(())
}

pub async fn handle_oauth_complete_command(
    sync: &SessionSynchronizer,
    callback: &str,
    verifier: &str,
) -> Result<()> {
    let code = code_from_callback(callback).map_err(|e| report(e.into()))?;
    let session = sync.complete_oauth(&code, verifier).await.map_err(report)?;
    println!(
        "Signed in as {}",
        session.email().unwrap_or_else(|| session.user_id())
    );
    Ok(())
}

/// Print every published snapshot until Ctrl-C.
pub async fn handle_watch_command(sync: &Arc<SessionSynchronizer>) -> Result<()> {
    let mut states = sync.subscribe();
    let initial = sync.initialize().await;

    let realtime = RealtimeClient::new(
        sync.config(),
        initial.current_session().map(|s| s.access_token.clone()),
    );
    sync.attach_realtime(Arc::new(realtime.clone()));
    realtime.start();
    sync.spawn_auto_refresh();

    println!("Watching auth state. Press Ctrl-C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snapshot = states.recv() => {
                let Some(snapshot) = snapshot else { break };
                realtime.set_access_token(
                    snapshot.current_session().map(|s| s.access_token.clone()),
                );
                print_snapshot(&snapshot);
            }
        }
    }

    states.unsubscribe();
    realtime.shutdown();
    sync.dispose();
    Ok(())
}

fn print_snapshot(snapshot: &AuthSnapshot) {
    let realtime = if snapshot.is_realtime_connected() {
        "connected"
    } else {
        "disconnected"
    };
    let line = json!({
        "revision": snapshot.revision,
        "phase": snapshot.phase.as_str(),
        "change": format!("{:?}", snapshot.change),
        "user": snapshot.user().and_then(|u| u.email.clone()),
        "expires_in_secs": snapshot.current_session().map(|s| s.seconds_until_expiry()),
        "pending_verification": snapshot.pending_verification,
        "realtime": realtime,
        "realtime_error": snapshot.connection.last_error,
    });
    println!("{}", line);
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Turn a rejection into the message shown to the user.
fn report(err: SessionError) -> color_eyre::Report {
    tracing::debug!(code = err.error_code(), error = %err, "Command failed");
    eyre!("{}", err.user_message())
}
