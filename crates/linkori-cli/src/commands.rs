//! Subcommand handlers. Session commands take a context from the provider;
//! only `logout` gets one that was not mounted.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use linkori_core::api::{ApiError, HttpAuthClient, Provider};
use linkori_core::auth::CredentialStore;
use linkori_core::config::Config;
use linkori_core::models::UserProfile;
use linkori_core::session::{AuthStatus, SessionContext};

pub type Session = SessionContext<HttpAuthClient, Box<dyn CredentialStore>>;

pub fn status(session: &Session, json: bool) -> Result<()> {
    let snapshot = session.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }

    match snapshot.status() {
        AuthStatus::Unknown => println!("Session: undetermined"),
        AuthStatus::Unauthenticated => println!("Session: signed out"),
        AuthStatus::Authenticated { linked, .. } => {
            println!("Session: signed in");
            println!("Linked:  {}", if *linked { "yes" } else { "no" });
        }
    }
    if snapshot.is_refreshing() {
        println!("Refresh in progress");
    }
    Ok(())
}

pub async fn login(session: &Session, token: Option<String>) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => rpassword::prompt_password("Access token: ").context("Failed to read token")?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        bail!("No token given");
    }

    session.set_tokens(Some(token)).await;
    let session = session.reload();
    match session.is_authenticated() {
        Some(true) => {
            info!("Token accepted");
            println!("Signed in{}", if session.linked() { " (linked)" } else { "" });
            Ok(())
        }
        _ => bail!("Token was rejected by the server"),
    }
}

pub async fn callback(session: &Session, provider: Provider, code: &str) -> Result<()> {
    let token = session
        .client()
        .callback(provider, code)
        .await
        .with_context(|| format!("{} sign-in failed", provider.display_name()))?;
    login(session, Some(token)).await
}

pub fn logout(session: &Session) {
    session.logout();
    println!("Signed out");
}

pub async fn refresh(session: &Session) -> Result<()> {
    match session.refresh().await {
        Some(_) => {
            let session = session.reload();
            println!("Session renewed{}", if session.linked() { " (linked)" } else { "" });
            Ok(())
        }
        None => bail!("Could not renew the session; sign in again"),
    }
}

pub async fn whoami(session: &Session) -> Result<()> {
    let Some(token) = session.credential().map(str::to_string) else {
        bail!("Not signed in");
    };

    let user = match session.client().fetch_user(&token).await {
        Ok(user) => user,
        Err(ApiError::Unauthorized) => {
            warn!("Access token rejected, renewing once");
            let Some(renewed) = session.refresh().await else {
                bail!("Session expired; sign in again");
            };
            session.client().fetch_user(&renewed).await?
        }
        Err(e) => return Err(e.into()),
    };

    print_user(&user);
    Ok(())
}

fn print_user(user: &UserProfile) {
    println!("{} (#{})", user.display_name(), user.id);
    if let Some(location) = user.location_display() {
        println!("Location: {}", location);
    }
    if let Some(ref discord) = user.discord_user {
        println!("Discord:  {}", discord.nick);
    }
    if let Some(ref osu) = user.osu_user {
        println!("osu!:     {} ({})", osu.osu.nick, osu.osu.osu_id);
    }
}

pub async fn login_url(session: &Session, provider: Provider) -> Result<()> {
    // Passing the credential as state links the provider to this account.
    let state = session.credential();
    let url = session.client().login_url(provider, state).await?;
    println!("{}", url);
    Ok(())
}

pub fn config(config: &Config, path: Option<&Path>, save: bool) -> Result<()> {
    if !save {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let saved_to = match path {
        Some(path) => {
            config.save_to(path)?;
            path.to_path_buf()
        }
        None => {
            config.save()?;
            Config::config_path()?
        }
    };
    println!("Saved {}", saved_to.display());
    Ok(())
}
