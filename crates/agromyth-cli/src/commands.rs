//! Subcommand implementations. Each one drives a single session operation.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use agromyth_core::{
    Config, Credentials, ErrorKind, ErrorPayload, PasswordChange, ProfileUpdate, Registration,
    SessionManager, User,
};

const PASSWORD_ENV: &str = "AGROMYTH_PASSWORD";

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

fn prompt_yes_no(label: &str) -> Result<bool> {
    let answer = prompt(label)?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Turn a rejected operation into a CLI error, listing field problems.
fn failure(err: ErrorPayload) -> anyhow::Error {
    if err.kind == ErrorKind::Validation && !err.fields.is_empty() {
        let lines: Vec<String> = err
            .fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("  {}: {}", field, m)))
            .collect();
        anyhow!("Please fix the following:\n{}", lines.join("\n"))
    } else {
        anyhow!(err.user_message())
    }
}

fn print_user(user: &User) {
    println!("{} <{}>", user.display_name(), user.email);
    println!("  id:       {}", user.id);
    println!("  role:     {}", user.role_label());
    if let Some(ref location) = user.location {
        if !location.is_empty() {
            println!("  location: {}", location);
        }
    }
    if let Some(ref bio) = user.bio {
        if !bio.is_empty() {
            println!("  bio:      {}", bio);
        }
    }
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

pub async fn login(session: &SessionManager, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) if !email.is_empty() => email,
        _ => prompt("Email: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => prompt_password("Password: ")?,
    };
    if email.is_empty() || password.is_empty() {
        bail!("Email and password required");
    }

    let user = session
        .login(&Credentials::new(email.clone(), password))
        .await
        .map_err(failure)?;
    remember_email(config, &email);

    println!("Logged in as {}.", user.display_name());
    Ok(())
}

pub async fn status(session: &SessionManager, json: bool) -> Result<()> {
    let outcome = session.check_session().await;

    if json {
        let view = session.snapshot().view();
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    match outcome {
        Ok(Some(user)) => {
            print_user(&user);
            Ok(())
        }
        Ok(None) => {
            println!("Not logged in.");
            Ok(())
        }
        Err(err) => Err(anyhow!("Session ended: {}", err.user_message())),
    }
}

pub async fn register(session: &SessionManager, config: &mut Config) -> Result<()> {
    let registration = Registration {
        email: prompt("Email: ")?,
        first_name: prompt("First name: ")?,
        last_name: prompt("Last name: ")?,
        is_farmer: prompt_yes_no("Are you a farmer? [y/N] ")?,
        is_researcher: prompt_yes_no("Are you a researcher? [y/N] ")?,
        password: prompt_password("Password: ")?,
        password2: prompt_password("Confirm password: ")?,
    };

    let user = session.register(&registration).await.map_err(failure)?;
    remember_email(config, &registration.email);

    println!("Welcome, {}! You are now logged in.", user.display_name());
    Ok(())
}

pub async fn profile(session: &SessionManager, update: ProfileUpdate) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update; pass at least one profile field");
    }
    let user = session.update_profile(&update).await.map_err(failure)?;
    println!("Profile updated.");
    print_user(&user);
    Ok(())
}

pub async fn passwd(session: &SessionManager) -> Result<()> {
    if session.access_token().is_none() {
        bail!("Not logged in");
    }
    let old_password = prompt_password("Current password: ")?;
    let new_password = prompt_password("New password: ")?;
    let confirm = prompt_password("Confirm new password: ")?;
    if new_password != confirm {
        bail!("Passwords didn't match");
    }

    session
        .change_password(&PasswordChange {
            old_password,
            new_password,
        })
        .await
        .map_err(failure)?;
    println!("Password updated.");
    Ok(())
}

pub async fn refresh(session: &SessionManager) -> Result<()> {
    session.refresh_access_token().await.map_err(failure)?;
    println!("Access token renewed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_lists_fields() {
        let mut errors = std::collections::BTreeMap::new();
        errors.insert("email".to_string(), vec!["Enter a valid email address.".to_string()]);
        let message = failure(ErrorPayload::validation(errors)).to_string();
        assert!(message.contains("  email: Enter a valid email address."));

        let message = failure(ErrorPayload::auth("No active account")).to_string();
        assert_eq!(message, "Authentication failed: No active account");
    }
}
