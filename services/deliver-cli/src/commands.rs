//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use common::Secret;
use deliver_api::{AuthState, Json, NoContent, PlainText, RequestSpec, Session};

use crate::cli::{Commands, RequestArgs, ResponseKind, VerifyEmailCommand};

pub async fn run(command: Commands, session: &Session) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            session
                .login(&email, Secret::new(password))
                .await
                .context("Failed to log in")?;
            eprintln!("Logged in as {email}");
        }
        Commands::Register {
            username,
            email,
            password,
        } => {
            session
                .register(&username, &email, Secret::new(password))
                .await
                .context("Failed to register")?;
            eprintln!("Registered {username}; check {email} for a verification code");
        }
        Commands::Logout => {
            session.logout().await;
            eprintln!("Logged out");
        }
        Commands::Status => print_status(session.status().await.context("Failed to check session")?)?,
        Commands::VerifyEmail(VerifyEmailCommand::Send { email }) => {
            session
                .send_email_verification(&email)
                .await
                .context("Failed to request verification email")?;
            eprintln!("Verification code sent to {email}");
        }
        Commands::VerifyEmail(VerifyEmailCommand::Confirm { email, code }) => {
            session
                .confirm_email_verification(&code, &email)
                .await
                .context("Failed to confirm email")?;
            eprintln!("Email {email} verified");
        }
        Commands::Refresh => {
            let pair = session
                .pipeline()
                .coordinator()
                .force_refresh()
                .await
                .context("Refresh failed, log in again")?;
            eprintln!("Refreshed; access token valid until {} (unix ms)", pair.expires_at());
        }
        Commands::Request(args) => send_request(session, args).await?,
    }
    Ok(())
}

fn print_status(state: AuthState) -> Result<()> {
    match state {
        AuthState::Unauthenticated => println!("not logged in"),
        AuthState::NeedsVerification { email } => {
            println!("logged in, email {email} awaiting verification")
        }
        AuthState::Authenticated(profile) => {
            println!("{}", serde_json::to_string_pretty(&profile)?)
        }
    }
    Ok(())
}

async fn send_request(session: &Session, args: RequestArgs) -> Result<()> {
    check_path(&args.path)?;
    let body = match args.body {
        Some(raw) => {
            // Validate locally so a typo fails before any network call
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("--body is not valid JSON")?;
            Some(serde_json::to_vec(&value)?)
        }
        None => None,
    };

    let pipeline = session.pipeline();
    let method = reqwest::Method::from(args.method);
    match args.expect {
        ResponseKind::Json => {
            let spec = with_body(RequestSpec::<Json<serde_json::Value>>::new(method, args.path), body);
            let value = pipeline.send(&spec).await.context("Request failed")?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ResponseKind::Text => {
            let spec = with_body(RequestSpec::<PlainText>::new(method, args.path), body);
            let text = pipeline.send(&spec).await.context("Request failed")?;
            println!("{text}");
        }
        ResponseKind::None => {
            let spec = with_body(RequestSpec::<NoContent>::new(method, args.path), body);
            pipeline.send(&spec).await.context("Request failed")?;
            eprintln!("OK");
        }
    }
    Ok(())
}

fn with_body<R: deliver_api::ExpectedResponse>(
    spec: RequestSpec<R>,
    body: Option<Vec<u8>>,
) -> RequestSpec<R> {
    match body {
        Some(body) => spec.with_raw_body(body),
        None => spec,
    }
}

/// Refuse paths that would escape the configured base URL.
fn check_path(path: &str) -> Result<()> {
    if path.contains("://") {
        bail!("path must be relative to the base URL, got {path}");
    }
    Ok(())
}
