//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Talk to a DeliVer deployment through the authenticated request pipeline.
#[derive(Parser, Debug)]
#[command(name = "deliver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (falls back to CONFIG_PATH, then ./deliver.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the credential pair
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "DELIVER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in with it
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "DELIVER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored credentials
    Logout,

    /// Show whether the stored session is still accepted
    Status,

    /// Email verification
    #[command(subcommand)]
    VerifyEmail(VerifyEmailCommand),

    /// Force a credential refresh now
    Refresh,

    /// Send a request through the pipeline and print the response
    Request(RequestArgs),
}

#[derive(Subcommand, Debug)]
pub enum VerifyEmailCommand {
    /// Ask the backend to email a verification code
    Send {
        #[arg(long)]
        email: String,
    },
    /// Confirm the emailed code
    Confirm {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    #[arg(value_enum, ignore_case = true)]
    pub method: HttpMethod,

    /// Path under the base URL, e.g. /orders/active
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub body: Option<String>,

    /// How to read a successful response
    #[arg(long, value_enum, default_value_t = ResponseKind::Json)]
    pub expect: ResponseKind,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "UPPER")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    /// Any JSON value
    Json,
    /// A bare string, quoted or not
    Text,
    /// Empty or ignorable body
    None,
}
