//! LessonHub CLI - operator tools for the API.
//!
//! # Usage
//!
//! ```bash
//! # Hash a password for admin_users.password_hash
//! lh-cli admin hash-password 'correct horse battery staple'
//!
//! # Check an admin_session cookie against a stored hash
//! ADMIN_SESSION_SECRET=... lh-cli admin check-token -e admin@example.com --hash '$2b$12$...' <token>
//!
//! # Generate the RSA keypair for encrypted auth payloads
//! lh-cli keygen --out-dir keys
//! ```
//!
//! # Commands
//!
//! - `admin hash-password` - bcrypt hash for seeding admin rows
//! - `admin check-token` - Verify an admin session token
//! - `keygen` - Write `private_key.pem` and `public_key.pem`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lh-cli")]
#[command(author, version, about = "LessonHub CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Admin credentials and sessions
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Generate the RSA keypair for encrypted auth payloads
    Keygen {
        /// Directory the PEM files are written to
        #[arg(short, long, default_value = "keys")]
        out_dir: PathBuf,

        /// RSA modulus size
        #[arg(short, long, default_value_t = commands::keygen::DEFAULT_BITS)]
        bits: usize,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Print a bcrypt hash of a password
    HashPassword {
        /// bcrypt cost factor
        #[arg(short, long, default_value_t = commands::admin::DEFAULT_COST)]
        cost: u32,

        /// Password to hash
        password: String,
    },
    /// Verify an admin session token
    CheckToken {
        /// Admin email the token should name
        #[arg(short, long)]
        email: String,

        /// Stored password hash the token is bound to
        #[arg(long)]
        hash: String,

        /// Signing secret
        #[arg(long, env = "ADMIN_SESSION_SECRET", hide_env_values = true)]
        secret: String,

        /// The `admin_session` cookie value
        token: String,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli);

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Admin { action } => match action {
            AdminAction::HashPassword { cost, password } => {
                let hash = commands::admin::hash_password(&password, cost)?;
                #[allow(clippy::print_stdout)]
                {
                    println!("{hash}");
                }
            }
            AdminAction::CheckToken {
                email,
                hash,
                secret,
                token,
            } => {
                let claims = commands::admin::check_token(&token, &email, &hash, secret)?;
                #[allow(clippy::print_stdout)]
                {
                    println!("valid session for {} (expires {})", claims.email, claims.exp);
                }
            }
        },
        Commands::Keygen { out_dir, bits } => {
            let written = commands::keygen::generate(&out_dir, bits)?;
            tracing::info!(
                private = %written.private_key.display(),
                public = %written.public_key.display(),
                "Wrote payload keypair"
            );
        }
    }
    Ok(())
}
