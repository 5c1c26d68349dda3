//! Operational password reset.
//!
//! Usage: `reset_password <email> <new-password>`
//!
//! Hashes the new password with the same Argon2id parameters the registration
//! flow uses and replaces the stored hash for the matching account. Intended
//! for operators recovering locked-out users; it does not touch sessions, so
//! outstanding tokens keep working until they expire.

use notvarmi_api::password;
use notvarmi_api::repository::{PostgresRepository, Repository};
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let (Some(email), Some(new_password)) = (args.next(), args.next()) else {
        eprintln!("usage: reset_password <email> <new-password>");
        return ExitCode::FAILURE;
    };

    let password_hash = match password::hash_password(&new_password) {
        Ok(hash) => hash,
        Err(e) => {
            eprintln!("refusing to reset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let db_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL must be set");
            return ExitCode::FAILURE;
        }
    };

    let pool = match PgPoolOptions::new().max_connections(1).connect(&db_url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to connect to Postgres: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let repo = PostgresRepository::new(pool);

    match repo.update_password(&email, &password_hash).await {
        Ok(true) => {
            println!("password updated for {}", email);
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("no user with email {}", email);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("update failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
