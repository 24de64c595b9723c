//! Small operational CLI for the outbox store, mirroring the teacher's
//! `outbox-cli` (`transactional-outbox::bin::outbox_cli`): a leaked
//! entry (retry_count >= max_retries) is left in place per spec as a
//! human-visible signal, and this is the tool an operator reaches for
//! to give it a fresh set of attempts.

use std::env;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use outbox_store::PgOutboxRepository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = args[1].as_str();

    match cmd {
        "stats" if args.len() == 3 => {
            let pool = PgPool::connect(&args[2]).await?;
            let repo = PgOutboxRepository::new(pool);
            let (pending, age_seconds) = repo.pending_stats().await?;
            println!("pending={pending} oldest_pending_age_seconds={age_seconds}");
        }
        "reset-retry-since" if args.len() == 4 => {
            let ts: DateTime<Utc> = DateTime::parse_from_rfc3339(&args[2])?.with_timezone(&Utc);
            let pool = PgPool::connect(&args[3]).await?;
            let repo = PgOutboxRepository::new(pool);
            let count = repo.reset_retry_count_since(ts).await?;
            println!("reset retry_count for {count} entries created since {ts}");
        }
        "reset-retry-range" if args.len() == 5 => {
            let from = Uuid::parse_str(&args[2])?;
            let to = Uuid::parse_str(&args[3])?;
            let pool = PgPool::connect(&args[4]).await?;
            let repo = PgOutboxRepository::new(pool);
            let count = repo.reset_retry_count_range(from, to).await?;
            println!("reset retry_count for {count} entries between {from} and {to}");
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  outbox-admin-cli stats <DATABASE_URL>");
    eprintln!("  outbox-admin-cli reset-retry-since <rfc3339_ts> <DATABASE_URL>");
    eprintln!("  outbox-admin-cli reset-retry-range <from_uuid> <to_uuid> <DATABASE_URL>");
}
