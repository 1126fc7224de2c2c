use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use classroom_api::auth::{PasswordService, Role};

#[derive(Parser, Debug)]
#[command(
    name = "create_teacher",
    about = "Create a local teacher (or admin) account for the classroom API"
)]
struct Args {
    /// Email address used to log in (case insensitive).
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store.
    #[arg(long)]
    password: String,

    #[arg(long)]
    display_name: Option<String>,

    /// Role to assign (`teacher` or `admin`).
    #[arg(long, default_value = "teacher")]
    role: String,

    /// Database URL; falls back to `DATABASE_URL`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

fn fail(message: &str) -> ! {
    let _ = writeln!(io::stderr(), "error: {message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();
    if !email.contains('@') {
        fail("email must contain '@'");
    }

    let role: Role = args
        .role
        .parse()
        .unwrap_or_else(|err: String| fail(&format!("{err}. Use 'teacher' or 'admin'.")));

    let password_service = PasswordService::new()
        .map_err(|err| io::Error::other(format!("argon2 init failed: {err}")))?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| io::Error::other(format!("password hash failed: {err}")))?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&args.database_url)
        .await?;

    let mut tx = pool.begin().await?;

    let existing =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE lower(email) = lower($1)")
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;
    if existing > 0 {
        fail(&format!("an account with email '{email}' already exists."));
    }

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (auth_provider, email, display_name, role) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind("local")
    .bind(&email)
    .bind(args.display_name.as_deref())
    .bind(role.as_str())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO local_user_credentials (user_id, password_hash) VALUES ($1, $2)")
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    println!(
        "Created {} account '{email}' with id {user_id}",
        role.as_str()
    );
    Ok(())
}
