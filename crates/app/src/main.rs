use std::net::SocketAddr;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use lessons_core::model::{CategoryDraft, LessonDraft, RegistrationDraft, RegistrationError};
use services::{AccountServiceError, AppServices, Clock, Staff};
use tracing_subscriber::EnvFilter;
use web::AppState;

#[derive(Debug, Parser)]
#[command(name = "lessons", about = "Access-controlled video lesson library")]
struct Cli {
    /// `SQLite` database, as a `sqlite://` URL or a plain file path.
    #[arg(long, global = true, env = "LESSONS_DB_URL", default_value = "sqlite://lessons.sqlite3")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        #[arg(long, env = "LESSONS_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// How long a login session stays valid.
        #[arg(long, env = "LESSONS_SESSION_TTL_HOURS", default_value_t = 336)]
        session_ttl_hours: i64,
    },
    /// Create a staff account and some demo lessons.
    Seed {
        #[arg(long, env = "LESSONS_STAFF_USERNAME", default_value = "admin")]
        staff_username: String,

        #[arg(long, env = "LESSONS_STAFF_EMAIL", default_value = "admin@example.com")]
        staff_email: String,

        #[arg(long, env = "LESSONS_STAFF_PASSWORD")]
        staff_password: String,

        /// Number of demo lessons to create.
        #[arg(long, default_value_t = 3)]
        lessons: u32,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist before connecting.
fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid database url: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}

async fn open_services(db: &str, session_ttl: chrono::Duration) -> anyhow::Result<AppServices> {
    let db_url = normalize_sqlite_url(db);
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system(), session_ttl)
        .await
        .with_context(|| format!("opening {db_url}"))?;
    tracing::info!(db = %db_url, "storage ready");
    Ok(services)
}

async fn serve(db: &str, bind: SocketAddr, session_ttl_hours: i64) -> anyhow::Result<()> {
    if session_ttl_hours <= 0 {
        bail!("session ttl must be at least one hour");
    }
    let services = open_services(db, chrono::Duration::hours(session_ttl_hours)).await?;
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, web::router(AppState::new(services))).await?;
    Ok(())
}

async fn seed(
    db: &str,
    username: String,
    email: String,
    password: String,
    lessons: u32,
) -> anyhow::Result<()> {
    let services = open_services(db, chrono::Duration::hours(1)).await?;
    let accounts = services.accounts();

    let draft = RegistrationDraft {
        username: username.clone(),
        email,
        first_name: String::new(),
        last_name: String::new(),
        password1: password.clone(),
        password2: password.clone(),
    };
    match accounts.create_staff(draft).await {
        Ok(_) => {}
        Err(AccountServiceError::Registration(RegistrationError::UsernameTaken)) => {
            tracing::info!(%username, "staff account already exists");
        }
        Err(e) => return Err(e).context("creating staff account"),
    }

    let session = accounts
        .login(&username, &password)
        .await
        .context("signing in as staff")?;
    accounts.logout(&session.token).await?;
    let staff = Staff::verify(&session.user)
        .with_context(|| format!("{username} is not an active staff account"))?;

    if lessons == 0 {
        return Ok(());
    }

    let catalog = services.catalog();
    let category = catalog
        .create_category(
            &staff,
            CategoryDraft {
                name: "Getting started".into(),
                description: "Demo lessons".into(),
            },
        )
        .await?;
    for n in 1..=lessons {
        catalog
            .create_lesson(
                &staff,
                LessonDraft {
                    category_id: category,
                    title: format!("Lesson {n}"),
                    description: format!("Demo lesson number {n}."),
                    video_ref: format!("videos/lesson-{n}.mp4"),
                    thumbnail_ref: None,
                    duration: 240 + 60 * i64::from(n),
                    is_active: true,
                },
            )
            .await?;
    }
    tracing::info!(lessons, "demo lessons created");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve {
            bind,
            session_ttl_hours,
        } => serve(&cli.db, bind, session_ttl_hours).await,
        Command::Seed {
            staff_username,
            staff_email,
            staff_password,
            lessons,
        } => seed(&cli.db, staff_username, staff_email, staff_password, lessons).await,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("{err:#}");
        std::process::exit(2);
    }
}
