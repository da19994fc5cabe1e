use std::fmt;
use std::path::PathBuf;

use prep_core::model::{AuthIdentity, AuthUser, MockExamId, TopicId, UserId};
use services::tutor::gateway_from_env;
use services::{AppServices, Clock, RetryPolicy};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidUser { raw: String },
    MissingUser,
    MissingMessage,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "a command is required"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value (expected UUID): {raw}"),
            ArgsError::MissingUser => write!(f, "this command needs --user or PREP_USER_ID"),
            ArgsError::MissingMessage => write!(f, "tutor needs a message"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(raw: String, flag: &'static str) -> Result<u64, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- migrate      [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- import       --topic <id> --file <csv> [common]");
    eprintln!("  cargo run -p app -- practice     --topic <id> [common]");
    eprintln!("  cargo run -p app -- exam         --id <mock_exam_id> [common]");
    eprintln!("  cargo run -p app -- stats        [common]");
    eprintln!("  cargo run -p app -- leaderboard  [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- tutor        <message...> [common]");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>    SQLite URL (default: sqlite://prep.sqlite3)");
    eprintln!("  --user <uuid>        Signed-in user id");
    eprintln!("  --email <address>    Signed-in user email");
    eprintln!("  --name <name>        Display name used when the profile has none");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PREP_DB_URL, PREP_USER_ID, PREP_USER_EMAIL, PREP_USER_NAME");
    eprintln!("  PREP_AI_BASE_URL, PREP_AI_API_KEY, PREP_AI_MODEL");
    eprintln!("  PREP_TUTOR_URL, PREP_TUTOR_ANON_KEY");
    eprintln!("  PREP_RETRY_ATTEMPTS, PREP_RETRY_BASE_MS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Migrate,
    Import { topic: TopicId, file: PathBuf },
    Practice { topic: TopicId },
    Exam { id: MockExamId },
    Stats,
    Leaderboard,
    Tutor { message: String },
}

impl Command {
    fn needs_user(&self) -> bool {
        !matches!(self, Self::Migrate | Self::Leaderboard)
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    user: Option<UserId>,
    email: String,
    name: Option<String>,
    command: Command,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let name = args.next().ok_or(ArgsError::MissingCommand)?;
        if matches!(name.as_str(), "--help" | "-h" | "help") {
            print_usage();
            std::process::exit(0);
        }

        let mut db_url = std::env::var("PREP_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://prep.sqlite3".into(), normalize_sqlite_url);
        let mut user = match std::env::var("PREP_USER_ID") {
            Ok(raw) => Some(raw.parse().map_err(|_| ArgsError::InvalidUser { raw })?),
            Err(_) => None,
        };
        let mut email =
            std::env::var("PREP_USER_EMAIL").unwrap_or_else(|_| "student@localhost".into());
        let mut display_name = std::env::var("PREP_USER_NAME").ok();
        let mut topic = None;
        let mut exam = None;
        let mut file = None;
        let mut words = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?,
                    );
                }
                "--email" => email = require_value(&mut args, "--email")?,
                "--name" => display_name = Some(require_value(&mut args, "--name")?),
                "--topic" => {
                    let value = require_value(&mut args, "--topic")?;
                    topic = Some(TopicId::new(parse_id(value, "--topic")?));
                }
                "--id" => {
                    let value = require_value(&mut args, "--id")?;
                    exam = Some(MockExamId::new(parse_id(value, "--id")?));
                }
                "--file" => file = Some(PathBuf::from(require_value(&mut args, "--file")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => words.push(arg),
            }
        }

        let command = match name.as_str() {
            "migrate" => Command::Migrate,
            "import" => Command::Import {
                topic: topic.ok_or(ArgsError::MissingFlag { flag: "--topic" })?,
                file: file.ok_or(ArgsError::MissingFlag { flag: "--file" })?,
            },
            "practice" => Command::Practice {
                topic: topic.ok_or(ArgsError::MissingFlag { flag: "--topic" })?,
            },
            "exam" => Command::Exam {
                id: exam.ok_or(ArgsError::MissingFlag { flag: "--id" })?,
            },
            "stats" => Command::Stats,
            "leaderboard" => Command::Leaderboard,
            "tutor" => {
                let message = words.join(" ");
                if message.trim().is_empty() {
                    return Err(ArgsError::MissingMessage);
                }
                Command::Tutor { message }
            }
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        if !matches!(command, Command::Tutor { .. }) {
            if let Some(word) = words.into_iter().next() {
                return Err(ArgsError::UnknownArg(word));
            }
        }

        Ok(Self {
            db_url,
            user,
            email,
            name: display_name,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn login(services: &AppServices, args: &Args) -> Result<AuthUser, Box<dyn std::error::Error>> {
    let id = args.user.ok_or(ArgsError::MissingUser)?;
    let user = services
        .context()
        .login(AuthIdentity {
            id,
            email: args.email.clone(),
            display_name: args.name.clone(),
            avatar_url: None,
        })
        .await?;
    Ok(user)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::new_sqlite(
        &args.db_url,
        Clock::default_clock(),
        RetryPolicy::from_env(),
        gateway_from_env(),
    )
    .await?;
    info!(db = %args.db_url, "storage ready");

    if args.command.needs_user() {
        let user = login(&services, &args).await?;
        info!(user_id = %user.id, username = %user.username, "signed in");
    }

    match &args.command {
        Command::Migrate => println!("Database ready at {}", args.db_url),
        Command::Import { topic, file } => {
            let text = std::fs::read_to_string(file)?;
            let report = services.admin().import_csv(*topic, &text).await?;
            println!(
                "Imported {} questions ({} rows skipped)",
                report.inserted.len(),
                report.skipped.len()
            );
            for row in &report.skipped {
                println!("  line {}: {:?}", row.line, row.reason);
            }
        }
        Command::Practice { topic } => terminal::practice(&services.practice(), *topic).await?,
        Command::Exam { id } => terminal::exam(&services.exams(), *id).await?,
        Command::Stats => {
            let user = services.context().require_user()?;
            let stats = services.achievements().stats(user.id).await?;
            println!(
                "{}: {}/{} correct ({:.1}%), streak {} day(s)",
                user.username,
                stats.total_correct,
                stats.total_attempted,
                stats.accuracy_percent(),
                stats.current_streak
            );
            for row in services.achievements().overview(user.id).await? {
                let mark = if row.earned { "x" } else { " " };
                println!(
                    "  [{mark}] {:<20} {:>3}%  {}",
                    row.achievement.name, row.percent, row.achievement.description
                );
            }
            for attempt in services.exams().history(5).await? {
                println!(
                    "  {} {}/{} ({}%) on {}",
                    attempt.exam.name,
                    attempt.score,
                    attempt.total,
                    attempt.percent,
                    attempt.completed_at.format("%Y-%m-%d")
                );
            }
        }
        Command::Leaderboard => {
            for entry in services.dashboard().leaderboard().await? {
                println!(
                    "{:>3}. {:<24} {:>5} correct / {:>5}",
                    entry.rank, entry.username, entry.total_correct, entry.total_attempted
                );
            }
        }
        Command::Tutor { message } => {
            let reply = services.tutor().send(message).await?;
            println!("{}", reply.message);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(ToString::to_string))
    }

    #[test]
    fn import_needs_topic_and_file() {
        let args = parse(&["import", "--topic", "3", "--file", "q.csv", "--db", "sqlite::memory:"])
            .unwrap();
        assert_eq!(
            args.command,
            Command::Import {
                topic: TopicId::new(3),
                file: PathBuf::from("q.csv"),
            }
        );
        assert_eq!(args.db_url, "sqlite::memory:");
        assert!(matches!(
            parse(&["import", "--topic", "3"]),
            Err(ArgsError::MissingFlag { flag: "--file" })
        ));
    }

    #[test]
    fn tutor_joins_words() {
        let args = parse(&["tutor", "what", "is", "osmosis?"]).unwrap();
        assert_eq!(
            args.command,
            Command::Tutor {
                message: "what is osmosis?".into()
            }
        );
        assert!(matches!(parse(&["tutor"]), Err(ArgsError::MissingMessage)));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["exam", "--id", "abc"]),
            Err(ArgsError::InvalidId { flag: "--id", .. })
        ));
        assert!(matches!(
            parse(&["stats", "--user", "nope"]),
            Err(ArgsError::InvalidUser { .. })
        ));
        assert!(matches!(
            parse(&["stats", "extra"]),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(parse(&["launch"]), Err(ArgsError::UnknownCommand(_))));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/prep.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/prep.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
