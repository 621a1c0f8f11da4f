//! campus -- command line front-end for the campus API.
//!
//! Loads configuration, restores the stored session, runs one command and
//! prints the result as JSON.

use std::path::PathBuf;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use campus_client::{CampusClient, CampusClientBuilder, Config};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

enum Command {
    Login(Option<String>),
    LoginGoogle(String),
    Whoami,
    Status,
    Courses,
    Course(i64),
    Contents(i64),
    Assignments(i64),
    Forums(i64),
    Refresh,
    Logout,
}

struct CliArgs {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> CliArgs {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                if let Some(path) = args.next() {
                    config_path = Some(PathBuf::from(path));
                } else {
                    fail("--config requires a path argument");
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("campus {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            other if other.starts_with('-') => fail(&format!("Unknown argument: {other}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        print_usage();
        std::process::exit(1);
    };
    let mut operand = || positional.next();

    let command = match name.as_str() {
        "login" => Command::Login(operand()),
        "login-google" => Command::LoginGoogle(required(operand(), "login-google", "ID_TOKEN")),
        "whoami" => Command::Whoami,
        "status" => Command::Status,
        "courses" => Command::Courses,
        "course" => Command::Course(id(operand(), "course", "ID")),
        "contents" => Command::Contents(id(operand(), "contents", "ID")),
        "assignments" => Command::Assignments(id(operand(), "assignments", "COURSE_ID")),
        "forums" => Command::Forums(id(operand(), "forums", "COURSE_ID")),
        "refresh" => Command::Refresh,
        "logout" => Command::Logout,
        other => fail(&format!("Unknown command: {other}")),
    };

    CliArgs {
        config_path,
        command,
    }
}

fn required(value: Option<String>, command: &str, name: &str) -> String {
    value.unwrap_or_else(|| fail(&format!("{command} requires {name}")))
}

fn id(value: Option<String>, command: &str, name: &str) -> i64 {
    let raw = required(value, command, name);
    raw.parse()
        .unwrap_or_else(|_| fail(&format!("{name} must be a number, got {raw}")))
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!("Run with --help for usage information.");
    std::process::exit(1);
}

fn print_usage() {
    println!(
        "\
campus {version} -- Moodle campus client

USAGE:
    campus [OPTIONS] <COMMAND>

COMMANDS:
    login [EMAIL]              Development login (server must allow it)
    login-google <ID_TOKEN>    Log in with a Google ID token
    whoami                     Show the current user
    status                     Show session and Moodle connection status
    courses                    List enrolled courses
    course <ID>                Show one course
    contents <ID>              Show the sections and activities of a course
    assignments <COURSE_ID>    List assignments of a course
    forums <COURSE_ID>         List forums of a course
    refresh                    Refresh the access token now
    logout                     Forget the stored session

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: campus.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    CAMPUS_CONFIG          Alternative to --config flag
    CAMPUS_API_URL         Backend base URL
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    // --config wins, then CAMPUS_CONFIG, then the default file name
    let config_path = cli
        .config_path
        .or_else(|| std::env::var("CAMPUS_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("campus.toml"));

    let config = Config::load(&config_path)?;
    init_tracing(&config);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        base_url = %config.api.base_url,
        storage = %config.storage.backend,
        "Starting campus"
    );
    for (key, var) in config.env_overrides.iter() {
        tracing::debug!(key, env = var, "Config overridden from environment");
    }

    let client = CampusClientBuilder::from_config(&config).build()?;

    // A one-shot process restores without the background refresh: a rotated
    // refresh token must be persisted before the process exits.
    client.session().restore().await?;

    run(&client, cli.command).await
}

async fn run(client: &CampusClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login(email) => print(&client.auth().dev_login(email.as_deref()).await?),
        Command::LoginGoogle(token) => print(&client.auth().login_with_google(&token).await?),
        Command::Whoami => print(&client.auth().current_user().await?),
        Command::Status => {
            let moodle = client.auth().moodle_status().await?;
            print(&serde_json::json!({
                "session": client.status(),
                "moodle": moodle,
            }))
        }
        Command::Courses => print(&client.courses().list().await?),
        Command::Course(id) => print(&client.courses().get(id).await?),
        Command::Contents(id) => print(&client.courses().contents(id).await?),
        Command::Assignments(course_id) => {
            print(&client.assignments().for_course(course_id).await?)
        }
        Command::Forums(course_id) => print(&client.forums().for_course(course_id).await?),
        Command::Refresh => {
            client.auth().refresh().await?;
            print(&client.status())
        }
        Command::Logout => {
            client.auth().logout().await;
            print(&client.status())
        }
    }
}

fn print<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("campus_client={level},campus={level},warn"))
    });

    // Logs go to stderr so stdout stays valid JSON.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
