use sqlite3_db::{
    config::{self, Config},
    smoke, Connection, Result,
};
use tracing::info;

const DEFAULT_DATABASE: &str = "testdb";

fn usage() -> ! {
    eprintln!("usage: sqlite3-smoke [--config FILE] [DATABASE]");
    std::process::exit(2);
}

/// Explicit `--config` wins; otherwise the default location is used when present.
fn load(config_path: Option<String>) -> Result<Config> {
    match config_path {
        Some(path) => config::load_config(path),
        None => match config::default_config_path() {
            Some(path) if path.exists() => config::load_config(path),
            _ => Ok(Config::default()),
        },
    }
}

fn run(config: &Config, db_path: &str) -> Result<()> {
    let mut db = Connection::open_with(db_path, &config.database.open)?;
    let stdout = std::io::stdout();
    let report = smoke::run_smoke(&db, &mut stdout.lock())?;
    info!(
        "Smoke scenario finished: {} rows, final step {}",
        report.rows, report.final_step
    );
    db.close()
}

fn main() {
    // Parse CLI arguments
    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    let mut db_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = Some(args.next().unwrap_or_else(|| usage())),
            "-h" | "--help" => usage(),
            _ if db_path.is_none() => db_path = Some(arg.clone()),
            _ => usage(),
        }
    }

    let config = match load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let level = config.log_level().unwrap_or_else(|e| {
        eprintln!("{}; falling back to info", e);
        tracing::Level::INFO
    });

    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let db_path = db_path
        .or_else(|| config.database.path.clone())
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
    info!("Starting sqlite3-smoke against {}", db_path);

    if let Err(e) = run(&config, &db_path) {
        eprintln!("Smoke scenario failed: {}", e);
        std::process::exit(1);
    }
}
