use common::config::Config;
use migration::runner;
use std::{env, fs, path::Path, process};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = common::logger::init_logger(&config.log_level, &config.log_file) {
        eprintln!("Logger unavailable, continuing without it: {err}");
    }

    let url = sqlite_url(&config.database_url);
    let db_file = sqlite_file(&url);

    let args: Vec<String> = env::args().collect();
    let outcome = match args.get(1).map(|s| s.as_str()) {
        Some("clean") => {
            if let Some(path) = db_file {
                remove_db_file(path);
            }
            Ok(())
        }
        Some("fresh") => {
            if let Some(path) = db_file {
                remove_db_file(path);
                create_db_dir(path);
            }
            runner::run_all_migrations(&url).await
        }
        _ => {
            if let Some(path) = db_file {
                create_db_dir(path);
            }
            runner::run_all_migrations(&url).await
        }
    };

    match outcome {
        Ok(()) => log::info!("{}: schema up to date", config.project_name),
        Err(err) => {
            log::error!("Migration failed: {err}");
            eprintln!("Migration failed: {err}");
            process::exit(1);
        }
    }
}

/// Bare file paths are accepted as well as full `sqlite:` URLs.
fn sqlite_url(path_or_url: &str) -> String {
    if path_or_url.starts_with("sqlite:") {
        path_or_url.to_owned()
    } else {
        format!("sqlite://{path_or_url}?mode=rwc")
    }
}

/// Extracts the file path from a `sqlite://path?mode=rwc` URL; `None` for
/// in-memory or non-SQLite databases.
fn sqlite_file(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path.contains(":memory:") {
        None
    } else {
        Some(path)
    }
}

fn remove_db_file(path: &str) {
    let db_path = Path::new(path);
    if db_path.exists() {
        match fs::remove_file(db_path) {
            Ok(()) => println!("Deleted DB: {}", db_path.display()),
            Err(err) => eprintln!("Failed to delete DB {}: {err}", db_path.display()),
        }
    } else {
        println!("DB file does not exist: {}", db_path.display());
    }
}

fn create_db_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!("Failed to create DB directory {}: {err}", parent.display());
        }
    }
}
