pub mod models;
pub mod repositories;
pub mod test_utils;

use sea_orm::{Database, DatabaseConnection, DbErr};
use std::path::Path;

/// Opens the attendance database.
///
/// `path_or_url` may be a full DSN (`sqlite:...`) or a bare SQLite file path, in
/// which case the parent directory is created and the file is opened read-write-create.
pub async fn connect(path_or_url: &str) -> Result<DatabaseConnection, DbErr> {
    let url = if path_or_url.starts_with("sqlite:") {
        path_or_url.to_owned()
    } else {
        if let Some(parent) = Path::new(path_or_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbErr::Custom(format!("cannot create {}: {e}", parent.display())))?;
            }
        }
        format!("sqlite://{path_or_url}?mode=rwc")
    };

    tracing::debug!(%url, "connecting to database");
    Database::connect(&url).await
}
