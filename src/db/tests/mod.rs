use super::*;
use tempfile::TempDir;


/// Fresh database in a temporary directory; keep the `TempDir` alive for the test
async fn test_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&dir.path().join("outreach.db")).await.unwrap();
    (db, dir)
}

fn vendor(name: &str, code: &str) -> Vendor {
    Vendor {
        name: name.to_string(),
        code: code.to_string(),
        email: Some(format!("{}@example.com", code.to_lowercase())),
        ..Vendor::default()
    }
}
