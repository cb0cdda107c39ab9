//! Integration tests for the sql-backup binary.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sql_backup_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sql-backup"))
}

fn create_db(dir: &TempDir, name: &str, sql: &str) -> PathBuf {
    let path = dir.path().join(name);
    Connection::open(&path).unwrap().execute_batch(sql).unwrap();
    path
}

fn shop_db(dir: &TempDir) -> PathBuf {
    create_db(
        dir,
        "shop.db",
        r#"
CREATE TABLE orders (
  id INTEGER PRIMARY KEY,
  user_id INTEGER REFERENCES users(id)
);
CREATE TABLE users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL
);
CREATE TABLE audit_log (id INTEGER PRIMARY KEY, note TEXT);
INSERT INTO users (name) VALUES ('Alice');
INSERT INTO orders VALUES (1, 1);
"#,
    )
}

fn cyclic_db(dir: &TempDir) -> PathBuf {
    create_db(
        dir,
        "cyclic.sqlite",
        r#"
CREATE TABLE a (id INTEGER PRIMARY KEY, b_id INTEGER REFERENCES b(id));
CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id));
"#,
    )
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

mod dump_tests {
    use super::*;

    #[test]
    fn test_dump_writes_ordered_script() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);
        let out = dir.path().join("backup.sql");

        let output = sql_backup_bin()
            .arg("dump")
            .arg(&db)
            .arg(&out)
            .output()
            .expect("Failed to execute command");

        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let sql = fs::read_to_string(&out).unwrap();
        assert!(sql.find("CREATE TABLE users").unwrap() < sql.find("CREATE TABLE orders").unwrap());
        assert!(sql.contains("INSERT INTO users VALUES (1, 'Alice');"));
        assert!(sql.contains("FOREIGN KEY (user_id) REFERENCES users(id)"));

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Dumped 3 tables (2 rows)"));
    }

    #[test]
    fn test_dump_output_restores() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);
        let out = dir.path().join("backup.sql");

        let status = sql_backup_bin()
            .args(["dump", "--soft", "--compact"])
            .arg(&db)
            .arg(&out)
            .status()
            .unwrap();
        assert!(status.success());

        let restored = Connection::open_in_memory().unwrap();
        restored
            .execute_batch(&fs::read_to_string(&out).unwrap())
            .unwrap();
        let name: String = restored
            .query_row("SELECT name FROM users WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Alice");
    }

    #[test]
    fn test_bad_source_extension() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("shop.csv");
        fs::write(&source, "id\n1\n").unwrap();
        let out = dir.path().join("backup.sql");

        let output = sql_backup_bin()
            .arg("dump")
            .arg(&source)
            .arg(&out)
            .output()
            .unwrap();

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains(".sqlite"));
        assert!(!out.exists());
    }

    #[test]
    fn test_bad_output_extension() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);
        let out = dir.path().join("backup.txt");

        let output = sql_backup_bin().arg("dump").arg(&db).arg(&out).output().unwrap();

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains(".sql extension"));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("backup.sql");

        let output = sql_backup_bin()
            .arg("dump")
            .arg(dir.path().join("missing.db"))
            .arg(&out)
            .output()
            .unwrap();

        assert!(!output.status.success());
        assert!(!out.exists());
        assert_eq!(files_in(dir.path()), 0);
    }

    #[test]
    fn test_cycle_fails_without_output() {
        let dir = TempDir::new().unwrap();
        let db = cyclic_db(&dir);
        let out = dir.path().join("backup.sql");

        let output = sql_backup_bin().arg("dump").arg(&db).arg(&out).output().unwrap();

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("cycle"));
        assert!(!out.exists());
        assert_eq!(files_in(dir.path()), 1);
    }

    #[test]
    fn test_allow_cycles() {
        let dir = TempDir::new().unwrap();
        let db = cyclic_db(&dir);
        let out = dir.path().join("backup.sql");

        let output = sql_backup_bin()
            .args(["dump", "--allow-cycles"])
            .arg(&db)
            .arg(&out)
            .output()
            .unwrap();

        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("a, b"));
        let sql = fs::read_to_string(&out).unwrap();
        assert!(sql.contains("CREATE TABLE a"));
        assert!(sql.contains("CREATE TABLE b"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);
        let out = dir.path().join("backup.sql");

        let output = sql_backup_bin()
            .args(["dump", "--dry-run"])
            .arg(&db)
            .arg(&out)
            .output()
            .unwrap();

        assert!(output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("1. users"));
        assert!(!out.exists());
    }

    #[test]
    fn test_table_filters() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);
        let out = dir.path().join("backup.sql");

        let status = sql_backup_bin()
            .args(["dump", "--exclude", "audit%", "--schema-only"])
            .arg(&db)
            .arg(&out)
            .status()
            .unwrap();
        assert!(status.success());

        let sql = fs::read_to_string(&out).unwrap();
        assert!(!sql.contains("audit_log"));
        assert!(!sql.contains("INSERT"));
        assert!(sql.contains("CREATE TABLE orders"));
    }

    #[test]
    fn test_config_file() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);
        let out = dir.path().join("backup.sql");
        let config = dir.path().join("backup.yaml");
        fs::write(&config, "tables: [\"audit%\"]\nsoft: true\npretty: false\n").unwrap();

        let status = sql_backup_bin()
            .arg("dump")
            .arg("--config")
            .arg(&config)
            .arg(&db)
            .arg(&out)
            .status()
            .unwrap();
        assert!(status.success());

        let sql = fs::read_to_string(&out).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS audit_log (id INTEGER PRIMARY KEY, note TEXT);\n"
        );
    }

    #[test]
    fn test_schema_only_conflicts_with_data_only() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);

        let output = sql_backup_bin()
            .args(["dump", "--schema-only", "--data-only"])
            .arg(&db)
            .arg(dir.path().join("backup.sql"))
            .output()
            .unwrap();
        assert!(!output.status.success());
    }

    #[test]
    fn test_unknown_quote_style() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);

        let output = sql_backup_bin()
            .args(["dump", "--quote", "backtick"])
            .arg(&db)
            .arg(dir.path().join("backup.sql"))
            .output()
            .unwrap();
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown quote style"));
    }
}

mod order_tests {
    use super::*;

    #[test]
    fn test_order_text() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);

        let output = sql_backup_bin().arg("order").arg(&db).output().unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        let users = stdout.find(". users").unwrap();
        let orders = stdout.find(". orders").unwrap();
        assert!(users < orders);
    }

    #[test]
    fn test_order_json() {
        let dir = TempDir::new().unwrap();
        let db = shop_db(&dir);

        let output = sql_backup_bin()
            .args(["order", "--json"])
            .arg(&db)
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(json["ordering"], "topological");

        let tables = json["tables"].as_array().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["users", "audit_log", "orders"]);
        assert_eq!(tables[2]["depends_on"], serde_json::json!(["users"]));
        assert!(json.get("cyclic_tables").is_none());
    }

    #[test]
    fn test_order_check() {
        let dir = TempDir::new().unwrap();

        let output = sql_backup_bin()
            .args(["order", "--check"])
            .arg(shop_db(&dir))
            .output()
            .unwrap();
        assert!(output.status.success());

        let output = sql_backup_bin()
            .args(["order", "--check"])
            .arg(cyclic_db(&dir))
            .output()
            .unwrap();
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("Check FAILED"));
    }

    #[test]
    fn test_completions() {
        let output = sql_backup_bin().args(["completions", "bash"]).output().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("sql-backup"));
    }
}
