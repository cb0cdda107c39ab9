//! End-to-end tests for the dump pipeline over an in-memory source.

use sql_backup::dump::{validate_paths, DumpConfig, DumpOptions, Dumper, SourceKind};
use sql_backup::error::ErrorKind;
use sql_backup::render::{QuoteStyle, RenderOptions};
use sql_backup::schema::OrderStrategy;
use sql_backup::source::{MemorySource, SourceOperation, TableFilter, Value};
use sql_backup::writer::{OutputFile, SqlWriter};
use sql_backup::Error;
use std::cell::RefCell;
use std::fs;
use tempfile::TempDir;

fn shop() -> MemorySource {
    MemorySource::new()
        .column("orders", "id", "INTEGER", false)
        .column("orders", "user_id", "INTEGER", true)
        .primary_key("orders", "id")
        .foreign_key("orders", "user_id", "users", "id")
        .auto_increment_column("users", "id", "INTEGER")
        .column("users", "name", "TEXT", false)
        .primary_key("users", "id")
        .row("users", [("id", Value::Integer(1)), ("name", Value::Text("Alice".into()))])
        .row("users", [("id", Value::Integer(2)), ("name", Value::Text("Bob".into()))])
        .row("orders", [("id", Value::Integer(10)), ("user_id", Value::Integer(1))])
}

fn cyclic() -> MemorySource {
    MemorySource::new()
        .column("a", "id", "INTEGER", false)
        .column("a", "b_id", "INTEGER", true)
        .foreign_key("a", "b_id", "b", "id")
        .column("b", "id", "INTEGER", false)
        .column("b", "a_id", "INTEGER", true)
        .foreign_key("b", "a_id", "a", "id")
}

fn compact() -> DumpOptions {
    DumpOptions {
        render: RenderOptions {
            soft: true,
            pretty: false,
            quote: QuoteStyle::Single,
        },
        ..Default::default()
    }
}

fn run(source: &MemorySource, options: DumpOptions) -> sql_backup::Result<String> {
    let mut writer = SqlWriter::new(Vec::new());
    Dumper::new(source, options).dump(&mut writer)?;
    Ok(String::from_utf8(writer.finish()?).unwrap())
}

mod dump_tests {
    use super::*;

    #[test]
    fn test_full_compact_dump() {
        let sql = run(&shop(), compact()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS users (id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);\n\
             CREATE TABLE IF NOT EXISTS orders (id INTEGER NOT NULL PRIMARY KEY, user_id INTEGER, \
             FOREIGN KEY (user_id) REFERENCES users(id));\n\
             INSERT INTO users VALUES (1, 'Alice');\n\
             INSERT INTO users VALUES (2, 'Bob');\n\
             INSERT INTO orders VALUES (10, 1);\n"
        );
    }

    #[test]
    fn test_pretty_dump_separates_tables() {
        let sql = run(&shop(), DumpOptions::default()).unwrap();
        assert!(sql.starts_with("DROP TABLE IF EXISTS users;\nCREATE TABLE users (\n\t"));
        assert!(sql.contains(");\n\nDROP TABLE IF EXISTS orders;\n"));
        assert!(sql.contains("INSERT INTO users VALUES (2, 'Bob');\n\nINSERT INTO orders"));
        assert!(sql.ends_with("INSERT INTO orders VALUES (10, 1);\n\n"));
    }

    #[test]
    fn test_stats() {
        let source = shop();
        let mut writer = SqlWriter::new(Vec::new());
        let stats = Dumper::new(&source, compact()).dump(&mut writer).unwrap();
        assert_eq!(stats.tables, 2);
        assert_eq!(stats.rows, 3);
        assert!(stats.warnings.is_empty());
        assert!(stats.cyclic_tables.is_empty());
    }

    #[test]
    fn test_one_group_per_batch() {
        let source = shop().with_batch_size(1);
        let mut writer = SqlWriter::new(Vec::new());
        Dumper::new(&source, compact()).dump(&mut writer).unwrap();
        // two CREATE groups and one group per row
        assert_eq!(writer.groups_written(), 5);
    }

    #[test]
    fn test_schema_only() {
        let options = DumpOptions {
            schema_only: true,
            ..compact()
        };
        let sql = run(&shop(), options).unwrap();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(!sql.contains("INSERT"));
    }

    #[test]
    fn test_data_only() {
        let options = DumpOptions {
            data_only: true,
            ..compact()
        };
        let sql = run(&shop(), options).unwrap();
        assert!(!sql.contains("CREATE"));
        assert_eq!(sql.lines().count(), 3);
    }

    #[test]
    fn test_double_quote_style() {
        let options = DumpOptions {
            render: RenderOptions {
                quote: QuoteStyle::Double,
                ..compact().render
            },
            data_only: true,
            ..Default::default()
        };
        let sql = run(&shop(), options).unwrap();
        assert!(sql.starts_with("INSERT INTO users VALUES (1, \"Alice\");\n"));
    }

    #[test]
    fn test_pairwise_ordering() {
        let options = DumpOptions {
            ordering: OrderStrategy::Pairwise,
            schema_only: true,
            ..compact()
        };
        let sql = run(&shop(), options).unwrap();
        assert!(sql.find("users (").unwrap() < sql.find("orders (").unwrap());
    }

    #[test]
    fn test_zero_column_table_has_no_data() {
        let source = shop().table("empty");
        let sql = run(&source, compact()).unwrap();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS empty ();\n"));
        assert!(!sql.contains("INSERT INTO empty"));
    }

    #[test]
    fn test_progress_reports_each_table() {
        let calls = RefCell::new(Vec::new());
        let source = shop();
        let mut writer = SqlWriter::new(Vec::new());
        Dumper::new(&source, compact())
            .with_progress(|done, total, table| {
                calls.borrow_mut().push((done, total, table.to_string()))
            })
            .dump(&mut writer)
            .unwrap();
        assert_eq!(
            calls.into_inner(),
            vec![(1, 2, "users".to_string()), (2, 2, "orders".to_string())]
        );
    }
}

mod failure_tests {
    use super::*;

    #[test]
    fn test_cycle_fails_by_default() {
        let err = run(&cyclic(), compact()).unwrap_err();
        assert!(matches!(err, Error::Cycle { ref tables } if tables == &["a", "b"]));
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_cycle_allowed_appends_tables() {
        let options = DumpOptions {
            allow_cycles: true,
            schema_only: true,
            ..compact()
        };
        let source = cyclic();
        let mut writer = SqlWriter::new(Vec::new());
        let stats = Dumper::new(&source, options).dump(&mut writer).unwrap();
        assert_eq!(stats.cyclic_tables, vec!["a", "b"]);

        let sql = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(sql.find("a (").unwrap() < sql.find("b (").unwrap());
    }

    #[test]
    fn test_excluding_a_referenced_table_fails() {
        let options = DumpOptions {
            filter: TableFilter::parse(None, Some("users")).unwrap(),
            ..compact()
        };
        let err = run(&shop(), options).unwrap_err();
        assert!(matches!(err, Error::DanglingReference { ref referenced_table, .. }
            if referenced_table == "users"));
    }

    #[test]
    fn test_include_filter() {
        let options = DumpOptions {
            filter: TableFilter::parse(Some("us%"), None).unwrap(),
            ..compact()
        };
        let sql = run(&shop(), options).unwrap();
        assert!(sql.contains("users"));
        assert!(!sql.contains("orders"));
    }

    #[test]
    fn test_scan_failure_propagates() {
        let err = run(&shop().fail_on(SourceOperation::FetchRows), compact()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceAccess);
    }

    #[test]
    fn test_row_missing_a_column_fails() {
        let source = shop().row("users", [("id", Value::Integer(3))]);
        let err = run(&source, compact()).unwrap_err();
        assert!(matches!(err, Error::MissingValue { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_failed_dump_leaves_no_output_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("backup.sql");
        let source = shop().fail_on(SourceOperation::FetchRows);

        let mut output = OutputFile::create(&target).unwrap();
        assert!(Dumper::new(&source, compact())
            .dump(output.writer())
            .is_err());
        drop(output);

        assert!(!target.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_successful_dump_replaces_output_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("backup.sql");
        fs::write(&target, "stale").unwrap();

        let source = shop();
        let mut output = OutputFile::create(&target).unwrap();
        Dumper::new(&source, compact())
            .dump(output.writer())
            .unwrap();
        output.persist().unwrap();

        let sql = fs::read_to_string(&target).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS users"));
    }
}

mod plan_tests {
    use super::*;

    #[test]
    fn test_plan_reads_no_rows() {
        let source = shop().fail_on(SourceOperation::FetchRows);
        let plan = Dumper::new(&source, compact()).plan().unwrap();
        assert_eq!(plan.order, vec!["users", "orders"]);
        let names: Vec<&str> = plan.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);
    }

    #[test]
    fn test_validate_paths() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("shop.sqlite");
        fs::write(&db, "").unwrap();
        let out = dir.path().join("out.sql");

        assert_eq!(validate_paths(&db, &out).unwrap(), SourceKind::Sqlite);

        let err = validate_paths(&dir.path().join("shop.csv"), &out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = validate_paths(&db, &dir.path().join("out.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = validate_paths(&dir.path().join("missing.db"), &out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_source_kind_from_extension() {
        use std::path::Path;
        assert_eq!(SourceKind::from_path(Path::new("a.DB")), Some(SourceKind::Sqlite));
        assert_eq!(SourceKind::from_path(Path::new("a.sqlite3")), Some(SourceKind::Sqlite));
        assert_eq!(SourceKind::from_path(Path::new("a.duckdb")), Some(SourceKind::DuckDb));
        assert_eq!(SourceKind::from_path(Path::new("a")), None);
    }

    #[test]
    fn test_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.yaml");
        fs::write(&path, "tables: [\"user%\"]\nsoft: true\nordering: pairwise\n").unwrap();

        let config = DumpConfig::load(&path).unwrap();
        assert_eq!(config.tables, vec!["user%"]);
        assert!(config.soft);
        assert!(config.pretty);
        assert_eq!(config.ordering, OrderStrategy::Pairwise);
    }
}
