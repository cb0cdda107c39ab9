//! Tests for CREATE TABLE and INSERT rendering.

use sql_backup::render::{quote_identifier, QuoteStyle, RenderOptions, SqlRenderer};
use sql_backup::schema::{Column, Constraint, DeclaredType, FieldType, Reference, Table};
use sql_backup::source::{Row, Value};
use sql_backup::Error;

fn renderer(soft: bool, pretty: bool) -> SqlRenderer {
    SqlRenderer::new(RenderOptions {
        soft,
        pretty,
        quote: QuoteStyle::Single,
    })
}

fn users() -> Table {
    Table::new("users")
        .with_column(
            Column::new("id", FieldType::Integer)
                .with_constraint(Constraint::NotNull)
                .with_constraint(Constraint::AutoIncrement),
        )
        .with_column(
            Column::new("name", DeclaredType::parse("VARCHAR(100)").unwrap())
                .with_constraint(Constraint::NotNull),
        )
}

fn orders() -> Table {
    Table::new("orders")
        .with_column(Column::new("id", FieldType::Integer).with_constraint(Constraint::PrimaryKey))
        .with_column(
            Column::new("user_id", FieldType::Integer).with_reference(Reference::new("users", "id")),
        )
}

mod create_tests {
    use super::*;

    #[test]
    fn test_compact_with_drop() {
        assert_eq!(
            renderer(false, false).render_create(&users()),
            "DROP TABLE IF EXISTS users;\n\
             CREATE TABLE users (id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, name VARCHAR(100) NOT NULL);\n"
        );
    }

    #[test]
    fn test_pretty_soft() {
        assert_eq!(
            renderer(true, true).render_create(&users()),
            "CREATE TABLE IF NOT EXISTS users (\n\
             \tid INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,\n\
             \tname VARCHAR(100) NOT NULL\n\
             );\n\n"
        );
    }

    #[test]
    fn test_foreign_key_clause() {
        assert_eq!(
            renderer(true, false).render_create(&orders()),
            "CREATE TABLE IF NOT EXISTS orders (id INTEGER PRIMARY KEY, user_id INTEGER, \
             FOREIGN KEY (user_id) REFERENCES users(id));\n"
        );
    }

    #[test]
    fn test_composite_primary_key_is_table_level_only() {
        let mut table = Table::new("memberships")
            .with_column(Column::new("user_id", FieldType::Integer))
            .with_column(Column::new("group_id", FieldType::Integer));
        table.mark_primary_key("user_id").unwrap();
        table.mark_primary_key("group_id").unwrap();

        let sql = renderer(true, false).render_create(&table);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS memberships (user_id INTEGER, group_id INTEGER, \
             PRIMARY KEY (user_id, group_id));\n"
        );
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn test_zero_column_table() {
        let table = Table::new("empty");
        assert_eq!(
            renderer(true, false).render_create(&table),
            "CREATE TABLE IF NOT EXISTS empty ();\n"
        );
        assert_eq!(
            renderer(false, true).render_create(&table),
            "DROP TABLE IF EXISTS empty;\nCREATE TABLE empty ();\n\n"
        );
    }

    #[test]
    fn test_untyped_column() {
        let table = Table::new("t").with_column(Column::new("anything", FieldType::Untyped));
        assert_eq!(
            renderer(true, false).render_create(&table),
            "CREATE TABLE IF NOT EXISTS t (anything);\n"
        );
    }

    #[test]
    fn test_no_trailing_separator() {
        for pretty in [false, true] {
            let sql = renderer(false, pretty).render_create(&orders());
            assert!(!sql.contains(",)"));
            assert!(!sql.contains(",\n)"));
            assert!(!sql.contains(", )"));
        }
    }

    #[test]
    fn test_pretty_only_changes_whitespace() {
        let compact = renderer(false, false).render_create(&orders());
        let pretty = renderer(false, true).render_create(&orders());
        let normalized = pretty
            .replace("(\n\t", "(")
            .replace(",\n\t", ", ")
            .replace("\n);", ");");
        assert_eq!(normalized.trim_end(), compact.trim_end());
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let r = renderer(false, true);
        assert_eq!(r.render_create(&users()), r.render_create(&users()));
    }

    #[test]
    fn test_render_schema_keeps_given_order() {
        let users = users();
        let orders = orders();
        let sql = renderer(true, false).render_schema([&users, &orders]);
        let users_at = sql.find("users (").unwrap();
        let orders_at = sql.find("orders (").unwrap();
        assert!(users_at < orders_at);
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_identifier("users"), "users");
        assert_eq!(quote_identifier("_tmp1"), "_tmp1");
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("Group"), "\"Group\"");
        assert_eq!(quote_identifier("my table"), "\"my table\"");
        assert_eq!(quote_identifier("1st"), "\"1st\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_keyword_table_name_is_quoted() {
        let table = Table::new("order").with_column(Column::new("group", FieldType::Text));
        assert_eq!(
            renderer(true, false).render_create(&table),
            "CREATE TABLE IF NOT EXISTS \"order\" (\"group\" TEXT);\n"
        );
    }
}

mod insert_tests {
    use super::*;

    fn people() -> Table {
        Table::new("users")
            .with_column(Column::new("id", FieldType::Integer))
            .with_column(Column::new("name", FieldType::Text))
    }

    #[test]
    fn test_double_quote_style_output() {
        let r = SqlRenderer::new(RenderOptions {
            quote: QuoteStyle::Double,
            ..Default::default()
        });
        let rows = vec![
            Ok(Row::new()
                .with("id", Value::Integer(1))
                .with("name", Value::Text("Alice".into()))),
            Ok(Row::new()
                .with("id", Value::Integer(2))
                .with("name", Value::Null)),
        ];
        assert_eq!(
            r.render_inserts(&people(), rows).unwrap(),
            "INSERT INTO users VALUES (1, \"Alice\");\nINSERT INTO users VALUES (2, null);\n"
        );
    }

    #[test]
    fn test_single_quotes_are_doubled() {
        let row = Row::new()
            .with("id", Value::Integer(3))
            .with("name", Value::Text("O'Brien".into()));
        assert_eq!(
            renderer(false, true).render_insert(&people(), &row).unwrap(),
            "INSERT INTO users VALUES (3, 'O''Brien');\n"
        );
    }

    #[test]
    fn test_values_follow_column_order() {
        let row = Row::new()
            .with("name", Value::Text("Bob".into()))
            .with("id", Value::Integer(7));
        assert_eq!(
            renderer(false, false).render_insert(&people(), &row).unwrap(),
            "INSERT INTO users VALUES (7, 'Bob');\n"
        );
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let row = Row::new().with("id", Value::Integer(1));
        let err = renderer(false, false)
            .render_insert(&people(), &row)
            .unwrap_err();
        assert!(matches!(err, Error::MissingValue { ref column, .. } if column == "name"));
    }

    #[test]
    fn test_row_error_stops_rendering() {
        let rows = vec![
            Ok(Row::new()
                .with("id", Value::Integer(1))
                .with("name", Value::Null)),
            Err(Error::Source("scan failed".into())),
        ];
        assert!(renderer(false, false)
            .render_inserts(&people(), rows)
            .is_err());
    }

    #[test]
    fn test_zero_rows_render_nothing() {
        let rows: Vec<sql_backup::Result<Row>> = Vec::new();
        assert_eq!(
            renderer(false, false)
                .render_inserts(&people(), rows)
                .unwrap(),
            ""
        );
    }
}

mod value_tests {
    use super::*;

    fn format(field_type: FieldType, value: Value) -> String {
        renderer(false, false).format_value(&Column::new("c", field_type), &value)
    }

    #[test]
    fn test_null_sentinels() {
        assert_eq!(format(FieldType::Text, Value::Null), "null");
        assert_eq!(format(FieldType::Text, Value::Text(String::new())), "null");
        assert_eq!(format(FieldType::Text, Value::Text("a\\Nb".into())), "null");
        assert_eq!(format(FieldType::Integer, Value::Text("\\N".into())), "null");
        assert_eq!(format(FieldType::Blob, Value::Blob(Vec::new())), "null");
    }

    #[test]
    fn test_character_domain_is_quoted() {
        assert_eq!(format(FieldType::Varchar, Value::Text("x".into())), "'x'");
        assert_eq!(format(FieldType::Text, Value::Integer(5)), "'5'");
        assert_eq!(format(FieldType::Char, Value::Text("42".into())), "'42'");
        assert_eq!(
            format(FieldType::Date, Value::Text("2024-01-15".into())),
            "'2024-01-15'"
        );
    }

    #[test]
    fn test_numeric_domain_is_unquoted() {
        assert_eq!(format(FieldType::Integer, Value::Integer(-12)), "-12");
        assert_eq!(format(FieldType::Real, Value::Real(1.5)), "1.5");
        assert_eq!(format(FieldType::Real, Value::Real(3.0)), "3.0");
        assert_eq!(
            format(FieldType::Decimal, Value::Numeric("12.50".into())),
            "12.50"
        );
        assert_eq!(format(FieldType::Boolean, Value::Boolean(true)), "true");
    }

    #[test]
    fn test_text_is_always_quoted() {
        assert_eq!(format(FieldType::Integer, Value::Text("abc".into())), "'abc'");
        assert_eq!(format(FieldType::Integer, Value::Text("42".into())), "'42'");
        assert_eq!(format(FieldType::Untyped, Value::Text("123".into())), "'123'");
        assert_eq!(format(FieldType::Blob, Value::Text("1.5e3".into())), "'1.5e3'");
    }

    #[test]
    fn test_numbers_in_untyped_columns_are_unquoted() {
        assert_eq!(format(FieldType::Untyped, Value::Integer(123)), "123");
        assert_eq!(format(FieldType::Blob, Value::Real(8.5)), "8.5");
    }

    #[test]
    fn test_special_reals() {
        assert_eq!(format(FieldType::Real, Value::Real(f64::NAN)), "null");
        assert_eq!(format(FieldType::Real, Value::Real(f64::INFINITY)), "9e999");
    }

    #[test]
    fn test_blob_hex_literal() {
        assert_eq!(
            format(FieldType::Blob, Value::Blob(vec![0xde, 0xad, 0x01])),
            "X'DEAD01'"
        );
    }
}
