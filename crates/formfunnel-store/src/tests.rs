#[cfg(test)]
mod tests {
    use crate::executor::{Database, Store};
    use crate::query::{Condition, Operator, RowUpdate, Selection};
    use formfunnel_core::{parse_request_data, ColumnSchema, Payload, TableSchema};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn leads_table() -> TableSchema {
        TableSchema::new(
            "leads",
            vec![
                ColumnSchema::new("name", "TEXT"),
                ColumnSchema::new("email", "TEXT"),
                ColumnSchema::new("mailing_list", "INTEGER"),
                ColumnSchema::new("verification_token", "TEXT UNIQUE"),
                ColumnSchema::new("user_token", "TEXT"),
                ColumnSchema::new("autokey", "INTEGER PRIMARY KEY"),
            ],
            ["verification_token", "user_token", "autokey"],
        )
    }

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    async fn setup_database() -> (Database, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::new(dir.path().join("db").join("interesados.db"));
        let db = store.open().await.expect("open");
        db.create_table(&leads_table()).await.expect("create");
        (db, dir)
    }

    async fn insert_lead(db: &Database, name: &str, token: &str) {
        let table = leads_table();
        let mut row = parse_request_data(
            &payload(json!({"name": name, "email": format!("{name}@example.org"), "mailing_list": 1})),
            &table,
        );
        row.set("verification_token", token);
        db.insert_row("leads", &row).await.expect("insert");
    }

    #[tokio::test]
    async fn insert_then_select() {
        let (db, _dir) = setup_database().await;
        insert_lead(&db, "harold", "tok-1").await;

        let selection = Selection::new(
            ["name", "email", "mailing_list", "user_token", "autokey"],
            Condition::eq("verification_token", "tok-1"),
        );
        let row = db
            .select_one("leads", &selection)
            .await
            .expect("select")
            .expect("row present");
        assert_eq!(row.get_str("name"), Some("harold"));
        assert_eq!(row.get_str("email"), Some("harold@example.org"));
        assert_eq!(row.get("mailing_list"), Some(&json!(1)));
        assert_eq!(row.get("user_token"), Some(&Value::Null));
        assert_eq!(row.get("autokey"), Some(&json!(1)));
        assert_eq!(row.get("missing"), None);
        db.close().await;
    }

    #[tokio::test]
    async fn select_without_match_is_none() {
        let (db, _dir) = setup_database().await;
        insert_lead(&db, "harold", "tok-1").await;
        let selection = Selection::new(["name"], Condition::eq("verification_token", "nope"));
        assert!(db.select_one("leads", &selection).await.expect("select").is_none());
    }

    #[tokio::test]
    async fn update_replaces_token() {
        let (db, _dir) = setup_database().await;
        insert_lead(&db, "harold", "tok-1").await;
        insert_lead(&db, "maude", "tok-2").await;

        let update = RowUpdate::new(Condition::eq("verification_token", "tok-1"))
            .set("user_token", "user-1")
            .set("verification_token", "ALREADY_VERIFIED");
        let affected = db.update_rows("leads", &[update]).await.expect("update");
        assert_eq!(affected, 1);

        let selection = Selection::new(
            ["verification_token", "user_token"],
            Condition::eq("name", "harold"),
        );
        let row = db.select_one("leads", &selection).await.expect("select").expect("row");
        assert_eq!(row.get_str("verification_token"), Some("ALREADY_VERIFIED"));
        assert_eq!(row.get_str("user_token"), Some("user-1"));

        let untouched = Selection::new(["user_token"], Condition::eq("name", "maude"));
        let row = db.select_one("leads", &untouched).await.expect("select").expect("row");
        assert_eq!(row.get("user_token"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn extra_conditions_narrow_selection() {
        let (db, _dir) = setup_database().await;
        insert_lead(&db, "harold", "tok-1").await;
        insert_lead(&db, "maude", "tok-2").await;

        let selection = Selection::new(["name"], Condition::new("autokey", Operator::GtEq, 1))
            .and(Condition::new("name", Operator::NotEq, "harold"));
        let row = db.select_one("leads", &selection).await.expect("select").expect("row");
        assert_eq!(row.get_str("name"), Some("maude"));
    }

    #[tokio::test]
    async fn unique_violation_is_storage_error() {
        let (db, _dir) = setup_database().await;
        insert_lead(&db, "harold", "tok-1").await;
        let table = leads_table();
        let mut row = parse_request_data(
            &payload(json!({"name": "again", "email": "a@b.c", "mailing_list": 0})),
            &table,
        );
        row.set("verification_token", "tok-1");
        let err = db.insert_row("leads", &row).await.expect_err("duplicate token");
        assert!(err.to_string().starts_with("storage error"));
    }

    #[tokio::test]
    async fn strings_are_stored_verbatim() {
        let (db, _dir) = setup_database().await;
        insert_lead(&db, "O'Brien \"Bobby\"", "tok-q").await;
        let selection = Selection::new(["name"], Condition::eq("verification_token", "tok-q"));
        let row = db.select_one("leads", &selection).await.expect("select").expect("row");
        assert_eq!(row.get_str("name"), Some("O'Brien \"Bobby\""));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let store = Store::new(dir.path().join("interesados.db"));
        let db = store.open().await.expect("open");
        db.create_table(&leads_table()).await.expect("create");
        insert_lead(&db, "harold", "tok-1").await;
        db.close().await;

        let db = store.open().await.expect("reopen");
        db.create_table(&leads_table()).await.expect("create is idempotent");
        let selection = Selection::new(["name"], Condition::eq("verification_token", "tok-1"));
        assert!(db.select_one("leads", &selection).await.expect("select").is_some());
        db.close().await;
    }

    #[tokio::test]
    async fn rejects_unknown_identifiers_before_querying() {
        let (db, _dir) = setup_database().await;
        let selection = Selection::new(["name"], Condition::eq("name", "x"));
        assert!(db.select_one("leads; DROP TABLE leads", &selection).await.is_err());
    }
}
