use sql_middleware_oci::prelude::*;
use sql_middleware_oci::test_utils::{MemoryDriver, memory_session, test_dsn};

#[test]
fn next_id_reads_the_sequence() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    engine.script_rows(
        "SELECT users_seq.nextval FROM DUAL",
        &["NEXTVAL"],
        vec![vec![RowValues::Text("5".into())]],
    );
    engine.script_rows(
        "SELECT users_seq.currval FROM DUAL",
        &["CURRVAL"],
        vec![vec![RowValues::Float(5.0)]],
    );

    assert_eq!(conn.sequence_name("users"), "users_seq");
    assert_eq!(conn.next_id("users", false)?, 5);
    assert_eq!(conn.curr_id("users")?, 5);
    Ok(())
}

#[test]
fn missing_sequence_is_created_on_demand() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    let nextval = "SELECT users_seq.nextval FROM DUAL";
    engine.script_error(nextval, 2289, "ORA-02289: sequence does not exist");
    engine.script_rows(nextval, &["NEXTVAL"], vec![vec![RowValues::Int(1)]]);

    assert_eq!(conn.next_id("users", true)?, 1);
    assert_eq!(
        engine.executed_sql(),
        vec![
            nextval.to_string(),
            "CREATE SEQUENCE users_seq START WITH 1".to_string(),
            nextval.to_string(),
        ]
    );
    Ok(())
}

#[test]
fn missing_sequence_without_on_demand_fails() {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    engine.script_error(
        "SELECT orders_seq.nextval FROM DUAL",
        2289,
        "ORA-02289: sequence does not exist",
    );

    let err = conn.next_id("orders", false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchTable);
    assert_eq!(err.native_code(), Some(2289));
    assert_eq!(engine.executed_sql().len(), 1);
}

#[test]
fn on_demand_creation_is_attempted_once() {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    engine.script_error(
        "SELECT ghost_seq.nextval FROM DUAL",
        2289,
        "ORA-02289: sequence does not exist",
    );

    let err = conn.next_id("ghost", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchTable);
    let creates = engine
        .executed_sql()
        .into_iter()
        .filter(|sql| sql.starts_with("CREATE SEQUENCE"))
        .count();
    assert_eq!(creates, 1);
}

#[test]
fn sequence_names_follow_the_format_option() -> Result<(), Box<dyn std::error::Error>> {
    let options = DriverOptions::from_json(r#"{ "seqname_format": "seq_%s_id" }"#)?;
    let (engine, mut conn) = memory_session(options);
    engine.script_rows(
        "SELECT seq_invoice_id.nextval FROM DUAL",
        &["NEXTVAL"],
        vec![vec![RowValues::Int(42)]],
    );

    assert_eq!(conn.next_id("invoice", false)?, 42);
    conn.create_sequence("ledger")?;
    assert!(
        engine
            .executed_sql()
            .contains(&"CREATE SEQUENCE seq_ledger_id START WITH 1".to_string())
    );
    Ok(())
}

#[test]
fn standalone_query_uses_dba_session() -> Result<(), Box<dyn std::error::Error>> {
    let options = DriverOptions::default().dba_credentials("system", "manager");
    let (engine, mut conn) = memory_session(options);
    let sql = "SELECT username FROM dba_users";
    engine.script_rows(
        sql,
        &["USERNAME"],
        vec![
            vec![RowValues::Text("SYS".into())],
            vec![RowValues::Text("SYSTEM".into())],
            vec![RowValues::Text("SCOTT".into())],
        ],
    );

    conn.set_limit(2, 0);
    let result = conn.standalone_query(sql)?;
    assert_eq!(result.rows_affected, 2);
    assert_eq!(result.results[1].get("USERNAME"), Some(&RowValues::Text("SYSTEM".into())));

    let logons = engine.logons();
    assert_eq!(logons.len(), 1);
    assert_eq!(logons[0].username, "system");
    assert_eq!(logons[0].password, "manager");
    assert_eq!(engine.logoff_count(), 1);
    assert!(!conn.is_connected());
    assert_eq!(conn.last_query(), Some(sql));

    // the limit belonged to the standalone statement
    assert_eq!(conn.query_all(sql)?.rows_affected, 3);
    assert_eq!(engine.logons()[1].username, "scott");
    Ok(())
}

#[test]
fn standalone_session_ignores_database_emulation() -> Result<(), Box<dyn std::error::Error>> {
    let engine = MemoryDriver::new();
    let mut options = DriverOptions::default().dba_credentials("system", "manager");
    options.database_name_prefix = Some("tenant_".into());
    let mut conn = OciConnection::new(
        engine.clone().into_driver(),
        test_dsn().with_database("app"),
        options,
    );
    engine.script_rows("SELECT 1 FROM dual", &["1"], vec![vec![RowValues::Int(1)]]);

    conn.connect()?;
    conn.standalone_query("SELECT 1")?;
    let users: Vec<String> = engine.logons().into_iter().map(|logon| logon.username).collect();
    assert_eq!(users, vec!["tenant_app".to_string(), "system".to_string()]);
    assert!(conn.is_connected());
    Ok(())
}

#[test]
fn standalone_query_requires_dba_credentials() {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    let err = conn.standalone_query("SELECT username FROM dba_users").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    assert_eq!(engine.logon_count(), 0);
}
