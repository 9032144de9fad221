use std::sync::Arc;

use sql_middleware_oci::oci::SESSION_SETUP;
use sql_middleware_oci::prelude::*;
use sql_middleware_oci::test_utils::{memory_session, test_dsn};

#[test]
fn connect_applies_session_settings() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.connect()?;

    assert!(conn.is_connected());
    let executed = engine.executed();
    assert_eq!(executed.len(), 2);
    for ((sql, mode), expected) in executed.iter().zip(SESSION_SETUP) {
        assert_eq!(sql, expected);
        assert_eq!(*mode, CommitMode::CommitOnSuccess);
    }
    assert_eq!(conn.pending_writes(), 0);
    let logon = &engine.logons()[0];
    assert_eq!(logon.username, "scott");
    assert_eq!(logon.service, "XE");
    assert!(!logon.persistent);
    Ok(())
}

#[test]
fn reconnect_with_same_parameters_reuses_session() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.connect()?;
    conn.connect()?;
    conn.connect()?;
    assert_eq!(engine.logon_count(), 1);
    assert_eq!(engine.logoff_count(), 0);
    Ok(())
}

#[test]
fn changed_parameters_force_close_then_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.connect()?;

    conn.set_dsn(ConnectionParams::new("scott", "lion").with_hostspec("XE"));
    conn.connect()?;
    assert_eq!(engine.logon_count(), 2);
    assert_eq!(engine.logoff_count(), 1);
    assert_eq!(engine.logons()[1].password, "lion");

    conn.options_mut().persistent = true;
    conn.connect()?;
    assert_eq!(engine.logon_count(), 3);
    assert_eq!(engine.logoff_count(), 2);
    assert!(engine.logons()[2].persistent);
    Ok(())
}

#[test]
fn blank_service_identifier_is_a_configuration_error() {
    let engine = sql_middleware_oci::test_utils::MemoryDriver::new();
    let dsn = ConnectionParams::new("scott", "tiger").with_hostspec("   ");
    let mut conn = OciConnection::new(engine.clone().into_driver(), dsn, DriverOptions::default());

    let err = conn.connect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    assert!(err.to_string().contains("Oracle Service Identifier"));
    assert_eq!(engine.logon_count(), 0);
}

#[test]
fn failed_logon_reports_connect_failed() {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    engine.fail_logon(1017, "ORA-01017: invalid username/password; logon denied");

    let err = conn.connect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectFailed);
    assert_eq!(err.native_code(), Some(1017));
    assert!(!conn.is_connected());

    let info = conn.error_info(None);
    assert_eq!(info.native_code, Some(1017));
}

#[test]
fn failed_session_setup_closes_the_session() {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    engine.script_error(SESSION_SETUP[1], 2248, "ORA-02248: invalid option for ALTER SESSION");

    let err = conn.connect().unwrap_err();
    assert_eq!(err.native_code(), Some(2248));
    assert_eq!(err.kind(), ErrorKind::Unclassified);
    assert!(!conn.is_connected());
    assert_eq!(engine.logon_count(), 1);
    assert_eq!(engine.logoff_count(), 1);
}

#[test]
fn database_emulation_selects_the_schema_user() -> Result<(), Box<dyn std::error::Error>> {
    let engine = sql_middleware_oci::test_utils::MemoryDriver::new();
    let options = DriverOptions {
        database_name_prefix: Some("app_".into()),
        home: Some("/opt/oracle/product/19c".into()),
        ..DriverOptions::default()
    };
    let mut conn = OciConnection::new(
        engine.clone().into_driver(),
        test_dsn().with_database("hr"),
        options,
    );
    conn.connect()?;
    let logon = &engine.logons()[0];
    assert_eq!(logon.username, "app_hr");
    assert_eq!(logon.home.as_deref(), Some("/opt/oracle/product/19c"));

    conn.options_mut().emulate_database = false;
    conn.connect()?;
    assert_eq!(engine.logons()[1].username, "scott");
    Ok(())
}

#[test]
fn close_deregisters_from_the_registry() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(SessionRegistry::new());
    let (engine, conn) = memory_session(DriverOptions::default());
    let index = registry.register("scott@XE");
    let mut conn = conn.with_registry(registry.clone(), index);

    conn.connect()?;
    assert!(registry.contains(index));
    conn.close()?;
    assert!(!registry.contains(index));
    assert!(!conn.is_connected());
    assert_eq!(engine.logoff_count(), 1);

    // closing a closed session is a no-op
    conn.close()?;
    assert_eq!(engine.logoff_count(), 1);
    Ok(())
}

#[test]
fn close_rolls_back_explicit_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    conn.exec("UPDATE emp SET sal = sal + 100")?;
    assert_eq!(conn.pending_writes(), 1);

    conn.close()?;
    assert_eq!(engine.rollback_count(), 1);
    assert_eq!(engine.commit_count(), 0);
    assert_eq!(conn.pending_writes(), 0);
    Ok(())
}

#[test]
fn failed_rollback_keeps_the_session_open() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    conn.exec("DELETE FROM emp")?;
    engine.fail_rollback(3113, "ORA-03113: end-of-file on communication channel");

    let err = conn.close().unwrap_err();
    assert_eq!(err.native_code(), Some(3113));
    assert!(conn.is_connected());
    assert_eq!(conn.pending_writes(), 1);
    assert_eq!(engine.logoff_count(), 0);

    engine.clear_failures();
    drop(conn);
    assert_eq!(engine.rollback_count(), 1);
    assert_eq!(engine.logoff_count(), 1);
    Ok(())
}

#[test]
fn dropping_a_session_rolls_back_pending_writes() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    conn.exec("INSERT INTO emp (empno) VALUES (7999)")?;
    drop(conn);

    assert_eq!(engine.rollback_count(), 1);
    assert_eq!(engine.commit_count(), 0);
    assert_eq!(engine.logoff_count(), 1);
    Ok(())
}

#[test]
fn standalone_session_is_independent() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.connect()?;

    let mut admin = conn.standalone_connect("system", "manager")?;
    assert_eq!(engine.logon_count(), 2);
    assert_eq!(engine.logons()[1].username, "system");
    assert!(admin.is_connected());

    admin.close()?;
    assert!(conn.is_connected());
    assert_eq!(engine.logoff_count(), 1);
    Ok(())
}

#[test]
fn error_info_reads_session_error_state() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, mut conn) = memory_session(DriverOptions::default());
    let err = conn.query("SELECT * FROM missing_table").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchTable);

    let info = conn.error_info(None);
    assert_eq!(info.kind, ErrorKind::NoSuchTable);
    assert_eq!(info.native_code, Some(942));

    let info = conn.error_info(Some(ErrorKind::Generic));
    assert_eq!(info.kind, ErrorKind::Generic);
    Ok(())
}
