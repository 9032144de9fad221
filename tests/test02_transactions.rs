use sql_middleware_oci::prelude::*;
use sql_middleware_oci::test_utils::{MemoryDriver, memory_session, test_dsn};

#[test]
fn commit_and_rollback_fail_in_autocommit_mode() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.exec("UPDATE emp SET comm = 0")?;

    let err = conn.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generic);
    let err = conn.rollback().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generic);

    assert_eq!(conn.pending_writes(), 0);
    assert_eq!(engine.commit_count(), 0);
    assert_eq!(engine.rollback_count(), 0);
    Ok(())
}

#[test]
fn commit_without_transaction_support_is_unsupported() {
    let engine = MemoryDriver::new();
    let mut conn = OciConnection::new(engine.into_driver(), test_dsn(), DriverOptions::default())
        .without_transactions();

    assert_eq!(conn.commit().unwrap_err().kind(), ErrorKind::Unsupported);
    assert_eq!(conn.rollback().unwrap_err().kind(), ErrorKind::Unsupported);
    assert!(conn.begin().is_err());
}

#[test]
fn explicit_mode_counts_writes_until_commit() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    assert!(conn.in_transaction());

    conn.exec("INSERT INTO dept (deptno) VALUES (50)")?;
    conn.exec("UPDATE dept SET loc = 'BOSTON' WHERE deptno = 50")?;
    assert_eq!(conn.pending_writes(), 2);

    let modes: Vec<CommitMode> = engine
        .executed()
        .into_iter()
        .filter(|(sql, _)| !sql.starts_with("ALTER SESSION"))
        .map(|(_, mode)| mode)
        .collect();
    assert_eq!(modes, vec![CommitMode::Deferred, CommitMode::Deferred]);

    conn.commit()?;
    assert_eq!(engine.commit_count(), 1);
    assert_eq!(conn.pending_writes(), 0);

    // nothing pending, nothing sent
    conn.commit()?;
    conn.rollback()?;
    assert_eq!(engine.commit_count(), 1);
    assert_eq!(engine.rollback_count(), 0);
    Ok(())
}

#[test]
fn selects_are_not_pending_writes() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    engine.script_rows("SELECT COUNT(*) FROM emp", &["COUNT(*)"], vec![vec![RowValues::Int(14)]]);
    conn.auto_commit(false)?;

    assert_eq!(conn.query_one("SELECT COUNT(*) FROM emp")?, Some(RowValues::Int(14)));
    assert_eq!(conn.pending_writes(), 0);
    Ok(())
}

#[test]
fn rollback_discards_pending_writes() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    conn.exec("DELETE FROM bonus")?;

    conn.rollback()?;
    assert_eq!(engine.rollback_count(), 1);
    assert_eq!(conn.pending_writes(), 0);
    Ok(())
}

#[test]
fn enabling_autocommit_commits_pending_writes_first() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    conn.exec("UPDATE emp SET sal = sal * 1.1")?;

    conn.auto_commit(true)?;
    assert!(conn.auto_commit_enabled());
    assert!(!conn.in_transaction());
    assert_eq!(engine.commit_count(), 1);
    assert_eq!(conn.pending_writes(), 0);

    // same mode again is a no-op
    conn.auto_commit(true)?;
    assert_eq!(engine.commit_count(), 1);
    Ok(())
}

#[test]
fn failed_commit_keeps_explicit_mode() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    conn.exec("INSERT INTO emp (empno, deptno) VALUES (8000, 99)")?;
    engine.fail_commit(2291, "ORA-02291: integrity constraint violated - parent key not found");

    let err = conn.auto_commit(true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);
    assert!(!conn.auto_commit_enabled());
    assert_eq!(conn.pending_writes(), 1);

    engine.clear_failures();
    conn.rollback()?;
    assert_eq!(conn.pending_writes(), 0);
    Ok(())
}

#[test]
fn explicit_mode_before_connect_starts_clean() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    conn.connect()?;
    assert_eq!(conn.pending_writes(), 0);
    assert_eq!(engine.commit_count(), 0);
    Ok(())
}

#[test]
fn dropped_transaction_guard_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    {
        let mut tx = conn.begin()?;
        tx.exec("UPDATE emp SET job = 'ANALYST' WHERE empno = 7788")?;
        assert_eq!(tx.pending_writes(), 1);
    }
    assert_eq!(engine.rollback_count(), 1);
    assert_eq!(engine.commit_count(), 0);
    assert!(conn.auto_commit_enabled());
    assert_eq!(conn.pending_writes(), 0);
    Ok(())
}

#[test]
fn transaction_guard_commits() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    let mut tx = conn.begin()?;
    tx.exec("INSERT INTO salgrade VALUES (6, 10000, 99999)")?;
    tx.exec("UPDATE salgrade SET hisal = 9998 WHERE grade = 5")?;
    tx.commit()?;

    assert_eq!(engine.commit_count(), 1);
    assert_eq!(engine.rollback_count(), 0);
    assert!(conn.auto_commit_enabled());
    Ok(())
}

#[test]
fn transaction_guard_keeps_explicit_mode_when_already_explicit()
-> Result<(), Box<dyn std::error::Error>> {
    let (engine, mut conn) = memory_session(DriverOptions::default());
    conn.auto_commit(false)?;
    {
        let mut tx = conn.begin()?;
        tx.exec("DELETE FROM emp WHERE empno = 7369")?;
        tx.rollback()?;
    }
    assert_eq!(engine.rollback_count(), 1);
    assert!(!conn.auto_commit_enabled());
    Ok(())
}
