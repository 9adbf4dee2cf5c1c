mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sqlitecore::{query, query_scalar, AuthDecision, RowChange, TraceEvent, TRACE_PROFILE, TRACE_STMT};

use crate::support::connection;

#[tokio::test]
async fn trace_multiplexing_dispatches_to_matching_masks_only() -> anyhow::Result<()> {
    let conn = connection().await?;

    let stmt_hits = Arc::new(AtomicUsize::new(0));
    let profile_hits = Arc::new(AtomicUsize::new(0));

    let stmt_hits_cb = stmt_hits.clone();
    let stmt_id = conn
        .trace(TRACE_STMT, move |event| {
            if let TraceEvent::Stmt(_) = event {
                stmt_hits_cb.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await?;

    let profile_hits_cb = profile_hits.clone();
    let profile_id = conn
        .trace(TRACE_PROFILE, move |event| {
            if let TraceEvent::Profile { .. } = event {
                profile_hits_cb.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await?;

    query("SELECT 1").execute(&conn).await?;
    assert_eq!(stmt_hits.load(Ordering::SeqCst), 1);
    assert_eq!(profile_hits.load(Ordering::SeqCst), 1);

    conn.untrace(stmt_id).await?;
    stmt_hits.store(0, Ordering::SeqCst);
    profile_hits.store(0, Ordering::SeqCst);

    query("SELECT 1").execute(&conn).await?;
    assert_eq!(stmt_hits.load(Ordering::SeqCst), 0, "unregistered callback must not fire");
    assert_eq!(profile_hits.load(Ordering::SeqCst), 1, "remaining callback keeps firing");

    conn.untrace(profile_id).await?;
    Ok(())
}

#[tokio::test]
async fn commit_hook_abort_prevents_the_write_from_being_visible() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;

    conn.commit_hook(Some(Box::new(|| Ok(true)))).await?;

    query("BEGIN").execute(&conn).await?;
    query("INSERT INTO t (val) VALUES (1)").execute(&conn).await?;
    // The engine turns this COMMIT into a ROLLBACK; we don't assert on
    // whether the statement itself reports an error, only on the
    // observable effect: nothing was written.
    let _ = query("COMMIT").execute(&conn).await;

    conn.commit_hook(None).await?;

    let count: i64 = query_scalar("SELECT COUNT(*) FROM t").fetch_one(&conn).await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn rollback_hook_fires_on_explicit_rollback() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_cb = fired.clone();
    conn.rollback_hook(Some(Box::new(move || {
        fired_cb.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })))
    .await?;

    query("BEGIN").execute(&conn).await?;
    query("INSERT INTO t (val) VALUES (1)").execute(&conn).await?;
    query("ROLLBACK").execute(&conn).await?;

    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let count: i64 = query_scalar("SELECT COUNT(*) FROM t").fetch_one(&conn).await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn update_hook_observes_row_level_changes() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;

    let seen: Arc<Mutex<Vec<(RowChange, String, i64)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = seen.clone();
    conn.update_hook(Some(Box::new(move |change, _db, table, rowid| {
        seen_cb.lock().unwrap().push((change, table.to_string(), rowid));
        Ok(())
    })))
    .await?;

    query("INSERT INTO t (val) VALUES (42)").execute(&conn).await?;

    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, RowChange::Insert);
    assert_eq!(events[0].1, "t");
    assert_eq!(events[0].2, 1);

    Ok(())
}

#[tokio::test]
async fn authorizer_deny_rejects_the_statement() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE secret (val INTEGER)").execute(&conn).await?;
    query("INSERT INTO secret (val) VALUES (1)").execute(&conn).await?;

    conn.set_authorizer(Some(Box::new(|_action, _a1, _a2, _a3, _a4| {
        Ok(AuthDecision::Deny)
    })))
    .await?;

    let result = query("SELECT * FROM secret").fetch_all(&conn).await;
    assert!(result.is_err(), "denied authorizer action must fail preparation");

    Ok(())
}
