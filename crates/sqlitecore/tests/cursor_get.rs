mod support;

use sqlitecore::{query, Shape, Value};

use crate::support::connection;

#[tokio::test]
async fn get_collapses_to_empty_for_no_rows() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;

    let shape = conn.get(query("SELECT val FROM t")).await?;
    assert!(matches!(shape, Shape::Empty));

    Ok(())
}

#[tokio::test]
async fn get_collapses_one_row_one_column_to_scalar() -> anyhow::Result<()> {
    let conn = connection().await?;

    let shape = conn.get(query("SELECT 42")).await?;
    match shape {
        Shape::Scalar(Value::Integer { value, .. }) => assert_eq!(value, 42),
        other => panic!("expected a scalar shape, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn get_collapses_one_row_many_columns_to_row() -> anyhow::Result<()> {
    let conn = connection().await?;

    let shape = conn.get(query("SELECT 1, 2, 3")).await?;
    match shape {
        Shape::Row(values) => assert_eq!(values.len(), 3),
        other => panic!("expected a row shape, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn get_collapses_many_rows_to_a_list_of_shapes() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;
    query("INSERT INTO t (val) VALUES (1), (2), (3)").execute(&conn).await?;

    let shape = conn.get(query("SELECT val FROM t ORDER BY val")).await?;
    match shape {
        Shape::Rows(rows) => {
            assert_eq!(rows.len(), 3);
            for (i, row) in rows.iter().enumerate() {
                match row {
                    Shape::Scalar(Value::Integer { value, .. }) => {
                        assert_eq!(*value, (i + 1) as i64)
                    }
                    other => panic!("expected a scalar row shape, got {other:?}"),
                }
            }
        }
        other => panic!("expected a rows shape, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn get_restores_the_row_tracer_afterward() -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;
    query("INSERT INTO t (val) VALUES (1)").execute(&conn).await?;

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_cb = hits.clone();
    conn.set_row_trace(Some(Box::new(move |_row| {
        hits_cb.fetch_add(1, Ordering::SeqCst);
        true
    })))
    .await?;

    // `get` bypasses the row tracer for its own fetch.
    let _ = conn.get(query("SELECT val FROM t")).await?;
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    // but leaves it installed for subsequent queries.
    query("SELECT val FROM t").fetch_all(&conn).await?;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    Ok(())
}
