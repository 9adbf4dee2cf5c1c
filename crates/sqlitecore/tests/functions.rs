mod support;

use sqlitecore::{query, query_scalar, Aggregate, Value, WindowAggregate};

use crate::support::connection;

#[tokio::test]
async fn scalar_function_registration_is_invoked() -> anyhow::Result<()> {
    let conn = connection().await?;

    conn.create_scalar_function("double_it", 1, |args| {
        let n = args[0].int64().map_err(|e| e.to_string())?;
        Ok(Value::Integer {
            value: n * 2,
            type_info: None,
        })
    })
    .await?;

    let result: i64 = query_scalar("SELECT double_it(21)").fetch_one(&conn).await?;
    assert_eq!(result, 42);

    Ok(())
}

#[tokio::test]
async fn scalar_function_error_propagates_to_the_caller() -> anyhow::Result<()> {
    let conn = connection().await?;

    conn.create_scalar_function("always_fails", 0, |_args| {
        Err("deliberate failure".to_string())
    })
    .await?;

    let result = query_scalar::<i64>("SELECT always_fails()").fetch_one(&conn).await;
    assert!(result.is_err());

    Ok(())
}

struct SumAgg {
    total: i64,
}

impl Aggregate for SumAgg {
    fn step(&mut self, args: &[Value]) -> Result<(), String> {
        self.total += args[0].int64().map_err(|e| e.to_string())?;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value, String> {
        Ok(Value::Integer {
            value: self.total,
            type_info: None,
        })
    }
}

#[tokio::test]
async fn aggregate_function_registration_sums_rows() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;
    query("INSERT INTO t (val) VALUES (1), (2), (3)").execute(&conn).await?;

    conn.create_aggregate_function("my_sum", 1, || SumAgg { total: 0 })
        .await?;

    let result: i64 = query_scalar("SELECT my_sum(val) FROM t").fetch_one(&conn).await?;
    assert_eq!(result, 6);

    Ok(())
}

#[tokio::test]
async fn aggregate_function_on_empty_input_runs_finalize_without_step() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;

    conn.create_aggregate_function("my_sum", 1, || SumAgg { total: 0 })
        .await?;

    let result: i64 = query_scalar("SELECT my_sum(val) FROM t").fetch_one(&conn).await?;
    assert_eq!(result, 0);

    Ok(())
}

impl WindowAggregate for SumAgg {
    fn value(&self) -> Result<Value, String> {
        Ok(Value::Integer {
            value: self.total,
            type_info: None,
        })
    }

    fn inverse(&mut self, args: &[Value]) -> Result<(), String> {
        self.total -= args[0].int64().map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[tokio::test]
async fn window_function_registration_runs_over_a_moving_frame() -> anyhow::Result<()> {
    let conn = connection().await?;
    query("CREATE TABLE t (val INTEGER)").execute(&conn).await?;
    query("INSERT INTO t (val) VALUES (1), (2), (3), (4)").execute(&conn).await?;

    conn.create_window_function("running_sum", 1, || SumAgg { total: 0 })
        .await?;

    let rows = query(
        "SELECT running_sum(val) OVER (ORDER BY val ROWS BETWEEN 1 PRECEDING AND CURRENT ROW) \
         FROM t ORDER BY val",
    )
    .fetch_all(&conn)
    .await?;

    let totals: Vec<i64> = rows
        .iter()
        .map(|row| row.get_value_idx::<i64>(0))
        .collect::<sqlitecore::Result<_>>()?;
    assert_eq!(totals, vec![1, 3, 5, 7]);

    Ok(())
}
