mod support;

use sqlitecore::query;

use crate::support::connection;

#[tokio::test]
async fn blob_length_is_fixed_and_offset_starts_at_zero() -> anyhow::Result<()> {
    let mut conn = connection().await?;
    query("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)").execute(&conn).await?;
    query("INSERT INTO t (id, data) VALUES (1, zeroblob(8))").execute(&conn).await?;

    let blob = conn.blob_open("main", "t", "data", 1, true).await?;
    assert_eq!(blob.length(), 8);
    assert_eq!(blob.tell(), 0);

    Ok(())
}

#[tokio::test]
async fn blob_write_then_read_roundtrips_within_bounds() -> anyhow::Result<()> {
    let mut conn = connection().await?;
    query("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)").execute(&conn).await?;
    query("INSERT INTO t (id, data) VALUES (1, zeroblob(8))").execute(&conn).await?;

    let mut blob = conn.blob_open("main", "t", "data", 1, true).await?;

    blob.write_at(b"abcd").await?;
    assert_eq!(blob.tell(), 4);
    assert_eq!(blob.length(), 8, "a write never changes the blob's length");

    let mut buf = [0xffu8; 4];
    let n = blob.read_into(&mut buf).await?;
    assert_eq!(n, 4);
    assert_eq!(&buf, &[0u8; 4], "the untouched tail is still zeroed");
    assert_eq!(blob.tell(), 8);

    Ok(())
}

#[tokio::test]
async fn blob_write_past_the_end_is_rejected() -> anyhow::Result<()> {
    let mut conn = connection().await?;
    query("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)").execute(&conn).await?;
    query("INSERT INTO t (id, data) VALUES (1, zeroblob(4))").execute(&conn).await?;

    let mut blob = conn.blob_open("main", "t", "data", 1, true).await?;

    let result = blob.write_at(b"12345").await;
    assert!(result.is_err());
    assert_eq!(blob.tell(), 0, "a rejected write must not move the offset");
    assert_eq!(blob.length(), 4);

    Ok(())
}

#[tokio::test]
async fn blob_read_past_the_end_clamps_instead_of_erroring() -> anyhow::Result<()> {
    let mut conn = connection().await?;
    query("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)").execute(&conn).await?;
    query("INSERT INTO t (id, data) VALUES (1, zeroblob(4))").execute(&conn).await?;

    let mut blob = conn.blob_open("main", "t", "data", 1, true).await?;

    let mut buf = [0xffu8; 16];
    let n = blob.read_into(&mut buf).await?;
    assert_eq!(n, 4, "only the bytes actually remaining are returned");
    assert_eq!(blob.tell(), 4);

    let n = blob.read_into(&mut buf).await?;
    assert_eq!(n, 0, "reading at the end yields nothing, not an error");

    Ok(())
}

#[tokio::test]
async fn blob_reopen_resets_offset_and_refreshes_length() -> anyhow::Result<()> {
    let mut conn = connection().await?;
    query("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)").execute(&conn).await?;
    query("INSERT INTO t (id, data) VALUES (1, zeroblob(4))").execute(&conn).await?;
    query("INSERT INTO t (id, data) VALUES (2, zeroblob(10))").execute(&conn).await?;

    let mut blob = conn.blob_open("main", "t", "data", 1, true).await?;
    blob.write_at(b"ab").await?;
    assert_eq!(blob.tell(), 2);

    blob.reopen(2).await?;
    assert_eq!(blob.tell(), 0);
    assert_eq!(blob.length(), 10);

    Ok(())
}
