use crate::{Result, sqlite::statement::CompoundStatement};
use hashlink::lru_cache::LruCache;
use libsqlite3_sys::SQLITE_PREPARE_PERSISTENT;

/// Default capacity for [`StatementCache`], at the top of the
/// `[0, 512]` range `ConnectOptions::statement_cache_capacity` clamps to.
pub(crate) const DEFAULT_CAPACITY: usize = 512;

/// Queries whose UTF-8 byte length exceeds this threshold are compiled but
/// never cached, on the theory that a query this large is unlikely to recur
/// verbatim and isn't worth the cache slot. An implementation parameter, not
/// part of the contract.
pub(crate) const MAX_CACHEABLE_BYTES: usize = 64 * 1024;

/// Flags passed to `sqlite3_prepare_v3` for every statement this cache
/// compiles. Folded into [`CacheKey`] so that, if a caller ever needs a
/// second set of flags for the same query text, it lands in its own slot
/// rather than colliding with this one.
pub(crate) const PREPARE_FLAGS: i32 = SQLITE_PREPARE_PERSISTENT as i32;

/// The engine's `sqlite3_stmt_explain` mode, applied to every statement
/// handle in a [`CompoundStatement`] before it is first stepped. Two queries
/// with identical text but different explain modes are different compiled
/// programs and so occupy distinct cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExplainMode {
    /// Execute the statement normally.
    #[default]
    None,
    /// `EXPLAIN`: step through the statement's opcodes instead of running it.
    Explain,
    /// `EXPLAIN QUERY PLAN`: step through the planner's chosen query plan.
    QueryPlan,
}

impl ExplainMode {
    /// The `eMode` argument `sqlite3_stmt_explain` expects.
    pub(crate) fn engine_code(self) -> i32 {
        match self {
            ExplainMode::None => 0,
            ExplainMode::Explain => 1,
            ExplainMode::QueryPlan => 2,
        }
    }
}

/// Identifies a cache entry by exactly the inputs that change what gets
/// compiled: the query text, the prepare flags, and the explain mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    sql: String,
    flags: i32,
    explain: ExplainMode,
}

impl CacheKey {
    fn new(sql: &str, explain: ExplainMode) -> Self {
        Self {
            sql: sql.to_owned(),
            flags: PREPARE_FLAGS,
            explain,
        }
    }

    /// A key for a query [`cacheable`] rules out, namespaced so it can never
    /// collide with (or evict) a legitimately cached entry of the same text.
    fn uncached(sql: &str, explain: ExplainMode) -> Self {
        Self {
            sql: format!("\0uncached\0{sql}"),
            flags: PREPARE_FLAGS,
            explain,
        }
    }
}

/// Running counters over a [`StatementCache`]'s lifetime, mirroring the
/// bookkeeping a caller would want when diagnosing cache pressure.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    /// Number of `get()` calls that reused an already-cached entry.
    pub hits: u64,
    /// Number of `get()` calls that had to compile a fresh statement.
    pub misses: u64,
    /// Number of entries evicted to make room under capacity pressure.
    pub evictions: u64,
    /// Number of queries that bypassed the cache outright (`PRAGMA`s and
    /// similar side-effect-at-prepare statements).
    pub no_cache: u64,
    /// Number of queries that bypassed the cache because their UTF-8 length
    /// exceeded [`MAX_CACHEABLE_BYTES`].
    pub too_big: u64,
}

/// A query is ineligible for caching if it is a `PRAGMA` (whose compiled
/// form can depend on database state the bare query text doesn't capture)
/// or if it is larger than [`MAX_CACHEABLE_BYTES`].
fn cacheable(query: &str) -> bool {
    let trimmed = query.trim_start();
    let is_pragma = trimmed.len() >= 6 && trimmed[..6].eq_ignore_ascii_case("pragma");
    !is_pragma && query.len() <= MAX_CACHEABLE_BYTES
}

/// A cache for prepared statements. When full, the least recently used
/// statement gets removed.
#[derive(Debug)]
pub struct StatementCache {
    inner: LruCache<CacheKey, CompoundStatement>,
    stats: CacheStats,
}

impl StatementCache {
    /// Create a new cache with the given `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, query: &str, explain: ExplainMode) -> Result<&mut CompoundStatement> {
        if !cacheable(query) {
            if query.len() > MAX_CACHEABLE_BYTES {
                self.stats.too_big += 1;
            } else {
                self.stats.no_cache += 1;
            }
            return self.prepare_uncached(query, explain);
        }

        let key = CacheKey::new(query, explain);
        let exists = self.inner.contains_key(&key);
        if exists {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            let statement = CompoundStatement::new(query, explain)?;
            self.insert(key.clone(), statement);
        }
        let statement = self.inner.get_mut(&key).unwrap();
        if exists {
            // as this statement has been executed before, we reset before continuing
            statement.reset()?;
        }
        Ok(statement)
    }

    /// Prepare a statement that will never be reinserted into the LRU, used
    /// for queries [`cacheable`] rules out (oversized or `PRAGMA`).
    fn prepare_uncached(
        &mut self,
        query: &str,
        explain: ExplainMode,
    ) -> Result<&mut CompoundStatement> {
        let key = CacheKey::uncached(query, explain);
        self.inner.remove(&key);
        let statement = CompoundStatement::new(query, explain)?;
        self.inner.insert(key.clone(), statement);
        Ok(self.inner.get_mut(&key).unwrap())
    }

    /// Inserts a new statement to the cache, returning the least recently used
    /// statement id if the cache is full, or if inserting with an existing key,
    /// the replaced existing statement.
    fn insert(&mut self, k: CacheKey, v: CompoundStatement) -> Option<CompoundStatement> {
        let mut lru_item = None;

        if self.capacity() == self.len() && !self.inner.contains_key(&k) {
            lru_item = self.remove_lru();
            if lru_item.is_some() {
                self.stats.evictions += 1;
            }
        } else if self.inner.contains_key(&k) {
            lru_item = self.inner.remove(&k);
        }

        self.inner.insert(k, v);

        lru_item
    }

    /// The number of statements in the cache.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Removes the least recently used item from the cache.
    fn remove_lru(&mut self) -> Option<CompoundStatement> {
        self.inner.remove_lru().map(|(_, v)| v)
    }

    /// Clear all cached statements from the cache.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Returns the maximum number of statements the cache can hold.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Snapshot of this cache's running hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Connection, ConnectOptions, query_as};

    #[tokio::test]
    async fn test_cached_statement_reused_with_different_args() -> anyhow::Result<()> {
        let mut conn = Connection::connect_with(&ConnectOptions::new()).await?;

        let initial = conn.cached_statements_size();

        let (v1,): (i32,) = query_as("SELECT ?1")
            .bind(1_i32)
            .fetch_one(&mut conn)
            .await?;
        assert_eq!(v1, 1);
        assert_eq!(conn.cached_statements_size(), initial + 1);

        let (v2,): (i32,) = query_as("SELECT ?1")
            .bind(5_i32)
            .fetch_one(&mut conn)
            .await?;
        assert_eq!(v2, 5);
        assert_eq!(conn.cached_statements_size(), initial + 1);

        conn.clear_cached_statements().await?;
        assert_eq!(conn.cached_statements_size(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_statement_cache_get_returns_same_statement() -> anyhow::Result<()> {
        let mut cache = StatementCache::new(DEFAULT_CAPACITY);

        let ptr_first: *const CompoundStatement = {
            let stmt = cache.get("SELECT 1", ExplainMode::None)?;
            stmt as *const _
        };
        let ptr_second: *const CompoundStatement = {
            let stmt = cache.get("SELECT 1", ExplainMode::None)?;
            stmt as *const _
        };

        assert_eq!(ptr_first, ptr_second);

        Ok(())
    }

    #[tokio::test]
    async fn test_same_text_different_explain_mode_is_a_distinct_entry() -> anyhow::Result<()> {
        let mut cache = StatementCache::new(DEFAULT_CAPACITY);

        cache.get("SELECT 1", ExplainMode::None)?;
        let misses_after_first = cache.stats().misses;

        // Same query text, different explain mode: must not be served from
        // the entry above, and must not evict it either.
        cache.get("SELECT 1", ExplainMode::QueryPlan)?;

        assert_eq!(cache.stats().misses, misses_after_first + 1);
        assert_eq!(cache.len(), 2);

        // Re-requesting the first mode is still a hit.
        cache.get("SELECT 1", ExplainMode::None)?;
        assert_eq!(cache.stats().hits, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_cache_stats_hits_and_misses() -> anyhow::Result<()> {
        let mut conn = Connection::connect_with(&ConnectOptions::new()).await?;

        conn.execute(crate::query("SELECT 1")).await?;
        conn.execute(crate::query("SELECT 1")).await?;

        let stats = conn.statement_cache_stats().await?;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_pragma_bypasses_cache() -> anyhow::Result<()> {
        let mut conn = Connection::connect_with(&ConnectOptions::new()).await?;

        let before = conn.statement_cache_stats().await?;
        conn.execute(crate::query("PRAGMA user_version")).await?;
        let after = conn.statement_cache_stats().await?;

        assert_eq!(after.no_cache, before.no_cache + 1);
        assert_eq!(after.hits, before.hits);
        assert_eq!(after.misses, before.misses);

        Ok(())
    }
}
