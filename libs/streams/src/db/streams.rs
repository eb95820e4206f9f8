//! Postgres-backed [`StreamRepository`].
//!
//! A stream is one row in `streams` plus its routes in `stream_routes` and
//! their backends in `stream_route_backends`. `save` rewrites all three in a
//! single transaction; if the future is dropped before commit the transaction
//! is rolled back.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnection, PgPool, PgRow},
    Postgres, Row, Transaction,
};
use tracing::{debug, instrument};

use super::DbError;
use crate::id::StreamId;
use crate::model::{
    Address, Backend, CircuitBreaker, FeatureSet, Protocol, Route, Stream, StreamType,
};
use crate::repository::{Page, StorageResult, StreamRepository};

const STREAM_COLUMNS: &str = r#"
    id,
    enabled,
    name,
    stream_type,
    binding_protocol,
    binding_address,
    binding_port,
    default_backend_protocol,
    default_backend_address,
    default_backend_port,
    default_backend_weight,
    default_backend_cb_max_failures,
    default_backend_cb_open_seconds,
    use_proxy_protocol,
    socket_keep_alive,
    tcp_keep_alive,
    tcp_no_delay,
    tcp_deferred
"#;

/// Row in `streams`.
#[derive(Debug, Clone)]
struct StreamRow {
    id: String,
    enabled: bool,
    name: String,
    stream_type: String,
    binding_protocol: String,
    binding_address: String,
    binding_port: Option<i32>,
    default_backend_protocol: String,
    default_backend_address: String,
    default_backend_port: Option<i32>,
    default_backend_weight: Option<i32>,
    default_backend_cb_max_failures: Option<i32>,
    default_backend_cb_open_seconds: Option<i32>,
    use_proxy_protocol: bool,
    socket_keep_alive: bool,
    tcp_keep_alive: bool,
    tcp_no_delay: bool,
    tcp_deferred: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StreamRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            enabled: row.try_get("enabled")?,
            name: row.try_get("name")?,
            stream_type: row.try_get("stream_type")?,
            binding_protocol: row.try_get("binding_protocol")?,
            binding_address: row.try_get("binding_address")?,
            binding_port: row.try_get("binding_port")?,
            default_backend_protocol: row.try_get("default_backend_protocol")?,
            default_backend_address: row.try_get("default_backend_address")?,
            default_backend_port: row.try_get("default_backend_port")?,
            default_backend_weight: row.try_get("default_backend_weight")?,
            default_backend_cb_max_failures: row.try_get("default_backend_cb_max_failures")?,
            default_backend_cb_open_seconds: row.try_get("default_backend_cb_open_seconds")?,
            use_proxy_protocol: row.try_get("use_proxy_protocol")?,
            socket_keep_alive: row.try_get("socket_keep_alive")?,
            tcp_keep_alive: row.try_get("tcp_keep_alive")?,
            tcp_no_delay: row.try_get("tcp_no_delay")?,
            tcp_deferred: row.try_get("tcp_deferred")?,
        })
    }
}

/// Row in `stream_routes`.
#[derive(Debug, Clone)]
struct RouteRow {
    stream_id: String,
    route_index: i32,
    domain_names: Vec<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for RouteRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            stream_id: row.try_get("stream_id")?,
            route_index: row.try_get("route_index")?,
            domain_names: row.try_get("domain_names")?,
        })
    }
}

/// Row in `stream_route_backends`.
#[derive(Debug, Clone)]
struct BackendRow {
    stream_id: String,
    route_index: i32,
    backend_index: i32,
    target_protocol: String,
    target_address: String,
    target_port: Option<i32>,
    weight: Option<i32>,
    cb_max_failures: Option<i32>,
    cb_open_seconds: Option<i32>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for BackendRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            stream_id: row.try_get("stream_id")?,
            route_index: row.try_get("route_index")?,
            backend_index: row.try_get("backend_index")?,
            target_protocol: row.try_get("target_protocol")?,
            target_address: row.try_get("target_address")?,
            target_port: row.try_get("target_port")?,
            weight: row.try_get("weight")?,
            cb_max_failures: row.try_get("cb_max_failures")?,
            cb_open_seconds: row.try_get("cb_open_seconds")?,
        })
    }
}

fn circuit_breaker(max_failures: Option<i32>, open_seconds: Option<i32>) -> Option<CircuitBreaker> {
    match (max_failures, open_seconds) {
        (Some(max_failures), Some(open_seconds)) => Some(CircuitBreaker {
            max_failures,
            open_seconds,
        }),
        _ => None,
    }
}

impl BackendRow {
    fn into_backend(self) -> Backend {
        Backend {
            target: Address {
                protocol: Protocol::from_wire(&self.target_protocol),
                address: self.target_address,
                port: self.target_port,
            },
            weight: self.weight,
            circuit_breaker: circuit_breaker(self.cb_max_failures, self.cb_open_seconds),
        }
    }
}

impl StreamRow {
    fn into_stream(self, routes: Vec<Route>) -> Result<Stream, DbError> {
        let id = StreamId::parse(&self.id).map_err(|e| DbError::Decode {
            stream_id: self.id.clone(),
            reason: e.to_string(),
        })?;

        Ok(Stream {
            id,
            enabled: self.enabled,
            name: self.name,
            stream_type: StreamType::from_wire(&self.stream_type),
            binding: Address {
                protocol: Protocol::from_wire(&self.binding_protocol),
                address: self.binding_address,
                port: self.binding_port,
            },
            default_backend: Backend {
                target: Address {
                    protocol: Protocol::from_wire(&self.default_backend_protocol),
                    address: self.default_backend_address,
                    port: self.default_backend_port,
                },
                weight: self.default_backend_weight,
                circuit_breaker: circuit_breaker(
                    self.default_backend_cb_max_failures,
                    self.default_backend_cb_open_seconds,
                ),
            },
            routes,
            feature_set: FeatureSet {
                use_proxy_protocol: self.use_proxy_protocol,
                socket_keep_alive: self.socket_keep_alive,
                tcp_keep_alive: self.tcp_keep_alive,
                tcp_no_delay: self.tcp_no_delay,
                tcp_deferred: self.tcp_deferred,
            },
        })
    }
}

/// Stitch stream rows together with their routes and backends.
///
/// Output order follows `streams`. Route and backend rows must be sorted by
/// their indexes within each stream.
fn assemble(
    streams: Vec<StreamRow>,
    routes: Vec<RouteRow>,
    backends: Vec<BackendRow>,
) -> Result<Vec<Stream>, DbError> {
    let mut by_route: BTreeMap<(String, i32), Route> = routes
        .into_iter()
        .map(|row| {
            (
                (row.stream_id, row.route_index),
                Route {
                    domain_names: row.domain_names,
                    backends: Vec::new(),
                },
            )
        })
        .collect();

    for row in backends {
        let key = (row.stream_id.clone(), row.route_index);
        match by_route.get_mut(&key) {
            Some(route) => route.backends.push(row.into_backend()),
            None => {
                return Err(DbError::Decode {
                    stream_id: key.0,
                    reason: format!("backend references missing route {}", key.1),
                })
            }
        }
    }

    let mut by_stream: HashMap<String, Vec<Route>> = HashMap::new();
    for ((stream_id, _), route) in by_route {
        by_stream.entry(stream_id).or_default().push(route);
    }

    streams
        .into_iter()
        .map(|row| {
            let routes = by_stream.remove(&row.id).unwrap_or_default();
            row.into_stream(routes)
        })
        .collect()
}

/// Flatten a stream into the rows `save` writes. Inverse of [`assemble`].
fn to_rows(stream: &Stream) -> (StreamRow, Vec<RouteRow>, Vec<BackendRow>) {
    let id = stream.id.to_string();
    let default_backend = &stream.default_backend;
    let default_breaker = default_backend.circuit_breaker;

    let stream_row = StreamRow {
        id: id.clone(),
        enabled: stream.enabled,
        name: stream.name.clone(),
        stream_type: stream.stream_type.as_str().to_string(),
        binding_protocol: stream.binding.protocol.as_str().to_string(),
        binding_address: stream.binding.address.clone(),
        binding_port: stream.binding.port,
        default_backend_protocol: default_backend.target.protocol.as_str().to_string(),
        default_backend_address: default_backend.target.address.clone(),
        default_backend_port: default_backend.target.port,
        default_backend_weight: default_backend.weight,
        default_backend_cb_max_failures: default_breaker.map(|cb| cb.max_failures),
        default_backend_cb_open_seconds: default_breaker.map(|cb| cb.open_seconds),
        use_proxy_protocol: stream.feature_set.use_proxy_protocol,
        socket_keep_alive: stream.feature_set.socket_keep_alive,
        tcp_keep_alive: stream.feature_set.tcp_keep_alive,
        tcp_no_delay: stream.feature_set.tcp_no_delay,
        tcp_deferred: stream.feature_set.tcp_deferred,
    };

    let mut route_rows = Vec::with_capacity(stream.routes.len());
    let mut backend_rows = Vec::new();
    for (route_index, route) in stream.routes.iter().enumerate() {
        let route_index = index(route_index);
        route_rows.push(RouteRow {
            stream_id: id.clone(),
            route_index,
            domain_names: route.domain_names.clone(),
        });
        for (backend_index, backend) in route.backends.iter().enumerate() {
            backend_rows.push(BackendRow {
                stream_id: id.clone(),
                route_index,
                backend_index: index(backend_index),
                target_protocol: backend.target.protocol.as_str().to_string(),
                target_address: backend.target.address.clone(),
                target_port: backend.target.port,
                weight: backend.weight,
                cb_max_failures: backend.circuit_breaker.map(|cb| cb.max_failures),
                cb_open_seconds: backend.circuit_breaker.map(|cb| cb.open_seconds),
            });
        }
    }

    (stream_row, route_rows, backend_rows)
}

/// `search` as an `ILIKE` pattern, `None` when there is nothing to match.
fn search_pattern(search: Option<&str>) -> Option<String> {
    let search = search.map(str::trim).filter(|s| !s.is_empty())?;
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

fn index(i: usize) -> i32 {
    i32::try_from(i).unwrap_or(i32::MAX)
}

/// Stream repository backed by Postgres.
#[derive(Clone)]
pub struct PgStreamRepository {
    pool: PgPool,
}

/// Opens every multi-query read, so that the stream rows, routes and
/// backends it loads come from one committed state.
const READ_SNAPSHOT: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

impl PgStreamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a read-only transaction pinned to a single snapshot.
    async fn begin_read(&self) -> Result<Transaction<'static, Postgres>, DbError> {
        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;
        sqlx::query(READ_SNAPSHOT)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;
        Ok(tx)
    }

    /// Load routes and backends for `rows` and build full streams.
    async fn hydrate(
        conn: &mut PgConnection,
        rows: Vec<StreamRow>,
    ) -> Result<Vec<Stream>, DbError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();

        let routes = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT stream_id, route_index, domain_names
            FROM stream_routes
            WHERE stream_id = ANY($1)
            ORDER BY stream_id, route_index
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::Query)?;

        let backends = sqlx::query_as::<_, BackendRow>(
            r#"
            SELECT
                stream_id,
                route_index,
                backend_index,
                target_protocol,
                target_address,
                target_port,
                weight,
                cb_max_failures,
                cb_open_seconds
            FROM stream_route_backends
            WHERE stream_id = ANY($1)
            ORDER BY stream_id, route_index, backend_index
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(DbError::Query)?;

        assemble(rows, routes, backends)
    }

    async fn save_stream(&self, stream: &Stream) -> Result<(), DbError> {
        let (row, routes, backends) = to_rows(stream);
        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;

        sqlx::query(
            r#"
            INSERT INTO streams (
                id,
                enabled,
                name,
                stream_type,
                binding_protocol,
                binding_address,
                binding_port,
                default_backend_protocol,
                default_backend_address,
                default_backend_port,
                default_backend_weight,
                default_backend_cb_max_failures,
                default_backend_cb_open_seconds,
                use_proxy_protocol,
                socket_keep_alive,
                tcp_keep_alive,
                tcp_no_delay,
                tcp_deferred
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                name = EXCLUDED.name,
                stream_type = EXCLUDED.stream_type,
                binding_protocol = EXCLUDED.binding_protocol,
                binding_address = EXCLUDED.binding_address,
                binding_port = EXCLUDED.binding_port,
                default_backend_protocol = EXCLUDED.default_backend_protocol,
                default_backend_address = EXCLUDED.default_backend_address,
                default_backend_port = EXCLUDED.default_backend_port,
                default_backend_weight = EXCLUDED.default_backend_weight,
                default_backend_cb_max_failures = EXCLUDED.default_backend_cb_max_failures,
                default_backend_cb_open_seconds = EXCLUDED.default_backend_cb_open_seconds,
                use_proxy_protocol = EXCLUDED.use_proxy_protocol,
                socket_keep_alive = EXCLUDED.socket_keep_alive,
                tcp_keep_alive = EXCLUDED.tcp_keep_alive,
                tcp_no_delay = EXCLUDED.tcp_no_delay,
                tcp_deferred = EXCLUDED.tcp_deferred,
                updated_at = now()
            "#,
        )
        .bind(&row.id)
        .bind(row.enabled)
        .bind(&row.name)
        .bind(&row.stream_type)
        .bind(&row.binding_protocol)
        .bind(&row.binding_address)
        .bind(row.binding_port)
        .bind(&row.default_backend_protocol)
        .bind(&row.default_backend_address)
        .bind(row.default_backend_port)
        .bind(row.default_backend_weight)
        .bind(row.default_backend_cb_max_failures)
        .bind(row.default_backend_cb_open_seconds)
        .bind(row.use_proxy_protocol)
        .bind(row.socket_keep_alive)
        .bind(row.tcp_keep_alive)
        .bind(row.tcp_no_delay)
        .bind(row.tcp_deferred)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        // Backends go with their routes via ON DELETE CASCADE.
        sqlx::query("DELETE FROM stream_routes WHERE stream_id = $1")
            .bind(&row.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;

        for route in &routes {
            sqlx::query(
                r#"
                INSERT INTO stream_routes (stream_id, route_index, domain_names)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(&route.stream_id)
            .bind(route.route_index)
            .bind(&route.domain_names)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;
        }

        for backend in &backends {
            sqlx::query(
                r#"
                INSERT INTO stream_route_backends (
                    stream_id,
                    route_index,
                    backend_index,
                    target_protocol,
                    target_address,
                    target_port,
                    weight,
                    cb_max_failures,
                    cb_open_seconds
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(&backend.stream_id)
            .bind(backend.route_index)
            .bind(backend.backend_index)
            .bind(&backend.target_protocol)
            .bind(&backend.target_address)
            .bind(backend.target_port)
            .bind(backend.weight)
            .bind(backend.cb_max_failures)
            .bind(backend.cb_open_seconds)
            .execute(&mut *tx)
            .await
            .map_err(DbError::Query)?;
        }

        tx.commit().await.map_err(DbError::Query)?;
        Ok(())
    }

    async fn find_stream(&self, id: &StreamId) -> Result<Option<Stream>, DbError> {
        let mut tx = self.begin_read().await?;

        let row = sqlx::query_as::<_, StreamRow>(&format!(
            "SELECT {STREAM_COLUMNS} FROM streams WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        let stream = match row {
            Some(row) => Self::hydrate(&mut tx, vec![row]).await?.pop(),
            None => None,
        };

        tx.commit().await.map_err(DbError::Query)?;
        Ok(stream)
    }

    async fn page(
        &self,
        page_size: u32,
        page_number: u32,
        search: Option<&str>,
    ) -> Result<Page<Stream>, DbError> {
        let pattern = search_pattern(search);
        let mut tx = self.begin_read().await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM streams
            WHERE $1::text IS NULL OR name ILIKE $1 ESCAPE '\'
            "#,
        )
        .bind(pattern.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        let offset = i64::try_from(Page::<Stream>::offset(page_size, page_number))
            .unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, StreamRow>(&format!(
            r#"
            SELECT {STREAM_COLUMNS}
            FROM streams
            WHERE $1::text IS NULL OR name ILIKE $1 ESCAPE '\'
            ORDER BY name COLLATE "C", id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern.as_deref())
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        let contents = Self::hydrate(&mut tx, rows).await?;
        tx.commit().await.map_err(DbError::Query)?;

        Ok(Page {
            page_number,
            page_size,
            total_items: u64::try_from(total).unwrap_or_default(),
            contents,
        })
    }

    async fn enabled(&self) -> Result<Vec<Stream>, DbError> {
        let mut tx = self.begin_read().await?;

        let rows = sqlx::query_as::<_, StreamRow>(&format!(
            "SELECT {STREAM_COLUMNS} FROM streams WHERE enabled ORDER BY name COLLATE \"C\", id"
        ))
        .fetch_all(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        let streams = Self::hydrate(&mut tx, rows).await?;
        tx.commit().await.map_err(DbError::Query)?;
        Ok(streams)
    }
}

#[async_trait]
impl StreamRepository for PgStreamRepository {
    #[instrument(skip(self), fields(stream_id = %id))]
    async fn find_by_id(&self, id: &StreamId) -> StorageResult<Option<Stream>> {
        Ok(self.find_stream(id).await?)
    }

    #[instrument(skip(self), fields(stream_id = %id))]
    async fn delete_by_id(&self, id: &StreamId) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM streams WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        debug!(rows_affected = result.rows_affected(), "Deleted stream");
        Ok(())
    }

    #[instrument(skip(self, stream), fields(stream_id = %stream.id, routes = stream.routes.len()))]
    async fn save(&self, stream: &Stream) -> StorageResult<()> {
        self.save_stream(stream).await?;
        debug!("Stream committed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_page(
        &self,
        page_size: u32,
        page_number: u32,
        search: Option<&str>,
    ) -> StorageResult<Page<Stream>> {
        Ok(self.page(page_size, page_number, search).await?)
    }

    #[instrument(skip(self))]
    async fn find_all_enabled(&self) -> StorageResult<Vec<Stream>> {
        Ok(self.enabled().await?)
    }

    #[instrument(skip(self), fields(stream_id = %id))]
    async fn exists_by_id(&self, id: &StreamId) -> StorageResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM streams WHERE id = $1)")
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(DbError::Query)?;
        Ok(exists)
    }
}
