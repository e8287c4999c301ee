//! Mobile sync ingestion.
//!
//! The handheld scanner app pushes its local tables as one JSON document:
//!
//! ```json
//! {
//!   "scanned_items": [
//!     { "pid": 1234, "sn": 5678, "name": "Short Rib", "best_before_date": 1700000000000,
//!       "packed_on_date": 1700000000000, "net_kg": 2.5, "count": 10 }
//!   ],
//!   "sales_floor": [
//!     { "pid": 1234, "name": "Short Rib", "count": 10, "weight": 25.0, "expiry_date": 1700000000000 }
//!   ]
//! }
//! ```
//!
//! Scanned items are appended to `SCANNED_ITEMS` with a single multi-row insert; sales-floor rows are merged into
//! `SALES_FLOOR` one by one, keyed by `PID`. Dates travel as Unix epoch milliseconds and are stored as naive UTC
//! timestamps.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::NaiveDateTime;
use sea_orm::ConnectOptions;
use sea_orm::ConnectionTrait;
use sea_orm::DatabaseConnection;
use sea_orm::DbBackend;
use sea_orm::Statement;
use sea_orm::Value;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use url::Url;

use crate::error::Result;
use crate::error::VizError;

pub const DEFAULT_WAREHOUSE: &str = "COMPUTE_WH";
pub const DEFAULT_DATABASE: &str = "VIZCOUNT_DB";
pub const DEFAULT_SCHEMA: &str = "PUBLIC";

const SCANNED_ITEM_COLUMNS: usize = 7;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScannedItem {
    pub pid:              i64,
    pub sn:               i64,
    pub name:             String,
    #[serde(default)]
    pub best_before_date: Option<f64>,
    #[serde(default)]
    pub packed_on_date:   Option<f64>,
    #[serde(default)]
    pub net_kg:           Option<f64>,
    #[serde(default)]
    pub count:            Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SalesFloorRow {
    pub pid:         i64,
    pub name:        String,
    #[serde(default)]
    pub count:       Option<i64>,
    #[serde(default)]
    pub weight:      Option<f64>,
    #[serde(default)]
    pub expiry_date: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SyncPayload {
    #[serde(default)]
    pub scanned_items: Vec<ScannedItem>,
    #[serde(default)]
    pub sales_floor:   Vec<SalesFloorRow>,
}

impl SyncPayload {
    /// Parse a request body. Anything but a non-empty JSON object is rejected.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_slice(body)
            .map_err(|_| VizError::MalformedInput("Invalid or missing JSON body".to_string()))?;

        match &document {
            serde_json::Value::Object(map) if !map.is_empty() => (),
            _ => return Err(VizError::MalformedInput("Invalid or missing JSON body".to_string())),
        }

        serde_json::from_value(document).map_err(|err| VizError::MalformedInput(err.to_string()))
    }
}

/// Convert Unix epoch milliseconds into a naive UTC timestamp. Absent and zero values both mean "no date".
pub fn ms_to_timestamp(ms: Option<f64>) -> Result<Option<NaiveDateTime>> {
    let ms = match ms {
        None => return Ok(None),
        Some(ms) if ms == 0.0 => return Ok(None),
        Some(ms) => ms,
    };

    let micros = (ms * 1_000.0).round();
    if !micros.is_finite() || micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return Err(VizError::MalformedInput(format!("timestamp {ms} is out of range")));
    }

    DateTime::from_timestamp_micros(micros as i64)
        .map(|dt| Some(dt.naive_utc()))
        .ok_or_else(|| VizError::MalformedInput(format!("timestamp {ms} is out of range")))
}

/// One multi-row insert for all scanned items, or nothing when there are none.
pub fn scanned_items_insert(items: &[ScannedItem]) -> Result<Option<Statement>> {
    if items.is_empty() {
        return Ok(None);
    }

    let mut rows = Vec::with_capacity(items.len());
    let mut values: Vec<Value> = Vec::with_capacity(items.len() * SCANNED_ITEM_COLUMNS);

    for (idx, item) in items.iter().enumerate() {
        let base = idx * SCANNED_ITEM_COLUMNS;
        let placeholders = (1..=SCANNED_ITEM_COLUMNS)
            .map(|n| format!("${}", base + n))
            .collect::<Vec<_>>()
            .join(", ");
        rows.push(format!("({placeholders})"));

        values.push(item.pid.into());
        values.push(item.sn.into());
        values.push(item.name.clone().into());
        values.push(ms_to_timestamp(item.best_before_date)?.into());
        values.push(ms_to_timestamp(item.packed_on_date)?.into());
        values.push(item.net_kg.into());
        values.push(item.count.into());
    }

    let sql = format!(
        "INSERT INTO SCANNED_ITEMS (PID, SN, NAME, BEST_BEFORE_DATE, PACKED_ON_DATE, NET_KG, ITEM_COUNT) VALUES {}",
        rows.join(", ")
    );

    Ok(Some(Statement::from_sql_and_values(DbBackend::Postgres, sql, values)))
}

const SALES_FLOOR_MERGE: &str = "\
MERGE INTO SALES_FLOOR AS target \
USING (SELECT $1 AS PID, $2 AS NAME, $3 AS CURRENT_COUNT, $4 AS TOTAL_WEIGHT, $5 AS LATEST_EXPIRY) AS source \
ON target.PID = source.PID \
WHEN MATCHED THEN UPDATE SET \
NAME = source.NAME, CURRENT_COUNT = source.CURRENT_COUNT, TOTAL_WEIGHT = source.TOTAL_WEIGHT, \
LATEST_EXPIRY = source.LATEST_EXPIRY, UPDATED_AT = CURRENT_TIMESTAMP \
WHEN NOT MATCHED THEN INSERT (PID, NAME, CURRENT_COUNT, TOTAL_WEIGHT, LATEST_EXPIRY) \
VALUES (source.PID, source.NAME, source.CURRENT_COUNT, source.TOTAL_WEIGHT, source.LATEST_EXPIRY)";

/// Upsert of a single sales-floor row.
pub fn sales_floor_merge(row: &SalesFloorRow) -> Result<Statement> {
    let values: Vec<Value> = vec![
        row.pid.into(),
        row.name.clone().into(),
        row.count.into(),
        row.weight.into(),
        ms_to_timestamp(row.expiry_date)?.into(),
    ];
    Ok(Statement::from_sql_and_values(
        DbBackend::Postgres,
        SALES_FLOOR_MERGE,
        values,
    ))
}

/// Where and as whom statements are executed.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseSettings {
    pub user:      String,
    pub account:   String,
    pub password:  String,
    pub warehouse: String,
    pub database:  String,
    pub schema:    String,
}

impl WarehouseSettings {
    /// Resolve settings through `lookup`, which maps a variable name to its value. Empty values count as missing.
    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let (Some(user), Some(account)) = (get("SNOWFLAKE_USER"), get("SNOWFLAKE_ACCOUNT"))
        else {
            return Err(VizError::Configuration(
                "missing warehouse credentials: SNOWFLAKE_USER or SNOWFLAKE_ACCOUNT is not set".to_string(),
            ));
        };
        let password = get("SNOWFLAKE_PASS_SECRET")
            .ok_or_else(|| VizError::Configuration("SNOWFLAKE_PASS_SECRET is missing or empty".to_string()))?;

        Ok(Self {
            user,
            account,
            password,
            warehouse: get("SNOWFLAKE_WAREHOUSE").unwrap_or_else(|| DEFAULT_WAREHOUSE.to_string()),
            database: get("SNOWFLAKE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            schema: get("SNOWFLAKE_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl Debug for WarehouseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseSettings")
            .field("user", &self.user)
            .field("account", &self.account)
            .field("password", &"***")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

#[async_trait]
pub trait Warehouse: Debug + Send + Sync + 'static {
    async fn connect(&self, settings: &WarehouseSettings) -> Result<Box<dyn WarehouseSession>>;
}

#[async_trait]
pub trait WarehouseSession: Send {
    /// Run one statement, returning the number of affected rows.
    async fn execute(&mut self, statement: Statement) -> Result<u64>;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
impl WarehouseSession for DatabaseConnection {
    async fn execute(&mut self, statement: Statement) -> Result<u64> {
        Ok(ConnectionTrait::execute(&*self, statement).await?.rows_affected())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(DatabaseConnection::close(*self).await?)
    }
}

/// Warehouse reached through a SeaORM connection. `account` is the host part of the connection URL and `schema` the
/// search path. A driver has to be compiled in for the connection to succeed, see the `pg` feature.
#[derive(Debug, Clone, Default)]
pub struct SeaOrmWarehouse;

impl SeaOrmWarehouse {
    /// Connection URL with the credentials percent-encoded.
    pub fn url(settings: &WarehouseSettings) -> Result<String> {
        let unusable = |name: &str| VizError::Configuration(format!("{name} cannot be used in a connection URL"));

        let mut url = Url::parse(&format!("postgres://{}", settings.account))
            .map_err(|err| VizError::Configuration(format!("SNOWFLAKE_ACCOUNT is not a valid host: {err}")))?;
        url.set_username(&settings.user)
            .map_err(|_| unusable("SNOWFLAKE_USER"))?;
        url.set_password(Some(&settings.password))
            .map_err(|_| unusable("SNOWFLAKE_PASS_SECRET"))?;
        url.path_segments_mut()
            .map_err(|_| unusable("SNOWFLAKE_ACCOUNT"))?
            .push(&settings.database);

        Ok(url.into())
    }
}

#[async_trait]
impl Warehouse for SeaOrmWarehouse {
    async fn connect(&self, settings: &WarehouseSettings) -> Result<Box<dyn WarehouseSession>> {
        let mut options = ConnectOptions::new(Self::url(settings)?);
        options
            .set_schema_search_path(settings.schema.clone())
            .sqlx_logging(false);

        let connection = sea_orm::Database::connect(options).await?;
        Ok(Box::new(connection))
    }
}

/// Status code and JSON body of a handled request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReply {
    pub status: u16,
    pub body:   serde_json::Value,
}

impl IngestReply {
    fn success(scanned_items: usize, sales_floor: usize) -> Self {
        Self {
            status: 200,
            body:   json!({
                "status": "success",
                "scanned_items_written": scanned_items,
                "sales_floor_upserted": sales_floor,
            }),
        }
    }

    fn failure(err: &VizError) -> Self {
        Self {
            status: err.http_status(),
            body:   json!({ "error": err.to_string() }),
        }
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Turns sync requests into warehouse writes.
///
/// Warehouse settings are resolved on every request so that a fixed environment takes effect without a restart.
#[derive(Clone)]
pub struct IngestHandler {
    warehouse: Arc<dyn Warehouse>,
    env:       EnvLookup,
}

impl IngestHandler {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self::with_env(warehouse, |name| std::env::var(name).ok())
    }

    pub fn with_env<L>(warehouse: Arc<dyn Warehouse>, lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            warehouse,
            env: Arc::new(lookup),
        }
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// Handle one request body. Never fails: errors are reported through the reply status.
    #[instrument(level = "info", skip_all, fields(bytes = body.len()))]
    pub async fn handle(&self, body: &[u8]) -> IngestReply {
        match self.ingest(body).await {
            Ok(reply) => {
                info!(body = %reply.body, "request completed");
                reply
            }
            Err(err) => {
                error!("request failed: {err}");
                IngestReply::failure(&err)
            }
        }
    }

    async fn ingest(&self, body: &[u8]) -> Result<IngestReply> {
        let payload = SyncPayload::from_slice(body)?;
        info!(
            "received {} scanned_items and {} sales_floor rows",
            payload.scanned_items.len(),
            payload.sales_floor.len()
        );

        // Every row is checked before a connection is opened.
        let insert = scanned_items_insert(&payload.scanned_items)?;
        let merges = payload
            .sales_floor
            .iter()
            .map(sales_floor_merge)
            .collect::<Result<Vec<_>>>()?;

        let settings = WarehouseSettings::from_lookup(|name| (self.env)(name))?;
        info!(user = %settings.user, account = %settings.account, "connecting to warehouse");
        let mut session = self.warehouse.connect(&settings).await?;

        let outcome = Self::write(session.as_mut(), insert, merges).await;

        if let Err(err) = session.close().await {
            warn!("failed to close warehouse session: {err}");
        }
        else {
            info!("warehouse session closed");
        }

        outcome?;
        Ok(IngestReply::success(
            payload.scanned_items.len(),
            payload.sales_floor.len(),
        ))
    }

    async fn write(session: &mut dyn WarehouseSession, insert: Option<Statement>, merges: Vec<Statement>) -> Result<()> {
        if let Some(insert) = insert {
            let rows = session.execute(insert).await?;
            info!("inserted {rows} rows into SCANNED_ITEMS");
        }
        else {
            info!("no scanned_items to insert, skipping");
        }

        if merges.is_empty() {
            info!("no sales_floor rows to upsert, skipping");
        }
        let total = merges.len();
        for (idx, merge) in merges.into_iter().enumerate() {
            info!("upserting SALES_FLOOR row {}/{total}", idx + 1);
            session.execute(merge).await?;
        }

        Ok(())
    }
}

impl Debug for IngestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestHandler")
            .field("warehouse", &self.warehouse)
            .finish()
    }
}
