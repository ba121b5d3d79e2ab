//! Postgres-backed transfer-root store
//!
//! Amounts are stored as NUMERIC(78,0) so a full uint256 fits; they cross
//! the sqlx boundary as text (`$n::NUMERIC` on insert, `amount::TEXT` on
//! select) and parse to u128 in the row conversion.

use eyre::{Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::error;

use async_trait::async_trait;

use super::{not_found, StoreError, TransferRoot, TransferRootStore, TransferRootUpdate};

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run pending migrations (uses the migration files in migrations/)
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct TransferRootRow {
    root_hash: Vec<u8>,
    total_amount: String,
    destination_chain_id: i64,
    bonded_at: Option<i64>,
    bond_total_amount: Option<String>,
    committed: bool,
    challenged: bool,
    challenge_expired: bool,
    confirmed: bool,
    settled: bool,
}

impl TransferRootRow {
    fn into_transfer_root(self) -> Result<TransferRoot, StoreError> {
        let root_hash: [u8; 32] = self
            .root_hash
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Write("root_hash is not 32 bytes".to_string()))?;

        let total_amount = self
            .total_amount
            .parse::<u128>()
            .map_err(|e| StoreError::Write(format!("bad total_amount: {}", e)))?;

        let bond_total_amount = self
            .bond_total_amount
            .map(|s| s.parse::<u128>())
            .transpose()
            .map_err(|e| StoreError::Write(format!("bad bond_total_amount: {}", e)))?;

        Ok(TransferRoot {
            root_hash,
            total_amount,
            destination_chain_id: self.destination_chain_id as u64,
            bonded_at: self.bonded_at.map(|t| t as u64),
            bond_total_amount,
            committed: self.committed,
            challenged: self.challenged,
            challenge_expired: self.challenge_expired,
            confirmed: self.confirmed,
            settled: self.settled,
        })
    }
}

const SELECT_COLUMNS: &str = "root_hash, total_amount::TEXT as total_amount, \
     destination_chain_id, bonded_at, bond_total_amount::TEXT as bond_total_amount, \
     committed, challenged, challenge_expired, confirmed, settled";

/// Transfer-root store backed by Postgres
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransferRootStore for PgStore {
    async fn insert_if_absent(&self, root: TransferRoot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transfer_roots (root_hash, total_amount, destination_chain_id,
                bonded_at, bond_total_amount, committed, challenged, challenge_expired,
                confirmed, settled)
            VALUES ($1, $2::NUMERIC, $3, $4, $5::NUMERIC, $6, $7, $8, $9, $10)
            ON CONFLICT (root_hash) DO NOTHING
            "#,
        )
        .bind(root.root_hash.as_slice())
        .bind(root.total_amount.to_string())
        .bind(root.destination_chain_id as i64)
        .bind(root.bonded_at.map(|t| t as i64))
        .bind(root.bond_total_amount.map(|a| a.to_string()))
        .bind(root.committed)
        .bind(root.challenged)
        .bind(root.challenge_expired)
        .bind(root.confirmed)
        .bind(root.settled)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(format!("insert transfer root: {}", e)))?;

        Ok(())
    }

    async fn get_challengeable_transfer_roots(&self) -> Result<Vec<TransferRoot>, StoreError> {
        let rows = sqlx::query_as::<_, TransferRootRow>(&format!(
            r#"SELECT {} FROM transfer_roots
               WHERE bonded_at IS NOT NULL
                 AND NOT challenged AND NOT challenge_expired AND NOT confirmed
               ORDER BY id"#,
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("SQL error getting challengeable transfer roots: {:?}", e);
            StoreError::Write(format!("select challengeable roots: {}", e))
        })?;

        rows.into_iter().map(|r| r.into_transfer_root()).collect()
    }

    async fn get_by_root_hash(&self, root_hash: [u8; 32]) -> Result<TransferRoot, StoreError> {
        let row = sqlx::query_as::<_, TransferRootRow>(&format!(
            "SELECT {} FROM transfer_roots WHERE root_hash = $1",
            SELECT_COLUMNS
        ))
        .bind(root_hash.as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Write(format!("select transfer root: {}", e)))?;

        row.ok_or_else(|| not_found(&root_hash))?.into_transfer_root()
    }

    async fn update(
        &self,
        root_hash: [u8; 32],
        update: TransferRootUpdate,
    ) -> Result<(), StoreError> {
        // Single statement so the merge is atomic per record. Booleans OR
        // into the stored flags, which also enforces monotonicity.
        let result = sqlx::query(
            r#"
            UPDATE transfer_roots SET
                bonded_at = COALESCE($2, bonded_at),
                bond_total_amount = COALESCE($3::NUMERIC, bond_total_amount),
                committed = committed OR $4,
                challenged = challenged OR $5,
                challenge_expired = challenge_expired OR $6,
                confirmed = confirmed OR $7,
                settled = settled OR $8,
                updated_at = NOW()
            WHERE root_hash = $1
            "#,
        )
        .bind(root_hash.as_slice())
        .bind(update.bonded_at.map(|t| t as i64))
        .bind(update.bond_total_amount.map(|a| a.to_string()))
        .bind(update.committed)
        .bind(update.challenged)
        .bind(update.challenge_expired)
        .bind(update.confirmed)
        .bind(update.settled)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(format!("update transfer root: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(not_found(&root_hash));
        }
        Ok(())
    }
}
