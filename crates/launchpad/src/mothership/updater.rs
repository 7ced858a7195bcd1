// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Upserts of deployed stacks into the mothership database.

use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use super::jsonpath::{extract, extract_string};
use super::{CustomerRow, DataPlaneRow, MIGRATOR, TierRow};
use crate::error::{Error, Result};
use crate::launch::StackKind;

/// Output paths that hold credentials and are not copied to the database.
const REDACTED: &[&str] = &["msk.password", "eks.kubeconfig"];

/// What a sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A plane row was written.
    Plane(i64),
    /// A tier row (and its customer) was written.
    Tier(i64),
    /// Rows of a destroyed stack were marked deleted.
    Deleted(StackKind),
    /// The stack kind has no mothership record.
    Skipped,
}

/// Mothership database handle.
#[derive(Debug, Clone)]
pub struct MothershipDb {
    pool: PgPool,
}

impl MothershipDb {
    /// Wrap an existing pool. Migrations are not run.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        let db = Self::new(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Apply pending migrations. Already applied ones are skipped.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Record a stack: its outputs when deployed, a deletion when `None`.
    pub async fn sync_stack(&self, stack: &str, outputs: Option<&Value>) -> Result<SyncOutcome> {
        let kind = StackKind::parse(stack)?;
        match (kind, outputs) {
            (StackKind::Plane(_), Some(outputs)) => {
                self.sync_plane(stack, outputs).await.map(SyncOutcome::Plane)
            }
            (StackKind::Tier(_), Some(outputs)) => {
                self.sync_tier(stack, outputs).await.map(SyncOutcome::Tier)
            }
            (StackKind::Plane(id), None) => {
                self.mark_plane_deleted(id).await?;
                Ok(SyncOutcome::Deleted(kind))
            }
            (StackKind::Tier(id), None) => {
                self.mark_tier_deleted(id).await?;
                Ok(SyncOutcome::Deleted(kind))
            }
            (StackKind::Mothership(_), _) => {
                warn!(stack, "Mothership stacks are not recorded");
                Ok(SyncOutcome::Skipped)
            }
        }
    }

    /// Upsert the `data_plane` row from plane outputs. Returns the plane id.
    pub async fn sync_plane(&self, stack: &str, outputs: &Value) -> Result<i64> {
        let plane_id = required_i64(outputs, stack, "planeId")?;
        let region = required(outputs, stack, "region")?;
        let account_id = required(outputs, stack, "account.accountId")?;
        let vpc_id = required(outputs, stack, "vpc.vpcId")?;
        let cluster_name = required(outputs, stack, "eks.clusterName")?;
        let endpoint = required(outputs, stack, "eks.endpoint")?;
        let kafka_bootstrap = extract_string(outputs, "msk.bootstrapBrokersSaslScram");
        let db_endpoint = extract_string(outputs, "aurora.endpoint");

        sqlx::query(
            r#"
            INSERT INTO data_plane (
                plane_id, region, account_id, vpc_id, eks_cluster_name, eks_endpoint,
                kafka_bootstrap, db_endpoint, outputs, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'ready', NOW(), NOW())
            ON CONFLICT (plane_id) DO UPDATE SET
                region = EXCLUDED.region,
                account_id = EXCLUDED.account_id,
                vpc_id = EXCLUDED.vpc_id,
                eks_cluster_name = EXCLUDED.eks_cluster_name,
                eks_endpoint = EXCLUDED.eks_endpoint,
                kafka_bootstrap = EXCLUDED.kafka_bootstrap,
                db_endpoint = EXCLUDED.db_endpoint,
                outputs = EXCLUDED.outputs,
                status = 'ready',
                updated_at = NOW(),
                deleted_at = NULL
            "#,
        )
        .bind(plane_id)
        .bind(&region)
        .bind(&account_id)
        .bind(&vpc_id)
        .bind(&cluster_name)
        .bind(&endpoint)
        .bind(&kafka_bootstrap)
        .bind(&db_endpoint)
        .bind(redact(outputs))
        .execute(&self.pool)
        .await?;

        info!(plane_id, cluster = %cluster_name, "Data plane recorded");
        Ok(plane_id)
    }

    /// Upsert the `customer` and `tier` rows from tier outputs. Returns the
    /// tier id. The plane must already be recorded.
    pub async fn sync_tier(&self, stack: &str, outputs: &Value) -> Result<i64> {
        let tier_id = required_i64(outputs, stack, "tierId")?;
        let plane_id = required_i64(outputs, stack, "planeId")?;
        let customer_id = required_i64(outputs, stack, "customerId")?;
        let customer_name = required(outputs, stack, "customerName")?;
        let namespace = required(outputs, stack, "namespace")?;
        let api_url = required(outputs, stack, "apiUrl")?;
        let database_name = required(outputs, stack, "databaseName")?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO customer (customer_id, name, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            ON CONFLICT (customer_id) DO UPDATE SET
                name = EXCLUDED.name,
                updated_at = NOW()
            "#,
        )
        .bind(customer_id)
        .bind(&customer_name)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tier (
                tier_id, plane_id, customer_id, namespace, api_url, database_name,
                outputs, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'ready', NOW(), NOW())
            ON CONFLICT (tier_id) DO UPDATE SET
                plane_id = EXCLUDED.plane_id,
                customer_id = EXCLUDED.customer_id,
                namespace = EXCLUDED.namespace,
                api_url = EXCLUDED.api_url,
                database_name = EXCLUDED.database_name,
                outputs = EXCLUDED.outputs,
                status = 'ready',
                updated_at = NOW(),
                deleted_at = NULL
            "#,
        )
        .bind(tier_id)
        .bind(plane_id)
        .bind(customer_id)
        .bind(&namespace)
        .bind(&api_url)
        .bind(&database_name)
        .bind(redact(outputs))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(tier_id, plane_id, customer_id, "Tier recorded");
        Ok(tier_id)
    }

    /// Mark a plane as deleted. Returns false if it was never recorded.
    pub async fn mark_plane_deleted(&self, plane_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE data_plane
            SET status = 'deleted', deleted_at = NOW(), updated_at = NOW()
            WHERE plane_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(plane_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a tier as deleted. Returns false if it was never recorded.
    pub async fn mark_tier_deleted(&self, tier_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tier
            SET status = 'deleted', deleted_at = NOW(), updated_at = NOW()
            WHERE tier_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(tier_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Recorded plane.
    pub async fn plane(&self, plane_id: i64) -> Result<Option<DataPlaneRow>> {
        Ok(sqlx::query_as::<_, DataPlaneRow>(
            r#"
            SELECT plane_id, region, account_id, vpc_id, eks_cluster_name, eks_endpoint,
                   kafka_bootstrap, db_endpoint, outputs, status, created_at, updated_at, deleted_at
            FROM data_plane
            WHERE plane_id = $1
            "#,
        )
        .bind(plane_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Recorded tier.
    pub async fn tier(&self, tier_id: i64) -> Result<Option<TierRow>> {
        Ok(sqlx::query_as::<_, TierRow>(
            r#"
            SELECT tier_id, plane_id, customer_id, namespace, api_url, database_name,
                   outputs, status, created_at, updated_at, deleted_at
            FROM tier
            WHERE tier_id = $1
            "#,
        )
        .bind(tier_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Recorded customer.
    pub async fn customer(&self, customer_id: i64) -> Result<Option<CustomerRow>> {
        Ok(sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT customer_id, name, created_at, updated_at
            FROM customer
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

fn required(outputs: &Value, stack: &str, path: &str) -> Result<String> {
    extract_string(outputs, path).ok_or_else(|| Error::MissingStackOutput {
        stack: stack.to_string(),
        path: path.to_string(),
    })
}

fn required_i64(outputs: &Value, stack: &str, path: &str) -> Result<i64> {
    extract(outputs, path)
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::MissingStackOutput {
            stack: stack.to_string(),
            path: path.to_string(),
        })
}

/// Copy of `outputs` without credential fields.
pub(crate) fn redact(outputs: &Value) -> Value {
    let mut copy = outputs.clone();
    for path in REDACTED {
        if let Some((parent, key)) = path.rsplit_once('.')
            && let Some(Value::Object(map)) = copy.pointer_mut(&format!("/{}", parent.replace('.', "/")))
        {
            map.remove(key);
        }
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redact_removes_credentials() {
        let outputs = json!({
            "msk": {"password": "s3cret", "username": "launchpad"},
            "eks": {"kubeconfig": "{}", "clusterName": "p1"},
            "aurora": null
        });
        let redacted = redact(&outputs);
        assert_eq!(redacted["msk"], json!({"username": "launchpad"}));
        assert_eq!(redacted["eks"], json!({"clusterName": "p1"}));
        assert_eq!(outputs["msk"]["password"], "s3cret");
    }

    #[test]
    fn test_required_reports_path() {
        let err = required(&json!({"eks": {}}), "plane-1", "eks.clusterName").unwrap_err();
        assert!(matches!(
            err,
            Error::MissingStackOutput { ref path, .. } if path == "eks.clusterName"
        ));
        assert!(required_i64(&json!({"planeId": "x"}), "plane-1", "planeId").is_err());
    }
}
