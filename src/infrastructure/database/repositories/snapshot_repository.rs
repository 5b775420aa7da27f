//! SeaORM implementation of SnapshotStore

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::debug;

use crate::domain::tariff::model::RATE_SCALE;
use crate::domain::{DomainResult, RateUpdate, SnapshotStore, TariffRecord};
use crate::infrastructure::database::entities::warehouse_tariff;

/// Rows per INSERT statement, well below SQLite's bind parameter limit.
const INSERT_CHUNK: usize = 200;

// ── Conversion helpers ──────────────────────────────────────────

/// SQLite hands decimals back through `f64`; snap them to the stored scale.
fn rate(value: Decimal) -> Decimal {
    value.round_dp(RATE_SCALE)
}

fn entity_to_domain(m: warehouse_tariff::Model) -> TariffRecord {
    TariffRecord {
        warehouse_name: m.warehouse_name,
        day: m.day,
        delivery_and_storage_coefficient: m.delivery_and_storage_coefficient,
        delivery_base_rate: rate(m.delivery_base_rate),
        delivery_per_liter_rate: rate(m.delivery_per_liter_rate),
        storage_base_rate: m.storage_base_rate.map(rate),
        storage_per_liter_rate: m.storage_per_liter_rate.map(rate),
    }
}

fn domain_to_active(r: TariffRecord) -> warehouse_tariff::ActiveModel {
    let now = Utc::now();
    warehouse_tariff::ActiveModel {
        id: NotSet,
        warehouse_name: Set(r.warehouse_name),
        day: Set(r.day),
        delivery_and_storage_coefficient: Set(r.delivery_and_storage_coefficient),
        delivery_base_rate: Set(r.delivery_base_rate),
        delivery_per_liter_rate: Set(r.delivery_per_liter_rate),
        storage_base_rate: Set(r.storage_base_rate),
        storage_per_liter_rate: Set(r.storage_per_liter_rate),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

pub struct SeaOrmSnapshotRepository {
    db: DatabaseConnection,
}

impl SeaOrmSnapshotRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SnapshotStore for SeaOrmSnapshotRepository {
    async fn exists_for_day(&self, day: NaiveDate) -> DomainResult<bool> {
        let found = warehouse_tariff::Entity::find()
            .filter(warehouse_tariff::Column::Day.eq(day))
            .one(&self.db)
            .await?;
        Ok(found.is_some())
    }

    /// All chunks commit together, so a failed first run leaves the day unseeded.
    async fn insert_many(&self, records: Vec<TariffRecord>) -> DomainResult<u64> {
        let txn = self.db.begin().await?;
        let mut inserted = 0;
        let mut records = records.into_iter().peekable();

        while records.peek().is_some() {
            let chunk: Vec<_> = records.by_ref().take(INSERT_CHUNK).map(domain_to_active).collect();
            inserted += warehouse_tariff::Entity::insert_many(chunk)
                .on_conflict(
                    OnConflict::columns([
                        warehouse_tariff::Column::Day,
                        warehouse_tariff::Column::WarehouseName,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        debug!(inserted, "Warehouse tariffs inserted");
        Ok(inserted)
    }

    async fn update_by_warehouse_and_day(
        &self,
        day: NaiveDate,
        update: &RateUpdate,
    ) -> DomainResult<u64> {
        let result = warehouse_tariff::Entity::update_many()
            .col_expr(
                warehouse_tariff::Column::DeliveryAndStorageCoefficient,
                Expr::value(update.delivery_and_storage_coefficient),
            )
            .col_expr(
                warehouse_tariff::Column::DeliveryBaseRate,
                Expr::value(update.delivery_base_rate),
            )
            .col_expr(
                warehouse_tariff::Column::DeliveryPerLiterRate,
                Expr::value(update.delivery_per_liter_rate),
            )
            .col_expr(
                warehouse_tariff::Column::StorageBaseRate,
                Expr::value(update.storage_base_rate),
            )
            .col_expr(
                warehouse_tariff::Column::StoragePerLiterRate,
                Expr::value(update.storage_per_liter_rate),
            )
            .col_expr(warehouse_tariff::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(warehouse_tariff::Column::Day.eq(day))
            .filter(warehouse_tariff::Column::WarehouseName.eq(update.warehouse_name.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn select_for_day(&self, day: NaiveDate) -> DomainResult<Vec<TariffRecord>> {
        let models = warehouse_tariff::Entity::find()
            .filter(warehouse_tariff::Column::Day.eq(day))
            .order_by_asc(warehouse_tariff::Column::DeliveryAndStorageCoefficient)
            .order_by_asc(warehouse_tariff::Column::WarehouseName)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(entity_to_domain).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::test_connection;
    use sea_orm::ConnectionTrait;
    use std::str::FromStr;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn record(name: &str, coef: i32, on: NaiveDate) -> TariffRecord {
        TariffRecord {
            warehouse_name: name.into(),
            day: on,
            delivery_and_storage_coefficient: coef,
            delivery_base_rate: Decimal::from_str("10.50").unwrap(),
            delivery_per_liter_rate: Decimal::ONE,
            storage_base_rate: None,
            storage_per_liter_rate: Some(Decimal::from_str("0.07").unwrap()),
        }
    }

    #[tokio::test]
    async fn insert_then_select_orders_by_coefficient() {
        let repo = SeaOrmSnapshotRepository::new(test_connection().await);
        assert!(!repo.exists_for_day(day(14)).await.unwrap());

        let inserted = repo
            .insert_many(vec![
                record("Коледино", 9, day(14)),
                record("Казань", 2, day(14)),
                record("Электросталь", 5, day(14)),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);
        assert!(repo.exists_for_day(day(14)).await.unwrap());
        assert!(!repo.exists_for_day(day(15)).await.unwrap());

        let rows = repo.select_for_day(day(14)).await.unwrap();
        let coefs: Vec<i32> = rows.iter().map(|r| r.delivery_and_storage_coefficient).collect();
        assert_eq!(coefs, vec![2, 5, 9]);
        assert_eq!(rows[0].delivery_base_rate, Decimal::from_str("10.50").unwrap());
        assert_eq!(rows[0].storage_base_rate, None);
        assert_eq!(rows[0].storage_per_liter_rate, Some(Decimal::from_str("0.07").unwrap()));
    }

    #[tokio::test]
    async fn conflicting_rows_are_skipped() {
        let repo = SeaOrmSnapshotRepository::new(test_connection().await);
        repo.insert_many(vec![record("A", 1, day(14))]).await.unwrap();

        let inserted = repo
            .insert_many(vec![record("A", 3, day(14)), record("B", 2, day(14))])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        let rows = repo.select_for_day(day(14)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].warehouse_name, "A");
        assert_eq!(rows[0].delivery_and_storage_coefficient, 1);
    }

    #[tokio::test]
    async fn update_touches_only_the_given_day() {
        let repo = SeaOrmSnapshotRepository::new(test_connection().await);
        repo.insert_many(vec![record("A", 5, day(13)), record("A", 5, day(14))])
            .await
            .unwrap();

        let mut changed = RateUpdate::from(&record("A", 7, day(14)));
        changed.storage_base_rate = Some(Decimal::TWO);
        assert_eq!(repo.update_by_warehouse_and_day(day(14), &changed).await.unwrap(), 1);

        let today = repo.select_for_day(day(14)).await.unwrap();
        assert_eq!(today[0].delivery_and_storage_coefficient, 7);
        assert_eq!(today[0].storage_base_rate, Some(Decimal::TWO));
        let yesterday = repo.select_for_day(day(13)).await.unwrap();
        assert_eq!(yesterday[0].delivery_and_storage_coefficient, 5);

        let unknown = RateUpdate::from(&record("B", 1, day(14)));
        assert_eq!(repo.update_by_warehouse_and_day(day(14), &unknown).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_chunk_rolls_back_the_whole_insert() {
        let db = test_connection().await;
        db.execute_unprepared(
            "CREATE TRIGGER reject_broken BEFORE INSERT ON warehouse_tariffs \
             WHEN NEW.warehouse_name = 'broken' \
             BEGIN SELECT RAISE(ABORT, 'broken warehouse'); END;",
        )
        .await
        .unwrap();
        let repo = SeaOrmSnapshotRepository::new(db);

        let mut batch: Vec<_> = (0..INSERT_CHUNK + 50)
            .map(|i| record(&format!("Склад {i}"), 1, day(14)))
            .collect();
        batch[INSERT_CHUNK + 10].warehouse_name = "broken".into();

        assert!(repo.insert_many(batch).await.is_err());
        assert!(!repo.exists_for_day(day(14)).await.unwrap());
        assert!(repo.select_for_day(day(14)).await.unwrap().is_empty());
    }
}
