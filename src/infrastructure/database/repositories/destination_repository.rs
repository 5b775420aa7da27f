//! SeaORM implementation of DestinationRegistry

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::info;

use crate::domain::{Destination, DestinationRegistry, DomainError, DomainResult};
use crate::infrastructure::database::entities::spreadsheet;

fn entity_to_domain(m: spreadsheet::Model) -> Destination {
    Destination {
        id: m.id,
        destination_id: m.spreadsheet_id,
        created_at: m.created_at,
    }
}

pub struct SeaOrmDestinationRepository {
    db: DatabaseConnection,
}

impl SeaOrmDestinationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DestinationRegistry for SeaOrmDestinationRepository {
    async fn list(&self) -> DomainResult<Vec<Destination>> {
        let models = spreadsheet::Entity::find()
            .order_by_asc(spreadsheet::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(entity_to_domain).collect())
    }

    async fn add(&self, destination_id: &str) -> DomainResult<Destination> {
        let existing = spreadsheet::Entity::find()
            .filter(spreadsheet::Column::SpreadsheetId.eq(destination_id))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(DomainError::Conflict(format!(
                "spreadsheet {destination_id} is already registered"
            )));
        }

        let model = spreadsheet::ActiveModel {
            spreadsheet_id: Set(destination_id.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let saved = model.insert(&self.db).await?;
        info!(destination = %saved.spreadsheet_id, id = saved.id, "Spreadsheet registered");
        Ok(entity_to_domain(saved))
    }

    async fn remove(&self, destination_id: &str) -> DomainResult<u64> {
        let result = spreadsheet::Entity::delete_many()
            .filter(spreadsheet::Column::SpreadsheetId.eq(destination_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            info!(destination = %destination_id, "Spreadsheet unregistered");
        }
        Ok(result.rows_affected)
    }
}
