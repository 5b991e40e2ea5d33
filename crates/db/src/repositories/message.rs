use sqlx::Row;

use parley_core::domain::message::{MessageRole, StoredMessage};
use parley_core::domain::negotiation::NegotiationId;
use parley_core::domain::offer::Offer;
use parley_core::engine::Decision;

use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(
        &self,
        id: &NegotiationId,
        message: StoredMessage,
    ) -> Result<(), RepositoryError> {
        let extracted_offer_json = message
            .extracted_offer
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let decision_json = message
            .decision
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO messages (negotiation_id, role, content, extracted_offer_json, \
             decision_json, round, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(extracted_offer_json)
        .bind(decision_json)
        .bind(i64::from(message.round))
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(
        &self,
        id: &NegotiationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT role, content, extracted_offer_json, decision_json, round, created_at \
             FROM messages WHERE negotiation_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(&id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(decode_message)
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn decode_message(row: sqlx::sqlite::SqliteRow) -> Result<StoredMessage, RepositoryError> {
    let role_raw: String = row.get("role");
    let role = MessageRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_raw}`")))?;
    let round: i64 = row.get("round");

    let extracted_offer = row
        .get::<Option<String>, _>("extracted_offer_json")
        .as_deref()
        .map(serde_json::from_str::<Offer>)
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let decision = row
        .get::<Option<String>, _>("decision_json")
        .as_deref()
        .map(serde_json::from_str::<Decision>)
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(StoredMessage {
        role,
        content: row.get("content"),
        extracted_offer,
        decision,
        round: round as u32,
        created_at: row.get("created_at"),
    })
}
