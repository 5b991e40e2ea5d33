use chrono::{DateTime, Utc};
use sqlx::Row;

use parley_core::domain::negotiation::{
    Negotiation, NegotiationConfig, NegotiationId, NegotiationStatus,
};
use parley_core::domain::offer::Offer;
use parley_core::orchestrator::state::ConversationState;

use super::{NegotiationRepository, RepositoryError, TurnCommit};
use crate::DbPool;

pub struct SqlNegotiationRepository {
    pool: DbPool,
}

impl SqlNegotiationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NegotiationRepository for SqlNegotiationRepository {
    async fn find_by_id(
        &self,
        id: &NegotiationId,
    ) -> Result<Option<Negotiation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, vendor_name, owner_user_id, status, round, config_json, state_json, \
             last_offer_json, created_at, updated_at FROM negotiations WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_negotiation).transpose()
    }

    async fn create(&self, negotiation: Negotiation) -> Result<(), RepositoryError> {
        let config_json = serde_json::to_string(&negotiation.config)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let state_json = negotiation
            .state
            .to_blob()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let last_offer_json = encode_offer(negotiation.last_offer.as_ref())?;

        sqlx::query(
            "INSERT INTO negotiations (id, vendor_name, owner_user_id, status, round, \
             config_json, state_json, last_offer_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&negotiation.id.0)
        .bind(&negotiation.vendor_name)
        .bind(&negotiation.owner_user_id)
        .bind(negotiation.status.as_str())
        .bind(i64::from(negotiation.round))
        .bind(config_json)
        .bind(state_json)
        .bind(last_offer_json)
        .bind(negotiation.created_at)
        .bind(negotiation.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn commit_turn(&self, commit: TurnCommit) -> Result<(), RepositoryError> {
        let state_json = commit
            .state
            .to_blob()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let last_offer_json = encode_offer(commit.last_offer.as_ref())?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE negotiations SET round = ?, status = ?, state_json = ?, \
             last_offer_json = COALESCE(?, last_offer_json), updated_at = ? WHERE id = ?",
        )
        .bind(i64::from(commit.round))
        .bind(commit.status.as_str())
        .bind(state_json)
        .bind(last_offer_json)
        .bind(commit.updated_at)
        .bind(&commit.negotiation_id.0)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(RepositoryError::NotFound(commit.negotiation_id.0.clone()));
        }

        for message in &commit.messages {
            let extracted_offer_json = encode_offer(message.extracted_offer.as_ref())?;
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
            .bind(&commit.negotiation_id.0)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(extracted_offer_json)
            .bind(decision_json)
            .bind(i64::from(message.round))
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn encode_offer(offer: Option<&Offer>) -> Result<Option<String>, RepositoryError> {
    offer
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn decode_negotiation(row: sqlx::sqlite::SqliteRow) -> Result<Negotiation, RepositoryError> {
    let id: String = row.get("id");
    let status_raw: String = row.get("status");
    let status = NegotiationStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status_raw}`")))?;
    let round: i64 = row.get("round");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    let config_json: String = row.get("config_json");
    let config: NegotiationConfig = serde_json::from_str(&config_json)
        .map_err(|error| RepositoryError::Decode(format!("config for `{id}`: {error}")))?;

    // A corrupt state blob degrades to a fresh conversation rather than
    // failing the load.
    let state_json: String = row.get("state_json");
    let state = match ConversationState::from_blob(Some(&state_json), updated_at) {
        Ok(state) => state,
        Err(error) => {
            tracing::warn!(
                negotiation_id = %id,
                error = %error,
                "invalid conversation state blob, reinitializing"
            );
            ConversationState::new(updated_at)
        }
    };

    let last_offer_json: Option<String> = row.get("last_offer_json");
    let last_offer = match last_offer_json.as_deref() {
        Some(raw) => match serde_json::from_str::<Offer>(raw) {
            Ok(offer) => Some(offer),
            Err(error) => {
                tracing::warn!(
                    negotiation_id = %id,
                    error = %error,
                    "invalid last offer blob, dropping"
                );
                None
            }
        },
        None => None,
    };

    Ok(Negotiation {
        id: NegotiationId(id),
        vendor_name: row.get("vendor_name"),
        owner_user_id: row.get("owner_user_id"),
        status,
        round: round as u32,
        config,
        state,
        last_offer,
        created_at: row.get("created_at"),
        updated_at,
    })
}
