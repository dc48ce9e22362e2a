use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use praygram_types::api::{AddReactionRequest, AuthorInfo, Claims, ReactionResponse, ReactionType};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::prayers::require_membership;

fn default_kind() -> ReactionType {
    ReactionType::Pray
}

#[derive(Debug, Deserialize)]
pub struct RemoveReactionQuery {
    pub prayer_id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: ReactionType,
}

pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.prayer_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("Prayer ID is required".into()));
    }

    let db = state.clone();
    let prayer_id = req.prayer_id.trim().to_string();
    let user_id = claims.sub.to_string();
    let kind = req.kind;
    let reaction_id = Uuid::new_v4().to_string();
    let rid = reaction_id.clone();
    let pid = prayer_id.clone();
    tokio::task::spawn_blocking(move || {
        let prayer = db.db.get_prayer(&pid)?.ok_or(ApiError::PrayerNotFound)?;
        require_membership(&db.db, &prayer.group_id, &user_id)?;

        // One reaction per user per type; the unique constraint is authoritative.
        match db.db.insert_reaction(&rid, &pid, &user_id, kind.as_str())? {
            praygram_db::queries::InsertOutcome::Inserted => Ok(()),
            praygram_db::queries::InsertOutcome::Duplicate => Err(ApiError::Conflict(
                "You have already reacted to this prayer".into(),
            )),
        }
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    Ok((
        StatusCode::CREATED,
        Json(ReactionResponse {
            id: reaction_id,
            prayer_id,
            user_id: claims.sub.to_string(),
            kind,
            created_at: chrono::Utc::now(),
            user: Some(AuthorInfo {
                nickname: claims.nickname.clone(),
            }),
        }),
    ))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RemoveReactionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.prayer_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("Prayer ID is required".into()));
    }

    let db = state.clone();
    let prayer_id = query.prayer_id.trim().to_string();
    let user_id = claims.sub.to_string();
    let kind = query.kind;
    tokio::task::spawn_blocking(move || {
        let prayer = db
            .db
            .get_prayer(&prayer_id)?
            .ok_or(ApiError::PrayerNotFound)?;
        require_membership(&db.db, &prayer.group_id, &user_id)?;

        // Removing an absent reaction is a no-op, not an error.
        db.db.delete_reaction(&prayer_id, &user_id, kind.as_str())?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    Ok(Json(
        serde_json::json!({ "message": "Reaction removed successfully" }),
    ))
}
