use std::collections::HashMap;

use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use praygram_db::models::{MembershipRow, PrayerRow};
use praygram_db::Database;
use praygram_types::api::{
    AuthorInfo, Claims, CreatePrayerRequest, PrayerResponse, ReactionEntry, ReactionType,
    Role, UpdatePrayerRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::parse_timestamp;

const MAX_TITLE_LEN: usize = 100;
const MAX_CONTENT_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct PrayerQuery {
    #[serde(rename = "groupId")]
    pub group_id: String,
}

pub async fn create_prayer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePrayerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = validate_title(&req.title)?;
    let content = validate_content(&req.content)?;
    if req.group_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("Group ID is required".into()));
    }

    let db = state.clone();
    let group_id = req.group_id.trim().to_string();
    let author_id = claims.sub.to_string();
    let is_private = req.is_private.unwrap_or(false);
    let prayer = tokio::task::spawn_blocking(move || {
        require_membership(&db.db, &group_id, &author_id)?;

        let prayer_id = Uuid::new_v4().to_string();
        db.db
            .insert_prayer(&prayer_id, &title, &content, &group_id, &author_id, is_private)?;

        db.db
            .get_prayer(&prayer_id)?
            .ok_or_else(|| ApiError::Internal(anyhow!("prayer {} vanished after insert", prayer_id)))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    Ok((StatusCode::CREATED, Json(prayer_to_response(prayer, vec![]))))
}

pub async fn list_prayers(
    State(state): State<AppState>,
    Query(query): Query<PrayerQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if query.group_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("Group ID is required".into()));
    }

    let db = state.clone();
    let group_id = query.group_id.trim().to_string();
    let user_id = claims.sub.to_string();
    let (rows, reaction_rows) = tokio::task::spawn_blocking(move || {
        require_membership(&db.db, &group_id, &user_id)?;

        let rows = db.db.get_prayers_for_group(&group_id)?;
        let prayer_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reaction_rows = db.db.get_reactions_for_prayers(&prayer_ids)?;

        Ok::<_, ApiError>((rows, reaction_rows))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    // Group reactions by prayer_id (cheap in-memory work, fine on the async thread)
    let mut reaction_map: HashMap<String, Vec<ReactionEntry>> = HashMap::new();
    for r in reaction_rows {
        let Some(kind) = ReactionType::parse(&r.kind) else {
            warn!("Corrupt reaction type '{}' on reaction '{}'", r.kind, r.id);
            continue;
        };
        reaction_map.entry(r.prayer_id.clone()).or_default().push(ReactionEntry {
            id: r.id,
            kind,
            user_id: r.user_id,
        });
    }

    let prayers: Vec<PrayerResponse> = rows
        .into_iter()
        .map(|row| {
            let reactions = reaction_map.remove(&row.id).unwrap_or_default();
            prayer_to_response(row, reactions)
        })
        .collect();

    Ok(Json(prayers))
}

pub async fn get_prayer(
    State(state): State<AppState>,
    Path(prayer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let pid = prayer_id.to_string();
    let user_id = claims.sub.to_string();
    let (prayer, reactions) = tokio::task::spawn_blocking(move || {
        let prayer = db.db.get_prayer(&pid)?.ok_or(ApiError::PrayerNotFound)?;
        require_membership(&db.db, &prayer.group_id, &user_id)?;
        let reactions = db.db.get_reactions_for_prayers(&[pid])?;
        Ok::<_, ApiError>((prayer, reactions))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    let entries = reactions
        .into_iter()
        .filter_map(|r| {
            let kind = ReactionType::parse(&r.kind)?;
            Some(ReactionEntry {
                id: r.id,
                kind,
                user_id: r.user_id,
            })
        })
        .collect();

    Ok(Json(prayer_to_response(prayer, entries)))
}

pub async fn update_prayer(
    State(state): State<AppState>,
    Path(prayer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePrayerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.as_deref().map(validate_title).transpose()?;
    let content = req.content.as_deref().map(validate_content).transpose()?;

    let db = state.clone();
    let pid = prayer_id.to_string();
    let user_id = claims.sub.to_string();
    let prayer = tokio::task::spawn_blocking(move || {
        let prayer = db.db.get_prayer(&pid)?.ok_or(ApiError::PrayerNotFound)?;

        if prayer.author_id != user_id {
            return Err(ApiError::Forbidden(
                "You can only edit your own prayers".into(),
            ));
        }

        db.db
            .update_prayer(&pid, title.as_deref(), content.as_deref(), req.is_private)?;

        db.db
            .get_prayer(&pid)?
            .ok_or_else(|| ApiError::Internal(anyhow!("prayer {} vanished during update", pid)))
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    Ok(Json(prayer_to_response(prayer, vec![])))
}

pub async fn delete_prayer(
    State(state): State<AppState>,
    Path(prayer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let pid = prayer_id.to_string();
    let user_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        let prayer = db.db.get_prayer(&pid)?.ok_or(ApiError::PrayerNotFound)?;

        // Authors delete their own prayers; group leaders can moderate.
        let is_author = prayer.author_id == user_id;
        let is_leader = !is_author
            && db
                .db
                .get_membership(&prayer.group_id, &user_id)?
                .map(|m| m.role == Role::Leader.as_str())
                .unwrap_or(false);

        if !is_author && !is_leader {
            return Err(ApiError::Forbidden(
                "You can only delete your own prayers or as a group leader".into(),
            ));
        }

        // Reactions are removed by the cascade.
        db.db.delete_prayer(&pid)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    Ok(Json(
        serde_json::json!({ "message": "Prayer deleted successfully" }),
    ))
}

/// 403 unless the user belongs to the group.
pub(crate) fn require_membership(
    db: &Database,
    group_id: &str,
    user_id: &str,
) -> Result<MembershipRow, ApiError> {
    db.get_membership(group_id, user_id)?
        .ok_or_else(|| ApiError::Forbidden("You are not a member of this group".into()))
}

fn validate_title(raw: &str) -> Result<String, ApiError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ApiError::InvalidInput("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::InvalidInput(
            "Title must be 100 characters or less".into(),
        ));
    }
    Ok(title.to_string())
}

fn validate_content(raw: &str) -> Result<String, ApiError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(ApiError::InvalidInput("Content is required".into()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(ApiError::InvalidInput(
            "Content must be 500 characters or less".into(),
        ));
    }
    Ok(content.to_string())
}

fn prayer_to_response(row: PrayerRow, reactions: Vec<ReactionEntry>) -> PrayerResponse {
    let reaction_count = reactions.len();
    PrayerResponse {
        created_at: parse_timestamp(&row.created_at, "prayer"),
        updated_at: parse_timestamp(&row.updated_at, "prayer"),
        id: row.id,
        title: row.title,
        content: row.content,
        group_id: row.group_id,
        author_id: row.author_id,
        is_private: row.is_private,
        author: Some(AuthorInfo {
            nickname: row.author_nickname,
        }),
        reactions,
        reaction_count,
        is_offline: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn title_and_content_bounds() {
        assert!(validate_title("  lift up my family  ").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(101)).is_err());
        assert!(validate_content(&"x".repeat(500)).is_ok());
        assert!(validate_content(&"x".repeat(501)).is_err());
    }

    #[test]
    fn membership_gate_rejects_non_members() {
        let db = test_db();
        let uid = Uuid::new_v4().to_string();
        db.create_profile(&uid, "ann", "hash").unwrap();
        let gid = Uuid::new_v4().to_string();
        db.insert_group(&gid, "cell", None, &Uuid::new_v4().to_string())
            .unwrap();

        let err = require_membership(&db, &gid, &uid).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        db.insert_membership(&gid, &uid, "MEMBER").unwrap();
        assert!(require_membership(&db, &gid, &uid).is_ok());
    }
}
