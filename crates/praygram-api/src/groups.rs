use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::error;
use uuid::Uuid;

use praygram_db::models::GroupRow;
use praygram_db::queries::InsertOutcome;
use praygram_db::Database;
use praygram_types::api::{
    Claims, CreateGroupRequest, GroupResponse, GroupSummary, JoinByInviteRequest,
    JoinGroupRequest, JoinGroupResponse, Role,
};
use praygram_types::{resolve_join_target, ResolveError};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::parse_timestamp;

pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_group_name(&req.name)?;
    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    let db = state.clone();
    let creator_id = claims.sub.to_string();
    let group = tokio::task::spawn_blocking(move || {
        create_group_record(&db.db, &name, description.as_deref(), &creator_id)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    Ok((
        StatusCode::CREATED,
        Json(GroupResponse {
            id: parse_group_id(&group.id)?,
            name: group.name,
            invite_code: group.invite_code,
            created_at: parse_timestamp(&group.created_at, "group"),
        }),
    ))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.list_groups_for_user(&user_id))
        .await
        .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    let groups = rows
        .into_iter()
        .map(|(group, role)| {
            Ok(GroupSummary {
                id: parse_group_id(&group.id)?,
                name: group.name,
                description: group.description,
                invite_code: group.invite_code,
                created_at: parse_timestamp(&group.created_at, "group"),
                role: parse_role(&role)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(groups))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let gid = group_id.to_string();
    let uid = claims.sub.to_string();
    let found = tokio::task::spawn_blocking(move || db.db.get_group_for_member(&gid, &uid))
        .await
        .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    // Non-members get the same 404 as a missing group; membership is not probeable.
    let (group, role) = found.ok_or(ApiError::GroupNotFound)?;

    Ok(Json(GroupSummary {
        id: group_id,
        name: group.name,
        description: group.description,
        invite_code: group.invite_code,
        created_at: parse_timestamp(&group.created_at, "group"),
        role: parse_role(&role)?,
    }))
}

/// Join by group id, invite code, or pasted invite link — the client does not
/// have to disambiguate.
pub async fn join_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let candidate = resolve_join_target(&req.group_id).map_err(|e| match e {
        ResolveError::InvalidFormat => ApiError::InvalidInput("Group ID is required".into()),
    })?;

    let db = state.clone();
    let user_id = claims.sub.to_string();
    let (response, created) =
        tokio::task::spawn_blocking(move || join_candidate(&db.db, &candidate, &user_id))
            .await
            .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// Legacy invite-only path: the token is looked up as an invite code, never as
/// a group id.
pub async fn join_by_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinByInviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let code = req.invite_code.trim().to_string();
    if code.is_empty() {
        return Err(ApiError::InvalidInput("Invite code is required".into()));
    }

    let db = state.clone();
    let user_id = claims.sub.to_string();
    let (response, created) = tokio::task::spawn_blocking(move || {
        let group = db
            .db
            .get_group_by_invite_code(&code)?
            .ok_or(ApiError::GroupNotFound)?;
        ensure_membership(&db.db, &group, &user_id)
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow!("spawn_blocking join error: {}", e)))??;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// Create the group row, then its LEADER membership. There is no cross-table
/// transaction here on purpose: the membership failure path must compensate by
/// deleting the group, mirroring how the service behaves against stores
/// without multi-statement transactions.
fn create_group_record(
    db: &Database,
    name: &str,
    description: Option<&str>,
    creator_id: &str,
) -> Result<GroupRow, ApiError> {
    let group_id = Uuid::new_v4().to_string();
    let invite_code = Uuid::new_v4().to_string();

    db.insert_group(&group_id, name, description, &invite_code)
        .map_err(ApiError::GroupCreationFailed)?;

    if let Err(e) = db.insert_membership(&group_id, creator_id, Role::Leader.as_str()) {
        match db.delete_group(&group_id) {
            Ok(_) => {}
            Err(rollback_err) => {
                // Orphaned group row: nobody can administer it.
                error!(
                    "FATAL inconsistency: group {} rollback failed after membership error: {:#}",
                    group_id, rollback_err
                );
            }
        }
        return Err(ApiError::GroupCreationFailed(e));
    }

    let group = db
        .get_group_by_id(&group_id)
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::Internal(anyhow!("group {} vanished after insert", group_id)))?;

    Ok(group)
}

/// Resolve a candidate token to a group and ensure the caller's membership.
/// Returns the join response plus whether a new membership row was created.
fn join_candidate(
    db: &Database,
    candidate: &str,
    user_id: &str,
) -> Result<(JoinGroupResponse, bool), ApiError> {
    // Cheap unambiguous path first (primary key), then the secondary index.
    let group = match db.get_group_by_id(candidate)? {
        Some(group) => group,
        None => db
            .get_group_by_invite_code(candidate)?
            .ok_or(ApiError::GroupNotFound)?,
    };

    ensure_membership(db, &group, user_id)
}

/// Idempotent join: an existing membership is returned unchanged, a
/// duplicate-key conflict on insert is treated as a concurrent join winning
/// the race and resolved by re-fetching the row.
fn ensure_membership(
    db: &Database,
    group: &GroupRow,
    user_id: &str,
) -> Result<(JoinGroupResponse, bool), ApiError> {
    if let Some(existing) = db.get_membership(&group.id, user_id)? {
        return Ok((join_response(group, &existing.role)?, false));
    }

    insert_member_tolerating_race(db, group, user_id)
}

/// The insert half of the check-then-insert pair. A concurrent join can land
/// between the membership check and this insert; the storage constraint
/// arbitrates and the loser re-fetches the winner's row.
fn insert_member_tolerating_race(
    db: &Database,
    group: &GroupRow,
    user_id: &str,
) -> Result<(JoinGroupResponse, bool), ApiError> {
    match db.insert_membership(&group.id, user_id, Role::Member.as_str()) {
        Ok(InsertOutcome::Inserted) => Ok((join_response(group, Role::Member.as_str())?, true)),
        Ok(InsertOutcome::Duplicate) => {
            let existing = db.get_membership(&group.id, user_id)?.ok_or_else(|| {
                ApiError::JoinFailed(anyhow!("membership vanished after duplicate insert"))
            })?;
            Ok((join_response(group, &existing.role)?, false))
        }
        Err(e) => Err(ApiError::JoinFailed(e)),
    }
}

fn join_response(group: &GroupRow, role: &str) -> Result<JoinGroupResponse, ApiError> {
    Ok(JoinGroupResponse {
        group_id: parse_group_id(&group.id)?,
        group_name: group.name.clone(),
        role: parse_role(role)?,
    })
}

fn validate_group_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("Group name is required".into()));
    }
    if name.chars().count() > 100 {
        return Err(ApiError::InvalidInput(
            "Group name must be 100 characters or less".into(),
        ));
    }
    Ok(name.to_string())
}

fn parse_group_id(id: &str) -> Result<Uuid, ApiError> {
    id.parse()
        .map_err(|e| ApiError::Internal(anyhow!("corrupt group id '{}': {}", id, e)))
}

fn parse_role(role: &str) -> Result<Role, ApiError> {
    Role::parse(role).ok_or_else(|| ApiError::Internal(anyhow!("corrupt role '{}'", role)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, nickname: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_profile(&id, nickname, "hash").unwrap();
        id
    }

    #[test]
    fn group_name_limit_counts_characters_not_bytes() {
        // 50 characters, 150 bytes
        assert!(validate_group_name(&"기도".repeat(25)).is_ok());
        assert!(validate_group_name(&"기".repeat(101)).is_err());
        assert!(validate_group_name("   ").is_err());
        assert_eq!(validate_group_name("  cell  ").unwrap(), "cell");
    }

    #[test]
    fn creator_becomes_leader() {
        let db = test_db();
        let uid = seed_user(&db, "ann");

        let group = create_group_record(&db, "cell", None, &uid).unwrap();

        let membership = db.get_membership(&group.id, &uid).unwrap().unwrap();
        assert_eq!(membership.role, "LEADER");
        assert!(!group.invite_code.is_empty());
    }

    #[test]
    fn invite_codes_are_distinct_across_groups() {
        let db = test_db();
        let uid = seed_user(&db, "ann");

        let a = create_group_record(&db, "one", None, &uid).unwrap();
        let b = create_group_record(&db, "two", None, &uid).unwrap();
        assert_ne!(a.invite_code, b.invite_code);
    }

    #[test]
    fn failed_leader_insert_rolls_the_group_back() {
        let db = test_db();

        // Unknown creator trips the FK on group_members, forcing the
        // compensating delete.
        let err = create_group_record(&db, "cell", None, "ghost").unwrap_err();
        assert!(matches!(err, ApiError::GroupCreationFailed(_)));

        let left = db
            .with_conn(|conn| {
                let n: i64 =
                    conn.query_row("SELECT COUNT(*) FROM groups", [], |row| row.get(0))?;
                Ok(n)
            })
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn join_by_group_id() {
        let db = test_db();
        let leader = seed_user(&db, "ann");
        let joiner = seed_user(&db, "bob");
        let group = create_group_record(&db, "cell", None, &leader).unwrap();

        let (resp, created) = join_candidate(&db, &group.id, &joiner).unwrap();
        assert!(created);
        assert_eq!(resp.role, Role::Member);
        assert_eq!(resp.group_name, "cell");
    }

    #[test]
    fn join_falls_back_to_invite_code() {
        let db = test_db();
        let leader = seed_user(&db, "ann");
        let joiner = seed_user(&db, "bob");
        let group = create_group_record(&db, "cell", None, &leader).unwrap();

        let (resp, created) = join_candidate(&db, &group.invite_code, &joiner).unwrap();
        assert!(created);
        assert_eq!(resp.group_id.to_string(), group.id);
    }

    #[test]
    fn join_is_idempotent_and_preserves_role() {
        let db = test_db();
        let leader = seed_user(&db, "ann");
        let group = create_group_record(&db, "cell", None, &leader).unwrap();

        // The leader "joining" their own group must not demote them.
        let (first, created) = join_candidate(&db, &group.id, &leader).unwrap();
        assert!(!created);
        assert_eq!(first.role, Role::Leader);

        let (second, created) = join_candidate(&db, &group.id, &leader).unwrap();
        assert!(!created);
        assert_eq!(second.role, Role::Leader);

        let membership = db.get_membership(&group.id, &leader).unwrap().unwrap();
        assert_eq!(membership.role, "LEADER");
    }

    #[test]
    fn unknown_candidate_is_group_not_found() {
        let db = test_db();
        let uid = seed_user(&db, "ann");

        let err = join_candidate(&db, "nonexistent-code", &uid).unwrap_err();
        assert!(matches!(err, ApiError::GroupNotFound));
    }

    #[test]
    fn duplicate_insert_race_resolves_to_existing_membership() {
        let db = test_db();
        let leader = seed_user(&db, "ann");
        let joiner = seed_user(&db, "bob");
        let group = create_group_record(&db, "cell", None, &leader).unwrap();

        // Simulate the race: another request inserted after our existence
        // check missed. The insert hits the primary-key constraint and must
        // resolve to the existing row instead of failing.
        db.insert_membership(&group.id, &joiner, "MEMBER").unwrap();
        let (resp, created) = insert_member_tolerating_race(&db, &group, &joiner).unwrap();
        assert!(!created);
        assert_eq!(resp.role, Role::Member);
    }
}
