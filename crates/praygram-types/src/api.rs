use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the offline sync client.
/// Canonical definition lives here in praygram-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub nickname: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub nickname: String,
    pub token: String,
}

// -- Groups --
//
// The group endpoints speak camelCase while the prayer/reaction endpoints
// speak snake_case. That asymmetry is part of the published API surface and
// clients depend on it.

/// Membership role within a group. A user holds at most one role per group;
/// the creator becomes Leader, everyone who joins becomes Member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Leader,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Leader => "LEADER",
            Role::Member => "MEMBER",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "LEADER" => Some(Role::Leader),
            "MEMBER" => Some(Role::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "inviteCode")]
    pub invite_code: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One entry in the caller's group list, including their role in it.
#[derive(Debug, Serialize)]
pub struct GroupSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inviteCode")]
    pub invite_code: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    /// Group id, invite code, or a pasted `/join/{id}` link.
    #[serde(rename = "groupId")]
    pub group_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinByInviteRequest {
    #[serde(rename = "inviteCode")]
    pub invite_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinGroupResponse {
    #[serde(rename = "groupId")]
    pub group_id: Uuid,
    #[serde(rename = "groupName")]
    pub group_name: String,
    pub role: Role,
}

// -- Prayers --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrayerRequest {
    pub title: String,
    pub content: String,
    pub group_id: String,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrayerRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub nickname: String,
}

/// Prayer as returned by the API. Ids are strings rather than UUIDs because
/// the offline merge layer injects locally generated `offline_*` ids into the
/// same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrayerResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub group_id: String,
    pub author_id: String,
    pub is_private: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub author: Option<AuthorInfo>,
    pub reactions: Vec<ReactionEntry>,
    pub reaction_count: usize,
    /// Set only by the client-side merge layer for not-yet-synced prayers.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_offline: bool,
}

// -- Reactions --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Pray,
    Amen,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Pray => "pray",
            ReactionType::Amen => "amen",
        }
    }

    pub fn parse(s: &str) -> Option<ReactionType> {
        match s {
            "pray" => Some(ReactionType::Pray),
            "amen" => Some(ReactionType::Amen),
            _ => None,
        }
    }
}

fn default_reaction_type() -> ReactionType {
    ReactionType::Pray
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddReactionRequest {
    pub prayer_id: String,
    #[serde(rename = "type", default = "default_reaction_type")]
    pub kind: ReactionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ReactionType,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    pub id: String,
    pub prayer_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ReactionType,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub user: Option<AuthorInfo>,
}
