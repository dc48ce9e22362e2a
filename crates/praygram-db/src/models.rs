//! Database row types mapping directly to SQLite rows. Distinct from the
//! praygram-types API models to keep the DB layer independent.

pub struct ProfileRow {
    pub id: String,
    pub nickname: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub invite_code: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct MembershipRow {
    pub group_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

pub struct PrayerRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub group_id: String,
    pub author_id: String,
    pub author_nickname: String,
    pub is_private: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ReactionRow {
    pub id: String,
    pub prayer_id: String,
    pub user_id: String,
    pub kind: String,
    pub created_at: String,
}
