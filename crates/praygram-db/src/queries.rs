use crate::models::{GroupRow, MembershipRow, PrayerRow, ProfileRow, ReactionRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

/// Outcome of an insert guarded by a uniqueness constraint. A duplicate key is
/// a distinct, expected outcome rather than an error: concurrent joins and
/// repeated reactions race against the constraint by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

impl Database {
    // -- Profiles --

    pub fn create_profile(&self, id: &str, nickname: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, nickname, password) VALUES (?1, ?2, ?3)",
                (id, nickname, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_profile_by_nickname(&self, nickname: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "nickname", nickname))
    }

    pub fn get_profile_by_id(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "id", id))
    }

    // -- Groups --

    pub fn insert_group(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        invite_code: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO groups (id, name, description, invite_code) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, name, description, invite_code],
            )?;
            Ok(())
        })
    }

    /// Compensating delete for a group whose leader membership could not be
    /// created. Returns the number of rows removed.
    pub fn delete_group(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM groups WHERE id = ?1", [id])?;
            Ok(n)
        })
    }

    pub fn get_group_by_id(&self, id: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| query_group(conn, "id", id))
    }

    pub fn get_group_by_invite_code(&self, code: &str) -> Result<Option<GroupRow>> {
        self.with_conn(|conn| query_group(conn, "invite_code", code))
    }

    /// Fetch a group only if the user is a member. Returns (group, role).
    pub fn get_group_for_member(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<(GroupRow, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name, g.description, g.invite_code, g.created_at, m.role
                 FROM groups g
                 JOIN group_members m ON m.group_id = g.id
                 WHERE g.id = ?1 AND m.user_id = ?2",
            )?;

            let row = stmt
                .query_row([group_id, user_id], |row| {
                    Ok((
                        GroupRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            invite_code: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                        row.get::<_, String>(5)?,
                    ))
                })
                .optional()?;

            Ok(row)
        })
    }

    /// All groups the user belongs to, with their role, newest first.
    pub fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<(GroupRow, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name, g.description, g.invite_code, g.created_at, m.role
                 FROM groups g
                 JOIN group_members m ON m.group_id = g.id
                 WHERE m.user_id = ?1
                 ORDER BY g.created_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok((
                        GroupRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            invite_code: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Memberships --

    pub fn get_membership(&self, group_id: &str, user_id: &str) -> Result<Option<MembershipRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id, user_id, role, created_at
                 FROM group_members
                 WHERE group_id = ?1 AND user_id = ?2",
            )?;

            let row = stmt
                .query_row([group_id, user_id], |row| {
                    Ok(MembershipRow {
                        group_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    /// Insert a membership, reporting a primary-key conflict as `Duplicate`
    /// instead of failing. Concurrent joins race between the existence check
    /// and this insert; the constraint is the arbiter.
    pub fn insert_membership(
        &self,
        group_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO group_members (group_id, user_id, role) VALUES (?1, ?2, ?3)",
                (group_id, user_id, role),
            ) {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    // -- Prayers --

    pub fn insert_prayer(
        &self,
        id: &str,
        title: &str,
        content: &str,
        group_id: &str,
        author_id: &str,
        is_private: bool,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO prayers (id, title, content, group_id, author_id, is_private)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, title, content, group_id, author_id, is_private],
            )?;
            Ok(())
        })
    }

    pub fn get_prayer(&self, id: &str) -> Result<Option<PrayerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE p.id = ?1", PRAYER_SELECT))?;

            let row = stmt.query_row([id], map_prayer_row).optional()?;
            Ok(row)
        })
    }

    /// Prayers for a group, newest first, with the author nickname joined in.
    pub fn get_prayers_for_group(&self, group_id: &str) -> Result<Vec<PrayerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE p.group_id = ?1 ORDER BY p.created_at DESC, p.id DESC",
                PRAYER_SELECT
            ))?;

            let rows = stmt
                .query_map([group_id], map_prayer_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Partial update; absent fields keep their current value. Bumps updated_at.
    pub fn update_prayer(
        &self,
        id: &str,
        title: Option<&str>,
        content: Option<&str>,
        is_private: Option<bool>,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE prayers SET
                     title = COALESCE(?2, title),
                     content = COALESCE(?3, content),
                     is_private = COALESCE(?4, is_private),
                     updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, title, content, is_private],
            )?;
            Ok(n)
        })
    }

    /// Reactions go with it via ON DELETE CASCADE.
    pub fn delete_prayer(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM prayers WHERE id = ?1", [id])?;
            Ok(n)
        })
    }

    // -- Reactions --

    /// Insert a reaction; `Duplicate` means this user already reacted with this
    /// type on this prayer (UNIQUE(prayer_id, user_id, type)).
    pub fn insert_reaction(
        &self,
        id: &str,
        prayer_id: &str,
        user_id: &str,
        kind: &str,
    ) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO reactions (id, prayer_id, user_id, type) VALUES (?1, ?2, ?3, ?4)",
                (id, prayer_id, user_id, kind),
            ) {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn delete_reaction(&self, prayer_id: &str, user_id: &str, kind: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM reactions WHERE prayer_id = ?1 AND user_id = ?2 AND type = ?3",
                (prayer_id, user_id, kind),
            )?;
            Ok(n)
        })
    }

    /// Batch-fetch reactions for a set of prayer IDs.
    pub fn get_reactions_for_prayers(&self, prayer_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if prayer_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=prayer_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, prayer_id, user_id, type, created_at FROM reactions WHERE prayer_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = prayer_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ReactionRow {
                        id: row.get(0)?,
                        prayer_id: row.get(1)?,
                        user_id: row.get(2)?,
                        kind: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

const PRAYER_SELECT: &str =
    "SELECT p.id, p.title, p.content, p.group_id, p.author_id, pr.nickname,
            p.is_private, p.created_at, p.updated_at
     FROM prayers p
     LEFT JOIN profiles pr ON p.author_id = pr.id";

fn map_prayer_row(row: &rusqlite::Row<'_>) -> std::result::Result<PrayerRow, rusqlite::Error> {
    Ok(PrayerRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        group_id: row.get(3)?,
        author_id: row.get(4)?,
        author_nickname: row
            .get::<_, Option<String>>(5)?
            .unwrap_or_else(|| "unknown".to_string()),
        is_private: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn query_profile(conn: &Connection, column: &str, value: &str) -> Result<Option<ProfileRow>> {
    // column is a compile-time constant at every call site
    let mut stmt = conn.prepare(&format!(
        "SELECT id, nickname, password, created_at FROM profiles WHERE {} = ?1",
        column
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                nickname: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_group(conn: &Connection, column: &str, value: &str) -> Result<Option<GroupRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, description, invite_code, created_at FROM groups WHERE {} = ?1",
        column
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(GroupRow {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                invite_code: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// UNIQUE or PRIMARY KEY conflict. CHECK and FOREIGN KEY violations share the
/// top-level constraint code, so match on the extended code.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
    const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, nickname: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_profile(&id, nickname, "hash").unwrap();
        id
    }

    fn seed_group(db: &Database, name: &str) -> (String, String) {
        let id = Uuid::new_v4().to_string();
        let code = Uuid::new_v4().to_string();
        db.insert_group(&id, name, None, &code).unwrap();
        (id, code)
    }

    #[test]
    fn group_lookup_by_id_and_invite_code() {
        let db = test_db();
        let (gid, code) = seed_group(&db, "cell");

        assert_eq!(db.get_group_by_id(&gid).unwrap().unwrap().name, "cell");
        assert_eq!(
            db.get_group_by_invite_code(&code).unwrap().unwrap().id,
            gid
        );
        assert!(db.get_group_by_id(&code).unwrap().is_none());
        assert!(db.get_group_by_invite_code("nope").unwrap().is_none());
    }

    #[test]
    fn duplicate_membership_insert_reports_duplicate() {
        let db = test_db();
        let uid = seed_user(&db, "ann");
        let (gid, _) = seed_group(&db, "cell");

        assert_eq!(
            db.insert_membership(&gid, &uid, "MEMBER").unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            db.insert_membership(&gid, &uid, "MEMBER").unwrap(),
            InsertOutcome::Duplicate
        );

        // still exactly one row, role unchanged
        let m = db.get_membership(&gid, &uid).unwrap().unwrap();
        assert_eq!(m.role, "MEMBER");
    }

    #[test]
    fn membership_insert_with_unknown_user_is_an_error_not_duplicate() {
        let db = test_db();
        let (gid, _) = seed_group(&db, "cell");

        // FK violation must not be mistaken for a benign duplicate
        assert!(db.insert_membership(&gid, "ghost", "MEMBER").is_err());
    }

    #[test]
    fn compensating_group_delete_removes_the_row() {
        let db = test_db();
        let (gid, _) = seed_group(&db, "cell");

        assert_eq!(db.delete_group(&gid).unwrap(), 1);
        assert!(db.get_group_by_id(&gid).unwrap().is_none());
    }

    #[test]
    fn prayers_come_back_newest_first_with_author_nickname() {
        let db = test_db();
        let uid = seed_user(&db, "ann");
        let (gid, _) = seed_group(&db, "cell");
        db.insert_membership(&gid, &uid, "LEADER").unwrap();

        db.with_conn_mut(|conn| {
            // distinct timestamps so ordering is deterministic
            conn.execute(
                "INSERT INTO prayers (id, title, content, group_id, author_id, created_at, updated_at)
                 VALUES ('p1', 'first', 'c', ?1, ?2, '2026-01-01 10:00:00', '2026-01-01 10:00:00')",
                [&gid, &uid],
            )?;
            conn.execute(
                "INSERT INTO prayers (id, title, content, group_id, author_id, created_at, updated_at)
                 VALUES ('p2', 'second', 'c', ?1, ?2, '2026-01-02 10:00:00', '2026-01-02 10:00:00')",
                [&gid, &uid],
            )?;
            Ok(())
        })
        .unwrap();

        let rows = db.get_prayers_for_group(&gid).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "second");
        assert_eq!(rows[1].title, "first");
        assert_eq!(rows[0].author_nickname, "ann");
    }

    #[test]
    fn update_prayer_keeps_absent_fields() {
        let db = test_db();
        let uid = seed_user(&db, "ann");
        let (gid, _) = seed_group(&db, "cell");
        db.insert_prayer("p1", "title", "content", &gid, &uid, false)
            .unwrap();

        assert_eq!(
            db.update_prayer("p1", Some("new title"), None, None).unwrap(),
            1
        );

        let p = db.get_prayer("p1").unwrap().unwrap();
        assert_eq!(p.title, "new title");
        assert_eq!(p.content, "content");
        assert!(!p.is_private);
    }

    #[test]
    fn duplicate_reaction_reports_duplicate_but_other_type_inserts() {
        let db = test_db();
        let uid = seed_user(&db, "ann");
        let (gid, _) = seed_group(&db, "cell");
        db.insert_prayer("p1", "t", "c", &gid, &uid, false).unwrap();

        assert_eq!(
            db.insert_reaction("r1", "p1", &uid, "pray").unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            db.insert_reaction("r2", "p1", &uid, "pray").unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(
            db.insert_reaction("r3", "p1", &uid, "amen").unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[test]
    fn deleting_a_prayer_cascades_its_reactions() {
        let db = test_db();
        let uid = seed_user(&db, "ann");
        let (gid, _) = seed_group(&db, "cell");
        db.insert_prayer("p1", "t", "c", &gid, &uid, false).unwrap();
        db.insert_reaction("r1", "p1", &uid, "pray").unwrap();

        assert_eq!(db.delete_prayer("p1").unwrap(), 1);
        let left = db
            .get_reactions_for_prayers(&["p1".to_string()])
            .unwrap();
        assert!(left.is_empty());
    }

    #[test]
    fn delete_reaction_is_scoped_to_prayer_user_type() {
        let db = test_db();
        let ann = seed_user(&db, "ann");
        let bob = seed_user(&db, "bob");
        let (gid, _) = seed_group(&db, "cell");
        db.insert_prayer("p1", "t", "c", &gid, &ann, false).unwrap();
        db.insert_reaction("r1", "p1", &ann, "pray").unwrap();
        db.insert_reaction("r2", "p1", &bob, "pray").unwrap();

        assert_eq!(db.delete_reaction("p1", &ann, "pray").unwrap(), 1);
        assert_eq!(db.delete_reaction("p1", &ann, "pray").unwrap(), 0);

        let left = db.get_reactions_for_prayers(&["p1".to_string()]).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].user_id, bob);
    }
}
