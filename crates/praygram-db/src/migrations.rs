use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS profiles (
            id          TEXT PRIMARY KEY,
            nickname    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS groups (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            description TEXT,
            invite_code TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS group_members (
            group_id    TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES profiles(id),
            role        TEXT NOT NULL CHECK (role IN ('LEADER', 'MEMBER')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (group_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS prayers (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            group_id    TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            author_id   TEXT NOT NULL REFERENCES profiles(id),
            is_private  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_prayers_group
            ON prayers(group_id, created_at);

        CREATE TABLE IF NOT EXISTS reactions (
            id          TEXT PRIMARY KEY,
            prayer_id   TEXT NOT NULL REFERENCES prayers(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES profiles(id),
            type        TEXT NOT NULL CHECK (type IN ('pray', 'amen')),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(prayer_id, user_id, type)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_prayer
            ON reactions(prayer_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
