use praygram_types::api::{AuthorInfo, PrayerResponse};

use crate::store::{OfflinePrayer, OfflineStore};

/// Placeholder author id for entries that only exist locally.
const OFFLINE_AUTHOR_ID: &str = "offline_user";
const OFFLINE_AUTHOR_NICKNAME: &str = "Me (offline)";

/// Union of the server-returned list and this group's unsynced local prayers,
/// newest first. Offline entries carry `is_offline: true` and a placeholder
/// author; otherwise they are indistinguishable from server rows, so the UI
/// renders one list. Read-only: safe to call on every render.
pub fn merge_offline_data(
    store: &OfflineStore,
    online: &[PrayerResponse],
    group_id: &str,
) -> Vec<PrayerResponse> {
    merge_lists(online, store.offline_prayers_for_group(group_id))
}

/// The pure core: merge given explicit inputs.
pub fn merge_lists(online: &[PrayerResponse], offline: Vec<OfflinePrayer>) -> Vec<PrayerResponse> {
    let mut merged: Vec<PrayerResponse> = online.to_vec();
    merged.extend(
        offline
            .into_iter()
            .filter(|p| !p.synced)
            .map(project_offline),
    );

    // Newest first; stable so equal timestamps keep their relative order.
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

fn project_offline(prayer: OfflinePrayer) -> PrayerResponse {
    let captured_at = chrono::DateTime::from_timestamp_millis(prayer.timestamp)
        .unwrap_or_else(chrono::Utc::now);

    PrayerResponse {
        id: prayer.id,
        title: prayer.draft.title,
        content: prayer.draft.content,
        group_id: prayer.draft.group_id,
        author_id: OFFLINE_AUTHOR_ID.to_string(),
        is_private: prayer.draft.is_private.unwrap_or(false),
        created_at: captured_at,
        updated_at: captured_at,
        author: Some(AuthorInfo {
            nickname: OFFLINE_AUTHOR_NICKNAME.to_string(),
        }),
        reactions: vec![],
        reaction_count: 0,
        is_offline: true,
    }
}
