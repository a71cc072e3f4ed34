use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "read_interaction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Viewed,
    Clicked,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
}

/// One read receipt per `(announcement, user)` pair, enforced by a unique
/// index. Revisits update the same row and accumulate `time_spent_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AnnouncementRead {
    pub id: Uuid,
    pub announcement_id: Uuid,
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
    pub interaction: Interaction,
    pub time_spent_secs: i64,
    #[sqlx(json(nullable))]
    pub device: Option<DeviceInfo>,
    pub created_at: DateTime<Utc>,
}

impl AnnouncementRead {
    pub fn new(
        announcement_id: Uuid,
        user_id: Uuid,
        interaction: Interaction,
        time_spent_secs: i64,
        device: Option<DeviceInfo>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            announcement_id,
            user_id,
            read_at: now,
            interaction,
            time_spent_secs,
            device,
            created_at: now,
        }
    }
}

/// Aggregated ledger statistics for a single announcement.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ReadStats {
    pub total_reads: i64,
    pub avg_time_spent: f64,
    pub viewed: i64,
    pub clicked: i64,
    pub dismissed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_read_record() {
        let announcement_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let record =
            AnnouncementRead::new(announcement_id, user_id, Interaction::Viewed, 30, None);

        assert_eq!(record.announcement_id, announcement_id);
        assert_eq!(record.user_id, user_id);
        assert_eq!(record.interaction, Interaction::Viewed);
        assert_eq!(record.time_spent_secs, 30);
        assert!(record.device.is_none());
    }
}
