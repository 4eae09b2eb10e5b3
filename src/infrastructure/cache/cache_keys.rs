use crate::core::models::rating::RatingType;
use chrono::{DateTime, Utc};

pub fn user_level_key(user_id: &str, group_id: &str) -> String {
    format!("user_level:{}:{}", group_id, user_id)
}

pub fn leaderboard_key(group_id: &str, rating_type: RatingType, period_start: Option<DateTime<Utc>>) -> String {
    match period_start {
        Some(start) => format!("leaderboard:{}:{}:{}", group_id, rating_type, start.timestamp()),
        None => format!("leaderboard:{}:{}", group_id, rating_type),
    }
}

pub fn group_prefix(group_id: &str) -> [String; 2] {
    [format!("user_level:{}:", group_id), format!("leaderboard:{}:", group_id)]
}
