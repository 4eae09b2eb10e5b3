use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RatingType {
    /// Running total; one current row per user.
    Overall,
    Monthly,
    Weekly,
    Daily,
}

impl RatingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingType::Overall => "OVERALL",
            RatingType::Monthly => "MONTHLY",
            RatingType::Weekly => "WEEKLY",
            RatingType::Daily => "DAILY",
        }
    }

    pub fn is_periodic(&self) -> bool {
        !matches!(self, RatingType::Overall)
    }

    /// UTC period containing `at`: `[start, end)`. `None` for running totals.
    pub fn period_containing(&self, at: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let day = at.date_naive();
        let (start, end) = match self {
            RatingType::Overall => return None,
            RatingType::Daily => (day, day + Duration::days(1)),
            RatingType::Weekly => {
                let start = day - Duration::days(day.weekday().num_days_from_monday() as i64);
                (start, start + Duration::days(7))
            }
            RatingType::Monthly => {
                let start = NaiveDate::from_ymd_opt(day.year(), day.month(), 1)?;
                let end = if day.month() == 12 {
                    NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)?
                };
                (start, end)
            }
        };
        Some((midnight(start), midnight(end)))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

impl std::fmt::Display for RatingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RatingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OVERALL" => Ok(RatingType::Overall),
            "MONTHLY" => Ok(RatingType::Monthly),
            "WEEKLY" => Ok(RatingType::Weekly),
            "DAILY" => Ok(RatingType::Daily),
            other => Err(format!("unknown rating type `{}`", other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RatingRow {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub rating_type: RatingType,
    pub score: Decimal,
    pub rank: u32,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub snapshot_at: DateTime<Utc>,
}

/// Competition ranking ("1224"): equal scores share a rank and the next rank skips.
///
/// Input is `(user_id, score)`; output is sorted by score descending, then user id.
pub fn rank_scores(mut scores: Vec<(String, Decimal)>) -> Vec<(String, Decimal, u32)> {
    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let mut ranked = Vec::with_capacity(scores.len());
    let mut previous: Option<(Decimal, u32)> = None;
    for (position, (user_id, score)) in scores.into_iter().enumerate() {
        let rank = match previous {
            Some((prev_score, prev_rank)) if prev_score == score => prev_rank,
            _ => position as u32 + 1,
        };
        previous = Some((score, rank));
        ranked.push((user_id, score, rank));
    }
    ranked
}
