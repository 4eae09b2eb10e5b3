use crate::config::{Config, LedgerSettings};
use crate::core::errors::UnavailableReason;
use crate::core::models::{
    group::DebtLimit,
    rating::{RatingType, rank_scores},
    reward::{NewReward, Reward},
    transaction::TransactionType,
};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

#[test]
fn test_transaction_type_codes() {
    assert_eq!(
        "redemption".parse::<TransactionType>().unwrap(),
        TransactionType::RewardPurchase
    );
    assert_eq!(
        "thank_you_received".parse::<TransactionType>().unwrap(),
        TransactionType::ThankYouReceived
    );
    assert!("bogus".parse::<TransactionType>().is_err());
    assert_eq!(
        serde_json::to_string(&TransactionType::ManualDebit).unwrap(),
        "\"MANUAL_DEBIT\""
    );
}

#[test]
fn test_debt_limit_permits() {
    assert!(DebtLimit::NoDebt.permits(dec!(0)));
    assert!(!DebtLimit::NoDebt.permits(dec!(-0.01)));
    assert!(DebtLimit::Limited(dec!(25)).permits(dec!(-25)));
    assert!(!DebtLimit::Limited(dec!(25)).permits(dec!(-25.01)));
    assert!(DebtLimit::Unlimited.permits(dec!(-1000000)));
    assert_eq!(DebtLimit::default(), DebtLimit::NoDebt);
}

#[test]
fn test_rating_periods_are_utc_calendar_units() {
    // Wednesday.
    let at = Utc.with_ymd_and_hms(2024, 5, 15, 17, 30, 0).unwrap();

    let (start, end) = RatingType::Daily.period_containing(at).unwrap();
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 16, 0, 0, 0).unwrap());

    let (start, end) = RatingType::Weekly.period_containing(at).unwrap();
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap());

    let december = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
    let (start, end) = RatingType::Monthly.period_containing(december).unwrap();
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
    assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

    assert_eq!(RatingType::Overall.period_containing(at), None);
    assert_eq!("weekly".parse::<RatingType>().unwrap(), RatingType::Weekly);
}

#[test]
fn test_rank_scores_competition_ranking() {
    let ranked = rank_scores(vec![
        ("d".to_string(), dec!(10)),
        ("b".to_string(), dec!(30)),
        ("c".to_string(), dec!(20)),
        ("a".to_string(), dec!(30)),
        ("e".to_string(), dec!(10)),
    ]);
    let ranks: Vec<_> = ranked.iter().map(|(user, _, rank)| (user.as_str(), *rank)).collect();
    assert_eq!(ranks, vec![("a", 1), ("b", 1), ("c", 3), ("d", 4), ("e", 4)]);
    assert!(rank_scores(Vec::new()).is_empty());
}

fn reward_from(new_reward: NewReward) -> Reward {
    let now = Utc::now();
    Reward {
        id: "rw".to_string(),
        group_id: new_reward.group_id,
        name: new_reward.name,
        description: new_reward.description,
        cost: new_reward.cost,
        stock: new_reward.stock,
        max_per_user: new_reward.max_per_user,
        is_recurring: new_reward.is_recurring,
        valid_from: new_reward.valid_from,
        valid_until: new_reward.valid_until,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_reward_caps_and_window() {
    let once = reward_from(NewReward::new("g1", "Badge", dec!(5)).with_max_per_user(4).once_per_user());
    assert_eq!(once.per_user_cap(), Some(1));
    let capped = reward_from(NewReward::new("g1", "Snack", dec!(5)).with_max_per_user(4));
    assert_eq!(capped.per_user_cap(), Some(4));
    let open = reward_from(NewReward::new("g1", "Sticker", dec!(1)));
    assert_eq!(open.per_user_cap(), None);

    let now = Utc::now();
    let windowed = reward_from(
        NewReward::new("g1", "Trip", dec!(50)).valid_between(Some(now), Some(now + Duration::days(1))),
    );
    assert_eq!(windowed.availability(now), Ok(()));
    assert_eq!(windowed.availability(now + Duration::days(1)), Ok(()));
    assert_eq!(
        windowed.availability(now - Duration::seconds(1)),
        Err(UnavailableReason::NotYetValid)
    );
    assert_eq!(
        windowed.availability(now + Duration::days(2)),
        Err(UnavailableReason::Expired)
    );
}

#[test]
fn test_ledger_settings_from_config() {
    let config = Config {
        log_level: "debug".to_string(),
        commit_max_attempts: 0,
        commit_backoff_ms: 25,
        leaderboard_cache_ttl_secs: 5,
        default_page_size: 0,
    };
    let settings = LedgerSettings::from(&config);
    assert_eq!(settings.commit_max_attempts, 1);
    assert_eq!(settings.commit_backoff, std::time::Duration::from_millis(25));
    assert_eq!(settings.leaderboard_cache_ttl, std::time::Duration::from_secs(5));
    assert_eq!(settings.default_page_size, 1);
}
