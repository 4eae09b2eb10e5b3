pub mod account;
pub mod audit;
pub mod group;
pub mod level;
pub mod rating;
pub mod redemption;
pub mod reward;
pub mod thanks;
pub mod transaction;
