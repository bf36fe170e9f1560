//! Outcome calculator for handicap wagers.

pub mod burmese;

pub use burmese::{
    classify, leg_multiplier, payout, settle, BurmesePrice, HandicapLine, MarketTerms, OddsError,
    Outcome, Score, Side, Verdict, AMOUNT_SCALE,
};
