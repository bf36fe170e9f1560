//! Handicap outcome and payout calculation under the Burmese price convention.
//!
//! A line is quoted against the favorite ("upper") side in quarter-goal steps.
//! Prices are signed integers in `-100..=100`: a plus price pays
//! `stake * price / 100` profit on a full win, while a minus price pays even
//! money and instead reduces what a loss costs to `stake * |price| / 100`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Decimal places kept on every computed amount.
pub const AMOUNT_SCALE: u32 = 8;

/// Reasons the calculator refuses to price a wager. All of them leave the
/// wager pending.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OddsError {
    #[error("handicap line {0} is not a multiple of a quarter goal")]
    OffQuarterLine(Decimal),

    #[error("combined multiplier overflowed after {0} legs")]
    MultiplierOverflow(usize),

    #[error("payout for stake {0} overflowed")]
    PayoutOverflow(Decimal),

    #[error("price {0} is outside -100..=100")]
    PriceOutOfRange(i32),

    #[error("stake must be positive, got {0}")]
    NonPositiveStake(Decimal),

    #[error("unknown side {0:?}")]
    UnknownSide(String),
}

/// Home or away team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

impl FromStr for Side {
    type Err = OddsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            _ => Err(OddsError::UnknownSide(s.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final score of a finished match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    /// Goal difference seen from `side`
    pub fn difference_for(&self, side: Side) -> i64 {
        let diff = i64::from(self.home) - i64::from(self.away);
        match side {
            Side::Home => diff,
            Side::Away => -diff,
        }
    }
}

/// Handicap line in goals, always a multiple of 0.25
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct HandicapLine(Decimal);

impl HandicapLine {
    pub fn new(value: Decimal) -> Result<Self, OddsError> {
        if (value * dec!(4)).fract() != Decimal::ZERO {
            return Err(OddsError::OffQuarterLine(value));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for HandicapLine {
    type Error = OddsError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HandicapLine> for Decimal {
    fn from(line: HandicapLine) -> Self {
        line.0
    }
}

/// Signed Burmese price, e.g. `-80` or `+60`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct BurmesePrice(i32);

impl BurmesePrice {
    pub fn new(value: i32) -> Result<Self, OddsError> {
        if !(-100..=100).contains(&value) {
            return Err(OddsError::PriceOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn is_minus(&self) -> bool {
        self.0 < 0
    }

    /// `|price| / 100`
    fn fraction(&self) -> Decimal {
        Decimal::from(self.0.abs()) / dec!(100)
    }
}

impl TryFrom<i32> for BurmesePrice {
    type Error = OddsError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BurmesePrice> for i32 {
    fn from(price: BurmesePrice) -> Self {
        price.0
    }
}

/// Settled classification of a single selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    WinHalf,
    Draw,
    LoseHalf,
    Loss,
}

impl Outcome {
    /// Classify a margin (goal difference minus line) in quarter goals
    pub fn from_margin(margin: Decimal) -> Self {
        if margin >= dec!(0.5) {
            Outcome::Win
        } else if margin == dec!(0.25) {
            Outcome::WinHalf
        } else if margin == Decimal::ZERO {
            Outcome::Draw
        } else if margin == dec!(-0.25) {
            Outcome::LoseHalf
        } else {
            Outcome::Loss
        }
    }

    /// The same result seen from the other side of the line
    pub fn inverted(self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::WinHalf => Outcome::LoseHalf,
            Outcome::Draw => Outcome::Draw,
            Outcome::LoseHalf => Outcome::WinHalf,
            Outcome::Loss => Outcome::Win,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::WinHalf => "win_half",
            Outcome::Draw => "draw",
            Outcome::LoseHalf => "lose_half",
            Outcome::Loss => "loss",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terms fixed when a wager or leg was placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketTerms {
    /// Side the bettor backed
    pub pick: Side,
    /// Side the line is set against
    pub favorite: Side,
    pub line: Decimal,
    pub price: i32,
}

impl MarketTerms {
    pub fn is_favorite_pick(&self) -> bool {
        self.pick == self.favorite
    }

    pub fn handicap(&self) -> Result<HandicapLine, OddsError> {
        HandicapLine::new(self.line)
    }

    pub fn burmese_price(&self) -> Result<BurmesePrice, OddsError> {
        BurmesePrice::new(self.price)
    }
}

/// Outcome and amount credited back to the bettor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub payout: Decimal,
}

/// Classify a selection against a final score.
///
/// Both the line and the price are validated so that anything classified
/// here can also be paid out.
pub fn classify(score: Score, terms: &MarketTerms) -> Result<Outcome, OddsError> {
    let line = terms.handicap()?;
    terms.burmese_price()?;

    let margin = Decimal::from(score.difference_for(terms.favorite)) - line.value();
    let favorite_outcome = Outcome::from_margin(margin);

    Ok(if terms.is_favorite_pick() {
        favorite_outcome
    } else {
        favorite_outcome.inverted()
    })
}

/// Amount returned to the bettor for `outcome`. The stake was debited at
/// placement, so a result of `stake` is a refund and `0` a total loss.
pub fn payout(stake: Decimal, price: BurmesePrice, outcome: Outcome) -> Decimal {
    let amount = if price.is_minus() {
        let risk = stake * price.fraction();
        match outcome {
            Outcome::Win => stake + stake,
            Outcome::WinHalf => stake + stake / dec!(2),
            Outcome::Draw => stake,
            Outcome::LoseHalf => stake - risk / dec!(2),
            Outcome::Loss => stake - risk,
        }
    } else {
        let profit = stake * price.fraction();
        match outcome {
            Outcome::Win => stake + profit,
            Outcome::WinHalf => stake + profit / dec!(2),
            Outcome::Draw => stake,
            Outcome::LoseHalf => stake / dec!(2),
            Outcome::Loss => Decimal::ZERO,
        }
    };
    amount.round_dp(AMOUNT_SCALE)
}

/// Classify and price a single wager.
pub fn settle(score: Score, terms: &MarketTerms, stake: Decimal) -> Result<Verdict, OddsError> {
    if stake <= Decimal::ZERO {
        return Err(OddsError::NonPositiveStake(stake));
    }
    let outcome = classify(score, terms)?;
    let price = terms.burmese_price()?;
    Ok(Verdict {
        outcome,
        payout: payout(stake, price, outcome),
    })
}

/// Factor a combination leg contributes to its ticket.
///
/// Winning legs use the single-wager payout ratio for their own price; a
/// half loss halves the ticket and a full loss zeroes it.
pub fn leg_multiplier(price: BurmesePrice, outcome: Outcome) -> Decimal {
    match outcome {
        Outcome::Win | Outcome::WinHalf => payout(Decimal::ONE, price, outcome),
        Outcome::Draw => Decimal::ONE,
        Outcome::LoseHalf => dec!(0.5),
        Outcome::Loss => Decimal::ZERO,
    }
}
