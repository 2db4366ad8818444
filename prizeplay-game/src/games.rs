//! Reward tables for each instant-win game.
//!
//! Every game resolves through a single normalized [`WeightedTable`]; the
//! per-widget "win or lose, then pick a prize" thresholds collapse into one
//! distribution where the win share is split evenly over the prizes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DICE_WIN_ODDS, GENERIC_PRIZE_DESCRIPTION, GENERIC_PRIZE_TITLE, LOSS_LABEL,
    MYSTERY_BOX_COMMON_POINTS, MYSTERY_BOX_COST, MYSTERY_BOX_STARTING_COINS, PRIZE_DROP_WIN_ODDS,
    SLOTS_WIN_ODDS, WHEEL_WIN_ODDS,
};
use crate::numbers::usize_to_f64;
use crate::promotions::Promotion;
use crate::resolver::{InvalidConfiguration, WeightedOutcome, WeightedTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameKind {
    Wheel,
    ScratchCard,
    Slots,
    Dice,
    PrizeDrop,
    MysteryBox,
}

impl GameKind {
    pub const ALL: [Self; 6] = [
        Self::Wheel,
        Self::ScratchCard,
        Self::Slots,
        Self::Dice,
        Self::PrizeDrop,
        Self::MysteryBox,
    ];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Wheel => "wheel",
            Self::ScratchCard => "scratch-card",
            Self::Slots => "slots",
            Self::Dice => "dice",
            Self::PrizeDrop => "prize-drop",
            Self::MysteryBox => "mystery-box",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Wheel => "Spin the wheel: 70% win split over the prize list",
            Self::ScratchCard => "Scratch card: six fixed prize tiers",
            Self::Slots => "Slots: 30% chance of three in a row",
            Self::Dice => "Dice: 70% chance of a winning face",
            Self::PrizeDrop => "Prize drop: 50/50 bucket",
            Self::MysteryBox => "Mystery box: 100 coins per box, four rarity tiers",
        }
    }

    /// Whether wins draw from the promotions list.
    #[must_use]
    pub const fn uses_promotions(self) -> bool {
        !matches!(self, Self::ScratchCard | Self::MysteryBox)
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game `{0}`")]
pub struct UnknownGame(pub String);

impl FromStr for GameKind {
    type Err = UnknownGame;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == needle)
            .ok_or_else(|| UnknownGame(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// What a play pays out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reward {
    /// A promotion from the catalog.
    Prize(Promotion),
    /// A fixed tier; `coins` are credited to the ledger.
    Tier {
        id: String,
        title: String,
        rarity: Rarity,
        #[serde(default)]
        coins: i64,
    },
    Loss,
}

impl Reward {
    #[must_use]
    pub const fn is_win(&self) -> bool {
        !matches!(self, Self::Loss)
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Prize(promotion) => &promotion.title,
            Self::Tier { title, .. } => title,
            Self::Loss => crate::constants::LOSS_TITLE,
        }
    }

    /// Inventory key recorded for a win.
    #[must_use]
    pub fn inventory_key(&self) -> Option<String> {
        match self {
            Self::Prize(promotion) => Some(format!("promotion-{}", promotion.id)),
            Self::Tier { id, .. } => Some(id.clone()),
            Self::Loss => None,
        }
    }

    #[must_use]
    pub const fn coins(&self) -> i64 {
        match self {
            Self::Tier { coins, .. } => *coins,
            _ => 0,
        }
    }
}

/// Per-game tunables, deserializable from JSON with defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameConfig {
    /// Overrides the win share for prize-list games.
    #[serde(default)]
    pub win_odds: Option<f64>,
    /// Coins charged per play.
    #[serde(default)]
    pub cost: i64,
    /// Coins granted the first time a ledger is opened for this game.
    #[serde(default)]
    pub starting_coins: i64,
    /// Milliseconds before the game can be played again.
    #[serde(default)]
    pub cooldown_ms: u64,
}

impl GameConfig {
    #[must_use]
    pub fn for_kind(kind: GameKind) -> Self {
        match kind {
            GameKind::MysteryBox => Self {
                cost: MYSTERY_BOX_COST,
                starting_coins: MYSTERY_BOX_STARTING_COINS,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    /// Parse a config from JSON, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

const fn default_win_odds(kind: GameKind) -> f64 {
    match kind {
        GameKind::Wheel => WHEEL_WIN_ODDS,
        GameKind::Slots => SLOTS_WIN_ODDS,
        GameKind::Dice => DICE_WIN_ODDS,
        GameKind::PrizeDrop => PRIZE_DROP_WIN_ODDS,
        GameKind::ScratchCard | GameKind::MysteryBox => 1.0,
    }
}

fn tier(id: &str, title: &str, rarity: Rarity, coins: i64, weight: f64) -> WeightedOutcome<Reward> {
    WeightedOutcome::new(
        id,
        weight,
        Reward::Tier {
            id: id.to_string(),
            title: title.to_string(),
            rarity,
            coins,
        },
    )
}

fn scratch_card_outcomes() -> Vec<WeightedOutcome<Reward>> {
    vec![
        tier("discount-10", "10% off", Rarity::Common, 0, 0.30),
        tier("discount-20", "20% off", Rarity::Common, 0, 0.20),
        tier("free-delivery", "Free delivery", Rarity::Common, 0, 0.25),
        tier("gift", "Gift", Rarity::Rare, 0, 0.15),
        tier("coupon-500", "500 coupon", Rarity::Epic, 0, 0.08),
        tier("jackpot", "JACKPOT!", Rarity::Legendary, 0, 0.02),
    ]
}

fn mystery_box_outcomes() -> Vec<WeightedOutcome<Reward>> {
    vec![
        tier("flagship-phone", "Flagship phone", Rarity::Legendary, 0, 0.01),
        tier("discount-50", "50% off", Rarity::Epic, 0, 0.10),
        tier("free-coffee", "Free coffee", Rarity::Rare, 0, 0.30),
        tier(
            "points-100",
            "100 points",
            Rarity::Common,
            MYSTERY_BOX_COMMON_POINTS,
            0.59,
        ),
    ]
}

fn prize_list_outcomes(win_odds: f64, promotions: &[Promotion]) -> Vec<WeightedOutcome<Reward>> {
    let win_odds = win_odds.clamp(0.0, 1.0);
    let mut outcomes = Vec::with_capacity(promotions.len() + 1);
    if promotions.is_empty() {
        outcomes.push(WeightedOutcome::new(
            "prize",
            win_odds,
            Reward::Prize(Promotion::new(
                0,
                GENERIC_PRIZE_TITLE,
                GENERIC_PRIZE_DESCRIPTION,
            )),
        ));
    } else {
        let share = win_odds / usize_to_f64(promotions.len());
        outcomes.extend(promotions.iter().map(|promotion| {
            WeightedOutcome::new(
                format!("promotion-{}", promotion.id),
                share,
                Reward::Prize(promotion.clone()),
            )
        }));
    }
    outcomes.push(WeightedOutcome::new(LOSS_LABEL, 1.0 - win_odds, Reward::Loss));
    outcomes
}

/// Reward table for `kind`.
///
/// # Errors
///
/// Returns [`InvalidConfiguration`] if the configured odds produce an
/// unusable weight set (for example a NaN override).
pub fn reward_table(
    kind: GameKind,
    config: &GameConfig,
    promotions: &[Promotion],
) -> Result<WeightedTable<Reward>, InvalidConfiguration> {
    let outcomes = match kind {
        GameKind::ScratchCard => scratch_card_outcomes(),
        GameKind::MysteryBox => mystery_box_outcomes(),
        GameKind::Wheel | GameKind::Slots | GameKind::Dice | GameKind::PrizeDrop => {
            let odds = config.win_odds.unwrap_or_else(|| default_win_odds(kind));
            if !odds.is_finite() {
                return Err(InvalidConfiguration::NonFiniteWeight {
                    table: kind.id().to_string(),
                    label: String::from("win_odds"),
                });
            }
            prize_list_outcomes(odds, promotions)
        }
    };
    WeightedTable::new(kind.id(), outcomes)
}
