//! Centralized balance and tuning constants for PrizePlay reward logic.
//!
//! Odds, prices and cooldowns live here so that reward balance can only be
//! adjusted through reviewed code changes rather than ad hoc literals at the
//! point of use.

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_TARGET_RESOLVER: &str = "prizeplay::resolver";
pub(crate) const LOG_TARGET_LEDGER: &str = "prizeplay::ledger";
pub(crate) const LOG_TARGET_SESSION: &str = "prizeplay::session";
pub(crate) const LOG_TARGET_PROMOTIONS: &str = "prizeplay::promotions";
pub(crate) const LOG_TARGET_COFFEE: &str = "prizeplay::coffee";
pub(crate) const LOG_TARGET_PROGRESSION: &str = "prizeplay::progression";

// Labels -------------------------------------------------------------------
pub const LOSS_LABEL: &str = "loss";
pub const LOSS_TITLE: &str = "No luck";
pub const LOSS_DESCRIPTION: &str = "Try again next time";
pub const GENERIC_PRIZE_TITLE: &str = "Prize!";
pub const GENERIC_PRIZE_DESCRIPTION: &str = "You won!";

// Ledger counter keys ------------------------------------------------------
pub const COUNTER_COINS: &str = "coins";
pub const COUNTER_XP: &str = "xp";
pub const COUNTER_STREAK: &str = "streak";
pub const COUNTER_BEST_STREAK: &str = "best_streak";
pub const COUNTER_PLAYS: &str = "plays";
pub const COUNTER_WINS: &str = "wins";
pub const COUNTER_LOSSES: &str = "losses";
pub const COUNTER_LUCK: &str = "luck";
pub const COUNTER_HAPPINESS: &str = "happiness";
pub const COUNTER_HUNGER: &str = "hunger";
pub const COUNTER_WALK_ENDS_AT: &str = "walk_ends_at";
pub const COUNTER_PET_LOST: &str = "pet_lost";
pub const COUNTER_MONEY: &str = "money";
pub const COUNTER_REPUTATION: &str = "reputation";
pub const COUNTER_SERVED: &str = "served";
pub const COUNTER_STEP: &str = "step";

// Ledger persistence -------------------------------------------------------
pub const LEDGER_SCHEMA_VERSION: u32 = 1;
pub(crate) const LEDGER_CHECKSUM_SEED: u64 = 0x5052_495A_4550_4C59;

// Win odds normalized from the per-widget thresholds -----------------------
pub const WHEEL_WIN_ODDS: f64 = 0.7;
pub const SLOTS_WIN_ODDS: f64 = 0.3;
pub const DICE_WIN_ODDS: f64 = 0.7;
pub const PRIZE_DROP_WIN_ODDS: f64 = 0.5;

// Mystery box --------------------------------------------------------------
pub const MYSTERY_BOX_COST: i64 = 100;
pub const MYSTERY_BOX_STARTING_COINS: i64 = 500;
pub const MYSTERY_BOX_COMMON_POINTS: i64 = 100;

// Wheel tape ---------------------------------------------------------------
/// A loss slot is inserted after every this many prizes on the wheel tape.
pub const WHEEL_LOSS_STRIDE: usize = 2;

// Virtual pet --------------------------------------------------------------
pub const PET_MAX_STAT: i64 = 100;
pub const PET_STARTING_COINS: i64 = 100;
pub const PET_STARTING_LUCK: i64 = 50;
pub const PET_STARTING_STAT: i64 = 80;
pub const PET_TASK_XP: i64 = 15;
pub const PET_TASK_STAT_DRAIN: i64 = 5;
pub const PET_PLACE_HAPPINESS: i64 = 10;
pub const PET_WALK_MIN_LUCK: i64 = 20;
pub const PET_WALK_DURATION_MS: u64 = 2 * 60 * 60 * 1000;
pub const PET_WALK_PAYOUT_MIN: i64 = 200;
pub const PET_WALK_PAYOUT_SPAN: i64 = 300;
pub const PET_WALK_HAPPINESS: i64 = 50;
pub const PET_WALK_XP: i64 = 100;
pub const PET_FEED_XP: i64 = 5;
pub const PET_PLAY_XP: i64 = 10;
pub const PET_DECAY_PER_TICK: i64 = 1;

// Puzzle collector ---------------------------------------------------------
pub const PUZZLE_TOTAL_PIECES: u8 = 9;
pub const PUZZLE_PIECE_PRICE: i64 = 50;
pub const PUZZLE_STARTING_COINS: i64 = 100;
pub const PUZZLE_EARN_AMOUNT: i64 = 10;
pub const PUZZLE_EARN_THROTTLE_MS: u64 = 500;

// Coffee maker -------------------------------------------------------------
pub const COFFEE_STARTING_MONEY: i64 = 50;
pub const COFFEE_STARTING_REPUTATION: i64 = 50;
pub const COFFEE_MAX_REPUTATION: i64 = 100;
pub const COFFEE_SERVE_REPUTATION: i64 = 5;
pub const COFFEE_WRONG_RECIPE_PENALTY: i64 = 10;
pub const COFFEE_TIMEOUT_PENALTY: i64 = 15;
pub const COFFEE_TIP_PER_SECOND: i64 = 2;
pub const COFFEE_CUP_CAPACITY: usize = 5;
pub const COFFEE_SERVED_PER_LEVEL: i64 = 10;
/// Extra seconds of patience granted below this level.
pub const COFFEE_GRACE_LEVEL: i64 = 5;

// Unlock tracks -------------------------------------------------------------
pub const TREASURE_POINT_COINS: i64 = 100;
pub const QUEST_ACTIVATION_TAPS: u32 = 10;
pub const QUEST_MEDITATION_MS: u64 = 15_000;
pub const QUEST_REACTION_TAPS: u32 = 7;
