//! Virtual pet activities: cooldown-gated tasks and places, a small shop,
//! and the luck-weighted walk.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    COUNTER_COINS, COUNTER_HAPPINESS, COUNTER_HUNGER, COUNTER_LUCK, COUNTER_PET_LOST,
    COUNTER_WALK_ENDS_AT, COUNTER_XP, PET_DECAY_PER_TICK, PET_FEED_XP, PET_MAX_STAT,
    PET_PLACE_HAPPINESS, PET_PLAY_XP, PET_STARTING_COINS, PET_STARTING_LUCK, PET_STARTING_STAT,
    PET_TASK_STAT_DRAIN, PET_TASK_XP, PET_WALK_DURATION_MS, PET_WALK_HAPPINESS,
    PET_WALK_MIN_LUCK, PET_WALK_PAYOUT_MIN, PET_WALK_PAYOUT_SPAN, PET_WALK_XP,
};
use crate::cooldown::CooldownActive;
use crate::ledger::{LedgerError, LedgerStorage, ProgressLedger};
use crate::numbers::{clamp_unit, floor_f64_to_usize, i64_to_f64};
use crate::resolver::{InvalidConfiguration, ResolutionTrace, WeightedTable};

#[derive(Debug, Error)]
pub enum ActivityError {
    #[error(transparent)]
    Cooldown(#[from] CooldownActive),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Config(#[from] InvalidConfiguration),
    #[error("the pet is out on a walk")]
    Walking,
    #[error("the pet is not on a walk")]
    NotWalking,
    #[error("walk still in progress for {remaining_ms} ms")]
    WalkInProgress { remaining_ms: u64 },
    #[error("luck {luck} is below the {required} needed for a walk")]
    NotEnoughLuck { luck: i64, required: i64 },
    #[error("the pet did not come back from its walk")]
    PetLost,
    #[error("{stat} is already full")]
    StatFull { stat: &'static str },
}

/// Jobs that pay coins and tire the pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetTask {
    Shear,
    Graze,
    PetShow,
    Dance,
    Sing,
    Model,
}

impl PetTask {
    pub const ALL: [Self; 6] = [
        Self::Shear,
        Self::Graze,
        Self::PetShow,
        Self::Dance,
        Self::Sing,
        Self::Model,
    ];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Shear => "shear",
            Self::Graze => "graze",
            Self::PetShow => "pet_show",
            Self::Dance => "dance",
            Self::Sing => "sing",
            Self::Model => "model",
        }
    }

    #[must_use]
    pub const fn reward(self) -> i64 {
        match self {
            Self::Shear => 40,
            Self::Graze => 15,
            Self::PetShow => 120,
            Self::Dance => 30,
            Self::Sing => 25,
            Self::Model => 80,
        }
    }

    #[must_use]
    pub const fn cooldown_ms(self) -> u64 {
        match self {
            Self::Shear => 8_000,
            Self::Graze => 4_000,
            Self::PetShow => 45_000,
            Self::Dance => 6_000,
            Self::Sing => 5_000,
            Self::Model => 20_000,
        }
    }
}

/// Places that trade coins for luck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetPlace {
    Cafe,
    Spa,
    Park,
    Temple,
    Casino,
    Cinema,
}

impl PetPlace {
    pub const ALL: [Self; 6] = [
        Self::Cafe,
        Self::Spa,
        Self::Park,
        Self::Temple,
        Self::Casino,
        Self::Cinema,
    ];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Cafe => "cafe",
            Self::Spa => "spa",
            Self::Park => "park",
            Self::Temple => "temple",
            Self::Casino => "casino",
            Self::Cinema => "cinema",
        }
    }

    #[must_use]
    pub const fn luck_bonus(self) -> i64 {
        match self {
            Self::Cafe => 10,
            Self::Spa => 20,
            Self::Park => 15,
            Self::Temple => 35,
            Self::Casino => 50,
            Self::Cinema => 12,
        }
    }

    #[must_use]
    pub const fn cost(self) -> i64 {
        match self {
            Self::Cafe => 25,
            Self::Spa => 70,
            Self::Park => 40,
            Self::Temple => 120,
            Self::Casino => 200,
            Self::Cinema => 35,
        }
    }

    #[must_use]
    pub const fn cooldown_ms(self) -> u64 {
        match self {
            Self::Cafe => 25_000,
            Self::Spa => 50_000,
            Self::Park => 35_000,
            Self::Temple => 90_000,
            Self::Casino => 120_000,
            Self::Cinema => 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Food,
    Toy,
}

/// Shop entry; food restores hunger, toys restore happiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShopItem {
    pub id: &'static str,
    pub kind: ItemKind,
    pub price: i64,
    pub value: i64,
}

const fn item(id: &'static str, kind: ItemKind, price: i64, value: i64) -> ShopItem {
    ShopItem {
        id,
        kind,
        price,
        value,
    }
}

pub const SHOP: [ShopItem; 10] = [
    item("apple", ItemKind::Food, 10, 15),
    item("carrot", ItemKind::Food, 8, 10),
    item("cookie", ItemKind::Food, 15, 20),
    item("cake", ItemKind::Food, 30, 40),
    item("pizza", ItemKind::Food, 50, 60),
    item("sushi", ItemKind::Food, 80, 80),
    item("ball", ItemKind::Toy, 40, 25),
    item("teddy", ItemKind::Toy, 60, 35),
    item("kite", ItemKind::Toy, 80, 45),
    item("gamepad", ItemKind::Toy, 120, 60),
];

#[must_use]
pub fn shop_item(id: &str) -> Option<&'static ShopItem> {
    SHOP.iter().find(|item| item.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetMood {
    Lost,
    Walking,
    Sick,
    Sad,
    Hungry,
    Happy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkEnd {
    Returned,
    Lost,
}

/// Result of a finished walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkReport {
    pub returned: bool,
    pub coins_earned: i64,
    pub trace: ResolutionTrace,
}

/// Snapshot of the pet's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PetStats {
    pub coins: i64,
    pub xp: i64,
    pub luck: i64,
    pub hunger: i64,
    pub happiness: i64,
}

impl PetStats {
    #[must_use]
    pub const fn level(&self) -> i64 {
        self.xp / 100 + 1
    }
}

/// A virtual pet whose progress lives in a ledger.
#[derive(Debug)]
pub struct Pet<S: LedgerStorage> {
    ledger: ProgressLedger<S>,
}

impl<S: LedgerStorage> Pet<S> {
    /// Wrap `ledger`, seeding starting stats on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the starting stats cannot be persisted.
    pub fn new(ledger: ProgressLedger<S>) -> Result<Self, ActivityError> {
        let mut pet = Self { ledger };
        pet.seed_starting_stats()?;
        Ok(pet)
    }

    fn seed_starting_stats(&mut self) -> Result<(), ActivityError> {
        self.batch(|ledger| {
            ledger.ensure(COUNTER_COINS, PET_STARTING_COINS)?;
            ledger.ensure(COUNTER_LUCK, PET_STARTING_LUCK)?;
            ledger.ensure(COUNTER_HUNGER, PET_STARTING_STAT)?;
            ledger.ensure(COUNTER_HAPPINESS, PET_STARTING_STAT)?;
            Ok(())
        })
    }

    #[must_use]
    pub const fn ledger(&self) -> &ProgressLedger<S> {
        &self.ledger
    }

    #[must_use]
    pub fn stats(&self) -> PetStats {
        PetStats {
            coins: self.ledger.get(COUNTER_COINS),
            xp: self.ledger.get(COUNTER_XP),
            luck: self.ledger.get(COUNTER_LUCK),
            hunger: self.ledger.get(COUNTER_HUNGER),
            happiness: self.ledger.get(COUNTER_HAPPINESS),
        }
    }

    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.ledger.get(COUNTER_PET_LOST) != 0
    }

    /// Epoch milliseconds when the current walk ends.
    #[must_use]
    pub fn walk_ends_at(&self) -> Option<u64> {
        u64::try_from(self.ledger.get(COUNTER_WALK_ENDS_AT))
            .ok()
            .filter(|&at| at > 0)
    }

    #[must_use]
    pub fn mood(&self) -> PetMood {
        let stats = self.stats();
        if self.is_lost() {
            PetMood::Lost
        } else if self.walk_ends_at().is_some() {
            PetMood::Walking
        } else if stats.hunger < 20 {
            PetMood::Sick
        } else if stats.happiness < 30 {
            PetMood::Sad
        } else if stats.hunger < 50 {
            PetMood::Hungry
        } else {
            PetMood::Happy
        }
    }

    fn ensure_home(&self) -> Result<(), ActivityError> {
        if self.is_lost() {
            return Err(ActivityError::PetLost);
        }
        if self.walk_ends_at().is_some() {
            return Err(ActivityError::Walking);
        }
        Ok(())
    }

    /// Run `task`, returning the new coin balance.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::Cooldown`] while the task is cooling down.
    pub fn perform_task(&mut self, task: PetTask, now_ms: u64) -> Result<i64, ActivityError> {
        self.ensure_home()?;
        let key = format!("task:{}", task.id());
        let mut gate = self.ledger.cooldowns();
        gate.try_activate(&key, task.cooldown_ms(), now_ms)?;
        self.batch(|ledger| {
            let coins = ledger.add(COUNTER_COINS, task.reward())?;
            ledger.add(COUNTER_XP, PET_TASK_XP)?;
            ledger.add_clamped(COUNTER_HUNGER, -PET_TASK_STAT_DRAIN, 0, PET_MAX_STAT)?;
            ledger.add_clamped(COUNTER_HAPPINESS, -PET_TASK_STAT_DRAIN, 0, PET_MAX_STAT)?;
            ledger.store_cooldowns(&gate)?;
            Ok(coins)
        })
    }

    /// Visit `place`, returning the new luck.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::Cooldown`] while cooling down and a ledger
    /// error when the visit cannot be paid for.
    pub fn visit_place(&mut self, place: PetPlace, now_ms: u64) -> Result<i64, ActivityError> {
        self.ensure_home()?;
        let key = format!("place:{}", place.id());
        let mut gate = self.ledger.cooldowns();
        gate.check(&key, now_ms)?;
        self.batch(|ledger| {
            ledger.spend(COUNTER_COINS, place.cost())?;
            let luck = ledger.add_clamped(COUNTER_LUCK, place.luck_bonus(), 0, PET_MAX_STAT)?;
            ledger.add_clamped(COUNTER_HAPPINESS, PET_PLACE_HAPPINESS, 0, PET_MAX_STAT)?;
            gate.activate(&key, place.cooldown_ms(), now_ms);
            ledger.store_cooldowns(&gate)?;
            Ok(luck)
        })
    }

    /// Buy one unit of `item` into the inventory.
    ///
    /// # Errors
    ///
    /// Returns a ledger error when the pet cannot afford it.
    pub fn buy_item(&mut self, item: &ShopItem) -> Result<u32, ActivityError> {
        self.batch(|ledger| {
            ledger.spend(COUNTER_COINS, item.price)?;
            Ok(ledger.grant(item.id, 1)?)
        })
    }

    /// Feed a food or hand over a toy from the inventory.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::StatFull`] when the stat the item restores is
    /// already at its cap, and a ledger error when none is held.
    pub fn use_item(&mut self, item: &ShopItem) -> Result<i64, ActivityError> {
        self.ensure_home()?;
        let (stat, xp) = match item.kind {
            ItemKind::Food => (COUNTER_HUNGER, PET_FEED_XP),
            ItemKind::Toy => (COUNTER_HAPPINESS, PET_PLAY_XP),
        };
        if self.ledger.get(stat) >= PET_MAX_STAT {
            return Err(ActivityError::StatFull { stat });
        }
        self.batch(|ledger| {
            ledger.consume(item.id, 1)?;
            ledger.add(COUNTER_XP, xp)?;
            Ok(ledger.add_clamped(stat, item.value, 0, PET_MAX_STAT)?)
        })
    }

    /// Apply `ticks` rounds of hunger and happiness decay.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn decay(&mut self, ticks: u32) -> Result<(), ActivityError> {
        if ticks == 0 || self.is_lost() || self.walk_ends_at().is_some() {
            return Ok(());
        }
        let drain = PET_DECAY_PER_TICK.saturating_mul(i64::from(ticks));
        self.batch(|ledger| {
            ledger.add_clamped(COUNTER_HUNGER, -drain, 0, PET_MAX_STAT)?;
            ledger.add_clamped(COUNTER_HAPPINESS, -drain, 0, PET_MAX_STAT)?;
            Ok(())
        })
    }

    /// Send the pet on a walk, returning when it ends.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::NotEnoughLuck`] below the minimum luck.
    pub fn start_walk(&mut self, now_ms: u64) -> Result<u64, ActivityError> {
        self.ensure_home()?;
        let luck = self.ledger.get(COUNTER_LUCK);
        if luck < PET_WALK_MIN_LUCK {
            return Err(ActivityError::NotEnoughLuck {
                luck,
                required: PET_WALK_MIN_LUCK,
            });
        }
        let ends_at = now_ms.saturating_add(PET_WALK_DURATION_MS);
        self.ledger.set(
            COUNTER_WALK_ENDS_AT,
            i64::try_from(ends_at).unwrap_or(i64::MAX),
        )?;
        Ok(ends_at)
    }

    /// Settle a finished walk: the pet returns with weight `luck` and is lost
    /// with weight `100 - luck`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::WalkInProgress`] before the walk ends.
    pub fn resolve_walk<R: Rng + ?Sized>(
        &mut self,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<WalkReport, ActivityError> {
        let ends_at = self.walk_ends_at().ok_or(ActivityError::NotWalking)?;
        if now_ms < ends_at {
            return Err(ActivityError::WalkInProgress {
                remaining_ms: ends_at - now_ms,
            });
        }
        let luck = self.ledger.get(COUNTER_LUCK).clamp(0, PET_MAX_STAT);
        let table = WeightedTable::from_triples(
            "pet-walk",
            [
                ("returned", i64_to_f64(luck), WalkEnd::Returned),
                ("lost", i64_to_f64(PET_MAX_STAT - luck), WalkEnd::Lost),
            ],
        )?;
        let (outcome, trace) = table.resolve_with_trace(rng);
        let returned = outcome.payload == WalkEnd::Returned;
        let coins_earned = if returned {
            let unit = clamp_unit(rng.r#gen::<f64>());
            let bonus = floor_f64_to_usize(unit * i64_to_f64(PET_WALK_PAYOUT_SPAN));
            PET_WALK_PAYOUT_MIN + i64::try_from(bonus).unwrap_or(0)
        } else {
            0
        };
        self.batch(|ledger| {
            ledger.set(COUNTER_WALK_ENDS_AT, 0)?;
            if returned {
                ledger.add(COUNTER_COINS, coins_earned)?;
                ledger.add_clamped(COUNTER_HAPPINESS, PET_WALK_HAPPINESS, 0, PET_MAX_STAT)?;
                ledger.add(COUNTER_XP, PET_WALK_XP)?;
            } else {
                ledger.set(COUNTER_PET_LOST, 1)?;
            }
            Ok(())
        })?;
        Ok(WalkReport {
            returned,
            coins_earned,
            trace,
        })
    }

    /// Start over with a fresh pet.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be cleared or reseeded.
    pub fn reset(&mut self) -> Result<(), ActivityError> {
        self.ledger.reset()?;
        self.seed_starting_stats()
    }

    fn batch<T>(
        &mut self,
        f: impl FnOnce(&mut ProgressLedger<S>) -> Result<T, ActivityError>,
    ) -> Result<T, ActivityError> {
        self.ledger.transaction(f)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryStorage;
    use crate::rng::UnitDraws;

    fn pet() -> Pet<MemoryStorage> {
        Pet::new(ProgressLedger::open(MemoryStorage::new(), "sheep").unwrap()).unwrap()
    }

    #[test]
    fn tasks_pay_and_cool_down() {
        let mut pet = pet();
        assert_eq!(pet.perform_task(PetTask::Shear, 0).unwrap(), 140);
        let err = pet.perform_task(PetTask::Shear, 7_999).unwrap_err();
        assert!(matches!(err, ActivityError::Cooldown(CooldownActive { remaining_ms: 1, .. })));
        assert_eq!(pet.perform_task(PetTask::Graze, 100).unwrap(), 155);
        assert_eq!(pet.perform_task(PetTask::Shear, 8_000).unwrap(), 195);

        let stats = pet.stats();
        assert_eq!(stats.xp, 45);
        assert_eq!(stats.hunger, 65);
    }

    #[test]
    fn places_cap_luck_and_charge() {
        let mut pet = pet();
        pet.perform_task(PetTask::PetShow, 0).unwrap();
        assert_eq!(pet.visit_place(PetPlace::Casino, 0).unwrap(), 100);
        assert_eq!(pet.stats().coins, 20);
        assert!(pet.visit_place(PetPlace::Casino, 1_000).is_err());

        let err = pet.visit_place(PetPlace::Spa, 0).unwrap_err();
        assert!(matches!(
            err,
            ActivityError::Ledger(LedgerError::InsufficientFunds { .. })
        ));
        assert!(!pet.ledger().cooldowns().is_cooling("place:spa", 0));
    }

    #[test]
    fn walk_requires_luck_and_time() {
        let mut pet = pet();
        pet.ledger.set(COUNTER_LUCK, 10).unwrap();
        assert!(matches!(
            pet.start_walk(0),
            Err(ActivityError::NotEnoughLuck { luck: 10, required: 20 })
        ));
        pet.ledger.set(COUNTER_LUCK, 60).unwrap();
        let ends_at = pet.start_walk(1_000).unwrap();
        assert_eq!(pet.mood(), PetMood::Walking);
        assert!(matches!(pet.start_walk(2_000), Err(ActivityError::Walking)));
        let mut rng = UnitDraws::new([0.1]);
        assert!(matches!(
            pet.resolve_walk(ends_at - 1, &mut rng),
            Err(ActivityError::WalkInProgress { remaining_ms: 1 })
        ));
    }

    #[test]
    fn walk_outcome_follows_luck_weights() {
        let mut pet = pet();
        let ends_at = pet.start_walk(0).unwrap();
        // luck 50: 0.49 returns; payout draw 0.5 pays 200 + 150.
        let report = pet
            .resolve_walk(ends_at, &mut UnitDraws::new([0.49, 0.5]))
            .unwrap();
        assert!(report.returned);
        assert_eq!(report.coins_earned, 350);
        assert_eq!(report.trace.chosen_label, "returned");
        assert_eq!(pet.stats().coins, 100 + report.coins_earned);
        assert!(pet.walk_ends_at().is_none());

        let ends_at = pet.start_walk(ends_at).unwrap();
        let report = pet
            .resolve_walk(ends_at, &mut UnitDraws::new([0.51]))
            .unwrap();
        assert!(!report.returned);
        assert!(pet.is_lost());
        assert!(matches!(
            pet.perform_task(PetTask::Sing, ends_at),
            Err(ActivityError::PetLost)
        ));
        pet.reset().unwrap();
        assert_eq!(pet.mood(), PetMood::Happy);
    }

    #[test]
    fn shop_items_restore_stats() {
        let mut pet = pet();
        let apple = shop_item("apple").unwrap();
        assert_eq!(pet.buy_item(apple).unwrap(), 1);
        assert_eq!(pet.use_item(apple).unwrap(), 95);
        assert!(pet.use_item(apple).is_err());

        pet.ledger.set(COUNTER_HAPPINESS, 100).unwrap();
        let ball = shop_item("ball").unwrap();
        pet.buy_item(ball).unwrap();
        assert!(matches!(
            pet.use_item(ball),
            Err(ActivityError::StatFull { stat: "happiness" })
        ));
    }

    #[test]
    fn decay_drains_until_sick() {
        let mut pet = pet();
        pet.decay(65).unwrap();
        assert_eq!(pet.stats().hunger, 15);
        assert_eq!(pet.mood(), PetMood::Sick);
        pet.decay(500).unwrap();
        assert_eq!(pet.stats().happiness, 0);
    }
}
