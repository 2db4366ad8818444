//! PrizePlay Game Engine
//!
//! Platform-agnostic reward logic for instant-win promo widgets: weighted
//! outcome resolution, cooldown gates, a durable progress ledger and the
//! play phase machine. No UI, timers or platform storage live here.

pub mod activities;
pub mod clock;
pub mod coffee;
pub mod collection;
pub mod constants;
pub mod cooldown;
pub mod games;
pub mod ledger;
pub mod numbers;
pub mod phase;
pub mod progression;
pub mod promotions;
pub mod resolver;
pub mod rng;
pub mod session;

use anyhow::Context;
use rand::Rng;

// Re-export commonly used types
pub use activities::{
    ActivityError, ItemKind, Pet, PetMood, PetPlace, PetStats, PetTask, SHOP, ShopItem,
    WalkReport, shop_item,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coffee::{
    CUSTOMERS, CoffeeError, CoffeeShop, CoffeeStats, Customer, Ingredient, Order, Patience,
    RECIPES, Recipe, ServeOutcome,
};
pub use collection::{CollectionError, PuzzleCollector, PuzzleProgress};
pub use cooldown::{CooldownActive, CooldownGate};
pub use games::{GameConfig, GameKind, Rarity, Reward, UnknownGame, reward_table};
pub use ledger::{
    LedgerError, LedgerSnapshot, LedgerState, LedgerStorage, MemoryStorage, ProgressLedger,
};
pub use phase::{PhaseError, PhaseMachine, PhaseTransition, PlayEvent, PlayPhase, next_phase};
pub use progression::{
    Goal, Milestone, MilestoneStatus, Progression, ProgressionError, QUEST, StepOutcome,
    TREASURE_MAP,
};
pub use promotions::{
    Promotion, PromotionSource, StaticPromotions, TapeSlot, default_promotions, load_or_default,
    mix_with_losses, pick_random_promotion,
};
pub use resolver::{
    InvalidConfiguration, ResolutionTrace, TraceCandidate, WeightedOutcome, WeightedTable,
    resolve_weighted,
};
pub use rng::{CountingRng, UnitDraws, derive_stream_seed, stream_rng};
pub use session::{PlayError, PlayReport, PlaySession, PlayStats};

/// Ledger key used for a game's progress.
#[must_use]
pub fn game_ledger_key(kind: GameKind) -> String {
    format!("prizeplay:{}", kind.id())
}

/// Entry point wiring a promotions source and ledger storage together.
pub struct PrizeEngine<P, S>
where
    P: PromotionSource,
    S: LedgerStorage,
{
    promotions: P,
    storage: S,
}

impl<P, S> PrizeEngine<P, S>
where
    P: PromotionSource,
    S: LedgerStorage,
{
    pub const fn new(promotions: P, storage: S) -> Self {
        Self {
            promotions,
            storage,
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Current promotions, or the built-in offers when the source fails.
    #[must_use]
    pub fn promotions(&self) -> Vec<Promotion> {
        load_or_default(&self.promotions)
    }

    /// Prize tape for the wheel, with loss slots mixed in.
    #[must_use]
    pub fn wheel_tape(&self) -> Vec<TapeSlot> {
        mix_with_losses(&self.promotions())
    }

    /// One promotion picked uniformly, `None` when the catalog is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the promotions source fails.
    pub fn random_promotion<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Option<Promotion>, anyhow::Error> {
        let list = self
            .promotions
            .load_promotions()
            .context("loading promotions")?;
        Ok(pick_random_promotion(&list, rng).cloned())
    }

    /// Open a play session for `kind`, replacing an unreadable ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or the game config is unusable.
    pub fn create_session(
        &self,
        kind: GameKind,
        config: GameConfig,
        seed: u64,
    ) -> Result<PlaySession<&S>, anyhow::Error> {
        let key = game_ledger_key(kind);
        let ledger = ProgressLedger::open_or_reset(&self.storage, key.as_str())
            .with_context(|| format!("opening ledger `{key}`"))?;
        let session = PlaySession::new(kind, config, &self.promotions(), ledger, seed)
            .with_context(|| format!("starting {kind} session"))?;
        Ok(session)
    }

    /// Open the virtual pet stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn open_pet(&self, key: &str) -> Result<Pet<&S>, anyhow::Error> {
        let ledger = ProgressLedger::open_or_reset(&self.storage, key)
            .with_context(|| format!("opening pet ledger `{key}`"))?;
        Ok(Pet::new(ledger)?)
    }

    /// Open the puzzle collection stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn open_puzzle(&self, key: &str) -> Result<PuzzleCollector<&S>, anyhow::Error> {
        let ledger = ProgressLedger::open_or_reset(&self.storage, key)
            .with_context(|| format!("opening puzzle ledger `{key}`"))?;
        Ok(PuzzleCollector::new(ledger)?)
    }

    /// Open the coffee shop stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn open_coffee_shop(&self, key: &str) -> Result<CoffeeShop<&S>, anyhow::Error> {
        let ledger = ProgressLedger::open_or_reset(&self.storage, key)
            .with_context(|| format!("opening coffee ledger `{key}`"))?;
        Ok(CoffeeShop::new(ledger)?)
    }

    /// Open the treasure map track stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn open_treasure_map(&self, key: &str) -> Result<Progression<&S>, anyhow::Error> {
        let ledger = ProgressLedger::open_or_reset(&self.storage, key)
            .with_context(|| format!("opening treasure map ledger `{key}`"))?;
        Ok(Progression::treasure_map(ledger))
    }

    /// Open the quest track stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn open_quest(&self, key: &str) -> Result<Progression<&S>, anyhow::Error> {
        let ledger = ProgressLedger::open_or_reset(&self.storage, key)
            .with_context(|| format!("opening quest ledger `{key}`"))?;
        Ok(Progression::quest(ledger))
    }

    /// Drop all progress for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    pub fn reset_game(&self, kind: GameKind) -> Result<(), anyhow::Error> {
        let key = game_ledger_key(kind);
        let mut ledger = ProgressLedger::open_or_reset(&self.storage, key.as_str())?;
        ledger.reset().with_context(|| format!("resetting `{key}`"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::convert::Infallible;

    #[derive(Debug, Default)]
    struct EmptyCatalog;

    impl PromotionSource for EmptyCatalog {
        type Error = Infallible;

        fn load_promotions(&self) -> Result<Vec<Promotion>, Self::Error> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn engine_sessions_share_storage() {
        let storage = MemoryStorage::new();
        let engine = PrizeEngine::new(StaticPromotions::default(), storage.clone());
        {
            let mut session = engine
                .create_session(GameKind::Slots, GameConfig::default(), 1)
                .unwrap();
            session.play(0).unwrap();
        }
        let session = engine
            .create_session(GameKind::Slots, GameConfig::default(), 2)
            .unwrap();
        assert_eq!(session.stats().plays, 1);
        assert!(storage.raw("prizeplay:slots").is_some());

        engine.reset_game(GameKind::Slots).unwrap();
        assert!(storage.raw("prizeplay:slots").is_none());
    }

    #[test]
    fn corrupt_game_ledger_is_replaced() {
        let storage = MemoryStorage::new();
        storage.put_raw("prizeplay:dice", "garbage");
        let engine = PrizeEngine::new(StaticPromotions::default(), storage);
        let session = engine
            .create_session(GameKind::Dice, GameConfig::default(), 3)
            .unwrap();
        assert_eq!(session.stats().plays, 0);
    }

    #[test]
    fn empty_catalog_degrades_to_defaults_for_tape_only() {
        let engine = PrizeEngine::new(EmptyCatalog, MemoryStorage::new());
        assert_eq!(engine.promotions().len(), 10);
        assert_eq!(engine.wheel_tape().len(), 15);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(engine.random_promotion(&mut rng).unwrap().is_none());
    }

    #[test]
    fn pet_and_puzzle_use_their_own_keys() {
        let storage = MemoryStorage::new();
        let engine = PrizeEngine::new(StaticPromotions::default(), storage.clone());
        let mut pet = engine.open_pet("sheep").unwrap();
        pet.perform_task(PetTask::Graze, 0).unwrap();
        let mut puzzle = engine.open_puzzle("puzzle").unwrap();
        puzzle.earn(0).unwrap();
        assert!(storage.raw("sheep").is_some());
        assert!(storage.raw("puzzle").is_some());
    }

    #[test]
    fn coffee_and_tracks_persist_through_the_engine() {
        let storage = MemoryStorage::new();
        let engine = PrizeEngine::new(StaticPromotions::default(), storage.clone());
        {
            let mut shop = engine.open_coffee_shop("coffee").unwrap();
            shop.take_order(&mut UnitDraws::new([0.0, 0.0]), 0).unwrap();
            shop.add_ingredient(Ingredient::Coffee).unwrap();
            shop.serve(1_000).unwrap();

            let mut map = engine.open_treasure_map("map").unwrap();
            map.open(0).unwrap();
            map.visit().unwrap();
        }
        assert_eq!(engine.open_coffee_shop("coffee").unwrap().stats().served, 1);
        let map = engine.open_treasure_map("map").unwrap();
        assert_eq!(map.status(1), Some(MilestoneStatus::Unlocked));
        assert_eq!(map.coins(), 100);
        assert_eq!(engine.open_quest("quest").unwrap().step(), 0);
    }
}
