//! Puzzle collector: earn coins, buy random missing pieces, place them.

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::constants::{
    COUNTER_COINS, PUZZLE_EARN_AMOUNT, PUZZLE_EARN_THROTTLE_MS, PUZZLE_PIECE_PRICE,
    PUZZLE_STARTING_COINS, PUZZLE_TOTAL_PIECES,
};
use crate::cooldown::CooldownActive;
use crate::ledger::{LedgerError, LedgerStorage, ProgressLedger};
use crate::resolver::{InvalidConfiguration, resolve_weighted};

const EARN_ACTION: &str = "earn";

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error(transparent)]
    Throttled(#[from] CooldownActive),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Config(#[from] InvalidConfiguration),
    #[error("every piece has already been collected")]
    AllCollected,
    #[error("piece {piece} does not exist")]
    UnknownPiece { piece: u8 },
    #[error("piece {piece} is not in the inventory")]
    NotHeld { piece: u8 },
    #[error("piece {piece} is already placed")]
    AlreadyPlaced { piece: u8 },
}

/// Board summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PuzzleProgress {
    pub coins: i64,
    pub held: Vec<u8>,
    pub placed: Vec<u8>,
    pub complete: bool,
}

fn held_key(piece: u8) -> String {
    format!("piece-{piece}")
}

fn placed_key(piece: u8) -> String {
    format!("placed-{piece}")
}

#[derive(Debug)]
pub struct PuzzleCollector<S: LedgerStorage> {
    ledger: ProgressLedger<S>,
}

impl<S: LedgerStorage> PuzzleCollector<S> {
    /// # Errors
    ///
    /// Returns an error if starting coins cannot be persisted.
    pub fn new(mut ledger: ProgressLedger<S>) -> Result<Self, CollectionError> {
        ledger.ensure(COUNTER_COINS, PUZZLE_STARTING_COINS)?;
        Ok(Self { ledger })
    }

    #[must_use]
    pub const fn ledger(&self) -> &ProgressLedger<S> {
        &self.ledger
    }

    #[must_use]
    pub fn coins(&self) -> i64 {
        self.ledger.get(COUNTER_COINS)
    }

    #[must_use]
    pub fn is_held(&self, piece: u8) -> bool {
        self.ledger.count(&held_key(piece)) > 0
    }

    #[must_use]
    pub fn is_placed(&self, piece: u8) -> bool {
        self.ledger.count(&placed_key(piece)) > 0
    }

    /// Pieces neither held nor placed.
    #[must_use]
    pub fn missing(&self) -> Vec<u8> {
        (0..PUZZLE_TOTAL_PIECES)
            .filter(|&piece| !self.is_held(piece) && !self.is_placed(piece))
            .collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        (0..PUZZLE_TOTAL_PIECES).all(|piece| self.is_placed(piece))
    }

    #[must_use]
    pub fn progress(&self) -> PuzzleProgress {
        let pieces = 0..PUZZLE_TOTAL_PIECES;
        PuzzleProgress {
            coins: self.coins(),
            held: pieces.clone().filter(|&p| self.is_held(p)).collect(),
            placed: pieces.filter(|&p| self.is_placed(p)).collect(),
            complete: self.is_complete(),
        }
    }

    /// Tap for coins, at most once per throttle window.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::Throttled`] inside the window.
    pub fn earn(&mut self, now_ms: u64) -> Result<i64, CollectionError> {
        let mut gate = self.ledger.cooldowns();
        gate.try_activate(EARN_ACTION, PUZZLE_EARN_THROTTLE_MS, now_ms)?;
        self.ledger.transaction(|ledger| {
            ledger.store_cooldowns(&gate)?;
            Ok(ledger.add(COUNTER_COINS, PUZZLE_EARN_AMOUNT)?)
        })
    }

    /// Buy a piece chosen uniformly among the missing ones.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::AllCollected`] when nothing is missing and
    /// a ledger error when coins run short.
    pub fn buy_piece<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<u8, CollectionError> {
        let missing: Vec<(u8, f64)> = self
            .missing()
            .into_iter()
            .map(|piece| (piece, 1.0))
            .collect();
        if missing.is_empty() {
            return Err(CollectionError::AllCollected);
        }
        if self.coins() < PUZZLE_PIECE_PRICE {
            return Err(LedgerError::InsufficientFunds {
                counter: COUNTER_COINS.to_string(),
                balance: self.coins(),
                requested: PUZZLE_PIECE_PRICE,
            }
            .into());
        }
        let piece = *resolve_weighted(&missing, rng)?;
        self.ledger.transaction(|ledger| {
            ledger.spend(COUNTER_COINS, PUZZLE_PIECE_PRICE)?;
            ledger.grant(&held_key(piece), 1)?;
            Ok(piece)
        })
    }

    /// Move a held piece onto the board.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown, unheld or already placed pieces.
    pub fn place_piece(&mut self, piece: u8) -> Result<bool, CollectionError> {
        if piece >= PUZZLE_TOTAL_PIECES {
            return Err(CollectionError::UnknownPiece { piece });
        }
        if self.is_placed(piece) {
            return Err(CollectionError::AlreadyPlaced { piece });
        }
        if !self.is_held(piece) {
            return Err(CollectionError::NotHeld { piece });
        }
        self.ledger.transaction(|ledger| {
            ledger.consume(&held_key(piece), 1)?;
            ledger.grant(&placed_key(piece), 1)
        })?;
        Ok(self.is_complete())
    }

    /// Clear the board and inventory, keeping coins.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn reset_board(&mut self) -> Result<(), CollectionError> {
        let coins = self.coins();
        self.ledger.reset()?;
        self.ledger.set(COUNTER_COINS, coins)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryStorage;
    use crate::rng::UnitDraws;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn collector() -> PuzzleCollector<MemoryStorage> {
        PuzzleCollector::new(ProgressLedger::open(MemoryStorage::new(), "puzzle").unwrap())
            .unwrap()
    }

    #[test]
    fn earn_is_throttled() {
        let mut puzzle = collector();
        assert_eq!(puzzle.earn(1_000).unwrap(), 110);
        assert!(matches!(
            puzzle.earn(1_499),
            Err(CollectionError::Throttled(CooldownActive { remaining_ms: 1, .. }))
        ));
        assert_eq!(puzzle.earn(1_500).unwrap(), 120);
    }

    #[test]
    fn buy_picks_among_missing_only() {
        let mut puzzle = collector();
        // 9 missing pieces: 0.5 lands on the fifth.
        assert_eq!(puzzle.buy_piece(&mut UnitDraws::new([0.5])).unwrap(), 4);
        // piece 4 is held, so 0.5 of the remaining 8 lands on piece 5.
        assert_eq!(puzzle.buy_piece(&mut UnitDraws::new([0.5])).unwrap(), 5);
        assert_eq!(puzzle.coins(), 0);
        assert!(matches!(
            puzzle.buy_piece(&mut UnitDraws::new([0.5])),
            Err(CollectionError::Ledger(LedgerError::InsufficientFunds { .. }))
        ));
        assert_eq!(puzzle.missing().len(), 7);
    }

    #[test]
    fn placing_all_pieces_completes_the_board() {
        let mut puzzle = collector();
        puzzle.ledger.set(COUNTER_COINS, 1_000).unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..PUZZLE_TOTAL_PIECES {
            puzzle.buy_piece(&mut rng).unwrap();
        }
        assert!(matches!(
            puzzle.buy_piece(&mut rng),
            Err(CollectionError::AllCollected)
        ));
        assert_eq!(puzzle.coins(), 550);

        for piece in 0..PUZZLE_TOTAL_PIECES - 1 {
            assert!(!puzzle.place_piece(piece).unwrap());
        }
        assert!(puzzle.place_piece(PUZZLE_TOTAL_PIECES - 1).unwrap());
        assert!(puzzle.is_complete());
        assert!(matches!(
            puzzle.place_piece(0),
            Err(CollectionError::AlreadyPlaced { piece: 0 })
        ));
        assert!(matches!(
            puzzle.place_piece(9),
            Err(CollectionError::UnknownPiece { piece: 9 })
        ));
    }

    #[test]
    fn reset_keeps_coins() {
        let mut puzzle = collector();
        puzzle.buy_piece(&mut UnitDraws::new([0.0])).unwrap();
        assert!(matches!(
            puzzle.place_piece(3),
            Err(CollectionError::NotHeld { piece: 3 })
        ));
        puzzle.place_piece(0).unwrap();
        puzzle.reset_board().unwrap();
        let progress = puzzle.progress();
        assert_eq!(progress.coins, 50);
        assert!(progress.placed.is_empty());
        assert_eq!(puzzle.missing().len(), 9);
    }
}
