//! Play sessions binding a reward table to a ledger, a cooldown gate and the
//! phase machine.

use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    COUNTER_BEST_STREAK, COUNTER_COINS, COUNTER_LOSSES, COUNTER_PLAYS, COUNTER_STREAK,
    COUNTER_WINS, LOG_TARGET_SESSION,
};
use crate::cooldown::{CooldownActive, CooldownGate};
use crate::games::{GameConfig, GameKind, Reward, reward_table};
use crate::ledger::{LedgerError, LedgerStorage, ProgressLedger};
use crate::phase::{PhaseError, PhaseMachine, PhaseTransition, PlayEvent, PlayPhase};
use crate::promotions::Promotion;
use crate::resolver::{InvalidConfiguration, ResolutionTrace, WeightedTable};
use crate::rng::{CountingRng, stream_rng};

#[derive(Debug, Error)]
pub enum PlayError {
    #[error(transparent)]
    Cooldown(#[from] CooldownActive),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    Config(#[from] InvalidConfiguration),
}

/// Aggregate counters kept in the ledger for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayStats {
    pub plays: i64,
    pub wins: i64,
    pub losses: i64,
    pub streak: i64,
    pub best_streak: i64,
    pub coins: i64,
}

/// Everything that happened during one play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayReport {
    pub game: GameKind,
    pub reward: Reward,
    pub trace: ResolutionTrace,
    pub phases: Vec<PhaseTransition>,
    pub stats: PlayStats,
    /// Epoch milliseconds until the next play is allowed, when a cooldown applies.
    pub cooldown_until_ms: Option<u64>,
}

/// One game bound to a ledger and a reproducible random stream.
#[derive(Debug)]
pub struct PlaySession<S: LedgerStorage> {
    kind: GameKind,
    config: GameConfig,
    table: WeightedTable<Reward>,
    ledger: ProgressLedger<S>,
    cooldowns: CooldownGate,
    phase: PhaseMachine,
    seed: u64,
    rng: CountingRng<ChaCha20Rng>,
}

impl<S: LedgerStorage> PlaySession<S> {
    /// Build a session for `kind`, seeding starting coins on a fresh ledger.
    ///
    /// # Errors
    ///
    /// Returns [`PlayError::Config`] if the reward table is unusable and
    /// [`PlayError::Ledger`] if starting coins cannot be persisted.
    pub fn new(
        kind: GameKind,
        config: GameConfig,
        promotions: &[Promotion],
        mut ledger: ProgressLedger<S>,
        seed: u64,
    ) -> Result<Self, PlayError> {
        let table = reward_table(kind, &config, promotions)?;
        if config.starting_coins > 0 {
            ledger.ensure(COUNTER_COINS, config.starting_coins)?;
        }
        let cooldowns = ledger.cooldowns();
        Ok(Self {
            kind,
            config,
            table,
            ledger,
            cooldowns,
            phase: PhaseMachine::new(),
            seed,
            rng: stream_rng(seed, kind.id()),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> GameKind {
        self.kind
    }

    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub const fn table(&self) -> &WeightedTable<Reward> {
        &self.table
    }

    #[must_use]
    pub const fn ledger(&self) -> &ProgressLedger<S> {
        &self.ledger
    }

    #[must_use]
    pub const fn phase(&self) -> PlayPhase {
        self.phase.phase()
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Random draws consumed so far.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.rng.draws()
    }

    /// Deterministically restart the random stream.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = stream_rng(seed, self.kind.id());
    }

    #[must_use]
    pub fn stats(&self) -> PlayStats {
        PlayStats {
            plays: self.ledger.get(COUNTER_PLAYS),
            wins: self.ledger.get(COUNTER_WINS),
            losses: self.ledger.get(COUNTER_LOSSES),
            streak: self.ledger.get(COUNTER_STREAK),
            best_streak: self.ledger.get(COUNTER_BEST_STREAK),
            coins: self.ledger.get(COUNTER_COINS),
        }
    }

    /// Milliseconds left before the game can be played again.
    #[must_use]
    pub fn cooldown_remaining_ms(&self, now_ms: u64) -> u64 {
        self.cooldowns.remaining_ms(self.kind.id(), now_ms)
    }

    /// Run one play at `now_ms`.
    ///
    /// The outcome is resolved and settled into the ledger before the reveal
    /// phase, so the reward is never lost to an interrupted presentation.
    ///
    /// # Errors
    ///
    /// Returns [`PlayError::Cooldown`] while cooling down, a
    /// [`LedgerError::InsufficientFunds`] when the cost cannot be paid, and
    /// [`PlayError::Phase`] if a play is already in flight. On any error the
    /// phase machine is back at idle.
    pub fn play(&mut self, now_ms: u64) -> Result<PlayReport, PlayError> {
        self.cooldowns.check(self.kind.id(), now_ms)?;
        self.phase.apply(PlayEvent::Start)?;
        match self.run_play(now_ms) {
            Ok(report) => Ok(report),
            Err(err) => {
                self.phase.abort();
                log::debug!(target: LOG_TARGET_SESSION, "{} play aborted: {err}", self.kind);
                Err(err)
            }
        }
    }

    fn run_play(&mut self, now_ms: u64) -> Result<PlayReport, PlayError> {
        let cost = self.config.cost.max(0);
        let balance = self.ledger.get(COUNTER_COINS);
        if balance < cost {
            return Err(LedgerError::InsufficientFunds {
                counter: COUNTER_COINS.to_string(),
                balance,
                requested: cost,
            }
            .into());
        }

        let (outcome, trace) = self.table.resolve_with_trace(&mut self.rng);
        let reward = outcome.payload.clone();
        self.phase.apply(PlayEvent::Resolve)?;

        let mut cooldowns = self.cooldowns.clone();
        cooldowns.prune(now_ms);
        let cooldown_until_ms = (self.config.cooldown_ms > 0)
            .then(|| cooldowns.activate(self.kind.id(), self.config.cooldown_ms, now_ms));
        self.settle(cost, &reward, &cooldowns)?;
        self.cooldowns = cooldowns;

        self.phase.apply(PlayEvent::RevealComplete)?;
        self.phase.apply(PlayEvent::Acknowledge)?;

        let stats = self.stats();
        log::debug!(
            target: LOG_TARGET_SESSION,
            "{} play #{} -> {} (streak {})",
            self.kind,
            stats.plays,
            reward.title(),
            stats.streak
        );
        Ok(PlayReport {
            game: self.kind,
            reward,
            trace,
            phases: self.phase.take_history().into_vec(),
            stats,
            cooldown_until_ms,
        })
    }

    /// Charge the play and record its outcome in one all-or-nothing write.
    fn settle(
        &mut self,
        cost: i64,
        reward: &Reward,
        cooldowns: &CooldownGate,
    ) -> Result<(), LedgerError> {
        self.ledger.transaction(|ledger| {
            if cost > 0 {
                ledger.spend(COUNTER_COINS, cost)?;
            }
            ledger.add(COUNTER_PLAYS, 1)?;
            if reward.is_win() {
                ledger.add(COUNTER_WINS, 1)?;
                let streak = ledger.add(COUNTER_STREAK, 1)?;
                if streak > ledger.get(COUNTER_BEST_STREAK) {
                    ledger.set(COUNTER_BEST_STREAK, streak)?;
                }
                if reward.coins() != 0 {
                    ledger.add(COUNTER_COINS, reward.coins())?;
                }
                if let Some(item) = reward.inventory_key() {
                    ledger.grant(&item, 1)?;
                }
            } else {
                ledger.add(COUNTER_LOSSES, 1)?;
                ledger.set(COUNTER_STREAK, 0)?;
            }
            ledger.store_cooldowns(cooldowns)
        })
    }

    /// Consume the session, returning its ledger.
    #[must_use]
    pub fn into_ledger(self) -> ProgressLedger<S> {
        self.ledger
    }
}
