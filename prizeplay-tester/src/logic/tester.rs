use anyhow::{Context, Result};
use colored::Colorize;
use prizeplay_game::{
    Clock, GameConfig, GameKind, LedgerError, LedgerStorage, ManualClock, MemoryStorage,
    PlayError, PlaySession, ProgressLedger, Promotion, game_ledger_key, reward_table, stream_rng,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::fairness::{FairnessAudit, audit_table};
use super::seeds::SeedInfo;
use crate::storage::FileStorage;

/// Plays run against a real ledger for each game and seed.
pub const DEFAULT_SMOKE_PLAYS: usize = 200;

/// Counters gathered while replaying plays through a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCheck {
    pub plays_attempted: usize,
    pub plays_settled: i64,
    pub refused: usize,
    pub wins: i64,
    pub losses: i64,
    pub best_streak: i64,
    pub coins: i64,
    pub draws: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub game: GameKind,
    pub seed: u64,
    pub seed_label: String,
    pub passed: bool,
    pub failures: Vec<String>,
    pub fairness: FairnessAudit,
    pub ledger: LedgerCheck,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

pub struct FairnessTester {
    promotions: Vec<Promotion>,
    ledger_dir: Option<PathBuf>,
    smoke_plays: usize,
    verbose: bool,
}

impl FairnessTester {
    #[must_use]
    pub const fn new(promotions: Vec<Promotion>, verbose: bool) -> Self {
        Self {
            promotions,
            ledger_dir: None,
            smoke_plays: DEFAULT_SMOKE_PLAYS,
            verbose,
        }
    }

    /// Persist smoke-run ledgers as JSON files under `dir`.
    #[must_use]
    pub fn with_ledger_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.ledger_dir = dir;
        self
    }

    #[must_use]
    pub const fn with_smoke_plays(mut self, plays: usize) -> Self {
        self.smoke_plays = plays;
        self
    }

    /// Audit every game against every seed.
    ///
    /// # Errors
    ///
    /// Returns an error when a table cannot be built or ledger storage fails.
    pub fn run(
        &self,
        games: &[GameKind],
        seeds: &[SeedInfo],
        iterations: usize,
    ) -> Result<Vec<AuditResult>> {
        let mut results = Vec::with_capacity(games.len() * seeds.len());
        for &game in games {
            for seed in seeds {
                if self.verbose {
                    println!(
                        "🎲 Auditing {} (seed {})",
                        game.id().bright_white(),
                        seed.label
                    );
                }
                let result = self.run_single(game, seed, iterations)?;
                if self.verbose {
                    let status = if result.passed {
                        "✅".green()
                    } else {
                        "❌".red()
                    };
                    println!(
                        "  {status} chi2 {:.3} / {:.3} ({} dof) in {:?}",
                        result.fairness.chi_squared,
                        result.fairness.critical_value,
                        result.fairness.degrees_of_freedom,
                        result.duration
                    );
                }
                results.push(result);
            }
        }
        Ok(results)
    }

    fn run_single(&self, game: GameKind, seed: &SeedInfo, iterations: usize) -> Result<AuditResult> {
        let start = Instant::now();
        let config = GameConfig::for_kind(game);
        let table = reward_table(game, &config, &self.promotions)
            .with_context(|| format!("building {game} reward table"))?;

        let mut rng = stream_rng(seed.seed, &format!("audit-{game}"));
        let fairness = audit_table(&table, &mut rng, iterations);
        let mut failures = Vec::new();
        if !fairness.passed {
            failures.push(format!(
                "distribution off: chi2 {:.3} >= {:.3} over {} dof after {} draws",
                fairness.chi_squared,
                fairness.critical_value,
                fairness.degrees_of_freedom,
                fairness.draws
            ));
        }

        let (ledger, ledger_failures) = match &self.ledger_dir {
            Some(dir) => {
                let storage = FileStorage::new(dir.join(format!("seed-{}", seed.seed)))
                    .with_context(|| format!("creating ledger dir under {}", dir.display()))?;
                self.smoke_ledger(storage, game, config, seed.seed)?
            }
            None => self.smoke_ledger(MemoryStorage::new(), game, config, seed.seed)?,
        };
        failures.extend(ledger_failures);

        log::debug!(
            "{game} seed {}: {} failure(s), {} plays settled",
            seed.seed,
            failures.len(),
            ledger.plays_settled
        );

        Ok(AuditResult {
            game,
            seed: seed.seed,
            seed_label: seed.label.clone(),
            passed: failures.is_empty(),
            failures,
            fairness,
            ledger,
            duration: start.elapsed(),
        })
    }

    fn smoke_ledger<S>(
        &self,
        storage: S,
        game: GameKind,
        config: GameConfig,
        seed: u64,
    ) -> Result<(LedgerCheck, Vec<String>)>
    where
        S: LedgerStorage + Clone,
    {
        let key = game_ledger_key(game);
        let mut ledger = ProgressLedger::open_or_reset(storage.clone(), key.as_str())
            .with_context(|| format!("opening ledger {key}"))?;
        ledger.reset()?;

        let step = config.cooldown_ms.max(1);
        let mut session = PlaySession::new(game, config, &self.promotions, ledger, seed)?;
        let clock = ManualClock::new(0);
        let mut failures = Vec::new();
        let mut check = LedgerCheck::default();

        for attempt in 0..self.smoke_plays {
            check.plays_attempted += 1;
            match session.play(clock.now_ms()) {
                Ok(report) => {
                    if report.stats.coins < 0 {
                        failures.push(format!("play {attempt}: coins went negative"));
                    }
                    if report.phases.len() != 4 {
                        failures.push(format!(
                            "play {attempt}: expected 4 phase transitions, saw {}",
                            report.phases.len()
                        ));
                    }
                }
                Err(PlayError::Ledger(LedgerError::InsufficientFunds { .. })) => check.refused += 1,
                Err(PlayError::Cooldown(active)) => {
                    failures.push(format!("play {attempt}: unexpected cooldown: {active}"));
                }
                Err(err) => return Err(err).context(format!("{game} play {attempt}")),
            }
            clock.advance(step);
        }

        let stats = session.stats();
        check.plays_settled = stats.plays;
        check.wins = stats.wins;
        check.losses = stats.losses;
        check.best_streak = stats.best_streak;
        check.coins = stats.coins;
        check.draws = session.draws();

        if stats.plays != stats.wins + stats.losses {
            failures.push(format!(
                "plays {} != wins {} + losses {}",
                stats.plays, stats.wins, stats.losses
            ));
        }
        let expected_settled = i64::try_from(check.plays_attempted - check.refused).unwrap_or(-1);
        if stats.plays != expected_settled {
            failures.push(format!(
                "{} plays settled, expected {expected_settled}",
                stats.plays
            ));
        }

        let state = session.ledger().state().clone();
        drop(session);
        let reopened = ProgressLedger::open(storage, key.as_str())
            .with_context(|| format!("reopening ledger {key}"))?;
        if reopened.state() != &state {
            failures.push("ledger state differs after reopening".to_string());
        }

        Ok((check, failures))
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::unique_temp_path;
    use prizeplay_game::default_promotions;

    fn seed(value: u64) -> SeedInfo {
        SeedInfo::from_numeric(value)
    }

    #[test]
    fn all_games_pass_with_default_promotions() {
        let tester = FairnessTester::new(default_promotions().to_vec(), false).with_smoke_plays(50);
        let results = tester.run(&GameKind::ALL, &[seed(1337)], 10_000).unwrap();
        assert_eq!(results.len(), GameKind::ALL.len());
        for result in &results {
            assert!(result.passed, "{:?}: {:?}", result.game, result.failures);
            assert_eq!(result.ledger.plays_attempted, 50);
        }
    }

    #[test]
    fn mystery_box_refusals_are_counted() {
        let tester = FairnessTester::new(Vec::new(), false).with_smoke_plays(300);
        let results = tester
            .run(&[GameKind::MysteryBox], &[seed(7)], 10_000)
            .unwrap();
        let ledger = &results[0].ledger;
        assert!(ledger.refused > 0);
        assert_eq!(
            ledger.plays_settled,
            i64::try_from(ledger.plays_attempted - ledger.refused).unwrap()
        );
    }

    #[test]
    fn file_ledgers_are_written_per_seed() {
        let dir = unique_temp_path("ledgers");
        let tester = FairnessTester::new(Vec::new(), false)
            .with_ledger_dir(Some(dir.clone()))
            .with_smoke_plays(5);
        let results = tester.run(&[GameKind::Dice], &[seed(42)], 1_000).unwrap();
        assert!(results[0].passed, "{:?}", results[0].failures);
        assert!(dir.join("seed-42").join("prizeplay%3Adice.json").exists());
    }

    #[test]
    fn result_serializes_duration_as_millis() {
        let tester = FairnessTester::new(Vec::new(), false).with_smoke_plays(1);
        let results = tester.run(&[GameKind::Slots], &[seed(1)], 100).unwrap();
        let json = serde_json::to_value(&results[0]).unwrap();
        assert!(json["duration"].is_number());
        assert_eq!(json["game"], "slots");
    }
}
