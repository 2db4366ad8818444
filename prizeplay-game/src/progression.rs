//! Unlock tracks: milestones cleared strictly in order, with the next open
//! step persisted in the ledger.

use serde::Serialize;
use thiserror::Error;

use crate::constants::{
    COUNTER_COINS, COUNTER_STEP, LOG_TARGET_PROGRESSION, QUEST_ACTIVATION_TAPS,
    QUEST_MEDITATION_MS, QUEST_REACTION_TAPS, TREASURE_POINT_COINS,
};
use crate::ledger::{LedgerError, LedgerStorage, ProgressLedger};

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("milestone {index} does not exist")]
    UnknownMilestone { index: usize },
    #[error("milestone {index} is locked until milestone {next} is cleared")]
    Locked { index: usize, next: usize },
    #[error("milestone {index} is already cleared")]
    AlreadyCompleted { index: usize },
    #[error("no milestone is open")]
    NothingOpen,
    #[error("milestone {index} expects a {expected} action")]
    WrongAction { index: usize, expected: &'static str },
}

/// What clears a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Goal {
    Visit,
    Taps { target: u32 },
    Hold { ms: u64 },
    Riddle { answer: &'static str },
}

impl Goal {
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Visit => "visit",
            Self::Taps { .. } => "taps",
            Self::Hold { .. } => "hold",
            Self::Riddle { .. } => "riddle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub id: &'static str,
    pub goal: Goal,
    pub reward_coins: i64,
}

const fn milestone(id: &'static str, goal: Goal, reward_coins: i64) -> Milestone {
    Milestone {
        id,
        goal,
        reward_coins,
    }
}

pub const TREASURE_MAP: [Milestone; 5] = [
    milestone("harbor", Goal::Visit, TREASURE_POINT_COINS),
    milestone("forest", Goal::Visit, TREASURE_POINT_COINS),
    milestone("echo_mountain", Goal::Visit, TREASURE_POINT_COINS),
    milestone("skull_island", Goal::Visit, TREASURE_POINT_COINS),
    milestone("gold_cave", Goal::Visit, TREASURE_POINT_COINS),
];

pub const QUEST: [Milestone; 4] = [
    milestone(
        "activation",
        Goal::Taps {
            target: QUEST_ACTIVATION_TAPS,
        },
        0,
    ),
    milestone(
        "meditation",
        Goal::Hold {
            ms: QUEST_MEDITATION_MS,
        },
        0,
    ),
    milestone("cipher", Goal::Riddle { answer: "time" }, 0),
    milestone(
        "reaction",
        Goal::Taps {
            target: QUEST_REACTION_TAPS,
        },
        0,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Completed,
    Unlocked,
    Locked,
}

/// Result of one action on the open milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Pending { progress: u64, target: u64 },
    WrongAnswer,
    Completed {
        index: usize,
        reward_coins: i64,
        finished: bool,
    },
}

#[derive(Debug)]
pub struct Progression<S: LedgerStorage> {
    track: &'static [Milestone],
    ledger: ProgressLedger<S>,
    open: Option<usize>,
    taps: u32,
}

impl<S: LedgerStorage> Progression<S> {
    #[must_use]
    pub const fn new(track: &'static [Milestone], ledger: ProgressLedger<S>) -> Self {
        Self {
            track,
            ledger,
            open: None,
            taps: 0,
        }
    }

    #[must_use]
    pub const fn treasure_map(ledger: ProgressLedger<S>) -> Self {
        Self::new(&TREASURE_MAP, ledger)
    }

    #[must_use]
    pub const fn quest(ledger: ProgressLedger<S>) -> Self {
        Self::new(&QUEST, ledger)
    }

    #[must_use]
    pub const fn ledger(&self) -> &ProgressLedger<S> {
        &self.ledger
    }

    #[must_use]
    pub const fn track(&self) -> &'static [Milestone] {
        self.track
    }

    /// Index of the first milestone not yet cleared.
    #[must_use]
    pub fn step(&self) -> usize {
        usize::try_from(self.ledger.get(COUNTER_STEP))
            .unwrap_or(0)
            .min(self.track.len())
    }

    #[must_use]
    pub fn coins(&self) -> i64 {
        self.ledger.get(COUNTER_COINS)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.step() >= self.track.len()
    }

    #[must_use]
    pub fn status(&self, index: usize) -> Option<MilestoneStatus> {
        if index >= self.track.len() {
            return None;
        }
        let step = self.step();
        Some(match index {
            i if i < step => MilestoneStatus::Completed,
            i if i == step => MilestoneStatus::Unlocked,
            _ => MilestoneStatus::Locked,
        })
    }

    #[must_use]
    pub const fn open_milestone(&self) -> Option<usize> {
        self.open
    }

    /// Start working on `index`; only the next uncleared milestone opens.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown, locked or already cleared milestones.
    pub fn open(&mut self, index: usize) -> Result<&'static Milestone, ProgressionError> {
        let track = self.track;
        let milestone = track
            .get(index)
            .ok_or(ProgressionError::UnknownMilestone { index })?;
        let step = self.step();
        if index < step {
            return Err(ProgressionError::AlreadyCompleted { index });
        }
        if index > step {
            return Err(ProgressionError::Locked { index, next: step });
        }
        if self.open != Some(index) {
            self.open = Some(index);
            self.taps = 0;
        }
        Ok(milestone)
    }

    /// Clear an open visit milestone.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is open or the goal is not a visit.
    pub fn visit(&mut self) -> Result<StepOutcome, ProgressionError> {
        let (index, goal) = self.open_goal()?;
        match goal {
            Goal::Visit => self.complete(index),
            other => Err(wrong_action(index, other)),
        }
    }

    /// Count one tap toward an open tap milestone.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is open or the goal is not taps.
    pub fn tap(&mut self) -> Result<StepOutcome, ProgressionError> {
        let (index, goal) = self.open_goal()?;
        let Goal::Taps { target } = goal else {
            return Err(wrong_action(index, goal));
        };
        let taps = self.taps.saturating_add(1);
        if taps >= target {
            return self.complete(index);
        }
        self.taps = taps;
        Ok(StepOutcome::Pending {
            progress: u64::from(taps),
            target: u64::from(target),
        })
    }

    /// Report how long the player has held focus on an open hold milestone.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is open or the goal is not a hold.
    pub fn hold(&mut self, elapsed_ms: u64) -> Result<StepOutcome, ProgressionError> {
        let (index, goal) = self.open_goal()?;
        let Goal::Hold { ms } = goal else {
            return Err(wrong_action(index, goal));
        };
        if elapsed_ms >= ms {
            return self.complete(index);
        }
        Ok(StepOutcome::Pending {
            progress: elapsed_ms,
            target: ms,
        })
    }

    /// Answer an open riddle, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is open or the goal is not a riddle.
    pub fn answer(&mut self, guess: &str) -> Result<StepOutcome, ProgressionError> {
        let (index, goal) = self.open_goal()?;
        let Goal::Riddle { answer } = goal else {
            return Err(wrong_action(index, goal));
        };
        if guess.trim().to_lowercase() == answer {
            self.complete(index)
        } else {
            Ok(StepOutcome::WrongAnswer)
        }
    }

    /// Back to the first milestone with no coins.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be cleared.
    pub fn reset(&mut self) -> Result<(), ProgressionError> {
        self.ledger.reset()?;
        self.open = None;
        self.taps = 0;
        Ok(())
    }

    fn open_goal(&self) -> Result<(usize, Goal), ProgressionError> {
        let index = self.open.ok_or(ProgressionError::NothingOpen)?;
        self.track
            .get(index)
            .map(|milestone| (index, milestone.goal))
            .ok_or(ProgressionError::UnknownMilestone { index })
    }

    fn complete(&mut self, index: usize) -> Result<StepOutcome, ProgressionError> {
        let reward_coins = self.track[index].reward_coins;
        let next = i64::try_from(index + 1).unwrap_or(i64::MAX);
        self.ledger.transaction(|ledger| {
            ledger.set(COUNTER_STEP, next)?;
            if reward_coins > 0 {
                ledger.add(COUNTER_COINS, reward_coins)?;
            }
            Ok::<_, LedgerError>(())
        })?;
        self.open = None;
        self.taps = 0;
        log::info!(
            target: LOG_TARGET_PROGRESSION,
            "`{}` cleared milestone {index} ({})",
            self.ledger.key(),
            self.track[index].id
        );
        Ok(StepOutcome::Completed {
            index,
            reward_coins,
            finished: self.is_finished(),
        })
    }
}

const fn wrong_action(index: usize, expected: Goal) -> ProgressionError {
    ProgressionError::WrongAction {
        index,
        expected: expected.kind(),
    }
}
