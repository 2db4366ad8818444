//! Weighted random reward resolution.
//!
//! A [`WeightedTable`] holds an ordered set of outcomes with non-negative
//! weights. Resolution draws a uniform value in `[0, total_weight)`, walks
//! the cumulative sum, and returns the first outcome whose cumulative
//! threshold exceeds the draw.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::LOG_TARGET_RESOLVER;
use crate::numbers::clamp_unit;

/// Errors raised when a weight set cannot produce a distribution.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidConfiguration {
    #[error("weighted table `{table}` has no outcomes")]
    Empty { table: String },
    #[error("weighted table `{table}` has a total weight of zero")]
    ZeroTotalWeight { table: String },
    #[error("outcome `{label}` in `{table}` has negative weight {weight}")]
    NegativeWeight {
        table: String,
        label: String,
        weight: f64,
    },
    #[error("outcome `{label}` in `{table}` has a non-finite weight")]
    NonFiniteWeight { table: String, label: String },
    #[error("weights in `{table}` sum past the largest representable value")]
    TotalOverflow { table: String },
}

/// One possible result of a play, with its weight and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedOutcome<T> {
    pub label: String,
    pub weight: f64,
    pub payload: T,
}

impl<T> WeightedOutcome<T> {
    pub fn new(label: impl Into<String>, weight: f64, payload: T) -> Self {
        Self {
            label: label.into(),
            weight,
            payload,
        }
    }
}

/// Candidate weight captured in a resolution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceCandidate {
    pub label: String,
    pub weight: f64,
}

/// Explainability telemetry for a single resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionTrace {
    /// Identifier of the table the outcome was drawn from.
    pub table_id: String,
    /// Unit draw in `[0, 1)`.
    pub unit_roll: f64,
    /// Unit draw scaled by the total weight.
    pub roll: f64,
    pub total_weight: f64,
    pub candidates: Vec<TraceCandidate>,
    pub chosen_label: String,
    pub chosen_index: usize,
}

/// Validated, ordered set of weighted outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedTable<T> {
    id: String,
    outcomes: Vec<WeightedOutcome<T>>,
    total_weight: f64,
}

impl<T> WeightedTable<T> {
    /// Build a table, rejecting negative, non-finite and all-zero weight sets.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfiguration`] when the set is empty, any weight is
    /// negative or non-finite, or the weights sum to zero or past `f64::MAX`.
    pub fn new(
        id: impl Into<String>,
        outcomes: Vec<WeightedOutcome<T>>,
    ) -> Result<Self, InvalidConfiguration> {
        let id = id.into();
        if outcomes.is_empty() {
            return Err(InvalidConfiguration::Empty { table: id });
        }
        let mut total_weight = 0.0;
        for outcome in &outcomes {
            if !outcome.weight.is_finite() {
                return Err(InvalidConfiguration::NonFiniteWeight {
                    table: id,
                    label: outcome.label.clone(),
                });
            }
            if outcome.weight < 0.0 {
                return Err(InvalidConfiguration::NegativeWeight {
                    table: id,
                    label: outcome.label.clone(),
                    weight: outcome.weight,
                });
            }
            total_weight += outcome.weight;
        }
        if !total_weight.is_finite() {
            return Err(InvalidConfiguration::TotalOverflow { table: id });
        }
        if total_weight <= 0.0 {
            return Err(InvalidConfiguration::ZeroTotalWeight { table: id });
        }
        Ok(Self {
            id,
            outcomes,
            total_weight,
        })
    }

    /// Build a table from `(label, weight, payload)` triples.
    ///
    /// # Errors
    ///
    /// Same as [`WeightedTable::new`].
    pub fn from_triples<L: Into<String>>(
        id: impl Into<String>,
        triples: impl IntoIterator<Item = (L, f64, T)>,
    ) -> Result<Self, InvalidConfiguration> {
        let outcomes = triples
            .into_iter()
            .map(|(label, weight, payload)| WeightedOutcome::new(label, weight, payload))
            .collect();
        Self::new(id, outcomes)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn outcomes(&self) -> &[WeightedOutcome<T>] {
        &self.outcomes
    }

    #[must_use]
    pub const fn total_weight(&self) -> f64 {
        self.total_weight
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Long-run selection probability of the first outcome with `label`.
    #[must_use]
    pub fn probability(&self, label: &str) -> Option<f64> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.label == label)
            .map(|outcome| outcome.weight / self.total_weight)
    }

    /// Index selected by a raw roll in `[0, total_weight)`.
    fn index_for_roll(&self, roll: f64) -> usize {
        let mut cumulative = 0.0;
        let mut last_positive = 0;
        for (idx, outcome) in self.outcomes.iter().enumerate() {
            if outcome.weight <= 0.0 {
                continue;
            }
            cumulative += outcome.weight;
            last_positive = idx;
            if roll < cumulative {
                return idx;
            }
        }
        // Accumulated rounding can leave the roll at the final threshold.
        last_positive
    }

    /// Select the outcome for a unit draw `u` in `[0, 1)`.
    #[must_use]
    pub fn pick_unit(&self, unit: f64) -> &WeightedOutcome<T> {
        let roll = clamp_unit(unit) * self.total_weight;
        &self.outcomes[self.index_for_roll(roll)]
    }

    /// Draw one outcome from `rng`.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> &WeightedOutcome<T> {
        let unit: f64 = rng.r#gen();
        self.pick_unit(unit)
    }

    /// Draw one outcome from `rng` and capture the decision trace.
    pub fn resolve_with_trace<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> (&WeightedOutcome<T>, ResolutionTrace) {
        let unit = clamp_unit(rng.r#gen::<f64>());
        let roll = unit * self.total_weight;
        let chosen_index = self.index_for_roll(roll);
        let chosen = &self.outcomes[chosen_index];
        let trace = ResolutionTrace {
            table_id: self.id.clone(),
            unit_roll: unit,
            roll,
            total_weight: self.total_weight,
            candidates: self
                .outcomes
                .iter()
                .map(|outcome| TraceCandidate {
                    label: outcome.label.clone(),
                    weight: outcome.weight,
                })
                .collect(),
            chosen_label: chosen.label.clone(),
            chosen_index,
        };
        log::debug!(
            target: LOG_TARGET_RESOLVER,
            "table={} roll={:.6}/{:.6} chosen={}",
            trace.table_id,
            trace.roll,
            trace.total_weight,
            trace.chosen_label
        );
        (chosen, trace)
    }

    /// Transform payloads while keeping labels and weights.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> WeightedTable<U> {
        WeightedTable {
            id: self.id,
            outcomes: self
                .outcomes
                .into_iter()
                .map(|outcome| WeightedOutcome {
                    label: outcome.label,
                    weight: outcome.weight,
                    payload: f(outcome.payload),
                })
                .collect(),
            total_weight: self.total_weight,
        }
    }
}

/// One-shot resolution over `(outcome, weight)` pairs without building a table.
///
/// # Errors
///
/// Returns [`InvalidConfiguration`] on an empty, negative, non-finite,
/// overflowing or zero-total weight set.
pub fn resolve_weighted<'a, T, R>(
    options: &'a [(T, f64)],
    rng: &mut R,
) -> Result<&'a T, InvalidConfiguration>
where
    R: Rng + ?Sized,
{
    if options.is_empty() {
        return Err(InvalidConfiguration::Empty {
            table: String::from("inline"),
        });
    }
    let mut total = 0.0;
    for (idx, (_, weight)) in options.iter().enumerate() {
        if !weight.is_finite() {
            return Err(InvalidConfiguration::NonFiniteWeight {
                table: String::from("inline"),
                label: idx.to_string(),
            });
        }
        if *weight < 0.0 {
            return Err(InvalidConfiguration::NegativeWeight {
                table: String::from("inline"),
                label: idx.to_string(),
                weight: *weight,
            });
        }
        total += weight;
    }
    if !total.is_finite() {
        return Err(InvalidConfiguration::TotalOverflow {
            table: String::from("inline"),
        });
    }
    if total <= 0.0 {
        return Err(InvalidConfiguration::ZeroTotalWeight {
            table: String::from("inline"),
        });
    }

    let roll = clamp_unit(rng.r#gen::<f64>()) * total;
    let mut cumulative = 0.0;
    let mut selected = None;
    for (item, weight) in options {
        if *weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        selected = Some(item);
        if roll < cumulative {
            break;
        }
    }
    selected.ok_or(InvalidConfiguration::ZeroTotalWeight {
        table: String::from("inline"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::UnitDraws;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::rngs::mock::StepRng;

    fn scenario_table() -> WeightedTable<&'static str> {
        WeightedTable::from_triples(
            "scenario",
            [("A", 0.3, "a"), ("B", 0.2, "b"), ("Loss", 0.5, "loss")],
        )
        .unwrap()
    }

    #[test]
    fn unit_draws_land_in_cumulative_bands() {
        let table = scenario_table();
        assert_eq!(table.pick_unit(0.1).label, "A");
        assert_eq!(table.pick_unit(0.35).label, "B");
        assert_eq!(table.pick_unit(0.9).label, "Loss");
    }

    #[test]
    fn scripted_source_resolves_reproducibly() {
        let table = scenario_table();
        let mut rng = UnitDraws::new([0.1, 0.35, 0.9]);
        let picks: Vec<_> = (0..3)
            .map(|_| table.resolve(&mut rng).label.clone())
            .collect();
        assert_eq!(picks, ["A", "B", "Loss"]);
    }

    #[test]
    fn band_edges_belong_to_next_outcome() {
        let table = scenario_table();
        assert_eq!(table.pick_unit(0.0).label, "A");
        assert_eq!(table.pick_unit(0.3).label, "B");
        assert_eq!(table.pick_unit(0.5).label, "Loss");
        assert_eq!(table.pick_unit(0.999_999).label, "Loss");
    }

    #[test]
    fn unnormalized_weights_scale_by_total() {
        let table =
            WeightedTable::from_triples("raw", [("x", 3.0, ()), ("y", 1.0, ())]).unwrap();
        assert!((table.total_weight() - 4.0).abs() < f64::EPSILON);
        assert_eq!(table.pick_unit(0.74).label, "x");
        assert_eq!(table.pick_unit(0.76).label, "y");
        assert!((table.probability("y").unwrap() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn single_positive_outcome_always_wins() {
        let table = WeightedTable::from_triples(
            "single",
            [("never", 0.0, 0), ("only", 2.5, 1), ("also-never", 0.0, 2)],
        )
        .unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..1_000 {
            assert_eq!(table.resolve(&mut rng).payload, 1);
        }
        assert_eq!(table.pick_unit(0.0).payload, 1);
        assert_eq!(table.pick_unit(0.999_999_9).payload, 1);
    }

    #[test]
    fn zero_total_weight_is_invalid_configuration() {
        let err = WeightedTable::from_triples("zero", [("a", 0.0, ()), ("b", 0.0, ())])
            .unwrap_err();
        assert!(matches!(err, InvalidConfiguration::ZeroTotalWeight { .. }));

        let empty: Result<WeightedTable<()>, _> = WeightedTable::new("empty", Vec::new());
        assert!(matches!(empty, Err(InvalidConfiguration::Empty { .. })));
    }

    #[test]
    fn negative_and_non_finite_weights_are_rejected() {
        let negative = WeightedTable::from_triples("neg", [("a", -0.1, ()), ("b", 1.0, ())]);
        assert!(matches!(
            negative,
            Err(InvalidConfiguration::NegativeWeight { ref label, .. }) if label == "a"
        ));
        let nan = WeightedTable::from_triples("nan", [("a", f64::NAN, ())]);
        assert!(matches!(nan, Err(InvalidConfiguration::NonFiniteWeight { .. })));
    }

    #[test]
    fn overflowing_totals_are_rejected_on_both_paths() {
        let built =
            WeightedTable::from_triples("big", [("a", f64::MAX, ()), ("b", f64::MAX, ())]);
        assert!(matches!(
            built,
            Err(InvalidConfiguration::TotalOverflow { ref table }) if table == "big"
        ));

        let options = [("a", f64::MAX), ("b", f64::MAX)];
        let mut rng = SmallRng::seed_from_u64(8);
        assert!(matches!(
            resolve_weighted(&options, &mut rng),
            Err(InvalidConfiguration::TotalOverflow { .. })
        ));

        let near_limit = [("a", f64::MAX / 2.0), ("b", f64::MAX / 2.0)];
        let picked_a = (0..1_000)
            .filter(|_| *resolve_weighted(&near_limit, &mut rng).unwrap() == "a")
            .count();
        assert!((400..600).contains(&picked_a), "picked a {picked_a} times");
    }

    #[test]
    fn trace_records_roll_and_choice() {
        let table = scenario_table();
        let mut rng = UnitDraws::new([0.35]);
        let (chosen, trace) = table.resolve_with_trace(&mut rng);
        assert_eq!(chosen.label, "B");
        assert_eq!(trace.chosen_label, "B");
        assert_eq!(trace.chosen_index, 1);
        assert_eq!(trace.candidates.len(), 3);
        assert!((trace.roll - 0.35).abs() < 1e-9);

        let json = serde_json::to_string(&trace).expect("serialize");
        let restored: ResolutionTrace = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, trace);
    }

    #[test]
    fn inline_resolution_matches_first_band() {
        let options = [("coupon", 2.0), ("sticker", 1.0)];
        let mut rng = StepRng::new(0, 0);
        assert_eq!(*resolve_weighted(&options, &mut rng).unwrap(), "coupon");
        let zero = [("coupon", 0.0)];
        assert!(resolve_weighted(&zero, &mut rng).is_err());
    }

    #[test]
    fn map_preserves_weights() {
        let mapped = scenario_table().map(str::len);
        assert_eq!(mapped.pick_unit(0.9).payload, 4);
        assert!((mapped.total_weight() - 1.0).abs() < 1e-12);
    }
}
