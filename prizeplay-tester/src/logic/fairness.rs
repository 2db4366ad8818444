//! Chi-squared goodness-of-fit audits for reward tables.

use prizeplay_game::WeightedTable;
use prizeplay_game::numbers::usize_to_f64;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper-tail standard normal quantile used for the critical value (alpha = 1e-4).
pub const Z_CRITICAL: f64 = 3.719;

/// Observed versus expected frequency for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub label: String,
    pub probability: f64,
    pub expected: f64,
    pub observed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessAudit {
    pub table_id: String,
    pub draws: usize,
    pub chi_squared: f64,
    pub degrees_of_freedom: usize,
    pub critical_value: f64,
    pub passed: bool,
    pub outcomes: Vec<OutcomeTally>,
}

/// Wilson-Hilferty approximation of the chi-squared quantile for `z`.
#[must_use]
pub fn critical_value(degrees_of_freedom: usize, z: f64) -> f64 {
    if degrees_of_freedom == 0 {
        return 0.0;
    }
    let df = usize_to_f64(degrees_of_freedom);
    let k = 2.0 / (9.0 * df);
    df * (1.0 - k + z * k.sqrt()).powi(3)
}

/// Resolve `draws` outcomes from `table` and test the tallies against its weights.
pub fn audit_table<T, R: Rng + ?Sized>(
    table: &WeightedTable<T>,
    rng: &mut R,
    draws: usize,
) -> FairnessAudit {
    let mut counts = vec![0_usize; table.len()];
    for _ in 0..draws {
        let (_, trace) = table.resolve_with_trace(rng);
        counts[trace.chosen_index] += 1;
    }

    let total_draws = usize_to_f64(draws);
    let outcomes: Vec<OutcomeTally> = table
        .outcomes()
        .iter()
        .zip(&counts)
        .map(|(outcome, &observed)| {
            let probability = outcome.weight / table.total_weight();
            OutcomeTally {
                label: outcome.label.clone(),
                probability,
                expected: probability * total_draws,
                observed,
            }
        })
        .collect();

    let live: Vec<&OutcomeTally> = outcomes.iter().filter(|o| o.probability > 0.0).collect();
    let dead_hits = outcomes
        .iter()
        .any(|o| o.probability <= 0.0 && o.observed > 0);
    let chi_squared: f64 = live
        .iter()
        .map(|o| {
            let diff = usize_to_f64(o.observed) - o.expected;
            diff * diff / o.expected
        })
        .sum();
    let degrees_of_freedom = live.len().saturating_sub(1);
    let critical = critical_value(degrees_of_freedom, Z_CRITICAL);
    let passed = draws > 0 && !dead_hits && (degrees_of_freedom == 0 || chi_squared < critical);

    FairnessAudit {
        table_id: table.id().to_string(),
        draws,
        chi_squared,
        degrees_of_freedom,
        critical_value: critical,
        passed,
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::mock::StepRng;
    use rand_chacha::ChaCha20Rng;

    fn scenario() -> WeightedTable<()> {
        WeightedTable::from_triples("scenario", [("A", 0.3, ()), ("B", 0.2, ()), ("Loss", 0.5, ())])
            .unwrap()
    }

    #[test]
    fn critical_values_stay_just_above_reference_quantiles() {
        // Tabulated chi2 quantiles at 0.9999.
        for (df, reference) in [(1, 15.137), (2, 18.421), (10, 35.564)] {
            let approx = critical_value(df, Z_CRITICAL);
            assert!(approx >= reference && approx < reference * 1.1, "df {df}: {approx}");
        }
        assert!(critical_value(0, Z_CRITICAL).abs() < f64::EPSILON);
    }

    #[test]
    fn seeded_draws_pass() {
        let mut rng = ChaCha20Rng::seed_from_u64(1337);
        let audit = audit_table(&scenario(), &mut rng, 10_000);
        assert!(audit.passed, "{audit:?}");
        assert_eq!(audit.degrees_of_freedom, 2);
        assert_eq!(audit.outcomes.iter().map(|o| o.observed).sum::<usize>(), 10_000);
    }

    #[test]
    fn stuck_source_fails() {
        let mut rng = StepRng::new(0, 0);
        let audit = audit_table(&scenario(), &mut rng, 10_000);
        assert!(!audit.passed);
        assert_eq!(audit.outcomes[0].observed, 10_000);
    }
}
