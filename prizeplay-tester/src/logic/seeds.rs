use anyhow::{Context, Result, bail};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const DEFAULT_SEED: u64 = 1337;

/// A seed plus the token it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub label: String,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self {
            seed,
            label: seed.to_string(),
        }
    }
}

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^0[xX]([0-9a-fA-F][0-9a-fA-F_]*)$").expect("hex seed pattern compiles")
    })
}

/// Resolve CLI seed tokens: decimal integers (negative values use their
/// magnitude) and `0x`-prefixed hex. Duplicates collapse; an empty list
/// falls back to [`DEFAULT_SEED`].
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let seed = if let Some(caps) = hex_pattern().captures(token) {
            let digits = caps[1].replace('_', "");
            u64::from_str_radix(&digits, 16)
                .with_context(|| format!("hex seed out of range: {token}"))?
        } else if let Ok(value) = token.parse::<u64>() {
            value
        } else if let Ok(value) = token.parse::<i64>() {
            value.unsigned_abs()
        } else {
            bail!("Unrecognized seed token: {token}");
        };

        if seen.insert(seed) {
            seeds.push(SeedInfo {
                seed,
                label: token.to_string(),
            });
        }
    }

    if seeds.is_empty() {
        seeds.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_decimal_hex_and_negative() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "0xBEEF", "-7", "0x00C0_FFEE"])).unwrap();
        let values: Vec<u64> = seeds.iter().map(|s| s.seed).collect();
        assert_eq!(values, [42, 0xBEEF, 7, 0x00C0_FFEE]);
        assert_eq!(seeds[1].label, "0xBEEF");
    }

    #[test]
    fn duplicates_collapse_and_empty_defaults() {
        let seeds = resolve_seed_inputs(&tokens(&["48879", "0xbeef"])).unwrap();
        assert_eq!(seeds.len(), 1);
        let fallback = resolve_seed_inputs(&[]).unwrap();
        assert_eq!(fallback, vec![SeedInfo::from_numeric(DEFAULT_SEED)]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(resolve_seed_inputs(&tokens(&["lucky"])).is_err());
        assert!(resolve_seed_inputs(&tokens(&["0x1_0000_0000_0000_0000"])).is_err());
    }
}
