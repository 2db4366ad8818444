//! Promotion records that decorate reward tables.
use std::sync::OnceLock;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{LOG_TARGET_PROMOTIONS, LOSS_DESCRIPTION, LOSS_TITLE, WHEEL_LOSS_STRIDE};

/// A prize offer as served by the promotions catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: u32,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Promotion {
    pub fn new(id: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            image_url: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Abstraction over where promotions come from.
/// Platform-specific implementations should provide this
pub trait PromotionSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the full promotions list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched or parsed.
    fn load_promotions(&self) -> Result<Vec<Promotion>, Self::Error>;
}

/// Source serving a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticPromotions(pub Vec<Promotion>);

impl PromotionSource for StaticPromotions {
    type Error = std::convert::Infallible;

    fn load_promotions(&self) -> Result<Vec<Promotion>, Self::Error> {
        Ok(self.0.clone())
    }
}

/// Built-in offers used when no catalog is reachable.
#[must_use]
pub fn default_promotions() -> &'static [Promotion] {
    static CATALOG: OnceLock<Vec<Promotion>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        [
            (1, "10% off", "Get 10% off your next purchase.", "10%"),
            (2, "Free delivery", "Free delivery on orders over 3000.", "Delivery"),
            (3, "1+1", "Buy one item, get a second of equal or lower price free.", "1+1"),
            (4, "20% off", "20% off selected items.", "20%"),
            (5, "Free dessert", "A free dessert with any main course.", "Dessert"),
            (6, "5% cashback", "5% back as points on your loyalty card.", "Cashback"),
            (7, "Secret gift", "A secret gift with your order.", "Gift"),
            (8, "500 coupon", "500 off your next purchase over 2000.", "500"),
            (9, "Double points", "Double loyalty points on this purchase.", "X2"),
            (10, "Free drink", "A free drink with any order.", "Drink"),
        ]
        .into_iter()
        .map(|(id, title, description, badge)| {
            Promotion::new(id, title, description)
                .with_image(format!("https://placehold.co/150?text={badge}"))
        })
        .collect()
    })
}

/// Load promotions, falling back to the built-in offers on failure or an
/// empty list.
pub fn load_or_default<P: PromotionSource + ?Sized>(source: &P) -> Vec<Promotion> {
    match source.load_promotions() {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => {
            log::warn!(target: LOG_TARGET_PROMOTIONS, "promotions list empty; using built-in offers");
            default_promotions().to_vec()
        }
        Err(err) => {
            log::warn!(target: LOG_TARGET_PROMOTIONS, "failed to load promotions: {err}; using built-in offers");
            default_promotions().to_vec()
        }
    }
}

/// Uniformly pick one promotion; `None` for an empty list.
pub fn pick_random_promotion<'a, R: Rng + ?Sized>(
    promotions: &'a [Promotion],
    rng: &mut R,
) -> Option<&'a Promotion> {
    if promotions.is_empty() {
        return None;
    }
    promotions.get(rng.gen_range(0..promotions.len()))
}

/// Slot on the wheel tape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TapeSlot {
    Win(Promotion),
    Loss {
        id: String,
        title: String,
        description: String,
    },
}

impl TapeSlot {
    fn loss(id: impl Into<String>) -> Self {
        Self::Loss {
            id: id.into(),
            title: LOSS_TITLE.to_string(),
            description: LOSS_DESCRIPTION.to_string(),
        }
    }

    #[must_use]
    pub const fn is_win(&self) -> bool {
        matches!(self, Self::Win(_))
    }
}

/// Interleave loss slots into a prize list: one after every second prize,
/// and always at least one.
#[must_use]
pub fn mix_with_losses(promotions: &[Promotion]) -> Vec<TapeSlot> {
    let mut tape = Vec::with_capacity(promotions.len() + promotions.len() / WHEEL_LOSS_STRIDE + 1);
    for (index, promotion) in promotions.iter().enumerate() {
        tape.push(TapeSlot::Win(promotion.clone()));
        if (index + 1) % WHEEL_LOSS_STRIDE == 0 {
            tape.push(TapeSlot::loss(format!("loss-{index}")));
        }
    }
    if !tape.iter().any(|slot| !slot.is_win()) {
        tape.push(TapeSlot::loss("loss-default"));
    }
    tape
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::fmt;

    #[derive(Debug)]
    struct Offline;

    impl fmt::Display for Offline {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("network unreachable")
        }
    }

    impl std::error::Error for Offline {}

    struct FailingSource;

    impl PromotionSource for FailingSource {
        type Error = Offline;

        fn load_promotions(&self) -> Result<Vec<Promotion>, Self::Error> {
            Err(Offline)
        }
    }

    #[test]
    fn promotion_json_matches_catalog_shape() {
        let json = r#"[{"id":3,"title":"1+1","description":"Bogo","image_url":"https://x/1.png"},
                       {"id":4,"title":"20% off","description":"Sale"}]"#;
        let list: Vec<Promotion> = serde_json::from_str(json).unwrap();
        assert_eq!(list[0].image_url.as_deref(), Some("https://x/1.png"));
        assert!(list[1].image_url.is_none());
    }

    #[test]
    fn failing_or_empty_sources_fall_back() {
        assert_eq!(load_or_default(&FailingSource).len(), 10);
        assert_eq!(load_or_default(&StaticPromotions::default()).len(), 10);
        let custom = StaticPromotions(vec![Promotion::new(42, "Only", "One")]);
        assert_eq!(load_or_default(&custom).len(), 1);
    }

    #[test]
    fn mix_inserts_loss_after_every_second_prize() {
        let tape = mix_with_losses(&default_promotions()[..5]);
        let kinds: Vec<bool> = tape.iter().map(TapeSlot::is_win).collect();
        assert_eq!(kinds, [true, true, false, true, true, false, true]);
    }

    #[test]
    fn mix_always_contains_a_loss() {
        let tape = mix_with_losses(&default_promotions()[..1]);
        assert_eq!(tape.len(), 2);
        assert!(matches!(&tape[1], TapeSlot::Loss { id, .. } if id == "loss-default"));
        assert_eq!(mix_with_losses(&[]).len(), 1);
    }

    #[test]
    fn random_pick_handles_empty() {
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(pick_random_promotion(&[], &mut rng).is_none());
        let picked = pick_random_promotion(default_promotions(), &mut rng).unwrap();
        assert!((1..=10).contains(&picked.id));
    }
}
