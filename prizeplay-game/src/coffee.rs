//! Coffee maker: timed orders drawn at random, assembled from ingredients
//! and judged against the recipe.
//!
//! Money, reputation, the served count and streaks live in the ledger. The
//! pending order and the cup are transient and are only cleared once the
//! result of a serve has been persisted.

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::constants::{
    COFFEE_CUP_CAPACITY, COFFEE_GRACE_LEVEL, COFFEE_MAX_REPUTATION, COFFEE_SERVE_REPUTATION,
    COFFEE_SERVED_PER_LEVEL, COFFEE_STARTING_MONEY, COFFEE_STARTING_REPUTATION,
    COFFEE_TIMEOUT_PENALTY, COFFEE_TIP_PER_SECOND, COFFEE_WRONG_RECIPE_PENALTY,
    COUNTER_BEST_STREAK, COUNTER_MONEY, COUNTER_REPUTATION, COUNTER_SERVED, COUNTER_STREAK,
    LOG_TARGET_COFFEE,
};
use crate::ledger::{LedgerError, LedgerStorage, ProgressLedger};
use crate::resolver::{InvalidConfiguration, resolve_weighted};

#[derive(Debug, Error)]
pub enum CoffeeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Config(#[from] InvalidConfiguration),
    #[error("a customer is already waiting")]
    OrderPending,
    #[error("no customer is waiting")]
    NoOrder,
    #[error("the cup already holds {capacity} ingredients")]
    CupFull { capacity: usize },
    #[error("reputation has run out")]
    OutOfBusiness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ingredient {
    Coffee,
    Milk,
    Water,
    Foam,
    Chocolate,
    Caramel,
    Ice,
    Cream,
}

impl Ingredient {
    pub const ALL: [Self; 8] = [
        Self::Coffee,
        Self::Milk,
        Self::Water,
        Self::Foam,
        Self::Chocolate,
        Self::Caramel,
        Self::Ice,
        Self::Cream,
    ];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Coffee => "coffee",
            Self::Milk => "milk",
            Self::Water => "water",
            Self::Foam => "foam",
            Self::Chocolate => "chocolate",
            Self::Caramel => "caramel",
            Self::Ice => "ice",
            Self::Cream => "cream",
        }
    }
}

type Cup = SmallVec<[Ingredient; COFFEE_CUP_CAPACITY]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub id: &'static str,
    pub ingredients: &'static [Ingredient],
    pub price: i64,
}

impl Recipe {
    /// Whether `cup` holds exactly these ingredients, in any order.
    #[must_use]
    pub fn matches(&self, cup: &[Ingredient]) -> bool {
        if cup.len() != self.ingredients.len() {
            return false;
        }
        let mut wanted: Cup = self.ingredients.iter().copied().collect();
        let mut poured: Cup = cup.iter().copied().collect();
        wanted.sort_unstable();
        poured.sort_unstable();
        wanted == poured
    }
}

const fn recipe(id: &'static str, ingredients: &'static [Ingredient], price: i64) -> Recipe {
    Recipe {
        id,
        ingredients,
        price,
    }
}

pub const RECIPES: [Recipe; 8] = [
    recipe("espresso", &[Ingredient::Coffee], 30),
    recipe("americano", &[Ingredient::Coffee, Ingredient::Water], 40),
    recipe("latte", &[Ingredient::Coffee, Ingredient::Milk], 50),
    recipe(
        "cappuccino",
        &[Ingredient::Coffee, Ingredient::Milk, Ingredient::Foam],
        60,
    ),
    recipe(
        "mocha",
        &[Ingredient::Coffee, Ingredient::Milk, Ingredient::Chocolate],
        70,
    ),
    recipe(
        "caramel_latte",
        &[Ingredient::Coffee, Ingredient::Milk, Ingredient::Caramel],
        80,
    ),
    recipe(
        "iced_coffee",
        &[Ingredient::Coffee, Ingredient::Ice, Ingredient::Milk],
        65,
    ),
    recipe(
        "hot_chocolate",
        &[Ingredient::Milk, Ingredient::Chocolate, Ingredient::Cream],
        55,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Patience {
    High,
    Medium,
    Low,
}

impl Patience {
    #[must_use]
    pub const fn seconds(self) -> u64 {
        match self {
            Self::High => 45,
            Self::Medium => 30,
            Self::Low => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub name: &'static str,
    pub patience: Patience,
}

const fn customer(name: &'static str, patience: Patience) -> Customer {
    Customer { name, patience }
}

pub const CUSTOMERS: [Customer; 8] = [
    customer("Anna", Patience::High),
    customer("Boris", Patience::Medium),
    customer("Viktor", Patience::Low),
    customer("Galina", Patience::High),
    customer("Denis", Patience::Medium),
    customer("Elena", Patience::Low),
    customer("Zhora", Patience::Medium),
    customer("Zina", Patience::High),
];

/// A waiting customer and the drink they asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Order {
    pub recipe: Recipe,
    pub customer: Customer,
    pub placed_at_ms: u64,
    pub deadline_ms: u64,
}

impl Order {
    #[must_use]
    pub const fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.deadline_ms.saturating_sub(now_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ServeOutcome {
    Served {
        recipe: &'static str,
        price: i64,
        tip: i64,
    },
    WrongRecipe {
        recipe: &'static str,
        penalty: i64,
    },
    TimedOut {
        penalty: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoffeeStats {
    pub money: i64,
    pub reputation: i64,
    pub served: i64,
    pub streak: i64,
    pub best_streak: i64,
    pub level: i64,
}

#[derive(Debug)]
pub struct CoffeeShop<S: LedgerStorage> {
    ledger: ProgressLedger<S>,
    order: Option<Order>,
    cup: Cup,
}

impl<S: LedgerStorage> CoffeeShop<S> {
    /// # Errors
    ///
    /// Returns an error if the starting stats cannot be persisted.
    pub fn new(mut ledger: ProgressLedger<S>) -> Result<Self, CoffeeError> {
        seed_stats(&mut ledger)?;
        Ok(Self {
            ledger,
            order: None,
            cup: Cup::new(),
        })
    }

    #[must_use]
    pub const fn ledger(&self) -> &ProgressLedger<S> {
        &self.ledger
    }

    #[must_use]
    pub const fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    #[must_use]
    pub fn cup(&self) -> &[Ingredient] {
        &self.cup
    }

    #[must_use]
    pub fn level(&self) -> i64 {
        self.ledger.get(COUNTER_SERVED).max(0) / COFFEE_SERVED_PER_LEVEL + 1
    }

    #[must_use]
    pub fn stats(&self) -> CoffeeStats {
        CoffeeStats {
            money: self.ledger.get(COUNTER_MONEY),
            reputation: self.ledger.get(COUNTER_REPUTATION),
            served: self.ledger.get(COUNTER_SERVED),
            streak: self.ledger.get(COUNTER_STREAK),
            best_streak: self.ledger.get(COUNTER_BEST_STREAK),
            level: self.level(),
        }
    }

    #[must_use]
    pub fn is_out_of_business(&self) -> bool {
        self.ledger.get(COUNTER_REPUTATION) <= 0
    }

    /// Patience plus a grace period that shrinks as the level grows.
    fn time_limit_ms(&self, patience: Patience) -> u64 {
        let grace = u64::try_from((COFFEE_GRACE_LEVEL - self.level()).max(0)).unwrap_or(0);
        (patience.seconds() + grace) * 1_000
    }

    /// Seat a random customer with a random drink, both drawn uniformly.
    ///
    /// # Errors
    ///
    /// Returns [`CoffeeError::OrderPending`] while a customer waits and
    /// [`CoffeeError::OutOfBusiness`] once reputation is gone.
    pub fn take_order<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now_ms: u64,
    ) -> Result<&Order, CoffeeError> {
        if self.order.is_some() {
            return Err(CoffeeError::OrderPending);
        }
        if self.is_out_of_business() {
            return Err(CoffeeError::OutOfBusiness);
        }
        let recipes: Vec<(&Recipe, f64)> = RECIPES.iter().map(|r| (r, 1.0)).collect();
        let customers: Vec<(&Customer, f64)> = CUSTOMERS.iter().map(|c| (c, 1.0)).collect();
        let recipe = **resolve_weighted(&recipes, rng)?;
        let customer = **resolve_weighted(&customers, rng)?;
        let limit_ms = self.time_limit_ms(customer.patience);
        log::debug!(
            target: LOG_TARGET_COFFEE,
            "{} orders {} with {limit_ms} ms to spare",
            customer.name,
            recipe.id
        );
        self.cup.clear();
        let order = self.order.insert(Order {
            recipe,
            customer,
            placed_at_ms: now_ms,
            deadline_ms: now_ms.saturating_add(limit_ms),
        });
        Ok(&*order)
    }

    /// Pour one ingredient, returning how many the cup now holds.
    ///
    /// # Errors
    ///
    /// Returns an error without an order or once the cup is full.
    pub fn add_ingredient(&mut self, ingredient: Ingredient) -> Result<usize, CoffeeError> {
        if self.order.is_none() {
            return Err(CoffeeError::NoOrder);
        }
        if self.cup.len() >= COFFEE_CUP_CAPACITY {
            return Err(CoffeeError::CupFull {
                capacity: COFFEE_CUP_CAPACITY,
            });
        }
        self.cup.push(ingredient);
        Ok(self.cup.len())
    }

    pub fn remove_last(&mut self) -> Option<Ingredient> {
        self.cup.pop()
    }

    pub fn clear_cup(&mut self) {
        self.cup.clear();
    }

    /// Hand the cup over and settle the order.
    ///
    /// A serve at or past the deadline counts as the customer walking out.
    ///
    /// # Errors
    ///
    /// Returns [`CoffeeError::NoOrder`] when nobody is waiting, or a ledger
    /// error, in which case the order and cup are kept.
    pub fn serve(&mut self, now_ms: u64) -> Result<ServeOutcome, CoffeeError> {
        let order = self.order.ok_or(CoffeeError::NoOrder)?;
        if now_ms >= order.deadline_ms {
            return self.walk_out();
        }
        let outcome = if order.recipe.matches(&self.cup) {
            let seconds_left = order.remaining_ms(now_ms).div_ceil(1_000);
            let tip = i64::try_from(seconds_left)
                .unwrap_or(i64::MAX)
                .saturating_mul(COFFEE_TIP_PER_SECOND);
            let earned = order.recipe.price.saturating_add(tip);
            self.ledger.transaction(|ledger| {
                ledger.add(COUNTER_MONEY, earned)?;
                ledger.add_clamped(
                    COUNTER_REPUTATION,
                    COFFEE_SERVE_REPUTATION,
                    0,
                    COFFEE_MAX_REPUTATION,
                )?;
                ledger.add(COUNTER_SERVED, 1)?;
                let streak = ledger.add(COUNTER_STREAK, 1)?;
                if streak > ledger.get(COUNTER_BEST_STREAK) {
                    ledger.set(COUNTER_BEST_STREAK, streak)?;
                }
                Ok::<_, LedgerError>(())
            })?;
            ServeOutcome::Served {
                recipe: order.recipe.id,
                price: order.recipe.price,
                tip,
            }
        } else {
            self.penalize(COFFEE_WRONG_RECIPE_PENALTY)?;
            ServeOutcome::WrongRecipe {
                recipe: order.recipe.id,
                penalty: COFFEE_WRONG_RECIPE_PENALTY,
            }
        };
        self.order = None;
        self.cup.clear();
        log::info!(target: LOG_TARGET_COFFEE, "{} served: {outcome:?}", order.customer.name);
        Ok(outcome)
    }

    /// Settle a pending order whose deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns an error if the penalty cannot be persisted.
    pub fn expire_overdue(&mut self, now_ms: u64) -> Result<Option<ServeOutcome>, CoffeeError> {
        match self.order {
            Some(order) if now_ms >= order.deadline_ms => self.walk_out().map(Some),
            _ => Ok(None),
        }
    }

    /// Back to the starting stats.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be cleared or reseeded.
    pub fn reset(&mut self) -> Result<(), CoffeeError> {
        self.ledger.reset()?;
        seed_stats(&mut self.ledger)?;
        self.order = None;
        self.cup.clear();
        Ok(())
    }

    fn walk_out(&mut self) -> Result<ServeOutcome, CoffeeError> {
        self.penalize(COFFEE_TIMEOUT_PENALTY)?;
        if let Some(order) = self.order.take() {
            log::info!(target: LOG_TARGET_COFFEE, "{} left without a drink", order.customer.name);
        }
        self.cup.clear();
        Ok(ServeOutcome::TimedOut {
            penalty: COFFEE_TIMEOUT_PENALTY,
        })
    }

    fn penalize(&mut self, penalty: i64) -> Result<(), LedgerError> {
        self.ledger.transaction(|ledger| {
            ledger.add_clamped(COUNTER_REPUTATION, -penalty, 0, COFFEE_MAX_REPUTATION)?;
            ledger.set(COUNTER_STREAK, 0)?;
            Ok(())
        })
    }
}

fn seed_stats<S: LedgerStorage>(ledger: &mut ProgressLedger<S>) -> Result<(), LedgerError> {
    ledger.transaction(|ledger| {
        ledger.ensure(COUNTER_MONEY, COFFEE_STARTING_MONEY)?;
        ledger.ensure(COUNTER_REPUTATION, COFFEE_STARTING_REPUTATION)?;
        Ok(())
    })
}
