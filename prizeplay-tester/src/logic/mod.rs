pub mod fairness;
pub mod reports;
pub mod seeds;
pub mod tester;

pub use seeds::{SeedInfo, resolve_seed_inputs};
pub use tester::{AuditResult, FairnessTester};
