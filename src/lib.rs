//! Single-replacement reaction prediction and equation balancing.
//!
//! Formulas are parsed into element counts, compounds are split into their
//! cation and anion, charges are inferred from the bundled reference tables,
//! and the activity series / halogen order decide whether a replacement
//! happens. Equations are balanced over exact rationals.

mod parse;
pub use parse::*;

mod tables;
pub use tables::*;

mod classify;
pub use classify::*;

mod charge;
pub use charge::*;

mod rules;
pub use rules::*;

mod predict;
pub use predict::*;

mod balance;
pub use balance::*;

use std::str::FromStr;
use tracing::Level;

/// Install a `tracing` subscriber printing events at `level` and above.
///
/// Accepts the usual level names (`"trace"`, `"debug"`, `"info"`, `"warn"`,
/// `"error"`, case-insensitive). Anything else falls back to `info`.
/// Calling this more than once is harmless: only the first call installs a
/// subscriber.
pub fn init_logging(level: &str) {
    let level = Level::from_str(level.trim()).unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
