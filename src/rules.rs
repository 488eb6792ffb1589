use crate::{Formula, ReferenceTables};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::*;

/// Symbols ordered by reactivity, most reactive first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactivityOrder(Vec<String>);

impl ReactivityOrder {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(symbols.into_iter().map(Into::into).collect())
    }

    pub fn index(&self, symbol: &str) -> Option<usize> {
        self.0.iter().position(|s| s == symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index(symbol).is_some()
    }

    /// Whether `a` is at least as reactive as `b`. `None` if either symbol is
    /// not in the ordering.
    pub fn at_least_as_reactive(&self, a: &str, b: &str) -> Option<bool> {
        Some(self.index(a)? <= self.index(b)?)
    }

    /// Whether `a` is strictly more reactive than `b`.
    pub fn more_reactive(&self, a: &str, b: &str) -> Option<bool> {
        Some(self.index(a)? < self.index(b)?)
    }

    pub fn symbols(&self) -> &[String] {
        &self.0
    }
}

/// Solubility of an ionic compound in water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Solubility {
    Soluble,
    Insoluble,
}

impl Solubility {
    /// State symbol used when writing equations.
    pub fn state(&self) -> &'static str {
        match self {
            Solubility::Soluble => "(aq)",
            Solubility::Insoluble => "(s)",
        }
    }
}

impl Display for Solubility {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Solubility::Soluble => write!(f, "soluble"),
            Solubility::Insoluble => write!(f, "insoluble"),
        }
    }
}

/// Ion series and exception compounds used by [`ReferenceTables::solubility`].
/// Exceptions are stored as compositions so `PbCl2` and `Pb(Cl)2` compare equal.
#[derive(Debug, Clone)]
pub struct SolubilityRules {
    pub(crate) soluble_ions: Vec<String>,
    pub(crate) soluble_exceptions: Vec<BTreeMap<String, u32>>,
    pub(crate) insoluble_ions: Vec<String>,
    pub(crate) insoluble_exceptions: Vec<BTreeMap<String, u32>>,
}

impl ReferenceTables {
    pub fn activity_index(&self, symbol: &str) -> Option<usize> {
        self.activity_series().index(symbol)
    }

    pub fn halogen_index(&self, symbol: &str) -> Option<usize> {
        self.halogen_order().index(symbol)
    }

    pub fn is_halogen(&self, symbol: &str) -> bool {
        self.halogen_order().contains(symbol)
    }

    pub fn in_activity_series(&self, symbol: &str) -> bool {
        self.activity_series().contains(symbol)
    }

    pub fn reacts_with_cold_water(&self, symbol: &str) -> bool {
        self.cold_water_metals().contains(symbol)
    }

    /// Classify an ionic compound with the common solubility rules.
    ///
    /// Checked in order: insoluble exceptions to the soluble series, then
    /// membership of the cation or anion in the soluble series, then soluble
    /// exceptions to the insoluble series, then the insoluble series.
    /// Returns `None` when no rule applies or the formula is not a salt.
    pub fn solubility(&self, formula: &Formula) -> Option<Solubility> {
        let rules = self.solubility_rules();
        let counts = formula.counts();
        if rules.soluble_exceptions.iter().any(|c| c == counts) {
            return Some(Solubility::Insoluble);
        }

        let (cation, anion) = self.split_cation_anion(formula.raw()).ok()?;
        if anion.is_empty() {
            return None;
        }
        let in_series = |series: &[String]| series.iter().any(|s| *s == cation || *s == anion);

        let verdict = if in_series(&rules.soluble_ions) {
            Some(Solubility::Soluble)
        } else if rules.insoluble_exceptions.iter().any(|c| c == counts) {
            Some(Solubility::Soluble)
        } else if in_series(&rules.insoluble_ions) {
            Some(Solubility::Insoluble)
        } else {
            None
        };
        trace!("solubility of {} ({} / {}): {:?}", formula, cation, anion, verdict);
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactivity_order() {
        let order = ReactivityOrder::new(["F", "Cl", "Br", "I"]);
        assert_eq!(order.index("Br"), Some(2));
        assert_eq!(order.at_least_as_reactive("Cl", "Br"), Some(true));
        assert_eq!(order.at_least_as_reactive("Cl", "Cl"), Some(true));
        assert_eq!(order.more_reactive("Cl", "Cl"), Some(false));
        assert_eq!(order.at_least_as_reactive("I", "F"), Some(false));
        assert_eq!(order.at_least_as_reactive("Xe", "F"), None);
    }

    #[test]
    fn test_standard_orderings() {
        let tables = ReferenceTables::standard();
        assert!(tables.activity_index("Zn") < tables.activity_index("Cu"));
        assert!(tables.activity_index("Mg") < tables.activity_index("H"));
        assert!(tables.activity_index("Ag") > tables.activity_index("H"));
        assert!(tables.is_halogen("Cl"));
        assert!(!tables.is_halogen("H"));
        assert_eq!(tables.halogen_index("F"), Some(0));
        assert!(tables.in_activity_series("H"));
        assert!(tables.reacts_with_cold_water("K"));
        assert!(!tables.reacts_with_cold_water("Mg"));
    }

    #[test]
    fn test_solubility() {
        let tables = ReferenceTables::standard();
        let solubility = |raw: &str| tables.solubility(&Formula::parse(raw).unwrap());

        assert_eq!(solubility("NaCl"), Some(Solubility::Soluble));
        assert_eq!(solubility("ZnSO4"), Some(Solubility::Soluble));
        assert_eq!(solubility("Cu(NO3)2"), Some(Solubility::Soluble));
        assert_eq!(solubility("AgCl"), Some(Solubility::Insoluble));
        assert_eq!(solubility("BaSO4"), Some(Solubility::Insoluble));
        assert_eq!(solubility("Ca(OH)2"), Some(Solubility::Insoluble));
        assert_eq!(solubility("CaCO3"), Some(Solubility::Insoluble));
        assert_eq!(solubility("Ba(OH)2"), Some(Solubility::Soluble));
        assert_eq!(solubility("Na2CO3"), Some(Solubility::Soluble));
        assert_eq!(solubility("CuS"), None);
        assert_eq!(solubility("Cu"), None);
        assert_eq!(Solubility::Insoluble.state(), "(s)");
    }
}
