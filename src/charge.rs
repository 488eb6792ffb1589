use crate::ReferenceTables;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChargeError {
    #[error("unknown anion charge for {0}")]
    UnknownAnion(String),
    #[error("cannot infer a cation charge for {0}")]
    CationNotInferable(String),
    #[error("{0} has zero charge")]
    ZeroCharge(String),
}

/// Group defaults for cations that are missing from the charge table.
/// Elements with several common oxidation states either carry their own
/// entry here or are left out entirely.
fn group_cation_charge(symbol: &str) -> Option<i32> {
    let charge = match symbol {
        "H" | "Li" | "Na" | "K" | "Rb" | "Cs" | "Fr" => 1,
        "Be" | "Mg" | "Ca" | "Sr" | "Ba" | "Ra" => 2,
        "Tl" => 1,
        "B" | "Al" | "Ga" | "In" => 3,
        "Sn" | "Pb" => 2,
        "C" | "Si" | "Ge" => 4,
        "N" | "P" | "As" | "Sb" | "Bi" => 3,
        "Zn" | "Cd" | "Hg" => 2,
        _ => return None,
    };
    Some(charge)
}

fn element_anion_charge(symbol: &str) -> Option<i32> {
    match symbol {
        "F" | "Cl" | "Br" | "I" | "At" => Some(-1),
        "O" | "S" => Some(-2),
        _ => None,
    }
}

impl ReferenceTables {
    /// The usual positive charge of `symbol` as a cation.
    ///
    /// Looks in the charge table, then the positive polyatomic ions, then
    /// falls back to periodic-group defaults. Charge-ambiguous transition
    /// metals that are not in the table give `None`.
    pub fn cation_charge(&self, symbol: &str) -> Option<i32> {
        let charge = self
            .listed_cation_charge(symbol)
            .or_else(|| self.polyatomic(symbol).filter(|ion| ion.is_cation()).map(|ion| ion.charge))
            .or_else(|| group_cation_charge(symbol));
        if charge.is_none() {
            debug!("No cation charge known for {}", symbol);
        }
        charge
    }

    /// Like [`ReferenceTables::cation_charge`], for callers that cannot
    /// continue without a charge.
    pub fn require_cation_charge(&self, symbol: &str) -> Result<i32, ChargeError> {
        self.cation_charge(symbol)
            .ok_or_else(|| ChargeError::CationNotInferable(symbol.to_string()))
    }

    /// The charge of `symbol` as an anion.
    ///
    /// # Arguments
    ///
    /// * `symbol` - an element symbol or polyatomic key, e.g. `Cl` or `NO3`.
    ///
    /// # Returns
    ///
    /// The negative charge, or [`ChargeError::UnknownAnion`] if neither the
    /// tables nor the halogen/chalcogen defaults cover the symbol.
    pub fn anion_charge(&self, symbol: &str) -> Result<i32, ChargeError> {
        if let Some(charge) = self.listed_anion_charge(symbol) {
            return Ok(charge);
        }
        if let Some(ion) = self.polyatomic(symbol) {
            return Ok(ion.charge);
        }
        if self.is_element(symbol) {
            if let Some(charge) = element_anion_charge(symbol) {
                return Ok(charge);
            }
        }
        Err(ChargeError::UnknownAnion(symbol.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cation_charge_from_table() {
        let tables = ReferenceTables::standard();
        assert_eq!(tables.cation_charge("Na"), Some(1));
        assert_eq!(tables.cation_charge("Al"), Some(3));
        assert_eq!(tables.cation_charge("Cu"), Some(2));
        assert_eq!(tables.cation_charge("Ag"), Some(1));
        assert_eq!(tables.cation_charge("NH4"), Some(1));
    }

    #[test]
    fn test_cation_charge_heuristics() {
        let tables = ReferenceTables::standard();
        assert_eq!(tables.cation_charge("Ra"), Some(2));
        assert_eq!(tables.cation_charge("Ga"), Some(3));
        assert_eq!(tables.cation_charge("Tl"), Some(1));
        assert_eq!(tables.cation_charge("Ge"), Some(4));
        assert_eq!(tables.cation_charge("Cd"), Some(2));
        assert_eq!(tables.cation_charge("Bi"), Some(3));
        assert_eq!(tables.cation_charge("Cr"), None);
        assert_eq!(tables.cation_charge("Au"), None);
    }

    #[test]
    fn test_polyatomic_cation_only() {
        let tables = ReferenceTables::from_csv(
            "symbol,formula,charge,name\nNH4,NH4,1,ammonium\nSO4,SO4,-2,sulfate\n",
            "role,symbol,charge\n",
        )
        .unwrap();
        assert_eq!(tables.cation_charge("NH4"), Some(1));
        assert_eq!(tables.cation_charge("SO4"), None);
    }

    #[test]
    fn test_require_cation_charge() {
        let tables = ReferenceTables::standard();
        assert_eq!(tables.require_cation_charge("Zn"), Ok(2));
        assert_eq!(
            tables.require_cation_charge("Pt"),
            Err(ChargeError::CationNotInferable("Pt".to_string()))
        );
    }

    #[test]
    fn test_anion_charge() {
        let tables = ReferenceTables::standard();
        assert_eq!(tables.anion_charge("Cl"), Ok(-1));
        assert_eq!(tables.anion_charge("N"), Ok(-3));
        assert_eq!(tables.anion_charge("SO4"), Ok(-2));
        assert_eq!(tables.anion_charge("NO2"), Ok(-1));
        assert_eq!(tables.anion_charge("Cr2O7"), Ok(-2));
        assert_eq!(tables.anion_charge("At"), Ok(-1));
        assert_eq!(
            tables.anion_charge("Se"),
            Err(ChargeError::UnknownAnion("Se".to_string()))
        );
        assert_eq!(
            tables.anion_charge("Xyz"),
            Err(ChargeError::UnknownAnion("Xyz".to_string()))
        );
    }
}
