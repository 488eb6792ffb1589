//! Static chemical reference data: element symbols, polyatomic ions, charge
//! tables, reactivity orderings and solubility rules.
//!
//! The bundled tables are compiled into the crate and parsed once. Callers
//! that need different data can build their own [`ReferenceTables`] from CSV
//! text and override the orderings.

use crate::{Formula, FormulaError, ReactivityOrder, SolubilityRules};
use csv::{ReaderBuilder, StringRecord, Trim};
use lazy_static::lazy_static;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to read reference table: {0}")]
    Csv(#[from] csv::Error),
    #[error("{table} table, line {line}: missing or invalid {field} '{value}'")]
    Field {
        table: &'static str,
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("invalid composition for {symbol}: {source}")]
    Formula {
        symbol: String,
        #[source]
        source: FormulaError,
    },
    #[error("unknown charge role '{0}' (expected cation or anion)")]
    InvalidRole(String),
    #[error("charge {charge} has the wrong sign for {role} {symbol}")]
    InvalidCharge {
        role: String,
        symbol: String,
        charge: i32,
    },
}

/// Every element symbol through oganesson.
pub const ELEMENT_SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Metals by decreasing tendency to be oxidized. Hydrogen is listed as `H`
/// so acids can be compared against it.
pub const ACTIVITY_SERIES: [&str; 26] = [
    "Li", "Rb", "K", "Cs", "Ba", "Sr", "Ca", "Na", "Mg", "Al", "Mn", "Zn", "Cr", "Fe", "Cd", "Co",
    "Ni", "Sn", "Pb", "H", "Cu", "Hg", "Ag", "Pd", "Pt", "Au",
];

/// Halogens, most reactive first.
pub const HALOGEN_ORDER: [&str; 5] = ["F", "Cl", "Br", "I", "At"];

/// Metals that displace hydrogen from cold water.
pub const COLD_WATER_METALS: [&str; 8] = ["Li", "Na", "K", "Rb", "Cs", "Ca", "Sr", "Ba"];

/// Ions whose salts are generally soluble.
pub const SOLUBLE_IONS: [&str; 12] = [
    "Li", "Na", "K", "Rb", "Cs", "NH4", "NO3", "CH3COO", "Cl", "Br", "I", "SO4",
];

/// Salts of [`SOLUBLE_IONS`] that are nonetheless insoluble.
pub const SOLUBLE_EXCEPTIONS: [&str; 13] = [
    "AgCl", "AgBr", "AgI", "Hg2Cl2", "Hg2Br2", "Hg2I2", "PbCl2", "PbBr2", "PbI2", "Hg2SO4",
    "PbSO4", "SrSO4", "BaSO4",
];

/// Ions whose salts are generally insoluble.
pub const INSOLUBLE_IONS: [&str; 3] = ["CO3", "PO4", "OH"];

/// Salts of [`INSOLUBLE_IONS`] that are nonetheless soluble.
pub const INSOLUBLE_EXCEPTIONS: [&str; 20] = [
    "Li2CO3", "Li3PO4", "Na2CO3", "Na3PO4", "K2CO3", "K3PO4", "Rb2CO3", "Rb3PO4", "Cs2CO3",
    "Cs3PO4", "(NH4)2CO3", "(NH4)3PO4", "LiOH", "NaOH", "KOH", "RbOH", "CsOH", "NH4OH",
    "Sr(OH)2", "Ba(OH)2",
];

/// A charged species from the reference tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ion {
    pub symbol: String,
    /// Exact element counts of one unit of the ion.
    pub composition: BTreeMap<String, u32>,
    pub charge: i32,
    pub name: String,
}

impl Ion {
    pub fn is_cation(&self) -> bool {
        self.charge > 0
    }

    pub fn is_anion(&self) -> bool {
        self.charge < 0
    }
}

impl Display for Ion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({}, {:+})", self.symbol, self.name, self.charge)
    }
}

/// All lookup data the classifier, charge inference and predictor consume.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    elements: BTreeSet<String>,
    polyatomic: Vec<Ion>,
    cation_charges: BTreeMap<String, i32>,
    anion_charges: BTreeMap<String, i32>,
    activity_series: ReactivityOrder,
    halogen_order: ReactivityOrder,
    cold_water_metals: BTreeSet<String>,
    solubility: SolubilityRules,
}

lazy_static! {
    static ref STANDARD_TABLES: ReferenceTables = ReferenceTables::from_csv(
        include_str!("polyatomic.csv"),
        include_str!("charges.csv"),
    )
    .expect("bundled reference tables are well-formed");
}

fn reader(data: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(data.as_bytes())
}

fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    table: &'static str,
    name: &'static str,
) -> Result<&'r str, TableError> {
    match record.get(index) {
        Some(value) if !value.is_empty() => Ok(value),
        other => Err(TableError::Field {
            table,
            line: record.position().map(|p| p.line()).unwrap_or(0),
            field: name,
            value: other.unwrap_or("").to_string(),
        }),
    }
}

fn charge_field(record: &StringRecord, index: usize, table: &'static str) -> Result<i32, TableError> {
    let raw = field(record, index, table, "charge")?;
    raw.parse::<i32>().map_err(|_| TableError::Field {
        table,
        line: record.position().map(|p| p.line()).unwrap_or(0),
        field: "charge",
        value: raw.to_string(),
    })
}

/// Read `symbol,formula,charge,name` rows. The formula column is parsed to
/// get the ion's composition, so `CH3COO` becomes `{C: 2, H: 3, O: 2}`.
fn read_polyatomic(data: &str) -> Result<Vec<Ion>, TableError> {
    let mut ions = Vec::new();
    for result in reader(data).records() {
        let record = result?;
        let symbol = field(&record, 0, "polyatomic", "symbol")?;
        let formula = field(&record, 1, "polyatomic", "formula")?;
        let charge = charge_field(&record, 2, "polyatomic")?;
        let name = field(&record, 3, "polyatomic", "name")?;
        if charge == 0 {
            return Err(TableError::InvalidCharge {
                role: "polyatomic ion".to_string(),
                symbol: symbol.to_string(),
                charge,
            });
        }
        let composition = Formula::parse(formula)
            .map_err(|source| TableError::Formula {
                symbol: symbol.to_string(),
                source,
            })?
            .counts()
            .clone();
        ions.push(Ion {
            symbol: symbol.to_string(),
            composition,
            charge,
            name: name.to_string(),
        });
    }
    Ok(ions)
}

/// Read `role,symbol,charge` rows into the cation and anion tables.
fn read_charges(data: &str) -> Result<(BTreeMap<String, i32>, BTreeMap<String, i32>), TableError> {
    let mut cations = BTreeMap::new();
    let mut anions = BTreeMap::new();
    for result in reader(data).records() {
        let record = result?;
        let role = field(&record, 0, "charges", "role")?;
        let symbol = field(&record, 1, "charges", "symbol")?;
        let charge = charge_field(&record, 2, "charges")?;
        let table = match role {
            "cation" if charge > 0 => &mut cations,
            "anion" if charge < 0 => &mut anions,
            "cation" | "anion" => {
                return Err(TableError::InvalidCharge {
                    role: role.to_string(),
                    symbol: symbol.to_string(),
                    charge,
                })
            }
            other => return Err(TableError::InvalidRole(other.to_string())),
        };
        if table.insert(symbol.to_string(), charge).is_some() {
            warn!("Duplicate {} charge entry for {}, keeping the last one", role, symbol);
        }
    }
    Ok((cations, anions))
}

fn compositions(formulas: &[&str]) -> Result<Vec<BTreeMap<String, u32>>, TableError> {
    formulas
        .iter()
        .map(|raw| {
            Formula::parse(raw)
                .map(|f| f.counts().clone())
                .map_err(|source| TableError::Formula {
                    symbol: raw.to_string(),
                    source,
                })
        })
        .collect()
}

impl ReferenceTables {
    /// The bundled tables, parsed on first use.
    pub fn standard() -> &'static ReferenceTables {
        &STANDARD_TABLES
    }

    /// Build tables from caller-supplied CSV text.
    ///
    /// # Arguments
    ///
    /// * `polyatomic_csv` - rows of `symbol,formula,charge,name` with a header line.
    /// * `charges_csv` - rows of `role,symbol,charge` where `role` is `cation` or `anion`.
    ///
    /// Orderings, element symbols and solubility rules start from the bundled
    /// constants and can be replaced with the `with_*` methods.
    pub fn from_csv(polyatomic_csv: &str, charges_csv: &str) -> Result<Self, TableError> {
        let polyatomic = read_polyatomic(polyatomic_csv)?;
        let (cation_charges, anion_charges) = read_charges(charges_csv)?;
        let solubility = SolubilityRules {
            soluble_ions: SOLUBLE_IONS.iter().map(|s| s.to_string()).collect(),
            soluble_exceptions: compositions(&SOLUBLE_EXCEPTIONS)?,
            insoluble_ions: INSOLUBLE_IONS.iter().map(|s| s.to_string()).collect(),
            insoluble_exceptions: compositions(&INSOLUBLE_EXCEPTIONS)?,
        };
        debug!(
            "Loaded {} polyatomic ions, {} cation and {} anion charges",
            polyatomic.len(),
            cation_charges.len(),
            anion_charges.len()
        );
        Ok(Self {
            elements: ELEMENT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            polyatomic,
            cation_charges,
            anion_charges,
            activity_series: ReactivityOrder::new(ACTIVITY_SERIES),
            halogen_order: ReactivityOrder::new(HALOGEN_ORDER),
            cold_water_metals: COLD_WATER_METALS.iter().map(|s| s.to_string()).collect(),
            solubility,
        })
    }

    pub fn with_activity_series<I, S>(mut self, series: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activity_series = ReactivityOrder::new(series);
        self
    }

    pub fn with_halogen_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.halogen_order = ReactivityOrder::new(order);
        self
    }

    pub fn with_cold_water_metals<I, S>(mut self, metals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cold_water_metals = metals.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_element(&self, symbol: &str) -> bool {
        self.elements.contains(symbol)
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(String::as_str)
    }

    /// Look up a polyatomic ion by its canonical key, e.g. `SO4`.
    pub fn polyatomic(&self, symbol: &str) -> Option<&Ion> {
        self.polyatomic.iter().find(|ion| ion.symbol == symbol)
    }

    /// Polyatomic ions in table order.
    pub fn polyatomic_ions(&self) -> &[Ion] {
        &self.polyatomic
    }

    pub(crate) fn listed_cation_charge(&self, symbol: &str) -> Option<i32> {
        self.cation_charges.get(symbol).copied()
    }

    pub(crate) fn listed_anion_charge(&self, symbol: &str) -> Option<i32> {
        self.anion_charges.get(symbol).copied()
    }

    pub fn activity_series(&self) -> &ReactivityOrder {
        &self.activity_series
    }

    pub fn halogen_order(&self) -> &ReactivityOrder {
        &self.halogen_order
    }

    pub(crate) fn cold_water_metals(&self) -> &BTreeSet<String> {
        &self.cold_water_metals
    }

    pub(crate) fn solubility_rules(&self) -> &SolubilityRules {
        &self.solubility
    }
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::standard().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tables_load() {
        let tables = ReferenceTables::standard();
        assert_eq!(tables.elements().count(), 118);
        assert!(tables.is_element("Zn"));
        assert!(!tables.is_element("Zz"));

        let sulfate = tables.polyatomic("SO4").unwrap();
        assert_eq!(sulfate.charge, -2);
        assert_eq!(sulfate.name, "sulfate");
        assert_eq!(sulfate.composition.get("O"), Some(&4));
        assert_eq!(sulfate.to_string(), "SO4 (sulfate, -2)");

        let acetate = tables.polyatomic("CH3COO").unwrap();
        assert_eq!(acetate.composition.get("C"), Some(&2));
        assert!(acetate.is_anion());
        assert!(tables.polyatomic("NH4").unwrap().is_cation());

        assert_eq!(tables.listed_cation_charge("Al"), Some(3));
        assert_eq!(tables.listed_anion_charge("N"), Some(-3));
        assert_eq!(tables.listed_cation_charge("Cl"), None);
    }

    #[test]
    fn test_custom_tables() {
        let tables = ReferenceTables::from_csv(
            "symbol,formula,charge,name\nSO4,SO4,-2,sulfate\n",
            "role,symbol,charge\ncation,Zn,2\nanion,Cl,-1\n",
        )
        .unwrap()
        .with_activity_series(["Zn", "H", "Cu"])
        .with_halogen_order(vec!["Cl".to_string(), "Br".to_string()])
        .with_cold_water_metals(["Zn"]);

        assert_eq!(tables.polyatomic_ions().len(), 1);
        assert!(tables.polyatomic("NO3").is_none());
        assert_eq!(tables.activity_series().index("Cu"), Some(2));
        assert_eq!(tables.halogen_order().index("F"), None);
        assert!(tables.cold_water_metals().contains("Zn"));
        assert!(!tables.cold_water_metals().contains("K"));
    }

    #[test]
    fn test_bad_tables_are_rejected() {
        let header = "symbol,formula,charge,name\n";
        assert!(matches!(
            ReferenceTables::from_csv(&format!("{header}SO4,SO4,x,sulfate\n"), "role,symbol,charge\n"),
            Err(TableError::Field { field: "charge", .. })
        ));
        assert!(matches!(
            ReferenceTables::from_csv(&format!("{header}SO4,S(O4,-2,sulfate\n"), "role,symbol,charge\n"),
            Err(TableError::Formula { .. })
        ));
        assert!(matches!(
            ReferenceTables::from_csv(header, "role,symbol,charge\nneutral,Ar,0\n"),
            Err(TableError::InvalidRole(_))
        ));
        assert!(matches!(
            ReferenceTables::from_csv(header, "role,symbol,charge\ncation,Cl,-1\n"),
            Err(TableError::InvalidCharge { .. })
        ));
    }
}
