//! Single-replacement reactions: `A + BC -> AC + B`.
//!
//! A lone element either displaces the cation of a compound (metals, judged
//! by the activity series) or its halide anion (halogens, judged by the
//! halogen order). Infeasible reactions are ordinary results, not errors.

use crate::classify::compact;
use crate::{BalancedEquation, ChargeError, Formula, MatchPosition, Reaction, ReferenceTables};
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplacementKind {
    Halogen,
    MetalDisplacesHydrogen,
    MetalDisplacesWater,
    MetalDisplacesMetal,
}

impl Display for ReplacementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ReplacementKind::Halogen => "halogen",
            ReplacementKind::MetalDisplacesHydrogen => "metal_displaces_hydrogen",
            ReplacementKind::MetalDisplacesWater => "metal_displaces_water",
            ReplacementKind::MetalDisplacesMetal => "metal_displaces_metal",
        };
        write!(f, "{}", name)
    }
}

/// Why a replacement can happen, with the symbols the products are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Halogen { incoming: String, replaced: String },
    DisplacesHydrogen { metal: String, acid: String },
    DisplacesWater { metal: String },
    DisplacesMetal { metal: String, replaced: String, anion: String },
}

impl Decision {
    pub fn kind(&self) -> ReplacementKind {
        match self {
            Decision::Halogen { .. } => ReplacementKind::Halogen,
            Decision::DisplacesHydrogen { .. } => ReplacementKind::MetalDisplacesHydrogen,
            Decision::DisplacesWater { .. } => ReplacementKind::MetalDisplacesWater,
            Decision::DisplacesMetal { .. } => ReplacementKind::MetalDisplacesMetal,
        }
    }
}

/// An infeasible replacement. `kind` is set when the reaction was recognized
/// as a particular subtype before being ruled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoReaction {
    pub kind: Option<ReplacementKind>,
    pub reason: String,
}

impl NoReaction {
    fn new(kind: Option<ReplacementKind>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

impl Display for NoReaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.kind {
            Some(kind) => write!(f, "no reaction ({}): {}", kind, self.reason),
            None => write!(f, "no reaction: {}", self.reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    Feasible {
        kind: ReplacementKind,
        products: Vec<String>,
        balanced: Option<BalancedEquation>,
        warning: Option<String>,
    },
    Infeasible(NoReaction),
}

impl Prediction {
    pub fn is_possible(&self) -> bool {
        matches!(self, Prediction::Feasible { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Prediction::Infeasible(no) => Some(&no.reason),
            Prediction::Feasible { .. } => None,
        }
    }

    pub fn products(&self) -> &[String] {
        match self {
            Prediction::Feasible { products, .. } => products,
            Prediction::Infeasible(_) => &[],
        }
    }

    pub fn kind(&self) -> Option<ReplacementKind> {
        match self {
            Prediction::Feasible { kind, .. } => Some(*kind),
            Prediction::Infeasible(no) => no.kind,
        }
    }

    pub fn balanced_equation(&self) -> Option<&BalancedEquation> {
        match self {
            Prediction::Feasible { balanced, .. } => balanced.as_ref(),
            Prediction::Infeasible(_) => None,
        }
    }

    /// Set when products were found but could not be balanced.
    pub fn warning(&self) -> Option<&str> {
        match self {
            Prediction::Feasible { warning, .. } => warning.as_deref(),
            Prediction::Infeasible(_) => None,
        }
    }
}

impl Display for Prediction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Prediction::Feasible {
                kind,
                products,
                balanced,
                warning,
            } => {
                match balanced {
                    Some(equation) => write!(f, "{} ({})", equation, kind)?,
                    None => write!(f, "products {} ({})", products.join(" + "), kind)?,
                }
                if let Some(warning) = warning {
                    write!(f, " [warning: {}]", warning)?;
                }
                Ok(())
            }
            Prediction::Infeasible(no) => write!(f, "{}", no),
        }
    }
}

pub struct ReplacementPredictor<'a> {
    tables: &'a ReferenceTables,
}

impl Default for ReplacementPredictor<'static> {
    fn default() -> Self {
        Self::new(ReferenceTables::standard())
    }
}

impl<'a> ReplacementPredictor<'a> {
    pub fn new(tables: &'a ReferenceTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &'a ReferenceTables {
        self.tables
    }

    /// Decide whether `element` can replace part of `compound`.
    ///
    /// # Arguments
    ///
    /// * `element` - a single element, written as an atom or a diatomic (`Zn`, `Cl2`).
    /// * `compound` - the salt, acid or water being attacked.
    ///
    /// # Returns
    ///
    /// The [`Decision`] naming the displaced ion, or a [`NoReaction`] with a
    /// readable reason.
    pub fn can_replace(&self, element: &str, compound: &str) -> Result<Decision, NoReaction> {
        let element = compact(element);
        let compound = compact(compound);

        let parsed = Formula::parse(&element).map_err(|e| NoReaction::new(None, e.to_string()))?;
        let symbol = match parsed.symbols().collect::<Vec<_>>().as_slice() {
            [symbol] => symbol.to_string(),
            _ => return Err(NoReaction::new(None, format!("{} is not a single element", element))),
        };

        if self.tables.is_halogen(&symbol) {
            return self.halogen_replacement(symbol, &compound);
        }
        if symbol == "H" {
            return Err(NoReaction::new(None, "elemental hydrogen is never the displacing element"));
        }
        if !self.tables.in_activity_series(&symbol) {
            return Err(NoReaction::new(None, format!("unknown reactivity: {} is not in the activity series", symbol)));
        }

        let parsed = Formula::parse(&compound).map_err(|e| NoReaction::new(None, e.to_string()))?;
        let is_acid = parsed.ordered().first().is_some_and(|(first, _)| first == "H") && compound != "H2O";
        if is_acid {
            let kind = Some(ReplacementKind::MetalDisplacesHydrogen);
            return match self.tables.activity_series().at_least_as_reactive(&symbol, "H") {
                Some(true) => Ok(Decision::DisplacesHydrogen {
                    metal: symbol,
                    acid: compound,
                }),
                Some(false) => Err(NoReaction::new(kind, format!("{} is below hydrogen in the activity series", symbol))),
                None => Err(NoReaction::new(kind, "hydrogen is not in the activity series")),
            };
        }

        if compound == "H2O" {
            if self.tables.reacts_with_cold_water(&symbol) {
                return Ok(Decision::DisplacesWater { metal: symbol });
            }
            return Err(NoReaction::new(
                Some(ReplacementKind::MetalDisplacesWater),
                format!("{} does not react with cold water", symbol),
            ));
        }

        let (cation, anion) = self
            .tables
            .split_cation_anion(&compound)
            .map_err(|e| NoReaction::new(None, e.to_string()))?;
        if anion.is_empty() {
            return Err(NoReaction::new(None, format!("{} is not an ionic salt or acid", compound)));
        }
        let kind = Some(ReplacementKind::MetalDisplacesMetal);
        match self.tables.activity_series().at_least_as_reactive(&symbol, &cation) {
            Some(true) => Ok(Decision::DisplacesMetal {
                metal: symbol,
                replaced: cation,
                anion,
            }),
            Some(false) => Err(NoReaction::new(kind, format!("{} is less reactive than {}", symbol, cation))),
            None => Err(NoReaction::new(
                kind,
                format!("cation {} of {} is not in the activity series", cation, compound),
            )),
        }
    }

    fn halogen_replacement(&self, incoming: String, compound: &str) -> Result<Decision, NoReaction> {
        let kind = Some(ReplacementKind::Halogen);
        let (_, anion) = self
            .tables
            .split_cation_anion(compound)
            .map_err(|e| NoReaction::new(kind, e.to_string()))?;
        if anion.is_empty() {
            return Err(NoReaction::new(kind, format!("{} has no anion to displace", compound)));
        }

        let replaced = self.leaving_anion(compound).unwrap_or(anion);
        if !self.tables.is_halogen(&replaced) {
            return Err(NoReaction::new(
                kind,
                format!("could not identify a halide in {} ({} is not one)", compound, replaced),
            ));
        }

        if self.tables.halogen_order().more_reactive(&incoming, &replaced) == Some(true) {
            Ok(Decision::Halogen { incoming, replaced })
        } else {
            Err(NoReaction::new(
                kind,
                format!("{} is not more reactive than {}", incoming, replaced),
            ))
        }
    }

    /// The anion at the end of `compound`: a polyatomic key in suffix
    /// position, or else the longest element symbol it ends with once any
    /// trailing count and closing parentheses are removed (`Pb(Br)2` gives `Br`).
    fn leaving_anion(&self, compound: &str) -> Option<String> {
        if let Some(found) = self.tables.detect_polyatomic(compound) {
            if found.position == MatchPosition::Suffix {
                return Some(found.ion.symbol.clone());
            }
        }
        let stem = compound.trim_end_matches(|c: char| c.is_ascii_digit() || c == ')');
        self.tables
            .elements()
            .filter(|symbol| stem.ends_with(symbol))
            .max_by_key(|symbol| symbol.len())
            .map(str::to_string)
    }

    fn build_products(&self, decision: &Decision, compound: &str) -> Result<Vec<String>, ChargeError> {
        let tables = self.tables;
        let products = match decision {
            Decision::Halogen { incoming, replaced } => {
                let (cation, _) = tables
                    .split_cation_anion(compound)
                    .map_err(|_| ChargeError::CationNotInferable(compound.to_string()))?;
                let charge = tables.require_cation_charge(&cation)?;
                vec![
                    tables.compose_from_ions(&cation, charge, incoming, -1)?,
                    format!("{}2", replaced),
                ]
            }
            Decision::DisplacesHydrogen { metal, acid } => {
                let (_, anion) = tables
                    .split_cation_anion(acid)
                    .map_err(|_| ChargeError::UnknownAnion(acid.to_string()))?;
                let salt = tables.compose_from_ions(
                    metal,
                    tables.require_cation_charge(metal)?,
                    &anion,
                    tables.anion_charge(&anion)?,
                )?;
                vec![salt, "H2".to_string()]
            }
            Decision::DisplacesWater { metal } => {
                let hydroxide = tables.compose_from_ions(metal, tables.require_cation_charge(metal)?, "OH", -1)?;
                vec![hydroxide, "H2".to_string()]
            }
            Decision::DisplacesMetal {
                metal,
                replaced,
                anion,
            } => {
                let salt = tables.compose_from_ions(
                    metal,
                    tables.require_cation_charge(metal)?,
                    anion,
                    tables.anion_charge(anion)?,
                )?;
                vec![salt, replaced.clone()]
            }
        };
        Ok(products)
    }

    /// Predict the products of `element + compound` and balance the result.
    ///
    /// Never fails: infeasible reactions and charge inference failures come
    /// back as [`Prediction::Infeasible`]. If the products cannot be balanced
    /// they are still reported, with a warning.
    pub fn predict(&self, element: &str, compound: &str) -> Prediction {
        let element = compact(element);
        let compound = compact(compound);

        let decision = match self.can_replace(&element, &compound) {
            Ok(decision) => decision,
            Err(no) => {
                info!("{} + {}: {}", element, compound, no);
                return Prediction::Infeasible(no);
            }
        };
        let kind = decision.kind();
        debug!("{} + {}: {:?}", element, compound, decision);

        let products = match self.build_products(&decision, &compound) {
            Ok(products) => products,
            Err(e) => {
                info!("{} + {}: cannot build products: {}", element, compound, e);
                return Prediction::Infeasible(NoReaction::new(Some(kind), e.to_string()));
            }
        };

        let (balanced, warning) = match BalancedEquation::new(&[&element, &compound], &products) {
            Ok(equation) => (Some(equation), None),
            Err(e) => {
                warn!("Balancing {} + {} -> {} failed: {}", element, compound, products.join(" + "), e);
                (None, Some(format!("balancing failed: {}", e)))
            }
        };
        info!("{} + {} -> {} ({})", element, compound, products.join(" + "), kind);
        Prediction::Feasible {
            kind,
            products,
            balanced,
            warning,
        }
    }

    /// Predict from a single reactant side such as `"Zn + CuSO4"`. The two
    /// species may come in either order.
    pub fn predict_reactants(&self, input: &str) -> Prediction {
        let species = match Reaction::parse_reactants(input) {
            Ok(species) => species,
            Err(e) => return Prediction::Infeasible(NoReaction::new(None, e.to_string())),
        };
        let [first, second] = species.as_slice() else {
            return Prediction::Infeasible(NoReaction::new(
                None,
                format!("expected an element and a compound, found {} species", species.len()),
            ));
        };

        let is_element = |raw: &str| Formula::parse(raw).map(|f| f.is_single_element()).unwrap_or(false);
        if !is_element(first.as_str()) && is_element(second.as_str()) {
            self.predict(second, first)
        } else {
            self.predict(first, second)
        }
    }
}
