use crate::{ChargeError, Formula, FormulaError, Ion, ReferenceTables};
use num_integer::Integer;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::*;

/// Where a polyatomic key was found inside a raw formula string.
///
/// The variants are ordered by precedence: a prefix match beats a suffix
/// match, which beats an internal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchPosition {
    Prefix,
    Suffix,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolyatomicMatch<'a> {
    pub ion: &'a Ion,
    pub position: MatchPosition,
}

pub(crate) fn compact(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// If `part` is exactly `n` units of `composition`, return `n`.
///
/// Every element of the composition has to be present, every count has to
/// divide evenly by the same factor, and `part` may not contain anything else.
fn composition_multiple(composition: &BTreeMap<String, u32>, part: &BTreeMap<String, u32>) -> Option<u32> {
    if composition.is_empty() || composition.len() != part.len() {
        return None;
    }
    let mut factor = None;
    for (symbol, &unit) in composition {
        let have = *part.get(symbol)?;
        if unit == 0 || have % unit != 0 {
            return None;
        }
        let ratio = have / unit;
        match factor {
            None => factor = Some(ratio),
            Some(f) if f == ratio => {}
            Some(_) => return None,
        }
    }
    factor.filter(|&f| f > 0)
}

fn aggregate(entries: &[(String, u32)]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for (symbol, count) in entries {
        *counts.entry(symbol.clone()).or_insert(0) += count;
    }
    counts
}

fn push_part(out: &mut String, symbol: &str, count: u32) {
    out.push_str(symbol);
    if count > 1 {
        let _ = write!(out, "{}", count);
    }
}

impl ReferenceTables {
    /// Split an ionic formula into its cation and anion.
    ///
    /// A pure element yields an empty anion: `split_cation_anion("Zn") == ("Zn", "")`.
    /// Known polyatomic anions are recognized by composition, so
    /// `Cu(NO3)2` gives `("Cu", "NO3")`. Unrecognized anion parts are written
    /// back out literally, with any trailing multiplier dropped
    /// (`FeCl2` gives `("Fe", "Cl")`).
    pub fn split_cation_anion(&self, formula: &str) -> Result<(String, String), FormulaError> {
        let parsed = Formula::parse(formula)?;
        let ordered = parsed.ordered();
        if let [(symbol, _)] = ordered {
            return Ok((symbol.clone(), String::new()));
        }
        let raw = compact(formula);

        let (cation, rest) = if let Some((ion, consumed)) = self.polyatomic_cation_prefix(&raw, ordered) {
            debug!("{} starts with polyatomic cation {}", raw, ion.symbol);
            (ion.symbol.clone(), &ordered[consumed..])
        } else if ordered[0].0 == "H" && raw != "H2O" {
            debug!("{} treated as an acid", raw);
            ("H".to_string(), &ordered[1..])
        } else {
            (ordered[0].0.clone(), &ordered[1..])
        };

        let anion = if rest.is_empty() {
            String::new()
        } else {
            self.name_anion_part(rest)
        };
        Ok((self.strip_multiplier(&cation), self.strip_multiplier(&anion)))
    }

    /// A leading positive polyatomic ion, written bare (`NH4Cl`) or in
    /// parentheses (`(NH4)2SO4`). Returns the ion and how many ordered entries
    /// it spans.
    fn polyatomic_cation_prefix<'a>(&'a self, raw: &str, ordered: &[(String, u32)]) -> Option<(&'a Ion, usize)> {
        self.polyatomic_ions()
            .iter()
            .filter(|ion| ion.is_cation())
            .filter(|ion| raw.starts_with(&ion.symbol) || raw.starts_with(&format!("({})", ion.symbol)))
            .find_map(|ion| {
                let span = ion.composition.len();
                let head = ordered.get(..span)?;
                composition_multiple(&ion.composition, &aggregate(head)).map(|_| (ion, span))
            })
    }

    /// Name the anion part of a compound: a polyatomic key when the part is
    /// a whole multiple of exactly one known ion, otherwise the literal formula.
    fn name_anion_part(&self, entries: &[(String, u32)]) -> String {
        let part = aggregate(entries);
        let matches: Vec<&Ion> = self
            .polyatomic_ions()
            .iter()
            .filter(|ion| composition_multiple(&ion.composition, &part).is_some())
            .collect();
        if let [ion] = matches.as_slice() {
            return ion.symbol.clone();
        }
        if matches.len() > 1 {
            debug!("ambiguous polyatomic match for {:?}", part);
        }
        let mut literal = String::new();
        for (symbol, count) in entries {
            push_part(&mut literal, symbol, *count);
        }
        literal
    }

    /// Drop a trailing count from a token (`Cl2` -> `Cl`) unless the token is
    /// itself a polyatomic key such as `NH4`.
    fn strip_multiplier(&self, token: &str) -> String {
        if self.polyatomic(token).is_some() {
            return token.to_string();
        }
        token.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
    }

    /// Look for a known polyatomic key inside a raw formula string without
    /// parsing it.
    ///
    /// Prefix matches win over suffix matches, which win over internal
    /// ones. Within the same position the longest key wins (`HCO3` over
    /// `CO3` in `NaHCO3`), then table order.
    pub fn detect_polyatomic(&self, raw: &str) -> Option<PolyatomicMatch<'_>> {
        let raw = compact(raw);
        self.polyatomic_ions()
            .iter()
            .filter_map(|ion| {
                let key = ion.symbol.as_str();
                let position = if raw.starts_with(key) {
                    MatchPosition::Prefix
                } else if raw.ends_with(key) {
                    MatchPosition::Suffix
                } else if raw.contains(key) {
                    MatchPosition::Internal
                } else {
                    return None;
                };
                Some(PolyatomicMatch { ion, position })
            })
            .min_by_key(|m| (m.position, Reverse(m.ion.symbol.len())))
    }

    /// Write a composition back out as a formula string.
    ///
    /// Best effort, not IUPAC ordering: an exact polyatomic composition
    /// becomes its key; otherwise hydrogen comes first (when combined with
    /// something else), then metals in activity-series order, then the
    /// rest alphabetically.
    pub fn compose_formula(&self, counts: &BTreeMap<String, u32>) -> String {
        if let Some(ion) = self.polyatomic_ions().iter().find(|ion| &ion.composition == counts) {
            return ion.symbol.clone();
        }

        let mut order: Vec<&str> = Vec::with_capacity(counts.len());
        if counts.contains_key("H") && counts.len() > 1 {
            order.push("H");
        }
        for metal in self.activity_series().symbols() {
            if counts.contains_key(metal) && !order.contains(&metal.as_str()) {
                order.push(metal);
            }
        }
        for symbol in counts.keys() {
            if !order.contains(&symbol.as_str()) {
                order.push(symbol);
            }
        }

        let mut formula = String::new();
        for symbol in order {
            push_part(&mut formula, symbol, counts[symbol]);
        }
        formula
    }

    /// Build a neutral formula from a cation and an anion with the cross-over
    /// method: `("Ca", 2, "OH", -1)` gives `Ca(OH)2`.
    ///
    /// Multi-atom parts are wrapped in parentheses when they need a subscript.
    pub fn compose_from_ions(
        &self,
        cation: &str,
        cation_charge: i32,
        anion: &str,
        anion_charge: i32,
    ) -> Result<String, ChargeError> {
        if cation_charge == 0 {
            return Err(ChargeError::ZeroCharge(cation.to_string()));
        }
        if anion_charge == 0 {
            return Err(ChargeError::ZeroCharge(anion.to_string()));
        }
        let c = cation_charge.unsigned_abs();
        let a = anion_charge.unsigned_abs();
        let g = c.gcd(&a);

        let mut formula = String::new();
        self.push_ion(&mut formula, cation, a / g);
        self.push_ion(&mut formula, anion, c / g);
        trace!("{}{:+} + {}{:+} -> {}", cation, cation_charge, anion, anion_charge, formula);
        Ok(formula)
    }

    fn push_ion(&self, out: &mut String, symbol: &str, count: u32) {
        let is_group = self.polyatomic(symbol).is_some()
            || Formula::parse(symbol).map(|f| f.ordered().len() > 1).unwrap_or(false);
        if is_group && count > 1 {
            let _ = write!(out, "({}){}", symbol, count);
        } else {
            push_part(out, symbol, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(raw: &str) -> (String, String) {
        ReferenceTables::standard().split_cation_anion(raw).unwrap()
    }

    fn pair(cation: &str, anion: &str) -> (String, String) {
        (cation.to_string(), anion.to_string())
    }

    fn counts(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(s, c)| (s.to_string(), *c)).collect()
    }

    #[test]
    fn test_split_simple_salts() {
        assert_eq!(split("CuSO4"), pair("Cu", "SO4"));
        assert_eq!(split("NaCl"), pair("Na", "Cl"));
        assert_eq!(split("NaBr"), pair("Na", "Br"));
        assert_eq!(split("Zn"), pair("Zn", ""));
        assert_eq!(split("Cl2"), pair("Cl", ""));
    }

    #[test]
    fn test_split_polyatomic_groups() {
        assert_eq!(split("Cu(NO3)2"), pair("Cu", "NO3"));
        assert_eq!(split("Ca(OH)2"), pair("Ca", "OH"));
        assert_eq!(split("Al2(SO4)3"), pair("Al", "SO4"));
        assert_eq!(split("NaHCO3"), pair("Na", "HCO3"));
        assert_eq!(split("K2Cr2O7"), pair("K", "Cr2O7"));
    }

    #[test]
    fn test_split_strips_multipliers() {
        assert_eq!(split("FeCl2"), pair("Fe", "Cl"));
        assert_eq!(split("Fe2O3"), pair("Fe", "O"));
        assert_eq!(split("CaCl2"), pair("Ca", "Cl"));
    }

    #[test]
    fn test_split_acids_and_water() {
        assert_eq!(split("HCl"), pair("H", "Cl"));
        assert_eq!(split("H2SO4"), pair("H", "SO4"));
        assert_eq!(split("H3PO4"), pair("H", "PO4"));
        // Water is not an acid, but the default rule splits it the same way.
        assert_eq!(split("H2O"), pair("H", "O"));
    }

    #[test]
    fn test_split_polyatomic_cation() {
        assert_eq!(split("NH4Cl"), pair("NH4", "Cl"));
        assert_eq!(split("(NH4)2SO4"), pair("NH4", "SO4"));
        assert_eq!(split("NH4NO3"), pair("NH4", "NO3"));
    }

    #[test]
    fn test_split_rejects_bad_formula() {
        let tables = ReferenceTables::standard();
        assert!(matches!(
            tables.split_cation_anion("Cu(SO4"),
            Err(FormulaError::UnbalancedParentheses(_))
        ));
        assert_eq!(tables.split_cation_anion(""), Err(FormulaError::Empty));
    }

    #[test]
    fn test_detect_polyatomic() {
        let tables = ReferenceTables::standard();

        let found = tables.detect_polyatomic("CuSO4").unwrap();
        assert_eq!(found.ion.symbol, "SO4");
        assert_eq!(found.position, MatchPosition::Suffix);

        let found = tables.detect_polyatomic("NH4Cl").unwrap();
        assert_eq!(found.ion.symbol, "NH4");
        assert_eq!(found.position, MatchPosition::Prefix);

        let found = tables.detect_polyatomic("Cu(NO3)2").unwrap();
        assert_eq!(found.ion.symbol, "NO3");
        assert_eq!(found.position, MatchPosition::Internal);

        // Prefix beats suffix even though NO3 comes earlier in the table.
        let found = tables.detect_polyatomic("NH4NO3").unwrap();
        assert_eq!(found.ion.symbol, "NH4");

        // Longest key wins within the same position.
        let found = tables.detect_polyatomic("NaHCO3").unwrap();
        assert_eq!(found.ion.symbol, "HCO3");

        assert!(tables.detect_polyatomic("NaBr").is_none());
    }

    #[test]
    fn test_compose_formula() {
        let tables = ReferenceTables::standard();
        assert_eq!(tables.compose_formula(&counts(&[("Na", 1), ("Cl", 1)])), "NaCl");
        assert_eq!(tables.compose_formula(&counts(&[("O", 1), ("H", 1)])), "OH");
        assert_eq!(tables.compose_formula(&counts(&[("S", 1), ("O", 4)])), "SO4");
        assert_eq!(tables.compose_formula(&counts(&[("Cl", 1), ("H", 1)])), "HCl");
        assert_eq!(tables.compose_formula(&counts(&[("O", 2), ("H", 2)])), "H2O2");
        assert_eq!(tables.compose_formula(&counts(&[("Cl", 2), ("Cu", 1)])), "CuCl2");
        assert_eq!(tables.compose_formula(&counts(&[("H", 2)])), "H2");
        assert_eq!(tables.compose_formula(&counts(&[("Xe", 1), ("F", 4)])), "F4Xe");
    }

    #[test]
    fn test_compose_from_ions() {
        let tables = ReferenceTables::standard();
        assert_eq!(tables.compose_from_ions("Na", 1, "Cl", -1).unwrap(), "NaCl");
        assert_eq!(tables.compose_from_ions("Ca", 2, "OH", -1).unwrap(), "Ca(OH)2");
        assert_eq!(tables.compose_from_ions("Zn", 2, "SO4", -2).unwrap(), "ZnSO4");
        assert_eq!(tables.compose_from_ions("Al", 3, "SO4", -2).unwrap(), "Al2(SO4)3");
        assert_eq!(tables.compose_from_ions("Al", 3, "NO3", -1).unwrap(), "Al(NO3)3");
        assert_eq!(tables.compose_from_ions("NH4", 1, "SO4", -2).unwrap(), "(NH4)2SO4");
        assert_eq!(tables.compose_from_ions("Mg", 2, "Cl", -1).unwrap(), "MgCl2");
        assert_eq!(tables.compose_from_ions("Fe", 3, "O", -2).unwrap(), "Fe2O3");
        assert_eq!(
            tables.compose_from_ions("Na", 0, "Cl", -1),
            Err(ChargeError::ZeroCharge("Na".to_string()))
        );
    }
}
