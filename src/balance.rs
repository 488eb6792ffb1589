//! Stoichiometric balancing by exact nullspace computation.
//!
//! Each species is a column of the element conservation matrix (reactants
//! positive, products negative). The coefficients are a nullspace vector of
//! that matrix, scaled to the smallest positive integers.

use crate::{Formula, FormulaError, Reaction, ReactionError};
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("both sides of a reaction need at least one species")]
    EmptySide,
    #[error("invalid species '{species}': {source}")]
    Species {
        species: String,
        #[source]
        source: FormulaError,
    },
    #[error(transparent)]
    Reaction(#[from] ReactionError),
    #[error("the species cannot be balanced: some element is not conserved")]
    NoSolution,
    #[error("no all-positive set of coefficients exists (best candidate: {0:?})")]
    NonPositiveCoefficients(Vec<BigInt>),
    #[error("a coefficient is too large to represent")]
    CoefficientOverflow,
}

type Matrix = Vec<Vec<BigRational>>;

fn parse_side<S: AsRef<str>>(side: &[S]) -> Result<Vec<Formula>, BalanceError> {
    side.iter()
        .map(|species| {
            let species = species.as_ref();
            Formula::parse(species).map_err(|source| BalanceError::Species {
                species: species.to_string(),
                source,
            })
        })
        .collect()
}

/// Rows are the sorted distinct elements, columns the species in order.
fn conservation_matrix(left: &[Formula], right: &[Formula]) -> (Vec<String>, Vec<Vec<i64>>) {
    let elements: BTreeSet<&String> = left.iter().chain(right).flat_map(|f| f.counts().keys()).collect();
    let rows = elements
        .iter()
        .map(|element| {
            let reactants = left.iter().map(|f| i64::from(f.count_of(element)));
            let products = right.iter().map(|f| -i64::from(f.count_of(element)));
            reactants.chain(products).collect()
        })
        .collect();
    (elements.into_iter().cloned().collect(), rows)
}

/// Reduce `matrix` in place to reduced row echelon form.
///
/// Returns the `(row, column)` position of every pivot.
fn row_reduce(matrix: &mut Matrix, columns: usize) -> Vec<(usize, usize)> {
    let mut pivots = Vec::new();
    let mut row = 0;
    for col in 0..columns {
        if row >= matrix.len() {
            break;
        }
        let Some(found) = (row..matrix.len()).find(|&r| !matrix[r][col].is_zero()) else {
            continue;
        };
        matrix.swap(row, found);

        let lead = matrix[row][col].clone();
        for value in matrix[row].iter_mut() {
            *value = &*value / &lead;
        }

        let pivot_row = matrix[row].clone();
        for (r, other) in matrix.iter_mut().enumerate() {
            if r == row || other[col].is_zero() {
                continue;
            }
            let factor = other[col].clone();
            for (value, p) in other.iter_mut().zip(&pivot_row) {
                *value = &*value - &factor * p;
            }
        }
        trace!("pivot at ({}, {})", row, col);
        pivots.push((row, col));
        row += 1;
    }
    pivots
}

/// One rational nullspace vector of a reduced matrix: the last free column
/// is set to one and every other free column to zero.
fn nullspace_vector(reduced: &Matrix, pivots: &[(usize, usize)], columns: usize) -> Vec<BigRational> {
    let mut free: Vec<usize> = (0..columns)
        .filter(|col| !pivots.iter().any(|&(_, c)| c == *col))
        .collect();
    if free.is_empty() {
        debug!("system is fully determined, forcing the last column free");
        free.push(columns - 1);
    } else if free.len() > 1 {
        warn!(
            "{} free columns: the reaction is a combination of independent reactions",
            free.len()
        );
    }

    let mut solution = vec![BigRational::zero(); columns];
    if let Some(&last) = free.last() {
        solution[last] = BigRational::one();
    }
    for &(row, col) in pivots {
        if free.contains(&col) {
            continue;
        }
        let sum = free
            .iter()
            .fold(BigRational::zero(), |acc, &f| acc + &reduced[row][f] * &solution[f]);
        solution[col] = -sum;
    }
    solution
}

/// Scale a rational vector to the smallest integer vector along the same
/// direction, oriented so it is not entirely non-positive.
fn integer_coefficients(solution: &[BigRational]) -> Vec<BigInt> {
    let lcm = solution
        .iter()
        .fold(BigInt::one(), |acc, value| acc.lcm(value.denom()));
    let mut integers: Vec<BigInt> = solution
        .iter()
        .map(|value| (value * BigRational::from_integer(lcm.clone())).to_integer())
        .collect();

    let gcd = integers
        .iter()
        .filter(|value| !value.is_zero())
        .fold(BigInt::zero(), |acc, value| acc.gcd(value));
    if !gcd.is_zero() && !gcd.is_one() {
        for value in integers.iter_mut() {
            *value = &*value / &gcd;
        }
    }

    if integers.iter().all(|value| !value.is_positive()) {
        for value in integers.iter_mut() {
            *value = -&*value;
        }
    }
    integers
}

fn is_conserved(matrix: &[Vec<i64>], coefficients: &[BigInt]) -> bool {
    matrix.iter().all(|row| {
        row.iter()
            .zip(coefficients)
            .fold(BigInt::zero(), |acc, (&count, coefficient)| acc + coefficient * BigInt::from(count))
            .is_zero()
    })
}

/// Balance `left -> right`, returning the coefficients of each side.
///
/// ```
/// let (left, right) = chemrxn::balance(&["H2", "O2"], &["H2O"]).unwrap();
/// assert_eq!(left, vec![2, 1]);
/// assert_eq!(right, vec![2]);
/// ```
///
/// The coefficients are positive, share no common factor, and conserve
/// every element. Species lists that admit no such answer are rejected
/// rather than returning a meaningless vector.
pub fn balance<L: AsRef<str>, R: AsRef<str>>(
    left: &[L],
    right: &[R],
) -> Result<(Vec<u64>, Vec<u64>), BalanceError> {
    if left.is_empty() || right.is_empty() {
        return Err(BalanceError::EmptySide);
    }
    let left_formulas = parse_side(left)?;
    let right_formulas = parse_side(right)?;
    let (elements, matrix) = conservation_matrix(&left_formulas, &right_formulas);
    let columns = left.len() + right.len();
    trace!("conservation matrix over {:?}: {:?}", elements, matrix);

    let mut reduced: Matrix = matrix
        .iter()
        .map(|row| row.iter().map(|&x| BigRational::from_integer(BigInt::from(x))).collect())
        .collect();
    let pivots = row_reduce(&mut reduced, columns);
    let solution = nullspace_vector(&reduced, &pivots, columns);
    let coefficients = integer_coefficients(&solution);

    if !is_conserved(&matrix, &coefficients) {
        debug!("candidate {:?} does not conserve {:?}", coefficients, elements);
        return Err(BalanceError::NoSolution);
    }
    if coefficients.iter().any(|c| !c.is_positive()) {
        return Err(BalanceError::NonPositiveCoefficients(coefficients));
    }

    let coefficients = coefficients
        .iter()
        .map(|c| c.to_u64().ok_or(BalanceError::CoefficientOverflow))
        .collect::<Result<Vec<u64>, _>>()?;
    let (l, r) = coefficients.split_at(left.len());
    Ok((l.to_vec(), r.to_vec()))
}

/// A reaction with its balancing coefficients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedEquation {
    pub reactants: Vec<(u64, String)>,
    pub products: Vec<(u64, String)>,
}

impl BalancedEquation {
    pub fn new<L: AsRef<str>, R: AsRef<str>>(left: &[L], right: &[R]) -> Result<Self, BalanceError> {
        let (lc, rc) = balance(left, right)?;
        let pair = |coefficients: Vec<u64>, species: Vec<String>| -> Vec<(u64, String)> {
            coefficients.into_iter().zip(species).collect()
        };
        Ok(Self {
            reactants: pair(lc, left.iter().map(|s| s.as_ref().trim().to_string()).collect()),
            products: pair(rc, right.iter().map(|s| s.as_ref().trim().to_string()).collect()),
        })
    }
}

fn write_side(f: &mut Formatter<'_>, side: &[(u64, String)]) -> FmtResult {
    for (i, (coefficient, species)) in side.iter().enumerate() {
        if i > 0 {
            write!(f, " + ")?;
        }
        if *coefficient != 1 {
            write!(f, "{} ", coefficient)?;
        }
        write!(f, "{}", species)?;
    }
    Ok(())
}

impl Display for BalancedEquation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write_side(f, &self.reactants)?;
        write!(f, " -> ")?;
        write_side(f, &self.products)
    }
}

/// Parse and balance a full reaction string such as `"Fe + O2 -> Fe2O3"`.
pub fn balance_reaction(input: &str) -> Result<BalancedEquation, BalanceError> {
    let reaction = Reaction::parse(input)?;
    BalancedEquation::new(&reaction.reactants, &reaction.products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_logging;

    const KNOWN: &[(&[&str], &[&str], &[u64], &[u64])] = &[
        (&["Zn", "CuSO4"], &["ZnSO4", "Cu"], &[1, 1], &[1, 1]),
        (&["H2", "O2"], &["H2O"], &[2, 1], &[2]),
        (&["CH4", "O2"], &["CO2", "H2O"], &[1, 2], &[1, 2]),
        (&["C3H8", "O2"], &["CO2", "H2O"], &[1, 5], &[3, 4]),
        (&["Fe", "O2"], &["Fe2O3"], &[4, 3], &[2]),
        (&["KClO3"], &["KCl", "O2"], &[2], &[2, 3]),
        (&["Ca(OH)2", "HCl"], &["CaCl2", "H2O"], &[1, 2], &[1, 2]),
        (&["Al", "Cu(NO3)2"], &["Al(NO3)3", "Cu"], &[2, 3], &[2, 3]),
        (&["K", "H2O"], &["KOH", "H2"], &[2, 2], &[2, 1]),
        (&["Cl2", "NaBr"], &["NaCl", "Br2"], &[1, 2], &[2, 1]),
        (&["Mg", "HCl"], &["MgCl2", "H2"], &[1, 2], &[1, 1]),
    ];

    #[test]
    fn test_known_reactions() {
        init_logging("trace");
        for &(left, right, lc, rc) in KNOWN {
            let (l, r) = balance(left, right).unwrap();
            assert_eq!((&l[..], &r[..]), (lc, rc), "{:?} -> {:?}", left, right);
        }
    }

    #[test]
    fn test_balanced_properties() {
        for &(left, right, _, _) in KNOWN {
            let (l, r) = balance(left, right).unwrap();
            assert!(l.iter().chain(&r).all(|&c| c > 0));
            let gcd = l.iter().chain(&r).fold(0u64, |acc, &c| acc.gcd(&c));
            assert_eq!(gcd, 1, "{:?} -> {:?}", left, right);

            let lf = parse_side(left).unwrap();
            let rf = parse_side(right).unwrap();
            let (elements, _) = conservation_matrix(&lf, &rf);
            for element in elements {
                let count = |side: &[Formula], coefficients: &[u64]| -> u64 {
                    side.iter()
                        .zip(coefficients)
                        .map(|(f, c)| u64::from(f.count_of(&element)) * c)
                        .sum()
                };
                assert_eq!(count(&lf[..], &l[..]), count(&rf[..], &r[..]), "{} in {:?}", element, left);
            }
        }
    }

    #[test]
    fn test_inconsistent_species() {
        assert_eq!(balance(&["H2"], &["O2"]), Err(BalanceError::NoSolution));
        assert_eq!(balance(&["Zn", "CuSO4"], &["ZnSO4"]), Err(BalanceError::NoSolution));
    }

    #[test]
    fn test_independent_reactions() {
        assert!(matches!(
            balance(&["H2", "He"], &["H2", "He"]),
            Err(BalanceError::NonPositiveCoefficients(_))
        ));
    }

    #[test]
    fn test_bad_input() {
        let empty: [&str; 0] = [];
        assert_eq!(balance(&empty, &["H2O"]), Err(BalanceError::EmptySide));
        assert_eq!(balance(&["H2"], &empty), Err(BalanceError::EmptySide));
        assert!(matches!(
            balance(&["H2", "O2)"], &["H2O"]),
            Err(BalanceError::Species { species, .. }) if species == "O2)"
        ));
    }

    #[test]
    fn test_balanced_equation() {
        let equation = BalancedEquation::new(&["H2", "O2"], &["H2O"]).unwrap();
        assert_eq!(equation.reactants, vec![(2, "H2".to_string()), (1, "O2".to_string())]);
        assert_eq!(equation.to_string(), "2 H2 + O2 -> 2 H2O");

        let equation = balance_reaction("Al + O2 = Al2O3").unwrap();
        assert_eq!(equation.to_string(), "4 Al + 3 O2 -> 2 Al2O3");

        let equation = balance_reaction("2 H2 + 5 O2 -> 7 H2O").unwrap();
        assert_eq!(equation.to_string(), "2 H2 + O2 -> 2 H2O");

        assert!(matches!(
            balance_reaction("H2 + O2"),
            Err(BalanceError::Reaction(_))
        ));
    }
}
