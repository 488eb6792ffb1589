//! Parsing of whole reaction strings such as `Zn + CuSO4 -> ZnSO4 + Cu`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, opt},
    error::{context, convert_error, VerboseError},
    multi::separated_list1,
    sequence::{delimited, separated_pair, terminated},
    IResult,
};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use thiserror::Error;
use tracing::*;

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReactionError {
    #[error("malformed reaction:\n{0}")]
    Malformed(String),
}

/// The two sides of a reaction, as written.
///
/// Leading stoichiometric coefficients are dropped while parsing, since the
/// balancer recomputes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub reactants: Vec<String>,
    pub products: Vec<String>,
}

fn is_formula_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '(' || c == ')'
}

/// A species with an optional leading coefficient: `2 H2O`, `2H2O`, `H2O`.
fn species(input: &str) -> Res<String> {
    let (input, _) = multispace0(input)?;
    let (input, _) = opt(terminated(digit1, multispace0))(input)?;
    context(
        "species",
        map(take_while1(is_formula_char), |s: &str| s.to_string()),
    )(input)
}

fn plus(input: &str) -> Res<char> {
    delimited(multispace0, char('+'), multispace0)(input)
}

fn side(input: &str) -> Res<Vec<String>> {
    separated_list1(plus, species)(input)
}

fn arrow(input: &str) -> Res<&str> {
    context(
        "arrow",
        delimited(
            multispace0,
            alt((tag("->"), tag("→"), tag("=>"), tag("="))),
            multispace0,
        ),
    )(input)
}

fn reaction(input: &str) -> Res<(Vec<String>, Vec<String>)> {
    terminated(separated_pair(side, arrow, side), multispace0)(input)
}

fn finish<T>(input: &str, result: Res<T>) -> Result<T, ReactionError> {
    match result {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(ReactionError::Malformed(convert_error(input, e)))
        }
        Err(nom::Err::Incomplete(_)) => Err(ReactionError::Malformed("incomplete".to_string())),
    }
}

impl Reaction {
    /// Parse `"<species> (+ <species>)* -> <species> (+ <species>)*"`.
    ///
    /// `->`, `→`, `=>` and `=` are all accepted as the arrow.
    pub fn parse(input: &str) -> Result<Self, ReactionError> {
        let (reactants, products) = finish(input, all_consuming(reaction)(input))?;
        debug!("reaction {:?} -> {:?}", reactants, products);
        Ok(Self {
            reactants,
            products,
        })
    }

    /// Parse a single side, e.g. `"Zn + CuSO4"`.
    pub fn parse_reactants(input: &str) -> Result<Vec<String>, ReactionError> {
        finish(
            input,
            all_consuming(terminated(side, multispace0))(input),
        )
    }
}

impl FromStr for Reaction {
    type Err = ReactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reaction::parse(s)
    }
}

impl Display for Reaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} -> {}",
            self.reactants.join(" + "),
            self.products.join(" + ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_reaction() {
        let reaction = Reaction::parse("Zn + CuSO4 -> ZnSO4 + Cu").unwrap();
        assert_eq!(reaction.reactants, strings(&["Zn", "CuSO4"]));
        assert_eq!(reaction.products, strings(&["ZnSO4", "Cu"]));
        assert_eq!(reaction.to_string(), "Zn + CuSO4 -> ZnSO4 + Cu");
    }

    #[test]
    fn test_arrows_and_spacing() {
        for raw in ["H2+O2->H2O", "H2 + O2 = H2O", "H2 + O2 => H2O", "H2 + O2 → H2O"] {
            let reaction: Reaction = raw.parse().unwrap();
            assert_eq!(reaction.reactants, strings(&["H2", "O2"]), "{raw}");
            assert_eq!(reaction.products, strings(&["H2O"]), "{raw}");
        }
    }

    #[test]
    fn test_coefficients_are_dropped() {
        let reaction = Reaction::parse("2 H2 + O2 -> 2H2O").unwrap();
        assert_eq!(reaction.reactants, strings(&["H2", "O2"]));
        assert_eq!(reaction.products, strings(&["H2O"]));
    }

    #[test]
    fn test_groups_survive() {
        let reaction = Reaction::parse("Ca + H2O -> Ca(OH)2 + H2").unwrap();
        assert_eq!(reaction.products, strings(&["Ca(OH)2", "H2"]));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            Reaction::parse("H2 + O2"),
            Err(ReactionError::Malformed(_))
        ));
        assert!(Reaction::parse("-> H2O").is_err());
        assert!(Reaction::parse("H2 + -> H2O").is_err());
        assert!(Reaction::parse("H2 -> H2O -> O2").is_err());
    }

    #[test]
    fn test_parse_reactants() {
        assert_eq!(
            Reaction::parse_reactants(" Zn + CuSO4 ").unwrap(),
            strings(&["Zn", "CuSO4"])
        );
        assert!(Reaction::parse_reactants("Zn ->").is_err());
    }
}
