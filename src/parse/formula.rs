use crate::ReferenceTables;
use nom::{
    branch::alt,
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{map, opt, recognize},
    sequence::{pair, preceded},
    IResult,
};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use thiserror::Error;
use tracing::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("empty formula")]
    Empty,
    #[error("unexpected character '{found}' at position {position} in formula {formula}")]
    UnexpectedCharacter {
        formula: String,
        position: usize,
        found: char,
    },
    #[error("unbalanced parentheses in formula {0}")]
    UnbalancedParentheses(String),
    #[error("count {count} at position {position} in formula {formula} does not follow an element or group")]
    DanglingCount {
        formula: String,
        position: usize,
        count: String,
    },
    #[error("zero count at position {position} in formula {formula}")]
    ZeroCount { formula: String, position: usize },
    #[error("count overflow in formula {0}")]
    CountOverflow(String),
    #[error("unknown symbol '{symbol}' in formula {formula}")]
    UnknownSymbol { formula: String, symbol: String },
}

/// Whether a species is a free element or a compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeciesKind {
    Element,
    Compound,
}

/// A parsed chemical formula.
///
/// Keeps the raw text, the flattened left-to-right sequence of
/// `(symbol, count)` entries and the aggregated count per symbol.
/// Parenthesized groups are expanded into both: `Ca(OH)2` has the
/// ordered entries `Ca1 O2 H2` and the counts `{Ca: 1, H: 2, O: 2}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    raw: String,
    ordered: Vec<(String, u32)>,
    counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Symbol(&'a str),
    Open,
    Close,
    Count(&'a str),
}

/// An element symbol: one uppercase letter, optionally one lowercase letter.
fn symbol(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_uppercase()),
            opt(satisfy(|c| c.is_ascii_lowercase())),
        )),
        Token::Symbol,
    )(input)
}

fn token(input: &str) -> IResult<&str, Token> {
    preceded(
        multispace0,
        alt((
            symbol,
            map(char('('), |_| Token::Open),
            map(char(')'), |_| Token::Close),
            map(digit1, Token::Count),
        )),
    )(input)
}

/// Split a formula into positioned tokens.
fn tokenize(formula: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let mut tokens = Vec::new();
    let mut rest = formula;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        let position = formula.len() - trimmed.len();
        match token(trimmed) {
            Ok((next, tok)) => {
                trace!("token {:?} at {}", tok, position);
                tokens.push((position, tok));
                rest = next;
            }
            Err(_) => {
                let found = trimmed.chars().next().unwrap_or_default();
                return Err(FormulaError::UnexpectedCharacter {
                    formula: formula.to_string(),
                    position,
                    found,
                });
            }
        }
    }
    Ok(tokens)
}

/// One level of the group stack.
#[derive(Default)]
struct Group {
    ordered: Vec<(String, u32)>,
    counts: BTreeMap<String, u32>,
}

impl Group {
    fn add(&mut self, symbol: &str, count: u32, formula: &str) -> Result<(), FormulaError> {
        self.ordered.push((symbol.to_string(), count));
        let total = self.counts.entry(symbol.to_string()).or_insert(0);
        *total = total
            .checked_add(count)
            .ok_or_else(|| FormulaError::CountOverflow(formula.to_string()))?;
        Ok(())
    }

    /// Fold a closed group into this one, scaling every entry by `multiplier`.
    fn absorb(&mut self, inner: Group, multiplier: u32, formula: &str) -> Result<(), FormulaError> {
        for (symbol, count) in inner.ordered {
            let scaled = count
                .checked_mul(multiplier)
                .ok_or_else(|| FormulaError::CountOverflow(formula.to_string()))?;
            self.add(&symbol, scaled, formula)?;
        }
        Ok(())
    }
}

fn parse_count(formula: &str, position: usize, digits: &str) -> Result<u32, FormulaError> {
    let count = digits
        .parse::<u32>()
        .map_err(|_| FormulaError::CountOverflow(formula.to_string()))?;
    if count == 0 {
        return Err(FormulaError::ZeroCount {
            formula: formula.to_string(),
            position,
        });
    }
    Ok(count)
}

impl Formula {
    /// Parse a formula such as `CuSO4`, `Ca(OH)2` or `K4(Fe(CN)6)`.
    ///
    /// Symbols are only checked for shape (`[A-Z][a-z]?`), not against the
    /// periodic table. Use [`Formula::parse_strict`] for that.
    pub fn parse(formula: &str) -> Result<Self, FormulaError> {
        if formula.trim().is_empty() {
            return Err(FormulaError::Empty);
        }
        let tokens = tokenize(formula)?;

        let mut stack = vec![Group::default()];
        let mut i = 0;
        while i < tokens.len() {
            let (position, tok) = tokens[i];
            i += 1;
            // An optional count directly after a symbol or a closing group.
            let trailing_count = |i: &mut usize| -> Result<u32, FormulaError> {
                match tokens.get(*i) {
                    Some(&(pos, Token::Count(digits))) => {
                        *i += 1;
                        parse_count(formula, pos, digits)
                    }
                    _ => Ok(1),
                }
            };
            match tok {
                Token::Open => stack.push(Group::default()),
                Token::Close => {
                    if stack.len() < 2 {
                        return Err(FormulaError::UnbalancedParentheses(formula.to_string()));
                    }
                    let multiplier = trailing_count(&mut i)?;
                    if let Some(inner) = stack.pop() {
                        if let Some(top) = stack.last_mut() {
                            top.absorb(inner, multiplier, formula)?;
                        }
                    }
                }
                Token::Symbol(sym) => {
                    let count = trailing_count(&mut i)?;
                    if let Some(top) = stack.last_mut() {
                        top.add(sym, count, formula)?;
                    }
                }
                Token::Count(digits) => {
                    return Err(FormulaError::DanglingCount {
                        formula: formula.to_string(),
                        position,
                        count: digits.to_string(),
                    });
                }
            }
        }

        if stack.len() != 1 {
            return Err(FormulaError::UnbalancedParentheses(formula.to_string()));
        }
        let root = stack.pop().unwrap_or_default();
        if root.ordered.is_empty() {
            return Err(FormulaError::Empty);
        }
        debug!("parsed {} into {:?}", formula, root.counts);
        Ok(Self {
            raw: formula.trim().to_string(),
            ordered: root.ordered,
            counts: root.counts,
        })
    }

    /// Like [`Formula::parse`], but every symbol must be a known element in
    /// `tables`.
    pub fn parse_strict(formula: &str, tables: &ReferenceTables) -> Result<Self, FormulaError> {
        let parsed = Self::parse(formula)?;
        if let Some(unknown) = parsed
            .counts
            .keys()
            .find(|sym| !tables.is_element(sym))
        {
            return Err(FormulaError::UnknownSymbol {
                formula: formula.to_string(),
                symbol: unknown.clone(),
            });
        }
        Ok(parsed)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Flattened `(symbol, count)` entries in the order they were written.
    pub fn ordered(&self) -> &[(String, u32)] {
        &self.ordered
    }

    /// Total count per symbol.
    pub fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    pub fn count_of(&self, symbol: &str) -> u32 {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// True when the formula holds exactly one distinct symbol (`Zn`, `Cl2`, `O3`).
    pub fn is_single_element(&self) -> bool {
        self.counts.len() == 1
    }

    /// `Element` only for a lone atom written once with count 1 (`Zn`, `K`).
    pub fn kind(&self) -> SpeciesKind {
        match self.ordered.as_slice() {
            [(_, 1)] => SpeciesKind::Element,
            _ => SpeciesKind::Compound,
        }
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.raw)
    }
}
