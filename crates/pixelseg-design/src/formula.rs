// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use pixelseg_core::QueryError;
use std::fmt;

/// One non-intercept term of a regression formula.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// The free date variable `x`.
    Trend,
    /// Annual harmonic pair `harm(x, k)`: cosine and sine at frequency `k`.
    Harmonic { k: u32 },
    /// Treatment-coded categorical dummies over a named covariate, `C(name)`.
    Categorical { name: String },
}

/// A parsed `+`-separated regression formula over the free date variable
/// `x` and named covariates.
///
/// `1` turns the intercept on (the default), `0` turns it off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula {
    intercept: bool,
    terms: Vec<Term>,
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::configuration("formula must not be empty"));
        }

        let mut intercept = true;
        let mut terms: Vec<Term> = Vec::new();

        for raw in text.split('+') {
            let token = raw.trim();
            if token.is_empty() {
                return Err(QueryError::configuration(format!(
                    "empty term in formula {text:?}"
                )));
            }
            match token {
                "1" => intercept = true,
                "0" => intercept = false,
                "x" => push_unique(&mut terms, Term::Trend, text)?,
                _ if token.starts_with("harm(") => {
                    push_unique(&mut terms, parse_harmonic(token)?, text)?;
                }
                _ if token.starts_with("C(") => {
                    push_unique(&mut terms, parse_categorical(token)?, text)?;
                }
                _ => {
                    return Err(QueryError::configuration(format!(
                        "unknown formula term {token:?} in {text:?}"
                    )));
                }
            }
        }

        if !intercept && terms.is_empty() {
            return Err(QueryError::configuration(format!(
                "formula {text:?} has neither intercept nor terms"
            )));
        }

        Ok(Self { intercept, terms })
    }

    pub fn intercept(&self) -> bool {
        self.intercept
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn has_categorical(&self) -> bool {
        self.terms
            .iter()
            .any(|term| matches!(term, Term::Categorical { .. }))
    }

    /// The same formula with every categorical term removed; the reduced
    /// basis used for continuous-curve reconstruction.
    pub fn without_categorical(&self) -> Self {
        Self {
            intercept: self.intercept,
            terms: self
                .terms
                .iter()
                .filter(|term| !matches!(term, Term::Categorical { .. }))
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.intercept { "1" } else { "0" })?;
        for term in &self.terms {
            match term {
                Term::Trend => write!(f, " + x")?,
                Term::Harmonic { k } => write!(f, " + harm(x, {k})")?,
                Term::Categorical { name } => write!(f, " + C({name})")?,
            }
        }
        Ok(())
    }
}

fn push_unique(terms: &mut Vec<Term>, term: Term, text: &str) -> Result<(), QueryError> {
    if terms.contains(&term) {
        return Err(QueryError::configuration(format!(
            "duplicate term {term:?} in formula {text:?}"
        )));
    }
    terms.push(term);
    Ok(())
}

fn parse_harmonic(token: &str) -> Result<Term, QueryError> {
    let inner = token
        .strip_prefix("harm(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| QueryError::configuration(format!("malformed harmonic term {token:?}")))?;
    let mut parts = inner.split(',');
    let (var, freq) = match (parts.next(), parts.next(), parts.next()) {
        (Some(var), Some(freq), None) => (var.trim(), freq.trim()),
        _ => {
            return Err(QueryError::configuration(format!(
                "harmonic term {token:?} must have the form harm(x, k)"
            )));
        }
    };
    if var != "x" {
        return Err(QueryError::configuration(format!(
            "harmonic term {token:?} must use the date variable x; got {var:?}"
        )));
    }
    let k: u32 = freq.parse().map_err(|_| {
        QueryError::configuration(format!("harmonic frequency {freq:?} is not an integer"))
    })?;
    if k == 0 {
        return Err(QueryError::configuration(format!(
            "harmonic frequency must be >= 1 in {token:?}"
        )));
    }
    Ok(Term::Harmonic { k })
}

fn parse_categorical(token: &str) -> Result<Term, QueryError> {
    let name = token
        .strip_prefix("C(")
        .and_then(|rest| rest.strip_suffix(')'))
        .map(str::trim)
        .ok_or_else(|| {
            QueryError::configuration(format!("malformed categorical term {token:?}"))
        })?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(QueryError::configuration(format!(
            "categorical term {token:?} must name a covariate"
        )));
    }
    Ok(Term::Categorical {
        name: name.to_string(),
    })
}
