// src/tenor.rs

use lazy_static::lazy_static;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::FetchError;

/// Maturity horizon in fractional years, usable as an ordered map key.
#[derive(Clone, Copy, Debug)]
pub struct Tenor(f64);

impl Tenor {
    pub fn new(years: f64) -> Self {
        // -0.0 and 0.0 must hash alike
        Tenor(if years == 0.0 { 0.0 } else { years })
    }

    pub fn years(self) -> f64 {
        self.0
    }
}

impl PartialEq for Tenor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Tenor {}

impl PartialOrd for Tenor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tenor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Tenor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for Tenor {
    fn from(years: f64) -> Self {
        Tenor::new(years)
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as i64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

lazy_static! {
    /// Canonical auction term labels and their numeric tenors, in maturity order.
    static ref TENOR_MAPPING: Vec<(&'static str, Tenor)> = vec![
        ("17-Week", Tenor(0.25)),
        ("26-Week", Tenor(0.5)),
        ("52-Week", Tenor(1.0)),
        ("2-Year", Tenor(2.0)),
        ("3-Year", Tenor(3.0)),
        ("5-Year", Tenor(5.0)),
        ("7-Year", Tenor(7.0)),
        ("10-Year", Tenor(10.0)),
        ("20-Year", Tenor(20.0)),
        ("30-Year", Tenor(30.0)),
    ];
}

pub struct TenorMapping;

impl TenorMapping {
    pub fn tenor(term: &str) -> Option<Tenor> {
        TENOR_MAPPING
            .iter()
            .find(|(label, _)| *label == term)
            .map(|(_, tenor)| *tenor)
    }

    pub fn label(tenor: Tenor) -> Option<&'static str> {
        TENOR_MAPPING
            .iter()
            .find(|(_, candidate)| *candidate == tenor)
            .map(|(label, _)| *label)
    }

    pub fn entries() -> impl Iterator<Item = (&'static str, Tenor)> {
        TENOR_MAPPING.iter().copied()
    }

    /// Tenors that have a current on-the-run coupon or bill benchmark.
    pub fn on_the_run_tenors() -> BTreeSet<Tenor> {
        [0.5, 1.0, 2.0, 3.0, 5.0, 7.0, 10.0, 20.0, 30.0]
            .into_iter()
            .map(Tenor::new)
            .collect()
    }

    /// Half-year and whole-year points out to 30 years that no benchmark covers.
    pub fn interpolation_targets() -> Vec<Tenor> {
        let on_the_run = Self::on_the_run_tenors();
        let grid: BTreeSet<Tenor> = (0..30)
            .map(|i| Tenor::new(0.5 + i as f64))
            .chain((1..=30).map(|i| Tenor::new(i as f64)))
            .collect();
        grid.difference(&on_the_run).copied().collect()
    }
}

/// Parses curve column labels such as `"3 Mo"` or `"10 Yr"` into years.
pub fn tenor_from_curve_label(label: &str) -> Result<Tenor, FetchError> {
    let mut parts = label.split_whitespace();
    let count = parts
        .next()
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| FetchError::malformed(format!("unexpected tenor format: {}", label)))?;
    match parts.next() {
        Some(unit) if unit.starts_with("Mo") => Ok(Tenor::new(count as f64 / 12.0)),
        Some(unit) if unit.starts_with("Yr") => Ok(Tenor::new(count as f64)),
        _ => Err(FetchError::malformed(format!("unexpected tenor format: {}", label))),
    }
}
