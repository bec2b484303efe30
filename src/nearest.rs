// src/nearest.rs

use chrono::{Duration, NaiveDate};

use crate::auction::{AuctionRecord, DateField};
use crate::error::ResolveError;
use crate::tenor::Tenor;

/// Money-market year used to turn a tenor into a calendar offset.
pub const DAYS_PER_YEAR: f64 = 360.0;

#[derive(Clone, Debug, PartialEq)]
pub struct TenorMatch {
    pub tenor: Tenor,
    pub target_date: NaiveDate,
    pub record: AuctionRecord,
}

/// `today + round(years × 360)` days.
pub fn target_date(today: NaiveDate, years: f64) -> NaiveDate {
    today + Duration::days((years * DAYS_PER_YEAR).round() as i64)
}

/// For each target tenor, the candidate whose `field` date lies closest to the
/// synthetic target date. Ties go to the candidate seen first.
pub struct NearestTenorMatcher {
    today: NaiveDate,
    field: DateField,
}

impl NearestTenorMatcher {
    pub fn new(today: NaiveDate, field: DateField) -> Self {
        NearestTenorMatcher { today, field }
    }

    pub fn by_maturity(today: NaiveDate) -> Self {
        NearestTenorMatcher::new(today, DateField::Maturity)
    }

    pub fn match_targets<T>(&self, targets: &[T], candidates: &[AuctionRecord]) -> Result<Vec<TenorMatch>, ResolveError>
    where
        T: Copy + Into<Tenor>,
    {
        if candidates.is_empty() {
            return Err(ResolveError::EmptyCandidates);
        }
        targets
            .iter()
            .map(|target| {
                let tenor: Tenor = (*target).into();
                let target_date = target_date(self.today, tenor.years());
                let record = self
                    .closest(candidates, target_date)
                    .ok_or(ResolveError::EmptyCandidates)?;
                Ok(TenorMatch {
                    tenor,
                    target_date,
                    record: record.clone(),
                })
            })
            .collect()
    }

    fn closest<'a>(&self, candidates: &'a [AuctionRecord], target: NaiveDate) -> Option<&'a AuctionRecord> {
        let mut best: Option<(i64, &AuctionRecord)> = None;
        for candidate in candidates {
            let distance = (candidate.date(self.field) - target).num_days().abs();
            match best {
                Some((closest, _)) if closest <= distance => {}
                _ => best = Some((distance, candidate)),
            }
        }
        best.map(|(_, record)| record)
    }
}
