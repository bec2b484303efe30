// src/auction.rs

use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::FetchError;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SecurityType {
    Bill,
    Note,
    Bond,
    Tips,
    TipsNote,
    TipsBond,
    Frn,
    FrnNote,
    FrnBond,
    Cmb,
    Other(String),
}

impl SecurityType {
    /// Inflation-protected, floating-rate and cash-management issues.
    pub fn is_excluded_family(&self) -> bool {
        matches!(
            self,
            SecurityType::Tips
                | SecurityType::TipsNote
                | SecurityType::TipsBond
                | SecurityType::Frn
                | SecurityType::FrnNote
                | SecurityType::FrnBond
                | SecurityType::Cmb
        )
    }

    pub fn is_nominal_coupon_or_bill(&self) -> bool {
        matches!(self, SecurityType::Bill | SecurityType::Note | SecurityType::Bond)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SecurityType::Bill => "Bill",
            SecurityType::Note => "Note",
            SecurityType::Bond => "Bond",
            SecurityType::Tips => "TIPS",
            SecurityType::TipsNote => "TIPS Note",
            SecurityType::TipsBond => "TIPS Bond",
            SecurityType::Frn => "FRN",
            SecurityType::FrnNote => "FRN Note",
            SecurityType::FrnBond => "FRN Bond",
            SecurityType::Cmb => "CMB",
            SecurityType::Other(raw) => raw,
        }
    }
}

impl From<&str> for SecurityType {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "Bill" => SecurityType::Bill,
            "Note" => SecurityType::Note,
            "Bond" => SecurityType::Bond,
            "TIPS" => SecurityType::Tips,
            "TIPS Note" => SecurityType::TipsNote,
            "TIPS Bond" => SecurityType::TipsBond,
            "FRN" => SecurityType::Frn,
            "FRN Note" => SecurityType::FrnNote,
            "FRN Bond" => SecurityType::FrnBond,
            "CMB" => SecurityType::Cmb,
            other => SecurityType::Other(other.to_string()),
        }
    }
}

impl FromStr for SecurityType {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(SecurityType::from(raw))
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One auctioned issue. A CUSIP can appear more than once when it is reopened,
/// so identity is the CUSIP together with the issue date.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuctionRecord {
    pub cusip: String,
    pub security_type: SecurityType,
    pub original_security_term: String,
    pub security_term_week_year: String,
    pub auction_date: NaiveDate,
    pub issue_date: NaiveDate,
    pub maturity_date: NaiveDate,
}

impl AuctionRecord {
    pub fn identity(&self) -> (&str, NaiveDate) {
        (&self.cusip, self.issue_date)
    }

    /// A bill whose current term differs from its original term was reopened, not newly issued.
    pub fn is_reopened_bill(&self) -> bool {
        self.security_type == SecurityType::Bill
            && self.original_security_term != self.security_term_week_year
    }

    /// Nominal, newly originated issues only.
    pub fn is_eligible(&self) -> bool {
        !self.security_type.is_excluded_family() && !self.is_reopened_bill()
    }

    pub fn date(&self, field: DateField) -> NaiveDate {
        match field {
            DateField::Auction => self.auction_date,
            DateField::Issue => self.issue_date,
            DateField::Maturity => self.maturity_date,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateField {
    Auction,
    Issue,
    Maturity,
}

/// Row shape of the fiscal data `auctions_query` endpoint.
#[derive(Debug, Deserialize)]
pub struct FiscalAuctionRow {
    #[serde(default)]
    pub cusip: Option<String>,
    #[serde(default)]
    pub security_type: Option<String>,
    #[serde(default)]
    pub original_security_term: Option<String>,
    #[serde(default)]
    pub security_term_week_year: Option<String>,
    #[serde(default)]
    pub auction_date: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub maturity_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FiscalAuctionPage {
    pub data: Vec<FiscalAuctionRow>,
}

impl TryFrom<FiscalAuctionRow> for AuctionRecord {
    type Error = FetchError;

    fn try_from(row: FiscalAuctionRow) -> Result<Self, Self::Error> {
        let cusip = present(row.cusip).ok_or_else(|| FetchError::malformed("auction row without cusip"))?;
        Ok(AuctionRecord {
            security_type: present(row.security_type)
                .map(|raw| SecurityType::from(raw.as_str()))
                .unwrap_or_else(|| SecurityType::Other(String::new())),
            original_security_term: present(row.original_security_term).unwrap_or_default(),
            security_term_week_year: present(row.security_term_week_year).unwrap_or_default(),
            auction_date: required_date(&cusip, "auction_date", row.auction_date)?,
            issue_date: required_date(&cusip, "issue_date", row.issue_date)?,
            maturity_date: required_date(&cusip, "maturity_date", row.maturity_date)?,
            cusip,
        })
    }
}

/// Entry of the TreasuryDirect `securities/auctioned` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionedSecurity {
    pub cusip: String,
    #[serde(rename = "type")]
    pub security_type: String,
    #[serde(default)]
    pub original_security_term: Option<String>,
    #[serde(default)]
    pub security_term: Option<String>,
    #[serde(default)]
    pub auction_date: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub maturity_date: Option<String>,
}

impl TryFrom<AuctionedSecurity> for AuctionRecord {
    type Error = FetchError;

    fn try_from(security: AuctionedSecurity) -> Result<Self, Self::Error> {
        let issue_date = required_date(&security.cusip, "issueDate", security.issue_date)?;
        Ok(AuctionRecord {
            security_type: SecurityType::from(security.security_type.as_str()),
            original_security_term: present(security.original_security_term).unwrap_or_default(),
            security_term_week_year: present(security.security_term).unwrap_or_default(),
            auction_date: required_date(&security.cusip, "auctionDate", security.auction_date)?,
            maturity_date: required_date(&security.cusip, "maturityDate", security.maturity_date)?,
            issue_date,
            cusip: security.cusip,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty() && raw != "null")
}

/// Accepts `2024-05-28` and `2024-05-28T00:00:00`.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn required_date(cusip: &str, field: &str, raw: Option<String>) -> Result<NaiveDate, FetchError> {
    parse_date(raw.as_deref())
        .ok_or_else(|| FetchError::malformed(format!("{} has no usable {}: {:?}", cusip, field, raw)))
}
