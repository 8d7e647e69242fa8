//! Map raw extracted records into the fixed output schema. Absent figures
//! stay `None` all the way through, distinct from a legitimate zero.

use chrono::NaiveDate;
use serde::Serialize;

use crate::edgar::classify::FilingMetadata;
use crate::edgar::parsing::types::{RawHolding, RawTransaction};

/// One row of the quarterly-holdings output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingRow {
    pub fund_cik: String,
    pub report_date: Option<NaiveDate>,
    pub filing_date: Option<NaiveDate>,
    pub cusip: String,
    pub company_name: String,
    pub shares: Option<i64>,
    pub value_usd: Option<i64>,
}

/// One row of the insider-transactions output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRow {
    pub accession_no: String,
    pub issuer_cik: Option<String>,
    pub issuer_ticker: Option<String>,
    pub insider_cik: Option<String>,
    pub insider_name: Option<String>,
    pub insider_relation: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_code: Option<String>,
    pub shares: Option<i64>,
    pub price_per_share: Option<f64>,
    pub shares_owned_after: Option<i64>,
}

/// Align aggregated 13F holdings with the output schema. The filer's CIK is
/// caller-supplied (it is not reliably present in content), and the reported
/// value — in thousands of dollars — is scaled to USD here.
pub fn normalize_holdings(
    raw: &[RawHolding],
    fund_cik: &str,
    metadata: &FilingMetadata,
) -> Vec<HoldingRow> {
    raw.iter()
        .map(|holding| HoldingRow {
            fund_cik: fund_cik.to_string(),
            report_date: metadata.report_date,
            filing_date: metadata.filing_date,
            cusip: holding.cusip.clone(),
            company_name: holding.issuer_name.clone(),
            shares: holding.shares,
            value_usd: holding.value.map(|v| v * 1000),
        })
        .collect()
}

/// Align Form 4 transactions with the output schema, order preserved.
pub fn normalize_transactions(
    raw: &[RawTransaction],
    accession_no: &str,
    metadata: &FilingMetadata,
) -> Vec<TransactionRow> {
    raw.iter()
        .map(|tx| TransactionRow {
            accession_no: accession_no.to_string(),
            issuer_cik: non_empty(&tx.issuer_cik),
            issuer_ticker: non_empty(&tx.issuer_ticker),
            insider_cik: non_empty(&tx.owner_cik),
            insider_name: non_empty(&tx.owner_name),
            insider_relation: insider_relation(tx),
            filing_date: metadata.filing_date,
            transaction_date: to_date(&tx.transaction_date),
            transaction_code: non_empty(&tx.transaction_code),
            shares: to_int(&tx.shares_transacted),
            price_per_share: to_float(&tx.price_per_share),
            shares_owned_after: to_int(&tx.shares_owned_after),
        })
        .collect()
}

/// A descriptive string for the insider's relationship to the issuer, e.g.
/// "Director, Chief Financial Officer" or "10% Owner".
fn insider_relation(tx: &RawTransaction) -> Option<String> {
    let mut relations = Vec::new();
    if tx.is_director {
        relations.push("Director".to_string());
    }
    if tx.is_officer {
        if tx.officer_title.is_empty() {
            relations.push("Officer".to_string());
        } else {
            relations.push(tx.officer_title.clone());
        }
    }
    if tx.is_ten_percent_owner {
        relations.push("10% Owner".to_string());
    }
    if relations.is_empty() {
        None
    } else {
        Some(relations.join(", "))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Convert a reported count, tolerating thousands separators. Anything else
/// is absent, not zero.
pub fn to_int(value: &str) -> Option<i64> {
    let cleaned = value.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

pub fn to_float(value: &str) -> Option<f64> {
    let cleaned = value.trim().replace(',', "").replace('$', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

pub fn to_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdings_value_is_scaled_to_usd() {
        let raw = vec![RawHolding {
            issuer_name: "APPLE INC".to_string(),
            cusip: "037833100".to_string(),
            value: Some(1500),
            shares: Some(100),
            share_type: Some("SH".to_string()),
        }];
        let rows = normalize_holdings(&raw, "0001234567", &FilingMetadata::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fund_cik, "0001234567");
        assert_eq!(rows[0].value_usd, Some(1_500_000));
        assert_eq!(rows[0].shares, Some(100));
    }

    #[test]
    fn absent_value_stays_absent() {
        let raw = vec![RawHolding {
            cusip: "037833100".to_string(),
            ..RawHolding::default()
        }];
        let rows = normalize_holdings(&raw, "1", &FilingMetadata::default());
        assert_eq!(rows[0].value_usd, None);
        assert_eq!(rows[0].shares, None);
    }

    #[test]
    fn transaction_figures_convert_with_separators() {
        let raw = vec![RawTransaction {
            issuer_ticker: "AAPL".to_string(),
            transaction_date: "2024-02-01".to_string(),
            transaction_code: "S".to_string(),
            shares_transacted: "1,500".to_string(),
            price_per_share: "185.25".to_string(),
            shares_owned_after: "98,500".to_string(),
            ..RawTransaction::default()
        }];
        let rows = normalize_transactions(&raw, "0000320193-24-000001", &FilingMetadata::default());
        assert_eq!(rows[0].shares, Some(1500));
        assert_eq!(rows[0].price_per_share, Some(185.25));
        assert_eq!(rows[0].shares_owned_after, Some(98_500));
        assert_eq!(
            rows[0].transaction_date,
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(rows[0].insider_relation, None);
    }

    #[test]
    fn insider_relation_combines_roles() {
        let mut tx = RawTransaction {
            is_director: true,
            is_officer: true,
            officer_title: "Chief Executive Officer".to_string(),
            is_ten_percent_owner: true,
            ..RawTransaction::default()
        };
        assert_eq!(
            insider_relation(&tx).as_deref(),
            Some("Director, Chief Executive Officer, 10% Owner")
        );

        tx.officer_title.clear();
        tx.is_director = false;
        tx.is_ten_percent_owner = false;
        assert_eq!(insider_relation(&tx).as_deref(), Some("Officer"));
    }

    #[test]
    fn malformed_figures_are_absent() {
        assert_eq!(to_int("n/a"), None);
        assert_eq!(to_float(""), None);
        assert_eq!(to_date("tomorrow"), None);
    }
}
