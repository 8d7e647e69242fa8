use serde::{Deserialize, Serialize};
use std::fmt;

/// One holding extracted from a 13F information table, before normalization.
///
/// Field values are carried as reported by the filing: `value` is in
/// thousands of dollars (the 13F reporting unit) and is only scaled to USD
/// by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHolding {
    pub issuer_name: String,
    pub cusip: String,
    pub value: Option<i64>,
    pub shares: Option<i64>,
    pub share_type: Option<String>,
}

/// One non-derivative transaction extracted from a Form 4, before
/// normalization. Figures stay as strings here; the normalizer owns the
/// numeric conversions so a malformed figure never aborts extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub issuer_cik: String,
    pub issuer_name: String,
    pub issuer_ticker: String,
    pub owner_cik: String,
    pub owner_name: String,
    pub is_director: bool,
    pub is_officer: bool,
    pub is_ten_percent_owner: bool,
    pub officer_title: String,
    pub security_title: String,
    pub transaction_date: String,
    pub transaction_code: String,
    pub shares_transacted: String,
    pub price_per_share: String,
    pub acquired_disposed_code: String,
    pub shares_owned_after: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A recoverable extraction anomaly. These are collected per document and
/// returned alongside the records; nothing in the extraction path logs
/// directly or raises for a bad row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Where in the document the anomaly was seen, e.g. "table 2, line 14".
    pub context: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(context: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn error(context: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            context: context.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.context, self.message)
    }
}

/// CUSIP-like identifier: 8 or 9 alphanumeric characters.
pub fn looks_like_cusip(token: &str) -> bool {
    (8..=9).contains(&token.len()) && token.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Strip everything but ASCII digits and parse what is left. Legacy filings
/// interleave asterisks and punctuation into numeric columns, so "1,234*"
/// parses as 1234. Returns None when no digit survives.
pub fn parse_figure(raw: &str) -> Option<i64> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_figure_strips_punctuation() {
        assert_eq!(parse_figure("1,234"), Some(1234));
        assert_eq!(parse_figure("  500000 "), Some(500_000));
        assert_eq!(parse_figure("6,500*"), Some(6500));
        assert_eq!(parse_figure("$2,500"), Some(2500));
    }

    #[test]
    fn parse_figure_empty_is_none() {
        assert_eq!(parse_figure(""), None);
        assert_eq!(parse_figure("   "), None);
        assert_eq!(parse_figure("N/A"), None);
    }
}
