use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::edgar::fetch;

/// Runtime knobs, all overridable from the environment.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    /// Identifies us to EDGAR; their fair-access policy requires a contact.
    pub user_agent: String,
    /// Where fetched filings land and where extraction reads from.
    pub data_dir: PathBuf,
    /// Filings before this year are skipped when fetching.
    pub min_filing_year: i32,
}

impl ExtractConfig {
    pub fn from_env() -> Result<Self> {
        let user_agent =
            std::env::var("SEC_USER_AGENT").unwrap_or_else(|_| fetch::USER_AGENT.to_string());

        let data_dir = PathBuf::from(
            std::env::var("SEC_DATA_DIR").unwrap_or_else(|_| "raw_filings".to_string()),
        );

        let min_filing_year = match std::env::var("SEC_MIN_FILING_YEAR") {
            Ok(value) => value
                .parse()
                .map_err(|_| anyhow!("SEC_MIN_FILING_YEAR is not a year: {}", value))?,
            Err(_) => 2004,
        };

        Ok(Self {
            user_agent,
            data_dir,
            min_filing_year,
        })
    }
}
