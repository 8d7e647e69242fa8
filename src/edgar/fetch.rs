use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::classify::FilingType;

pub const EDGAR_DATA_URL: &str = "https://data.sec.gov";
pub const EDGAR_ARCHIVES_URL: &str = "https://www.sec.gov/Archives/edgar/data";
pub const USER_AGENT: &str = "sec-extract/0.1 (software@example.com)";

const RETRY_COUNT: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// The submissions index for one company, as served by data.sec.gov.
#[derive(Debug, Deserialize)]
pub struct CompanySubmissions {
    pub cik: String,
    pub name: String,
    pub filings: FilingsData,
}

#[derive(Debug, Deserialize)]
pub struct FilingsData {
    pub recent: FilingIndex,
}

/// The index stores each field as a parallel array, one element per filing.
#[derive(Debug, Deserialize)]
pub struct FilingIndex {
    #[serde(rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    #[serde(rename = "filingDate")]
    pub filing_date: Vec<NaiveDate>,
    pub form: Vec<String>,
    #[serde(rename = "primaryDocument")]
    pub primary_document: Vec<String>,
}

/// One filing worth downloading.
#[derive(Debug, Clone)]
pub struct FilingRef {
    pub accession_number: String,
    pub filing_type: FilingType,
    pub filing_date: NaiveDate,
    pub primary_document: String,
}

impl FilingIndex {
    /// Zip the parallel arrays into per-filing records, keeping only the
    /// form types this pipeline handles.
    pub fn entries(&self) -> Vec<FilingRef> {
        (0..self.accession_number.len())
            .filter_map(|i| {
                let filing_type: FilingType = self.form.get(i)?.parse().ok()?;
                Some(FilingRef {
                    accession_number: self.accession_number.get(i)?.clone(),
                    filing_type,
                    filing_date: *self.filing_date.get(i)?,
                    primary_document: self.primary_document.get(i)?.clone(),
                })
            })
            .collect()
    }
}

pub fn submissions_url(cik: &str) -> Result<Url> {
    let padded = format!("{:0>10}", cik);
    Ok(Url::parse(&format!(
        "{}/submissions/CIK{}.json",
        EDGAR_DATA_URL, padded
    ))?)
}

pub fn archive_url(cik: &str, accession_number: &str, filename: &str) -> Result<Url> {
    let accession = accession_number.replace('-', "");
    Ok(Url::parse(&format!(
        "{}/{}/{}/{}",
        EDGAR_ARCHIVES_URL,
        cik.trim_start_matches('0'),
        accession,
        filename
    ))?)
}

pub async fn fetch_submissions(
    client: &Client,
    cik: &str,
    user_agent: &str,
) -> Result<CompanySubmissions> {
    let url = submissions_url(cik)?;
    let body = fetch_with_retry(client, &url, user_agent)
        .await?
        .ok_or_else(|| anyhow!("submissions index not found for CIK {}", cik))?;
    serde_json::from_str(&body)
        .map_err(|e| anyhow!("failed to parse submissions JSON for CIK {}: {}", cik, e))
}

/// GET with bounded retries and exponential backoff. A 4xx means the file
/// simply is not there and yields Ok(None); transient failures retry and the
/// last error surfaces once attempts run out.
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    user_agent: &str,
) -> Result<Option<String>> {
    let mut last_err = None;
    for attempt in 0..RETRY_COUNT {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(BACKOFF_BASE_MS * (1 << attempt))).await;
        }
        debug!("fetching {} (attempt {})", url, attempt + 1);
        match client
            .get(url.as_str())
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                return Ok(Some(response.text().await?));
            }
            Ok(response) if response.status().is_client_error() => {
                debug!("{} returned {}", url, response.status());
                return Ok(None);
            }
            Ok(response) => {
                last_err = Some(anyhow!("HTTP {} from {}", response.status(), url));
            }
            Err(err) => last_err = Some(err.into()),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("fetch failed: {}", url)))
}

/// Download one filing into `root/<cik>/<form>/<accession>.xml`.
///
/// 13F filings try the dedicated information-table filenames before the
/// primary document, since the table file is the one worth parsing. Already
/// downloaded filings are skipped.
pub async fn download_filing(
    client: &Client,
    cik: &str,
    filing: &FilingRef,
    root: &Path,
    user_agent: &str,
) -> Result<Option<PathBuf>> {
    let form_dir = filing.filing_type.to_string().replace('/', "_A");
    let dir = root.join(cik).join(form_dir);
    std::fs::create_dir_all(&dir)?;
    let dest = dir.join(format!("{}.xml", filing.accession_number));
    if dest.exists() {
        debug!("{} already downloaded", filing.accession_number);
        return Ok(Some(dest));
    }

    let mut candidates: Vec<String> = Vec::new();
    if filing.filing_type.is_13f() {
        candidates.push("form13fInfoTable.xml".to_string());
        candidates.push("infotable.xml".to_string());
    }
    candidates.push(filing.primary_document.clone());

    for filename in candidates {
        let url = archive_url(cik, &filing.accession_number, &filename)?;
        if let Some(content) = fetch_with_retry(client, &url, user_agent).await? {
            std::fs::write(&dest, &content)?;
            info!("downloaded {} for {}", filename, filing.accession_number);
            return Ok(Some(dest));
        }
    }

    warn!("no document retrievable for {}", filing.accession_number);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_url_pads_cik() {
        let url = submissions_url("320193").unwrap();
        assert_eq!(
            url.as_str(),
            "https://data.sec.gov/submissions/CIK0000320193.json"
        );
    }

    #[test]
    fn archive_url_strips_dashes_and_leading_zeros() {
        let url = archive_url("0000320193", "0000320193-24-000001", "form13fInfoTable.xml").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000001/form13fInfoTable.xml"
        );
    }

    #[test]
    fn index_entries_keep_only_handled_forms() {
        let index: FilingIndex = serde_json::from_str(
            r#"{
                "accessionNumber": ["a-1", "a-2", "a-3"],
                "filingDate": ["2024-02-01", "2023-05-12", "2022-11-30"],
                "form": ["13F-HR", "10-K", "4/A"],
                "primaryDocument": ["form13f.xml", "annual.htm", "form4.xml"]
            }"#,
        )
        .unwrap();
        let entries = index.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].filing_type, FilingType::Form13FHoldings);
        assert_eq!(entries[1].filing_type, FilingType::Form4Amendment);
        assert_eq!(entries[1].accession_number, "a-3");
    }
}
