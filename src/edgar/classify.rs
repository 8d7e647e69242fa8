use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

/// The filing types this pipeline understands. Anything else classifies as
/// unknown and is skipped with a warning by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(try_from = "String")]
pub enum FilingType {
    Form13FHoldings,
    Form13FNotice,
    Form4,
    Form4Amendment,
}

impl FilingType {
    pub fn is_13f(&self) -> bool {
        matches!(self, FilingType::Form13FHoldings | FilingType::Form13FNotice)
    }

    pub fn list_types() -> &'static str {
        &FILING_TYPES
    }
}

static FILING_TYPES: Lazy<String> = Lazy::new(|| {
    FilingType::iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
});

impl fmt::Display for FilingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilingType::Form13FHoldings => write!(f, "13F-HR"),
            FilingType::Form13FNotice => write!(f, "13F-NT"),
            FilingType::Form4 => write!(f, "4"),
            FilingType::Form4Amendment => write!(f, "4/A"),
        }
    }
}

impl FromStr for FilingType {
    type Err = String;

    fn from_str(s: &str) -> Result<FilingType, String> {
        match s.to_uppercase().as_str() {
            "13F-HR" => Ok(FilingType::Form13FHoldings),
            "13F-NT" => Ok(FilingType::Form13FNotice),
            "4" => Ok(FilingType::Form4),
            "4/A" => Ok(FilingType::Form4Amendment),
            other => Err(format!("unknown filing type: {}", other)),
        }
    }
}

impl TryFrom<String> for FilingType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        FilingType::from_str(&s)
    }
}

/// Dates recovered from document content. Either may be absent; a malformed
/// date is reported as absent, never as some zero placeholder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingMetadata {
    pub filing_date: Option<NaiveDate>,
    pub report_date: Option<NaiveDate>,
}

/// A named content predicate. Rules are evaluated in the declared order and
/// the first match wins; documents routinely satisfy several heuristics at
/// once, so the order is load-bearing and tested on its own.
pub struct DetectionRule {
    pub name: &'static str,
    detect: fn(&str) -> Option<FilingType>,
}

pub static DETECTION_RULES: &[DetectionRule] = &[
    DetectionRule { name: "type-tag", detect: detect_type_tag },
    DetectionRule { name: "checked-box", detect: detect_checked_box },
    DetectionRule { name: "keyword", detect: detect_keyword },
    DetectionRule { name: "bare-xml", detect: detect_bare_xml },
];

/// Determine the filing type from content alone and pull out what metadata
/// the document exposes. Filenames and directory names are never consulted;
/// they lie more often than the content does.
pub fn classify(content: &str) -> (Option<FilingType>, FilingMetadata) {
    let filing_type = detect_filing_type(content).map(|(_, ft)| ft);
    (filing_type, extract_metadata(content))
}

/// Run the detection rules in order; also names the rule that matched, which
/// the order tests and debug logging use.
pub fn detect_filing_type(content: &str) -> Option<(&'static str, FilingType)> {
    DETECTION_RULES
        .iter()
        .find_map(|rule| (rule.detect)(content).map(|ft| (rule.name, ft)))
}

static TYPE_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<TYPE>([^<\n]+)").unwrap());

/// The `<TYPE>` tag of the submission wrapper is the most reliable signal
/// when present.
fn detect_type_tag(content: &str) -> Option<FilingType> {
    let tag = TYPE_TAG_RE.captures(content)?.get(1)?.as_str().trim().to_uppercase();
    if tag.contains("13F-HR") {
        Some(FilingType::Form13FHoldings)
    } else if tag.contains("13F-NT") {
        Some(FilingType::Form13FNotice)
    } else if tag.contains("4/A") {
        Some(FilingType::Form4Amendment)
    } else if tag.contains('4') {
        Some(FilingType::Form4)
    } else {
        // A tag for some other form type; let the remaining rules decide,
        // which for anything we handle means unknown.
        None
    }
}

static BOX_PATTERNS: Lazy<Vec<(Regex, FilingType)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)\[x\]\s*13F HOLDINGS REPORT").unwrap(),
            FilingType::Form13FHoldings,
        ),
        (
            Regex::new(r"(?i)\[x\]\s*13F NOTICE").unwrap(),
            FilingType::Form13FNotice,
        ),
        (
            Regex::new(r"(?i)x</span></td>\s*<td.*>13F HOLDINGS REPORT").unwrap(),
            FilingType::Form13FHoldings,
        ),
        (
            Regex::new(r"(?i)x</span></td>\s*<td.*>13F NOTICE").unwrap(),
            FilingType::Form13FNotice,
        ),
    ]
});

/// Cover pages carry a checked box for either "13F Holdings Report" or
/// "13F Notice". A filer checks exactly one; when both patterns somehow
/// match, the one declared first in the document wins.
fn detect_checked_box(content: &str) -> Option<FilingType> {
    BOX_PATTERNS
        .iter()
        .filter_map(|(re, ft)| re.find(content).map(|m| (m.start(), *ft)))
        .min_by_key(|(start, _)| *start)
        .map(|(_, ft)| ft)
}

/// Generic keyword fallback. Notice is tested before Holdings Report because
/// "13F Holdings Report" appears as explanatory prose on notice filings.
fn detect_keyword(content: &str) -> Option<FilingType> {
    let upper = content.to_uppercase();
    if upper.contains("FORM 4/A") {
        Some(FilingType::Form4Amendment)
    } else if upper.contains("FORM 4") {
        Some(FilingType::Form4)
    } else if upper.contains("13F NOTICE") {
        Some(FilingType::Form13FNotice)
    } else if upper.contains("13F HOLDINGS REPORT") {
        Some(FilingType::Form13FHoldings)
    } else if upper.contains("FORM 13F-NT") {
        Some(FilingType::Form13FNotice)
    } else if upper.contains("FORM 13F-HR") {
        Some(FilingType::Form13FHoldings)
    } else {
        None
    }
}

/// A document that is nothing but information-table XML carries no marker at
/// all; presume 13F-HR data-only content.
fn detect_bare_xml(content: &str) -> Option<FilingType> {
    let trimmed = content.trim_start();
    let lower = trimmed.to_lowercase();
    if (trimmed.starts_with("<?xml") || lower.starts_with("<informationtable"))
        && (lower.contains("<informationtable") || lower.contains("<infotable"))
    {
        Some(FilingType::Form13FHoldings)
    } else {
        None
    }
}

static ACCEPTANCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<ACCEPTANCE-DATETIME>(\d{8})").unwrap());
static FILED_AS_OF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FILED AS OF DATE:\s*(\d{8})").unwrap());
static DATE_OF_SIGNING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Date of Signing:\s*([\d/]+)").unwrap());
static FILING_DATE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<filingdate[^>]*>\s*([^<\s][^<]*)").unwrap());
static REPORT_PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Report for the Calendar Year or Quarter Ended:\s*([\d/]+)").unwrap()
});
static PERIOD_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<periodofreport[^>]*>\s*([^<\s][^<]*)").unwrap());

fn extract_metadata(content: &str) -> FilingMetadata {
    FilingMetadata {
        filing_date: extract_filing_date(content),
        report_date: extract_report_date(content),
    }
}

/// Try each known filing-date pattern in order and keep the first that
/// parses.
fn extract_filing_date(content: &str) -> Option<NaiveDate> {
    if let Some(cap) = ACCEPTANCE_RE.captures(content) {
        if let Some(date) = parse_date(&cap[1], &["%Y%m%d"]) {
            return Some(date);
        }
    }
    if let Some(cap) = FILED_AS_OF_RE.captures(content) {
        if let Some(date) = parse_date(&cap[1], &["%Y%m%d"]) {
            return Some(date);
        }
    }
    if let Some(cap) = DATE_OF_SIGNING_RE.captures(content) {
        if let Some(date) = parse_date(&cap[1], &["%m/%d/%Y", "%m/%d/%y"]) {
            return Some(date);
        }
    }
    if let Some(cap) = FILING_DATE_TAG_RE.captures(content) {
        if let Some(date) = parse_date(&cap[1], &["%Y-%m-%d", "%m-%d-%Y"]) {
            return Some(date);
        }
    }
    None
}

/// The period-of-report date, present mostly on 13F filings.
fn extract_report_date(content: &str) -> Option<NaiveDate> {
    if let Some(cap) = REPORT_PERIOD_RE.captures(content) {
        if let Some(date) = parse_date(&cap[1], &["%m/%d/%Y", "%m/%d/%y"]) {
            return Some(date);
        }
    }
    if let Some(cap) = PERIOD_TAG_RE.captures(content) {
        if let Some(date) = parse_date(&cap[1], &["%Y-%m-%d", "%m-%d-%Y"]) {
            return Some(date);
        }
    }
    None
}

fn parse_date(raw: &str, formats: &[&str]) -> Option<NaiveDate> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
