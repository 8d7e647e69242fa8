use encoding_rs::WINDOWS_1252;
use serde::{Deserialize, Serialize};

use super::classify::{classify, FilingMetadata, FilingType};
use super::parsing::aggregate::aggregate_holdings;
use super::parsing::html::{extract_13f_html_table, extract_form4_html_table};
use super::parsing::text::extract_table;
use super::parsing::types::{Diagnostic, RawHolding, RawTransaction};
use super::parsing::xml::{extract_13f_xml, extract_form4_xml};
use super::sniff::{sniff_13f, sniff_form4, DocumentFormat};

/// How extraction ended for one document. A cover page and a notice are
/// legitimate no-data cases, reported distinctly from a holdings report
/// where no table could be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionOutcome {
    Extracted,
    NoDataExpected,
    NoTableFound,
    Unclassified,
}

/// One filing's raw content plus what classification derived from it.
/// Immutable once built; extraction borrows it and produces a fresh output.
#[derive(Debug)]
pub struct FilingDocument {
    content: String,
    pub filing_type: Option<FilingType>,
    pub metadata: FilingMetadata,
}

/// Everything one document produced: records, the no-data/failure signal,
/// and every diagnostic raised along the way. Nothing here is fatal to a
/// batch; callers log the diagnostics and move on.
#[derive(Debug)]
pub struct FilingOutput {
    pub filing_type: Option<FilingType>,
    pub metadata: FilingMetadata,
    pub holdings: Vec<RawHolding>,
    pub transactions: Vec<RawTransaction>,
    pub outcome: ExtractionOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

impl FilingDocument {
    /// Classify raw content. The filing type comes from the content alone;
    /// the caller supplies the filer identity separately when normalizing.
    pub fn classify(content: String) -> Self {
        let (filing_type, metadata) = classify(&content);
        FilingDocument {
            content,
            filing_type,
            metadata,
        }
    }

    /// Run the rest of the pipeline: sniff the sub-format, extract, and for
    /// 13F fold every table's rows into one record per CUSIP.
    pub fn extract(&self) -> FilingOutput {
        let mut diagnostics = Vec::new();
        let mut holdings = Vec::new();
        let mut transactions = Vec::new();

        let outcome = match self.filing_type {
            None => {
                diagnostics.push(Diagnostic::warning(
                    "document",
                    "filing type could not be determined; document skipped",
                ));
                ExtractionOutcome::Unclassified
            }
            // A notice reports that holdings are filed by another manager;
            // it carries no information table.
            Some(FilingType::Form13FNotice) => ExtractionOutcome::NoDataExpected,
            Some(FilingType::Form13FHoldings) => match sniff_13f(&self.content) {
                DocumentFormat::Xml => {
                    holdings = extract_13f_xml(&self.content, &mut diagnostics);
                    ExtractionOutcome::Extracted
                }
                DocumentFormat::HtmlTables(tables) => {
                    for (index, table) in tables.iter().enumerate() {
                        holdings.extend(extract_13f_html_table(table, index + 1, &mut diagnostics));
                    }
                    ExtractionOutcome::Extracted
                }
                DocumentFormat::FixedWidth(regions) => {
                    for (index, region) in regions.iter().enumerate() {
                        holdings.extend(extract_table(region, index + 1, &mut diagnostics));
                    }
                    ExtractionOutcome::Extracted
                }
                DocumentFormat::CoverPage => ExtractionOutcome::NoDataExpected,
                DocumentFormat::NoTable => {
                    diagnostics.push(Diagnostic::warning(
                        "document",
                        "13F holdings report with no recognizable information table",
                    ));
                    ExtractionOutcome::NoTableFound
                }
            },
            Some(FilingType::Form4 | FilingType::Form4Amendment) => {
                match sniff_form4(&self.content) {
                    DocumentFormat::Xml => {
                        transactions = extract_form4_xml(&self.content, &mut diagnostics);
                        ExtractionOutcome::Extracted
                    }
                    DocumentFormat::HtmlTables(tables) => {
                        for table in &tables {
                            transactions.extend(extract_form4_html_table(table, &mut diagnostics));
                        }
                        ExtractionOutcome::Extracted
                    }
                    _ => {
                        diagnostics.push(Diagnostic::warning(
                            "document",
                            "Form 4 with no transaction table",
                        ));
                        ExtractionOutcome::NoTableFound
                    }
                }
            }
        };

        FilingOutput {
            filing_type: self.filing_type,
            metadata: self.metadata,
            holdings: aggregate_holdings(holdings),
            transactions,
            outcome,
            diagnostics,
        }
    }
}

/// Classify and extract in one step.
pub fn process_document(content: &str) -> FilingOutput {
    FilingDocument::classify(content.to_string()).extract()
}

/// Decode filing bytes: UTF-8 first, then the legacy single-byte fallback
/// older EDGAR documents need.
pub fn decode_content(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => WINDOWS_1252.decode(bytes).0.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_13F: &str = "\
<TYPE>13F-HR
FILED AS OF DATE: 19990812
<TABLE>
NAME OF ISSUER        TITLE OF CLASS   CUSIP       VALUE      SHRS OR PRN AMT
--------------        --------------   -----       -----      ---------------
APPLE INC              COM             037833100   500000     10000
                                                   250000     5000
MSFT CORP              COM             594918104   120000     3000
</TABLE>
";

    #[test]
    fn legacy_13f_extracts_and_aggregates_continuations() {
        let output = process_document(LEGACY_13F);
        assert_eq!(output.filing_type, Some(FilingType::Form13FHoldings));
        assert_eq!(output.outcome, ExtractionOutcome::Extracted);
        assert!(output.diagnostics.is_empty(), "unexpected: {:?}", output.diagnostics);

        assert_eq!(output.holdings.len(), 2);
        let apple = &output.holdings[0];
        assert_eq!(apple.cusip, "037833100");
        assert_eq!(apple.issuer_name, "APPLE INC");
        assert_eq!(apple.value, Some(750_000));
        assert_eq!(apple.shares, Some(15_000));

        assert_eq!(
            output.metadata.filing_date,
            chrono::NaiveDate::from_ymd_opt(1999, 8, 12)
        );
    }

    #[test]
    fn cover_page_signals_no_data_expected() {
        let content = "<TYPE>13F-HR\nFORM 13F COVER PAGE\nno table in this document\n";
        let output = process_document(content);
        assert_eq!(output.outcome, ExtractionOutcome::NoDataExpected);
        assert!(output.holdings.is_empty());
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn notice_signals_no_data_expected() {
        let output = process_document("<TYPE>13F-NT\nthe notice text");
        assert_eq!(output.filing_type, Some(FilingType::Form13FNotice));
        assert_eq!(output.outcome, ExtractionOutcome::NoDataExpected);
    }

    #[test]
    fn holdings_report_without_table_is_flagged() {
        let output = process_document("<TYPE>13F-HR\nnothing tabular follows\n");
        assert_eq!(output.outcome, ExtractionOutcome::NoTableFound);
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn unknown_document_is_skipped_with_warning() {
        let output = process_document("quarterly newsletter, nothing else");
        assert_eq!(output.filing_type, None);
        assert_eq!(output.outcome, ExtractionOutcome::Unclassified);
        assert_eq!(output.diagnostics.len(), 1);
    }

    #[test]
    fn form4_xml_produces_transactions() {
        let content = r#"<TYPE>4
<ownershipDocument>
  <issuer><issuerTradingSymbol>AAPL</issuerTradingSymbol></issuer>
  <nonDerivativeTransaction>
    <transactionDate><value>2024-02-01</value></transactionDate>
    <transactionCoding><transactionCode>P</transactionCode></transactionCoding>
    <transactionAmounts><transactionShares><value>200</value></transactionShares></transactionAmounts>
  </nonDerivativeTransaction>
</ownershipDocument>"#;
        let output = process_document(content);
        assert_eq!(output.filing_type, Some(FilingType::Form4));
        assert_eq!(output.outcome, ExtractionOutcome::Extracted);
        assert_eq!(output.transactions.len(), 1);
        assert_eq!(output.transactions[0].transaction_code, "P");
        assert_eq!(output.transactions[0].issuer_ticker, "AAPL");
    }

    #[test]
    fn decode_falls_back_to_single_byte() {
        let bytes = b"SOCI\xC9T\xC9 G\xC9N\xC9RALE";
        let text = decode_content(bytes);
        assert!(text.contains("SOCIÉTÉ"));
    }
}
