use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// The sub-format of an already-classified filing, carrying the located
/// candidate table bodies so extraction never has to re-scan the document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentFormat {
    /// Structured XML; the extractor isolates the relevant block itself.
    Xml,
    /// Outer HTML of every candidate `<table>` with genuine row structure.
    HtmlTables(Vec<String>),
    /// Raw text region(s) believed to hold a fixed-width table.
    FixedWidth(Vec<String>),
    /// A cover or summary page: correctly identified, intentionally empty.
    CoverPage,
    /// Nothing table-like anywhere; suspicious, but not fatal.
    NoTable,
}

static TABLE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table[^>]*>(.*?)</table>").unwrap());

const COVER_MARKERS: &[&str] = &["COVER PAGE", "SUMMARY PAGE"];

/// Decide how a 13F holdings document stores its information table.
///
/// XML beats everything: an information-table element anywhere means the
/// structured extractor can isolate it. Then genuine HTML tables (row
/// markup whose flattened text mentions both CUSIP and VALUE), then the
/// raw-text fallback for legacy SGML bounded by `<TABLE>` markers when
/// present. A document with no candidate at all is either a cover page
/// (expected, empty) or NoTable (suspicious).
pub fn sniff_13f(content: &str) -> DocumentFormat {
    let trimmed = content.trim_start();
    let lower = content.to_lowercase();
    if trimmed.starts_with("<?xml") || lower.contains("<informationtable") {
        return DocumentFormat::Xml;
    }

    let html_tables = html_table_candidates(content, |text| {
        text.contains("CUSIP") && text.contains("VALUE")
    });
    if !html_tables.is_empty() {
        return DocumentFormat::HtmlTables(html_tables);
    }

    let upper = content.to_uppercase();
    let regions: Vec<String> = TABLE_BLOCK_RE
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .filter(|body| {
            let upper = body.to_uppercase();
            upper.contains("CUSIP") && upper.contains("VALUE")
        })
        .collect();
    if !regions.is_empty() {
        return DocumentFormat::FixedWidth(regions);
    }
    if !content.contains("<TABLE") && upper.contains("CUSIP") && upper.contains("VALUE") {
        return DocumentFormat::FixedWidth(vec![content.to_string()]);
    }

    if COVER_MARKERS.iter().any(|m| upper.contains(m)) {
        return DocumentFormat::CoverPage;
    }
    DocumentFormat::NoTable
}

/// Decide how a Form 4 stores its transaction table. Modern filings are XML
/// (the tag is matched lower-cased because markup normalization downcases
/// mixed-case documents); the fallback is the "Table I - Non-Derivative"
/// HTML rendering.
pub fn sniff_form4(content: &str) -> DocumentFormat {
    if content.to_lowercase().contains("<nonderivativetransaction") {
        return DocumentFormat::Xml;
    }

    let html_tables = html_table_candidates(content, |text| {
        text.contains("TABLE I") && text.contains("NON-DERIVATIVE")
    });
    if !html_tables.is_empty() {
        return DocumentFormat::HtmlTables(html_tables);
    }
    DocumentFormat::NoTable
}

/// Tables with actual `<tr>`/`<td>` structure whose flattened upper-cased
/// text satisfies `test`. Legacy SGML wraps preformatted text in bare
/// `<TABLE>` markers with no row markup; those fall through to the raw-text
/// path instead.
fn html_table_candidates(content: &str, test: impl Fn(&str) -> bool) -> Vec<String> {
    let document = Html::parse_document(content);
    let table_selector = Selector::parse("table").unwrap();
    let cell_selector = Selector::parse("tr > td, tr > th").unwrap();

    document
        .select(&table_selector)
        .filter(|table| table.select(&cell_selector).next().is_some())
        .filter(|table| {
            let flat = table.text().collect::<Vec<_>>().join(" ").to_uppercase();
            test(&flat)
        })
        .map(|table| table.html())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_declaration_wins() {
        let content = "<?xml version=\"1.0\"?>\n<informationTable/>";
        assert_eq!(sniff_13f(content), DocumentFormat::Xml);
    }

    #[test]
    fn embedded_information_table_is_xml() {
        let content = "<SEC-DOCUMENT>\n<informationTable><infoTable/></informationTable>\n</SEC-DOCUMENT>";
        assert_eq!(sniff_13f(content), DocumentFormat::Xml);
    }

    #[test]
    fn html_table_with_rows_and_keywords_is_html() {
        let content = r#"<html><body>
<table><tr><th>CUSIP</th><th>Value</th></tr><tr><td>037833100</td><td>500</td></tr></table>
</body></html>"#;
        match sniff_13f(content) {
            DocumentFormat::HtmlTables(tables) => assert_eq!(tables.len(), 1),
            other => panic!("expected HtmlTables, got {:?}", other),
        }
    }

    #[test]
    fn bare_table_markers_are_fixed_width() {
        let content = "prologue\n<TABLE>\nNAME OF ISSUER   CUSIP   VALUE   SHRS OR PRN AMT\nAPPLE INC  037833100  500  10\n</TABLE>\n";
        match sniff_13f(content) {
            DocumentFormat::FixedWidth(regions) => {
                assert_eq!(regions.len(), 1);
                assert!(regions[0].contains("APPLE INC"));
                assert!(!regions[0].contains("prologue"));
            }
            other => panic!("expected FixedWidth, got {:?}", other),
        }
    }

    #[test]
    fn whole_document_scan_without_table_markers() {
        let content = "NAME OF ISSUER   CUSIP   VALUE   SHRS OR PRN AMT\nAPPLE INC ...\n";
        match sniff_13f(content) {
            DocumentFormat::FixedWidth(regions) => assert_eq!(regions.len(), 1),
            other => panic!("expected FixedWidth, got {:?}", other),
        }
    }

    #[test]
    fn cover_page_is_its_own_signal() {
        let content = "FORM 13F COVER PAGE\nReport for the Calendar Year or Quarter Ended: 06/30/1999\n";
        assert_eq!(sniff_13f(content), DocumentFormat::CoverPage);
    }

    #[test]
    fn nothing_tabular_is_no_table() {
        assert_eq!(sniff_13f("just a letter to shareholders"), DocumentFormat::NoTable);
    }

    #[test]
    fn form4_lowercased_tag_is_xml() {
        let content = "<ownershipdocument><nonderivativetransaction/></ownershipdocument>";
        assert_eq!(sniff_form4(content), DocumentFormat::Xml);
    }

    #[test]
    fn form4_html_fallback_by_caption() {
        let content = r#"<html><table>
<tr><td colspan="3">Table I - Non-Derivative Securities</td></tr>
<tr><th>Title</th><th>Transaction Date</th><th>Code</th></tr>
</table></html>"#;
        match sniff_form4(content) {
            DocumentFormat::HtmlTables(tables) => assert_eq!(tables.len(), 1),
            other => panic!("expected HtmlTables, got {:?}", other),
        }
    }

    #[test]
    fn form4_without_table_is_no_table() {
        assert_eq!(sniff_form4("<html>nothing here</html>"), DocumentFormat::NoTable);
    }
}
