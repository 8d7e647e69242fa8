use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};

use super::types::{parse_figure, Diagnostic, RawHolding, RawTransaction};

static INFO_TABLE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:\w+:)?informationTable[^>]*>.*?</(?:\w+:)?informationTable\s*>").unwrap()
});
static OWNERSHIP_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:\w+:)?ownershipDocument[^>]*>.*?</(?:\w+:)?ownershipDocument\s*>").unwrap()
});

/// Extract holdings from a modern 13F information-table document.
///
/// Lookups go by local tag name, case-insensitively, because filers mix
/// namespaced, non-namespaced and lower-cased XML. When the document does not
/// parse as-is (stray ampersands, markup wrapped around the table), the
/// `informationTable` block is isolated and re-escaped before giving up.
pub fn extract_13f_xml(content: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<RawHolding> {
    let parsed = Document::parse(content)
        .map(|doc| holdings_from(&doc))
        .or_else(|_| {
            let block = INFO_TABLE_BLOCK_RE
                .find(content)
                .ok_or_else(|| "no informationTable block found".to_string())?;
            let cleaned = format!("<root>{}</root>", escape_bare_ampersands(block.as_str()));
            Document::parse(&cleaned)
                .map(|doc| holdings_from(&doc))
                .map_err(|e| e.to_string())
        });

    match parsed {
        Ok(holdings) => {
            let mut kept = Vec::with_capacity(holdings.len());
            for (index, holding) in holdings.into_iter().enumerate() {
                if holding.cusip.is_empty() {
                    diagnostics.push(Diagnostic::warning(
                        format!("infoTable {}", index + 1),
                        "entry has no CUSIP; entry skipped",
                    ));
                } else {
                    kept.push(holding);
                }
            }
            kept
        }
        Err(err) => {
            diagnostics.push(Diagnostic::error(
                "information table",
                format!("13F XML did not parse: {}", err),
            ));
            Vec::new()
        }
    }
}

fn holdings_from(doc: &Document) -> Vec<RawHolding> {
    doc.root_element()
        .descendants()
        .filter(|n| is_named(n, "infoTable"))
        .map(|info| {
            let amount = descendant(&info, "shrsOrPrnAmt");
            RawHolding {
                issuer_name: descendant_text(&info, "nameOfIssuer"),
                cusip: descendant_text(&info, "cusip"),
                value: parse_figure(&descendant_text(&info, "value")),
                shares: amount
                    .map(|n| parse_figure(&descendant_text(&n, "sshPrnamt")))
                    .unwrap_or(None),
                share_type: amount
                    .map(|n| descendant_text(&n, "sshPrnamtType"))
                    .filter(|t| !t.is_empty()),
            }
        })
        .collect()
}

/// Extract non-derivative transactions from a Form 4 XML document. Issuer and
/// reporting-owner details are shared across every transaction in the filing.
pub fn extract_form4_xml(content: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<RawTransaction> {
    let cleaned;
    let doc = match Document::parse(content) {
        Ok(doc) => doc,
        Err(first_err) => {
            // Submission wrappers and stray ampersands both break a strict
            // parse; isolate the ownership document and re-escape.
            let block = OWNERSHIP_BLOCK_RE
                .find(content)
                .map(|m| m.as_str())
                .unwrap_or(content);
            cleaned = escape_bare_ampersands(block);
            match Document::parse(&cleaned) {
                Ok(doc) => doc,
                Err(_) => {
                    diagnostics.push(Diagnostic::error(
                        "form 4",
                        format!("Form 4 XML did not parse: {}", first_err),
                    ));
                    return Vec::new();
                }
            }
        }
    };

    let root = doc.root_element();
    let issuer = descendant(&root, "issuer");
    let owner_id = descendant(&root, "reportingOwnerId");
    let relationship = descendant(&root, "reportingOwnerRelationship");

    let issuer_cik = issuer.map(|n| descendant_text(&n, "issuerCik")).unwrap_or_default();
    let issuer_name = issuer.map(|n| descendant_text(&n, "issuerName")).unwrap_or_default();
    let issuer_ticker = issuer
        .map(|n| descendant_text(&n, "issuerTradingSymbol"))
        .unwrap_or_default();
    let owner_cik = owner_id.map(|n| descendant_text(&n, "rptOwnerCik")).unwrap_or_default();
    let owner_name = owner_id.map(|n| descendant_text(&n, "rptOwnerName")).unwrap_or_default();
    let is_director = relationship.is_some_and(|n| flag(&descendant_text(&n, "isDirector")));
    let is_officer = relationship.is_some_and(|n| flag(&descendant_text(&n, "isOfficer")));
    let is_ten_percent_owner =
        relationship.is_some_and(|n| flag(&descendant_text(&n, "isTenPercentOwner")));
    let officer_title = relationship
        .map(|n| descendant_text(&n, "officerTitle"))
        .unwrap_or_default();

    root.descendants()
        .filter(|n| is_named(n, "nonDerivativeTransaction"))
        .map(|tx| RawTransaction {
            issuer_cik: issuer_cik.clone(),
            issuer_name: issuer_name.clone(),
            issuer_ticker: issuer_ticker.clone(),
            owner_cik: owner_cik.clone(),
            owner_name: owner_name.clone(),
            is_director,
            is_officer,
            is_ten_percent_owner,
            officer_title: officer_title.clone(),
            security_title: nested_text(&tx, &["securityTitle", "value"]),
            transaction_date: nested_text(&tx, &["transactionDate", "value"]),
            transaction_code: nested_text(&tx, &["transactionCoding", "transactionCode"]),
            shares_transacted: nested_text(&tx, &["transactionAmounts", "transactionShares", "value"]),
            price_per_share: nested_text(
                &tx,
                &["transactionAmounts", "transactionPricePerShare", "value"],
            ),
            acquired_disposed_code: nested_text(
                &tx,
                &["transactionAmounts", "transactionAcquiredDisposedCode", "value"],
            ),
            shares_owned_after: nested_text(
                &tx,
                &["postTransactionAmounts", "sharesOwnedFollowingTransaction", "value"],
            ),
        })
        .collect()
}

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

fn descendant<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants().find(|n| is_named(n, name))
}

fn descendant_text(node: &Node, name: &str) -> String {
    descendant(node, name)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn nested_text(node: &Node, path: &[&str]) -> String {
    let mut current = *node;
    for name in path {
        match descendant(&current, name) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    current.text().map(|t| t.trim().to_string()).unwrap_or_default()
}

fn flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Escape ampersands that do not open a character entity. Legacy filings put
/// raw "&" in issuer names, which a strict XML parser rejects.
fn escape_bare_ampersands(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for (i, ch) in content.char_indices() {
        if ch != '&' {
            out.push(ch);
            continue;
        }
        let rest = &content[i + 1..];
        let is_entity = rest
            .char_indices()
            .take(10)
            .find(|&(_, c)| c == ';')
            .map_or(false, |(j, _)| {
                j > 0 && rest[..j].chars().all(|c| c.is_ascii_alphanumeric() || c == '#')
            });
        if is_entity {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_13F: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<informationTable xmlns="http://www.sec.gov/edgar/document/thirteenf/informationtable">
  <infoTable>
    <nameOfIssuer>APPLE INC</nameOfIssuer>
    <titleOfClass>COM</titleOfClass>
    <cusip>037833100</cusip>
    <value>500000</value>
    <shrsOrPrnAmt>
      <sshPrnamt>10000</sshPrnamt>
      <sshPrnamtType>SH</sshPrnamtType>
    </shrsOrPrnAmt>
    <investmentDiscretion>SOLE</investmentDiscretion>
  </infoTable>
  <infoTable>
    <nameOfIssuer>MICROSOFT CORP</nameOfIssuer>
    <titleOfClass>COM</titleOfClass>
    <cusip>594918104</cusip>
    <value>1200</value>
    <shrsOrPrnAmt>
      <sshPrnamt>3,000</sshPrnamt>
      <sshPrnamtType>SH</sshPrnamtType>
    </shrsOrPrnAmt>
  </infoTable>
</informationTable>"#;

    #[test]
    fn one_holding_per_info_table() {
        let mut diagnostics = Vec::new();
        let holdings = extract_13f_xml(SAMPLE_13F, &mut diagnostics);
        assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].cusip, "037833100");
        assert_eq!(holdings[0].issuer_name, "APPLE INC");
        assert_eq!(holdings[0].value, Some(500_000));
        assert_eq!(holdings[0].shares, Some(10_000));
        assert_eq!(holdings[0].share_type.as_deref(), Some("SH"));
        assert_eq!(holdings[1].shares, Some(3_000));
    }

    #[test]
    fn namespace_prefixes_do_not_matter() {
        let xml = r#"<ns1:informationTable xmlns:ns1="http://www.sec.gov/edgar/document/thirteenf/informationtable">
  <ns1:infoTable>
    <ns1:nameOfIssuer>APPLE INC</ns1:nameOfIssuer>
    <ns1:cusip>037833100</ns1:cusip>
    <ns1:value>100</ns1:value>
    <ns1:shrsOrPrnAmt><ns1:sshPrnamt>5</ns1:sshPrnamt></ns1:shrsOrPrnAmt>
  </ns1:infoTable>
</ns1:informationTable>"#;
        let mut diagnostics = Vec::new();
        let holdings = extract_13f_xml(xml, &mut diagnostics);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].cusip, "037833100");
        assert_eq!(holdings[0].shares, Some(5));
    }

    #[test]
    fn bare_ampersand_falls_back_to_block_isolation() {
        let xml = r#"<SEC-DOCUMENT>junk & more junk
<informationTable>
  <infoTable>
    <nameOfIssuer>JOHNSON &amp; JOHNSON</nameOfIssuer>
    <cusip>478160104</cusip>
    <value>50</value>
    <shrsOrPrnAmt><sshPrnamt>7</sshPrnamt></shrsOrPrnAmt>
  </infoTable>
</informationTable>
</SEC-DOCUMENT>"#;
        let mut diagnostics = Vec::new();
        let holdings = extract_13f_xml(xml, &mut diagnostics);
        assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].issuer_name, "JOHNSON & JOHNSON");
    }

    #[test]
    fn entry_without_cusip_is_skipped_with_warning() {
        let xml = r#"<informationTable>
  <infoTable>
    <nameOfIssuer>MYSTERY CO</nameOfIssuer>
    <value>9</value>
  </infoTable>
</informationTable>"#;
        let mut diagnostics = Vec::new();
        let holdings = extract_13f_xml(xml, &mut diagnostics);
        assert!(holdings.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("CUSIP"));
    }

    const SAMPLE_FORM4: &str = r#"<?xml version="1.0"?>
<ownershipDocument>
  <issuer>
    <issuerCik>0000320193</issuerCik>
    <issuerName>Apple Inc.</issuerName>
    <issuerTradingSymbol>AAPL</issuerTradingSymbol>
  </issuer>
  <reportingOwner>
    <reportingOwnerId>
      <rptOwnerCik>0001214156</rptOwnerCik>
      <rptOwnerName>DOE JANE</rptOwnerName>
    </reportingOwnerId>
    <reportingOwnerRelationship>
      <isDirector>0</isDirector>
      <isOfficer>1</isOfficer>
      <isTenPercentOwner>0</isTenPercentOwner>
      <officerTitle>Chief Financial Officer</officerTitle>
    </reportingOwnerRelationship>
  </reportingOwner>
  <nonDerivativeTable>
    <nonDerivativeTransaction>
      <securityTitle><value>Common Stock</value></securityTitle>
      <transactionDate><value>2024-02-01</value></transactionDate>
      <transactionCoding><transactionCode>S</transactionCode></transactionCoding>
      <transactionAmounts>
        <transactionShares><value>1500</value></transactionShares>
        <transactionPricePerShare><value>185.25</value></transactionPricePerShare>
        <transactionAcquiredDisposedCode><value>D</value></transactionAcquiredDisposedCode>
      </transactionAmounts>
      <postTransactionAmounts>
        <sharesOwnedFollowingTransaction><value>98500</value></sharesOwnedFollowingTransaction>
      </postTransactionAmounts>
    </nonDerivativeTransaction>
    <nonDerivativeTransaction>
      <securityTitle><value>Common Stock</value></securityTitle>
      <transactionDate><value>2024-02-02</value></transactionDate>
      <transactionCoding><transactionCode>P</transactionCode></transactionCoding>
      <transactionAmounts>
        <transactionShares><value>200</value></transactionShares>
        <transactionPricePerShare><value>183.10</value></transactionPricePerShare>
        <transactionAcquiredDisposedCode><value>A</value></transactionAcquiredDisposedCode>
      </transactionAmounts>
      <postTransactionAmounts>
        <sharesOwnedFollowingTransaction><value>98700</value></sharesOwnedFollowingTransaction>
      </postTransactionAmounts>
    </nonDerivativeTransaction>
  </nonDerivativeTable>
</ownershipDocument>"#;

    #[test]
    fn one_transaction_per_element_in_order() {
        let mut diagnostics = Vec::new();
        let transactions = extract_form4_xml(SAMPLE_FORM4, &mut diagnostics);
        assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
        assert_eq!(transactions.len(), 2);

        let first = &transactions[0];
        assert_eq!(first.issuer_ticker, "AAPL");
        assert_eq!(first.owner_name, "DOE JANE");
        assert!(first.is_officer);
        assert!(!first.is_director);
        assert_eq!(first.officer_title, "Chief Financial Officer");
        assert_eq!(first.transaction_code, "S");
        assert_eq!(first.shares_transacted, "1500");
        assert_eq!(first.price_per_share, "185.25");
        assert_eq!(first.acquired_disposed_code, "D");
        assert_eq!(first.shares_owned_after, "98500");

        assert_eq!(transactions[1].transaction_code, "P");
        assert_eq!(transactions[1].transaction_date, "2024-02-02");
    }

    #[test]
    fn missing_tags_yield_empty_fields_not_errors() {
        let xml = r#"<ownershipDocument>
  <nonDerivativeTransaction>
    <transactionCoding><transactionCode>P</transactionCode></transactionCoding>
  </nonDerivativeTransaction>
</ownershipDocument>"#;
        let mut diagnostics = Vec::new();
        let transactions = extract_form4_xml(xml, &mut diagnostics);
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].transaction_code, "P");
        assert_eq!(transactions[0].shares_transacted, "");
        assert_eq!(transactions[0].issuer_cik, "");
    }

    #[test]
    fn escape_bare_ampersands_keeps_entities() {
        assert_eq!(escape_bare_ampersands("A &amp; B"), "A &amp; B");
        assert_eq!(escape_bare_ampersands("A & B"), "A &amp; B");
        assert_eq!(escape_bare_ampersands("x&#38;y"), "x&#38;y");
    }
}
