use scraper::{Html, Selector};
use unicode_normalization::UnicodeNormalization;

use super::types::{looks_like_cusip, parse_figure, Diagnostic, RawHolding, RawTransaction};

/// Extract holdings from one HTML 13F table, located by the sniffer.
///
/// Column meaning comes from the header row's cell text, so filers that
/// reorder or drop optional columns still extract. CUSIP and VALUE columns
/// are required; without them the table yields nothing and a warning.
pub fn extract_13f_html_table(
    table_html: &str,
    table_index: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<RawHolding> {
    let rows = table_rows(table_html);

    let Some((header_idx, header)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.iter().any(|cell| cell.to_uppercase().contains("CUSIP")))
    else {
        diagnostics.push(Diagnostic::warning(
            format!("html table {}", table_index),
            "no CUSIP header cell found; table skipped",
        ));
        return Vec::new();
    };

    let cusip_col = column_index(header, &["CUSIP"]);
    let value_col = column_index(header, &["VALUE"]);
    let (Some(cusip_col), Some(value_col)) = (cusip_col, value_col) else {
        diagnostics.push(Diagnostic::warning(
            format!("html table {}", table_index),
            "header lacks CUSIP or VALUE column; table skipped",
        ));
        return Vec::new();
    };
    let shares_col = column_index(header, &["SHRS", "SHARES", "PRN AMT"]);
    let issuer_col = column_index(header, &["ISSUER", "NAME"]);

    let mut holdings = Vec::new();
    for row in rows.iter().skip(header_idx + 1) {
        let Some(cusip) = row.get(cusip_col).map(|c| c.trim()) else {
            continue;
        };
        if !looks_like_cusip(cusip) {
            // Sub-header, totals or spacer row.
            continue;
        }
        holdings.push(RawHolding {
            issuer_name: issuer_col
                .and_then(|i| row.get(i))
                .map(|c| c.trim().to_string())
                .unwrap_or_default(),
            cusip: cusip.to_string(),
            value: row.get(value_col).and_then(|c| parse_figure(c)),
            shares: shares_col.and_then(|i| row.get(i)).and_then(|c| parse_figure(c)),
            share_type: None,
        });
    }
    holdings
}

/// Extract non-derivative transactions from a Form 4 HTML table (the
/// "Table I - Non-Derivative" fallback for filings without XML). Issuer and
/// owner identity are not reliably present in the table itself and stay
/// empty; a row counts as a transaction when its code cell is a single
/// letter.
pub fn extract_form4_html_table(
    table_html: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<RawTransaction> {
    let rows = table_rows(table_html);

    let Some((header_idx, header)) = rows.iter().enumerate().find(|(_, row)| {
        let flat = row.join(" ").to_uppercase();
        flat.contains("TRANSACTION") && flat.contains("DATE")
    }) else {
        diagnostics.push(Diagnostic::warning(
            "form 4 html table",
            "no transaction header row found; table skipped",
        ));
        return Vec::new();
    };

    let title_col = column_index(header, &["TITLE"]).unwrap_or(0);
    let date_col = column_index(header, &["DATE"]).unwrap_or(1);
    let code_col = column_index(header, &["CODE"]);
    let shares_col = column_index(header, &["AMOUNT", "SHARES"]);
    let price_col = column_index(header, &["PRICE"]);
    let owned_col = column_index(header, &["OWNED", "FOLLOWING"]);

    let Some(code_col) = code_col else {
        diagnostics.push(Diagnostic::warning(
            "form 4 html table",
            "header lacks a transaction-code column; table skipped",
        ));
        return Vec::new();
    };

    let cell = |row: &Vec<String>, col: Option<usize>| -> String {
        col.and_then(|i| row.get(i)).map(|c| c.trim().to_string()).unwrap_or_default()
    };

    let mut transactions = Vec::new();
    for row in rows.iter().skip(header_idx + 1) {
        let code = cell(row, Some(code_col));
        if code.len() != 1 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            continue;
        }
        transactions.push(RawTransaction {
            security_title: cell(row, Some(title_col)),
            transaction_date: cell(row, Some(date_col)),
            transaction_code: code,
            shares_transacted: cell(row, shares_col),
            price_per_share: cell(row, price_col),
            shares_owned_after: cell(row, owned_col),
            ..RawTransaction::default()
        });
    }
    transactions
}

/// Flatten a table's rows into trimmed cell texts. Entities are decoded by
/// the HTML parser; NFKC folds the non-breaking spaces and ligatures filers
/// leave in cell text.
fn table_rows(table_html: &str) -> Vec<Vec<String>> {
    let fragment = Html::parse_fragment(table_html);
    let row_selector = Selector::parse("tr").unwrap();
    let cell_selector = Selector::parse("td, th").unwrap();

    fragment
        .select(&row_selector)
        .map(|row| {
            row.select(&cell_selector)
                .map(|cell| {
                    let text: String = cell.text().collect::<Vec<_>>().join(" ");
                    text.nfkc()
                        .collect::<String>()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect()
        })
        .collect()
}

fn column_index(header: &[String], keywords: &[&str]) -> Option<usize> {
    header.iter().position(|cell| {
        let upper = cell.to_uppercase();
        keywords.iter().any(|kw| upper.contains(kw))
    })
}
