use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;

use super::layout::infer_layout;
use super::types::{looks_like_cusip, parse_figure, Diagnostic, RawHolding};

/// A line is a header candidate when it mentions one of these and stays under
/// the sanity bound, which keeps data rows that happen to contain a keyword
/// substring out of the header block.
const HEADER_KEYWORDS: &[&str] = &["CUSIP", "VALUE", "ISSUER", "SHARES", "VOTING AUTHORITY"];
const MAX_HEADER_LINE_LEN: usize = 200;

/// Lines shorter than this after tag stripping are page furniture, not data.
const MIN_DATA_LINE_LEN: usize = 20;

static LEADING_TAGS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:<[^>]*>\s*)+").unwrap());

/// Extract raw holdings from one fixed-width text table.
///
/// `table_index` only labels diagnostics. Returns no records when the header
/// cannot be located or its keyword set is incomplete; column positions are
/// never guessed from data rows.
pub fn extract_table(
    text: &str,
    table_index: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<RawHolding> {
    let lines: Vec<&str> = text.lines().collect();

    let Some(header_start) = lines.iter().position(|l| is_header_candidate(l)) else {
        diagnostics.push(Diagnostic::warning(
            format!("table {}", table_index),
            "no header row found; table skipped",
        ));
        return Vec::new();
    };

    // Headers frequently span two physical lines; accumulate consecutive
    // candidates into one block.
    let mut header_end = header_start;
    while header_end < lines.len()
        && is_header_candidate(lines[header_end])
        && !is_separator(lines[header_end])
    {
        header_end += 1;
    }

    let layout = match infer_layout(&lines[header_start..header_end]) {
        Ok(layout) => layout,
        Err(err) => {
            diagnostics.push(Diagnostic::warning(
                format!("table {}", table_index),
                format!("{}; table skipped", err),
            ));
            return Vec::new();
        }
    };

    let mut holdings = Vec::new();
    let mut last_cusip: Option<String> = None;

    for (offset, raw_line) in lines[header_end..].iter().enumerate() {
        let lineno = header_end + offset + 1;
        if is_separator(raw_line) {
            continue;
        }
        let trimmed = raw_line.trim();
        if trimmed.starts_with("</") {
            continue;
        }
        // A data row may open with an SGML tag; slice past it.
        let stripped;
        let line: &str = if trimmed.starts_with('<') {
            stripped = LEADING_TAGS_RE.replace(raw_line, "").into_owned();
            if stripped.trim().is_empty() {
                continue;
            }
            &stripped
        } else {
            raw_line
        };
        // Raw length, not trimmed: a continuation row is mostly padding but
        // still reaches its figure columns.
        if line.len() < MIN_DATA_LINE_LEN {
            continue;
        }

        let issuer = layout.issuer.slice(line);
        let cusip_column = layout.cusip.slice(line);
        let cusip = cusip_column.split_whitespace().next().unwrap_or("");
        let value = parse_figure(layout.value.slice(line));
        let shares = parse_figure(layout.quantity.slice(line));
        let share_type = share_type_tag(layout.rest(line));

        if looks_like_cusip(cusip) {
            last_cusip = Some(cusip.to_string());
            holdings.push(RawHolding {
                // Entity-decoded after slicing so offsets stay put.
                issuer_name: decode_html_entities(issuer).into_owned(),
                cusip: cusip.to_string(),
                value,
                shares,
                share_type,
            });
        } else if issuer.is_empty()
            && cusip_column.is_empty()
            && (value.is_some() || shares.is_some())
        {
            // Continuation row: figures belong to the holding declared above.
            match &last_cusip {
                Some(cusip) => holdings.push(RawHolding {
                    issuer_name: String::new(),
                    cusip: cusip.clone(),
                    value,
                    shares,
                    share_type,
                }),
                None => diagnostics.push(Diagnostic::warning(
                    format!("table {}, line {}", table_index, lineno),
                    "continuation row before any holding; row skipped",
                )),
            }
        } else if !issuer.is_empty() {
            diagnostics.push(Diagnostic::warning(
                format!("table {}, line {}", table_index, lineno),
                format!("row has no valid security identifier ({:?}); row skipped", cusip),
            ));
        }
    }

    holdings
}

fn is_header_candidate(line: &str) -> bool {
    if line.len() >= MAX_HEADER_LINE_LEN {
        return false;
    }
    let upper = line.to_uppercase();
    HEADER_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

fn is_separator(line: &str) -> bool {
    line.contains("---")
}

fn share_type_tag(rest: &str) -> Option<String> {
    let token = rest.split_whitespace().next()?;
    if token.eq_ignore_ascii_case("SH") || token.eq_ignore_ascii_case("PRN") {
        Some(token.to_ascii_uppercase())
    } else {
        None
    }
}
