use anyhow::{anyhow, Result};

/// Half-open character span `[start, end)` within a table line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Slice a line by this span, tolerating short lines and trimming the
    /// surrounding whitespace. Out-of-range or non-boundary offsets yield "".
    pub fn slice<'a>(&self, line: &'a str) -> &'a str {
        let start = self.start.min(line.len());
        let end = self.end.min(line.len());
        line.get(start..end).unwrap_or("").trim()
    }
}

/// Column boundaries for one fixed-width holdings table, derived from its
/// header block. Valid only for the table it came from; never reuse a layout
/// across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub issuer: Span,
    pub class_title: Option<Span>,
    pub cusip: Span,
    pub value: Span,
    pub quantity: Span,
}

impl ColumnLayout {
    /// Text after the quantity column, where the SH/PRN type tag sits when
    /// the header declared one.
    pub fn rest<'a>(&self, line: &'a str) -> &'a str {
        let start = self.quantity.end.min(line.len());
        line.get(start..).unwrap_or("").trim_start()
    }
}

/// The several observed spellings of the shares/principal-amount column.
const SHARES_KEYWORDS: &[&str] = &[
    "SHRS OR PRN AMT",
    "SHARES/PRN AMT",
    "SHRS OR PRN",
    "SHS OR PRN",
    "PRN AMT",
    "SHARES",
];

/// Keywords that can open the column after the quantity figures.
const NEXT_KEYWORDS: &[&str] = &["SH", "PUT", "CALL", "INVESTMENT", "DISCRETION", "SOLE"];

/// Width assumed for the quantity column when no keyword follows it.
const FALLBACK_QUANTITY_WIDTH: usize = 15;

/// Infer column boundaries from the header block of a fixed-width table.
///
/// The offset of each recognized keyword becomes a boundary; keywords may sit
/// on different physical header lines. Fails with a named keyword when any of
/// the three load-bearing columns (CUSIP, VALUE, shares-family) is absent or
/// the offsets are not monotonically increasing — the caller must treat that
/// as "no records for this table", not guess positions from data rows.
pub fn infer_layout(header_lines: &[&str]) -> Result<ColumnLayout> {
    let upper: Vec<String> = header_lines.iter().map(|l| l.to_uppercase()).collect();

    let cusip_off = find_keyword(&upper, "CUSIP", 0)
        .ok_or_else(|| anyhow!("header block has no CUSIP keyword"))?;
    let value_off = find_keyword(&upper, "VALUE", 0)
        .ok_or_else(|| anyhow!("header block has no VALUE keyword"))?;
    let shares_off = SHARES_KEYWORDS
        .iter()
        .find_map(|kw| find_keyword(&upper, kw, 0))
        .ok_or_else(|| anyhow!("header block has no shares/principal-amount keyword"))?;

    if !(cusip_off < value_off && value_off < shares_off) {
        return Err(anyhow!(
            "header keywords out of order (CUSIP at {}, VALUE at {}, shares at {})",
            cusip_off,
            value_off,
            shares_off
        ));
    }

    // Optional title-of-class column between the issuer name and the CUSIP.
    let class_off = ["TITLE OF CLASS", "TITLE OF", "CLASS"]
        .iter()
        .find_map(|kw| find_keyword(&upper, kw, 0))
        .filter(|&off| off > 0 && off < cusip_off);

    let quantity_end = NEXT_KEYWORDS
        .iter()
        .filter_map(|kw| find_bounded_keyword(&upper, kw, shares_off + 1))
        .min()
        .unwrap_or(shares_off + FALLBACK_QUANTITY_WIDTH);

    Ok(ColumnLayout {
        issuer: Span::new(0, class_off.unwrap_or(cusip_off)),
        class_title: class_off.map(|off| Span::new(off, cusip_off)),
        cusip: Span::new(cusip_off, value_off),
        value: Span::new(value_off, shares_off),
        quantity: Span::new(shares_off, quantity_end),
    })
}

/// Earliest offset of `keyword` at or after `min_off` across the header
/// lines, or None if no line contains it.
fn find_keyword(upper_lines: &[String], keyword: &str, min_off: usize) -> Option<usize> {
    upper_lines
        .iter()
        .filter_map(|line| {
            line.match_indices(keyword)
                .map(|(off, _)| off)
                .find(|&off| off >= min_off)
        })
        .min()
}

/// Like `find_keyword`, but the match must stand alone: not preceded or
/// followed by a letter. Keeps "SH" from matching inside "SHARED" or
/// "SHARES" when hunting the column after the quantity figures.
fn find_bounded_keyword(upper_lines: &[String], keyword: &str, min_off: usize) -> Option<usize> {
    upper_lines
        .iter()
        .filter_map(|line| {
            line.match_indices(keyword)
                .filter(|&(off, _)| {
                    let before_ok = off == 0
                        || !line[..off]
                            .chars()
                            .next_back()
                            .is_some_and(|c| c.is_ascii_alphabetic());
                    let after = line[off + keyword.len()..].chars().next();
                    let after_ok = !after.is_some_and(|c| c.is_ascii_alphabetic());
                    before_ok && after_ok
                })
                .map(|(off, _)| off)
                .find(|&off| off >= min_off)
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_boundaries_from_single_header_line() {
        let header = "NAME OF ISSUER        TITLE OF CLASS   CUSIP       VALUE      SHRS OR PRN AMT";
        let layout = infer_layout(&[header]).unwrap();

        assert_eq!(layout.issuer, Span::new(0, 22));
        assert_eq!(layout.class_title, Some(Span::new(22, 39)));
        assert_eq!(layout.cusip.start, 39);
        assert_eq!(layout.value.start, 51);
        assert_eq!(layout.quantity.start, 62);
        // No keyword after the shares column: fixed fallback width.
        assert_eq!(layout.quantity.end, 62 + FALLBACK_QUANTITY_WIDTH);
    }

    #[test]
    fn quantity_ends_at_next_keyword() {
        let header = "NAME OF ISSUER   CUSIP     VALUE    SHRS OR PRN AMT   SH/PRN  PUT/CALL";
        let layout = infer_layout(&[header]).unwrap();
        let sh_off = header.find("SH/PRN").unwrap();
        assert_eq!(layout.quantity.end, sh_off);
    }

    #[test]
    fn keywords_may_sit_on_different_lines() {
        let lines = [
            "                                              VALUE      SHRS OR",
            "NAME OF ISSUER          CUSIP                 (X$1000)   PRN AMT",
        ];
        let layout = infer_layout(&lines).unwrap();
        assert_eq!(layout.cusip.start, 24);
        assert_eq!(layout.value.start, 46);
        assert_eq!(layout.quantity.start, 57);
    }

    #[test]
    fn missing_value_keyword_is_an_error() {
        let err = infer_layout(&["NAME OF ISSUER   CUSIP    SHRS OR PRN AMT"]).unwrap_err();
        assert!(err.to_string().contains("VALUE"));
    }

    #[test]
    fn missing_shares_keyword_is_an_error() {
        let err = infer_layout(&["NAME OF ISSUER   CUSIP    VALUE"]).unwrap_err();
        assert!(err.to_string().contains("shares"));
    }

    #[test]
    fn out_of_order_keywords_are_an_error() {
        let err = infer_layout(&["VALUE   CUSIP   SHRS OR PRN AMT"]).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn span_slice_tolerates_short_lines() {
        let span = Span::new(10, 20);
        assert_eq!(span.slice("short"), "");
        assert_eq!(span.slice("0123456789ABCDE"), "ABCDE");
    }
}
