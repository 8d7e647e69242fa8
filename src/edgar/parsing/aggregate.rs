use std::collections::HashMap;

use super::types::RawHolding;

/// Merge raw holdings from every table in a document into one record per
/// CUSIP, preserving first-appearance order.
///
/// Value and share figures sum with absent treated as zero (two absents stay
/// absent); the first non-empty issuer name and share-type tag win. This is
/// what folds continuation rows back into their parent holding, and it also
/// dedups a summary table caught twice. Each merge builds a fresh record, so
/// no raw row is ever mutated in place.
pub fn aggregate_holdings(raw: impl IntoIterator<Item = RawHolding>) -> Vec<RawHolding> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, RawHolding> = HashMap::new();

    for record in raw {
        match merged.remove(&record.cusip) {
            Some(existing) => {
                let combined = merge(existing, record);
                merged.insert(combined.cusip.clone(), combined);
            }
            None => {
                order.push(record.cusip.clone());
                merged.insert(record.cusip.clone(), record);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|cusip| merged.remove(&cusip))
        .collect()
}

fn merge(base: RawHolding, incoming: RawHolding) -> RawHolding {
    RawHolding {
        issuer_name: if base.issuer_name.is_empty() {
            incoming.issuer_name
        } else {
            base.issuer_name
        },
        cusip: base.cusip,
        value: sum_reported(base.value, incoming.value),
        shares: sum_reported(base.shares, incoming.shares),
        share_type: base.share_type.or(incoming.share_type),
    }
}

fn sum_reported(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (None, None) => None,
        _ => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}
