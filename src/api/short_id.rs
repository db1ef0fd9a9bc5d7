//! Short sequential ids.
//!
//! New projects and tasks get the next number after the highest existing id
//! of one to three ASCII digits. Ids outside that shape (UUIDs, prefixed ids,
//! four or more digits) are ignored by the scan, so the scheme only stays
//! collision-free while every record in the collection came from it.

/// Parse an id that consists of 1 to 3 ASCII digits
pub fn parse_short_id(id: &str) -> Option<u32> {
    if id.is_empty() || id.len() > 3 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Highest short id among `ids`, or 0 when none match
pub fn max_short_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> u32 {
    ids.into_iter().filter_map(parse_short_id).max().unwrap_or(0)
}

/// The id to assign to the next record: `max + 1`, without leading zeros
pub fn next_short_id<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    (max_short_id(ids) + 1).to_string()
}
