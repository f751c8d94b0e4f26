//! Window aggregation: reactions in, per-type counts out.

use std::collections::BTreeMap;

use crate::model::Reaction;

/// Group a window of reactions by type.
///
/// Every input counts once, duplicates included. Types that did not occur
/// are absent from the result rather than present with a zero count.
pub fn aggregate<'a, I>(window: I) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = &'a Reaction>,
{
    let mut grouped = BTreeMap::new();
    for reaction in window {
        *grouped.entry(reaction.kind.clone()).or_insert(0) += 1;
    }
    grouped
}
