use std::collections::HashMap;

use crate::models::ListingRecord;

/// What happens when a suit number shows up again later in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the first snapshot seen, drop later ones whole.
    #[default]
    FirstSeenWins,
    /// Replace the stored record with the later one, keeping its position.
    LatestWins,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records handed to this merge.
    pub accepted: usize,
    /// Suit numbers not seen before this merge.
    pub new_count: usize,
}

/// Listings of one run keyed by suit number.
#[derive(Debug, Default)]
pub struct ListingStore {
    policy: DuplicatePolicy,
    index: HashMap<String, usize>,
    listings: Vec<ListingRecord>,
}

impl ListingStore {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, records: Vec<ListingRecord>) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            accepted: records.len(),
            new_count: 0,
        };

        for record in records {
            match self.index.get(&record.suit_number) {
                Some(&slot) => {
                    if self.policy == DuplicatePolicy::LatestWins {
                        self.listings[slot] = record;
                    }
                }
                None => {
                    self.index.insert(record.suit_number.clone(), self.listings.len());
                    self.listings.push(record);
                    outcome.new_count += 1;
                }
            }
        }

        outcome
    }

    pub fn all(&self) -> &[ListingRecord] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn into_listings(self) -> Vec<ListingRecord> {
        self.listings
    }
}
