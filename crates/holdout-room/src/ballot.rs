//! Vote counting, shared by the hazard, location and elimination ballots.
//!
//! Only entries cast by eligible voters count, so the cast total can never
//! exceed the denominator. Candidates are ordered by vote count, highest
//! first; a tie goes to the candidate whose earliest surviving entry was
//! cast first (smallest store sequence number).

use std::collections::{HashMap, HashSet};

use holdout_protocol::{BallotKind, BallotView, PlayerId, TallyEntry};
use holdout_store::BallotEntry;

/// The state of one ballot after a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub cast: usize,
    pub eligible: usize,
    pub tally: Vec<TallyEntry>,
}

impl Outcome {
    /// Every eligible voter has a counted entry.
    pub fn is_complete(&self) -> bool {
        self.eligible > 0 && self.cast >= self.eligible
    }

    /// The top candidate once the ballot is complete.
    pub fn winner(&self) -> Option<u64> {
        if self.is_complete() {
            self.tally.first().map(|t| t.candidate)
        } else {
            None
        }
    }

    pub fn view(&self, kind: BallotKind, round: u32) -> BallotView {
        BallotView {
            kind,
            round,
            cast: self.cast,
            eligible: self.eligible,
            tally: self.tally.clone(),
        }
    }
}

/// Counts `entries` against the set of eligible voters.
pub fn count(entries: &[BallotEntry], eligible: &HashSet<PlayerId>) -> Outcome {
    // candidate -> (votes, earliest seq)
    let mut per_candidate: HashMap<u64, (usize, u64)> = HashMap::new();
    let mut cast = 0;
    for entry in entries.iter().filter(|e| eligible.contains(&e.voter)) {
        cast += 1;
        let slot = per_candidate
            .entry(entry.candidate)
            .or_insert((0, entry.seq));
        slot.0 += 1;
        slot.1 = slot.1.min(entry.seq);
    }

    let mut ranked: Vec<(u64, usize, u64)> = per_candidate
        .into_iter()
        .map(|(candidate, (votes, first))| (candidate, votes, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    Outcome {
        cast,
        eligible: eligible.len(),
        tally: ranked
            .into_iter()
            .map(|(candidate, votes, _)| TallyEntry { candidate, votes })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use holdout_protocol::RoomId;

    use super::*;

    fn entry(voter: u64, candidate: u64, seq: u64) -> BallotEntry {
        BallotEntry {
            room: RoomId(1),
            kind: BallotKind::Elimination,
            round: 1,
            voter: PlayerId(voter),
            candidate,
            seq,
        }
    }

    fn voters(ids: &[u64]) -> HashSet<PlayerId> {
        ids.iter().copied().map(PlayerId).collect()
    }

    #[test]
    fn test_incomplete_ballot_has_no_winner() {
        let out = count(&[entry(1, 9, 1)], &voters(&[1, 2]));
        assert_eq!(out.cast, 1);
        assert_eq!(out.eligible, 2);
        assert!(!out.is_complete());
        assert_eq!(out.winner(), None);
    }

    #[test]
    fn test_majority_wins() {
        let entries = [entry(1, 7, 1), entry(2, 8, 2), entry(3, 8, 3)];
        let out = count(&entries, &voters(&[1, 2, 3]));
        assert_eq!(out.winner(), Some(8));
        assert_eq!(out.tally[0], TallyEntry { candidate: 8, votes: 2 });
    }

    #[test]
    fn test_tie_goes_to_earliest_entry() {
        let entries = [
            entry(1, 20, 5),
            entry(2, 10, 6),
            entry(3, 10, 7),
            entry(4, 20, 8),
        ];
        let out = count(&entries, &voters(&[1, 2, 3, 4]));
        assert_eq!(out.winner(), Some(20));

        // same votes, but candidate 10 was named first
        let entries = [
            entry(1, 10, 1),
            entry(2, 20, 2),
            entry(3, 20, 3),
            entry(4, 10, 4),
        ];
        let out = count(&entries, &voters(&[1, 2, 3, 4]));
        assert_eq!(out.winner(), Some(10));
    }

    #[test]
    fn test_ineligible_entries_are_ignored() {
        // voter 9 is no longer eligible (kicked or eliminated)
        let entries = [entry(1, 5, 1), entry(9, 6, 2), entry(9, 6, 3)];
        let out = count(&entries, &voters(&[1, 2]));
        assert_eq!(out.cast, 1);
        assert!(out.cast <= out.eligible);
        assert_eq!(out.tally.len(), 1);
    }

    #[test]
    fn test_empty_electorate_never_completes() {
        let out = count(&[], &voters(&[]));
        assert!(!out.is_complete());
    }

    #[test]
    fn test_view_carries_ballot_identity() {
        let out = count(&[entry(1, 3, 1)], &voters(&[1]));
        let view = out.view(BallotKind::Elimination, 2);
        assert_eq!(view.round, 2);
        assert_eq!(view.cast, 1);
        assert_eq!(view.tally.len(), 1);
    }
}
