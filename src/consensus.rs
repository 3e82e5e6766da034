use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::Field;
use crate::vin;

/// A normalised value and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCandidate {
    pub value: String,
    pub strategy: usize,
}

/// Outcome of the vote for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldResult {
    pub value: Option<String>,
    /// Strategies that agreed on `value`; 0 when nothing was found.
    pub votes: usize,
}

impl FieldResult {
    pub fn empty() -> Self {
        Self {
            value: None,
            votes: 0,
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug)]
struct Tally<'a> {
    value: &'a str,
    votes: usize,
    /// Earliest strategy that produced the value.
    first: usize,
}

fn tally(candidates: &[NormalizedCandidate]) -> Vec<Tally<'_>> {
    let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for c in candidates {
        let entry = groups.entry(c.value.as_str()).or_insert((0, c.strategy));
        entry.0 += 1;
        entry.1 = entry.1.min(c.strategy);
    }
    groups
        .into_iter()
        .map(|(value, (votes, first))| Tally {
            value,
            votes,
            first,
        })
        .collect()
}

/// Pick the winning value by majority vote.
///
/// Ties on vote count go to the value first produced in strategy order,
/// then to the lexically smaller value, so the result never depends on
/// the order candidates arrive in.
///
/// For VINs the structural score breaks ties before strategy order, and a
/// leader whose check digit fails yields to a check-digit-valid value that
/// trails it by at most one vote.
pub fn resolve(field: Field, candidates: &[NormalizedCandidate]) -> FieldResult {
    let mut groups = tally(candidates);
    if groups.is_empty() {
        return FieldResult::empty();
    }

    let winner = match field {
        Field::Vin => {
            groups.sort_by_key(|t| {
                (
                    Reverse(t.votes),
                    Reverse(vin::structural_score(t.value)),
                    t.first,
                    t.value,
                )
            });
            let leader = &groups[0];
            if vin::has_valid_check_digit(leader.value) {
                leader
            } else {
                groups
                    .iter()
                    .find(|t| t.votes + 1 >= leader.votes && vin::has_valid_check_digit(t.value))
                    .unwrap_or(leader)
            }
        }
        Field::RegNumber | Field::BodyNumber => {
            groups.sort_by_key(|t| (Reverse(t.votes), t.first, t.value));
            &groups[0]
        }
    };

    debug!(
        %field,
        value = winner.value,
        votes = winner.votes,
        distinct = groups.len(),
        "consensus"
    );
    FieldResult {
        value: Some(winner.value.to_string()),
        votes: winner.votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(values: &[&str]) -> Vec<NormalizedCandidate> {
        values
            .iter()
            .enumerate()
            .map(|(strategy, v)| NormalizedCandidate {
                value: v.to_string(),
                strategy,
            })
            .collect()
    }

    #[test]
    fn no_candidates_means_no_value() {
        assert_eq!(resolve(Field::RegNumber, &[]), FieldResult::empty());
        assert_eq!(resolve(Field::Vin, &[]).votes, 0);
    }

    #[test]
    fn majority_wins() {
        let c = candidates(&["А123АА77", "А123АА77", "В123АА77", "А123АА77"]);
        let r = resolve(Field::RegNumber, &c);
        assert_eq!(r.value.as_deref(), Some("А123АА77"));
        assert_eq!(r.votes, 3);
    }

    #[test]
    fn tie_goes_to_earliest_strategy() {
        let c = candidates(&["ZZT2400012345", "AAA1111111", "AAA1111111", "ZZT2400012345"]);
        let r = resolve(Field::BodyNumber, &c);
        assert_eq!(r.value.as_deref(), Some("ZZT2400012345"));
        assert_eq!(r.votes, 2);
    }

    #[test]
    fn order_of_arrival_does_not_matter() {
        let c = candidates(&["В883ВО799", "А123АА77", "В883ВО799", "А123АА77", "С001СС01"]);
        let expected = resolve(Field::RegNumber, &c);
        let mut reversed = c.clone();
        reversed.reverse();
        assert_eq!(resolve(Field::RegNumber, &reversed), expected);
        let mut rotated = c.clone();
        rotated.rotate_left(2);
        assert_eq!(resolve(Field::RegNumber, &rotated), expected);
    }

    #[test]
    fn votes_never_exceed_candidates() {
        let c = candidates(&["В883ВО799"; 5]);
        let r = resolve(Field::RegNumber, &c);
        assert_eq!(r.votes, 5);
    }

    #[test]
    fn vin_check_digit_overrides_narrow_lead() {
        // Valid VIN trails the corrupted one by a single vote.
        let c = candidates(&[
            "1M8GDM9A1KP042788",
            "1M8GDM9A1KP042788",
            "1M8GDM9AXKP042788",
        ]);
        let r = resolve(Field::Vin, &c);
        assert_eq!(r.value.as_deref(), Some("1M8GDM9AXKP042788"));
        assert_eq!(r.votes, 1);
    }

    #[test]
    fn vin_check_digit_does_not_override_clear_majority() {
        let c = candidates(&[
            "1M8GDM9A1KP042788",
            "1M8GDM9A1KP042788",
            "1M8GDM9A1KP042788",
            "1M8GDM9AXKP042788",
        ]);
        let r = resolve(Field::Vin, &c);
        assert_eq!(r.value.as_deref(), Some("1M8GDM9A1KP042788"));
        assert_eq!(r.votes, 3);
    }

    #[test]
    fn vin_tie_prefers_better_structure() {
        // Equal votes; the second has a letter in position 1.
        let c = candidates(&["1P1ZZZ9PZ9LA42290", "WP1ZZZ9PZ9LA42290"]);
        let r = resolve(Field::Vin, &c);
        assert_eq!(r.value.as_deref(), Some("WP1ZZZ9PZ9LA42290"));
    }
}
