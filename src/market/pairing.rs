//! Opposite-side pairing.
//!
//! Groups the selections of one game + market + subject + line regardless
//! of side, and finds each selection's counterpart: the other team on a
//! moneyline, the flipped direction on an over/under, the other team at the
//! negated line on a spread. Unmatched selections are simply left out.

use std::collections::HashMap;

use super::keys;
use crate::types::{BetGroup, Selection, Side};

/// Side-independent key shared by every outcome of one market/line.
pub fn pairing_key(bet: &Selection) -> String {
    keys::bet_group_key(&bet.game.id, &bet.market_key, &bet.subject_id, bet.line.map(f64::abs))
}

/// What the other side of a two-outcome market looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct OppositeSelection {
    pub side: Side,
    pub line: Option<f64>,
}

pub fn opposite_selection(bet: &Selection) -> Option<OppositeSelection> {
    match &bet.side {
        Side::Over => Some(OppositeSelection { side: Side::Under, line: bet.line }),
        Side::Under => Some(OppositeSelection { side: Side::Over, line: bet.line }),
        Side::Team(code) => {
            let other = if *code == bet.game.home {
                &bet.game.away
            } else if *code == bet.game.away {
                &bet.game.home
            } else {
                // draw / field outcomes have no single opposite
                return None;
            };
            Some(OppositeSelection {
                side: Side::Team(other.clone()),
                line: bet.line.map(|l| -l),
            })
        }
    }
}

fn outcome_key(pairing_key: &str, side: &Side, line: Option<f64>) -> String {
    format!("{pairing_key}#{}#{}", side.key(), keys::format_line(line))
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Incremental pairing index over positions in a selection list.
///
/// Selections without any price are never indexed, so a malformed side
/// drops out of pairing instead of failing it.
#[derive(Debug, Default, Clone)]
pub struct PairIndex {
    by_outcome: HashMap<String, usize>,
    groups: HashMap<String, Vec<usize>>,
}

impl PairIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bet: &Selection, pos: usize) {
        if bet.prices.is_empty() {
            return;
        }
        let key = pairing_key(bet);
        self.by_outcome
            .entry(outcome_key(&key, &bet.side, bet.line))
            .or_insert(pos);
        self.groups.entry(key).or_default().push(pos);
    }

    pub fn clear(&mut self) {
        self.by_outcome.clear();
        self.groups.clear();
    }

    /// Position of the matched opposite selection, if indexed.
    pub fn counterpart(&self, bet: &Selection) -> Option<usize> {
        if bet.prices.is_empty() {
            return None;
        }
        let opposite = opposite_selection(bet)?;
        self.by_outcome
            .get(&outcome_key(&pairing_key(bet), &opposite.side, opposite.line))
            .copied()
    }

    pub fn group(&self, pairing_key: &str) -> &[usize] {
        self.groups.get(pairing_key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Positions of every outcome to de-vig together with `bets[pos]`,
    /// the bet itself first.
    ///
    /// Line-less team markets with three or more distinct sides (e.g. 1X2
    /// soccer) use the whole group; everything else uses the counterpart.
    pub fn outcomes(&self, bets: &[Selection], pos: usize) -> Option<Vec<usize>> {
        let bet = bets.get(pos)?;
        if bet.prices.is_empty() {
            return None;
        }

        if bet.line.is_none() && !bet.side.is_over_under() {
            let mut seen = vec![bet.side.key()];
            let mut outcomes = vec![pos];
            for &p in self.group(&pairing_key(bet)) {
                let side = bets[p].side.key();
                if !seen.contains(&side) {
                    seen.push(side);
                    outcomes.push(p);
                }
            }
            if outcomes.len() >= 3 {
                return Some(outcomes);
            }
        }

        self.counterpart(bet).map(|other| vec![pos, other])
    }
}

/// Map each bet id to its counterpart's id. Single-sided bets are absent.
pub fn pair_bets(bets: &[Selection]) -> HashMap<String, String> {
    let mut index = PairIndex::new();
    for (pos, bet) in bets.iter().enumerate() {
        index.insert(bet, pos);
    }
    bets.iter()
        .filter_map(|bet| {
            index
                .counterpart(bet)
                .map(|other| (bet.id.clone(), bets[other].id.clone()))
        })
        .collect()
}

/// Build groups of 2+ priced selections, in first-seen order.
pub fn group_selections(bets: &[Selection]) -> Vec<BetGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<String, Vec<&Selection>> = HashMap::new();

    for bet in bets.iter().filter(|b| !b.prices.is_empty()) {
        let key = pairing_key(bet);
        if !members.contains_key(&key) {
            order.push(key.clone());
        }
        members.entry(key).or_default().push(bet);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let selections = members.remove(&key)?;
            if selections.len() < 2 {
                return None;
            }
            let first = selections[0];
            Some(BetGroup {
                key,
                game: first.game.clone(),
                market_key: first.market_key.clone(),
                subject_id: first.subject_id.clone(),
                selections: selections.into_iter().cloned().collect(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::fixtures::selection;

    #[test]
    fn test_pairing_key_equal_for_opposites() {
        let over = selection("o", "total", "over", Some(221.5), &[("pinnacle", -110)]);
        let under = selection("u", "total", "under", Some(221.5), &[("pinnacle", -110)]);
        assert_eq!(pairing_key(&over), pairing_key(&under));

        let fav = selection("f", "spread", "LAL", Some(-3.5), &[("pinnacle", -110)]);
        let dog = selection("d", "spread", "BOS", Some(3.5), &[("pinnacle", -110)]);
        assert_eq!(pairing_key(&fav), pairing_key(&dog));
    }

    #[test]
    fn test_pairing_key_differs_across_market_and_line() {
        let a = selection("a", "total", "over", Some(221.5), &[("pinnacle", -110)]);
        let b = selection("b", "total", "over", Some(222.5), &[("pinnacle", -110)]);
        let c = selection("c", "team_total", "over", Some(221.5), &[("pinnacle", -110)]);
        assert_ne!(pairing_key(&a), pairing_key(&b));
        assert_ne!(pairing_key(&a), pairing_key(&c));
    }

    #[test]
    fn test_opposite_selection() {
        let ml = selection("m", "moneyline", "lal", None, &[]);
        assert_eq!(
            opposite_selection(&ml),
            Some(OppositeSelection { side: Side::Team("BOS".into()), line: None })
        );

        let over = selection("o", "total", "over", Some(220.5), &[]);
        assert_eq!(
            opposite_selection(&over),
            Some(OppositeSelection { side: Side::Under, line: Some(220.5) })
        );

        let spread = selection("s", "spread", "BOS", Some(3.5), &[]);
        assert_eq!(
            opposite_selection(&spread),
            Some(OppositeSelection { side: Side::Team("LAL".into()), line: Some(-3.5) })
        );

        let draw = selection("x", "moneyline_3way", "draw", None, &[]);
        assert_eq!(opposite_selection(&draw), None);
    }

    #[test]
    fn test_pair_bets_matches_and_excludes_singles() {
        let bets = vec![
            selection("ml-away", "moneyline", "LAL", None, &[("pinnacle", 120)]),
            selection("ml-home", "moneyline", "BOS", None, &[("pinnacle", -140)]),
            selection("sp-away", "spread", "LAL", Some(3.5), &[("pinnacle", -110)]),
            selection("sp-home", "spread", "BOS", Some(-3.5), &[("pinnacle", -110)]),
            selection("alt-away", "spread", "LAL", Some(-1.5), &[("pinnacle", 200)]),
            selection("over-only", "total", "over", Some(230.5), &[("pinnacle", -105)]),
        ];
        let pairs = pair_bets(&bets);
        assert_eq!(pairs.get("ml-away").map(String::as_str), Some("ml-home"));
        assert_eq!(pairs.get("ml-home").map(String::as_str), Some("ml-away"));
        assert_eq!(pairs.get("sp-away").map(String::as_str), Some("sp-home"));
        assert_eq!(pairs.get("sp-home").map(String::as_str), Some("sp-away"));
        assert!(!pairs.contains_key("alt-away"));
        assert!(!pairs.contains_key("over-only"));
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn test_unpriced_side_is_dropped() {
        let bets = vec![
            selection("over", "total", "over", Some(220.5), &[("pinnacle", -110)]),
            selection("under", "total", "under", Some(220.5), &[]),
        ];
        assert!(pair_bets(&bets).is_empty());
    }

    #[test]
    fn test_three_way_outcomes() {
        let bets = vec![
            selection("h", "moneyline_3way", "BOS", None, &[("pinnacle", 150)]),
            selection("a", "moneyline_3way", "LAL", None, &[("pinnacle", 180)]),
            selection("d", "moneyline_3way", "draw", None, &[("pinnacle", 230)]),
        ];
        let mut index = PairIndex::new();
        for (i, b) in bets.iter().enumerate() {
            index.insert(b, i);
        }
        assert_eq!(index.outcomes(&bets, 0), Some(vec![0, 1, 2]));
        assert_eq!(index.outcomes(&bets, 2), Some(vec![2, 0, 1]));
    }

    #[test]
    fn test_group_selections() {
        let bets = vec![
            selection("o", "total", "over", Some(221.5), &[("pinnacle", -110)]),
            selection("ml", "moneyline", "LAL", None, &[("pinnacle", 120)]),
            selection("u", "total", "under", Some(221.5), &[("circa", -110)]),
        ];
        let groups = group_selections(&bets);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].selections.len(), 2);
        assert_eq!(groups[0].total_quotes(), 2);
        assert_eq!(groups[0].key, pairing_key(&bets[0]));
    }
}
