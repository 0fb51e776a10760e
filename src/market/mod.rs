//! Market identity (keys, sharp-book lists, pairing and fee schedules)
//! plus the conversion from wire records into immutable selections.

pub mod books;
pub mod fees;
pub mod keys;
pub mod pairing;

use tracing::{debug, warn};

use crate::sources::BetRecord;
use crate::types::{BookPrice, Confidence, FairlineError, Game, Selection, ServerAnnotations, Side};

/// Build a selection from a fetched record.
///
/// Quotes with no book name are dropped. A record missing its identity
/// (id, teams, market or side) is rejected.
pub fn selection_from_record(record: &BetRecord) -> Result<Selection, FairlineError> {
    let required = [
        ("id", &record.id),
        ("league", &record.league),
        ("away_team", &record.away_team),
        ("home_team", &record.home_team),
        ("market_key", &record.market_key),
        ("side", &record.side),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(FairlineError::InvalidRecord(format!(
            "record '{}' is missing {field}",
            record.id
        )));
    }

    let game = Game {
        id: keys::game_id(&record.league, record.game_date, &record.away_team, &record.home_team),
        league: keys::normalise_code(&record.league),
        date: record.game_date,
        away: keys::normalise_code(&record.away_team),
        home: keys::normalise_code(&record.home_team),
    };
    let subject_id = record
        .subject
        .as_deref()
        .map(|name| keys::subject_id(name, record.subject_suffix.as_deref()))
        .unwrap_or_default();
    let line = record.line.filter(|l| l.is_finite());
    let side = Side::parse(&record.side);
    let market_key = record.market_key.trim().to_lowercase();

    let prices: Vec<BookPrice> = record
        .prices
        .iter()
        .filter(|q| !q.book.trim().is_empty())
        .map(|q| BookPrice {
            book: q.book.trim().to_string(),
            odds: q.odds.into(),
            observed_at: q.observed_at,
            ev_percent: q.ev_percent.filter(|v| v.is_finite()),
            true_probability: q.true_probability.filter(|v| v.is_finite()),
            is_sharp: q.is_sharp,
        })
        .collect();
    if prices.len() < record.prices.len() {
        debug!(bet_id = %record.id, dropped = record.prices.len() - prices.len(), "Dropped unnamed quotes");
    }

    let server = if record.true_probability.is_some() || record.ev_percent.is_some() {
        Some(ServerAnnotations {
            true_probability: record.true_probability.filter(|v| v.is_finite()),
            ev_percent: record.ev_percent.filter(|v| v.is_finite()),
            confidence: server_confidence(record),
        })
    } else {
        None
    };

    let selection_key = keys::selection_key(
        &keys::bet_group_key(&game.id, &market_key, &subject_id, line),
        &side,
    );
    let bet_group_key = keys::bet_group_key(&game.id, &market_key, &subject_id, line.map(f64::abs));

    Ok(Selection {
        id: record.id.trim().to_string(),
        selection_key,
        bet_group_key,
        game,
        market_key,
        subject_id,
        line,
        side,
        prices,
        server,
    })
}

/// The server's confidence tier. A blank or missing tier is absent; a tier
/// that does not parse grades as `None` so it can never count as reliable.
fn server_confidence(record: &BetRecord) -> Option<Confidence> {
    let raw = record.confidence.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
    match raw.parse::<Confidence>() {
        Ok(tier) => Some(tier),
        Err(e) => {
            warn!(bet_id = %record.id, tier = raw, error = %e, "Unrecognised server confidence tier");
            Some(Confidence::None)
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PriceQuote;
    use chrono::{NaiveDate, Utc};

    fn record() -> BetRecord {
        BetRecord {
            id: "bet-1".into(),
            league: "nba".into(),
            game_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            away_team: "lal".into(),
            home_team: "bos".into(),
            market_key: "Spread".into(),
            subject: None,
            subject_suffix: None,
            line: Some(-3.5),
            side: "lal".into(),
            prices: vec![
                PriceQuote::new("Pinnacle", -110, Utc::now()),
                PriceQuote::new("  ", -110, Utc::now()),
                PriceQuote::new("draftkings", 50, Utc::now()),
            ],
            true_probability: None,
            ev_percent: None,
            confidence: None,
        }
    }

    #[test]
    fn test_selection_from_record() {
        let sel = selection_from_record(&record()).unwrap();
        assert_eq!(sel.game.id, "NBA:2026-01-15:LAL-BOS");
        assert_eq!(sel.bet_group_key, "NBA:2026-01-15:LAL-BOS|spread||3.5");
        assert_eq!(sel.selection_key, "NBA:2026-01-15:LAL-BOS|spread||-3.5:LAL");
        assert_eq!(sel.prices.len(), 2);
        assert_eq!(sel.prices[1].odds.value(), 100);
        assert!(sel.server.is_none());
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let mut r = record();
        r.home_team = " ".into();
        assert!(matches!(selection_from_record(&r), Err(FairlineError::InvalidRecord(_))));
    }

    #[test]
    fn test_player_subject_and_server_annotations() {
        let mut r = record();
        r.market_key = "player_points".into();
        r.subject = Some("LeBron James".into());
        r.line = Some(25.5);
        r.side = "over".into();
        r.true_probability = Some(0.54);
        r.confidence = Some("HIGH".into());
        let sel = selection_from_record(&r).unwrap();
        assert_eq!(sel.subject_id, "lebron-james");
        assert_eq!(sel.bet_group_key, "NBA:2026-01-15:LAL-BOS|player_points|lebron-james|25.5");
        let server = sel.server.unwrap();
        assert_eq!(server.true_probability, Some(0.54));
        assert_eq!(server.confidence, Some(Confidence::High));
    }

    #[test]
    fn test_server_confidence_tiers() {
        let mut r = record();
        r.true_probability = Some(0.55);

        r.confidence = Some("elite".into());
        let sel = selection_from_record(&r).unwrap();
        assert_eq!(sel.server.unwrap().confidence, Some(Confidence::None));

        r.confidence = Some("  ".into());
        let sel = selection_from_record(&r).unwrap();
        assert_eq!(sel.server.unwrap().confidence, None);

        r.confidence = None;
        let sel = selection_from_record(&r).unwrap();
        assert_eq!(sel.server.unwrap().confidence, None);

        r.confidence = Some("moderate".into());
        let sel = selection_from_record(&r).unwrap();
        assert_eq!(sel.server.unwrap().confidence, Some(Confidence::Medium));
    }
}
