//! Sharp-book classification.
//!
//! A static, case-insensitive allow-list of books whose prices are treated
//! as the efficient reference, keyed by sport/league. Unknown sports fall
//! back to the default list.

use std::collections::HashMap;

use crate::types::BookPrice;

/// Reference books known for efficient pricing.
pub const DEFAULT_SHARP_BOOKS: &[&str] = &["pinnacle", "circa", "bookmaker"];

struct SportBooks {
    sports: &'static [&'static str],
    books: &'static [&'static str],
}

const SPORT_SHARP_BOOKS: &[SportBooks] = &[
    SportBooks { sports: &["nba", "nfl", "mlb", "nhl", "ncaab", "ncaaf", "wnba"], books: &["pinnacle", "circa", "bookmaker"] },
    SportBooks { sports: &["epl", "ucl", "laliga", "seriea", "bundesliga", "mls", "soccer"], books: &["pinnacle", "betfair_exchange", "sbobet"] },
    SportBooks { sports: &["atp", "wta", "tennis"], books: &["pinnacle", "betfair_exchange"] },
];

#[derive(Debug, Clone)]
pub struct BookClassifier {
    default: Vec<String>,
    by_sport: HashMap<String, Vec<String>>,
}

impl Default for BookClassifier {
    fn default() -> Self {
        let mut by_sport = HashMap::new();
        for entry in SPORT_SHARP_BOOKS {
            for sport in entry.sports {
                by_sport.insert(sport.to_string(), entry.books.iter().map(|b| b.to_string()).collect());
            }
        }
        Self {
            default: DEFAULT_SHARP_BOOKS.iter().map(|b| b.to_string()).collect(),
            by_sport,
        }
    }
}

impl BookClassifier {
    /// Built-in lists with configured overrides layered on top.
    pub fn with_overrides(default: Option<Vec<String>>, by_sport: HashMap<String, Vec<String>>) -> Self {
        let mut classifier = Self::default();
        if let Some(books) = default {
            classifier.default = books.iter().map(|b| normalise_book(b)).collect();
        }
        for (sport, books) in by_sport {
            classifier
                .by_sport
                .insert(normalise_book(&sport), books.iter().map(|b| normalise_book(b)).collect());
        }
        classifier
    }

    /// Sharp list for a sport; unknown sports get the default list.
    pub fn sharp_books(&self, sport: &str) -> &[String] {
        self.by_sport
            .get(&normalise_book(sport))
            .unwrap_or(&self.default)
    }

    pub fn is_sharp(&self, sport: &str, book: &str) -> bool {
        let book = normalise_book(book);
        self.sharp_books(sport).iter().any(|b| *b == book)
    }

    /// A server `is_sharp` flag on the quote wins over the allow-list.
    pub fn is_sharp_price(&self, sport: &str, price: &BookPrice) -> bool {
        price.is_sharp.unwrap_or_else(|| self.is_sharp(sport, &price.book))
    }
}

/// Book identifiers compare trimmed and lower-cased.
pub fn normalise_book(book: &str) -> String {
    book.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
