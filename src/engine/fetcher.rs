//! Bounded, ordered page fetching.
//!
//! Pages after the first are requested in ascending offset order with at
//! most `max_in_flight` requests outstanding. Each request races the
//! cycle's cancellation token. Completed pages are held back until every
//! lower offset has been delivered, so the consumer always sees a
//! contiguous prefix in offset order.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sources::{BetPage, OddsSource};

/// Which pages to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    /// First offset to request.
    pub start: usize,
    pub page_size: usize,
    /// Total records reported by the first page.
    pub total: usize,
}

impl PagePlan {
    pub fn offsets(&self) -> Vec<usize> {
        if self.page_size == 0 {
            return Vec::new();
        }
        (self.start..self.total).step_by(self.page_size).collect()
    }
}

/// How a background fill ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every page delivered.
    Complete { pages: usize },
    /// A page failed; pages below `offset` were delivered.
    Failed { offset: usize, error: String },
    /// The cancellation token fired.
    Cancelled,
    /// The consumer refused a page (its generation moved on).
    Superseded,
}

/// Fetch every page in `plan`, handing each to `deliver` in offset order.
///
/// `deliver` returns false to stop the fill. Stops at the first failed
/// page; pages behind it that already arrived are discarded.
pub async fn fetch_pages<F, Fut>(
    source: Arc<dyn OddsSource>,
    plan: PagePlan,
    max_in_flight: usize,
    cancel: CancellationToken,
    mut deliver: F,
) -> FetchOutcome
where
    F: FnMut(BetPage) -> Fut,
    Fut: Future<Output = bool>,
{
    let offsets = plan.offsets();
    if offsets.is_empty() {
        return FetchOutcome::Complete { pages: 0 };
    }

    let page_size = plan.page_size;
    let mut responses = stream::iter(offsets.iter().copied().map(|offset| {
        let source = Arc::clone(&source);
        let cancel = cancel.clone();
        async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                res = source.fetch_page(offset, page_size) => Some(res),
            };
            (offset, result)
        }
    }))
    .buffer_unordered(max_in_flight.max(1));

    let mut held: BTreeMap<usize, BetPage> = BTreeMap::new();
    let mut next = 0;
    let mut delivered = 0;

    while let Some((offset, result)) = responses.next().await {
        match result {
            None => return FetchOutcome::Cancelled,
            Some(Err(e)) => {
                warn!(offset, error = %e, "Page fetch failed, stopping fill");
                return FetchOutcome::Failed {
                    offset,
                    error: format!("{e:#}"),
                };
            }
            Some(Ok(page)) => {
                debug!(offset, count = page.bets.len(), "Page arrived");
                held.insert(offset, page);
            }
        }

        while let Some(page) = offsets.get(next).and_then(|o| held.remove(o)) {
            if cancel.is_cancelled() {
                return FetchOutcome::Cancelled;
            }
            if !deliver(page).await {
                return FetchOutcome::Superseded;
            }
            next += 1;
            delivered += 1;
        }
    }

    FetchOutcome::Complete { pages: delivered }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::MockOddsSource;
    use std::sync::Mutex;
    use std::time::Duration;

    fn plan(total: usize) -> PagePlan {
        PagePlan { start: 100, page_size: 100, total }
    }

    #[test]
    fn test_offsets() {
        assert_eq!(plan(450).offsets(), vec![100, 200, 300, 400]);
        assert!(plan(100).offsets().is_empty());
        assert!(PagePlan { start: 0, page_size: 0, total: 10 }.offsets().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_completion_is_delivered_in_order() {
        let source = Arc::new(
            MockOddsSource::new(600)
                .with_offset_latency(100, Duration::from_millis(60))
                .with_offset_latency(200, Duration::from_millis(30)),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let outcome = fetch_pages(source.clone(), plan(600), 3, CancellationToken::new(), |page| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(page.offset);
                true
            }
        })
        .await;

        assert_eq!(outcome, FetchOutcome::Complete { pages: 5 });
        assert_eq!(*seen.lock().unwrap(), vec![100, 200, 300, 400, 500]);
        assert!(source.max_in_flight() <= 3);
        // the slow first offset completed after later ones
        assert_ne!(source.requests()[0].offset, 100);
    }

    #[tokio::test]
    async fn test_failure_stops_fill() {
        let source = Arc::new(MockOddsSource::new(500));
        source.fail_at(300);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let outcome = fetch_pages(source, plan(500), 1, CancellationToken::new(), |page| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(page.offset);
                true
            }
        })
        .await;

        assert!(matches!(outcome, FetchOutcome::Failed { offset: 300, .. }));
        assert_eq!(*seen.lock().unwrap(), vec![100, 200]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = Arc::new(MockOddsSource::new(500).with_latency(Duration::from_millis(50)));
        let token = CancellationToken::new();
        token.cancel();
        let outcome = fetch_pages(source.clone(), plan(500), 3, token, |_| async { true }).await;
        assert_eq!(outcome, FetchOutcome::Cancelled);
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn test_consumer_can_stop_fill() {
        let source = Arc::new(MockOddsSource::new(500));
        let outcome = fetch_pages(source, plan(500), 2, CancellationToken::new(), |_| async { false }).await;
        assert_eq!(outcome, FetchOutcome::Superseded);
    }
}
