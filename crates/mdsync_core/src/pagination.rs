use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-supplied bounds of one fetch sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagePlan {
    /// Offset of the first record to fetch.
    pub skip: u64,
    /// Maximum number of records produced over the whole sequence.
    pub limit: Option<u64>,
    /// Maximum number of records requested per call.
    pub page_size: Option<u64>,
}

/// One call to a source's single-page fetch primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: u64,
    /// `None` lets the source pick its own page size.
    pub page_size: Option<u64>,
}

/// One page as reported by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub records: Vec<Value>,
    /// Total number of records the source reported with this page. The
    /// latest value always wins.
    pub total: u64,
}

impl FetchedPage {
    pub fn new(records: Vec<Value>, total: u64) -> Self {
        Self { records, total }
    }

    pub fn count(&self) -> u64 {
        self.records.len() as u64
    }
}

/// Bookkeeping for one paginated fetch sequence.
///
/// The cursor never performs I/O: callers ask for the [`next_request`],
/// perform it, and feed the page back through [`advance`], which returns the
/// page to hand downstream (possibly truncated to the remaining limit).
///
/// [`next_request`]: PageCursor::next_request
/// [`advance`]: PageCursor::advance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    skip: u64,
    limit: Option<u64>,
    page_size: Option<u64>,
    total: Option<u64>,
    produced: u64,
    complete: bool,
}

impl PageCursor {
    pub fn new(plan: PagePlan) -> Self {
        Self {
            skip: plan.skip,
            limit: plan.limit,
            page_size: plan.page_size,
            total: None,
            produced: 0,
            complete: plan.limit == Some(0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Records handed downstream so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Offset the next request starts at.
    pub fn skip(&self) -> u64 {
        self.skip
    }

    /// Total reported by the most recent page, if any page was fetched.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// The next request to issue, or `None` once the sequence is complete.
    ///
    /// With a limit, the requested size never exceeds what remains under it.
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.complete {
            return None;
        }
        let remaining = self.limit.map(|limit| limit.saturating_sub(self.produced));
        let page_size = match (self.page_size, remaining) {
            (Some(size), Some(remaining)) => Some(size.min(remaining)),
            (None, Some(remaining)) => Some(remaining),
            (size, None) => size,
        };
        Some(PageRequest {
            skip: self.skip,
            page_size,
        })
    }

    /// Applies a fetched page and returns what should be yielded for it.
    ///
    /// Returns `None` when the source reports a total of zero: the sequence
    /// is complete and has no pages. A page without records also completes
    /// the sequence, since the cursor could not make progress past it.
    pub fn advance(&mut self, mut page: FetchedPage) -> Option<FetchedPage> {
        let returned = page.count();
        self.total = Some(page.total);
        if page.total == 0 {
            self.complete = true;
            return None;
        }

        let mut produced = self.produced + returned;
        if let Some(limit) = self.limit {
            if produced >= limit {
                let excess = produced - limit;
                page.records.truncate((returned - excess) as usize);
                produced = limit;
                self.complete = true;
            }
        }
        self.produced = produced;

        // Advance by what the source returned, not by what was kept.
        self.skip += returned;
        if self.skip >= page.total || returned == 0 {
            self.complete = true;
        }
        Some(page)
    }
}
