use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use mdsync_core::{FetchedPage, PagePlan, PageRequest};
use mdsync_engine::{paginate, FailureKind, FetchError, JsonFileSource, Source};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

/// Serves `0..total` and records every request it sees.
struct CountingSource {
    total: u64,
    fail_on_call: Option<usize>,
    requests: Mutex<Vec<PageRequest>>,
}

impl CountingSource {
    fn new(total: u64) -> Self {
        Self {
            total,
            fail_on_call: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Source for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, FetchError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if self.fail_on_call == Some(call) {
            return Err(FetchError {
                kind: FailureKind::HttpStatus(503),
                message: "unavailable".into(),
            });
        }
        let end = match request.page_size {
            Some(size) => (request.skip + size).min(self.total),
            None => self.total,
        };
        let records = (request.skip.min(end)..end).map(Value::from).collect();
        Ok(FetchedPage::new(records, self.total))
    }
}

async fn collect(source: &dyn Source, plan: PagePlan) -> Result<Vec<FetchedPage>, FetchError> {
    paginate(source, plan).try_collect().await
}

#[tokio::test]
async fn limit_within_one_page_covers_the_requested_window() {
    let source = CountingSource::new(100);
    let pages = collect(
        &source,
        PagePlan {
            skip: 5,
            limit: Some(11),
            page_size: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(pages.len(), 1);
    let expected: Vec<Value> = (5..16).map(Value::from).collect();
    assert_eq!(pages[0].records, expected);
    assert_eq!(
        source.requests(),
        vec![PageRequest {
            skip: 5,
            page_size: Some(11)
        }]
    );
}

#[tokio::test]
async fn pages_through_total_without_limit() {
    let source = CountingSource::new(25);
    let pages = collect(
        &source,
        PagePlan {
            page_size: Some(10),
            ..PagePlan::default()
        },
    )
    .await
    .unwrap();

    let sizes: Vec<u64> = pages.iter().map(FetchedPage::count).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    let skips: Vec<u64> = source.requests().iter().map(|r| r.skip).collect();
    assert_eq!(skips, vec![0, 10, 20]);
}

#[tokio::test]
async fn final_request_is_clamped_to_the_limit() {
    let source = CountingSource::new(100);
    let pages = collect(
        &source,
        PagePlan {
            skip: 0,
            limit: Some(23),
            page_size: Some(10),
        },
    )
    .await
    .unwrap();

    let sizes: Vec<u64> = pages.iter().map(FetchedPage::count).collect();
    assert_eq!(sizes, vec![10, 10, 3]);
    assert_eq!(source.requests().last().unwrap().page_size, Some(3));
}

#[tokio::test]
async fn empty_source_yields_no_pages() {
    let source = CountingSource::new(0);
    let pages = collect(&source, PagePlan::default()).await.unwrap();
    assert!(pages.is_empty());
    assert_eq!(source.requests().len(), 1);
}

#[tokio::test]
async fn failure_is_yielded_once_and_ends_the_stream() {
    let mut source = CountingSource::new(30);
    source.fail_on_call = Some(2);
    let plan = PagePlan {
        page_size: Some(10),
        ..PagePlan::default()
    };

    let items: Vec<Result<FetchedPage, FetchError>> = paginate(&source, plan).collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().count(), 10);
    assert_eq!(
        items[1].as_ref().unwrap_err().kind,
        FailureKind::HttpStatus(503)
    );
    assert_eq!(source.requests().len(), 2);
}

#[tokio::test]
async fn each_call_restarts_from_the_plan() {
    let source = JsonFileSource::from_records("inline", (0..7).map(|i| json!({"id": i})).collect());
    let plan = PagePlan {
        page_size: Some(3),
        ..PagePlan::default()
    };
    let first = collect(&source, plan).await.unwrap();
    let second = collect(&source, plan).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn nothing_is_fetched_until_polled() {
    let source = CountingSource::new(10);
    let stream = paginate(&source, PagePlan::default());
    assert!(source.requests().is_empty());
    drop(stream);
}
