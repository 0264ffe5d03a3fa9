use futures_util::stream::{self, Stream};
use mdsync_core::{FetchedPage, PageCursor, PagePlan};
use sync_logging::sync_debug;

use crate::source::Source;
use crate::types::FetchError;

/// Lazily pages through `source` under `plan`.
///
/// Each call starts a fresh sequence; nothing is fetched until the stream is
/// polled. A fetch failure is yielded once and ends the stream.
pub fn paginate<'a>(
    source: &'a dyn Source,
    plan: PagePlan,
) -> impl Stream<Item = Result<FetchedPage, FetchError>> + 'a {
    stream::try_unfold(PageCursor::new(plan), move |mut cursor| async move {
        let Some(request) = cursor.next_request() else {
            return Ok(None);
        };
        sync_debug!(
            "{}: requesting skip={} page_size={:?}",
            source.name(),
            request.skip,
            request.page_size
        );
        let page = source.fetch(request).await?;
        Ok(cursor.advance(page).map(|page| (page, cursor)))
    })
}
