//! Lazy enumeration of record sets across continuation-token pages.
use std::collections::VecDeque;

use futures::Stream;
use tracing::debug;

use crate::api::{PageRequest, ZoneApi};
use crate::error::DnsError;
use crate::model::{ContinuationToken, RecordSet, RecordType};

enum PagerState {
    Start,
    Continue(ContinuationToken),
    Done,
}

/// Walks a record set listing page by page.
///
/// The first request carries the page size hint and type filter; every
/// later request carries only the continuation token of the page before.
/// The walk ends on the first page returned without a token. [`reset`]
/// restarts it from the beginning.
///
/// [`reset`]: RecordSetPager::reset
pub struct RecordSetPager<'a> {
    api: &'a dyn ZoneApi,
    resource_group: String,
    zone_name: String,
    first: PageRequest,
    state: PagerState,
    buffer: VecDeque<RecordSet>,
    pages_fetched: usize,
}

impl<'a> RecordSetPager<'a> {
    pub fn new(
        api: &'a dyn ZoneApi,
        resource_group: impl Into<String>,
        zone_name: impl Into<String>,
        page_size: Option<u32>,
        record_type: Option<RecordType>,
    ) -> Self {
        Self {
            api,
            resource_group: resource_group.into(),
            zone_name: zone_name.into(),
            first: PageRequest::First {
                page_size,
                record_type,
            },
            state: PagerState::Start,
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }

    /// Back to the first page; buffered items are dropped.
    pub fn reset(&mut self) {
        self.state = PagerState::Start;
        self.buffer.clear();
        self.pages_fetched = 0;
    }

    /// True while another page may be fetched.
    pub fn has_more_pages(&self) -> bool {
        !matches!(self.state, PagerState::Done)
    }

    /// True once every item has been yielded.
    pub fn is_exhausted(&self) -> bool {
        self.buffer.is_empty() && !self.has_more_pages()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// The next page of items, or `None` at the end.
    ///
    /// Items already buffered by [`next_record`](Self::next_record) come
    /// back first as a page of their own. A failed fetch leaves the state
    /// untouched so the same page can be requested again.
    pub async fn next_page(&mut self) -> Option<Result<Vec<RecordSet>, DnsError>> {
        if !self.buffer.is_empty() {
            return Some(Ok(self.buffer.drain(..).collect()));
        }

        let request = match &self.state {
            PagerState::Start => self.first.clone(),
            PagerState::Continue(token) => PageRequest::Next(token.clone()),
            PagerState::Done => return None,
        };

        let page = match self
            .api
            .list_record_sets_page(&self.resource_group, &self.zone_name, &request)
            .await
        {
            Ok(page) => page,
            Err(err) => return Some(Err(err)),
        };

        self.pages_fetched += 1;
        debug!(
            zone = %self.zone_name,
            page = self.pages_fetched,
            items = page.items.len(),
            more = page.continuation.is_some(),
            "fetched record set page"
        );
        self.state = match page.continuation {
            Some(token) => PagerState::Continue(token),
            None => PagerState::Done,
        };
        Some(Ok(page.items))
    }

    /// The next record set, fetching pages as needed. Empty pages are skipped.
    pub async fn next_record(&mut self) -> Option<Result<RecordSet, DnsError>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            match self.next_page().await? {
                Ok(items) => self.buffer.extend(items),
                Err(err) => return Some(Err(err)),
            }
        }
    }

    /// Total number of record sets, walking the listing from the start.
    pub async fn count(&mut self) -> Result<usize, DnsError> {
        self.reset();
        let mut total = 0;
        while let Some(page) = self.next_page().await {
            total += page?.len();
        }
        Ok(total)
    }

    /// Every record set, walking the listing from the start.
    pub async fn collect_all(&mut self) -> Result<Vec<RecordSet>, DnsError> {
        self.reset();
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await {
            all.extend(page?);
        }
        Ok(all)
    }

    /// The remaining record sets as a stream; it ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<RecordSet, DnsError>> + 'a {
        futures::stream::unfold(self, |mut pager| async move {
            match pager.next_record().await? {
                Ok(item) => Some((Ok(item), pager)),
                Err(err) => {
                    pager.state = PagerState::Done;
                    pager.buffer.clear();
                    Some((Err(err), pager))
                }
            }
        })
    }
}
