use repohist_core::error::ProviderError;
use repohist_core::types::{Revision, Watermark};
use repohist_provider::HistoryProvider;
use tracing::debug;

/// An abstract paged commit listing: 1-based pages, newest-first, at most
/// `per_page` items each. The resume-point search runs against this seam so
/// it can be tested exhaustively on fabricated in-memory histories.
pub trait CommitPager {
    fn per_page(&self) -> u32;
    fn page(&self, page: u32) -> Result<Vec<Revision>, ProviderError>;
}

/// [`CommitPager`] over a live provider, scoped to the repository root and
/// bounded below by the watermark.
pub struct ProviderPager<'a> {
    provider: &'a dyn HistoryProvider,
    watermark: Option<&'a Watermark>,
    per_page: u32,
}

impl<'a> ProviderPager<'a> {
    pub fn new(
        provider: &'a dyn HistoryProvider,
        watermark: Option<&'a Watermark>,
        per_page: u32,
    ) -> Self {
        Self {
            provider,
            watermark,
            per_page,
        }
    }
}

impl CommitPager for ProviderPager<'_> {
    fn per_page(&self) -> u32 {
        self.per_page
    }

    fn page(&self, page: u32) -> Result<Vec<Revision>, ProviderError> {
        self.provider.commits("", self.watermark, page, self.per_page)
    }
}

/// Locate the minimal page a resume scan must start from and collect every
/// commit from there to the end of the listing.
///
/// Strategy: gallop forward `window` pages at a time until a requested page
/// comes back short (the forward boundary), step back one window so the true
/// resume point cannot have been skipped, then scan page-by-page until an
/// empty page. Only a page the gallop actually requested counts as the
/// boundary.
///
/// The result is intentionally unfiltered: commit identity is decided
/// downstream by scmid, never by comparing timestamps, since remote ordering
/// is not strictly monotonic across pages.
pub fn find_new_revisions(
    pager: &impl CommitPager,
    watermark: Option<&Watermark>,
    window: u32,
) -> Result<Vec<Revision>, ProviderError> {
    let per_page = pager.per_page() as usize;

    // Gallop. The first probe doubles as the O(1) already-current check:
    // when nothing on page 1 differs from the watermark id (the watermark
    // commit itself, or an empty since-bounded listing), there is nothing
    // to fetch and no further page is requested.
    let mut boundary = 1;
    for i in 0u32.. {
        let page_no = i * window + 1;
        debug!(page = page_no, "gallop probe");
        let batch = pager.page(page_no)?;
        if i == 0 {
            let current = match watermark {
                Some(wm) => batch.iter().all(|r| r.scmid == wm.last_committed_id),
                None => batch.is_empty(),
            };
            if current {
                return Ok(Vec::new());
            }
        }
        if batch.len() < per_page {
            boundary = page_no;
            break;
        }
    }

    // Back off one window, clamped to the first page.
    let start = if boundary > window {
        boundary - window
    } else {
        1
    };

    let mut revisions = Vec::new();
    for page_no in start.. {
        debug!(page = page_no, "scan page");
        let batch = pager.page(page_no)?;
        if batch.is_empty() {
            break;
        }
        revisions.extend(batch);
    }
    Ok(revisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Fabricated newest-first history. When a watermark is applied the
    /// listing is bounded to commits strictly after its date, mirroring a
    /// since-filtered remote listing. Requested pages are logged.
    struct FakePager {
        listing: Vec<Revision>,
        per_page: u32,
        requests: RefCell<Vec<u32>>,
    }

    impl FakePager {
        fn new(total: usize, per_page: u32, watermark: Option<&Watermark>) -> Self {
            // Commit i=1 is oldest; listing is newest-first.
            let mut listing: Vec<Revision> = (1..=total).rev().map(revision).collect();
            if let Some(wm) = watermark {
                listing.retain(|r| r.committed_on > wm.last_committed_date);
            }
            Self {
                listing,
                per_page,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl CommitPager for FakePager {
        fn per_page(&self) -> u32 {
            self.per_page
        }

        fn page(&self, page: u32) -> Result<Vec<Revision>, ProviderError> {
            self.requests.borrow_mut().push(page);
            let start = ((page - 1) * self.per_page) as usize;
            let end = (start + self.per_page as usize).min(self.listing.len());
            if start >= self.listing.len() {
                return Ok(Vec::new());
            }
            Ok(self.listing[start..end].to_vec())
        }
    }

    fn revision(i: usize) -> Revision {
        Revision {
            scmid: format!("{i:040x}"),
            parents: if i > 1 {
                vec![format!("{:040x}", i - 1)]
            } else {
                Vec::new()
            },
            author: "alice".into(),
            committed_on: format!("2024-01-01T00:00:{i:02}Z"),
            message: format!("commit {i}"),
            file_changes: None,
        }
    }

    fn cursor(i: usize) -> Watermark {
        Watermark {
            last_committed_date: format!("2024-01-01T00:00:{i:02}Z"),
            last_committed_id: format!("{i:040x}"),
        }
    }

    #[test]
    fn already_current_is_a_single_probe() {
        // Inclusive since-filters hand back the watermark commit itself as
        // the lone page-1 item; nothing differs from the watermark id.
        let wm = cursor(30);
        let pager = FakePager {
            listing: vec![revision(30)],
            per_page: 5,
            requests: RefCell::new(Vec::new()),
        };
        let revs = find_new_revisions(&pager, Some(&wm), 3).unwrap();
        assert!(revs.is_empty());
        assert_eq!(pager.request_count(), 1);
    }

    #[test]
    fn empty_filtered_listing_is_also_current() {
        let wm = cursor(30);
        let pager = FakePager::new(30, 5, Some(&wm));
        let revs = find_new_revisions(&pager, Some(&wm), 3).unwrap();
        assert!(revs.is_empty());
        assert_eq!(pager.request_count(), 1);
    }

    #[test]
    fn empty_history_without_watermark_returns_nothing() {
        let pager = FakePager::new(0, 5, None);
        assert!(find_new_revisions(&pager, None, 3).unwrap().is_empty());
        assert_eq!(pager.request_count(), 1);
    }

    #[test]
    fn short_history_is_returned_whole_without_gaps() {
        // 12 commits, 5 per page, window 3: gallop probes 1 (full) then 4
        // (empty), backtracks to 1, scans 1..3.
        let pager = FakePager::new(12, 5, None);
        let revs = find_new_revisions(&pager, None, 3).unwrap();
        assert_eq!(revs.len(), 12);

        // Newest-first, no duplicates, no page-boundary gaps.
        let ids: Vec<&str> = revs.iter().map(|r| r.scmid.as_str()).collect();
        let expected: Vec<String> = (1..=12).rev().map(|i| format!("{i:040x}")).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn watermark_bounded_listing_returns_exactly_the_new_commits() {
        // 40 commits, watermark at 28: 12 new ones, within one window of
        // pages, so a single pass covers them all.
        let wm = cursor(28);
        let pager = FakePager::new(40, 5, Some(&wm));
        let revs = find_new_revisions(&pager, Some(&wm), 3).unwrap();

        let mut ids: Vec<String> = revs.iter().map(|r| r.scmid.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 12);
        assert!(revs.iter().all(|r| r.committed_on > wm.last_committed_date));
    }

    #[test]
    fn request_count_is_bounded_by_gallop_plus_scan() {
        let pager = FakePager::new(60, 5, None);
        // 12 pages of history: probes at 1, 4, 7, 10, 13 (short), scan 10..13.
        let revs = find_new_revisions(&pager, None, 3).unwrap();
        assert!(!revs.is_empty());
        let requests = pager.requests.borrow();
        // Gallop requests come first; the boundary is the first requested
        // short page (13), never an inferred one.
        assert_eq!(&requests[..5], &[1, 4, 7, 10, 13]);
        // Scan covers pages 10..=13 (13 comes back empty and stops it).
        assert_eq!(&requests[5..], &[10, 11, 12, 13]);
    }

    #[test]
    fn deep_listing_scans_from_one_window_before_the_boundary() {
        // 60 commits, 5 per page = 12 pages, window 3. First short probe is
        // page 13, so the scan starts at page 10 and covers pages 10..12:
        // the oldest 15 commits. Repeated passes (with the watermark
        // advancing) walk the rest of the history.
        let pager = FakePager::new(60, 5, None);
        let revs = find_new_revisions(&pager, None, 3).unwrap();
        assert_eq!(revs.len(), 15);
        // Oldest commits of the listing, still newest-first within the scan.
        assert_eq!(revs.first().unwrap().scmid, format!("{:040x}", 15));
        assert_eq!(revs.last().unwrap().scmid, format!("{:040x}", 1));
    }
}
