use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// A batchable issue: its workflow id, page count, and how long it has been
/// allowed to go live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedIssue {
    pub id: i64,
    pub key: String,
    pub pages: u32,
    /// Days since the issue could first be published, embargo included.
    pub days_stale: i64,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Issues of one MARC org code waiting to be batched. Appending the same
/// issue twice is a no-op.
#[derive(Debug, Clone)]
pub struct IssueQueue {
    list: Vec<QueuedIssue>,
    seen: HashSet<i64>,
    pages: u32,
    sorted: bool,
    long_wait: bool,
    long_wait_days: i64,
}

impl IssueQueue {
    pub fn new(long_wait_days: i64) -> Self {
        IssueQueue {
            list: Vec::new(),
            seen: HashSet::new(),
            pages: 0,
            sorted: true,
            long_wait: false,
            long_wait_days,
        }
    }

    pub fn append(&mut self, issue: QueuedIssue) {
        if !self.seen.insert(issue.id) {
            return;
        }
        self.pages += issue.pages;
        self.sorted = false;
        if issue.days_stale > self.long_wait_days {
            self.long_wait = true;
        }
        self.list.push(issue);
    }

    fn empty_list(&mut self) {
        self.list.clear();
        self.seen.clear();
        self.pages = 0;
        self.sorted = true;
        self.long_wait = false;
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// True when any queued issue has waited longer than the long-wait
    /// threshold; such a queue may be batched below the minimum size.
    pub fn long_wait(&self) -> bool {
        self.long_wait
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn issues(&self) -> &[QueuedIssue] {
        &self.list
    }

    pub fn into_issues(self) -> Vec<QueuedIssue> {
        self.list
    }

    fn sort_by_approval(&mut self) {
        if !self.sorted {
            // None sorts first: no approval date means it has waited forever.
            self.list.sort_by_key(|issue| issue.approved_at);
            self.sorted = true;
        }
    }

    /// Moves up to `max_pages` worth of issues, oldest approval first, into a
    /// new queue and keeps the rest.
    ///
    /// The candidate list is walked three times. Because the popped total
    /// only grows, an issue refused on one pass is refused on every later
    /// pass too, so the result equals a single first-fit walk.
    pub fn split_queue(&mut self, max_pages: u32) -> IssueQueue {
        self.sort_by_approval();
        let candidates = std::mem::take(&mut self.list);
        self.empty_list();

        let mut popped = IssueQueue::new(self.long_wait_days);
        for _ in 0..3 {
            for issue in &candidates {
                if popped.seen.contains(&issue.id) {
                    continue;
                }
                if popped.pages + issue.pages <= max_pages {
                    popped.append(issue.clone());
                }
            }
        }

        for issue in candidates {
            if !popped.seen.contains(&issue.id) {
                self.append(issue);
            }
        }
        self.sort_by_approval();
        popped.sorted = true;

        popped
    }

    /// Puts previously popped issues back, restoring approval order.
    pub fn restore(&mut self, popped: IssueQueue) {
        for issue in popped.list {
            self.append(issue);
        }
        self.sort_by_approval();
    }
}
