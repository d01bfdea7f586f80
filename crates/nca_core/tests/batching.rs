use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use nca_core::batching::{find_ready_issues, IssueQueue, PackedBatch};
use nca_core::workflow::IssueRecord;
use nca_core::{random_batch_name, BatchBuilder, PackingLimits, QueuedIssue, ReadyIssue, WorkflowStep};
use pretty_assertions::assert_eq;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn queued(id: i64, pages: u32, days_stale: i64) -> QueuedIssue {
    QueuedIssue {
        id,
        key: format!("sn1/20010101{id:02}"),
        pages,
        days_stale,
        approved_at: Some(base_time() + Duration::hours(id)),
    }
}

fn ready(moc: &str, issue: QueuedIssue) -> ReadyIssue {
    ReadyIssue {
        marc_org_code: moc.to_string(),
        issue,
    }
}

fn limits(min_pages: u32, max_pages: u32) -> PackingLimits {
    PackingLimits {
        min_pages,
        max_pages,
        ..PackingLimits::default()
    }
}

fn pages_of(batch: &PackedBatch) -> Vec<u32> {
    batch.issues.iter().map(|i| i.pages).collect()
}

#[test]
fn split_queue_fills_in_approval_order() {
    let mut queue = IssueQueue::new(30);
    for issue in [queued(1, 200, 0), queued(2, 300, 0), queued(3, 450, 0), queued(4, 60, 0)] {
        queue.append(issue);
    }

    let popped = queue.split_queue(500);
    let popped_pages: Vec<u32> = popped.issues().iter().map(|i| i.pages).collect();
    assert_eq!(popped_pages, vec![200, 300]);
    assert_eq!(popped.pages(), 500);

    let left: Vec<u32> = queue.issues().iter().map(|i| i.pages).collect();
    assert_eq!(left, vec![450, 60]);
    assert_eq!(queue.pages(), 510);
}

#[test]
fn split_queue_lets_small_issues_fill_gaps() {
    let mut queue = IssueQueue::new(30);
    for issue in [queued(1, 300, 0), queued(2, 450, 0), queued(3, 150, 0), queued(4, 40, 0)] {
        queue.append(issue);
    }

    let popped = queue.split_queue(500);
    let popped_pages: Vec<u32> = popped.issues().iter().map(|i| i.pages).collect();
    assert_eq!(popped_pages, vec![300, 150, 40]);
    assert_eq!(queue.issues().len(), 1);
}

#[test]
fn appending_the_same_issue_twice_is_ignored() {
    let mut queue = IssueQueue::new(30);
    queue.append(queued(1, 100, 0));
    queue.append(queued(1, 100, 0));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.pages(), 100);
}

#[test]
fn packing_example_emits_full_batch_then_the_remainder() {
    let mut builder = BatchBuilder::new(limits(100, 500));
    for issue in [queued(1, 200, 0), queued(2, 300, 0), queued(3, 450, 0), queued(4, 60, 0)] {
        builder.push(ready("oru", issue));
    }

    let first = builder.next_batch().unwrap();
    assert_eq!(pages_of(&first), vec![200, 300]);
    assert_eq!(first.pages, 500);

    let second = builder.next_batch().unwrap();
    assert_eq!(pages_of(&second), vec![450]);

    // 60 pages is under the minimum and nothing is stale.
    assert_eq!(builder.next_batch(), None);
    assert_eq!(builder.queued_pages("oru"), 60);
}

#[test]
fn every_emitted_batch_respects_the_page_limit() {
    let mut builder = BatchBuilder::new(limits(1, 1000));
    let sizes = [120, 880, 33, 999, 500, 501, 250, 250, 250, 250, 17, 640];
    for (idx, pages) in sizes.into_iter().enumerate() {
        builder.push(ready("oru", queued(idx as i64 + 1, pages, 0)));
    }

    let mut seen = HashSet::new();
    while let Some(batch) = builder.next_batch() {
        assert!(batch.pages <= 1000, "{batch:?}");
        assert_eq!(batch.pages, batch.issues.iter().map(|i| i.pages).sum::<u32>());
        for issue in &batch.issues {
            assert!(seen.insert(issue.id), "issue {} batched twice", issue.id);
        }
    }
    assert_eq!(seen.len(), sizes.len());
}

#[test]
fn a_bucket_that_fits_is_batched_whole() {
    let mut builder = BatchBuilder::new(limits(100, 10_000));
    for id in 1..=20 {
        builder.push(ready("hoover", queued(id, 40, 0)));
    }

    let batch = builder.next_batch().unwrap();
    assert_eq!(batch.issues.len(), 20);
    assert_eq!(batch.pages, 800);
    assert_eq!(builder.next_batch(), None);
}

#[test]
fn long_waiting_queues_ignore_the_minimum() {
    let mut fresh = BatchBuilder::new(limits(1000, 5000));
    fresh.push(ready("oru", queued(1, 50, 10)));
    assert_eq!(fresh.next_batch(), None);

    let mut stale = BatchBuilder::new(limits(1000, 5000));
    stale.push(ready("oru", queued(1, 50, 10)));
    stale.push(ready("oru", queued(2, 70, 31)));
    let batch = stale.next_batch().unwrap();
    assert_eq!(batch.pages, 120);
}

#[test]
fn mocs_take_turns() {
    let mut builder = BatchBuilder::new(limits(100, 200));
    for id in 1..=4 {
        builder.push(ready("aaa", queued(id, 150, 0)));
    }
    for id in 11..=12 {
        builder.push(ready("bbb", queued(id, 150, 0)));
    }

    let order: Vec<String> = std::iter::from_fn(|| builder.next_batch())
        .map(|b| b.marc_org_code)
        .collect();
    assert_eq!(order, vec!["aaa", "bbb", "aaa", "bbb", "aaa", "aaa"]);
}

#[test]
fn oversized_issues_never_block_other_work() {
    let mut builder = BatchBuilder::new(limits(10, 100));
    builder.push(ready("oru", queued(1, 500, 99)));
    builder.push(ready("oru", queued(2, 20, 0)));

    let batch = builder.next_batch().unwrap();
    assert_eq!(pages_of(&batch), vec![20]);
    assert_eq!(builder.next_batch(), None);
}

fn workflow_record(id: i64, lccn: &str, date: &str, step: WorkflowStep) -> IssueRecord {
    IssueRecord {
        id,
        marc_org_code: "oru".into(),
        lccn: lccn.into(),
        date: date.into(),
        edition: 1,
        page_count: 12,
        workflow_step: step,
        metadata_approved_at: Some(base_time()),
        ..IssueRecord::default()
    }
}

#[test]
fn ready_issues_exclude_batched_invalid_unknown_and_embargoed() {
    let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
    let mut batched = workflow_record(2, "sn1", "2023-12-01", WorkflowStep::ReadyForBatching);
    batched.batch_id = 5;
    let records = vec![
        workflow_record(1, "sn1", "2023-12-01", WorkflowStep::ReadyForBatching),
        batched,
        workflow_record(3, "sn1", "2023-13-01", WorkflowStep::ReadyForBatching),
        workflow_record(4, "unknown", "2023-12-01", WorkflowStep::ReadyForBatching),
        workflow_record(5, "embargoed", "2024-01-10", WorkflowStep::ReadyForBatching),
        workflow_record(6, "embargoed", "2023-10-01", WorkflowStep::ReadyForBatching),
        workflow_record(7, "sn1", "2023-12-01", WorkflowStep::AwaitingMetadataReview),
    ];
    let limits = PackingLimits {
        embargo_days: 60,
        ..PackingLimits::default()
    };
    let embargoed = |lccn: &str| match lccn {
        "sn1" => Some(false),
        "embargoed" => Some(true),
        _ => None,
    };

    let found = find_ready_issues(&records, WorkflowStep::ReadyForBatching, embargoed, &limits, now);
    let ids: Vec<i64> = found.iter().map(|r| r.issue.id).collect();
    assert_eq!(ids, vec![1, 6]);

    assert_eq!(found[0].issue.days_stale, 61);
    assert_eq!(found[1].issue.days_stale, 122 - 60);
    assert_eq!(found[0].issue.pages, 12);
    assert_eq!(found[0].issue.key, "sn1/2023120101");
    assert_eq!(found[0].marc_org_code, "oru");
}

#[test]
fn batch_names_are_deterministic_and_unique_within_a_group() {
    assert_eq!(random_batch_name(5073), random_batch_name(5073));

    for group in 0..50 {
        let names: HashSet<String> = (group * 20..group * 20 + 20).map(random_batch_name).collect();
        assert_eq!(names.len(), 20, "group {group}");
    }
}
