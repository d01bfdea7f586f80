use chrono::NaiveDate;
use nca_core::{
    check_duplicates, ErrorKind, Finder, Issue, IssueId, Lookup, LookupError, SearchKey, Title,
    TitleId, WorkflowStep,
};
use pretty_assertions::assert_eq;

fn add_issue(
    finder: &mut Finder,
    title: TitleId,
    (y, m, d): (i32, u32, u32),
    edition: u32,
    location: &str,
    step: WorkflowStep,
) -> IssueId {
    let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let mut issue = Issue::new(date, edition, location, step);
    issue.title = Some(title);
    finder.add_issue(issue)
}

fn sample_finder() -> (Finder, Vec<IssueId>) {
    let mut finder = Finder::new();
    let t1 = finder.add_title(Title::new("sn12345678", "Weekly Clarion", "/up/clarion"));
    let t2 = finder.add_title(Title::new("sn87654321", "Daily Bugle", "/up/bugle"));
    let ids = vec![
        add_issue(&mut finder, t1, (2001, 2, 3), 1, "/up/clarion/2001-02-03", WorkflowStep::SftpUpload),
        add_issue(&mut finder, t1, (2001, 2, 3), 2, "/up/clarion/2001-02-03_02", WorkflowStep::SftpUpload),
        add_issue(&mut finder, t1, (2001, 2, 10), 1, "/up/clarion/2001-02-10", WorkflowStep::SftpUpload),
        add_issue(&mut finder, t1, (2001, 5, 1), 1, "/up/clarion/2001-05-01", WorkflowStep::ScanUpload),
        add_issue(&mut finder, t1, (1999, 12, 31), 1, "/up/clarion/1999-12-31", WorkflowStep::ScanUpload),
        add_issue(&mut finder, t2, (2001, 2, 3), 1, "/up/bugle/2001-02-03", WorkflowStep::SftpUpload),
    ];
    (finder, ids)
}

fn lookup(lookup: &Lookup, key: &str) -> Vec<IssueId> {
    lookup.issues(&SearchKey::parse(key).unwrap()).to_vec()
}

#[test]
fn every_issue_is_found_by_its_own_key() {
    let (finder, ids) = sample_finder();
    let index = Lookup::build(&finder).unwrap();
    for id in ids {
        let key = finder.issue_key(id).unwrap();
        let found = lookup(&index, key.as_str());
        assert!(found.contains(&id), "{key}");
    }
}

#[test]
fn every_prefix_of_a_key_includes_the_issue() {
    let (finder, ids) = sample_finder();
    let index = Lookup::build(&finder).unwrap();
    for id in ids {
        let key = finder.issue_key(id).unwrap().to_string();
        for len in [key.len(), key.len() - 2, key.len() - 4, key.len() - 6, key.len() - 11] {
            let prefix = &key[..len];
            assert!(lookup(&index, prefix).contains(&id), "{prefix}");
        }
    }
}

#[test]
fn partial_keys_select_the_right_granularity() {
    let (finder, ids) = sample_finder();
    let index = Lookup::build(&finder).unwrap();

    assert_eq!(lookup(&index, "sn12345678/2001020301"), vec![ids[0]]);
    assert_eq!(lookup(&index, "sn12345678/20010203"), vec![ids[0], ids[1]]);
    assert_eq!(lookup(&index, "sn12345678/200102"), vec![ids[0], ids[1], ids[2]]);
    assert_eq!(
        lookup(&index, "sn12345678/2001"),
        vec![ids[0], ids[1], ids[2], ids[3]]
    );
    assert_eq!(
        lookup(&index, "sn12345678"),
        vec![ids[4], ids[0], ids[1], ids[2], ids[3]]
    );
    assert_eq!(lookup(&index, "sn87654321"), vec![ids[5]]);
    assert!(lookup(&index, "sn00000000").is_empty());
    assert!(lookup(&index, "sn12345678/1850").is_empty());
}

#[test]
fn same_key_results_are_ordered_by_tsv() {
    let mut finder = Finder::new();
    let title = finder.add_title(Title::new("sn1", "Clarion", "/up/sn1"));
    let later = add_issue(&mut finder, title, (2001, 2, 3), 1, "/zzz/2001-02-03", WorkflowStep::SftpUpload);
    let earlier = add_issue(&mut finder, title, (2001, 2, 3), 1, "/aaa/2001-02-03", WorkflowStep::ScanUpload);

    let index = Lookup::build(&finder).unwrap();
    let first = lookup(&index, "sn1/2001020301");
    let second = lookup(&index, "sn1/2001020301");
    assert_eq!(first, vec![earlier, later]);
    assert_eq!(first, second);
}

#[test]
fn issues_without_a_title_cannot_be_indexed() {
    let mut finder = Finder::new();
    let date = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
    finder.add_issue(Issue::new(date, 1, "/up/orphan", WorkflowStep::SftpUpload));

    assert_eq!(
        Lookup::build(&finder).unwrap_err(),
        LookupError::MissingTitle {
            location: "/up/orphan".into(),
            database_id: 0,
        }
    );
}

#[test]
fn lower_ranked_duplicate_is_flagged_against_the_canonical_issue() {
    let mut finder = Finder::new();
    let title = finder.add_title(Title::new("sn1", "Clarion", "/up/sn1"));
    let a = add_issue(&mut finder, title, (2001, 2, 3), 1, "/up/sn1/2001-02-03", WorkflowStep::SftpUpload);
    let b = add_issue(&mut finder, title, (2001, 2, 3), 1, "/workflow/oru-sn1-2001020301-7", WorkflowStep::AwaitingMetadataReview);
    finder.issue_mut(b).database_id = 7;

    let index = Lookup::build(&finder).unwrap();
    assert_eq!(check_duplicates(&mut finder, &index), 1);

    let a_errors: Vec<_> = finder.issue(a).errors.iter().collect();
    assert_eq!(a_errors.len(), 1);
    let dupe = a_errors[0].duplicate_of().unwrap();
    assert_eq!(dupe.database_id, 7);
    assert_eq!(dupe.location, "/workflow/oru-sn1-2001020301-7");
    assert_eq!(dupe.name, "Clarion, 2001-02-03");
    assert!(!dupe.is_live);
    assert!(a_errors[0].warning);

    assert!(finder.issue(b).errors.is_empty());
    assert!(finder.title(title).has_child_errors);
}

#[test]
fn equal_rank_collisions_are_not_flagged() {
    let mut finder = Finder::new();
    let title = finder.add_title(Title::new("sn1", "Clarion", "/up/sn1"));
    let a = add_issue(&mut finder, title, (2001, 2, 3), 1, "/sftp/sn1/2001-02-03", WorkflowStep::SftpUpload);
    let b = add_issue(&mut finder, title, (2001, 2, 3), 1, "/scan/oru/sn1/2001-02-03", WorkflowStep::ScanUpload);

    let index = Lookup::build(&finder).unwrap();
    assert_eq!(check_duplicates(&mut finder, &index), 0);
    assert!(finder.issue(a).errors.is_empty());
    assert!(finder.issue(b).errors.is_empty());
    assert!(!finder.title(title).has_child_errors);
}

#[test]
fn a_live_issue_wins_over_everything_and_is_reported_as_live() {
    let mut finder = Finder::new();
    let title = finder.add_title(Title::new("sn1", "Clarion", "https://example.org/lccn/sn1.json"));
    let upload = add_issue(&mut finder, title, (2001, 2, 3), 1, "/up/sn1/2001-02-03", WorkflowStep::SftpUpload);
    let ready = add_issue(&mut finder, title, (2001, 2, 3), 1, "/workflow/x", WorkflowStep::ReadyForBatching);
    let live = add_issue(&mut finder, title, (2001, 2, 3), 1, "https://example.org/lccn/sn1/issues/2001-02-03/ed-1.json", WorkflowStep::InProduction);

    let index = Lookup::build(&finder).unwrap();
    assert_eq!(check_duplicates(&mut finder, &index), 2);

    for id in [upload, ready] {
        let errors: Vec<_> = finder.issue(id).errors.iter().collect();
        assert_eq!(errors.len(), 1);
        let dupe = errors[0].duplicate_of().unwrap();
        assert!(dupe.is_live);
        assert!(matches!(errors[0].kind, ErrorKind::Duplicate(_)));
    }
    assert!(finder.issue(live).errors.is_empty());
}

#[test]
fn different_editions_are_not_duplicates() {
    let (mut finder, ids) = sample_finder();
    let index = Lookup::build(&finder).unwrap();
    assert_eq!(check_duplicates(&mut finder, &index), 0);
    for id in ids {
        assert!(finder.issue(id).errors.is_empty());
    }
}
