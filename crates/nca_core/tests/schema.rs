use chrono::NaiveDate;
use nca_core::schema::{is_valid_edition, IssueKey, SearchKeyError};
use nca_core::{
    AppError, Batch, BatchName, BatchNameError, ErrorList, Finder, Issue, SearchKey, Title,
    WorkflowStep,
};
use pretty_assertions::assert_eq;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn batch_name_parses_simple_keyword() {
    let name = BatchName::parse("batch_oru_fluffythedog_ver02").unwrap();
    assert_eq!(
        name,
        BatchName {
            marc_org_code: "oru".into(),
            keyword: "fluffythedog".into(),
            version: 2,
        }
    );
    assert_eq!(name.fullname(), "batch_oru_fluffythedog_ver02");
}

#[test]
fn batch_name_keyword_may_contain_underscores() {
    let name = BatchName::parse("batch_oru_courage_3_ver01").unwrap();
    assert_eq!(name.marc_org_code, "oru");
    assert_eq!(name.keyword, "courage_3");
    assert_eq!(name.version, 1);
    assert_eq!(name.to_string(), "batch_oru_courage_3_ver01");
}

#[test]
fn batch_name_round_trips_for_well_formed_names() {
    for input in [
        "batch_oru_a_ver01",
        "batch_hoover_MarbleYetiEatingKelp_ver99",
        "batch_dlc_one_two_three_ver10",
    ] {
        assert_eq!(BatchName::parse(input).unwrap().fullname(), input);
    }
}

#[test]
fn batch_name_rejects_malformed_input() {
    assert!(matches!(
        BatchName::parse("batch_oru_ver01"),
        Err(BatchNameError::TooFewParts(_))
    ));
    assert!(matches!(
        BatchName::parse("notbatch_oru_kw_ver01"),
        Err(BatchNameError::MissingPrefix(_))
    ));
    for bad in [
        "batch_oru_kw_ver00",
        "batch_oru_kw_ver1",
        "batch_oru_kw_ver001",
        "batch_oru_kw_vr01",
        "batch_oru_kw_verab",
    ] {
        assert!(
            matches!(BatchName::parse(bad), Err(BatchNameError::InvalidVersion(_))),
            "{bad}"
        );
    }
}

#[test]
fn search_key_parses_year_month_day() {
    let key = SearchKey::parse("sn12345678/20060214").unwrap();
    assert_eq!(
        key,
        SearchKey {
            lccn: "sn12345678".into(),
            year: 2006,
            month: 2,
            day: 14,
            ed: 0,
        }
    );
    assert_eq!(key.to_string(), "sn12345678/20060214");
}

#[test]
fn search_key_omits_missing_parts() {
    let key = SearchKey::parse("sn12345678/200602").unwrap();
    assert_eq!((key.year, key.month, key.day, key.ed), (2006, 2, 0, 0));
    assert_eq!(key.to_string(), "sn12345678/200602");

    let bare = SearchKey::parse("sn12345678").unwrap();
    assert_eq!(bare.to_string(), "sn12345678");
    assert_eq!(bare.year, 0);

    let full = SearchKey::parse("sn12345678/2006021402").unwrap();
    assert_eq!(full.ed, 2);
}

#[test]
fn search_key_rejects_bad_digits_and_dates() {
    assert_eq!(SearchKey::parse("sn1/200"), Err(SearchKeyError::DigitCount));
    assert_eq!(SearchKey::parse("sn1/20060"), Err(SearchKeyError::DigitCount));
    assert_eq!(
        SearchKey::parse("sn1/200602140101"),
        Err(SearchKeyError::DigitCount)
    );
    assert_eq!(SearchKey::parse("sn1/20060231"), Err(SearchKeyError::InvalidDate));
    assert_eq!(SearchKey::parse("sn1/200613"), Err(SearchKeyError::InvalidDate));
    assert_eq!(SearchKey::parse("sn1/2006/02"), Err(SearchKeyError::Format));
    assert_eq!(SearchKey::parse(""), Err(SearchKeyError::Format));
}

#[test]
fn issue_key_and_tsv_describe_the_issue() {
    let mut finder = Finder::new();
    let mut title = Title::new("sn12345678", "The\tWeekly", "/uploads/sn12345678");
    title.place_of_publication = "Eugene, OR".into();
    let title = finder.add_title(title);
    let batch = finder.add_batch(Batch::from_name(
        BatchName::parse("batch_oru_kelp_ver01").unwrap(),
        "https://example.org/batches/batch_oru_kelp_ver01.json",
    ));

    let mut issue = Issue::new(date(2001, 2, 3), 1, "/uploads/sn12345678/2001-02-03", WorkflowStep::SftpUpload);
    issue.title = Some(title);
    issue.batch = Some(batch);
    issue.files.push(nca_core::File::new("/uploads/sn12345678/2001-02-03/0001.pdf"));
    issue.files.push(nca_core::File::new("/uploads/sn12345678/2001-02-03/0002.pdf"));
    let id = finder.add_issue(issue);

    assert_eq!(
        finder.issue_key(id),
        Some(IssueKey::new("sn12345678", date(2001, 2, 3), 1))
    );
    assert_eq!(finder.issue_key(id).unwrap().as_str(), "sn12345678/2001020301");
    assert_eq!(finder.issue(id).raw_date(), "2001-02-03");
    assert_eq!(finder.title(title).issues, vec![id]);
    assert_eq!(finder.batch(batch).issues, vec![id]);

    let tsv = finder.issue_tsv(id);
    let fields: Vec<&str> = tsv.split('\t').collect();
    assert_eq!(
        fields,
        vec![
            "https://example.org/batches/batch_oru_kelp_ver01.json\\tbatch_oru_kelp_ver01\\t000001 issues",
            "/uploads/sn12345678\\tsn12345678\\tThe\\tWeekly\\tEugene, OR\\t000001",
            "/uploads/sn12345678/2001-02-03",
            "2001020301",
            "0001.pdf,0002.pdf",
        ]
    );
}

#[test]
fn error_list_splits_major_and_minor() {
    let mut list = ErrorList::new();
    list.push(AppError::new("broken"));
    list.push(AppError::new("iffy").as_warning());
    list.push(AppError::too_new("SftpUpload issue sn1/2001-02-03", 24));

    assert_eq!(list.major().len(), 2);
    assert_eq!(list.minor().len(), 1);
    assert_eq!(list.minor().iter().next().unwrap().error, "iffy");
}

#[test]
fn issue_errors_carry_the_issue_identity() {
    let issue = Issue::new(date(2001, 2, 3), 1, "/up/sn1/2001-02-03", WorkflowStep::SftpUpload);
    let ident = issue.error_ident("sn1");
    assert_eq!(ident, "SftpUpload issue sn1/2001-02-03");

    let err = AppError::no_files(&ident);
    assert_eq!(err.to_string(), "no files");
    assert_eq!(err.message, "SftpUpload issue sn1/2001-02-03 has no files");
    assert!(err.propagate);

    let too_new = AppError::too_new(&ident, 2);
    assert!(!too_new.propagate);
}

#[test]
fn editions_run_from_one_to_three() {
    assert!(!is_valid_edition(0));
    assert!(is_valid_edition(1));
    assert!(is_valid_edition(3));
    assert!(!is_valid_edition(4));
    assert!(!is_valid_edition(100));
}
