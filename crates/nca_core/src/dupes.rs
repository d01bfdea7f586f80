use crate::finder::Finder;
use crate::lookup::Lookup;
use crate::schema::{AppError, DuplicateOf, IssueId, WorkflowStep};

/// Flags every issue that shares its full key with a higher-ranked issue.
///
/// Each flagged issue gets exactly one duplicate error, pointing at the
/// highest-ranked issue with its key (the first one found on ties). Issues of
/// equal rank are left alone. Returns the number of issues flagged.
pub fn check_duplicates(finder: &mut Finder, lookup: &Lookup) -> usize {
    let mut flagged: Vec<(IssueId, IssueId)> = Vec::new();

    for id in finder.issue_ids() {
        let Some(key) = finder.issue_key(id) else {
            continue;
        };
        let rank = finder.issue(id).workflow_step.rank();

        let mut canonical: Option<(IssueId, u32)> = None;
        for &other in lookup.issues_for_key(&key) {
            if other == id {
                continue;
            }
            let other_rank = finder.issue(other).workflow_step.rank();
            if canonical.map_or(true, |(_, best)| other_rank > best) {
                canonical = Some((other, other_rank));
            }
        }

        if let Some((other, other_rank)) = canonical {
            if rank < other_rank {
                flagged.push((id, other));
            }
        }
    }

    for &(id, canonical) in &flagged {
        let error = duplicate_error(finder, id, canonical);
        finder.add_issue_error(id, error);
    }
    finder.aggregate();

    flagged.len()
}

fn duplicate_error(finder: &Finder, id: IssueId, canonical: IssueId) -> AppError {
    let other = finder.issue(canonical);
    let title_name = finder
        .issue_title(canonical)
        .map(|t| t.name.as_str())
        .unwrap_or("");
    let dupe = DuplicateOf {
        database_id: other.database_id,
        location: other.location.clone(),
        name: format!("{title_name}, {}", other.raw_date()),
        is_live: other.workflow_step == WorkflowStep::InProduction,
    };
    AppError::duplicate(
        &finder.issue_ident(id),
        &finder.workflow_identification(canonical),
        dupe,
    )
}
