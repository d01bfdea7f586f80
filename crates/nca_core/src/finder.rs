use crate::schema::{
    escape_tsv, AppError, Batch, BatchId, Issue, IssueId, IssueKey, Title, TitleId, WorkflowStep,
};

/// An error found during a scan pass, tied to whichever entities it concerns.
/// Errors with no entity attached are top-level problems with a whole source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderError {
    pub location: String,
    pub error: AppError,
    pub batch: Option<BatchId>,
    pub title: Option<TitleId>,
    pub issue: Option<IssueId>,
}

impl FinderError {
    pub fn new(location: impl Into<String>, error: AppError) -> Self {
        FinderError {
            location: location.into(),
            error,
            batch: None,
            title: None,
            issue: None,
        }
    }

    pub fn with_batch(mut self, batch: BatchId) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn with_title(mut self, title: TitleId) -> Self {
        self.title = Some(title);
        self
    }

    pub fn with_issue(mut self, issue: IssueId) -> Self {
        self.issue = Some(issue);
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.batch.is_none() && self.title.is_none() && self.issue.is_none()
    }
}

/// The merged result of one scan pass.
///
/// Entities live in flat arenas and refer to each other by id; the id of an
/// entity is its position in the matching list and never changes once
/// assigned.
#[derive(Debug, Clone, Default)]
pub struct Finder {
    pub titles: Vec<Title>,
    pub issues: Vec<Issue>,
    pub batches: Vec<Batch>,
    pub errors: Vec<FinderError>,
}

impl Finder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_title(&mut self, title: Title) -> TitleId {
        let id = TitleId(self.titles.len() as u32);
        self.titles.push(title);
        id
    }

    pub fn add_batch(&mut self, batch: Batch) -> BatchId {
        let id = BatchId(self.batches.len() as u32);
        self.batches.push(batch);
        id
    }

    /// Stores the issue and links it into its title's and batch's issue lists.
    pub fn add_issue(&mut self, issue: Issue) -> IssueId {
        let id = IssueId(self.issues.len() as u32);
        if let Some(title) = issue.title.and_then(|t| self.titles.get_mut(t.index())) {
            title.issues.push(id);
        }
        if let Some(batch) = issue.batch.and_then(|b| self.batches.get_mut(b.index())) {
            batch.issues.push(id);
        }
        self.issues.push(issue);
        id
    }

    pub fn title(&self, id: TitleId) -> &Title {
        &self.titles[id.index()]
    }

    pub fn title_mut(&mut self, id: TitleId) -> &mut Title {
        &mut self.titles[id.index()]
    }

    pub fn issue(&self, id: IssueId) -> &Issue {
        &self.issues[id.index()]
    }

    pub fn issue_mut(&mut self, id: IssueId) -> &mut Issue {
        &mut self.issues[id.index()]
    }

    pub fn batch(&self, id: BatchId) -> &Batch {
        &self.batches[id.index()]
    }

    pub fn batch_mut(&mut self, id: BatchId) -> &mut Batch {
        &mut self.batches[id.index()]
    }

    pub fn issue_ids(&self) -> impl Iterator<Item = IssueId> + '_ {
        (0..self.issues.len() as u32).map(IssueId)
    }

    pub fn issue_title(&self, id: IssueId) -> Option<&Title> {
        self.issue(id).title.map(|t| self.title(t))
    }

    pub fn find_title_by_lccn(&self, lccn: &str) -> Option<TitleId> {
        self.titles
            .iter()
            .position(|t| t.lccn == lccn)
            .map(|idx| TitleId(idx as u32))
    }

    /// `None` when the issue has no title and therefore no key.
    pub fn issue_key(&self, id: IssueId) -> Option<IssueKey> {
        let issue = self.issue(id);
        self.issue_title(id)
            .map(|title| IssueKey::new(&title.lccn, issue.date, issue.edition))
    }

    pub fn issue_lccn(&self, id: IssueId) -> &str {
        self.issue_title(id).map(|t| t.lccn.as_str()).unwrap_or("")
    }

    /// Prefix used in per-issue error messages.
    pub fn issue_ident(&self, id: IssueId) -> String {
        self.issue(id).error_ident(self.issue_lccn(id))
    }

    /// Describes where in the pipeline an issue is, for duplicate messages.
    pub fn workflow_identification(&self, id: IssueId) -> String {
        let issue = self.issue(id);
        let key = self
            .issue_key(id)
            .map(|k| k.to_string())
            .unwrap_or_else(|| issue.location.clone());
        match (issue.workflow_step, issue.batch) {
            (WorkflowStep::InProduction, Some(batch)) => {
                format!("live issue {key} in batch {:?}", self.batch(batch).fullname())
            }
            (WorkflowStep::InProduction, None) => format!("live issue {key}"),
            (step, _) => format!("{step} issue {key}"),
        }
    }

    /// Tab-separated dump of an issue, used as a stable secondary sort key.
    pub fn issue_tsv(&self, id: IssueId) -> String {
        let issue = self.issue(id);
        let batch = issue
            .batch
            .map(|b| self.batch(b).escaped_tsv())
            .unwrap_or_else(|| "nil".to_string());
        let title = self
            .issue_title(id)
            .map(|t| escape_tsv(&t.tsv()))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "{batch}\t{title}\t{}\t{}\t{}",
            issue.location,
            issue.date_edition(),
            issue.file_names().join(",")
        )
    }

    pub fn add_issue_error(&mut self, id: IssueId, error: AppError) {
        self.issue_mut(id).errors.push(error);
    }

    pub fn push_error(&mut self, error: FinderError) {
        self.errors.push(error);
    }

    pub fn top_level_errors(&self) -> impl Iterator<Item = &FinderError> {
        self.errors.iter().filter(|e| e.is_top_level())
    }

    /// Collects child-error state onto titles after every source has run.
    /// Nothing is reconciled or removed.
    pub fn aggregate(&mut self) {
        let mut flagged = vec![false; self.titles.len()];
        for issue in &self.issues {
            let Some(title) = issue.title else { continue };
            if issue.errors.any_propagating() || issue.has_file_errors() {
                flagged[title.index()] = true;
            }
        }
        for err in &self.errors {
            if let (Some(title), Some(_)) = (err.title, err.issue) {
                if err.error.propagate {
                    flagged[title.index()] = true;
                }
            }
        }
        for (title, flag) in self.titles.iter_mut().zip(flagged) {
            title.has_child_errors = flag;
        }
    }
}
