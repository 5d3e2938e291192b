use crate::{
    error::{Result, SchedulerError},
    types::JobEntry,
};

/// Narrow view of the system-wide job table.
///
/// Mutations are staged in memory and only become visible to the dispatch
/// facility on [`JobTable::commit`]. [`JobTable::reload`] discards anything
/// staged and re-reads the live table.
pub trait JobTable {
    /// Re-read the live table, dropping uncommitted changes.
    fn reload(&mut self) -> Result<()>;

    /// Entries in table order, including untagged ones.
    fn entries(&self) -> Box<dyn Iterator<Item = &JobEntry> + '_>;

    fn insert(&mut self, tag: &str, expression: &str, command: &str);

    /// Stage removal of every entry tagged `tag`; returns how many matched.
    fn remove_by_tag(&mut self, tag: &str) -> usize;

    /// Write the staged table back in one batch.
    fn commit(&mut self) -> Result<()>;
}

/// In-memory job table with separate staged and committed state, for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryJobTable {
    staged: Vec<JobEntry>,
    committed: Vec<JobEntry>,
    commits: usize,
    /// Commits still allowed before they start failing; `None` is unlimited.
    commit_budget: Option<usize>,
    /// Tags whose removal is silently ignored on commit, simulating a
    /// facility that accepts the write but does not apply it.
    sticky_tags: Vec<String>,
}

impl MemoryJobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table as if these entries were already live.
    pub fn with_entries(entries: Vec<JobEntry>) -> Self {
        Self {
            staged: entries.clone(),
            committed: entries,
            ..Self::default()
        }
    }

    /// What the dispatch facility currently sees.
    pub fn committed(&self) -> &[JobEntry] {
        &self.committed
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Make every following commit fail with `JobTableUnavailable`.
    pub fn fail_commits(&mut self, fail: bool) {
        self.commit_budget = fail.then_some(0);
    }

    /// Let `n` more commits succeed, then fail every one after that.
    pub fn fail_commits_after(&mut self, n: usize) {
        self.commit_budget = Some(n);
    }

    pub fn keep_on_commit(&mut self, tag: &str) {
        self.sticky_tags.push(tag.to_string());
    }
}

impl JobTable for MemoryJobTable {
    fn reload(&mut self) -> Result<()> {
        self.staged = self.committed.clone();
        Ok(())
    }

    fn entries(&self) -> Box<dyn Iterator<Item = &JobEntry> + '_> {
        Box::new(self.staged.iter())
    }

    fn insert(&mut self, tag: &str, expression: &str, command: &str) {
        self.staged.push(JobEntry {
            tag: Some(tag.to_string()),
            expression: expression.to_string(),
            command: command.to_string(),
        });
    }

    fn remove_by_tag(&mut self, tag: &str) -> usize {
        let before = self.staged.len();
        self.staged.retain(|e| !e.is_tagged(tag));
        before - self.staged.len()
    }

    fn commit(&mut self) -> Result<()> {
        match self.commit_budget {
            Some(0) => {
                return Err(SchedulerError::JobTableUnavailable(
                    "memory table: commit refused".to_string(),
                ))
            }
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        let mut next = self.staged.clone();
        for tag in &self.sticky_tags {
            for entry in self.committed.iter().filter(|e| e.is_tagged(tag)) {
                if !next.contains(entry) {
                    next.push(entry.clone());
                }
            }
        }
        self.committed = next;
        self.commits += 1;
        Ok(())
    }
}
