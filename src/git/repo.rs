use crate::error::{Result, TallyError};
use crate::model::{ActivityUnit, DateRange};
use chrono::DateTime;
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use similar::{ChangeTag, TextDiff};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// A local clone used as a source of commit units. Commits are attributed to
/// their author name; pull-request events only exist in event files.
pub struct RepoSource {
    repo: Repository,
    path: PathBuf,
    name: String,
}

impl RepoSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = discover(path.as_ref())?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { repo, path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Walk history from HEAD and emit one commit unit per in-range commit,
    /// with addition/deletion totals from the first-parent diff.
    pub fn collect_commit_units(
        &self,
        range: &DateRange,
        include_merges: bool,
        progress: bool,
    ) -> Result<Vec<ActivityUnit>> {
        let mut head = self.repo.head()?;
        let head_commit = head.peel_to_commit_in_place()?;

        let mut units = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        let pb = if progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!("Scanning {}...", self.name));
            pb
        } else {
            ProgressBar::hidden()
        };

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let secs = commit.time()?.seconds;
            let timestamp = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| TallyError::InvalidDate(format!("Invalid timestamp: {secs}")))?;

            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();

            if !range.contains(&timestamp) {
                for pid in parents {
                    stack.push_back(pid);
                }
                continue;
            }

            if !include_merges && parents.len() > 1 {
                for pid in parents {
                    stack.push_back(pid);
                }
                pb.inc(1);
                continue;
            }

            let author = commit.author()?;
            let (additions, deletions) = self.diff_totals(commit_id, parents.first().copied())?;

            units.push(ActivityUnit::Commit {
                username: author.name.to_string(),
                repo: self.name.clone(),
                timestamp: secs,
                additions: additions as i64,
                deletions: deletions as i64,
                commit_id: Some(commit_id.to_string()),
            });

            for pid in parents {
                stack.push_back(pid);
            }

            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(units)
    }

    /// Total added/deleted lines of a commit against its first parent (or
    /// against the empty tree for a root commit). Binary blobs count zero.
    fn diff_totals(&self, commit_id: ObjectId, parent_id: Option<ObjectId>) -> Result<(u64, u64)> {
        let commit_tree = self.repo.find_commit(commit_id)?.tree()?;
        let parent_tree = match parent_id {
            Some(pid) => Some(self.repo.find_commit(pid)?.tree()?),
            None => None,
        };

        let changes: Vec<ChangeDetached> =
            self.repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)?;

        let mut additions = 0u64;
        let mut deletions = 0u64;

        for change in changes {
            match change {
                ChangeDetached::Addition { id, .. } => {
                    if let Ok(obj) = self.repo.find_object(id) {
                        if !is_binary_object(&obj) {
                            additions += count_lines(&obj);
                        }
                    }
                }
                ChangeDetached::Deletion { id, .. } => {
                    if let Ok(obj) = self.repo.find_object(id) {
                        if !is_binary_object(&obj) {
                            deletions += count_lines(&obj);
                        }
                    }
                }
                ChangeDetached::Modification {
                    previous_id, id, ..
                } => {
                    if let (Ok(old_obj), Ok(new_obj)) =
                        (self.repo.find_object(previous_id), self.repo.find_object(id))
                    {
                        if !is_binary_object(&old_obj) && !is_binary_object(&new_obj) {
                            let (added, deleted) = count_line_diff(&old_obj, &new_obj);
                            additions += added;
                            deletions += deleted;
                        }
                    }
                }
                ChangeDetached::Rewrite {
                    source_id, id, copy, ..
                } => {
                    if let (Ok(old_obj), Ok(new_obj)) =
                        (self.repo.find_object(source_id), self.repo.find_object(id))
                    {
                        if !is_binary_object(&old_obj) && !is_binary_object(&new_obj) {
                            let (added, deleted) = count_line_diff(&old_obj, &new_obj);
                            additions += added;
                            // A copy leaves the source in place.
                            if !copy {
                                deletions += deleted;
                            }
                        }
                    }
                }
            }
        }

        Ok((additions, deletions))
    }
}

fn is_binary_object(object: &gix::Object) -> bool {
    object.data.as_slice().iter().take(8192).any(|&b| b == 0)
}

fn count_lines(object: &gix::Object) -> u64 {
    std::str::from_utf8(object.data.as_slice())
        .map(|t| t.lines().count() as u64)
        .unwrap_or(0)
}

fn count_line_diff(old_object: &gix::Object, new_object: &gix::Object) -> (u64, u64) {
    let old_text = std::str::from_utf8(old_object.data.as_slice()).unwrap_or("");
    let new_text = std::str::from_utf8(new_object.data.as_slice()).unwrap_or("");

    let diff = TextDiff::from_lines(old_text, new_text);
    let mut added = 0u64;
    let mut deleted = 0u64;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => deleted += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, deleted)
}
