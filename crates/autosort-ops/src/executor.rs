//! Rule executor: evaluates rules against one file and runs the actions of
//! the ones that match.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use autosort_core::{FileDescriptor, OrganizeConfig};
use autosort_rules::{ActionKind, Rule};

use crate::action::ActionExt;
use crate::undo::UndoManager;

/// Everything one [`RuleExecutor::execute`] call did, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// The file as it was handed in.
    pub file: PathBuf,
    /// First rule that matched.
    pub matched_rule: Option<String>,
    /// Every rule that matched, in evaluation order.
    pub matched_rules: Vec<String>,
    /// Where the file ended up after relocating actions.
    pub final_destination: Option<PathBuf>,
    /// Every path a move, copy or rename produced, in order.
    pub destinations: Vec<PathBuf>,
    /// At least one rule matched.
    pub claimed: bool,
    /// A delete action removed the file.
    pub deleted: bool,
    /// Undo entry IDs recorded while executing.
    pub recorded: Vec<u64>,
    /// One line per rule decision and action outcome.
    pub log: Vec<String>,
}

impl ExecutionReport {
    fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            matched_rule: None,
            matched_rules: Vec::new(),
            final_destination: None,
            destinations: Vec::new(),
            claimed: false,
            deleted: false,
            recorded: Vec::new(),
            log: Vec::new(),
        }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Check if any logged action failed or was skipped.
    pub fn has_failures(&self) -> bool {
        self.log.iter().any(|line| {
            let line = line.strip_prefix("preview: ").unwrap_or(line);
            line.starts_with("error: ") || line.starts_with("skipped: ")
        })
    }
}

/// Runs rule sets against files, recording applied actions for undo.
#[derive(Debug, Clone)]
pub struct RuleExecutor {
    undo: Arc<UndoManager>,
}

impl RuleExecutor {
    /// Create an executor that records into `undo`.
    pub fn new(undo: Arc<UndoManager>) -> Self {
        Self { undo }
    }

    /// The history this executor records into.
    pub fn undo_manager(&self) -> &Arc<UndoManager> {
        &self.undo
    }

    /// Evaluate `rules` against `file` and run the actions of matching rules.
    ///
    /// Rules run in ascending priority; rules with equal priority keep their
    /// order. Disabled and invalid rules are skipped with a log line. After a
    /// move or rename, later actions and rules see the file at its new
    /// location. An ignore action or a delete ends processing of the file.
    pub fn execute(
        &self,
        rules: &[Rule],
        file: &FileDescriptor,
        config: &OrganizeConfig,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::new(&file.path);
        let mut ordered: Vec<&Rule> = rules.iter().collect();
        ordered.sort_by_key(|rule| rule.priority);

        let mut current = file.clone();

        'rules: for rule in ordered {
            if !rule.enabled {
                report.push(format!("rule '{}': disabled, skipped", rule.name));
                continue;
            }
            if let Err(e) = rule.validate() {
                warn!(rule = %rule.name, error = %e, "skipping invalid rule");
                report.push(format!("rule '{}': invalid, skipped: {e}", rule.name));
                continue;
            }
            if !rule.matches(&current) {
                debug!(rule = %rule.name, file = %current.path.display(), "no match");
                continue;
            }

            report.push(format!("rule '{}': matched", rule.name));
            if report.matched_rule.is_none() {
                report.matched_rule = Some(rule.name.clone());
            }
            report.matched_rules.push(rule.name.clone());
            report.claimed = true;

            for action in &rule.actions {
                let result = action.run(&current, config);
                report.push(result.log());

                let Some(meta) = result.meta() else {
                    continue;
                };
                if !meta.was_dry_run
                    && let Some(id) = self.undo.record(meta)
                {
                    report.recorded.push(id);
                }

                if let Some(dst) = &meta.dst
                    && *dst != current.path
                {
                    report.destinations.push(dst.clone());
                }

                match meta.kind {
                    ActionKind::Ignore => break 'rules,
                    ActionKind::Delete => {
                        report.deleted = true;
                        report.final_destination = None;
                        break 'rules;
                    }
                    ActionKind::Move | ActionKind::Rename => {
                        if let Some(dst) = &meta.dst
                            && *dst != current.path
                        {
                            current = resolve(&current, dst, meta.was_dry_run);
                            report.final_destination = Some(dst.clone());
                        }
                    }
                    ActionKind::Copy | ActionKind::Continue => {}
                }
            }

            if rule.stop_on_match {
                break;
            }
        }

        if !report.claimed {
            report.push("no rule matched; file unclaimed");
        }
        report
    }
}

/// Snapshot of `file` at its new location.
///
/// Real runs re-read the entry from disk; previews (and real runs where the
/// re-read fails) derive it from the old snapshot. Collaborator-supplied
/// attributes carry over either way.
fn resolve(file: &FileDescriptor, new_path: &Path, dry_run: bool) -> FileDescriptor {
    if dry_run {
        return file.relocated(new_path);
    }
    match FileDescriptor::from_path(new_path) {
        Ok(mut fresh) => {
            fresh.color = file.color;
            fresh.tags = file.tags.clone();
            fresh.metadata = file.metadata.clone();
            fresh
        }
        Err(e) => {
            warn!(path = %new_path.display(), error = %e, "cannot re-read moved file");
            file.relocated(new_path)
        }
    }
}
