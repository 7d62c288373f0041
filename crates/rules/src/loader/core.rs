//! Core [`RuleLoader`] struct: filesystem-backed rule loading with optional hot-reload.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::Result;

use super::error::{LoadResult, LoadStatus};
use super::schema::NotificationRuleDoc;
use super::watcher::handle_fs_event;

/// Loaded documents plus the file each one came from.
#[derive(Debug, Default)]
pub(super) struct RuleSet {
    pub(super) documents: HashMap<String, NotificationRuleDoc>,
    sources: HashMap<PathBuf, String>,
}

impl RuleSet {
    /// Store `doc` as the content of `path`.
    ///
    /// If the file used to define another id, that rule is dropped.
    pub(super) fn upsert(&mut self, path: &Path, doc: NotificationRuleDoc) {
        let id = doc.id().to_string();
        if let Some(previous) = self.sources.insert(path.to_path_buf(), id.clone()) {
            if previous != id {
                self.documents.remove(&previous);
            }
        }
        if let Some(other) = self
            .sources
            .iter()
            .find(|(p, i)| **i == id && p.as_path() != path)
            .map(|(p, _)| p.clone())
        {
            warn!(
                rule_id = %id,
                path = %path.display(),
                other = %other.display(),
                "duplicate rule id, latest file wins"
            );
            self.sources.remove(&other);
        }
        self.documents.insert(id, doc);
    }

    /// Forget the rule defined by `path`, returning its id.
    pub(super) fn remove_path(&mut self, path: &Path) -> Option<String> {
        let id = self.sources.remove(path)?;
        self.documents.remove(&id);
        Some(id)
    }
}

/// Filesystem-backed rule loader with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files holding
/// [`NotificationRuleDoc`]s and keeps them in memory keyed by rule id. Every
/// change picked up by the watcher wakes [`RuleLoader::changes`].
pub struct RuleLoader {
    rules_dir: PathBuf,
    rules: Arc<RwLock<RuleSet>>,
    changes: Arc<Notify>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RuleLoader {
    /// Create a new loader for the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(rules_dir: PathBuf) -> Self {
        if !rules_dir.exists() {
            if let Err(e) = fs::create_dir_all(&rules_dir) {
                warn!(path = %rules_dir.display(), error = %e, "failed to create rules directory");
            }
        }
        Self {
            rules_dir,
            rules: Arc::new(RwLock::new(RuleSet::default())),
            changes: Arc::new(Notify::new()),
            _watcher: None,
        }
    }

    /// Recursively scan the rules directory and load all YAML files.
    ///
    /// Parse errors are reported per file and do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        self.scan_dir_recursive(&self.rules_dir, &mut results)?;
        let loaded = results.iter().filter(|r| r.is_loaded()).count();
        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(path = %self.rules_dir.display(), loaded, failed, "scanned rules directory");
        Ok(results)
    }

    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        let mut paths = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.sort();

        for path in paths {
            if is_dotfile(&path) {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }

            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            match self.load_file(&path) {
                Ok(doc) => {
                    let rule_id = doc.id().to_string();
                    info!(rule_id = %rule_id, path = %path.display(), "loaded rule");
                    self.rules
                        .write()
                        .expect("rule set lock poisoned")
                        .upsert(&path, doc);
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded { rule_id },
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load rule file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse and validate a single YAML rule file.
    pub fn load_file(&self, path: &Path) -> Result<NotificationRuleDoc> {
        let contents = fs::read_to_string(path)?;
        NotificationRuleDoc::from_yaml(&contents)
    }

    /// Start a recursive filesystem watcher.
    ///
    /// On file create/modify the rule is re-parsed and upserted; on delete it
    /// is removed. A parse error keeps the previous version.
    pub fn watch(&mut self) -> Result<()> {
        let rules = Arc::clone(&self.rules);
        let changes = Arc::clone(&self.changes);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if handle_fs_event(&event, &rules) {
                        changes.notify_one();
                    }
                }
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&self.rules_dir, RecursiveMode::Recursive)?;
        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.rules_dir.display(), "watching rules directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Woken after the watcher applied a change.
    pub fn changes(&self) -> Arc<Notify> {
        Arc::clone(&self.changes)
    }

    /// Copy of the current documents keyed by rule id.
    pub fn documents(&self) -> HashMap<String, NotificationRuleDoc> {
        self.rules
            .read()
            .expect("rule set lock poisoned")
            .documents
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rules.read().expect("rule set lock poisoned").documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(super) fn rule_set(&self) -> &Arc<RwLock<RuleSet>> {
        &self.rules
    }
}

pub(super) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yml" || e == "yaml")
}

pub(super) fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}
