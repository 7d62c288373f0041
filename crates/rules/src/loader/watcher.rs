//! Filesystem event handler for the notify watcher (hot-reload).

use std::path::Path;
use std::sync::{Arc, RwLock};

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use super::core::{is_dotfile, is_yaml, RuleSet};
use super::schema::NotificationRuleDoc;

/// Apply one filesystem event to the rule set.
///
/// Returns `true` if the rule set changed.
pub(super) fn handle_fs_event(event: &Event, rules: &Arc<RwLock<RuleSet>>) -> bool {
    let mut changed = false;
    for path in &event.paths {
        // Editors' swap and temp files are dotfiles.
        if !is_yaml(path) || is_dotfile(path) {
            continue;
        }

        match &event.kind {
            EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any) => {
                // A rename reports the old path too, which no longer exists.
                changed |= if path.exists() {
                    reload(path, rules)
                } else {
                    remove(path, rules)
                };
            }
            EventKind::Remove(RemoveKind::File | RemoveKind::Any) => {
                changed |= remove(path, rules);
            }
            _ => {}
        }
    }
    changed
}

fn reload(path: &Path, rules: &Arc<RwLock<RuleSet>>) -> bool {
    let parsed = std::fs::read_to_string(path)
        .map_err(crate::error::RuleError::from)
        .and_then(|contents| NotificationRuleDoc::from_yaml(&contents));
    match parsed {
        Ok(doc) => {
            info!(rule_id = %doc.id(), path = %path.display(), "hot-reloaded rule");
            rules.write().expect("rule set lock poisoned").upsert(path, doc);
            true
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "failed to parse rule during hot-reload, keeping previous version"
            );
            false
        }
    }
}

fn remove(path: &Path, rules: &Arc<RwLock<RuleSet>>) -> bool {
    match rules.write().expect("rule set lock poisoned").remove_path(path) {
        Some(id) => {
            info!(rule_id = %id, path = %path.display(), "removed rule after file deletion");
            true
        }
        None => false,
    }
}
