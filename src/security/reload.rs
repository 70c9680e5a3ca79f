//! Allow-list file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::security::allow_list::{AllowList, SharedAllowList};

/// Watches the allow-list file and swaps in a fresh list on change.
pub struct AllowListWatcher {
    path: PathBuf,
    target: Arc<SharedAllowList>,
}

impl AllowListWatcher {
    pub fn new(path: &Path, target: Arc<SharedAllowList>) -> Self {
        Self {
            path: path.to_path_buf(),
            target,
        }
    }

    /// Re-read the file once. The current list stays in place on failure.
    pub fn reload(&self) -> bool {
        match AllowList::load(Some(&self.path)) {
            Ok(list) => {
                tracing::info!(path = ?self.path, orgs = list.org_count(), "allow-list reloaded");
                self.target.replace(list);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to reload allow-list, keeping current list");
                false
            }
        }
    }

    /// Start watching in notify's background thread.
    ///
    /// The parent directory is watched rather than the file, so the watch
    /// survives the file being replaced by a rename. Events for other
    /// entries of the directory are ignored.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let path = self.path.clone();
        let this = self;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!("allow-list change detected, reloading...");
                        this.reload();
                    }
                }
                Err(e) => tracing::error!("allow-list watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, dir = ?dir, "allow-list watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::allow_list::AllowListSource;

    #[test]
    fn test_reload_swaps_and_keeps_on_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"o1": ["rhel-10"]}"#).unwrap();

        let shared = Arc::new(SharedAllowList::default());
        let watcher = AllowListWatcher::new(file.path(), Arc::clone(&shared));
        assert!(watcher.reload());
        assert!(shared.is_allowed("o1", "rhel-10").unwrap());

        std::fs::write(file.path(), "not json").unwrap();
        assert!(!watcher.reload());
        assert!(shared.is_allowed("o1", "rhel-10").unwrap());
    }

    fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        false
    }

    /// Write `contents` next to `target` and rename it over the target.
    fn swap_in(target: &Path, contents: &str) {
        let staged = target.with_extension("staged");
        std::fs::write(&staged, contents).unwrap();
        std::fs::rename(&staged, target).unwrap();
    }

    #[test]
    fn test_watcher_survives_rename_swaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allow.json");
        std::fs::write(&path, "{}").unwrap();

        let shared = Arc::new(SharedAllowList::default());
        let _watcher = AllowListWatcher::new(&path, Arc::clone(&shared)).run().unwrap();

        swap_in(&path, r#"{"o1": ["rhel-10"]}"#);
        assert!(wait_until(|| shared.is_allowed("o1", "rhel-10").unwrap()));

        swap_in(&path, r#"{"o2": ["rhel-10"]}"#);
        assert!(wait_until(|| shared.is_allowed("o2", "rhel-10").unwrap()));
        assert!(!shared.is_allowed("o1", "rhel-10").unwrap());
    }

    #[test]
    fn test_watcher_ignores_sibling_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allow.json");
        std::fs::write(&path, r#"{"o1": ["rhel-10"]}"#).unwrap();

        let shared = Arc::new(SharedAllowList::default());
        let _watcher = AllowListWatcher::new(&path, Arc::clone(&shared)).run().unwrap();

        std::fs::write(dir.path().join("other.json"), r#"{"o1": ["rhel-10"]}"#).unwrap();
        std::thread::sleep(Duration::from_millis(500));
        assert!(!shared.is_allowed("o1", "rhel-10").unwrap());
    }
}
