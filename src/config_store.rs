use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigOverrides};

/// Shared, read-mostly configuration snapshot.
///
/// Readers get an owned copy; writers swap the whole snapshot under the write
/// lock, so nobody ever observes a half-applied update.
#[derive(Debug, Default)]
pub struct ConfigStore {
    inner: RwLock<Config>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    pub fn get(&self) -> Config {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, config: Config) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

pub fn change_channel() -> (ChangeNotifier, Receiver<()>) {
    let (tx, rx) = bounded(1);
    (ChangeNotifier { tx }, rx)
}

#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    tx: Sender<()>,
}

impl ChangeNotifier {
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn spawn(
        path: &Path,
        store: Arc<ConfigStore>,
        overrides: ConfigOverrides,
        notifier: ChangeNotifier,
    ) -> Result<Self> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if !dir.exists() {
            return Err(anyhow!(
                "Config directory {} does not exist",
                dir.display()
            ));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| anyhow!("Config path {} has no file name", path.display()))?;
        let config_path = path.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if is_relevant(&event, &file_name) {
                        reload(&config_path, &store, &overrides, &notifier);
                    }
                }
                Err(err) => warn!("config watcher error: {err}"),
            }
        })?;
        // Editors often save by rename, so watch the directory instead of the file.
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        info!(path = %path.display(), "watching config file");

        Ok(Self { _watcher: watcher })
    }
}

fn is_relevant(event: &notify::Event, file_name: &OsString) -> bool {
    if event.kind.is_access() {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().map(|name| name == file_name).unwrap_or(false))
}

/// Re-reads the file; publishes it only when it parses and validates cleanly.
pub fn reload(
    path: &Path,
    store: &ConfigStore,
    overrides: &ConfigOverrides,
    notifier: &ChangeNotifier,
) -> bool {
    let (mut config, issues) = match Config::load_from(path) {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!("ignoring unreadable config reload: {err:#}");
            return false;
        }
    };
    if !issues.is_empty() {
        for issue in &issues {
            warn!("ignoring config reload, {issue}");
        }
        return false;
    }
    overrides.apply(&mut config);
    if config == store.get() {
        debug!("config reload produced no changes");
        return false;
    }
    store.set(config);
    if !notifier.notify() {
        debug!("config change notification already pending");
    }
    info!("config reloaded");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, thread};

    #[test]
    fn get_returns_an_independent_copy() {
        let store = ConfigStore::new(Config::default());
        let mut copy = store.get();
        copy.ui.max_width = 99;
        assert_eq!(store.get().ui.max_width, Config::default().ui.max_width);
    }

    #[test]
    fn set_replaces_the_snapshot() {
        let store = ConfigStore::default();
        let mut config = Config::default();
        config.artwork.vinyl_mode = true;
        store.set(config.clone());
        assert_eq!(store.get(), config);
    }

    #[test]
    fn concurrent_readers_always_see_complete_snapshots() {
        let store = Arc::new(ConfigStore::default());
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..200 {
                    let mut config = Config::default();
                    config.ui.max_width = 20 + i;
                    config.artwork.padding = i;
                    store.set(config);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let config = store.get();
                        if config != Config::default() {
                            assert_eq!(config.ui.max_width, 20 + config.artwork.padding);
                        }
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn notifications_coalesce_to_one_pending() {
        let (notifier, rx) = change_channel();
        assert!(notifier.notify());
        assert!(!notifier.notify());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert!(notifier.notify());
    }

    #[test]
    fn reload_publishes_valid_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = ConfigStore::default();
        let (notifier, rx) = change_channel();
        let overrides = ConfigOverrides::default();

        fs::write(&path, "[artwork]\nvinyl_mode = true\n").unwrap();
        assert!(reload(&path, &store, &overrides, &notifier));
        assert!(store.get().artwork.vinyl_mode);
        assert!(rx.try_recv().is_ok());

        fs::write(&path, "[artwork]\nvinyl_rpm = -4.0\n").unwrap();
        assert!(!reload(&path, &store, &overrides, &notifier));
        assert!(store.get().artwork.vinyl_mode);
        assert!(rx.try_recv().is_err());

        fs::write(&path, "not = [valid").unwrap();
        assert!(!reload(&path, &store, &overrides, &notifier));
    }

    #[test]
    fn reload_reapplies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = ConfigStore::default();
        let (notifier, _rx) = change_channel();
        let overrides = ConfigOverrides {
            no_artwork: true,
            ..Default::default()
        };

        fs::write(&path, "[artwork]\nenabled = true\nwidth_columns = 20\n").unwrap();
        assert!(reload(&path, &store, &overrides, &notifier));
        let config = store.get();
        assert!(!config.artwork.enabled);
        assert_eq!(config.artwork.width_columns, 20);
    }
}
