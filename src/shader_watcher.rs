use std::path::{Path, PathBuf};
use std::sync::mpsc;

use log::*;
use notify::{Event, RecursiveMode, Watcher};

pub struct ShaderChanges {
    #[expect(unused)]
    watcher: notify::RecommendedWatcher,
    receiver: mpsc::Receiver<notify::Result<Event>>,
}

impl ShaderChanges {
    /// gathers all spirv and manifest edit events since this function was last called
    pub fn events(&mut self) -> anyhow::Result<Vec<notify::Event>> {
        let events: notify::Result<Vec<notify::Event>> = self.receiver.try_iter().collect();
        let mut events = events?;

        events.retain(|event| match event.kind {
            notify::EventKind::Create(_) => true,
            notify::EventKind::Modify(_) => true,
            notify::EventKind::Remove(_) => true,

            notify::EventKind::Access(_) => false,
            notify::EventKind::Any => {
                error!("unexpected notify event: {event:?}");
                false
            }
            notify::EventKind::Other => {
                error!("unexpected notify event: {event:?}");
                false
            }
        });
        events.retain(|event| event.paths.iter().any(|path| is_watched_file(path)));

        Ok(events)
    }
}

/// the paths touched by a batch of events, without repeats
pub fn changed_paths(events: &[notify::Event]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = events
        .iter()
        .flat_map(|event| event.paths.iter().cloned())
        .filter(|path| is_watched_file(path))
        .collect();
    paths.sort();
    paths.dedup();

    paths
}

fn is_watched_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("spv") | Some("json")
    )
}

/// watches a directory of compiled shaders, usually the manifest's
pub fn watch(shaders_dir: &Path) -> notify::Result<ShaderChanges> {
    let (sender, receiver) = mpsc::channel::<notify::Result<Event>>();

    let mut watcher = notify::recommended_watcher(sender)?;
    watcher.watch(shaders_dir, RecursiveMode::Recursive)?;

    Ok(ShaderChanges { watcher, receiver })
}
