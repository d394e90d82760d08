use std::path::{Path, PathBuf};
use std::time::Duration;

use log::*;

use ash_shader_layouts::shaders::Severity;
use ash_shader_layouts::util::*;
use ash_shader_layouts::*;

const WATCH_DELAY: Duration = Duration::from_millis(250);

fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    let manifest_file = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_path(["shaders", "shaders.json"]));

    let watch = env_flag("SHADER_WATCH");
    let write_json = env_flag("WRITE_REFLECTION_JSON");
    let strict = env_flag("STRICT_SHADERS");

    let store = LayoutStore::new();
    let (manifest, mut shaders) = load_shaders(&manifest_file)?;
    setup_all(&mut shaders, &store, &manifest.dir, write_json);

    if strict {
        for shader in &shaders {
            shader.diagnostics().escalate(Severity::Error)?;
        }
    }

    if !watch {
        return Ok(());
    }

    info!("watching {} for changes", manifest.dir.display());
    let mut changes = shader_watcher::watch(&manifest.dir)?;
    let mut manifest = manifest;
    loop {
        std::thread::sleep(WATCH_DELAY);

        let events = changes.events()?;
        if events.is_empty() {
            continue;
        }

        let paths = shader_watcher::changed_paths(&events);
        debug!("changed: {paths:?}");

        if paths.iter().any(|path| path.ends_with(manifest_file_name(&manifest_file))) {
            info!("manifest changed, reloading every shader");
            match load_shaders(&manifest_file) {
                Ok((reloaded, reloaded_shaders)) => {
                    store.clear();
                    manifest = reloaded;
                    shaders = reloaded_shaders;
                }
                Err(error) => {
                    error!("failed to reload manifest: {error}");
                    continue;
                }
            }
        }

        setup_all(&mut shaders, &store, &manifest.dir, write_json);
    }
}

fn manifest_file_name(manifest_file: &Path) -> &Path {
    manifest_file
        .file_name()
        .map(Path::new)
        .unwrap_or(manifest_file)
}

fn load_shaders(manifest_file: &Path) -> anyhow::Result<(ShaderManifest, Vec<Shader>)> {
    let manifest = ShaderManifest::load(manifest_file)?;
    let shaders = manifest.shaders.iter().cloned().map(Shader::new).collect();

    Ok((manifest, shaders))
}

fn setup_all(
    shaders: &mut [Shader],
    store: &LayoutStore,
    shaders_dir: &Path,
    write_json: bool,
) {
    for shader in shaders.iter_mut() {
        if !shader.setup(store) {
            continue;
        }

        for layout in shader.layouts() {
            info!(
                "'{}' set {}: {} binding(s), layout {:016x}",
                shader.name(),
                layout.set,
                layout.bindings.len(),
                layout.hash
            );
        }

        if write_json {
            match shader.write_reflection_json(shaders_dir) {
                Ok(json_path) => debug!("wrote {}", json_path.display()),
                Err(error) => error!(
                    "failed to write reflection json for '{}': {error}",
                    shader.name()
                ),
            }
        }
    }

    store.prune();
    info!("{} shared layout(s) after setup", store.len());
    for pool_size in store.descriptor_pool_sizes() {
        debug!(
            "pool needs {} descriptor(s) of {:?}",
            pool_size.descriptor_count, pool_size.ty
        );
    }
}
