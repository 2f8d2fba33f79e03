//! Configuration, pipeline store and engine wiring shared by commands

use crate::commands::GlobalArgs;
use anyhow::{Context, Result};
use droidsync_core::clock::SystemClock;
use droidsync_core::config::{Config, ConfigOverrides, resolve_config};
use droidsync_core::home::get_home_dir;
use droidsync_core::schema::Pipeline;
use droidsync_core::store::{JsonPipelineFile, PipelineStore};
use droidsync_daemon::bridge::BridgeClient;
use droidsync_daemon::plugin::PluginHost;
use droidsync_daemon::sync::{SyncExecutor, SyncObserver};
use std::path::PathBuf;
use std::sync::Arc;

pub struct CliContext {
    pub home_dir: PathBuf,
    pub config: Config,
    pub pipelines_file: PathBuf,
}

impl CliContext {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let home_dir = get_home_dir()?;
        let overrides = ConfigOverrides {
            adb_path: global.adb.clone(),
            config_path: global.config.clone(),
            ..Default::default()
        };
        let config =
            resolve_config(&overrides, &home_dir).context("Failed to resolve configuration")?;
        let pipelines_file = config.pipelines_file(&home_dir);
        Ok(Self {
            home_dir,
            config,
            pipelines_file,
        })
    }

    pub fn open_store(&self) -> Result<PipelineStore> {
        PipelineStore::open(Box::new(JsonPipelineFile::new(&self.pipelines_file)))
            .with_context(|| format!("Failed to load pipelines from {}", self.pipelines_file.display()))
    }

    /// Pipeline by id or name.
    pub fn resolve_pipeline(&self, store: &PipelineStore, id_or_name: &str) -> Result<Arc<Pipeline>> {
        store
            .resolve(id_or_name)
            .with_context(|| format!("Pipeline '{id_or_name}' not found"))
    }

    pub fn client(&self) -> BridgeClient {
        BridgeClient::adb(self.config.core.adb_path.clone(), &self.config.bridge)
    }

    pub fn plugins(&self) -> PluginHost {
        PluginHost::from_config(&self.config, &self.home_dir)
    }

    pub fn executor(&self, observer: Arc<dyn SyncObserver>) -> SyncExecutor {
        SyncExecutor::new(self.client(), Arc::new(self.plugins()), Arc::new(SystemClock))
            .with_observer(observer)
            .with_lock_dir(self.config.lock_dir(&self.home_dir))
    }
}
