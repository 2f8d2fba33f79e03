use super::PluginError;
use droidsync_core::plan::ConflictDecision;
use droidsync_core::schema::{FileEntry, Pipeline, Side};
use droidsync_core::RunResult;

/// Sync plugin. Every hook is optional.
///
/// Hooks are synchronous and run on the executor's task while a plan is
/// built, so they should not block on I/O for long. A plugin instance lives
/// for exactly one run.
pub trait SyncPlugin: Send + Sync {
    /// Key under which `entry` is compared with the other side. `None` keeps
    /// the entry's own relative path.
    fn rewrite_path(
        &self,
        _pipeline: &Pipeline,
        _side: Side,
        _entry: &FileEntry,
    ) -> Result<Option<String>, PluginError> {
        Ok(None)
    }

    /// Whether a file takes part in the run at all. Rejected files are
    /// reported as filtered.
    fn filter_entry(
        &self,
        _pipeline: &Pipeline,
        _side: Side,
        _entry: &FileEntry,
    ) -> Result<bool, PluginError> {
        Ok(true)
    }

    /// Decide a bidirectional conflict between differing copies.
    fn resolve_conflict(
        &self,
        _pipeline: &Pipeline,
        _local: &FileEntry,
        _remote: &FileEntry,
    ) -> Result<ConflictDecision, PluginError> {
        Ok(ConflictDecision::PreferNewer)
    }

    /// Called once before listing.
    fn before_sync(&self, _pipeline: &Pipeline) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once with the finished result.
    fn after_sync(&self, _pipeline: &Pipeline, _result: &RunResult) -> Result<(), PluginError> {
        Ok(())
    }
}
