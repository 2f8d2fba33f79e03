use super::operation::{ConflictDecision, SkipReason, SyncOperation, SyncPlan};
use crate::filter;
use crate::local::join_relative;
use crate::schema::{Direction, FileEntry, Pipeline, Side};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Two timestamps closer than this are the same instant. FAT-backed device
/// storage only keeps even seconds.
pub const MTIME_TOLERANCE: Duration = Duration::seconds(2);

/// Extension points consulted while planning.
///
/// Every method has an identity default; [`NoHooks`] uses all of them.
pub trait PlanHooks {
    /// Key under which `entry` is compared with the other side.
    fn rewrite_path(&self, _pipeline: &Pipeline, _side: Side, entry: &FileEntry) -> String {
        entry.relative_path.clone()
    }

    /// Extra filter applied after the pipeline's own filters.
    fn accept_entry(&self, _pipeline: &Pipeline, _side: Side, _entry: &FileEntry) -> bool {
        true
    }

    /// Decide a bidirectional conflict. `None` means no usable decision.
    fn resolve_conflict(
        &self,
        _pipeline: &Pipeline,
        _local: &FileEntry,
        _remote: &FileEntry,
    ) -> Option<ConflictDecision> {
        Some(ConflictDecision::PreferNewer)
    }
}

/// Default hooks
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl PlanHooks for NoHooks {}

/// Inputs to a plan that are not listings.
pub struct PlanContext<'a> {
    /// Evaluation instant for the time-window filter
    pub now: DateTime<Utc>,
    /// Whether the device root was found by the remote listing
    pub remote_root_exists: bool,
    pub hooks: &'a dyn PlanHooks,
}

impl<'a> PlanContext<'a> {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            remote_root_exists: true,
            hooks: &NoHooks,
        }
    }

    pub fn with_hooks(mut self, hooks: &'a dyn PlanHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_remote_root_exists(mut self, exists: bool) -> Self {
        self.remote_root_exists = exists;
        self
    }
}

/// One side of the comparison after filtering and key rewriting.
#[derive(Default)]
struct SideIndex<'e> {
    files: BTreeMap<String, &'e FileEntry>,
    dirs: HashSet<String>,
}

/// Computes a [`SyncPlan`] from a local and a remote listing.
#[derive(Debug, Clone, Copy)]
pub struct DiffPlanner {
    tolerance: Duration,
}

impl Default for DiffPlanner {
    fn default() -> Self {
        Self {
            tolerance: MTIME_TOLERANCE,
        }
    }
}

impl DiffPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    /// Build the plan.
    ///
    /// MkDirs come first with parents before children, then transfers in key
    /// order, then skip records in path order.
    pub fn plan(
        &self,
        pipeline: &Pipeline,
        local: &[FileEntry],
        remote: &[FileEntry],
        ctx: &PlanContext<'_>,
    ) -> SyncPlan {
        let mut skips = Vec::new();
        let local_index = index_side(pipeline, Side::Local, local, ctx, &mut skips);
        let remote_index = index_side(pipeline, Side::Remote, remote, ctx, &mut skips);

        let device_root = pipeline.device_root();
        let direction = pipeline.direction;

        let keys: BTreeSet<&str> = local_index
            .files
            .keys()
            .chain(remote_index.files.keys())
            .map(String::as_str)
            .collect();

        let mut transfers = Vec::new();
        let mut pushed_keys: Vec<&str> = Vec::new();

        for key in keys {
            let l = local_index.files.get(key).copied();
            let r = remote_index.files.get(key).copied();

            let push_blocked = l.is_some() && remote_index.dirs.contains(key);
            let pull_blocked = r.is_some() && local_index.dirs.contains(key);

            let action = match (direction, l, r) {
                (Direction::LocalToDevice, Some(l), None) => Action::Push(l),
                (Direction::LocalToDevice, Some(l), Some(r)) if self.newer(l, r) => {
                    Action::Push(l)
                }
                (Direction::DeviceToLocal, None, Some(r)) => Action::Pull(r),
                (Direction::DeviceToLocal, Some(l), Some(r)) if self.newer(r, l) => {
                    Action::Pull(r)
                }
                (Direction::Bidirectional, Some(l), None) => Action::Push(l),
                (Direction::Bidirectional, None, Some(r)) => Action::Pull(r),
                (Direction::Bidirectional, Some(l), Some(r)) => {
                    if self.same_file(l, r) {
                        Action::None
                    } else {
                        self.resolve(pipeline, l, r, ctx)
                    }
                }
                _ => Action::None,
            };

            match action {
                Action::None => {}
                Action::Push(_) if push_blocked => skips.push(SyncOperation::Skip {
                    path: key.to_string(),
                    reason: SkipReason::TypeMismatch,
                }),
                Action::Pull(_) if pull_blocked => skips.push(SyncOperation::Skip {
                    path: key.to_string(),
                    reason: SkipReason::TypeMismatch,
                }),
                Action::Push(entry) => {
                    transfers.push(SyncOperation::Push {
                        local: join_relative(&pipeline.local_path, &entry.relative_path),
                        remote: remote_join(device_root, key),
                    });
                    pushed_keys.push(key);
                }
                Action::Pull(entry) => transfers.push(SyncOperation::Pull {
                    remote: remote_join(device_root, &entry.relative_path),
                    local: join_relative(&pipeline.local_path, key),
                }),
                Action::Skip(reason) => skips.push(SyncOperation::Skip {
                    path: key.to_string(),
                    reason,
                }),
            }
        }

        let mut operations = Vec::with_capacity(transfers.len() + skips.len() + 1);

        if !ctx.remote_root_exists && direction.writes_to_device() && device_root != "/" {
            operations.push(SyncOperation::MkDir {
                path: device_root.to_string(),
            });
        }

        // BTreeSet order puts every parent before its children since a parent
        // is a strict prefix.
        let missing_dirs: BTreeSet<&str> = pushed_keys
            .iter()
            .copied()
            .flat_map(ancestors)
            .filter(|dir| !remote_index.dirs.contains(*dir))
            .collect();
        operations.extend(missing_dirs.into_iter().map(|dir| SyncOperation::MkDir {
            path: remote_join(device_root, dir),
        }));

        operations.extend(transfers);

        skips.sort_by(|a, b| skip_path(a).cmp(skip_path(b)));
        operations.extend(skips);

        let plan = SyncPlan::new(pipeline.id, operations);
        debug!(
            pipeline = %pipeline.name,
            mkdirs = plan.summary.mkdirs,
            pushes = plan.summary.pushes,
            pulls = plan.summary.pulls,
            skips = plan.summary.skips,
            "Planned sync"
        );
        plan
    }

    fn same_file(&self, a: &FileEntry, b: &FileEntry) -> bool {
        a.size == b.size && (a.modified - b.modified).abs() <= self.tolerance
    }

    /// `a` is newer than `b` beyond the tolerance.
    fn newer(&self, a: &FileEntry, b: &FileEntry) -> bool {
        a.modified - b.modified > self.tolerance
    }

    fn resolve<'e>(
        &self,
        pipeline: &Pipeline,
        local: &'e FileEntry,
        remote: &'e FileEntry,
        ctx: &PlanContext<'_>,
    ) -> Action<'e> {
        match ctx.hooks.resolve_conflict(pipeline, local, remote) {
            Some(ConflictDecision::PreferLocal) => Action::Push(local),
            Some(ConflictDecision::PreferRemote) => Action::Pull(remote),
            Some(ConflictDecision::Skip) => Action::Skip(SkipReason::ConflictSkipped),
            Some(ConflictDecision::PreferNewer) => {
                if self.newer(remote, local) {
                    Action::Pull(remote)
                } else {
                    Action::Push(local)
                }
            }
            None => Action::Skip(SkipReason::ConflictUnresolved),
        }
    }
}

enum Action<'e> {
    None,
    Push(&'e FileEntry),
    Pull(&'e FileEntry),
    Skip(SkipReason),
}

fn index_side<'e>(
    pipeline: &Pipeline,
    side: Side,
    entries: &'e [FileEntry],
    ctx: &PlanContext<'_>,
    skips: &mut Vec<SyncOperation>,
) -> SideIndex<'e> {
    let mut index = SideIndex::default();

    for entry in entries {
        if !entry.is_dir
            && (!filter::matches(entry, pipeline, ctx.now)
                || !ctx.hooks.accept_entry(pipeline, side, entry))
        {
            skips.push(SyncOperation::Skip {
                path: entry.relative_path.clone(),
                reason: SkipReason::Filtered,
            });
            continue;
        }

        let key = normalize_key(&ctx.hooks.rewrite_path(pipeline, side, entry))
            .unwrap_or_else(|| entry.relative_path.clone());

        index.dirs.extend(ancestors(&key).map(str::to_string));

        if entry.is_dir {
            index.dirs.insert(key);
            continue;
        }

        if index.files.contains_key(&key) {
            warn!("Two {side} entries map to '{key}'; keeping the first");
            continue;
        }
        index.files.insert(key, entry);
    }

    index
}

/// Strip redundant separators. Empty input yields `None`.
fn normalize_key(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Proper ancestors of a relative path, shortest first.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

fn remote_join(root: &str, relative: &str) -> String {
    if root == "/" {
        format!("/{relative}")
    } else {
        format!("{root}/{relative}")
    }
}

fn skip_path(op: &SyncOperation) -> &str {
    match op {
        SyncOperation::Skip { path, .. } => path,
        _ => "",
    }
}
