//! Date-period folders on the device.
//!
//! Files are placed under a subdirectory named after the start of the
//! current period, e.g. with a 10-day interval starting 2026-01-01 a run on
//! 2026-01-15 writes into `01-11/`. Pulling reads only the current period's
//! folder and flattens it back into the local root.

use crate::plugin::{PluginError, PluginFactory, PluginInit, SyncPlugin};
use chrono::{Duration, Local, NaiveDate};
use droidsync_core::schema::{Direction, FileEntry, Pipeline, Side};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

pub const NAME: &str = "date_interval";

const DEFAULT_INTERVAL_DAYS: i64 = 10;
const DEFAULT_DATE_FORMAT: &str = "%m-%d";
const DEFAULT_START_DATE: &str = "2026-01-01";

pub fn factory() -> PluginFactory {
    PluginFactory {
        name: NAME.to_string(),
        description: "Group device files into date-period subfolders".to_string(),
        create: Arc::new(|init| {
            let plugin = DateIntervalPlugin::from_init(init)?;
            Ok(Box::new(plugin) as Box<dyn SyncPlugin>)
        }),
    }
}

#[derive(Debug, Clone)]
pub struct DateIntervalPlugin {
    label: String,
    direction: Direction,
}

impl DateIntervalPlugin {
    pub fn from_init(init: &PluginInit<'_>) -> Result<Self, PluginError> {
        let direction = init.pipeline.direction;
        if direction == Direction::Bidirectional {
            return Err(PluginError::load(
                "date_interval only supports one-way pipelines",
            ));
        }

        let interval_days: i64 = init.get("interval_days")?.unwrap_or(DEFAULT_INTERVAL_DAYS);
        if interval_days <= 0 {
            return Err(PluginError::load(format!(
                "interval_days must be positive, got {interval_days}"
            )));
        }

        let date_format: String = init
            .get("date_format")?
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

        let start_raw: String = init
            .get("start_date")?
            .unwrap_or_else(|| DEFAULT_START_DATE.to_string());
        let start = match NaiveDate::parse_from_str(&start_raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                warn!("Invalid start_date '{}' ({}), using {}", start_raw, e, DEFAULT_START_DATE);
                default_start()
            }
        };

        let today = init.now.with_timezone(&Local).date_naive();
        let label = period_label(today, start, interval_days, &date_format)?;
        debug!(pipeline = %init.pipeline.name, %label, "Date period selected");

        Ok(Self { label, direction })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn prefix(&self) -> String {
        format!("{}/", self.label)
    }
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Start of the period containing `today`, rendered with `format`.
///
/// Dates before `start` fall into earlier periods.
pub fn period_label(
    today: NaiveDate,
    start: NaiveDate,
    interval_days: i64,
    format: &str,
) -> Result<String, PluginError> {
    let elapsed = (today - start).num_days();
    let period_start = start + Duration::days(elapsed.div_euclid(interval_days) * interval_days);

    let mut label = String::new();
    write!(label, "{}", period_start.format(format))
        .map_err(|_| PluginError::load(format!("invalid date_format '{format}'")))?;
    let label = label.trim_matches('/').to_string();
    if label.is_empty() {
        return Err(PluginError::load(format!(
            "date_format '{format}' produces an empty folder name"
        )));
    }
    Ok(label)
}

impl SyncPlugin for DateIntervalPlugin {
    fn rewrite_path(
        &self,
        _pipeline: &Pipeline,
        side: Side,
        entry: &FileEntry,
    ) -> Result<Option<String>, PluginError> {
        let rewritten = match (self.direction, side) {
            (Direction::LocalToDevice, Side::Local) => {
                Some(format!("{}/{}", self.label, entry.relative_path))
            }
            (Direction::DeviceToLocal, Side::Remote) => entry
                .relative_path
                .strip_prefix(&self.prefix())
                .map(str::to_string),
            _ => None,
        };
        Ok(rewritten)
    }

    fn filter_entry(
        &self,
        _pipeline: &Pipeline,
        side: Side,
        entry: &FileEntry,
    ) -> Result<bool, PluginError> {
        // Pull only from the current period's folder
        if self.direction == Direction::DeviceToLocal && side == Side::Remote {
            return Ok(entry.relative_path.starts_with(&self.prefix()));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use droidsync_core::plan::{DiffPlanner, PlanContext, SyncOperation};
    use droidsync_core::schema::{NewPipeline, PluginConfig};
    use crate::plugin::ActivePlugin;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Midday UTC keeps the local date stable in any timezone within ±11h.
    fn midday(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn pipeline(direction: Direction) -> Pipeline {
        let mut new = NewPipeline::new("photos", "/host/photos", "/sdcard/DCIM/Sync");
        new.direction = direction;
        new.plugin = Some(NAME.to_string());
        new.into_pipeline()
    }

    fn build(pipeline: &Pipeline, config: PluginConfig, now: DateTime<Utc>) -> Result<DateIntervalPlugin, PluginError> {
        DateIntervalPlugin::from_init(&PluginInit {
            pipeline,
            config: &config,
            now,
        })
    }

    #[test]
    fn test_period_label_floors_to_interval() {
        let start = date(2026, 1, 1);
        assert_eq!(period_label(date(2026, 1, 1), start, 10, "%m-%d").unwrap(), "01-01");
        assert_eq!(period_label(date(2026, 1, 10), start, 10, "%m-%d").unwrap(), "01-01");
        assert_eq!(period_label(date(2026, 1, 11), start, 10, "%m-%d").unwrap(), "01-11");
        assert_eq!(period_label(date(2026, 3, 2), start, 7, "%Y%m%d").unwrap(), "20260226");
        // Before the start date
        assert_eq!(period_label(date(2025, 12, 31), start, 10, "%m-%d").unwrap(), "12-22");
    }

    #[test]
    fn test_invalid_format_is_an_error_not_a_panic() {
        let err = period_label(date(2026, 1, 5), date(2026, 1, 1), 10, "%Q").unwrap_err();
        assert!(err.to_string().contains("date_format"));
    }

    #[test]
    fn test_config_validation() {
        let p = pipeline(Direction::LocalToDevice);
        let mut config = PluginConfig::new();
        config.insert("interval_days".into(), 0.into());
        assert!(build(&p, config, midday(2026, 1, 5)).is_err());

        let mut config = PluginConfig::new();
        config.insert("start_date".into(), "not a date".into());
        let plugin = build(&p, config, midday(2026, 1, 15)).unwrap();
        assert_eq!(plugin.label(), "01-11");

        assert!(build(&pipeline(Direction::Bidirectional), PluginConfig::new(), midday(2026, 1, 5)).is_err());
    }

    #[test]
    fn test_push_goes_into_period_folder() {
        let p = pipeline(Direction::LocalToDevice);
        let now = midday(2026, 2, 3);
        let plugin = build(&p, PluginConfig::new(), now).unwrap();
        assert_eq!(plugin.label(), "01-31");
        let hooks = ActivePlugin::new(NAME, Box::new(plugin));

        let local = vec![FileEntry::file("img/a.jpg", 10, now)];
        let remote = vec![FileEntry::file("01-21/img/a.jpg", 10, now)];
        let plan = DiffPlanner::new().plan(&p, &local, &remote, &PlanContext::new(now).with_hooks(&hooks));

        assert_eq!(
            plan.operations,
            vec![
                SyncOperation::MkDir { path: "/sdcard/DCIM/Sync/01-31".to_string() },
                SyncOperation::MkDir { path: "/sdcard/DCIM/Sync/01-31/img".to_string() },
                SyncOperation::Push {
                    local: "/host/photos/img/a.jpg".into(),
                    remote: "/sdcard/DCIM/Sync/01-31/img/a.jpg".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_pull_reads_only_current_period() {
        let p = pipeline(Direction::DeviceToLocal);
        let now = midday(2026, 2, 3);
        let hooks = ActivePlugin::new(NAME, Box::new(build(&p, PluginConfig::new(), now).unwrap()));

        let remote = vec![
            FileEntry::dir("01-31", now),
            FileEntry::file("01-31/a.jpg", 10, now),
            FileEntry::file("01-21/old.jpg", 10, now),
        ];
        let plan = DiffPlanner::new().plan(&p, &[], &remote, &PlanContext::new(now).with_hooks(&hooks));

        assert_eq!(plan.summary.pulls, 1);
        assert!(plan.operations.contains(&SyncOperation::Pull {
            remote: "/sdcard/DCIM/Sync/01-31/a.jpg".to_string(),
            local: "/host/photos/a.jpg".into(),
        }));
        assert_eq!(plan.summary.skips, 1);
    }
}
