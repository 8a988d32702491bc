//! Day and week schedule views: filter, expand and split in one pass.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::{filter_by_centers, occurring_on};
use crate::model::{AvailabilityDeclaration, DateWindow, HostKey, TimeRange};
use crate::splitter::split_day_by_host;

/// One host's row in the schedule grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRow {
    pub host: HostKey,
    pub ranges: Vec<TimeRange>,
}

/// Every host row for a single date, ordered by host type then host id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub rows: Vec<HostRow>,
}

impl DaySchedule {
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.ranges.is_empty())
    }

    pub fn row(&self, host_id: &str) -> Option<&HostRow> {
        self.rows.iter().find(|row| row.host.host_id == host_id)
    }
}

/// Build the grid for `date` from the full declaration set.
pub fn day_schedule(
    declarations: &[AvailabilityDeclaration],
    date: NaiveDate,
    selected_center_ids: &[String],
) -> DaySchedule {
    let relevant = filter_by_centers(declarations, selected_center_ids);
    build_day(&relevant, date)
}

/// One [`DaySchedule`] per day of `window`.
pub fn week_schedule(
    declarations: &[AvailabilityDeclaration],
    window: DateWindow,
    selected_center_ids: &[String],
) -> Vec<DaySchedule> {
    // Center filtering does not depend on the date; do it once.
    let relevant = filter_by_centers(declarations, selected_center_ids);
    window.days().map(|date| build_day(&relevant, date)).collect()
}

fn build_day(relevant: &[AvailabilityDeclaration], date: NaiveDate) -> DaySchedule {
    let todays = occurring_on(relevant, date);
    debug!(
        "{} of {} declarations occur on {}",
        todays.len(),
        relevant.len(),
        date
    );

    let rows = split_day_by_host(&todays)
        .into_iter()
        .map(|(host, ranges)| HostRow { host, ranges })
        .collect();

    DaySchedule { date, rows }
}
