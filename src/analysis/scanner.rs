use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::anomaly::{rank_anomalies, Anomaly, AnomalyKind};
use super::detector::{AnomalyDetector, DetectParams};
use crate::errors::{CostAnomalyError, CostAnomalyResult};
use crate::storage::AggregateReader;
use crate::utils::dates::date_range;

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub scan_start: NaiveDate,
    pub scan_end: NaiveDate,
    pub days_scanned: usize,
    pub anomalies: Vec<Anomaly>,
}

type StreakKey = (String, AnomalyKind);

struct Streak {
    best: Anomaly,
    last_seen: NaiveDate,
}

/// Open streaks for one scan. A streak stays open while its (group, kind)
/// is re-detected on every consecutive scanned day.
#[derive(Default)]
struct StreakTable {
    active: HashMap<StreakKey, Streak>,
    finished: Vec<Anomaly>,
}

impl StreakTable {
    fn observe_day(&mut self, day: NaiveDate, anomalies: Vec<Anomaly>) {
        let mut seen: HashSet<StreakKey> = HashSet::with_capacity(anomalies.len());

        for anomaly in anomalies {
            let key = (anomaly.group_value.clone(), anomaly.kind());
            seen.insert(key.clone());

            match self.active.get_mut(&key) {
                Some(streak) => {
                    if anomaly.is_more_extreme_than(&streak.best) {
                        streak.best = anomaly;
                    }
                    streak.last_seen = day;
                }
                None => {
                    self.active.insert(key, Streak { best: anomaly, last_seen: day });
                }
            }
        }

        let broken: Vec<StreakKey> = self
            .active
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in broken {
            if let Some(streak) = self.active.remove(&key) {
                debug!(group = %key.0, kind = key.1.as_str(), last_seen = %streak.last_seen, "Streak ended");
                self.finished.push(streak.best);
            }
        }
    }

    fn finish(mut self) -> Vec<Anomaly> {
        self.finished.extend(self.active.into_values().map(|s| s.best));
        self.finished
    }
}

/// Runs the detector once per day over `[scan_start, scan_end]` and folds
/// consecutive-day re-detections of the same group and kind into one event,
/// keeping the most extreme day.
///
/// `params.reference_date` is ignored; each day supplies its own.
pub fn scan_anomalies<R: AggregateReader>(
    detector: &AnomalyDetector<R>,
    scan_start: NaiveDate,
    scan_end: NaiveDate,
    params: &DetectParams,
) -> CostAnomalyResult<ScanResult> {
    if scan_start > scan_end {
        return Err(CostAnomalyError::Range { start: scan_start, end: scan_end });
    }

    info!(
        scan_start = %scan_start,
        scan_end = %scan_end,
        group_by = %params.group_by,
        "Starting historical anomaly scan"
    );

    let mut streaks = StreakTable::default();
    let mut days_scanned = 0;
    for day in date_range(scan_start, scan_end) {
        let found = detector.detect(&params.with_reference_date(day))?;
        debug!(day = %day, detected = found.len(), open_streaks = streaks.active.len(), "Scanned day");
        streaks.observe_day(day, found);
        days_scanned += 1;
    }

    let mut anomalies = streaks.finish();
    rank_anomalies(&mut anomalies);

    info!(days_scanned, anomalies = anomalies.len(), "Historical scan complete");
    Ok(ScanResult {
        scan_start,
        scan_end,
        days_scanned,
        anomalies,
    })
}
