// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Admin dashboard figures, recomputed from the full reservation list on
//! every request.
//!
//! Revenue only ever counts completed reservations. Every view is built by a
//! single pass over the entries; ties in the sorted views keep the key order
//! of the underlying `BTreeMap`, so the output is fully deterministic.
use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::ReservationStatus;

/// Label used for reservations whose service row no longer exists.
pub const REMOVED_SERVICE: &str = "Removed";
/// Status bucket for reservations without a status.
pub const PENDING_STATUS: &str = "pending";

const DAILY_WINDOW_DAYS: i64 = 7;
const TOP_HOURS: usize = 5;
const MONTHS_IN_REPORT: usize = 6;

/// One reservation as the dashboard sees it. Any field may be missing:
/// unparseable timestamps and removed services still count where they can.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DashboardEntry {
    pub start_at: Option<NaiveDateTime>,
    pub status: Option<ReservationStatus>,
    pub service_name: Option<String>,
    pub service_price: Option<f64>,
    pub customer_id: Option<String>,
}

impl DashboardEntry {
    fn is_completed(&self) -> bool {
        self.status == Some(ReservationStatus::Completed)
    }

    /// Revenue this entry contributes: its price if completed, else 0.
    fn revenue(&self) -> f64 {
        if self.is_completed() {
            self.service_price.unwrap_or(0.0)
        } else {
            0.0
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceSummary {
    pub name: String,
    pub count: usize,
    pub revenue: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    /// `dd/mm`
    pub label: String,
    pub revenue: f64,
    pub completed: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HourSummary {
    /// `H:00`
    pub hour: String,
    pub count: usize,
    pub revenue: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusCount {
    pub status: String,
    pub label: String,
    pub count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    pub total_revenue: f64,
    pub month_revenue: f64,
    pub week_revenue: f64,
    pub completed: usize,
    pub total: usize,
    /// Percentage of completed reservations, 0 when there are none.
    pub completion_rate: f64,
    /// Customers with more than one completed reservation.
    pub loyal_customers: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    /// `M/YYYY`
    pub label: String,
    pub revenue: f64,
    /// Growth in percent relative to the previous bucket of the report.
    pub growth: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    pub services: Vec<ServiceSummary>,
    pub daily: Vec<DailyRevenue>,
    pub hours: Vec<HourSummary>,
    pub statuses: Vec<StatusCount>,
    pub metrics: Metrics,
    pub monthly: Vec<MonthlyRevenue>,
}

impl Dashboard {
    pub fn build(entries: &[DashboardEntry], now: NaiveDateTime) -> Self {
        Self {
            services: services(entries),
            daily: daily(entries, now.date()),
            hours: hours(entries),
            statuses: statuses(entries),
            metrics: metrics(entries, now),
            monthly: monthly(entries),
        }
    }
}

fn sort_by_revenue_desc<T>(items: &mut [T], revenue: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| revenue(b).total_cmp(&revenue(a)));
}

pub fn services(entries: &[DashboardEntry]) -> Vec<ServiceSummary> {
    let mut buckets: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for entry in entries {
        let name = entry.service_name.as_deref().unwrap_or(REMOVED_SERVICE);
        let bucket = buckets.entry(name).or_default();
        bucket.0 += 1;
        bucket.1 += entry.revenue();
    }

    let mut summaries: Vec<ServiceSummary> = buckets
        .into_iter()
        .map(|(name, (count, revenue))| ServiceSummary {
            name: name.to_string(),
            count,
            revenue,
        })
        .collect();
    sort_by_revenue_desc(&mut summaries, |s| s.revenue);
    summaries
}

/// Completed revenue per day for the seven days ending `today`, oldest first.
pub fn daily(entries: &[DashboardEntry], today: NaiveDate) -> Vec<DailyRevenue> {
    let first = today - Duration::days(DAILY_WINDOW_DAYS - 1);
    let mut days: Vec<DailyRevenue> = first
        .iter_days()
        .take(DAILY_WINDOW_DAYS as usize)
        .map(|date| DailyRevenue {
            date,
            label: date.format("%d/%m").to_string(),
            revenue: 0.0,
            completed: 0,
        })
        .collect();

    for entry in entries.iter().filter(|e| e.is_completed()) {
        let Some(start) = entry.start_at else {
            continue;
        };
        let offset = (start.date() - first).num_days();
        if (0..DAILY_WINDOW_DAYS).contains(&offset) {
            let day = &mut days[offset as usize];
            day.revenue += entry.revenue();
            day.completed += 1;
        }
    }
    days
}

/// The five start hours bringing in the most revenue.
pub fn hours(entries: &[DashboardEntry]) -> Vec<HourSummary> {
    let mut buckets: BTreeMap<u32, (usize, f64)> = BTreeMap::new();
    for entry in entries {
        let Some(start) = entry.start_at else {
            continue;
        };
        let bucket = buckets.entry(start.hour()).or_default();
        bucket.0 += 1;
        bucket.1 += entry.revenue();
    }

    let mut summaries: Vec<HourSummary> = buckets
        .into_iter()
        .map(|(hour, (count, revenue))| HourSummary {
            hour: format!("{hour}:00"),
            count,
            revenue,
        })
        .collect();
    sort_by_revenue_desc(&mut summaries, |h| h.revenue);
    summaries.truncate(TOP_HOURS);
    summaries
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn statuses(entries: &[DashboardEntry]) -> Vec<StatusCount> {
    let mut buckets: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        let key = entry.status.map_or(PENDING_STATUS, |s| s.as_str());
        *buckets.entry(key).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: status.to_string(),
            label: capitalize(status),
            count,
        })
        .collect()
}

pub fn metrics(entries: &[DashboardEntry], now: NaiveDateTime) -> Metrics {
    let week_start = now - Duration::days(DAILY_WINDOW_DAYS);
    let mut metrics = Metrics {
        total: entries.len(),
        ..Metrics::default()
    };
    let mut per_customer: HashMap<&str, usize> = HashMap::new();

    for entry in entries.iter().filter(|e| e.is_completed()) {
        let price = entry.revenue();
        metrics.completed += 1;
        metrics.total_revenue += price;

        if let Some(start) = entry.start_at {
            if start.year() == now.year() && start.month() == now.month() {
                metrics.month_revenue += price;
            }
            if start >= week_start {
                metrics.week_revenue += price;
            }
        }
        if let Some(customer) = entry.customer_id.as_deref() {
            *per_customer.entry(customer).or_default() += 1;
        }
    }

    metrics.loyal_customers = per_customer.values().filter(|&&n| n > 1).count();
    if metrics.total > 0 {
        metrics.completion_rate = metrics.completed as f64 / metrics.total as f64 * 100.0;
    }
    metrics
}

/// Completed revenue of the six most recent months that have any, newest
/// first.
pub fn monthly(entries: &[DashboardEntry]) -> Vec<MonthlyRevenue> {
    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.is_completed()) {
        let Some(start) = entry.start_at else {
            continue;
        };
        *buckets.entry((start.year(), start.month())).or_default() += entry.revenue();
    }

    let mut report: Vec<MonthlyRevenue> = buckets
        .into_iter()
        .rev()
        .take(MONTHS_IN_REPORT)
        .map(|((year, month), revenue)| MonthlyRevenue {
            year,
            month,
            label: format!("{month}/{year}"),
            revenue,
            growth: 0.0,
        })
        .collect();

    for i in 1..report.len() {
        let previous = report[i - 1].revenue;
        if previous > 0.0 {
            report[i].growth = (report[i].revenue - previous) / previous * 100.0;
        }
    }
    report
}
