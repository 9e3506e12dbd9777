// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::collections::{BTreeMap, HashMap};

use common::Dashboard;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// 20 distinct colors for the service bars of the dashboard charts.
const PALETTE: [&str; 20] = [
    "#1f77b4", // Muted blue
    "#ff7f0e", // Orange
    "#2ca02c", // Green
    "#d62728", // Red
    "#9467bd", // Purple
    "#8c564b", // Brown
    "#e377c2", // Pink
    "#7f7f7f", // Grey
    "#bcbd22", // Olive
    "#17becf", // Cyan
    "#aec7e8", // Light blue
    "#ffbb78", // Light orange
    "#98df8a", // Light green
    "#ff9896", // Light red
    "#c5b0d5", // Light purple
    "#c49c94", // Light brown
    "#f7b6d2", // Light pink
    "#c7c7c7", // Light grey
    "#dbdb8d", // Light olive
    "#9edae5", // Light cyan
];

const STATUS_GREEN: &str = "#4CAF50";
const STATUS_ORANGE: &str = "#FF9800";
const STATUS_RED: &str = "#F44336";
const STATUS_GREY: &str = "#A0A0A0";

/// Colors handed out to service names in first-come order.
#[derive(Default)]
pub struct ServicePalette {
    colors: HashMap<String, &'static str>,
    next_color_index: usize,
}

impl ServicePalette {
    /// Returns the color of `service`, assigning the next palette entry the
    /// first time a name is seen. Wraps around once the palette is used up.
    pub fn color_for(&mut self, service: &str) -> &'static str {
        if let Some(color) = self.colors.get(service) {
            return *color;
        }
        let color = PALETTE[self.next_color_index];
        self.colors.insert(service.to_string(), color);
        self.next_color_index = (self.next_color_index + 1) % PALETTE.len();
        color
    }
}

lazy_static! {
    // Process-wide so a service keeps its color across dashboard loads.
    static ref SERVICE_COLORS: RwLock<ServicePalette> = RwLock::new(ServicePalette::default());
}

pub fn service_color(service: &str) -> &'static str {
    if let Some(color) = SERVICE_COLORS.read().colors.get(service) {
        return *color;
    }
    SERVICE_COLORS.write().color_for(service)
}

pub fn status_color(status: &str) -> &'static str {
    match status {
        "confirmed" | "completed" => STATUS_GREEN,
        "pending" => STATUS_ORANGE,
        "cancelled" => STATUS_RED,
        _ => STATUS_GREY,
    }
}

/// Colors of every series in a dashboard, keyed by service name and status.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChartColors {
    pub services: BTreeMap<String, String>,
    pub statuses: BTreeMap<String, String>,
}

pub fn chart_colors(dashboard: &Dashboard) -> ChartColors {
    ChartColors {
        services: dashboard
            .services
            .iter()
            .map(|s| (s.name.clone(), service_color(&s.name).to_string()))
            .collect(),
        statuses: dashboard
            .statuses
            .iter()
            .map(|s| (s.status.clone(), status_color(&s.status).to_string()))
            .collect(),
    }
}
