// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Host CPU and memory sampling.
//!
//! Reads `/proc/stat` and `/proc/meminfo` on Linux. On other platforms, or
//! when procfs is unavailable, CPU and memory read as zero; uptime is always
//! reported.

use std::fs;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Host and process values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// CPU usage since the previous sample, in percent.
    pub cpu_usage: f64,
    /// Used memory, in percent of total.
    pub memory_usage: f64,
    /// Total memory in bytes.
    pub total_memory: u64,
    /// Available memory in bytes.
    pub free_memory: u64,
    /// Process uptime in seconds.
    pub uptime: f64,
}

#[derive(Debug, Clone, Copy)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

/// Samples [`SystemMetrics`], keeping the previous CPU reading so usage is
/// computed over the interval between samples.
#[derive(Debug)]
pub struct SystemSampler {
    started: Instant,
    previous_cpu: Mutex<Option<CpuTimes>>,
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    /// Creates a sampler; uptime is measured from this call.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            previous_cpu: Mutex::new(None),
        }
    }

    /// Takes a sample.
    pub fn sample(&self) -> SystemMetrics {
        let (total_memory, free_memory) = fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|text| parse_meminfo(&text))
            .unwrap_or((0, 0));

        let memory_usage = if total_memory == 0 {
            0.0
        } else {
            (total_memory.saturating_sub(free_memory)) as f64 / total_memory as f64 * 100.0
        };

        SystemMetrics {
            cpu_usage: self.cpu_usage(),
            memory_usage,
            total_memory,
            free_memory,
            uptime: self.started.elapsed().as_secs_f64(),
        }
    }

    fn cpu_usage(&self) -> f64 {
        let Some(current) = fs::read_to_string("/proc/stat")
            .ok()
            .and_then(|text| parse_cpu_line(&text))
        else {
            return 0.0;
        };

        let mut previous = self.previous_cpu.lock();
        let usage = match *previous {
            Some(prev) => usage_between(prev, current),
            None => usage_between(CpuTimes { idle: 0, total: 0 }, current),
        };
        *previous = Some(current);
        usage
    }
}

fn usage_between(prev: CpuTimes, current: CpuTimes) -> f64 {
    let total = current.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let idle = current.idle.saturating_sub(prev.idle);
    (1.0 - idle as f64 / total as f64) * 100.0
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
fn parse_cpu_line(text: &str) -> Option<CpuTimes> {
    let line = text.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        idle,
        total: fields.iter().sum(),
    })
}

/// Returns `(total, available)` in bytes.
fn parse_meminfo(text: &str) -> Option<(u64, u64)> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };

    let total = field("MemTotal:")?;
    let free = field("MemAvailable:").or_else(|| field("MemFree:"))?;
    Some((total, free))
}
