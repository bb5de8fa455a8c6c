//! Per-(cell, hardware-type) running counters plus timestep snapshots.
//! POD record with a dedicated snapshot method, per spec.md §9's "dynamic
//! attributes" design note; shape grounded on `dslab-iaas`'s `HostState`
//! (`core::monitoring`) and `original_source/statistics.py`.

use serde::{Deserialize, Serialize};

/// One appended row of the results stream for a (cell, hw type) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(rename = "Time Step")]
    pub time_step: u64,
    #[serde(rename = "Active Servers")]
    pub active_servers: u64,
    #[serde(rename = "Running VMs")]
    pub running_vms: u64,
    #[serde(rename = "Total Number of accepted Tasks")]
    pub accepted_tasks: u64,
    #[serde(rename = "Total Number of rejected Tasks")]
    pub rejected_tasks: u64,
    #[serde(rename = "Total Energy Consumption")]
    pub total_energy_gwh: f64,

    #[serde(rename = "Available Processors")]
    pub available_processors: u64,
    #[serde(rename = "Utilized Processors")]
    pub utilized_processors: u64,
    #[serde(rename = "Total Processors")]
    pub total_processors: u64,
    #[serde(rename = "Actual Utilized Processors")]
    pub actual_utilized_processors: f64,
    #[serde(rename = "Utilized Processors over Active Servers")]
    pub utilized_processors_over_active_servers: f64,

    #[serde(rename = "Available Memory")]
    pub available_memory: u64,
    #[serde(rename = "Utilized Memory")]
    pub utilized_memory: u64,
    #[serde(rename = "Total Memory")]
    pub total_memory: u64,
    #[serde(rename = "Actual Utilized Memory")]
    pub actual_utilized_memory: f64,

    #[serde(rename = "Available Storage")]
    pub available_storage: u64,
    #[serde(rename = "Utilized Storage")]
    pub utilized_storage: u64,
    #[serde(rename = "Total Storage")]
    pub total_storage: u64,
    #[serde(rename = "Actual Utilized Storage")]
    pub actual_utilized_storage: f64,

    #[serde(rename = "Available Accelerators")]
    pub available_accelerators: u64,
    #[serde(rename = "Utilized Accelerators")]
    pub utilized_accelerators: u64,
    #[serde(rename = "Total Accelerators")]
    pub total_accelerators: u64,
    #[serde(rename = "Actual Rho Accelerators")]
    pub actual_rho_accelerators: f64,

    #[serde(rename = "Available Network")]
    pub available_network: u64,
    #[serde(rename = "Total Network")]
    pub total_network: u64,
    #[serde(rename = "Running Network Util")]
    pub running_network_util: f64,
}

/// Live counters accumulated across a simulation run for one (cell, hw
/// type) pair, and the source of each appended `StatsSnapshot`.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub accepted_tasks: u64,
    pub rejected_tasks: u64,
    pub total_energy_gwh: f64,
    pub snapshots: Vec<StatsSnapshot>,
}

impl Statistics {
    pub fn record_accept(&mut self) {
        self.accepted_tasks += 1;
    }

    pub fn record_reject(&mut self) {
        self.rejected_tasks += 1;
    }

    pub fn add_energy(&mut self, gwh: f64) {
        self.total_energy_gwh += gwh;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append_snapshot(
        &mut self,
        time_step: u64,
        active_servers: u64,
        running_vms: u64,
        available_processors: u64,
        total_processors: u64,
        actual_utilized_processors: f64,
        available_memory: u64,
        total_memory: u64,
        actual_utilized_memory: f64,
        available_storage: u64,
        total_storage: u64,
        actual_utilized_storage: f64,
        available_accelerators: u64,
        total_accelerators: u64,
        actual_rho_accelerators: f64,
        available_network: u64,
        total_network: u64,
        running_network_util: f64,
    ) {
        let utilized_processors = total_processors.saturating_sub(available_processors);
        let utilized_memory = total_memory.saturating_sub(available_memory);
        let utilized_storage = total_storage.saturating_sub(available_storage);
        let utilized_accelerators = total_accelerators.saturating_sub(available_accelerators);
        let utilized_processors_over_active_servers = if active_servers > 0 {
            utilized_processors as f64 / active_servers as f64
        } else {
            0.0
        };

        self.snapshots.push(StatsSnapshot {
            time_step,
            active_servers,
            running_vms,
            accepted_tasks: self.accepted_tasks,
            rejected_tasks: self.rejected_tasks,
            total_energy_gwh: self.total_energy_gwh,
            available_processors,
            utilized_processors,
            total_processors,
            actual_utilized_processors,
            utilized_processors_over_active_servers,
            available_memory,
            utilized_memory,
            total_memory,
            actual_utilized_memory,
            available_storage,
            utilized_storage,
            total_storage,
            actual_utilized_storage,
            available_accelerators,
            utilized_accelerators,
            total_accelerators,
            actual_rho_accelerators,
            available_network,
            total_network,
            running_network_util,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_derives_utilized_from_available_and_total() {
        let mut stats = Statistics::default();
        stats.record_accept();
        stats.add_energy(1.5);
        stats.append_snapshot(10, 1, 2, 2, 4, 2.0, 8, 16, 8.0, 0, 0, 0.0, 0, 0, 0.0, 9, 10, 1.0);
        let snap = &stats.snapshots[0];
        assert_eq!(snap.utilized_processors, 2);
        assert_eq!(snap.accepted_tasks, 1);
        assert!((snap.total_energy_gwh - 1.5).abs() < 1e-12);
    }
}
