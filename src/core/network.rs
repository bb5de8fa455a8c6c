//! Cell-level aggregate bandwidth pool. Grounded on
//! `original_source/network.py`; shape mirrors the single-counter-per-resource
//! style of `dslab-iaas`'s `ResourcePoolState`.

use crate::error::AllocationVerdict;

#[derive(Debug, Clone)]
pub struct Network {
    total_bandwidth: u64,
    available_bandwidth: u64,
    deployed_tasks: Vec<u64>,
    running_network_util: f64,
}

impl Network {
    pub fn new(total_bandwidth: u64) -> Self {
        Network {
            total_bandwidth,
            available_bandwidth: total_bandwidth,
            deployed_tasks: Vec::new(),
            running_network_util: 0.0,
        }
    }

    pub fn total_bandwidth(&self) -> u64 {
        self.total_bandwidth
    }

    pub fn available_bandwidth(&self) -> u64 {
        self.available_bandwidth
    }

    pub fn probe(&self, bw: u64) -> bool {
        self.available_bandwidth >= bw
    }

    pub fn deploy(&mut self, task_id: u64, bw: u64) -> AllocationVerdict {
        if !self.probe(bw) {
            return AllocationVerdict::ProbeFail;
        }
        self.available_bandwidth -= bw;
        self.deployed_tasks.push(task_id);
        AllocationVerdict::Success
    }

    pub fn unload(&mut self, task_id: u64, bw: u64) -> AllocationVerdict {
        if let Some(pos) = self.deployed_tasks.iter().position(|&t| t == task_id) {
            self.deployed_tasks.remove(pos);
        } else {
            return AllocationVerdict::NotDeployed;
        }
        self.available_bandwidth += bw;
        AllocationVerdict::Success
    }

    pub fn initialize_running_quantities(&mut self) {
        self.running_network_util = 0.0;
    }

    pub fn increment_running_quantities(&mut self, dn: f64) {
        self.running_network_util += dn;
    }

    pub fn running_network_util(&self) -> f64 {
        self.running_network_util
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_and_unload_round_trip() {
        let mut net = Network::new(10);
        assert!(net.probe(1));
        assert_eq!(net.deploy(7, 1), AllocationVerdict::Success);
        assert_eq!(net.available_bandwidth(), 9);
        assert_eq!(net.unload(7, 1), AllocationVerdict::Success);
        assert_eq!(net.available_bandwidth(), 10);
    }

    #[test]
    fn deploy_rejects_when_exhausted() {
        let mut net = Network::new(1);
        assert_eq!(net.deploy(1, 2), AllocationVerdict::ProbeFail);
    }
}
