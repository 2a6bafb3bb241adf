use std::collections::VecDeque;

use crate::probe::ProbeOutcome;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    outcomes: VecDeque<ProbeOutcome>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outcomes: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, outcome: ProbeOutcome) {
        self.outcomes.push_back(outcome);
        while self.outcomes.len() > self.capacity {
            self.outcomes.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.reachable).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.reachable).count()
    }

    pub fn is_saturated(&self) -> bool {
        self.capacity > 0 && self.successes() == self.capacity
    }

    pub fn results(&self) -> Vec<bool> {
        self.outcomes.iter().map(|o| o.reachable).collect()
    }

    pub fn response_times(&self) -> Vec<f64> {
        self.outcomes
            .iter()
            .filter(|o| o.reachable)
            .filter_map(|o| o.response_time_ms)
            .collect()
    }

    pub fn average_response_time(&self) -> f64 {
        let times = self.response_times();
        if times.is_empty() {
            return 0.0;
        }
        times.iter().sum::<f64>() / times.len() as f64
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.outcomes.iter()
    }
}
