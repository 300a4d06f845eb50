//! Bounded alert history
//!
//! One global FIFO ring shared by every subject; filtering by subject
//! happens at read time. Not synchronized itself: the hub owns it behind
//! the same lock as the connection registry.

use std::collections::VecDeque;

use tokenguard_core::Alert;

pub struct AlertBuffer {
    capacity: usize,
    alerts: VecDeque<Alert>,
}

impl AlertBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            alerts: VecDeque::with_capacity(capacity),
        }
    }

    /// Append, evicting the oldest alert when full
    pub fn push(&mut self, alert: Alert) -> Option<Alert> {
        let evicted = if self.alerts.len() >= self.capacity {
            self.alerts.pop_front()
        } else {
            None
        };
        self.alerts.push_back(alert);
        evicted
    }

    /// Alerts for `subject_id`, oldest first
    pub fn for_subject(&self, subject_id: &str) -> Vec<Alert> {
        self.alerts
            .iter()
            .filter(|a| a.subject_id == subject_id)
            .cloned()
            .collect()
    }

    /// Up to `limit` alerts for `subject_id`, most recent first
    pub fn recent_for(&self, subject_id: &str, limit: usize) -> Vec<Alert> {
        self.alerts
            .iter()
            .rev()
            .filter(|a| a.subject_id == subject_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
