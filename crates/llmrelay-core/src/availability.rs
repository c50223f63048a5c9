//! Availability snapshots and connection test results

use crate::backend::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Immutable availability map for every backend, stamped with its completion time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    availability: BTreeMap<Backend, bool>,
    taken_at: DateTime<Utc>,
}

impl AvailabilitySnapshot {
    pub fn new(availability: BTreeMap<Backend, bool>, taken_at: DateTime<Utc>) -> Self {
        Self {
            availability,
            taken_at,
        }
    }

    /// Snapshot in which every backend is unavailable (nothing probed yet)
    pub fn unprobed() -> Self {
        Self::new(
            Backend::ALL.into_iter().map(|b| (b, false)).collect(),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    /// Whether `backend` was available; backends missing from the map are not
    pub fn is_available(&self, backend: Backend) -> bool {
        self.availability.get(&backend).copied().unwrap_or(false)
    }

    /// Available backends in declaration order
    pub fn available(&self) -> Vec<Backend> {
        self.availability
            .iter()
            .filter(|(_, up)| **up)
            .map(|(backend, _)| *backend)
            .collect()
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn iter(&self) -> impl Iterator<Item = (Backend, bool)> + '_ {
        self.availability.iter().map(|(b, up)| (*b, *up))
    }

    pub fn len(&self) -> usize {
        self.availability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.availability.is_empty()
    }
}

/// A backend whose availability flipped between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityChange {
    pub backend: Backend,
    pub now_available: bool,
}

impl AvailabilityChange {
    pub fn status_label(&self) -> &'static str {
        if self.now_available {
            "Online"
        } else {
            "Offline"
        }
    }
}

/// Outcome of the last diagnostic connection test for a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub response_time: Option<Duration>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionTestResult {
    pub fn passed(response_time: Duration) -> Self {
        Self {
            success: true,
            response_time: Some(response_time),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response_time: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}
