use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single unread notification, as reported by the daemon's `list` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body: String,
    pub application: String,
    #[serde(default)]
    pub urgency: i64,
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Unread notifications grouped by application.
/// Maps the name of the application to the number of notifications it has pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notifications(HashMap<String, usize>);

impl Notifications {
    /// Total number of unread notifications across all applications.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Number of unread notifications for the given application, 0 if it has none.
    pub fn count(&self, application: &str) -> usize {
        self.0.get(application).copied().unwrap_or_default()
    }

    /// All applications with their counts, sorted by application name.
    pub fn apps(&self) -> Vec<(&str, usize)> {
        let mut apps: Vec<_> = self.0.iter().map(|(app, count)| (app.as_str(), *count)).collect();
        apps.sort_unstable();
        apps
    }
}

impl<'a> FromIterator<&'a Notification> for Notifications {
    fn from_iter<I: IntoIterator<Item = &'a Notification>>(iter: I) -> Self {
        let mut counts = HashMap::new();
        for notification in iter {
            *counts.entry(notification.application.clone()).or_insert(0) += 1;
        }
        Notifications(counts)
    }
}

impl From<HashMap<String, usize>> for Notifications {
    fn from(counts: HashMap<String, usize>) -> Self {
        Notifications(counts)
    }
}
