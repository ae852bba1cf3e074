use std::fmt;

use anyhow::anyhow;
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::clock::{hhmm_serde, task_window};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Self::Low),
            "m" | "med" | "medium" => Ok(Self::Medium),
            "h" | "high" => Ok(Self::High),
            other => Err(anyhow!(
                "invalid priority: {other} (expected low, medium, or high)"
            )),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Active,
    Overdue,
    Completed,
}

impl Status {
    // The window is anchored to the date component of `now`, never to the
    // day the task was created.
    pub fn resolve(start: NaiveTime, duration: u32, completed: bool, now: NaiveDateTime) -> Self {
        if completed {
            return Self::Completed;
        }

        let (begin, end) = task_window(start, duration, now.date());
        if now < begin {
            Self::Pending
        } else if now < end {
            Self::Active
        } else {
            Self::Overdue
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Overdue => "overdue",
            Self::Completed => "completed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,

    pub name: String,

    #[serde(default)]
    pub note: Option<String>,

    #[serde(with = "hhmm_serde")]
    pub start: NaiveTime,

    pub duration: u32,

    pub priority: Priority,

    pub completed: bool,
}

impl Task {
    pub fn new(
        name: String,
        note: Option<String>,
        start: NaiveTime,
        duration: u32,
        priority: Priority,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            id: now.timestamp_millis() as u64,
            name,
            note,
            start,
            duration,
            priority,
            completed: false,
        }
    }

    pub fn status_at(&self, now: NaiveDateTime) -> Status {
        Status::resolve(self.start, self.duration, self.completed, now)
    }
}
