use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Deserialize;

const REFRESH_CONFIG_FILE: &str = "dayplan-refresh.toml";
const REFRESH_ENV_VAR: &str = "DAYPLAN_REFRESH";
const REFRESH_CONFIG_ENV_VAR: &str = "DAYPLAN_REFRESH_CONFIG";
const DEFAULT_CLOCK_SECONDS: u64 = 1;
const DEFAULT_STATUS_SECONDS: u64 = 60;

pub fn parse_start_time(raw: &str) -> anyhow::Result<NaiveTime> {
    static HHMM: OnceLock<Regex> = OnceLock::new();
    let pattern = HHMM.get_or_init(|| {
        Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("static pattern compiles")
    });

    let trimmed = raw.trim();
    if !pattern.is_match(trimmed) {
        return Err(anyhow!(
            "invalid start time: {raw} (expected zero-padded HH:MM)"
        ));
    }

    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .map_err(|err| anyhow!("invalid start time {raw}: {err}"))
}

pub fn task_window(
    start: NaiveTime,
    duration_minutes: u32,
    day: NaiveDate,
) -> (NaiveDateTime, NaiveDateTime) {
    let begin = day.and_time(start);
    let end = begin + chrono::Duration::minutes(i64::from(duration_minutes));
    (begin, end)
}

pub fn format_clock(now: NaiveDateTime) -> String {
    now.format("%A %Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct Refresh {
    pub clock: Duration,
    pub status: Duration,
}

impl Refresh {
    fn defaults() -> Self {
        Self {
            clock: Duration::from_secs(DEFAULT_CLOCK_SECONDS),
            status: Duration::from_secs(DEFAULT_STATUS_SECONDS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshConfig {
    clock_seconds: Option<u64>,
    status_seconds: Option<u64>,
    refresh: Option<RefreshSection>,
}

#[derive(Debug, Deserialize)]
struct RefreshSection {
    clock_seconds: Option<u64>,
    status_seconds: Option<u64>,
}

pub fn refresh() -> &'static Refresh {
    static REFRESH: OnceLock<Refresh> = OnceLock::new();
    REFRESH.get_or_init(resolve_refresh)
}

fn resolve_refresh() -> Refresh {
    if let Ok(raw) = std::env::var(REFRESH_ENV_VAR) {
        match parse_refresh_spec(&raw) {
            Ok(refresh) => {
                tracing::info!(
                    source = REFRESH_ENV_VAR,
                    clock_seconds = refresh.clock.as_secs(),
                    status_seconds = refresh.status.as_secs(),
                    "configured watch cadence"
                );
                return refresh;
            }
            Err(err) => {
                tracing::error!(
                    source = REFRESH_ENV_VAR,
                    error = %err,
                    "failed to parse refresh spec; ignoring"
                );
            }
        }
    }

    if let Some(path) = refresh_config_path()
        && let Some(refresh) = load_refresh_from_file(&path)
    {
        return refresh;
    }

    Refresh::defaults()
}

fn refresh_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(REFRESH_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(REFRESH_CONFIG_FILE))
}

fn load_refresh_from_file(path: &PathBuf) -> Option<Refresh> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "refresh config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed reading refresh config file"
            );
            return None;
        }
    };

    let parsed = match toml::from_str::<RefreshConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed parsing refresh config file"
            );
            return None;
        }
    };

    let section = parsed.refresh;
    let clock_seconds = parsed
        .clock_seconds
        .or_else(|| section.as_ref().and_then(|s| s.clock_seconds))
        .unwrap_or(DEFAULT_CLOCK_SECONDS);
    let status_seconds = parsed
        .status_seconds
        .or_else(|| section.as_ref().and_then(|s| s.status_seconds))
        .unwrap_or(DEFAULT_STATUS_SECONDS);

    if clock_seconds == 0 || status_seconds == 0 {
        tracing::error!(
            file = %path.display(),
            "refresh intervals must be positive; ignoring file"
        );
        return None;
    }

    tracing::info!(
        file = %path.display(),
        clock_seconds,
        status_seconds,
        "configured watch cadence"
    );
    Some(Refresh {
        clock: Duration::from_secs(clock_seconds),
        status: Duration::from_secs(status_seconds),
    })
}

fn parse_refresh_spec(raw: &str) -> anyhow::Result<Refresh> {
    let trimmed = raw.trim();
    let (clock_raw, status_raw) = trimmed
        .split_once('/')
        .ok_or_else(|| anyhow!("expected CLOCK/STATUS seconds, got: {raw}"))?;

    let clock: u64 = clock_raw.trim().parse()?;
    let status: u64 = status_raw.trim().parse()?;
    if clock == 0 || status == 0 {
        return Err(anyhow!("refresh intervals must be positive: {raw}"));
    }

    Ok(Refresh {
        clock: Duration::from_secs(clock),
        status: Duration::from_secs(status),
    })
}

pub mod hhmm_serde {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{parse_refresh_spec, parse_start_time, task_window};

    #[test]
    fn accepts_zero_padded_clock_times() {
        let parsed = parse_start_time("09:05").expect("parse");
        assert_eq!(parsed, NaiveTime::from_hms_opt(9, 5, 0).expect("time"));

        let midnight = parse_start_time("00:00").expect("parse");
        assert_eq!(midnight, NaiveTime::from_hms_opt(0, 0, 0).expect("time"));

        let last = parse_start_time("23:59").expect("parse");
        assert_eq!(last, NaiveTime::from_hms_opt(23, 59, 0).expect("time"));
    }

    #[test]
    fn rejects_unpadded_or_out_of_range_times() {
        for raw in ["9:05", "24:00", "12:60", "noon", "12", "12:5", ""] {
            assert!(parse_start_time(raw).is_err(), "should reject {raw:?}");
        }
    }

    #[test]
    fn window_is_start_plus_duration() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 6).expect("date");
        let start = NaiveTime::from_hms_opt(10, 0, 0).expect("time");
        let (begin, end) = task_window(start, 30, day);

        assert_eq!(begin, day.and_time(start));
        assert_eq!(end - begin, chrono::Duration::minutes(30));
    }

    #[test]
    fn window_crosses_midnight_within_the_same_anchor_day() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 6).expect("date");
        let start = NaiveTime::from_hms_opt(23, 0, 0).expect("time");
        let (begin, end) = task_window(start, 90, day);

        assert_eq!(end.date(), day.succ_opt().expect("next day"));
        assert_eq!(end - begin, chrono::Duration::minutes(90));
        assert_eq!(
            end.time(),
            NaiveTime::from_hms_opt(0, 30, 0).expect("time")
        );
    }

    #[test]
    fn refresh_spec_parses_and_validates() {
        let refresh = parse_refresh_spec("2/30").expect("parse");
        assert_eq!(refresh.clock.as_secs(), 2);
        assert_eq!(refresh.status.as_secs(), 30);

        assert!(parse_refresh_spec("0/30").is_err());
        assert!(parse_refresh_spec("5").is_err());
        assert!(parse_refresh_spec("a/b").is_err());
    }
}
