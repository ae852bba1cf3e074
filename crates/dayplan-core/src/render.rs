use std::cmp::Reverse;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;

use crate::clock::{format_clock, task_window};
use crate::config::Config;
use crate::task::{Status, Task};

const OPEN_HEADERS: [&str; 8] = ["ID", "Start", "End", "Dur", "Pri", "Status", "Name", "Note"];
const COMPLETED_HEADERS: [&str; 5] = ["ID", "Start", "End", "Pri", "Name"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

// Stable: equal-priority tasks keep their relative order before the
// start-time tiebreak.
pub fn sort_for_display(tasks: &mut [&Task]) {
    tasks.sort_by_key(|task| (Reverse(task.priority.rank()), task.start));
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let enabled = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: enabled && io::stdout().is_terminal(),
        })
    }

    // Full rebuild of both tables; there is no partial update path.
    #[tracing::instrument(skip(self, out, tasks, now))]
    pub fn render_dashboard<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        now: NaiveDateTime,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", format_clock(now))?;
        writeln!(out)?;

        let mut open: Vec<&Task> = tasks.iter().filter(|task| !task.completed).collect();
        let mut completed: Vec<&Task> = tasks.iter().filter(|task| task.completed).collect();
        sort_for_display(&mut open);
        sort_for_display(&mut completed);

        writeln!(out, "Open tasks")?;
        if open.is_empty() {
            writeln!(out, "(none)")?;
        } else {
            let rows: Vec<Vec<String>> = open
                .iter()
                .map(|task| self.open_row(task, now))
                .collect();
            write_table(&mut *out, &OPEN_HEADERS, rows)?;
        }

        writeln!(out)?;
        writeln!(out, "Completed tasks")?;
        if completed.is_empty() {
            writeln!(out, "(none)")?;
        } else {
            let rows: Vec<Vec<String>> = completed
                .iter()
                .map(|task| self.completed_row(task, now))
                .collect();
            write_table(&mut *out, &COMPLETED_HEADERS, rows)?;
        }

        Ok(())
    }

    fn open_row(&self, task: &Task, now: NaiveDateTime) -> Vec<String> {
        let status = task.status_at(now);
        let status_cell = match status {
            Status::Active => self.paint(&status.to_string(), "32"),
            Status::Overdue => self.paint(&status.to_string(), "31"),
            Status::Pending | Status::Completed => status.to_string(),
        };

        vec![
            self.paint(&task.id.to_string(), "33"),
            task.start.format("%H:%M").to_string(),
            format_end(task, now),
            format!("{}m", task.duration),
            task.priority.to_string(),
            status_cell,
            task.name.clone(),
            task.note.clone().unwrap_or_default(),
        ]
    }

    fn completed_row(&self, task: &Task, now: NaiveDateTime) -> Vec<String> {
        vec![
            self.paint(&task.id.to_string(), "33"),
            task.start.format("%H:%M").to_string(),
            format_end(task, now),
            task.priority.to_string(),
            task.name.clone(),
        ]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn format_end(task: &Task, now: NaiveDateTime) -> String {
    let (_, end) = task_window(task.start, task.duration, now.date());
    let mut cell = end.format("%H:%M").to_string();
    if end.date() > now.date() {
        cell.push_str("+1d");
    }
    cell
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone};

    use super::{sort_for_display, strip_ansi, write_table};
    use crate::task::{Priority, Task};

    fn task(priority: Priority, start: &str) -> Task {
        let now = chrono::Local
            .with_ymd_and_hms(2026, 8, 6, 7, 0, 0)
            .single()
            .expect("valid now");
        Task::new(
            format!("{priority} {start}"),
            None,
            NaiveTime::parse_from_str(start, "%H:%M").expect("valid time"),
            30,
            priority,
            now,
        )
    }

    #[test]
    fn orders_by_priority_desc_then_start_asc() {
        let a = task(Priority::High, "09:00");
        let b = task(Priority::Low, "08:00");
        let c = task(Priority::High, "08:30");

        let mut view: Vec<&Task> = vec![&a, &b, &c];
        sort_for_display(&mut view);

        let names: Vec<&str> = view.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["high 08:30", "high 09:00", "low 08:00"]);
    }

    #[test]
    fn table_pads_columns_to_widest_cell() {
        let rows = vec![
            vec!["1".to_string(), "short".to_string()],
            vec!["22".to_string(), "a longer cell".to_string()],
        ];

        let mut out = Vec::new();
        write_table(&mut out, &["ID", "Name"], rows).expect("write table");
        let text = String::from_utf8(out).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Name          ");
        assert_eq!(lines[1], "-- ------------- ");
        assert_eq!(lines[2], "1  short         ");
        assert_eq!(lines[3], "22 a longer cell ");
    }

    #[test]
    fn ansi_codes_do_not_count_toward_width() {
        assert_eq!(strip_ansi("\x1b[31moverdue\x1b[0m"), "overdue");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
