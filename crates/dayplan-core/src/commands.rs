use std::io::{self, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local, NaiveTime};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::clock::parse_start_time;
use crate::config::Config;
use crate::render::Renderer;
use crate::store::Store;
use crate::task::{Priority, Status, Task};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "done", "delete", "clear", "watch", "export", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut Store,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Local::now();
    let command = inv.command.as_str();

    debug!(command, args = ?inv.args, "dispatching command");

    match command {
        "add" => cmd_add(store, cfg, renderer, &inv.args, now),
        "list" => cmd_list(store, renderer, now),
        "done" => cmd_done(store, renderer, &inv.args, now),
        "delete" => cmd_delete(store, cfg, renderer, &inv.args, now),
        "clear" => cmd_clear(store, cfg, renderer, now),
        "watch" => crate::watch::run_watch(store, renderer),
        "export" => cmd_export(store),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mod {
    Start(NaiveTime),
    Duration(u32),
    Priority(Priority),
    Note(String),
}

fn parse_one_mod(tok: &str) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':').or_else(|| tok.split_once('=')) else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "at" | "start" => Ok(Some(Mod::Start(parse_start_time(value)?))),
        "for" | "dur" | "duration" => {
            let minutes: u32 = value
                .parse()
                .with_context(|| format!("invalid duration: {value}"))?;
            if minutes == 0 {
                return Err(anyhow!("duration must be a positive number of minutes"));
            }
            Ok(Some(Mod::Duration(minutes)))
        }
        "pri" | "priority" => Ok(Some(Mod::Priority(value.parse()?))),
        "note" => Ok(Some(Mod::Note(value.to_string()))),
        _ => Ok(None),
    }
}

fn parse_name_and_mods(args: &[String]) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut name_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg)? {
            mods.push(one_mod);
            continue;
        }

        name_parts.push(arg.clone());
    }

    if name_parts.is_empty() {
        return Err(anyhow!("add: task name is required"));
    }

    Ok((name_parts.join(" "), mods))
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_add(
    store: &mut Store,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Local>,
) -> anyhow::Result<()> {
    info!("command add");

    let (name, mods) = parse_name_and_mods(args)?;

    let mut start = None;
    let mut duration = None;
    let mut priority = Priority::Medium;
    let mut note = None;
    for one_mod in mods {
        match one_mod {
            Mod::Start(value) => start = Some(value),
            Mod::Duration(value) => duration = Some(value),
            Mod::Priority(value) => priority = value,
            Mod::Note(value) => note = Some(value),
        }
    }

    let start = start.ok_or_else(|| anyhow!("add: start time is required (at:HH:MM)"))?;
    let duration = duration.ok_or_else(|| anyhow!("add: duration is required (for:MINUTES)"))?;

    let task = Task::new(name, note, start, duration, priority, now);

    if task.status_at(now.naive_local()) == Status::Overdue {
        warn!(start = %start, duration, "new task is already past its end");
        if !confirm(cfg, "This task would already be overdue. Add it anyway?")? {
            println!("Task not added.");
            return Ok(());
        }
    }

    let id = store.append(task)?;
    println!("Created task {id}.");
    render_now(store, renderer, now)
}

#[instrument(skip(store, renderer, now))]
fn cmd_list(store: &Store, renderer: &Renderer, now: DateTime<Local>) -> anyhow::Result<()> {
    info!("command list");
    render_now(store, renderer, now)
}

#[instrument(skip(store, renderer, args, now))]
fn cmd_done(
    store: &mut Store,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Local>,
) -> anyhow::Result<()> {
    info!("command done");

    let id = parse_id_arg(args, "done")?;
    if store.mark_completed(id)? {
        println!("Completed task {id}.");
    } else {
        println!("Task {id} is already completed.");
    }
    render_now(store, renderer, now)
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_delete(
    store: &mut Store,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Local>,
) -> anyhow::Result<()> {
    info!("command delete");

    let id = parse_id_arg(args, "delete")?;
    let name = store
        .get(id)
        .map(|task| task.name.clone())
        .ok_or_else(|| anyhow!("no task with id {id}"))?;

    let question = format!("Permanently delete task {id} ({name})?");
    if !confirm(cfg, &question)? {
        println!("Task not deleted.");
        return Ok(());
    }

    store.remove(id)?;
    println!("Deleted task {id}.");
    render_now(store, renderer, now)
}

#[instrument(skip(store, cfg, renderer, now))]
fn cmd_clear(
    store: &mut Store,
    cfg: &Config,
    renderer: &Renderer,
    now: DateTime<Local>,
) -> anyhow::Result<()> {
    info!("command clear");

    let count = store.tasks().len();
    if count == 0 {
        println!("No tasks to clear.");
        return Ok(());
    }

    let question = format!("Permanently delete all {count} task(s)?");
    if !confirm(cfg, &question)? {
        println!("Tasks not cleared.");
        return Ok(());
    }

    let removed = store.clear()?;
    println!("Cleared {removed} task(s).");
    render_now(store, renderer, now)
}

#[instrument(skip(store))]
fn cmd_export(store: &Store) -> anyhow::Result<()> {
    info!("command export");

    let out = serde_json::to_string(store.tasks())?;
    println!("{out}");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: add, list, done, delete, clear, watch, export, help, version"
    );
    Ok(())
}

fn parse_id_arg(args: &[String], command: &str) -> anyhow::Result<u64> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("{command}: task id is required"))?;
    raw.parse()
        .with_context(|| format!("{command}: invalid task id: {raw}"))
}

fn confirm(cfg: &Config, question: &str) -> anyhow::Result<bool> {
    if !cfg.get_bool("confirmation").unwrap_or(true) {
        debug!("confirmation disabled; proceeding");
        return Ok(true);
    }

    print!("{question} (yes/no) ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation answer")?;

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn render_now(store: &Store, renderer: &Renderer, now: DateTime<Local>) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    renderer.render_dashboard(&mut out, store.tasks(), now.naive_local())
}
