use std::io::{self, Write};
use std::time::Instant;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{cursor, execute};
use tracing::{info, instrument};

use crate::clock;
use crate::render::Renderer;
use crate::store::Store;
use crate::task::Status;

#[instrument(skip(store, renderer))]
pub fn run_watch(store: &Store, renderer: &Renderer) -> anyhow::Result<()> {
    let refresh = clock::refresh();
    info!(
        clock_seconds = refresh.clock.as_secs(),
        status_seconds = refresh.status.as_secs(),
        "entering watch mode"
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let result = watch_loop(store, renderer, refresh);

    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen, cursor::Show)?;
    result
}

fn watch_loop(store: &Store, renderer: &Renderer, refresh: &clock::Refresh) -> anyhow::Result<()> {
    let mut last_sweep = Instant::now();
    sweep_overdue(store);

    loop {
        let now = Local::now().naive_local();

        let mut frame = Vec::new();
        renderer.render_dashboard(&mut frame, store.tasks(), now)?;
        frame.extend_from_slice(b"\npress q to quit\n");

        let mut out = io::stdout();
        execute!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        // raw mode: bare newlines do not return the carriage
        let text = String::from_utf8_lossy(&frame).replace('\n', "\r\n");
        out.write_all(text.as_bytes())?;
        out.flush()?;

        if last_sweep.elapsed() >= refresh.status {
            sweep_overdue(store);
            last_sweep = Instant::now();
        }

        if event::poll(refresh.clock)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                _ => {}
            }
        }
    }

    Ok(())
}

fn sweep_overdue(store: &Store) {
    let now = Local::now().naive_local();
    let overdue = store
        .tasks()
        .iter()
        .filter(|task| task.status_at(now) == Status::Overdue)
        .count();
    if overdue > 0 {
        info!(overdue, "open tasks past their end time");
    }
}
