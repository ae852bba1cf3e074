use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Task;

const SNAPSHOT_FILE: &str = "tasks.data";

// Owns the in-memory collection; the snapshot file is a mirror that is
// rewritten atomically after every mutation.
#[derive(Debug)]
pub struct Store {
    pub data_dir: PathBuf,
    snapshot_path: PathBuf,
    tasks: Vec<Task>,
}

impl Store {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let snapshot_path = data_dir.join(SNAPSHOT_FILE);
        if !snapshot_path.exists() {
            fs::write(&snapshot_path, "")?;
        }

        let tasks = load_snapshot(&snapshot_path)?;
        info!(
            data_dir = %data_dir.display(),
            snapshot = %snapshot_path.display(),
            tasks = tasks.len(),
            "opened store"
        );

        Ok(Self {
            data_dir,
            snapshot_path,
            tasks,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    #[tracing::instrument(skip(self, task), fields(id = task.id))]
    pub fn append(&mut self, mut task: Task) -> anyhow::Result<u64> {
        // Ids come from the creation instant; bump on the rare same-tick
        // collision to keep them unique.
        while self.tasks.iter().any(|existing| existing.id == task.id) {
            task.id += 1;
        }

        let id = task.id;
        self.tasks.push(task);
        self.persist()?;
        debug!(id, count = self.tasks.len(), "task appended");
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: u64) -> anyhow::Result<Task> {
        let idx = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| anyhow!("no task with id {id}"))?;

        let removed = self.tasks.remove(idx);
        self.persist()?;
        debug!(id, count = self.tasks.len(), "task removed");
        Ok(removed)
    }

    // One-way: completing an already-completed task is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn mark_completed(&mut self, id: u64) -> anyhow::Result<bool> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("no task with id {id}"))?;

        if task.completed {
            return Ok(false);
        }
        task.completed = true;

        self.persist()?;
        debug!(id, "task completed");
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&mut self) -> anyhow::Result<usize> {
        let removed = self.tasks.len();
        self.tasks.clear();
        self.persist()?;
        info!(removed, "cleared all tasks");
        Ok(removed)
    }

    fn persist(&self) -> anyhow::Result<()> {
        save_snapshot_atomic(&self.snapshot_path, &self.tasks)
            .with_context(|| format!("failed to save {}", self.snapshot_path.display()))
    }
}

#[tracing::instrument(skip(path))]
fn load_snapshot(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading snapshot");
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from snapshot");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_snapshot_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving snapshot atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
