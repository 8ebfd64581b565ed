use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;

use crate::error::Result;
use crate::models::{AgentRun, RunStatus};

/// Agent run history.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init_db()?;
        Ok(storage)
    }

    fn init_db(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY,
                prompt TEXT NOT NULL,
                model TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                status TEXT NOT NULL,
                output TEXT NOT NULL,
                messages_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);
            "#,
        )?;

        Ok(())
    }

    pub fn save_run(&self, run: &AgentRun) -> Result<i64> {
        let messages_json = serde_json::to_string(&run.messages)?;
        self.conn.execute(
            r#"
            INSERT INTO runs (prompt, model, started_at, finished_at, status, output, messages_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                run.prompt,
                run.model,
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
                run.status.to_string(),
                run.output,
                messages_json,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_run(&self, id: i64) -> Result<Option<AgentRun>> {
        let result = self.conn.query_row(
            r#"
            SELECT id, prompt, model, started_at, finished_at, status, output, messages_json
            FROM runs
            WHERE id = ?1
            "#,
            params![id],
            read_run,
        );

        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<AgentRun>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, prompt, model, started_at, finished_at, status, output, messages_json
            FROM runs
            ORDER BY started_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let runs = stmt.query_map(params![limit as i64], read_run)?;
        runs.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn read_run(row: &Row<'_>) -> rusqlite::Result<AgentRun> {
    let status: String = row.get(5)?;
    let messages_json: String = row.get(7)?;

    Ok(AgentRun {
        id: Some(row.get(0)?),
        prompt: row.get(1)?,
        model: row.get(2)?,
        started_at: parse_timestamp(&row.get::<_, String>(3)?),
        finished_at: parse_timestamp(&row.get::<_, String>(4)?),
        status: RunStatus::from(status.as_str()),
        output: row.get(6)?,
        messages: serde_json::from_str(&messages_json).unwrap_or_default(),
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
