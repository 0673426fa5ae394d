//! Interaction log: sessions and per-question events in SQLite
//!
//! The engine itself never persists anything; the CLI writes here after
//! each answer so runs can be analysed later.

use crate::error::Result;
use crate::session::AnswerRecord;
use crate::stopping::StopReason;
use crate::types::{AxisRanking, Recommendation};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Open (or create) the log database and apply the schema
pub fn init_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

const SCHEMA: &str = r#"
-- One row per profiling session
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    ranking TEXT NOT NULL,          -- forced-choice order, e.g. 'SIAERC'
    started_at TEXT NOT NULL,
    finished_at TEXT,
    num_tasks INTEGER NOT NULL DEFAULT 0,
    stop_reason TEXT,
    recommendations_json TEXT
);

-- One row per answered task
CREATE TABLE IF NOT EXISTS question_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    step INTEGER NOT NULL,
    question_code TEXT NOT NULL,
    program TEXT NOT NULL,
    answer TEXT NOT NULL,           -- chosen axis code
    feedback TEXT,                  -- 'positive' / 'negative'
    entropy REAL NOT NULL,
    gap REAL NOT NULL,
    vector_json TEXT NOT NULL,
    time_on_task_ms INTEGER,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_events_session ON question_events(session_id, step);
"#;

/// A stored session row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub ranking: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub num_tasks: usize,
    pub stop_reason: Option<String>,
    pub recommendations: Option<Vec<Recommendation>>,
}

/// A stored question event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionEvent {
    pub step: usize,
    pub question_code: String,
    pub program: String,
    pub answer: String,
    pub feedback: Option<String>,
    pub entropy: f64,
    pub gap: f64,
    pub vector: Vec<f64>,
    pub time_on_task_ms: Option<i64>,
}

pub fn insert_session(
    conn: &Connection,
    id: Uuid,
    ranking: &AxisRanking,
    started_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (id, ranking, started_at) VALUES (?1, ?2, ?3)",
        params![id.to_string(), ranking.to_string(), started_at.to_rfc3339()],
    )?;
    Ok(())
}

/// Log one answer and bump the session's task counter
pub fn record_answer(
    conn: &Connection,
    session_id: Uuid,
    record: &AnswerRecord,
    time_on_task_ms: Option<i64>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO question_events
            (session_id, step, question_code, program, answer, feedback,
             entropy, gap, vector_json, time_on_task_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            session_id.to_string(),
            record.step as i64,
            record.question_code,
            record.program,
            record.axis.to_string(),
            record.preference.map(|p| p.as_str()),
            record.entropy,
            record.gap,
            serde_json::to_string(&record.vector)?,
            time_on_task_ms,
        ],
    )?;

    conn.execute(
        "UPDATE sessions SET num_tasks = num_tasks + 1 WHERE id = ?1",
        params![session_id.to_string()],
    )?;
    Ok(())
}

/// Close a session with its stop reason and final ranking
pub fn finish_session(
    conn: &Connection,
    session_id: Uuid,
    stop_reason: Option<StopReason>,
    recommendations: &[Recommendation],
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE sessions
        SET finished_at = ?2, stop_reason = ?3, recommendations_json = ?4
        WHERE id = ?1
        "#,
        params![
            session_id.to_string(),
            Utc::now().to_rfc3339(),
            stop_reason.map(|r| r.as_str()),
            serde_json::to_string(recommendations)?,
        ],
    )?;
    Ok(())
}

pub fn get_session(conn: &Connection, session_id: Uuid) -> Result<Option<SessionSummary>> {
    let row = conn
        .query_row(
            r#"
            SELECT id, ranking, started_at, finished_at, num_tasks, stop_reason, recommendations_json
            FROM sessions WHERE id = ?1
            "#,
            params![session_id.to_string()],
            |row| {
                Ok((
                    SessionSummary {
                        id: row.get(0)?,
                        ranking: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        num_tasks: row.get::<_, i64>(4)? as usize,
                        stop_reason: row.get(5)?,
                        recommendations: None,
                    },
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((mut summary, json)) => {
            summary.recommendations = json.map(|j| serde_json::from_str(&j)).transpose()?;
            Ok(Some(summary))
        }
        None => Ok(None),
    }
}

/// Events of one session in answer order
pub fn get_session_events(conn: &Connection, session_id: Uuid) -> Result<Vec<QuestionEvent>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT step, question_code, program, answer, feedback, entropy, gap, vector_json, time_on_task_ms
        FROM question_events
        WHERE session_id = ?1
        ORDER BY step
        "#,
    )?;

    let rows = stmt.query_map(params![session_id.to_string()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, f64>(5)?,
            row.get::<_, f64>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, Option<i64>>(8)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (step, question_code, program, answer, feedback, entropy, gap, vector_json, time_on_task_ms) = row?;
        events.push(QuestionEvent {
            step: step as usize,
            question_code,
            program,
            answer,
            feedback,
            entropy,
            gap,
            vector: serde_json::from_str(&vector_json)?,
            time_on_task_ms,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Axis, TaskPreference};

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    fn record(step: usize, preference: Option<TaskPreference>) -> AnswerRecord {
        AnswerRecord {
            step,
            program: "Nursing".to_string(),
            question_code: format!("nurs-broad-{:03}", step),
            option_key: "D".to_string(),
            axis: Axis::Social,
            preference,
            priority_order: preference.map(|_| 2),
            vector: [0.3, 0.3, 0.3, 0.7, 0.3, 0.3],
            entropy: 1.74,
            gap: 0.11,
            stopped: false,
        }
    }

    #[test]
    fn test_init_db() {
        let dir = tempfile::tempdir().unwrap();
        let conn = init_db(&dir.path().join("log.db")).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"sessions".to_string()));
        assert!(tables.contains(&"question_events".to_string()));
    }

    #[test]
    fn test_session_lifecycle() {
        let conn = setup_test_db();
        let id = Uuid::new_v4();
        let ranking = AxisRanking::parse("SIAERC").unwrap();

        insert_session(&conn, id, &ranking, Utc::now()).unwrap();
        record_answer(&conn, id, &record(1, None), Some(5400)).unwrap();
        record_answer(&conn, id, &record(2, Some(TaskPreference::Positive)), None).unwrap();

        let recs = vec![Recommendation {
            rank: 1,
            program: "Nursing".to_string(),
            distance: 0.4123,
            closest_axis: Axis::Social,
        }];
        finish_session(&conn, id, Some(StopReason::WideGap), &recs).unwrap();

        let summary = get_session(&conn, id).unwrap().unwrap();
        assert_eq!(summary.ranking, "SIAERC");
        assert_eq!(summary.num_tasks, 2);
        assert_eq!(summary.stop_reason.as_deref(), Some("wide_gap"));
        assert_eq!(summary.recommendations, Some(recs));
        assert!(summary.finished_at.is_some());

        let events = get_session_events(&conn, id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].answer, "S");
        assert_eq!(events[0].time_on_task_ms, Some(5400));
        assert_eq!(events[1].feedback.as_deref(), Some("positive"));
        assert_eq!(events[1].vector.len(), 6);
    }

    #[test]
    fn test_unknown_session() {
        let conn = setup_test_db();
        assert!(get_session(&conn, Uuid::new_v4()).unwrap().is_none());
        assert!(get_session_events(&conn, Uuid::new_v4()).unwrap().is_empty());
    }
}
