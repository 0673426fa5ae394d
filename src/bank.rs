//! Task bank: program -> policy key -> microtasks
//!
//! The session treats a bank as a read-only lookup table plus one refill
//! hook (`append`) used after the generator produced a fresh task.

use crate::error::{ProfilerError, Result};
use crate::types::{Microtask, PolicyKey};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// Keyed store of microtasks
pub trait TaskBank {
    /// Tasks stored for `(program, key)`; an empty list is a valid answer
    fn lookup(&self, program: &str, key: PolicyKey) -> Result<Vec<Microtask>>;

    /// Refill hook: file a newly generated task under `(program, key)`
    fn append(&mut self, program: &str, key: PolicyKey, task: Microtask) -> Result<()>;
}

impl<T: TaskBank + ?Sized> TaskBank for &mut T {
    fn lookup(&self, program: &str, key: PolicyKey) -> Result<Vec<Microtask>> {
        (**self).lookup(program, key)
    }

    fn append(&mut self, program: &str, key: PolicyKey, task: Microtask) -> Result<()> {
        (**self).append(program, key, task)
    }
}

impl<T: TaskBank + ?Sized> TaskBank for Box<T> {
    fn lookup(&self, program: &str, key: PolicyKey) -> Result<Vec<Microtask>> {
        (**self).lookup(program, key)
    }

    fn append(&mut self, program: &str, key: PolicyKey, task: Microtask) -> Result<()> {
        (**self).append(program, key, task)
    }
}

/// In-memory bank, usually loaded from a microtask bank JSON file
#[derive(Debug, Clone, Default)]
pub struct MemoryTaskBank {
    tasks: HashMap<String, HashMap<PolicyKey, Vec<Microtask>>>,
}

impl MemoryTaskBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{ "<program>": { "broad": [...], "R": [...], ... }, ... }`
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, Vec<Microtask>>> = serde_json::from_str(content)?;
        let mut bank = Self::new();

        for (program, pools) in raw {
            for (policy, tasks) in pools {
                let key: PolicyKey = policy.parse()?;
                for task in tasks {
                    bank.insert(&program, key, task);
                }
            }
        }

        Ok(bank)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Add a task unless its code is already in the pool; returns whether it was added
    pub fn insert(&mut self, program: &str, key: PolicyKey, mut task: Microtask) -> bool {
        if task.question_code.is_empty() {
            task.question_code = default_question_code(program, key, &task);
        }
        let pool = self
            .tasks
            .entry(program.to_string())
            .or_default()
            .entry(key)
            .or_default();
        if pool.iter().any(|t| t.question_code == task.question_code) {
            return false;
        }
        pool.push(task);
        true
    }

    /// Total number of stored tasks
    pub fn len(&self) -> usize {
        self.tasks
            .values()
            .flat_map(|pools| pools.values())
            .map(|pool| pool.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored `(program, key, task)`, for export into another bank
    pub fn entries(&self) -> Vec<(String, PolicyKey, Microtask)> {
        let mut entries = Vec::new();
        for (program, pools) in &self.tasks {
            for (key, pool) in pools {
                for task in pool {
                    entries.push((program.clone(), *key, task.clone()));
                }
            }
        }
        entries
    }
}

impl TaskBank for MemoryTaskBank {
    fn lookup(&self, program: &str, key: PolicyKey) -> Result<Vec<Microtask>> {
        Ok(self
            .tasks
            .get(program)
            .and_then(|pools| pools.get(&key))
            .cloned()
            .unwrap_or_default())
    }

    fn append(&mut self, program: &str, key: PolicyKey, task: Microtask) -> Result<()> {
        self.insert(program, key, task);
        Ok(())
    }
}

/// SQLite-backed bank for larger, persistent task pools
pub struct SqliteTaskBank {
    conn: Connection,
}

const BANK_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS microtasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    program TEXT NOT NULL,
    policy TEXT NOT NULL,           -- 'broad' or an axis code
    question_code TEXT NOT NULL,
    task_json TEXT NOT NULL,
    generated INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(program, policy, question_code)
);

CREATE INDEX IF NOT EXISTS idx_microtasks_lookup ON microtasks(program, policy);
"#;

impl SqliteTaskBank {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(BANK_SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a task, ignoring duplicates of the same question code.
    /// Returns whether a row was written.
    pub fn insert(&self, program: &str, key: PolicyKey, task: &Microtask, generated: bool) -> Result<bool> {
        let question_code = if task.question_code.is_empty() {
            default_question_code(program, key, task)
        } else {
            task.question_code.clone()
        };

        let mut stored = task.clone();
        stored.question_code = question_code.clone();
        stored.meta = None;

        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO microtasks (program, policy, question_code, task_json, generated)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                program,
                key.to_string(),
                question_code,
                serde_json::to_string(&stored)?,
                generated as i32,
            ],
        )?;
        Ok(rows > 0)
    }

    pub fn count(&self, program: &str, key: PolicyKey) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM microtasks WHERE program = ?1 AND policy = ?2",
            params![program, key.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn programs(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT program FROM microtasks ORDER BY program")?;
        let programs = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(programs)
    }
}

impl TaskBank for SqliteTaskBank {
    fn lookup(&self, program: &str, key: PolicyKey) -> Result<Vec<Microtask>> {
        let mut stmt = self.conn.prepare(
            "SELECT task_json FROM microtasks WHERE program = ?1 AND policy = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![program, key.to_string()], |row| row.get::<_, String>(0))?;

        let mut tasks = Vec::new();
        for row in rows {
            let json = row?;
            let task: Microtask = serde_json::from_str(&json).map_err(|e| {
                ProfilerError::InvalidState(format!("corrupt task row for '{}': {}", program, e))
            })?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn append(&mut self, program: &str, key: PolicyKey, task: Microtask) -> Result<()> {
        let generated = task.meta.as_ref().map(|m| m.generated).unwrap_or(true);
        self.insert(program, key, &task, generated)?;
        Ok(())
    }
}

/// Code for a task that arrived without one: readable prefix plus a digest of
/// the full program name and the task content, so re-imports collide
pub fn default_question_code(program: &str, key: PolicyKey, task: &Microtask) -> String {
    let prefix: String = program
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(program.as_bytes());
    hasher.update([0u8]);
    hasher.update(task.question.as_bytes());
    for (option_key, option) in &task.options {
        hasher.update([0u8]);
        hasher.update(option_key.as_bytes());
        hasher.update([option.riasec.code() as u8]);
        hasher.update(option.text.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());

    format!("{}-{}-{}", prefix, key.to_string().to_lowercase(), &digest[..10])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Axis, TaskOption};
    use std::collections::BTreeMap;

    fn task(code: &str, axes: &[Axis]) -> Microtask {
        let options: BTreeMap<String, TaskOption> = axes
            .iter()
            .enumerate()
            .map(|(i, axis)| {
                (
                    ((b'A' + i as u8) as char).to_string(),
                    TaskOption { text: format!("Option for {}", axis.name()), riasec: *axis },
                )
            })
            .collect();
        Microtask {
            question_code: code.to_string(),
            question: "Which of these would you pick for a school project?".to_string(),
            options,
            meta: None,
        }
    }

    #[test]
    fn test_memory_bank_from_json() {
        let json = r#"{
            "Mathematics": {
                "broad": [{
                    "question": "Which maths club activity sounds best?",
                    "options": {
                        "A": {"text": "Build a slide-rule", "riasec": "R"},
                        "B": {"text": "Prove a conjecture", "riasec": "I"},
                        "C": {"text": "Draw fractal art", "riasec": "A"},
                        "D": {"text": "Tutor a classmate", "riasec": "S"},
                        "E": {"text": "Run the club budget", "riasec": "E"},
                        "F": {"text": "Keep the results table", "riasec": "C"}
                    }
                }],
                "I": []
            }
        }"#;
        let bank = MemoryTaskBank::from_json_str(json).unwrap();

        let broad = bank.lookup("Mathematics", PolicyKey::Broad).unwrap();
        assert_eq!(broad.len(), 1);
        assert!(broad[0].question_code.starts_with("math-broad-"));
        assert!(bank.lookup("Mathematics", PolicyKey::Axis(Axis::Investigative)).unwrap().is_empty());
        assert!(bank.lookup("Nursing", PolicyKey::Broad).unwrap().is_empty());
    }

    #[test]
    fn test_memory_bank_rejects_unknown_policy() {
        let json = r#"{"Mathematics": {"sideways": []}}"#;
        assert!(MemoryTaskBank::from_json_str(json).is_err());
    }

    #[test]
    fn test_memory_bank_append_refills() {
        let mut bank = MemoryTaskBank::new();
        let key = PolicyKey::Axis(Axis::Social);
        bank.append("Nursing", key, task("nur-s-1", &[Axis::Social, Axis::Artistic, Axis::Realistic]))
            .unwrap();

        assert_eq!(bank.lookup("Nursing", key).unwrap().len(), 1);
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.entries()[0].0, "Nursing");
    }

    #[test]
    fn test_sqlite_bank_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        let mut bank = SqliteTaskBank::with_connection(conn).unwrap();
        let key = PolicyKey::Broad;

        bank.append("Law", key, task("law-b-1", &Axis::ALL)).unwrap();
        bank.append("Law", key, task("law-b-2", &Axis::ALL)).unwrap();
        // Same code is ignored
        assert!(!bank.insert("Law", key, &task("law-b-1", &Axis::ALL), false).unwrap());

        let tasks = bank.lookup("Law", key).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].question_code, "law-b-1");
        assert_eq!(tasks[1].axes().len(), 6);
        assert_eq!(bank.count("Law", key).unwrap(), 2);
        assert_eq!(bank.programs().unwrap(), vec!["Law".to_string()]);
        assert!(bank.lookup("Law", PolicyKey::Axis(Axis::Social)).unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_bank_assigns_missing_codes() {
        let bank = SqliteTaskBank::with_connection(Connection::open_in_memory().unwrap()).unwrap();
        let key = PolicyKey::Axis(Axis::Conventional);
        let first = task("", &[Axis::Conventional, Axis::Enterprising, Axis::Social]);
        let second = task("", &[Axis::Conventional, Axis::Investigative, Axis::Social]);
        assert!(bank.insert("Accounting", key, &first, false).unwrap());
        assert!(bank.insert("Accounting", key, &second, false).unwrap());

        let codes: Vec<String> = bank
            .lookup("Accounting", key)
            .unwrap()
            .into_iter()
            .map(|t| t.question_code)
            .collect();
        assert_eq!(codes.len(), 2);
        assert_ne!(codes[0], codes[1]);
        assert!(codes.iter().all(|c| c.starts_with("acco-c-")));
    }

    #[test]
    fn test_sqlite_bank_reimport_is_idempotent() {
        let bank = SqliteTaskBank::with_connection(Connection::open_in_memory().unwrap()).unwrap();
        let key = PolicyKey::Broad;
        let pool = [task("", &Axis::ALL), task("", &[Axis::Social, Axis::Artistic, Axis::Realistic])];

        for t in &pool {
            assert!(bank.insert("Law", key, t, false).unwrap());
        }
        for t in &pool {
            assert!(!bank.insert("Law", key, t, false).unwrap());
        }
        assert_eq!(bank.count("Law", key).unwrap(), 2);
    }

    #[test]
    fn test_memory_bank_skips_duplicate_content() {
        let mut bank = MemoryTaskBank::new();
        assert!(bank.insert("Law", PolicyKey::Broad, task("", &Axis::ALL)));
        assert!(!bank.insert("Law", PolicyKey::Broad, task("", &Axis::ALL)));
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn test_default_codes_use_full_program_name() {
        let t = task("", &Axis::ALL);
        let maths = default_question_code("Mathematics", PolicyKey::Broad, &t);
        let physics = default_question_code("Mathematical Physics", PolicyKey::Broad, &t);

        assert!(maths.starts_with("math-broad-"));
        assert!(physics.starts_with("math-broad-"));
        assert_ne!(maths, physics);
        assert_eq!(maths, default_question_code("Mathematics", PolicyKey::Broad, &t));
    }
}
