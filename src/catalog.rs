//! Program catalog: per-program RIASEC vectors plus session scheduling fields
//!
//! The catalog is materialized once per session from the external program
//! table. Records keep insertion order (recommendation ties rely on it) and
//! are indexed by name for O(1) lookup.

use crate::error::{ProfilerError, Result};
use crate::types::{Axis, AxisRanking, AxisVector, TaskPreference, AXIS_COUNT};
use crate::vector;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Priority of a program before the forced-choice ranking has been applied
pub const UNSEEDED_PRIORITY: u8 = 0;

/// Lowest scheduling priority (probed last)
pub const LOWEST_PRIORITY: u8 = AXIS_COUNT as u8;

/// One row of the external program table, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRow {
    pub program: String,
    pub vector: Vec<f64>,
}

/// A catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub name: String,
    /// The program's own RIASEC profile, never mutated
    pub vector: AxisVector,
    /// 1 = probe first, 6 = probe last
    pub priority_order: u8,
    /// Whether a task for this program has been presented this session
    pub asked: bool,
}

impl ProgramRecord {
    pub fn dominant_axis(&self) -> Axis {
        vector::dominant_axis(&self.vector)
    }
}

/// Session-scoped program catalog
#[derive(Debug, Clone)]
pub struct ProgramCatalog {
    records: Vec<ProgramRecord>,
    index: HashMap<String, usize>,
    /// programs x 6 matrix of program vectors
    gradient: Array2<f64>,
}

impl ProgramCatalog {
    /// Build a catalog from raw rows, validating arity and uniqueness
    pub fn from_rows(rows: Vec<ProgramRow>) -> Result<Self> {
        let mut records = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());

        for row in rows {
            let vector = parse_vector(&row.program, &row.vector)?;
            if index.contains_key(&row.program) {
                return Err(ProfilerError::DuplicateProgram(row.program));
            }
            index.insert(row.program.clone(), records.len());
            records.push(ProgramRecord {
                name: row.program,
                vector,
                priority_order: UNSEEDED_PRIORITY,
                asked: false,
            });
        }

        let gradient = build_gradient(&records);
        Ok(Self { records, index, gradient })
    }

    /// Parse the CSV artifact: a `program,vector` header, then one row per
    /// program with the vector as a bracketed list (optionally quoted)
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut rows = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (program, raw_vector) = split_csv_row(line);
            if line_no == 0 && program.eq_ignore_ascii_case("program") {
                continue;
            }

            let inner = raw_vector.trim().trim_matches('"');
            let vector: Vec<f64> = serde_json::from_str(inner).map_err(|_| {
                ProfilerError::MalformedProgramVector {
                    program: program.clone(),
                    found: format!("unparsable vector {}", raw_vector.trim()),
                }
            })?;
            rows.push(ProgramRow { program, vector });
        }

        Self::from_rows(rows)
    }

    /// Load a program table from disk; `.json` files hold an array of
    /// `{program, vector}`, anything else is read as CSV
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let rows: Vec<ProgramRow> = serde_json::from_str(&content)?;
            Self::from_rows(rows)
        } else {
            Self::from_csv_str(&content)
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ProgramRecord> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut ProgramRecord> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| ProfilerError::UnknownProgram(name.to_string()))?;
        Ok(&mut self.records[i])
    }

    /// Records in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &ProgramRecord> {
        self.records.iter()
    }

    pub fn gradient(&self) -> &Array2<f64> {
        &self.gradient
    }

    /// Euclidean norm of the catalog-wide column for `axis_index`
    pub fn gradient_column_norm(&self, axis_index: usize) -> Result<f64> {
        if axis_index >= AXIS_COUNT {
            return Err(ProfilerError::InvalidAxis(axis_index));
        }
        if self.records.is_empty() {
            return Err(ProfilerError::EmptyCatalog);
        }
        let column = self.gradient.column(axis_index);
        Ok(column.dot(&column).sqrt())
    }

    /// Assign each program the rank the student gave to its dominant axis
    pub fn assign_priorities(&mut self, ranking: &AxisRanking) -> Result<()> {
        if self.records.is_empty() {
            return Err(ProfilerError::EmptyCatalog);
        }
        for record in &mut self.records {
            record.priority_order = ranking.rank_of(record.dominant_axis());
        }
        Ok(())
    }

    pub fn mark_asked(&mut self, name: &str) -> Result<()> {
        self.get_mut(name)?.asked = true;
        Ok(())
    }

    /// Move a program one step earlier (positive) or later (negative)
    pub fn apply_preference(&mut self, name: &str, preference: TaskPreference) -> Result<u8> {
        let record = self.get_mut(name)?;
        record.priority_order = match preference {
            TaskPreference::Positive => record.priority_order.saturating_sub(1).max(1),
            TaskPreference::Negative => (record.priority_order + 1).min(LOWEST_PRIORITY),
        };
        Ok(record.priority_order)
    }

    /// Clear session-scoped fields so the catalog can back a fresh session
    pub fn reset_session(&mut self) {
        for record in &mut self.records {
            record.priority_order = UNSEEDED_PRIORITY;
            record.asked = false;
        }
    }
}

/// Convert a raw row into exactly six components
pub fn parse_vector(program: &str, raw: &[f64]) -> Result<AxisVector> {
    if raw.len() != AXIS_COUNT {
        return Err(ProfilerError::MalformedProgramVector {
            program: program.to_string(),
            found: format!("{} components", raw.len()),
        });
    }
    if let Some(bad) = raw.iter().find(|x| !x.is_finite()) {
        return Err(ProfilerError::MalformedProgramVector {
            program: program.to_string(),
            found: format!("non-finite component {}", bad),
        });
    }
    let mut vector = [0.0; AXIS_COUNT];
    vector.copy_from_slice(raw);
    Ok(vector)
}

fn build_gradient(records: &[ProgramRecord]) -> Array2<f64> {
    Array2::from_shape_fn((records.len(), AXIS_COUNT), |(i, j)| records[i].vector[j])
}

/// Split a CSV line into the program name and the remainder
fn split_csv_row(line: &str) -> (String, String) {
    if let Some(rest) = line.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            let name = rest[..end].to_string();
            let remainder = rest[end + 1..].trim_start().trim_start_matches(',');
            return (name, remainder.to_string());
        }
    }
    match line.split_once(',') {
        Some((name, rest)) => (name.trim().to_string(), rest.to_string()),
        None => (line.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_program_catalog() -> ProgramCatalog {
        ProgramCatalog::from_rows(vec![
            ProgramRow { program: "P1".to_string(), vector: vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0] },
            ProgramRow { program: "P2".to_string(), vector: vec![0.0, 0.0, 0.0, 0.1, 0.9, 0.0] },
        ])
        .unwrap()
    }

    #[test]
    fn test_priorities_follow_dominant_axis_rank() {
        let mut catalog = two_program_catalog();
        let ranking = AxisRanking::parse("RIASEC").unwrap();
        catalog.assign_priorities(&ranking).unwrap();

        assert_eq!(catalog.get("P1").unwrap().priority_order, 1);
        assert_eq!(catalog.get("P2").unwrap().priority_order, 5);
    }

    #[test]
    fn test_assign_priorities_is_idempotent() {
        let mut catalog = two_program_catalog();
        let ranking = AxisRanking::parse("ECSAIR").unwrap();

        catalog.assign_priorities(&ranking).unwrap();
        let first: Vec<u8> = catalog.iter().map(|r| r.priority_order).collect();
        catalog.assign_priorities(&ranking).unwrap();
        let second: Vec<u8> = catalog.iter().map(|r| r.priority_order).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec![6, 1]);
    }

    #[test]
    fn test_wrong_arity_fails_fast() {
        let result = ProgramCatalog::from_rows(vec![ProgramRow {
            program: "Short".to_string(),
            vector: vec![0.1, 0.2, 0.3, 0.4, 0.5],
        }]);
        assert!(matches!(result, Err(ProfilerError::MalformedProgramVector { .. })));
    }

    #[test]
    fn test_duplicate_program_rejected() {
        let row = ProgramRow { program: "Law".to_string(), vector: vec![0.0, 0.1, 0.0, 0.2, 0.6, 0.1] };
        let result = ProgramCatalog::from_rows(vec![row.clone(), row]);
        assert!(matches!(result, Err(ProfilerError::DuplicateProgram(_))));
    }

    #[test]
    fn test_csv_parsing() {
        let csv = "program,vector\n\
                   Mathematics,\"[0.05, 0.7, 0.05, 0.05, 0.05, 0.1]\"\n\
                   \"Arts, Media\",\"[0.0, 0.1, 0.8, 0.05, 0.05, 0.0]\"\n";
        let catalog = ProgramCatalog::from_csv_str(csv).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("Mathematics").unwrap().dominant_axis(), Axis::Investigative);
        assert_eq!(catalog.get("Arts, Media").unwrap().dominant_axis(), Axis::Artistic);
    }

    #[test]
    fn test_csv_malformed_vector() {
        let csv = "program,vector\nNursing,\"[0.1, 0.2]\"\n";
        assert!(matches!(
            ProgramCatalog::from_csv_str(csv),
            Err(ProfilerError::MalformedProgramVector { .. })
        ));

        let csv = "program,vector\nNursing,\"[0.1, oops]\"\n";
        assert!(matches!(
            ProgramCatalog::from_csv_str(csv),
            Err(ProfilerError::MalformedProgramVector { .. })
        ));
    }

    #[test]
    fn test_gradient_column_norm() {
        let catalog = two_program_catalog();
        assert_eq!(catalog.gradient().dim(), (2, 6));

        let norm = catalog.gradient_column_norm(Axis::Enterprising.index()).unwrap();
        assert!((norm - 0.9).abs() < 1e-12);
        assert_eq!(catalog.gradient_column_norm(Axis::Conventional.index()).unwrap(), 0.0);
        assert!(matches!(catalog.gradient_column_norm(6), Err(ProfilerError::InvalidAxis(6))));

        let empty = ProgramCatalog::from_rows(Vec::new()).unwrap();
        assert!(matches!(empty.gradient_column_norm(0), Err(ProfilerError::EmptyCatalog)));
    }

    #[test]
    fn test_preference_clamps_priority() {
        let mut catalog = two_program_catalog();
        catalog.assign_priorities(&AxisRanking::parse("RIASEC").unwrap()).unwrap();

        assert_eq!(catalog.apply_preference("P1", TaskPreference::Positive).unwrap(), 1);
        assert_eq!(catalog.apply_preference("P2", TaskPreference::Negative).unwrap(), 6);
        assert_eq!(catalog.apply_preference("P2", TaskPreference::Negative).unwrap(), 6);
        assert_eq!(catalog.apply_preference("P2", TaskPreference::Positive).unwrap(), 5);
        assert!(matches!(
            catalog.apply_preference("P3", TaskPreference::Positive),
            Err(ProfilerError::UnknownProgram(_))
        ));
    }

    #[test]
    fn test_reset_session() {
        let mut catalog = two_program_catalog();
        catalog.assign_priorities(&AxisRanking::parse("RIASEC").unwrap()).unwrap();
        catalog.mark_asked("P1").unwrap();

        catalog.reset_session();
        assert!(catalog.iter().all(|r| !r.asked && r.priority_order == UNSEEDED_PRIORITY));
    }
}
