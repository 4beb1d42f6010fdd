//! The question catalog.

use std::collections::HashSet;
use std::path::Path;

use battlequiz_protocol::{CHOICE_COUNT, Difficulty, Question, QuestionId};

use crate::CatalogError;

/// Immutable, validated question list.
///
/// Rooms hold it behind an `Arc` and only ever read from it, so there is
/// no cross-room mutable state here.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    /// Validates and wraps a list of questions.
    ///
    /// # Errors
    /// - [`CatalogError::Empty`] for an empty list.
    /// - [`CatalogError::DuplicateId`] if two entries share an id.
    /// - [`CatalogError::InvalidQuestion`] if `answerIndex` is out of range
    ///   or the prompt is blank.
    pub fn from_questions(questions: Vec<Question>) -> Result<Self, CatalogError> {
        if questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id) {
                return Err(CatalogError::DuplicateId(q.id));
            }
            if q.answer_index >= CHOICE_COUNT {
                return Err(CatalogError::InvalidQuestion {
                    id: q.id,
                    reason: format!(
                        "answerIndex {} is out of range 0..{CHOICE_COUNT}",
                        q.answer_index
                    ),
                });
            }
            if q.prompt.trim().is_empty() {
                return Err(CatalogError::InvalidQuestion {
                    id: q.id,
                    reason: "question text is empty".into(),
                });
            }
        }

        Ok(Self { questions })
    }

    /// Parses a JSON array of questions.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let questions: Vec<Question> = serde_json::from_str(json)?;
        Self::from_questions(questions)
    }

    /// Reads and parses a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            questions = catalog.len(),
            easy = catalog.count_by_difficulty(Difficulty::Easy),
            normal = catalog.count_by_difficulty(Difficulty::Normal),
            hard = catalog.count_by_difficulty(Difficulty::Hard),
            "question catalog loaded"
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    fn count_by_difficulty(&self, difficulty: Difficulty) -> usize {
        self.questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": 1, "question": "q1", "choices": ["a","b","c","d"], "answerIndex": 0},
        {"id": 2, "question": "q2", "choices": ["a","b","c","d"], "answerIndex": 3,
         "difficulty": "HARD", "category": "history"}
    ]"#;

    #[test]
    fn test_from_json_str_loads_entries() {
        let catalog = QuestionCatalog::from_json_str(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(2).unwrap().difficulty, Difficulty::Hard);
        assert!(catalog.get(3).is_none());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(
            QuestionCatalog::from_json_str("[]"),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let json = r#"[
            {"id": 1, "question": "q1", "choices": ["a","b","c","d"], "answerIndex": 0},
            {"id": 1, "question": "q2", "choices": ["a","b","c","d"], "answerIndex": 1}
        ]"#;
        assert!(matches!(
            QuestionCatalog::from_json_str(json),
            Err(CatalogError::DuplicateId(1))
        ));
    }

    #[test]
    fn test_answer_index_out_of_range_rejected() {
        let json = r#"[{"id": 9, "question": "q", "choices": ["a","b","c","d"], "answerIndex": 4}]"#;
        match QuestionCatalog::from_json_str(json) {
            Err(CatalogError::InvalidQuestion { id, reason }) => {
                assert_eq!(id, 9);
                assert!(reason.contains("answerIndex"));
            }
            other => panic!("expected InvalidQuestion, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            QuestionCatalog::from_json_str("{"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = QuestionCatalog::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
        assert!(err.to_string().contains("not/here.json"));
    }
}
