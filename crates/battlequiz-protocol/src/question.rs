//! Question and difficulty types shared by the catalog, the room engine,
//! and clients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Catalog-wide identifier of a question.
pub type QuestionId = u64;

/// Every question offers exactly this many choices.
pub const CHOICE_COUNT: usize = 4;

/// Difficulty tier of a question. Drives base damage and is announced
/// with the countdown so clients can brace for it.
///
/// Serialized as `"EASY"`, `"NORMAL"`, `"HARD"`. Lowercase spellings are
/// accepted on input because older catalog files used them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    #[default]
    #[serde(alias = "easy")]
    Easy,
    #[serde(alias = "normal")]
    Normal,
    #[serde(alias = "hard")]
    Hard,
}

impl Difficulty {
    /// All tiers, easiest first.
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "EASY"),
            Self::Normal => write!(f, "NORMAL"),
            Self::Hard => write!(f, "HARD"),
        }
    }
}

/// A catalog entry. Immutable once loaded.
///
/// Field names on the wire follow the catalog file format:
///
/// ```json
/// { "id": 12, "question": "…", "choices": ["a", "b", "c", "d"],
///   "answerIndex": 2, "difficulty": "NORMAL", "category": "history" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "question")]
    pub prompt: String,
    pub choices: [String; CHOICE_COUNT],
    #[serde(rename = "answerIndex")]
    pub answer_index: usize,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Genre tag. Untagged questions match every genre filter.
    #[serde(rename = "category", default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl Question {
    /// Text of the correct choice, or `""` if the index is out of range.
    pub fn correct_choice(&self) -> &str {
        self.choices
            .get(self.answer_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Whether `choice` is the correct index. `None` (no answer) never is.
    pub fn is_correct(&self, choice: Option<usize>) -> bool {
        choice == Some(self.answer_index)
    }
}

/// What room players see while a question is live: everything except
/// the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub choices: [String; CHOICE_COUNT],
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            prompt: q.prompt.clone(),
            choices: q.choices.clone(),
            difficulty: q.difficulty,
            genre: q.genre.clone(),
        }
    }
}
