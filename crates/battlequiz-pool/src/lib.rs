//! Question pool for BattleQuiz.
//!
//! - [`QuestionCatalog`] — the static, validated list of questions loaded
//!   once at startup and shared read-only by every room.
//! - [`QuestionCatalog::draw`] — the selector: filter by genre and
//!   difficulty, avoid ids already used, recycle or report exhaustion.

mod catalog;
mod error;
mod selector;

pub use catalog::QuestionCatalog;
pub use error::CatalogError;
pub use selector::{DrawFilter, Drawn};
