//! Non-repeating question selection.
//!
//! A draw narrows the catalog to questions matching the genre filter and
//! the difficulty set, then drops ids already used. When nothing is left
//! the used set is cleared and the draw retried (recycling), unless the
//! caller asked for an exhaustible pool. If even the recycled pool is
//! empty the whole catalog is used as a last resort.

use std::collections::{BTreeSet, HashSet};

use battlequiz_protocol::{Difficulty, GenreFilter, Question, QuestionId};
use rand::Rng;

use crate::QuestionCatalog;

/// Eligibility criteria for a draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawFilter<'a> {
    pub genres: &'a GenreFilter,
    /// Empty means every difficulty.
    pub difficulties: &'a BTreeSet<Difficulty>,
    /// Report exhaustion instead of recycling used ids.
    pub exhaustible: bool,
}

impl DrawFilter<'_> {
    fn accepts(&self, question: &Question) -> bool {
        self.genres.matches(question.genre.as_deref())
            && (self.difficulties.is_empty() || self.difficulties.contains(&question.difficulty))
    }
}

/// A successful draw.
#[derive(Debug, Clone, Copy)]
pub struct Drawn<'a> {
    pub question: &'a Question,
    /// The used set was cleared to make this draw possible.
    pub recycled: bool,
}

impl QuestionCatalog {
    /// Draws one question uniformly at random from the eligible pool and
    /// records its id in `used`.
    ///
    /// Returns `None` only when the pool is exhausted and
    /// `filter.exhaustible` is set.
    pub fn draw<'a, R: Rng + ?Sized>(
        &'a self,
        rng: &mut R,
        used: &mut HashSet<QuestionId>,
        filter: DrawFilter<'_>,
    ) -> Option<Drawn<'a>> {
        let mut recycled = false;
        let mut pool = self.eligible(used, filter);

        if pool.is_empty() {
            if filter.exhaustible {
                tracing::debug!(used = used.len(), "question pool exhausted");
                return None;
            }
            tracing::debug!(used = used.len(), "question pool recycled");
            used.clear();
            recycled = true;
            pool = self.eligible(used, filter);
        }

        if pool.is_empty() {
            tracing::warn!("no question matches the filter, drawing from the whole catalog");
            pool = self.questions().iter().collect();
        }

        if pool.is_empty() {
            return None;
        }

        let question = pool[rng.random_range(0..pool.len())];
        used.insert(question.id);
        Some(Drawn { question, recycled })
    }

    fn eligible(&self, used: &HashSet<QuestionId>, filter: DrawFilter<'_>) -> Vec<&Question> {
        self.questions()
            .iter()
            .filter(|q| !used.contains(&q.id) && filter.accepts(q))
            .collect()
    }
}
