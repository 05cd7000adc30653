//! Resolves free-text queries to timetable entities.

use tracing::{debug, info};

use crate::model::Entity;
use crate::store::{EntityStore, StoreError};

/// Longest picklist offered to a user.
pub const MAX_CHOICES: usize = 7;

/// Outcome of resolving a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NoMatch,
    Single(Entity),
    /// Best candidates first, at most [`MAX_CHOICES`].
    Multiple(Vec<Entity>),
}

/// Tuning for [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveOptions {
    /// Skip the exact-name lookup.
    pub fuzzy: bool,
    /// Minimum similarity for a candidate to be kept.
    pub search_threshold: f64,
    /// How far ahead the best candidate must be to win outright.
    pub choose_margin: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fuzzy: false,
            search_threshold: 0.6,
            choose_margin: 0.1,
        }
    }
}

impl ResolveOptions {
    /// Fuzzy-only pass with relaxed limits, used after a strict pass found nothing.
    #[must_use]
    pub const fn loose() -> Self {
        Self {
            fuzzy: true,
            search_threshold: 0.5,
            choose_margin: 0.05,
        }
    }
}

/// Case-insensitive similarity in `[0, 1]`, based on edit distance.
#[must_use]
pub fn similarity(query: &str, name: &str) -> f64 {
    strsim::normalized_levenshtein(&query.to_lowercase(), &name.to_lowercase())
}

/// Resolves `query` against the store.
///
/// An exact name match wins regardless of thresholds unless `options.fuzzy`
/// is set; otherwise every entity is scored and ranked by [`rank`].
///
/// # Errors
///
/// Propagates store failures.
pub async fn resolve(
    store: &dyn EntityStore,
    query: &str,
    options: &ResolveOptions,
) -> Result<Resolution, StoreError> {
    if query.trim().is_empty() {
        return Ok(Resolution::NoMatch);
    }

    if !options.fuzzy
        && let Some(entity) = store.find_entity_by_name(query).await?
    {
        debug!("Exact match for '{}'", query);
        return Ok(Resolution::Single(entity));
    }

    let entities = store.get_all_entities().await?;
    Ok(rank(query, entities, options))
}

/// Strict resolution first, then a looser fuzzy pass if nothing was found.
///
/// # Errors
///
/// Propagates store failures.
pub async fn search(store: &dyn EntityStore, query: &str) -> Result<Resolution, StoreError> {
    match resolve(store, query, &ResolveOptions::default()).await? {
        Resolution::NoMatch => resolve(store, query, &ResolveOptions::loose()).await,
        found => Ok(found),
    }
}

/// Scores `entities` against `query` and picks the outcome.
///
/// Nameless entities are ignored. Candidates with equal scores keep their
/// input order.
#[must_use]
pub fn rank(query: &str, entities: Vec<Entity>, options: &ResolveOptions) -> Resolution {
    let mut scored: Vec<(Entity, f64)> = entities
        .into_iter()
        .filter(|entity| !entity.name.is_empty())
        .filter_map(|entity| {
            let score = similarity(query, &entity.name);
            (score >= options.search_threshold).then_some((entity, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    info!("Found {} entities for '{}'", scored.len(), query);
    choose(scored, options.choose_margin)
}

/// Picks the outcome from candidates sorted best first.
#[must_use]
pub fn choose(scored: Vec<(Entity, f64)>, choose_margin: f64) -> Resolution {
    let decisive = match scored.as_slice() {
        [] => return Resolution::NoMatch,
        [_] => true,
        [(_, top), (_, second), ..] => *top > second * (1.0 + choose_margin),
    };

    let mut ranked = scored.into_iter().map(|(entity, _)| entity);
    if decisive {
        ranked.next().map_or(Resolution::NoMatch, Resolution::Single)
    } else {
        Resolution::Multiple(ranked.take(MAX_CHOICES).collect())
    }
}
