//! Pure read-side helpers: event search and entrant status derivation.

/// Event search predicates and ranking.
pub mod search;
/// Entrant status derivation and history rows.
pub mod status;
