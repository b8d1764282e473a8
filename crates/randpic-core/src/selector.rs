//! # Random Selection
//!
//! Uniform choice over a library's eligible file set. The randomness has no
//! security role (tokens carry that), so the per-thread, OS-seeded RNG from
//! `rand` is used.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::candidate::{eligible_images, ImageCandidate};
use crate::error::ResolveError;
use crate::library::Library;

/// Pick a random eligible image from `library` using the thread RNG.
pub fn pick_random(library: &Library) -> Result<ImageCandidate, ResolveError> {
    pick_random_with(library, &mut rand::thread_rng())
}

/// Pick a random eligible image from `library` using `rng`.
///
/// Fails with [`ResolveError::NoImages`] for an empty set and with
/// [`ResolveError::PathEscape`] when the chosen entry resolves outside the
/// library root (a symlink pointing elsewhere). The returned candidate's
/// [`ImageCandidate::resolved_path`] is the validated target.
pub fn pick_random_with<R: Rng + ?Sized>(
    library: &Library,
    rng: &mut R,
) -> Result<ImageCandidate, ResolveError> {
    let images = eligible_images(library.root())?;
    let chosen = images
        .choose(rng)
        .ok_or_else(|| ResolveError::NoImages(library.key().to_string()))?;
    library.contain_candidate(chosen.clone())
}
