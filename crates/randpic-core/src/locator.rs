//! # Token Lookup
//!
//! Given a client-supplied token, scan the library's eligible file set,
//! derive each candidate's token and return the one that matches.
//!
//! Every candidate is compared in constant time, and the scan does not
//! short-circuit on the first match, so the response time does not reveal
//! where in the listing the match sits. The matched file is then re-checked
//! for containment: a symlink swapped in after enumeration must not lead
//! outside the root.

use crate::candidate::{eligible_images, ImageCandidate};
use crate::error::ResolveError;
use crate::library::Library;
use crate::token::TokenKey;

/// Locate the image in `library` whose token equals `provided`.
///
/// - No match → [`ResolveError::NotFound`].
/// - Match resolving outside the root → [`ResolveError::PathEscape`],
///   logged as a security event.
///
/// On success the candidate's [`ImageCandidate::resolved_path`] is the
/// validated target; callers read from it, not from the enumerated entry.
pub fn locate(
    library: &Library,
    provided: &str,
    key: &TokenKey,
) -> Result<ImageCandidate, ResolveError> {
    let images = eligible_images(library.root())?;

    let mut found: Option<ImageCandidate> = None;
    for candidate in images {
        let matched = key.token_for(candidate.file_name()).matches(provided);
        if matched && found.is_none() {
            found = Some(candidate);
        }
    }

    let candidate = found.ok_or_else(|| ResolveError::NotFound(library.key().to_string()))?;

    let file_name = candidate.file_name().to_string();
    library.contain_candidate(candidate).map_err(|err| {
        tracing::warn!(
            library = %library.key(),
            file = %file_name,
            error = %err,
            "security: token matched a file that resolves outside its library root"
        );
        err
    })
}
