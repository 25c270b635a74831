//! Generated nicknames for attendees inserted without one.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

static NON_SLUG_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Lower-case, collapse runs of anything outside `[a-z0-9]` into one hyphen,
/// then trim hyphens from both ends.
///
/// ```
/// use roster_tools::slugify;
///
/// assert_eq!(slugify("Mary  Ann"), "mary-ann");
/// assert_eq!(slugify("--O'Brien!"), "o-brien");
/// ```
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Stands in for a name with nothing left after slugging.
const EMPTY_SLUG: &str = "x";

fn name_component(name: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

/// `slug(first)-slug(last)-NNNN` with a zero-padded suffix in `0..=9999`.
/// A name that slugs to nothing contributes `x`.
pub fn synthesize_nickname_with<R: Rng + ?Sized>(rng: &mut R, first_name: &str, last_name: &str) -> String {
    let suffix: u16 = rng.gen_range(0..=9999);
    format!(
        "{}-{}-{:04}",
        name_component(first_name),
        name_component(last_name),
        suffix
    )
}

pub fn synthesize_nickname(first_name: &str, last_name: &str) -> String {
    synthesize_nickname_with(&mut rand::thread_rng(), first_name, last_name)
}
