//! Slug derivation for tags.
//!
//! Names are transliterated (`pinyin` for CJK input) and then slugified with
//! the `slug` crate, so "Raspberry Pi" becomes `raspberry-pi` and "机器人"
//! becomes `ji-qi-ren`. Collisions are resolved by the caller-supplied
//! uniqueness predicate, appending `-1`, `-2`, ... to the base slug.

use std::future::Future;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

/// Base used when a name has no representable characters.
pub const FALLBACK_SLUG: &str = "tag";
/// Column width of `tags.slug`.
pub const MAX_SLUG_LEN: usize = 60;

const MAX_SUFFIX_ATTEMPTS: usize = 256;
// Leaves room for a `-NNN` suffix inside MAX_SLUG_LEN.
const MAX_BASE_LEN: usize = MAX_SLUG_LEN - 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum UniqueSlugError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive the slug a name maps to, without uniqueness resolution.
///
/// Returns `None` when nothing representable survives slugification.
pub fn derive_slug(input: &str) -> Option<String> {
    if input.trim().is_empty() {
        return None;
    }

    let candidate = slugify(romanize(input));
    if candidate.is_empty() {
        return None;
    }

    Some(truncate_slug(candidate))
}

/// Base slug for a tag name, falling back to [`FALLBACK_SLUG`].
pub fn tag_slug_base(name: &str) -> String {
    derive_slug(name).unwrap_or_else(|| FALLBACK_SLUG.to_string())
}

/// Produce a tag slug that the async predicate reports as unused.
///
/// `is_unique` must resolve to `true` when no other tag holds the candidate.
pub async fn unique_tag_slug<F, Fut, E>(
    name: &str,
    mut is_unique: F,
) -> Result<String, UniqueSlugError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = tag_slug_base(name);

    if is_unique(&base).await.map_err(UniqueSlugError::Predicate)? {
        return Ok(base);
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate)
            .await
            .map_err(UniqueSlugError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(UniqueSlugError::Slug(SlugError::Exhausted { base }))
}

fn truncate_slug(mut slug: String) -> String {
    if slug.len() > MAX_BASE_LEN {
        slug.truncate(MAX_BASE_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

fn romanize(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => push_syllable(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn push_syllable(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;

    async fn unique_against(existing: &[&str], name: &str) -> String {
        let taken = Arc::new(Mutex::new(
            existing.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        ));
        unique_tag_slug(name, |candidate| {
            let taken = taken.clone();
            let candidate = candidate.to_string();
            async move { Ok::<bool, Infallible>(!taken.lock().await.contains(&candidate)) }
        })
        .await
        .expect("unique slug")
    }

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("Raspberry Pi").as_deref(), Some("raspberry-pi"));
        assert_eq!(derive_slug("AI/ML").as_deref(), Some("ai-ml"));
    }

    #[test]
    fn derive_slug_transliterates_chinese() {
        assert_eq!(derive_slug("机器人").as_deref(), Some("ji-qi-ren"));
    }

    #[test]
    fn unrepresentable_names_fall_back_to_tag() {
        assert_eq!(derive_slug("   "), None);
        assert_eq!(derive_slug("!!!"), None);
        assert_eq!(tag_slug_base("!!!"), FALLBACK_SLUG);
    }

    #[test]
    fn long_names_are_truncated_without_trailing_hyphen() {
        let slug = tag_slug_base(&"robot ".repeat(20));
        assert!(slug.len() <= MAX_SLUG_LEN - 4);
        assert!(!slug.ends_with('-'));
    }

    #[tokio::test]
    async fn collisions_start_counting_at_one() {
        assert_eq!(unique_against(&[], "Robotics").await, "robotics");
        assert_eq!(unique_against(&["robotics"], "Robotics").await, "robotics-1");
        assert_eq!(
            unique_against(&["robotics", "robotics-1"], "Robotics").await,
            "robotics-2"
        );
    }

    #[tokio::test]
    async fn exhausted_suffixes_report_the_base() {
        let result = unique_tag_slug("Example", |_| async {
            Ok::<bool, Infallible>(false)
        })
        .await;

        match result {
            Err(UniqueSlugError::Slug(SlugError::Exhausted { base })) => {
                assert_eq!(base, "example")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
