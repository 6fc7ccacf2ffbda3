//! Human-readable names for entity files and directories.

/// Longest slug we keep before truncating at a word boundary.
pub const MAX_SLUG_LEN: usize = 20;

/// Number of leading ID characters used for file names and session keys.
pub const SHORT_ID_LEN: usize = 8;

/// Normalizes a title into `[a-z0-9-]*`, at most [`MAX_SLUG_LEN`] characters.
///
/// Returns `fallback` when nothing sluggable remains.
pub fn generate_slug(title: &str, fallback: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        let c = match c {
            ' ' | '_' | '-' => '-',
            'a'..='z' | '0'..='9' => c,
            _ => continue,
        };
        if c == '-' {
            if last_hyphen {
                continue;
            }
            last_hyphen = true;
        } else {
            last_hyphen = false;
        }
        slug.push(c);
    }

    let slug = truncate_at_word_boundary(slug.trim_matches('-'), MAX_SLUG_LEN);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug.to_string()
    }
}

// Slugs are ASCII by construction, so byte offsets are char offsets.
fn truncate_at_word_boundary(slug: &str, max_len: usize) -> &str {
    if slug.len() <= max_len {
        return slug;
    }
    if slug.as_bytes()[max_len] == b'-' {
        return &slug[..max_len];
    }
    let head = &slug[..max_len];
    match head.rfind('-') {
        Some(idx) if idx > 0 => &head[..idx],
        _ => head,
    }
}

/// First [`SHORT_ID_LEN`] characters of `id`, or all of it when shorter.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// `<slug>-<short id>`, the on-disk name stem of an entity.
pub fn dir_name(title: &str, id: &str, fallback: &str) -> String {
    format!("{}-{}", generate_slug(title, fallback), short_id(id))
}
