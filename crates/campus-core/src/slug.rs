//! URL slugs for catalog records.
//!
//! A slug is `slugify(title)` followed by a millisecond nonce. The nonce comes
//! from a process-wide monotonic clock: it is the current epoch milliseconds,
//! bumped past the last issued value when two slugs land in the same
//! millisecond, so every slug issued by this process is distinct.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

static LAST_NONCE: AtomicI64 = AtomicI64::new(0);

/// Lowercases, folds common Latin accents and joins alphanumeric runs with `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars().flat_map(char::to_lowercase) {
        let folded = fold_accent(ch);
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Builds a fresh slug for `title` using the wall clock.
pub fn generate(title: &str) -> String {
    generate_at(title, Utc::now())
}

/// Builds a slug whose nonce is at least `now` in epoch milliseconds.
pub fn generate_at(title: &str, now: DateTime<Utc>) -> String {
    let nonce = next_nonce(now.timestamp_millis());
    let base = slugify(title);
    if base.is_empty() {
        format!("item-{nonce}")
    } else {
        format!("{base}-{nonce}")
    }
}

fn next_nonce(millis: i64) -> i64 {
    let mut last = LAST_NONCE.load(Ordering::Relaxed);
    loop {
        let candidate = if millis > last { millis } else { last + 1 };
        match LAST_NONCE.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(observed) => last = observed,
        }
    }
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}
