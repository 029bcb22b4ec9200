//! Canonical string forms used as join keys for cross-source team matching.

/// Fold `text` to a canonical form: lowercase, diacritics stripped, any run of
/// non-alphanumeric characters collapsed to a single space, trimmed.
///
/// Total function; never fails, never panics.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut push = |c: char, out: &mut String, pending: &mut bool| {
        if c.is_alphanumeric() {
            if *pending && !out.is_empty() {
                out.push(' ');
            }
            *pending = false;
            out.push(c);
        } else {
            *pending = true;
        }
    };
    for ch in text.chars().flat_map(|c| c.to_lowercase()) {
        match fold_diacritic(ch) {
            Some(folded) => {
                for c in folded.chars() {
                    push(c, &mut out, &mut pending_space);
                }
            }
            None => push(ch, &mut out, &mut pending_space),
        }
    }
    out
}

/// Approximate similarity in [0, 1] between two names. Levenshtein-based, with
/// bonuses for substring containment and shared tokens. Used for fuzzy team
/// lookup; exact alias-table matching does not go through this.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    let dist = levenshtein(&a_chars, &b_chars);
    let mut score = 1.0 - (dist as f64) / (max_len as f64);

    if a.contains(&b) || b.contains(&a) {
        score += 0.20;
    }
    score += 0.15 * token_overlap(&a, &b);
    score.clamp(0.0, 1.0)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let subst = prev[j] + usize::from(ca != cb);
            curr[j + 1] = subst.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Shared-token ratio relative to the smaller token set.
fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: Vec<&str> = a.split_whitespace().collect();
    let tb: Vec<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.iter().filter(|t| tb.contains(t)).count();
    (shared as f64) / (ta.len().min(tb.len()) as f64)
}

/// Map an accented Latin character to its bare equivalent. `None` means the
/// character passes through unchanged; combining marks fold to nothing.
fn fold_diacritic(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' => "a",
        'ç' | 'ć' | 'č' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'ñ' | 'ń' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => "u",
        'ý' | 'ÿ' => "y",
        'š' => "s",
        'ž' => "z",
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        '\u{0300}'..='\u{036f}' => "",
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_diacritics() {
        assert_eq!(normalize("Union Bordeaux-Bègles"), "union bordeaux begles");
        assert_eq!(normalize("Castres Olympique"), "castres olympique");
        assert_eq!(normalize("  Stade Français  Paris "), "stade francais paris");
    }

    #[test]
    fn normalize_collapses_punctuation_runs() {
        assert_eq!(normalize("Mont-de-Marsan"), "mont de marsan");
        assert_eq!(normalize("Pau // Section --- Paloise"), "pau section paloise");
        assert_eq!(normalize("---"), "");
    }

    #[test]
    fn similarity_orders_plausible_matches_first() {
        let exact = similarity("Bordeaux Begles", "Union Bordeaux-Bègles");
        let near = similarity("Bordeaux", "Union Bordeaux-Bègles");
        let wrong = similarity("Castres Olympique", "Union Bordeaux-Bègles");
        assert!(exact > near);
        assert!(near > wrong);
        assert!((similarity("Toulouse", "Toulouse") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_is_zero_for_empty_input() {
        assert_eq!(similarity("", "Toulouse"), 0.0);
        assert_eq!(similarity("???", "Toulouse"), 0.0);
    }
}
