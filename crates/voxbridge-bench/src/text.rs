//! Text normalization and edit-distance metrics.

/// Lowercase, collapse whitespace runs to single spaces and trim. Applying
/// it twice yields the same string.
pub fn normalize_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_space = false;

    for ch in lower.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }

    out.trim().to_string()
}

/// Whitespace-split, lowercase, strip non-alphanumeric characters, drop
/// empty tokens. `tokenize("Hello, WORLD!")` is `["hello", "world"]`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter_map(|word| {
            let cleaned: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(|c| c.to_lowercase())
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WerBreakdown {
    pub wer: f64,
    pub substitutions: u32,
    pub deletions: u32,
    pub insertions: u32,
}

/// Token-level word error rate with operation counts.
///
/// WER = 100 · edits / |reference tokens|. An empty reference yields 0 for
/// an empty hypothesis and 100 otherwise.
pub fn calculate_wer(reference: &str, hypothesis: &str) -> WerBreakdown {
    let ref_tokens = tokenize(reference);
    let hyp_tokens = tokenize(hypothesis);

    if ref_tokens.is_empty() {
        return WerBreakdown {
            wer: if hyp_tokens.is_empty() { 0.0 } else { 100.0 },
            ..WerBreakdown::default()
        };
    }

    let (distance, ops) = levenshtein(&ref_tokens, &hyp_tokens);
    WerBreakdown {
        wer: (distance as f64 * 100.0) / ref_tokens.len() as f64,
        substitutions: ops.substitutions,
        deletions: ops.deletions,
        insertions: ops.insertions,
    }
}

/// Character error rate over the non-space characters of both strings.
pub fn calculate_cer(reference: &str, hypothesis: &str) -> f64 {
    let ref_chars: Vec<char> = reference.chars().filter(|c| !c.is_whitespace()).collect();
    let hyp_chars: Vec<char> = hypothesis.chars().filter(|c| !c.is_whitespace()).collect();

    if ref_chars.is_empty() {
        return if hyp_chars.is_empty() { 0.0 } else { 100.0 };
    }

    let (distance, _) = levenshtein(&ref_chars, &hyp_chars);
    (distance as f64 * 100.0) / ref_chars.len() as f64
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EditOps {
    pub substitutions: u32,
    pub deletions: u32,
    pub insertions: u32,
}

/// Edit distance with unit costs, plus the operation counts recovered by
/// backtracking the DP table. Ties resolve substitution > deletion >
/// insertion.
pub(crate) fn levenshtein<T: PartialEq>(reference: &[T], hypothesis: &[T]) -> (usize, EditOps) {
    let m = reference.len();
    let n = hypothesis.len();

    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=n {
        dp[0][j] = j;
    }

    for i in 1..=m {
        for j in 1..=n {
            if reference[i - 1] == hypothesis[j - 1] {
                dp[i][j] = dp[i - 1][j - 1];
            } else {
                let deletion = dp[i - 1][j];
                let insertion = dp[i][j - 1];
                let substitution = dp[i - 1][j - 1];
                dp[i][j] = 1 + deletion.min(insertion).min(substitution);
            }
        }
    }

    let mut ops = EditOps::default();
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i == 0 {
            ops.insertions += 1;
            j -= 1;
        } else if j == 0 {
            ops.deletions += 1;
            i -= 1;
        } else if reference[i - 1] == hypothesis[j - 1] {
            i -= 1;
            j -= 1;
        } else {
            let deletion = dp[i - 1][j];
            let insertion = dp[i][j - 1];
            let substitution = dp[i - 1][j - 1];
            let min_val = deletion.min(insertion).min(substitution);

            if substitution == min_val {
                ops.substitutions += 1;
                i -= 1;
                j -= 1;
            } else if deletion == min_val {
                ops.deletions += 1;
                i -= 1;
            } else {
                ops.insertions += 1;
                j -= 1;
            }
        }
    }

    (dp[m][n], ops)
}
