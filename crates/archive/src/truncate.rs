// SPDX-License-Identifier: MIT

//! Truncation that keeps a pointer to the archived full text.

/// Chars reserved for the embedded reference block.
const REFERENCE_OVERHEAD: usize = 150;

/// Shorten `output` to roughly `max_len` chars, keeping the head and tail
/// halves with an embedded reference to the archived full text in between.
/// Identity when the output already fits.
pub fn truncate_with_reference(output: &str, ref_id: &str, max_len: usize) -> String {
    let chars: Vec<char> = output.chars().collect();
    if chars.len() <= max_len {
        return output.to_string();
    }

    let half = max_len.saturating_sub(REFERENCE_OVERHEAD) / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();

    let reference = format!(
        "\n... [Output truncated: showing {half} of {total} chars] ...\n\
         ... [Full output ref: {ref_id}] ...\n\
         ... [Retrieve the ref id to read the complete output] ...\n",
        total = chars.len(),
    );

    format!("{head}{reference}{tail}")
}

#[cfg(test)]
#[path = "truncate_tests.rs"]
mod tests;
