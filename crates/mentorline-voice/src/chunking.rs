//! Sentence-aware text splitting for speech synthesis.

/// Characters treated as sentence ends, including the Devanagari danda.
const TERMINATORS: [char; 5] = ['.', '!', '?', '।', '॥'];

fn is_terminator(c: char) -> bool {
    TERMINATORS.contains(&c)
}

/// Splits `text` into trimmed chunks of at most `chunk_size` characters.
///
/// Scanning left to right, each chunk ends after the last sentence
/// terminator found past `min_chunk_size` characters. Without one it ends at
/// the last whitespace past the minimum, and failing that it is cut hard at
/// `chunk_size`. Empty chunks are dropped, so blank input yields nothing.
pub fn split_text(text: &str, chunk_size: usize, min_chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let min_chunk_size = min_chunk_size.min(chunk_size);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
        if start >= chars.len() {
            break;
        }

        let window_end = start + chunk_size;
        if window_end >= chars.len() {
            push_trimmed(&mut chunks, &chars[start..]);
            break;
        }

        let floor = start + min_chunk_size;
        let cut = (floor..window_end)
            .rev()
            .find(|&i| is_terminator(chars[i]))
            .map(|i| i + 1)
            .or_else(|| {
                (floor..window_end)
                    .rev()
                    .find(|&i| i > start && chars[i].is_whitespace())
            })
            .unwrap_or(window_end);

        push_trimmed(&mut chunks, &chars[start..cut]);
        start = cut;
    }

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, span: &[char]) {
    let chunk: String = span.iter().collect();
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn assert_well_formed(text: &str, chunks: &[String], chunk_size: usize) {
        for chunk in chunks {
            assert!(
                chunk.chars().count() <= chunk_size,
                "chunk too long: {} chars",
                chunk.chars().count()
            );
            assert!(!chunk.is_empty());
            assert_eq!(chunk.trim(), chunk);
        }
        assert_eq!(squash(&chunks.concat()), squash(text));
        if !text.trim().is_empty() {
            assert!(!chunks.is_empty());
        }
    }

    #[test]
    fn thousand_characters_make_four_chunks() {
        let sentence = format!("{}. ", "x".repeat(48));
        let text = sentence.repeat(20);
        assert_eq!(text.chars().count(), 1000);

        let chunks = split_text(&text, 300, 100);
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks[..3] {
            assert!(chunk.chars().count() > 100);
            assert!(chunk.ends_with('.'));
        }
        assert_well_formed(&text, &chunks, 300);
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split_text("  Hello there.  ", 300, 100), vec!["Hello there."]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(split_text("", 300, 100).is_empty());
        assert!(split_text(" \n\t ", 300, 100).is_empty());
    }

    #[test]
    fn terminator_before_minimum_is_ignored() {
        let text = format!("Hi. {}", "word ".repeat(40));
        let chunks = split_text(&text, 60, 20);
        assert!(chunks[0].chars().count() > 20, "first chunk: {:?}", chunks[0]);
        assert_well_formed(&text, &chunks, 60);
    }

    #[test]
    fn falls_back_to_whitespace_then_hard_cut() {
        let words = "alpha beta gamma delta ".repeat(10);
        let chunks = split_text(&words, 50, 10);
        assert!(chunks.iter().all(|c| !c.starts_with(' ')));
        assert!(chunks[0].ends_with(|c: char| c.is_alphabetic()));
        assert_well_formed(&words, &chunks, 50);

        let solid = "y".repeat(125);
        let chunks = split_text(&solid, 50, 10);
        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![50, 50, 25]
        );
    }

    #[test]
    fn devanagari_danda_ends_sentences() {
        let sentence = "यह एक वाक्य है। ";
        let text = sentence.repeat(12);
        let chunks = split_text(&text, 60, 20);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.ends_with('।')));
        assert_well_formed(&text, &chunks, 60);
    }

    #[test]
    fn varied_inputs_stay_within_bounds() {
        let samples = [
            "One. Two! Three? Four.",
            "No terminators here at all just a long run of words that keeps going and going",
            "Mixed...punctuation!!! with?? odd   spacing\n\nand new lines.",
            "a",
        ];
        for text in samples {
            for (size, min) in [(10, 3), (25, 10), (7, 7), (300, 100)] {
                let chunks = split_text(text, size, min);
                assert_well_formed(text, &chunks, size);
            }
        }
    }
}
