//! Boundary-anchored splitting of source text.
//!
//! A chunk starts at every line that looks like the start of a function or
//! class and runs until the next such line. Text before the first boundary
//! belongs to no chunk.

/// A contiguous run of lines taken verbatim from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Lines of the chunk, line terminators included.
    pub content: String,
    /// 1-based line of the boundary that opens the chunk.
    pub start_line: usize,
    /// 1-based last line, inclusive.
    pub end_line: usize,
}

/// Heuristic function/class start: a `function ` keyword, an arrow, or a
/// line opening with `class `.
pub fn is_boundary(line: &str) -> bool {
    line.contains("function ") || line.contains("=>") || line.trim_start().starts_with("class ")
}

/// Splits `text` into boundary-anchored chunks.
///
/// Pure function of its input: concatenating the returned contents
/// reproduces `text` from the first boundary line onward. A file without
/// any boundary yields no chunks.
pub fn split_into_chunks(text: &str) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let mut current: Option<TextChunk> = None;

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;

        if is_boundary(line) {
            if let Some(done) = current.take() {
                chunks.push(done);
            }
            current = Some(TextChunk {
                content: String::new(),
                start_line: line_no,
                end_line: line_no,
            });
        }

        if let Some(chunk) = current.as_mut() {
            chunk.content.push_str(line);
            chunk.end_line = line_no;
        }
    }

    if let Some(done) = current {
        chunks.push(done);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
const db = require('./db');
// preamble

async function createEvent(req) {
    return db.insert(req);
}

const remove = (id) => db.remove(id);

class EventStore {
    constructor() {}
}
";

    #[test]
    fn test_split_at_boundaries() {
        let chunks = split_into_chunks(SOURCE);
        assert_eq!(chunks.len(), 3);

        assert!(chunks[0].content.starts_with("async function createEvent"));
        assert_eq!(chunks[0].start_line, 4);
        assert_eq!(chunks[0].end_line, 7);

        assert!(chunks[1].content.starts_with("const remove"));
        assert_eq!(chunks[1].start_line, 8);

        assert!(chunks[2].content.starts_with("class EventStore"));
        assert_eq!(chunks[2].end_line, 12);
    }

    #[test]
    fn test_preamble_discarded_and_rest_reproduced() {
        let chunks = split_into_chunks(SOURCE);
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();

        let first_boundary = SOURCE.find("async function").unwrap();
        assert_eq!(joined, &SOURCE[first_boundary..]);
        assert!(!joined.contains("preamble"));
    }

    #[test]
    fn test_idempotent() {
        assert_eq!(split_into_chunks(SOURCE), split_into_chunks(SOURCE));
    }

    #[test]
    fn test_no_boundaries_yields_nothing() {
        assert!(split_into_chunks("const a = 1;\nconst b = 2;\n").is_empty());
        assert!(split_into_chunks("").is_empty());
    }

    #[test]
    fn test_consecutive_boundaries_and_missing_trailing_newline() {
        let text = "function a() {}\nfunction b() {}";
        let chunks = split_into_chunks(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "function a() {}\n");
        assert_eq!(chunks[1].content, "function b() {}");
        assert_eq!(chunks[1].start_line, 2);
    }

    #[test]
    fn test_boundary_detection() {
        assert!(is_boundary("module.exports = function makeX({ a }) {"));
        assert!(is_boundary("  items.map(x => x * 2)"));
        assert!(is_boundary("    class Foo extends Bar {"));
        assert!(!is_boundary("const functional = true;"));
        assert!(!is_boundary("const subclass = 1;"));
    }
}
