//! `LineTable`: cached line-start offsets for UTF-8 byte offset, UTF-16 code unit, and
//! line/column conversions (spec §4.2 "Position conversion").
//!
//! Recomputing line starts by walking the whole document on every conversion (as a naive
//! implementation would) is O(n) per call; documents are edited far more often than most
//! conversions are needed per edit, so this caches line starts and invalidates the cache
//! wholesale on edit.

use tower_lsp::lsp_types::{Position, Range};
use tracing::warn;

/// Byte offsets, in the document's UTF-8 encoding, of the start of each line.
#[derive(Debug, Clone)]
pub struct LineTable {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineTable {
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in content.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            line_starts,
            len: content.len() as u32,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    fn line_start(&self, line: u32) -> Option<u32> {
        self.line_starts.get(line as usize).copied()
    }

    fn line_end(&self, line: u32) -> u32 {
        self.line_starts
            .get(line as usize + 1)
            .map(|&next| next.saturating_sub(1))
            .unwrap_or(self.len)
    }

    /// Converts a UTF-8 byte offset into an LSP `Position` (UTF-16 code units).
    /// `content` must be the same text the table was built from. An offset past end of
    /// file clamps to the end index and is fault-logged rather than panicking (spec §8).
    pub fn offset_to_position(&self, content: &str, offset: u32) -> Position {
        let offset = if offset > self.len {
            warn!(offset, len = self.len, "offset past end of file, clamping");
            self.len
        } else {
            offset
        };
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx as u32,
            Err(idx) => idx.saturating_sub(1) as u32,
        };
        let start = self.line_start(line).unwrap_or(0);
        let line_text = &content[start as usize..offset as usize];
        let character = line_text.encode_utf16().count() as u32;
        Position { line, character }
    }

    /// Converts an LSP `Position` into a UTF-8 byte offset. Returns `None` if the line or
    /// character is past the end of the document.
    pub fn position_to_offset(&self, content: &str, position: Position) -> Option<u32> {
        let start = self.line_start(position.line)?;
        let end = self.line_end(position.line);
        let line_text = &content[start as usize..end as usize];

        let mut utf16_count = 0u32;
        for (byte_idx, ch) in line_text.char_indices() {
            if utf16_count == position.character {
                return Some(start + byte_idx as u32);
            }
            utf16_count += ch.len_utf16() as u32;
        }
        if utf16_count == position.character {
            return Some(start + line_text.len() as u32);
        }
        None
    }

    pub fn range_to_offsets(&self, content: &str, range: Range) -> Option<(u32, u32)> {
        let start = self.position_to_offset(content, range.start)?;
        let end = self.position_to_offset(content, range.end)?;
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_round_trip() {
        let content = "hello world";
        let table = LineTable::new(content);
        let pos = table.offset_to_position(content, 6);
        assert_eq!(pos, Position::new(0, 6));
        assert_eq!(table.position_to_offset(content, pos), Some(6));
    }

    #[test]
    fn multi_line_offsets() {
        let content = "abc\ndef\nghi";
        let table = LineTable::new(content);
        assert_eq!(table.line_count(), 3);
        assert_eq!(table.offset_to_position(content, 4), Position::new(1, 0));
        assert_eq!(table.offset_to_position(content, 7), Position::new(1, 3));
        assert_eq!(
            table.position_to_offset(content, Position::new(2, 2)),
            Some(10)
        );
    }

    #[test]
    fn utf16_surrogate_pairs_count_as_two_units() {
        let content = "a\u{1F600}b";
        let table = LineTable::new(content);
        let emoji_end = Position::new(0, 3);
        assert_eq!(table.position_to_offset(content, emoji_end), Some(5));
        assert_eq!(table.offset_to_position(content, 5), emoji_end);
    }

    #[test]
    fn position_past_end_of_line_is_none() {
        let content = "abc\ndef";
        let table = LineTable::new(content);
        assert_eq!(
            table.position_to_offset(content, Position::new(0, 99)),
            None
        );
    }

    #[test]
    fn offset_past_end_of_file_clamps_instead_of_panicking() {
        let content = "abc\ndef";
        let table = LineTable::new(content);
        let pos = table.offset_to_position(content, 999);
        assert_eq!(pos, table.offset_to_position(content, content.len() as u32));
    }
}
