//! `DocumentManager`: the exclusive owner of open document content (spec §4.1).
//!
//! Converts LSP `contentChanges` into sequential `SourceEdit`s and produces immutable
//! snapshots. All methods lock internally; snapshots are cheaply cloned and shared.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use parking_lot::RwLock;
use tower_lsp::lsp_types::{TextDocumentContentChangeEvent, Url};
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::line_table::LineTable;

/// A single sequential edit produced while applying an LSP change list, expressed as a
/// UTF-8 byte offset range against the content *before* this edit was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEdit {
    pub start: u32,
    pub end: u32,
    pub replacement: String,
}

/// An immutable, shareable view of a document at a point in time.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: Url,
    pub language: String,
    pub version: i32,
    pub content: Arc<str>,
    pub line_table: Arc<LineTable>,
}

impl DocumentSnapshot {
    fn from_document(doc: &Document) -> Self {
        Self {
            uri: doc.uri.clone(),
            language: doc.language.clone(),
            version: doc.version,
            content: doc.content.clone(),
            line_table: doc.line_table.clone(),
        }
    }
}

/// The mutable record `DocumentManager` owns for one open document.
struct Document {
    uri: Url,
    language: String,
    version: i32,
    content: Arc<str>,
    line_table: Arc<LineTable>,
}

impl Document {
    fn new(uri: Url, language: String, version: i32, text: String) -> Self {
        let line_table = Arc::new(LineTable::new(&text));
        Self {
            uri,
            language,
            version,
            content: Arc::from(text),
            line_table,
        }
    }

    fn set_content(&mut self, content: String) {
        self.line_table = Arc::new(LineTable::new(&content));
        self.content = Arc::from(content);
    }
}

#[derive(Default)]
pub struct DocumentManager {
    documents: RwLock<FxHashMap<Url, Document>>,
}

impl DocumentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        &self,
        uri: Url,
        language: String,
        version: i32,
        text: String,
    ) -> CoreResult<DocumentSnapshot> {
        let mut documents = self.documents.write();
        if documents.contains_key(&uri) {
            return Err(CoreError::AlreadyOpen(uri.to_string()));
        }
        let doc = Document::new(uri.clone(), language, version, text);
        let snapshot = DocumentSnapshot::from_document(&doc);
        documents.insert(uri, doc);
        Ok(snapshot)
    }

    pub fn close(&self, uri: &Url) -> CoreResult<()> {
        let mut documents = self.documents.write();
        documents
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| CoreError::MissingDocument(uri.to_string()))
    }

    /// Applies `changes` sequentially, returning the pre- and post-edit snapshots plus the
    /// `SourceEdit` list each change produced (spec §4.1 "Algorithm (edit application)").
    pub fn edit(
        &self,
        uri: &Url,
        new_version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> CoreResult<(DocumentSnapshot, DocumentSnapshot, Vec<SourceEdit>)> {
        let mut documents = self.documents.write();
        let doc = documents
            .get_mut(uri)
            .ok_or_else(|| CoreError::MissingDocument(uri.to_string()))?;

        let pre_snapshot = DocumentSnapshot::from_document(doc);

        if new_version <= doc.version {
            warn!(
                uri = %uri,
                reported = new_version,
                current = doc.version,
                "document version did not advance; applying anyway"
            );
        }

        let mut edits = Vec::with_capacity(changes.len());
        for change in changes {
            match change.range {
                Some(range) => {
                    let content = doc.content.clone();
                    let (start, end) = doc
                        .line_table
                        .range_to_offsets(&content, range)
                        .unwrap_or((content.len() as u32, content.len() as u32));
                    let mut new_content = String::with_capacity(
                        content.len() - (end - start) as usize + change.text.len(),
                    );
                    new_content.push_str(&content[..start as usize]);
                    new_content.push_str(&change.text);
                    new_content.push_str(&content[end as usize..]);
                    edits.push(SourceEdit {
                        start,
                        end,
                        replacement: change.text,
                    });
                    doc.set_content(new_content);
                }
                None => {
                    let previous_len = doc.content.len() as u32;
                    edits.push(SourceEdit {
                        start: 0,
                        end: previous_len,
                        replacement: change.text.clone(),
                    });
                    doc.set_content(change.text);
                }
            }
        }
        doc.version = new_version;

        let post_snapshot = DocumentSnapshot::from_document(doc);
        Ok((pre_snapshot, post_snapshot, edits))
    }

    pub fn latest_snapshot(&self, uri: &Url) -> CoreResult<DocumentSnapshot> {
        self.documents
            .read()
            .get(uri)
            .map(DocumentSnapshot::from_document)
            .ok_or_else(|| CoreError::MissingDocument(uri.to_string()))
    }

    pub fn open_documents(&self) -> Vec<Url> {
        self.documents.read().keys().cloned().collect()
    }

    /// Compares in-memory text to on-disk bytes. Returns true (modified) if the file
    /// cannot be read, per spec §4.1.
    pub fn file_has_in_memory_modifications(&self, uri: &Url) -> bool {
        let Some(doc) = self.documents.read().get(uri).map(DocumentSnapshot::from_document) else {
            return false;
        };
        let Ok(path) = uri.to_file_path() else {
            return true;
        };
        match std::fs::read(&path) {
            Ok(bytes) => bytes != doc.content.as_bytes(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Position, Range};

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn open_then_close_round_trips() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager
            .open(u.clone(), "swift".into(), 1, "let x = 1".into())
            .unwrap();
        assert_eq!(manager.open_documents(), vec![u.clone()]);
        manager.close(&u).unwrap();
        assert!(manager.open_documents().is_empty());
    }

    #[test]
    fn reopening_an_open_document_fails() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager.open(u.clone(), "swift".into(), 1, "x".into()).unwrap();
        let err = manager.open(u, "swift".into(), 1, "x".into()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::State);
    }

    #[test]
    fn ranged_edit_produces_expected_content() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager
            .open(u.clone(), "swift".into(), 1, "let x = 1".into())
            .unwrap();

        let change = TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(0, 8), Position::new(0, 9))),
            range_length: None,
            text: "2".into(),
        };
        let (pre, post, edits) = manager.edit(&u, 2, vec![change]).unwrap();
        assert_eq!(pre.content.as_ref(), "let x = 1");
        assert_eq!(post.content.as_ref(), "let x = 2");
        assert_eq!(post.version, 2);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].replacement, "2");
    }

    #[test]
    fn full_text_replacement_resets_line_table() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager
            .open(u.clone(), "swift".into(), 1, "a\nb".into())
            .unwrap();
        let change = TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "x\ny\nz".into(),
        };
        let (_, post, edits) = manager.edit(&u, 2, vec![change]).unwrap();
        assert_eq!(post.content.as_ref(), "x\ny\nz");
        assert_eq!(post.line_table.line_count(), 3);
        assert_eq!(edits[0].start, 0);
        assert_eq!(edits[0].end, 3);
    }

    #[test]
    fn non_advancing_version_is_still_applied() {
        let manager = DocumentManager::new();
        let u = uri("file:///a.swift");
        manager.open(u.clone(), "swift".into(), 5, "a".into()).unwrap();
        let change = TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "b".into(),
        };
        let (_, post, _) = manager.edit(&u, 3, vec![change]).unwrap();
        assert_eq!(post.content.as_ref(), "b");
        assert_eq!(post.version, 3);
    }

    #[test]
    fn missing_document_in_memory_modifications_is_false() {
        let manager = DocumentManager::new();
        assert!(!manager.file_has_in_memory_modifications(&uri("file:///missing.swift")));
    }
}
