//! Cross-language rename engine (spec §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tower_lsp::lsp_types::{TextEdit, Url};

use crate::document::DocumentManager;
use crate::error::CoreError;
use crate::index::{deterministic_first, OccurrenceRole, SemanticIndex};
use crate::language_service::{LanguageFamily, LanguageService, RenameSeed, SourceLocation};

/// `{definition-language, native-name, other-language-name?}` (spec §3 `CrossLanguageName`).
#[derive(Debug, Clone)]
pub struct CrossLanguageName {
    pub definition_language: LanguageFamily,
    pub native_name: String,
    pub other_language_name: Option<String>,
}

/// A backend keyed by the language family it serves, for the purposes of this engine.
pub trait LanguageServiceLookup {
    fn service_for(&self, family: LanguageFamily) -> Option<Arc<dyn LanguageService>>;
    fn service_for_uri(&self, uri: &Url) -> Option<Arc<dyn LanguageService>>;
}

pub struct RenameRequest<'a> {
    pub uri: Url,
    pub position: tower_lsp::lsp_types::Position,
    pub new_name: String,
    pub index: Option<&'a dyn SemanticIndex>,
    pub services: &'a dyn LanguageServiceLookup,
    pub documents: &'a DocumentManager,
}

/// Runs the full algorithm in spec §4.6 and returns a workspace edit keyed by URI.
pub async fn cross_language_rename(
    request: RenameRequest<'_>,
) -> Result<HashMap<Url, Vec<TextEdit>>, CoreError> {
    let owning_service = request
        .services
        .service_for_uri(&request.uri)
        .ok_or_else(|| CoreError::NoWorkspace(request.uri.to_string()))?;

    // Step 1: local rename seed.
    let seed: RenameSeed = owning_service
        .rename(&request.uri, request.position, &request.new_name)
        .await?;

    // Step 2: bail-outs.
    let Some(usr) = seed.usr.clone() else {
        return Ok(seed.edits);
    };
    let Some(index) = request.index else {
        return Ok(seed.edits);
    };
    if index.file_deleted(&request.uri).await {
        return Ok(seed.edits);
    }

    // Step 3: cross-language name resolution (old and new names).
    let old_definitions = index
        .occurrences(&usr, &[OccurrenceRole::Definition])
        .await;
    let old_def = deterministic_first(&old_definitions);
    let cross_name = match old_def {
        Some(def) => {
            resolve_cross_language_name(def.provider, &usr, &request, request.services, index).await
        }
        None => None,
    };

    // Step 4: override closure.
    let closure = override_closure(&usr, index).await;

    // Step 5: occurrence gathering, grouped by URI. Each location keeps the USR it was
    // found for, so step 6 can tell "this is the rename USR itself" from "this is an
    // override-related USR" — the two have different auto-coverage rules below.
    let mut by_uri: FxHashMap<Url, Vec<(SourceLocation, OccurrenceRole, String)>> =
        FxHashMap::default();
    for member in &closure {
        let occurrences = index
            .occurrences(
                member,
                &[
                    OccurrenceRole::Declaration,
                    OccurrenceRole::Definition,
                    OccurrenceRole::Reference,
                ],
            )
            .await;
        for occurrence in occurrences {
            by_uri.entry(occurrence.uri.clone()).or_default().push((
                occurrence.location,
                occurrence.role,
                member.clone(),
            ));
        }
    }

    // Step 6: dedup against local edits. The backend that produced the seed (`seed_family`,
    // the family owning the rename's original URI — not an individual occurrence's
    // `provider`) already covers `usr` itself in files it returned edits for. For
    // override-related USRs the rule flips: the clang-family backend auto-covers overrides
    // in files it emits edits for, the AST backend never does, so only the clang-family
    // case is skipped.
    let mut edits: FxHashMap<Url, Vec<TextEdit>> = FxHashMap::default();
    for (uri, file_edits) in seed.edits {
        edits.entry(uri).or_default().extend(file_edits);
    }
    let seed_covered_uris: FxHashSet<Url> = edits.keys().cloned().collect();
    let seed_family = crate::language_service::family_for_uri(&request.uri);

    // Steps 7-8: per-file conversion plus function-body parameter renames.
    for (uri, locations) in by_uri {
        let locations: Vec<_> = locations
            .into_iter()
            .filter(|(_, _, member)| {
                if *member == usr {
                    !seed_covered_uris.contains(&uri)
                } else {
                    seed_family != LanguageFamily::ClangFamily
                }
            })
            .collect();
        if locations.is_empty() {
            continue;
        }
        let Some(service) = request.services.service_for_uri(&uri) else {
            continue;
        };
        let snapshot = request
            .documents
            .latest_snapshot(&uri)
            .or_else(|_| load_on_disk_snapshot(&uri))?;

        let old_name = cross_name
            .as_ref()
            .map(|n| n.native_name.clone())
            .unwrap_or_default();
        let locs: Vec<SourceLocation> = locations.iter().map(|(loc, _, _)| *loc).collect();
        let mut file_edits = service
            .edits_to_rename(&locs, &snapshot, &old_name, &request.new_name)
            .await?;

        for (location, role, _) in &locations {
            if *role == OccurrenceRole::Definition {
                let extra = service
                    .edits_to_rename_parameters_in_function_body(
                        &snapshot,
                        *location,
                        &request.new_name,
                    )
                    .await?;
                file_edits.extend(extra);
            }
        }

        // Step 9: no-op filtering.
        file_edits.retain(|edit| !is_noop(&snapshot, edit));

        if !file_edits.is_empty() {
            edits.entry(uri).or_default().extend(file_edits);
        }
    }

    Ok(edits.into_iter().collect())
}

async fn resolve_cross_language_name(
    definition_family: LanguageFamily,
    usr: &str,
    request: &RenameRequest<'_>,
    services: &dyn LanguageServiceLookup,
    index: &dyn SemanticIndex,
) -> Option<CrossLanguageName> {
    let references = index
        .occurrences(usr, &[OccurrenceRole::Reference])
        .await;

    match definition_family {
        LanguageFamily::ClangFamily => {
            let ast_reference = references
                .iter()
                .find(|occurrence| occurrence.provider == LanguageFamily::AstLanguage)?;
            let ast_service = services.service_for(LanguageFamily::AstLanguage)?;
            let snapshot = request
                .documents
                .latest_snapshot(&ast_reference.uri)
                .ok()?;
            let translated = ast_service
                .translate_to_ast_language(
                    ast_reference.location,
                    &snapshot,
                    false,
                    &request.new_name,
                )
                .await
                .ok()?;
            Some(CrossLanguageName {
                definition_language: definition_family,
                native_name: request.new_name.clone(),
                other_language_name: translated,
            })
        }
        LanguageFamily::AstLanguage => {
            let clang_reference = references
                .iter()
                .find(|occurrence| occurrence.provider == LanguageFamily::ClangFamily)?;
            let ast_service = services.service_for(LanguageFamily::AstLanguage)?;
            let translated = ast_service
                .translate_to_clang_family(
                    clang_reference.location,
                    &clang_reference.uri,
                    &request.new_name,
                )
                .await
                .ok()?;
            Some(CrossLanguageName {
                definition_language: definition_family,
                native_name: request.new_name.clone(),
                other_language_name: translated,
            })
        }
    }
}

/// Repeated `overrideOf` queries in both directions until no new USR is found (spec §4.6
/// step 4).
async fn override_closure(usr: &str, index: &dyn SemanticIndex) -> FxHashSet<String> {
    let mut closure = FxHashSet::default();
    closure.insert(usr.to_string());
    let mut frontier = vec![usr.to_string()];
    while let Some(member) = frontier.pop() {
        for related in index.override_relation(&member).await {
            if closure.insert(related.clone()) {
                frontier.push(related);
            }
        }
    }
    closure
}

fn load_on_disk_snapshot(uri: &Url) -> Result<crate::document::DocumentSnapshot, CoreError> {
    let path = uri
        .to_file_path()
        .map_err(|_| CoreError::MissingDocument(uri.to_string()))?;
    let content = std::fs::read_to_string(&path)
        .map_err(|err| CoreError::Backend(format!("failed to read {}: {err}", path.display())))?;
    Ok(crate::document::DocumentSnapshot {
        uri: uri.clone(),
        language: String::new(),
        version: 0,
        content: Arc::from(content.as_str()),
        line_table: Arc::new(crate::line_table::LineTable::new(&content)),
    })
}

fn is_noop(snapshot: &crate::document::DocumentSnapshot, edit: &TextEdit) -> bool {
    let Some((start, end)) = snapshot
        .line_table
        .range_to_offsets(&snapshot.content, edit.range)
    else {
        return false;
    };
    snapshot
        .content
        .get(start as usize..end as usize)
        .is_some_and(|existing| existing == edit.new_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_edit_is_detected() {
        let content = "let x = 1";
        let snapshot = crate::document::DocumentSnapshot {
            uri: Url::parse("file:///a.swift").unwrap(),
            language: "swift".into(),
            version: 1,
            content: Arc::from(content),
            line_table: Arc::new(crate::line_table::LineTable::new(content)),
        };
        let edit = TextEdit {
            range: tower_lsp::lsp_types::Range::new(
                tower_lsp::lsp_types::Position::new(0, 4),
                tower_lsp::lsp_types::Position::new(0, 5),
            ),
            new_text: "x".into(),
        };
        assert!(is_noop(&snapshot, &edit));
    }
}
