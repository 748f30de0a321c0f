//! Persistence layer: one module per entity, plus the exercise derivation
//! rules in [`exercise`].
//!
//! Every function takes a `&mut SqliteConnection` so that write paths
//! compose inside a single transaction; the HTTP handlers open the
//! transaction and commit after the model call (and any exercise rules it
//! triggered) succeed.

pub mod card;
pub mod definition;
pub mod example;
pub mod exercise;
pub mod lexical;
pub mod pronunciation;
pub mod term;
pub mod user;

use serde::Deserialize;
use sqlx::SqliteConnection;

use crate::error::ApiError;
use crate::language::Language;

/// The linguistic entity a link row points at.
///
/// Example links accept a term, a definition or a lexical entry;
/// pronunciation links accept a term, an example or a lexical entry. Both
/// families require exactly one target, which [`LinkTarget::kind`]
/// enforces.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkTarget {
    pub term: Option<String>,
    pub origin_language: Option<Language>,
    pub term_definition_id: Option<i64>,
    pub term_example_id: Option<i64>,
    pub term_lexical_id: Option<i64>,
}

/// A validated link target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkKind<'a> {
    Term {
        term: &'a str,
        origin_language: Language,
    },
    Definition(i64),
    Example(i64),
    Lexical(i64),
}

impl LinkTarget {
    /// Reduce the optional fields to the single target they describe.
    /// Zero or multiple targets (or a term without its language) is a
    /// validation error.
    pub fn kind(&self) -> Result<LinkKind<'_>, ApiError> {
        if self.term.is_some() != self.origin_language.is_some() {
            return Err(ApiError::Validation(
                "term and origin_language must be provided together".to_string(),
            ));
        }

        let mut kinds = Vec::new();
        if let (Some(term), Some(origin_language)) = (&self.term, self.origin_language) {
            kinds.push(LinkKind::Term {
                term,
                origin_language,
            });
        }
        if let Some(id) = self.term_definition_id {
            kinds.push(LinkKind::Definition(id));
        }
        if let Some(id) = self.term_example_id {
            kinds.push(LinkKind::Example(id));
        }
        if let Some(id) = self.term_lexical_id {
            kinds.push(LinkKind::Lexical(id));
        }

        match kinds.len() {
            1 => Ok(kinds.remove(0)),
            0 => Err(ApiError::Validation(
                "a link target is required: term + origin_language, \
                 term_definition_id, term_example_id or term_lexical_id"
                    .to_string(),
            )),
            _ => Err(ApiError::Validation(
                "only one link target may be set".to_string(),
            )),
        }
    }

    /// Validate and canonicalize the target of an example link (a term, a
    /// definition or a lexical entry). The referenced row must exist; term
    /// text is replaced by its canonical form.
    pub async fn resolve_for_example(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<LinkTarget, ApiError> {
        match self.kind()? {
            LinkKind::Example(_) => Err(ApiError::Validation(
                "an example cannot be the target of an example link".to_string(),
            )),
            kind => resolve_kind(conn, kind).await,
        }
    }

    /// Validate and canonicalize the target of a pronunciation link (a
    /// term, an example or a lexical entry).
    pub async fn resolve_for_pronunciation(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<LinkTarget, ApiError> {
        match self.kind()? {
            LinkKind::Definition(_) => Err(ApiError::Validation(
                "a definition cannot be the target of a pronunciation link".to_string(),
            )),
            kind => resolve_kind(conn, kind).await,
        }
    }
}

async fn resolve_kind(
    conn: &mut SqliteConnection,
    kind: LinkKind<'_>,
) -> Result<LinkTarget, ApiError> {
    match kind {
        LinkKind::Term {
            term: text,
            origin_language,
        } => {
            let found = term::get(conn, text, origin_language)
                .await?
                .ok_or_else(|| ApiError::NotFound("term not found".to_string()))?;
            Ok(LinkTarget {
                term: Some(found.term),
                origin_language: Some(found.origin_language),
                ..LinkTarget::default()
            })
        }
        LinkKind::Definition(id) => {
            definition::get(conn, id)
                .await?
                .ok_or_else(|| ApiError::NotFound("definition not found".to_string()))?;
            Ok(LinkTarget {
                term_definition_id: Some(id),
                ..LinkTarget::default()
            })
        }
        LinkKind::Example(id) => {
            example::get(conn, id)
                .await?
                .ok_or_else(|| ApiError::NotFound("example not found".to_string()))?;
            Ok(LinkTarget {
                term_example_id: Some(id),
                ..LinkTarget::default()
            })
        }
        LinkKind::Lexical(id) => {
            lexical::get(conn, id)
                .await?
                .ok_or_else(|| ApiError::NotFound("lexical entry not found".to_string()))?;
            Ok(LinkTarget {
                term_lexical_id: Some(id),
                ..LinkTarget::default()
            })
        }
    }
}
