//! Core linguistic vocabulary shared by every entity: the supported
//! languages, CEFR proficiency levels, part-of-speech tags and lexical
//! relation kinds.
//!
//! All of these serialize to short lowercase wire strings (`"pt"`, `"A1"`,
//! `"noun"`, `"antonym"`) both in JSON and in the database.

use serde::{Deserialize, Serialize};

/// A language supported by the platform, identified by its ISO 639-1 code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Language {
    Pt,
    En,
    De,
    Fr,
    Es,
    It,
    Zh,
    Ja,
    Ru,
}

impl Language {
    /// The ISO 639-1 code, e.g. `"pt"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Pt => "pt",
            Language::En => "en",
            Language::De => "de",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::It => "it",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::Ru => "ru",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// CEFR proficiency level attached to definitions and examples.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

/// Part-of-speech tag of a definition.
///
/// `Lexical` marks definitions attached to a lexical entry (an idiom or
/// inflected form) rather than to the base term itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Adjective,
    Noun,
    Verb,
    Adverb,
    Conjunction,
    Preposition,
    Pronoun,
    Determiner,
    Number,
    Predeterminer,
    Prefix,
    Suffix,
    Slang,
    Lexical,
}

/// Kind of relation between a term and a lexical value string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TermLexicalType {
    Synonym,
    Antonym,
    Form,
    Idiom,
}
