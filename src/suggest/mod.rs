//! AI title/author suggestions for the text being catalogued

mod controller;
mod provider;

pub use controller::{RequestToken, SuggestionController, SuggestionGate, SuggestionState};
pub use provider::{HttpSuggester, SuggestError, TitleAuthorSuggester, TitleAuthorSuggestion};
