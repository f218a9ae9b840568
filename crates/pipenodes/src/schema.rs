//! Helpers shared by the typed operation configs.

use pipecore::{Config, Dataset};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parses a config record into its typed form.
pub(crate) fn parse<T: DeserializeOwned>(config: &Config) -> Option<T> {
    serde_json::from_value(config.clone()).ok()
}

/// Serialized default of a typed config.
pub(crate) fn default_of<T: Default + Serialize>() -> Option<Config> {
    serde_json::to_value(T::default()).ok()
}

/// Applies `repair` to the typed form of `config`.
///
/// The original record is returned untouched when it does not parse or when
/// the repair changes nothing, so unknown fields survive no-op passes.
pub(crate) fn realign_typed<T, F>(config: &Config, repair: F) -> Config
where
    T: DeserializeOwned + Serialize + Clone + PartialEq,
    F: FnOnce(&mut T),
{
    let Some(mut typed) = parse::<T>(config) else {
        return config.clone();
    };
    let before = typed.clone();
    repair(&mut typed);
    if typed == before {
        return config.clone();
    }
    serde_json::to_value(typed).unwrap_or_else(|_| config.clone())
}

/// Nulls `column` if it is set but missing from `dataset`.
pub(crate) fn keep_present(column: &mut Option<String>, dataset: &Dataset) {
    if column.as_deref().is_some_and(|c| !dataset.has_column(c)) {
        *column = None;
    }
}

/// Strictly between 0 and 1.
pub(crate) fn open_unit(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

/// `column` is set and present in `dataset`.
pub(crate) fn present(column: &Option<String>, dataset: &Dataset) -> bool {
    column.as_deref().is_some_and(|c| dataset.has_column(c))
}
