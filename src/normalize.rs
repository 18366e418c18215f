use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Słowa administracyjne usuwane z nazw (tylko całe słowa).
static ADMIN_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:megye|county)\b").expect("valid suffix pattern"));

/// Pola, pod którymi pliki z granicami trzymają nazwę megye (kolejność = priorytet).
pub const REGION_NAME_FIELDS: &[&str] = &[
    "name", "NAME", "NAME_1", "megye", "megye_nev", "megyeNev",
    "county", "County", "COUNTY", "MEGYE", "NEV", "Név", "nev",
    "NUTS_NAME", "NUTS_NAME_HU", "TER_NEV", "TERNEV", "megye_name",
];

/// Pola nazwy regionu w liście miejscowości.
pub const ENTRY_NAME_FIELDS: &[&str] = &["county_name", "megye", "name", "megye_nev", "county"];

/// Pola nazwy pojedynczego miasta.
pub const PLACE_NAME_FIELDS: &[&str] = &["city_name", "name"];

/// Zamienia dowolną nazwę na klucz porównawczy:
/// bez diakrytyków, bez słowa "megye"/"county", małe litery, pojedyncze spacje.
pub fn normalize_key(raw: &str) -> String {
    let stripped: String = raw
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    let without_suffix = ADMIN_SUFFIX.replace_all(&stripped, "");
    without_suffix.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pierwsze niepuste pole tekstowe z listy kandydatów.
pub fn first_non_empty(props: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|field| {
        props
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Pierwsze pole liczbowe (skończone) z listy kandydatów.
pub fn first_number(props: &Map<String, Value>, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|field| props.get(*field).and_then(Value::as_f64))
        .filter(|v| v.is_finite())
}
