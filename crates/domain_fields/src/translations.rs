//! Localized labels for internal option keys

use once_cell::sync::Lazy;
use std::collections::HashMap;

static VALUE_LABELS: &[(&str, &str)] = &[
    // industry
    ("construction", "Stavebnictví"),
    ("manufacturing", "Výroba"),
    ("it", "Informační technologie"),
    ("retail", "Obchod"),
    ("services", "Služby"),
    ("other", "Jiné"),
    // employeeCount
    ("micro", "1 až 9 zaměstnanců"),
    ("small", "10 až 49 zaměstnanců"),
    ("medium", "50 až 249 zaměstnanců"),
    ("large", "250 a více zaměstnanců"),
    // services
    ("web", "Tvorba webu"),
    ("eshop", "E-shop"),
    ("marketing", "Online marketing"),
    ("seo", "Optimalizace pro vyhledávače"),
    ("consulting", "Konzultace"),
    ("support", "Technická podpora"),
    // preferredContactMethod
    ("email", "E-mail"),
    ("phone", "Telefon"),
    ("meeting", "Osobní schůzka"),
    // booleans rendered as text
    ("yes", "Ano"),
    ("no", "Ne"),
];

static LABELS: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| VALUE_LABELS.iter().copied().collect());

/// Localized label of an internal value key
pub fn translate(key: &str) -> Option<&'static str> {
    LABELS.get(key.trim()).copied()
}

/// Localized label, or the value itself when no translation exists
pub fn translate_or_keep(value: &str) -> String {
    translate(value).map_or_else(|| value.to_string(), str::to_string)
}
