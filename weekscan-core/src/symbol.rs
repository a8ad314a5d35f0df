//! Symbol normalization.
//!
//! Scanner-facing symbols are canonical: trimmed, upper-case, no exchange suffix.
//! Providers re-apply the listing suffix (e.g. `.NS`) when they call out.

/// Exchange suffixes stripped during canonicalization.
pub const EXCHANGE_SUFFIXES: &[&str] = &[".NS", ".BO"];

/// Canonical form of a symbol: `" reliance.ns "` → `"RELIANCE"`.
pub fn canonical(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    for suffix in EXCHANGE_SUFFIXES {
        if let Some(stripped) = upper.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    upper
}

/// Listing ticker for a provider call: the canonical symbol plus `suffix`.
///
/// An empty suffix returns the canonical symbol unchanged.
pub fn with_exchange_suffix(symbol: &str, suffix: &str) -> String {
    let base = canonical(symbol);
    if suffix.is_empty() {
        return base;
    }
    format!("{base}{}", suffix.to_uppercase())
}
