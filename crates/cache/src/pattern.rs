//! Wildcard key matching for invalidation
//!
//! Keys follow `namespace:entity` (e.g. `kyc:WALLET-1`), so
//! `*:WALLET-1` drops everything cached about one entity and
//! `kyc:*` drops a whole namespace.

/// Match `key` against `pattern`, where `*` matches any run of characters
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !key.starts_with(first) {
        return false;
    }

    let mut rest = &key[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}
