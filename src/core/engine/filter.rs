// src/core/engine/filter.rs

use tracing::{debug, info};

use crate::core::models::ResultStore;

/// Removes every entry whose JSON rendering mentions one of `providers`
/// (case-insensitive). Strategies left without entries are dropped.
///
/// # Returns
/// The number of entries removed.
pub fn hide_providers(results: &mut ResultStore, providers: &[String]) -> usize {
    let needles: Vec<String> = providers
        .iter()
        .map(|p| p.trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    if needles.is_empty() {
        return 0;
    }

    let mut removed = 0;
    for (strategy, entries) in results.iter_mut() {
        let before = entries.len();
        entries.retain(|entry| {
            let rendered = entry.to_string().to_ascii_lowercase();
            !needles.iter().any(|needle| rendered.contains(needle))
        });
        if entries.len() != before {
            debug!(%strategy, removed = before - entries.len(), "Hid provider entries.");
        }
        removed += before - entries.len();
    }
    results.retain(|_, entries| !entries.is_empty());

    if removed > 0 {
        info!(removed, providers = ?needles, "Provider filter applied.");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::probes::Strategy;
    use serde_json::json;

    #[test]
    fn matching_entries_and_empty_strategies_go() {
        let mut results = ResultStore::new();
        results.insert(Strategy::Ns, vec![json!({"example.com": {"nameservers": ["kate.ns.CLOUDFLARE.com"]}})]);
        results.insert(Strategy::Mx, vec![json!("mx1.example.com"), json!("aspmx.l.google.com")]);

        let removed = hide_providers(&mut results, &["Cloudflare".to_string(), "google".to_string()]);
        assert_eq!(removed, 2);
        assert!(!results.contains_key(&Strategy::Ns));
        assert_eq!(results[&Strategy::Mx], vec![json!("mx1.example.com")]);
    }

    #[test]
    fn blank_needles_are_ignored() {
        let mut results = ResultStore::new();
        results.insert(Strategy::Txt, vec![json!("anything")]);
        assert_eq!(hide_providers(&mut results, &["  ".to_string()]), 0);
        assert_eq!(results.len(), 1);
    }
}
