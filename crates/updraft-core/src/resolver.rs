//! Picks which manifest entries apply to the installed version.

use crate::manifest::UpdateDescriptor;

/// Returns the updates to apply, in application order.
///
/// Entries are sorted ascending by `minimum_version` (stable, so server order
/// breaks ties) and only those with `minimum_version >= current_version` are
/// kept. Packages whose minimum lies below the installed version are treated
/// as already superseded. An empty result means the installation is current.
pub fn resolve(manifest: &[UpdateDescriptor], current_version: u32) -> Vec<UpdateDescriptor> {
    let mut applicable: Vec<UpdateDescriptor> = manifest
        .iter()
        .filter(|d| d.minimum_version >= current_version)
        .cloned()
        .collect();
    applicable.sort_by_key(|d| d.minimum_version);
    applicable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(version: u32, minimum_version: u32) -> UpdateDescriptor {
        UpdateDescriptor {
            version,
            minimum_version,
            file_address: format!("https://example.com/v{}.zip", version),
            content_hash: None,
        }
    }

    #[test]
    fn keeps_chain_from_current_version_in_order() {
        let manifest = vec![desc(7, 6), desc(6, 5)];
        let out = resolve(&manifest, 5);
        let versions: Vec<u32> = out.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![6, 7]);
    }

    #[test]
    fn drops_entries_below_current_version() {
        // minimum_version < current is excluded; equal is kept.
        let manifest = vec![desc(3, 2), desc(5, 4), desc(6, 5)];
        let out = resolve(&manifest, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].version, 6);
    }

    #[test]
    fn entry_requiring_newer_install_is_still_kept() {
        // Literal ">=" filter: a package whose minimum is above the installed
        // version is kept and ordered after lower minimums.
        let manifest = vec![desc(10, 9), desc(6, 5)];
        let out = resolve(&manifest, 5);
        let versions: Vec<u32> = out.iter().map(|d| d.version).collect();
        assert_eq!(versions, vec![6, 10]);
    }

    #[test]
    fn empty_manifest_yields_empty_set() {
        assert!(resolve(&[], 0).is_empty());
    }

    #[test]
    fn fully_updated_install_yields_empty_set() {
        let manifest = vec![desc(6, 5), desc(7, 6)];
        assert!(resolve(&manifest, 7).is_empty());
    }

    #[test]
    fn ties_keep_server_order() {
        let mut a = desc(6, 5);
        a.file_address = "https://example.com/a".into();
        let mut b = desc(6, 5);
        b.file_address = "https://example.com/b".into();
        let out = resolve(&[a, b], 5);
        assert_eq!(out[0].file_address, "https://example.com/a");
        assert_eq!(out[1].file_address, "https://example.com/b");
    }

    #[test]
    fn output_sorted_and_filtered_for_assorted_inputs() {
        let manifest: Vec<UpdateDescriptor> = [9u32, 1, 4, 4, 12, 0, 7, 3]
            .iter()
            .enumerate()
            .map(|(i, &min)| desc(min + 1 + i as u32, min))
            .collect();
        for current in 0..14 {
            let out = resolve(&manifest, current);
            assert!(out.windows(2).all(|w| w[0].minimum_version <= w[1].minimum_version));
            assert!(out.iter().all(|d| d.minimum_version >= current));
            let expected = manifest.iter().filter(|d| d.minimum_version >= current).count();
            assert_eq!(out.len(), expected);
        }
    }
}
