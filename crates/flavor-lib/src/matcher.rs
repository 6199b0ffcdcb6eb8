//! Flavor matching and backfill
//!
//! A request matches a flavor when every resource it declares is present in
//! the flavor with an equal quantity. The first matching flavor in catalog
//! order wins, and the resources the flavor defines but the request omits are
//! copied into the request.

use crate::catalog::{Flavor, FlavorCatalog, ResourceBundle};

/// Result of checking one container's requests against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerVerdict<'c> {
    /// The container declares no requests at all
    Empty,
    /// No flavor contains every declared resource with the declared amount
    NoMatch,
    /// `flavor` matched; `backfilled` lists the resources copied into the request
    Matched {
        flavor: &'c Flavor,
        backfilled: Vec<String>,
    },
}

impl ContainerVerdict<'_> {
    pub fn is_match(&self) -> bool {
        matches!(self, ContainerVerdict::Matched { .. })
    }
}

/// Whether every resource in `request` appears in `flavor` with the same value
pub fn match_flavor(flavor: &Flavor, request: &ResourceBundle) -> bool {
    request
        .iter()
        .all(|(name, quantity)| flavor.resources.get(name) == Some(quantity))
}

/// Match `request` against the catalog, backfilling it from the first match
///
/// `request` is written only when a flavor matches. An empty request never
/// matches.
pub fn admit_container<'c>(
    catalog: &'c FlavorCatalog,
    request: &mut ResourceBundle,
) -> ContainerVerdict<'c> {
    if request.is_empty() {
        return ContainerVerdict::Empty;
    }

    let Some(flavor) = catalog.iter().find(|flavor| match_flavor(flavor, request)) else {
        return ContainerVerdict::NoMatch;
    };

    let mut backfilled = Vec::new();
    for (name, quantity) in &flavor.resources {
        if !request.contains_key(name) {
            request.insert(name.clone(), quantity.clone());
            backfilled.push(name.clone());
        }
    }

    ContainerVerdict::Matched { flavor, backfilled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;

    fn bundle(pairs: &[(&str, &str)]) -> ResourceBundle {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Quantity::parse(v).unwrap()))
            .collect()
    }

    fn flavor(name: &str, pairs: &[(&str, &str)]) -> Flavor {
        Flavor::new(name, bundle(pairs))
    }

    fn standard_catalog() -> FlavorCatalog {
        FlavorCatalog::from_flavors([
            flavor("small", &[("cpu", "250m"), ("memory", "1Gi")]),
            flavor("nano", &[("cpu", "125m"), ("memory", "128Mi")]),
        ])
    }

    /// Every non-empty subset of a flavor's resources completes to the flavor
    #[test]
    fn test_every_subset_backfills_to_its_flavor() {
        let catalog = FlavorCatalog::from_flavors([
            flavor("gpu", &[("cpu", "4"), ("memory", "16Gi"), ("nvidia.com/gpu", "1")]),
            flavor("small", &[("cpu", "250m"), ("memory", "1Gi")]),
        ]);

        for flavor in catalog.iter() {
            let names: Vec<&String> = flavor.resources.keys().collect();
            for mask in 1..(1u32 << names.len()) {
                let mut request: ResourceBundle = names
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1u32 << *i) != 0)
                    .map(|(_, name)| ((*name).clone(), flavor.resources[*name].clone()))
                    .collect();
                let declared = request.len();

                let verdict = admit_container(&catalog, &mut request);

                match verdict {
                    ContainerVerdict::Matched {
                        flavor: matched,
                        backfilled,
                    } => {
                        assert_eq!(matched.name, flavor.name);
                        assert_eq!(backfilled.len(), flavor.resources.len() - declared);
                    }
                    other => panic!("subset {mask:b} of {} did not match: {other:?}", flavor.name),
                }
                assert_eq!(request, flavor.resources);
            }
        }
    }

    #[test]
    fn test_partial_request_is_backfilled() {
        let catalog = standard_catalog();
        let mut request = bundle(&[("memory", "1Gi")]);

        let verdict = admit_container(&catalog, &mut request);

        assert_eq!(
            verdict,
            ContainerVerdict::Matched {
                flavor: catalog.get("small").unwrap(),
                backfilled: vec!["cpu".to_string()],
            }
        );
        assert_eq!(request, bundle(&[("cpu", "250m"), ("memory", "1Gi")]));
        assert_eq!(request["cpu"].as_str(), "250m");
    }

    #[test]
    fn test_unknown_value_is_rejected_without_mutation() {
        let catalog = standard_catalog();
        let mut request = bundle(&[("cpu", "300m")]);

        assert_eq!(
            admit_container(&catalog, &mut request),
            ContainerVerdict::NoMatch
        );
        assert_eq!(request, bundle(&[("cpu", "300m")]));
    }

    #[test]
    fn test_one_wrong_dimension_spoils_the_match() {
        let catalog = standard_catalog();
        let mut request = bundle(&[("cpu", "250m"), ("memory", "128Mi")]);
        assert!(!admit_container(&catalog, &mut request).is_match());

        let mut request = bundle(&[("cpu", "250m"), ("ephemeral-storage", "1Gi")]);
        assert!(!admit_container(&catalog, &mut request).is_match());
    }

    #[test]
    fn test_full_match_is_unchanged() {
        let catalog = standard_catalog();
        let mut request = bundle(&[("cpu", "125m"), ("memory", "128Mi")]);

        let verdict = admit_container(&catalog, &mut request);

        assert_eq!(
            verdict,
            ContainerVerdict::Matched {
                flavor: catalog.get("nano").unwrap(),
                backfilled: vec![],
            }
        );
        assert_eq!(request, bundle(&[("cpu", "125m"), ("memory", "128Mi")]));
    }

    #[test]
    fn test_empty_request_never_matches() {
        let catalog = standard_catalog();
        let mut request = ResourceBundle::new();

        assert_eq!(admit_container(&catalog, &mut request), ContainerVerdict::Empty);
        assert!(request.is_empty());
    }

    #[test]
    fn test_equivalent_spellings_match() {
        let catalog =
            FlavorCatalog::from_flavors([flavor("one-core", &[("cpu", "1"), ("memory", "1Gi")])]);
        let mut request = bundle(&[("cpu", "1000m"), ("memory", "1024Mi")]);

        assert!(admit_container(&catalog, &mut request).is_match());
        // Declared values keep the request's own spelling
        assert_eq!(request["cpu"].as_str(), "1000m");
    }

    #[test]
    fn test_first_flavor_in_catalog_order_wins() {
        let catalog = FlavorCatalog::from_flavors([
            flavor("burst", &[("cpu", "500m"), ("memory", "2Gi")]),
            flavor("steady", &[("cpu", "500m"), ("memory", "1Gi")]),
        ]);
        let mut request = bundle(&[("cpu", "500m")]);

        match admit_container(&catalog, &mut request) {
            ContainerVerdict::Matched { flavor, .. } => assert_eq!(flavor.name, "burst"),
            other => panic!("expected a match, got {other:?}"),
        }
        assert_eq!(request["memory"], Quantity::parse("2Gi").unwrap());
    }

    #[test]
    fn test_empty_catalog_rejects() {
        let catalog = FlavorCatalog::default();
        let mut request = bundle(&[("cpu", "1")]);
        assert_eq!(admit_container(&catalog, &mut request), ContainerVerdict::NoMatch);
    }

    #[test]
    fn test_match_flavor_ignores_dimension_order() {
        let small = flavor("small", &[("memory", "1Gi"), ("cpu", "250m")]);
        assert!(match_flavor(&small, &bundle(&[("cpu", "250m"), ("memory", "1Gi")])));
        assert!(match_flavor(&small, &bundle(&[("memory", "1Gi")])));
        assert!(!match_flavor(&small, &bundle(&[("memory", "2Gi")])));
    }
}
