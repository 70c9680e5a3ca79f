//! Distribution access gate.
//!
//! Decides whether a caller may use a distribution:
//! 1. Look the name up in the catalog visible to the caller's entitlement tier
//! 2. Unrestricted distributions are open to every identity
//! 3. Restricted ones require an allow-list match for the caller's organization

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::distribution::{AllDistroRegistry, DistroRegistry, DistributionFile};
use crate::security::allow_list::{AllowListError, AllowListSource};
use crate::security::identity::Identity;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Distribution not available")]
    NotFound,

    #[error("This account's organization is not authorized to build {0} images")]
    Forbidden(String),

    #[error(transparent)]
    AllowList(#[from] AllowListError),
}

/// Entitlement and allow-list checks over an injected catalog and allow-list.
#[derive(Debug, Clone)]
pub struct DistroAccessGate {
    distros: Arc<AllDistroRegistry>,
    allow_list: Arc<dyn AllowListSource>,
}

impl DistroAccessGate {
    pub fn new(distros: Arc<AllDistroRegistry>, allow_list: Arc<dyn AllowListSource>) -> Self {
        Self {
            distros,
            allow_list,
        }
    }

    /// Whether `identity` may consume RHEL content.
    ///
    /// The `rhel` entitlement is authoritative when present. Without it, a
    /// non-empty account number is accepted as a weak signal. That fallback
    /// exists for incomplete identity payloads and is not a security boundary.
    pub fn is_entitled(&self, identity: &Identity) -> bool {
        match identity.entitlement("rhel") {
            Some(entitlement) => entitlement.is_entitled,
            None => {
                let fallback = identity.account_number().is_some_and(|a| !a.is_empty());
                warn!(
                    org_id = %identity.org_id(),
                    entitled = fallback,
                    "rhel entitlement not present in identity header, using account number"
                );
                fallback
            }
        }
    }

    /// The catalog scoped to the caller's entitlement tier.
    pub fn registry_for(&self, identity: &Identity) -> &DistroRegistry {
        self.distros.available(self.is_entitled(identity))
    }

    pub fn authorize(
        &self,
        identity: &Identity,
        name: &str,
    ) -> Result<Arc<DistributionFile>, AccessError> {
        let distro = self
            .registry_for(identity)
            .get(name)
            .map_err(|_| AccessError::NotFound)?;
        self.check_restricted(identity, distro)
    }

    /// Distributions in the caller's tier that also pass the allow-list.
    pub fn permitted(&self, identity: &Identity) -> Result<Vec<Arc<DistributionFile>>, AccessError> {
        let registry = self.registry_for(identity);
        let mut out = Vec::with_capacity(registry.len());
        for distro in registry.list() {
            match self.check_restricted(identity, Arc::clone(distro)) {
                Ok(d) => out.push(d),
                Err(AccessError::Forbidden(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn check_restricted(
        &self,
        identity: &Identity,
        distro: Arc<DistributionFile>,
    ) -> Result<Arc<DistributionFile>, AccessError> {
        if !distro.is_restricted() {
            return Ok(distro);
        }
        if self.allow_list.is_allowed(identity.org_id(), distro.name())? {
            debug!(org_id = %identity.org_id(), distribution = %distro.name(), "allow-listed");
            Ok(distro)
        } else {
            Err(AccessError::Forbidden(distro.name().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::registry::tests::distro;
    use crate::security::allow_list::{AllowList, SharedAllowList};
    use std::collections::HashMap;

    fn gate(allow: &[(&str, &str)]) -> (DistroAccessGate, Arc<SharedAllowList>) {
        let distros = AllDistroRegistry::from_distributions(vec![
            distro("rhel-9", false),
            distro("rhel-10-nightly", true),
        ])
        .unwrap();
        let shared = Arc::new(SharedAllowList::new(allow_list(allow)));
        let source: Arc<dyn AllowListSource> = shared.clone();
        (DistroAccessGate::new(Arc::new(distros), source), shared)
    }

    fn allow_list(entries: &[(&str, &str)]) -> AllowList {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (org, pattern) in entries {
            map.entry(org.to_string()).or_default().push(pattern.to_string());
        }
        AllowList::from_map(map)
    }

    fn entitled(org: &str) -> Identity {
        Identity::new(org, Some("1")).with_entitlement("rhel", true)
    }

    #[test]
    fn test_unrestricted_allowed_without_entitlements() {
        let (g, _) = gate(&[]);
        let nobody = Identity::new("o1", None).with_entitlement("rhel", false);
        assert_eq!(g.authorize(&nobody, "rhel-9").unwrap().name(), "rhel-9");
        let bare = Identity::new("o1", None);
        assert!(g.authorize(&bare, "rhel-9").is_ok());
    }

    #[test]
    fn test_unknown_and_tier_hidden_distros_are_not_found() {
        let (g, _) = gate(&[]);
        assert!(matches!(g.authorize(&entitled("o1"), "suse-15"), Err(AccessError::NotFound)));
        let unentitled = Identity::new("o1", None).with_entitlement("rhel", false);
        assert!(matches!(
            g.authorize(&unentitled, "rhel-10-nightly"),
            Err(AccessError::NotFound)
        ));
    }

    #[test]
    fn test_restricted_flips_after_allow_list_swap() {
        let (g, shared) = gate(&[]);
        let err = g.authorize(&entitled("o1"), "rhel-10-nightly").unwrap_err();
        assert_eq!(
            err.to_string(),
            "This account's organization is not authorized to build rhel-10-nightly images"
        );

        shared.replace(allow_list(&[("o1", "rhel-10-nightly")]));
        assert!(g.authorize(&entitled("o1"), "rhel-10-nightly").is_ok());
        assert!(g.authorize(&entitled("o2"), "rhel-10-nightly").is_err());
    }

    #[test]
    fn test_broken_pattern_is_internal() {
        let (g, _) = gate(&[("o1", "(")]);
        assert!(matches!(
            g.authorize(&entitled("o1"), "rhel-10-nightly"),
            Err(AccessError::AllowList(_))
        ));
    }

    #[test]
    fn test_entitlement_fallback_on_account_number() {
        let (g, _) = gate(&[]);
        assert!(g.is_entitled(&Identity::new("o1", Some("000001"))));
        assert!(!g.is_entitled(&Identity::new("o1", Some(""))));
        assert!(!g.is_entitled(&Identity::new("o1", None)));
        let explicit_no = Identity::new("o1", Some("000001")).with_entitlement("rhel", false);
        assert!(!g.is_entitled(&explicit_no));
    }

    #[test]
    fn test_permitted_filters_forbidden() {
        let (g, shared) = gate(&[]);
        let names = |v: Vec<Arc<DistributionFile>>| v.iter().map(|d| d.name().to_string()).collect::<Vec<_>>();
        assert_eq!(names(g.permitted(&entitled("o1")).unwrap()), vec!["rhel-9"]);
        shared.replace(allow_list(&[("o1", "rhel")]));
        assert_eq!(
            names(g.permitted(&entitled("o1")).unwrap()),
            vec!["rhel-10-nightly", "rhel-9"]
        );
    }
}
