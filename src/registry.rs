//! Resolution of an existing module by identity.

use crate::host::{ModuleHandle, ModuleHost};
use crate::manifest::ModuleIdentity;

/// Finds the module whose symbolic name equals `identity`'s.
///
/// The host's module set is scanned linearly and the first exact match
/// wins. The version is not part of the key, so an update always targets
/// the existing module of the same name regardless of version skew.
/// `None` means a fresh install.
#[must_use]
pub fn find_by_identity(host: &dyn ModuleHost, identity: &ModuleIdentity) -> Option<ModuleHandle> {
    host.modules()
        .into_iter()
        .find(|module| module.symbolic_name() == Some(identity.symbolic_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MockModuleHost, ModuleId};
    use rstest::rstest;

    fn handle(id: u64, name: Option<&str>) -> ModuleHandle {
        ModuleHandle::new(ModuleId::new(id), name.map(str::to_owned), format!("loc-{id}"))
    }

    fn host_with(modules: Vec<ModuleHandle>) -> MockModuleHost {
        let mut host = MockModuleHost::new();
        host.expect_modules().return_const(modules);
        host
    }

    fn identity(name: &str, version: Option<&str>) -> ModuleIdentity {
        ModuleIdentity::from_headers(name, version).expect("valid identity")
    }

    #[test]
    fn absent_module_resolves_to_none() {
        let host = host_with(vec![handle(0, Some("system")), handle(1, None)]);
        assert!(find_by_identity(&host, &identity("org.example.foo", None)).is_none());
    }

    #[rstest]
    #[case::same_version(Some("1.0.0"))]
    #[case::other_version(Some("2.0.0"))]
    #[case::no_version(None)]
    fn match_ignores_version(#[case] version: Option<&str>) {
        let host = host_with(vec![handle(0, Some("system")), handle(7, Some("org.example.foo"))]);
        let found = find_by_identity(&host, &identity("org.example.foo", version))
            .expect("module found");
        assert_eq!(found.id(), ModuleId::new(7));
    }

    #[test]
    fn first_match_wins() {
        let host = host_with(vec![
            handle(3, Some("org.example.foo")),
            handle(4, Some("org.example.foo")),
        ]);
        let found =
            find_by_identity(&host, &identity("org.example.foo", None)).expect("module found");
        assert_eq!(found.id(), ModuleId::new(3));
    }

    #[test]
    fn match_is_case_sensitive() {
        let host = host_with(vec![handle(5, Some("Org.Example.Foo"))]);
        assert!(find_by_identity(&host, &identity("org.example.foo", None)).is_none());
    }
}
