// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Locating the App installation for an owner or repository.
//!
//! An owner login may belong to an organization or a user, and GitHub exposes the
//! two through separate endpoints. Depending on [OwnerMode] we probe the organization
//! namespace, the user namespace, or both (organization first). Each probe ends in a
//! [NamespaceProbe] state and [select_owner_installation] decides the outcome.

use {
    crate::client::{ApiError, AppsApi, Installation, InstallationLookup},
    thiserror::Error,
};

/// Which installation namespaces to probe for an owner.
///
/// At least one namespace is always enabled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OwnerMode {
    try_org: bool,
    try_user: bool,
}

impl OwnerMode {
    /// Probe the organization namespace, then the user namespace.
    pub const fn org_or_user() -> Self {
        Self {
            try_org: true,
            try_user: true,
        }
    }

    pub const fn org_only() -> Self {
        Self {
            try_org: true,
            try_user: false,
        }
    }

    pub const fn user_only() -> Self {
        Self {
            try_org: false,
            try_user: true,
        }
    }

    pub fn try_org(&self) -> bool {
        self.try_org
    }

    pub fn try_user(&self) -> bool {
        self.try_user
    }
}

impl Default for OwnerMode {
    fn default() -> Self {
        Self::org_or_user()
    }
}

/// State of one installation namespace during owner resolution.
#[derive(Debug)]
pub enum NamespaceProbe {
    NotTried,
    NotFound,
    Found(Installation),
    Failed(ApiError),
}

impl From<InstallationLookup> for NamespaceProbe {
    fn from(lookup: InstallationLookup) -> Self {
        match lookup {
            InstallationLookup::Found(installation) => Self::Found(installation),
            InstallationLookup::NotFound => Self::NotFound,
            InstallationLookup::Failed(e) => Self::Failed(e),
        }
    }
}

/// Decide the owner installation from the organization and user probes.
///
/// * Any organization failure other than not found is fatal.
/// * The user namespace is the last resort: every user failure, including not found, is
///   fatal.
/// * A user installation takes precedence over an organization installation when both
///   are found.
/// * An organization not found is only fatal when nothing else turns up.
pub fn select_owner_installation(
    owner: &str,
    org: NamespaceProbe,
    user: NamespaceProbe,
) -> Result<Installation, ResolveError> {
    match (org, user) {
        (NamespaceProbe::Failed(source), _) => Err(ResolveError::OrgLookup {
            owner: owner.to_string(),
            source,
        }),
        (_, NamespaceProbe::Failed(source)) => Err(ResolveError::UserLookup {
            owner: owner.to_string(),
            source: LookupFailure::Api(source),
        }),
        (_, NamespaceProbe::NotFound) => Err(ResolveError::UserLookup {
            owner: owner.to_string(),
            source: LookupFailure::NotFound,
        }),
        (_, NamespaceProbe::Found(installation)) => Ok(installation),
        (NamespaceProbe::Found(installation), NamespaceProbe::NotTried) => Ok(installation),
        (NamespaceProbe::NotTried | NamespaceProbe::NotFound, NamespaceProbe::NotTried) => {
            Err(ResolveError::NotFound {
                owner: owner.to_string(),
            })
        }
    }
}

/// Find the installation for an organization or user account.
///
/// Probes run sequentially. The user namespace isn't probed once the organization probe
/// failed.
pub fn resolve_owner_installation(
    api: &impl AppsApi,
    owner: &str,
    mode: OwnerMode,
) -> Result<Installation, ResolveError> {
    let org = if mode.try_org {
        log::debug!("looking up organization installation for '{owner}'");
        NamespaceProbe::from(api.find_organization_installation(owner))
    } else {
        NamespaceProbe::NotTried
    };

    let user = match &org {
        NamespaceProbe::Failed(_) => NamespaceProbe::NotTried,
        _ if mode.try_user => {
            if matches!(org, NamespaceProbe::NotFound) {
                log::debug!("no organization installation for '{owner}'");
            }
            log::debug!("looking up user installation for '{owner}'");
            NamespaceProbe::from(api.find_user_installation(owner))
        }
        _ => NamespaceProbe::NotTried,
    };

    if matches!(
        (&org, &user),
        (NamespaceProbe::Found(_), NamespaceProbe::Found(_))
    ) {
        log::warn!(
            "'{owner}' has both an organization and a user installation; using the user one"
        );
    }

    let installation = select_owner_installation(owner, org, user)?;
    log::info!("found installation {} for '{owner}'", installation.id);

    Ok(installation)
}

/// Find the installation for an organization account.
pub fn resolve_org_installation(
    api: &impl AppsApi,
    org: &str,
) -> Result<Installation, ResolveError> {
    resolve_owner_installation(api, org, OwnerMode::org_only())
}

/// Find the installation for a user account.
pub fn resolve_user_installation(
    api: &impl AppsApi,
    user: &str,
) -> Result<Installation, ResolveError> {
    resolve_owner_installation(api, user, OwnerMode::user_only())
}

/// Find the installation with access to `owner/repo`.
///
/// There is no fallback: not found is fatal.
pub fn resolve_repo_installation(
    api: &impl AppsApi,
    owner: &str,
    repo: &str,
) -> Result<Installation, ResolveError> {
    log::debug!("looking up repository installation for '{owner}/{repo}'");

    let source = match api.find_repository_installation(owner, repo) {
        InstallationLookup::Found(installation) => {
            log::info!("found installation {} for '{owner}/{repo}'", installation.id);
            return Ok(installation);
        }
        InstallationLookup::NotFound => LookupFailure::NotFound,
        InstallationLookup::Failed(e) => LookupFailure::Api(e),
    };

    Err(ResolveError::RepoLookup {
        owner: owner.to_string(),
        repo: repo.to_string(),
        source,
    })
}

/// Why a lookup without fallback failed.
#[derive(Debug, Error)]
pub enum LookupFailure {
    #[error("installation not found")]
    NotFound,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to find org '{owner}'")]
    OrgLookup {
        owner: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to find user '{owner}'")]
    UserLookup {
        owner: String,
        #[source]
        source: LookupFailure,
    },

    #[error("failed to find repo '{owner}/{repo}'")]
    RepoLookup {
        owner: String,
        repo: String,
        #[source]
        source: LookupFailure,
    },

    #[error("installation not found for '{owner}'")]
    NotFound { owner: String },
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::testutil::{installation, FakeApi, Reply},
    };

    fn failure(status: u16) -> ApiError {
        ApiError::Response {
            method: "GET".into(),
            url: "https://api.github.com/".into(),
            status,
            message: String::new(),
        }
    }

    #[test]
    fn selection_table() {
        use NamespaceProbe::*;

        let pick = |org, user| select_owner_installation("dayflower", org, user).map(|i| i.id);

        assert_eq!(pick(Found(installation(1)), NotTried).unwrap(), 1);
        assert_eq!(pick(NotTried, Found(installation(2))).unwrap(), 2);
        assert_eq!(pick(NotFound, Found(installation(2))).unwrap(), 2);
        // User wins when both namespaces have an installation.
        assert_eq!(pick(Found(installation(1)), Found(installation(2))).unwrap(), 2);

        assert!(matches!(
            pick(NotFound, NotTried),
            Err(ResolveError::NotFound { .. })
        ));
        assert!(matches!(
            pick(NotTried, NotTried),
            Err(ResolveError::NotFound { .. })
        ));
        assert!(matches!(
            pick(Failed(failure(500)), NotTried),
            Err(ResolveError::OrgLookup { .. })
        ));
        assert!(matches!(
            pick(Found(installation(1)), NotFound),
            Err(ResolveError::UserLookup {
                source: LookupFailure::NotFound,
                ..
            })
        ));
        assert!(matches!(
            pick(NotFound, Failed(failure(403))),
            Err(ResolveError::UserLookup {
                source: LookupFailure::Api(_),
                ..
            })
        ));
    }

    #[test]
    fn org_not_found_falls_back_to_user() -> Result<(), ResolveError> {
        let api = FakeApi::new(Reply::NotFound, Reply::Found(2), Reply::NotFound);

        let installation = resolve_owner_installation(&api, "dayflower", OwnerMode::org_or_user())?;
        assert_eq!(installation.id, 2);
        assert_eq!(
            api.calls(),
            vec!["org dayflower".to_string(), "user dayflower".to_string()]
        );

        Ok(())
    }

    #[test]
    fn user_overwrites_org() -> Result<(), ResolveError> {
        let api = FakeApi::new(Reply::Found(1), Reply::Found(2), Reply::NotFound);

        let installation = resolve_owner_installation(&api, "dayflower", OwnerMode::default())?;
        assert_eq!(installation.id, 2);

        Ok(())
    }

    #[test]
    fn user_not_found_is_fatal_even_with_org_installation() {
        let api = FakeApi::new(Reply::Found(1), Reply::NotFound, Reply::NotFound);

        let err =
            resolve_owner_installation(&api, "dayflower", OwnerMode::org_or_user()).unwrap_err();
        assert!(matches!(err, ResolveError::UserLookup { .. }));
        assert_eq!(err.to_string(), "failed to find user 'dayflower'");
    }

    #[test]
    fn org_failure_skips_user() {
        let api = FakeApi::new(Reply::Fail(500), Reply::Found(2), Reply::NotFound);

        let err =
            resolve_owner_installation(&api, "dayflower", OwnerMode::org_or_user()).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::OrgLookup {
                source: ApiError::Response { status: 500, .. },
                ..
            }
        ));
        assert_eq!(api.calls(), vec!["org dayflower".to_string()]);
    }

    #[test]
    fn org_only_not_found() {
        let api = FakeApi::new(Reply::NotFound, Reply::Found(2), Reply::NotFound);

        let err = resolve_org_installation(&api, "dayflower").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(api.calls(), vec!["org dayflower".to_string()]);
    }

    #[test]
    fn org_only_found() -> Result<(), ResolveError> {
        let api = FakeApi::new(Reply::Found(1), Reply::Found(2), Reply::NotFound);

        assert_eq!(resolve_org_installation(&api, "dayflower")?.id, 1);
        assert_eq!(api.calls(), vec!["org dayflower".to_string()]);

        Ok(())
    }

    #[test]
    fn user_only() -> Result<(), ResolveError> {
        let api = FakeApi::new(Reply::Found(1), Reply::Found(2), Reply::NotFound);
        assert_eq!(resolve_user_installation(&api, "dayflower")?.id, 2);
        assert_eq!(api.calls(), vec!["user dayflower".to_string()]);

        let api = FakeApi::new(Reply::Found(1), Reply::Fail(401), Reply::NotFound);
        assert!(matches!(
            resolve_user_installation(&api, "dayflower"),
            Err(ResolveError::UserLookup {
                source: LookupFailure::Api(_),
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn repo_lookup_has_no_fallback() {
        let api = FakeApi::new(Reply::Found(1), Reply::Found(2), Reply::Found(3));
        assert_eq!(
            resolve_repo_installation(&api, "dayflower", "ghatoken")
                .unwrap()
                .id,
            3
        );

        let api = FakeApi::new(Reply::Found(1), Reply::Found(2), Reply::NotFound);
        let err = resolve_repo_installation(&api, "dayflower", "ghatoken").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::RepoLookup {
                source: LookupFailure::NotFound,
                ..
            }
        ));
        assert_eq!(err.to_string(), "failed to find repo 'dayflower/ghatoken'");
        assert_eq!(api.calls(), vec!["repo dayflower/ghatoken".to_string()]);

        let api = FakeApi::new(Reply::Found(1), Reply::Found(2), Reply::Fail(502));
        assert!(matches!(
            resolve_repo_installation(&api, "dayflower", "ghatoken"),
            Err(ResolveError::RepoLookup {
                source: LookupFailure::Api(_),
                ..
            })
        ));
    }
}
