// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! In-memory [AppsApi] for tests.

use {
    crate::{
        client::{ApiError, AppsApi, Installation, InstallationLookup},
        issuer::{InstallationToken, InstallationTokenOptions},
    },
    std::{cell::RefCell, collections::BTreeMap},
};

pub(crate) fn installation(id: u64) -> Installation {
    Installation {
        id,
        account: None,
        target_type: None,
        repository_selection: None,
    }
}

fn failure(method: &str, url: String, status: u16) -> ApiError {
    ApiError::Response {
        method: method.into(),
        url,
        status,
        message: "{}".into(),
    }
}

/// Canned answer for a lookup.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Reply {
    Found(u64),
    NotFound,
    Fail(u16),
}

impl Reply {
    fn lookup(self, url: String) -> InstallationLookup {
        match self {
            Self::Found(id) => InstallationLookup::Found(installation(id)),
            Self::NotFound => InstallationLookup::NotFound,
            Self::Fail(status) => InstallationLookup::Failed(failure("GET", url, status)),
        }
    }
}

pub(crate) struct FakeApi {
    pub org: Reply,
    pub user: Reply,
    pub repo: Reply,
    /// Status to fail token requests with.
    pub token_status: Option<u16>,
    pub calls: RefCell<Vec<String>>,
    pub token_requests: RefCell<Vec<(u64, InstallationTokenOptions)>>,
}

impl FakeApi {
    pub fn new(org: Reply, user: Reply, repo: Reply) -> Self {
        Self {
            org,
            user,
            repo,
            token_status: None,
            calls: RefCell::new(vec![]),
            token_requests: RefCell::new(vec![]),
        }
    }

    /// Lookups performed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl AppsApi for FakeApi {
    fn find_organization_installation(&self, org: &str) -> InstallationLookup {
        self.calls.borrow_mut().push(format!("org {org}"));
        self.org.lookup(format!("/orgs/{org}/installation"))
    }

    fn find_user_installation(&self, user: &str) -> InstallationLookup {
        self.calls.borrow_mut().push(format!("user {user}"));
        self.user.lookup(format!("/users/{user}/installation"))
    }

    fn find_repository_installation(&self, owner: &str, repo: &str) -> InstallationLookup {
        self.calls.borrow_mut().push(format!("repo {owner}/{repo}"));
        self.repo.lookup(format!("/repos/{owner}/{repo}/installation"))
    }

    fn create_installation_token(
        &self,
        installation_id: u64,
        options: &InstallationTokenOptions,
    ) -> Result<InstallationToken, ApiError> {
        self.token_requests
            .borrow_mut()
            .push((installation_id, options.clone()));

        let url = format!("/app/installations/{installation_id}/access_tokens");

        match self.token_status {
            Some(status) => Err(failure("POST", url, status)),
            None => Ok(InstallationToken {
                token: format!("ghs_installation_{installation_id}"),
                expires_at: Some("2026-10-19T20:00:00Z".into()),
                permissions: BTreeMap::from([("contents".to_string(), "read".to_string())]),
                repository_selection: Some(
                    if options.repositories.is_some() {
                        "selected"
                    } else {
                        "all"
                    }
                    .into(),
                ),
            }),
        }
    }
}
