//! Repo configuration updates and remote reconciliation.

use std::sync::Arc;

use tracing::{info, warn};

use refhub_types::{RefIdentifier, RefUpdate, RepoConfiguration, HEAD_REF};

use crate::error::{ServerError, ServerResult};
use crate::server::Hub;

/// Apply a configuration change to `repo` and reconcile its upstream
/// connection with the result.
///
/// The sequence is: validate the new configuration, run configurer
/// hooks, persist, then reconcile remotes. A failure partway leaves
/// earlier effects in place; there is no rollback, so a failed call
/// can leave hooks run (or the config persisted) without the upstream
/// connection reflecting it. Callers retry with a fresh configure.
pub async fn apply_config_update(
    hub: &Arc<Hub>,
    repo: &str,
    update_fn: impl FnOnce(&mut RepoConfiguration),
) -> ServerResult<()> {
    let (old, new) = {
        let mut repo_guard = hub.store().acquire_repo(repo).await;
        let old = repo_guard.config().deep_copy();
        let mut new = old.deep_copy();
        update_fn(&mut new);
        new.validate()?;

        if old == new {
            return Ok(());
        }

        for ext in hub.extensions().iter() {
            if let Some(configurer) = ext.repo_configurer() {
                configurer.configure_repo(repo, &old, &new).await?;
            }
        }

        *repo_guard.config_mut() = new.deep_copy();
        (old, new)
    };

    reconcile_remotes(hub, repo, &old, &new).await
}

/// Bring the upstream connection in line with a persisted config change.
async fn reconcile_remotes(
    hub: &Arc<Hub>,
    repo: &str,
    old: &RepoConfiguration,
    new: &RepoConfiguration,
) -> ServerResult<()> {
    let old_remote = old.remote().map(|(_, r)| r);
    let new_remote = new.remote().map(|(_, r)| r);

    if let Some(old_remote) = old_remote {
        let endpoint_gone =
            new_remote.map_or(true, |r| r.endpoint != old_remote.endpoint);
        if endpoint_gone {
            if let Err(e) = hub.remotes().close_and_remove(&old_remote.endpoint).await {
                // The proxy may never have connected; nothing to tear down.
                warn!(endpoint = %old_remote.endpoint, error = %e, "detach skipped");
            }
        }
    }

    let Some(remote) = new_remote else {
        return Ok(());
    };
    if Some(remote) == old_remote {
        return Ok(());
    }

    // Attaching a remote is only supported while the repo has no shared
    // refs yet. Merging an existing local history with an upstream's is
    // a different operation this server does not perform.
    let local_refs = hub.store().list_ref_states(repo).await;
    if local_refs.iter().any(|(name, _)| name != HEAD_REF) {
        return Err(ServerError::InvalidConfig(format!(
            "repo {repo:?} already has refs; attach a remote before creating refs"
        )));
    }

    info!(repo, endpoint = %remote.endpoint, upstream = %remote.repo, "attaching remote");
    hub.remotes().connect(&remote.endpoint).await?;

    // Seed the upstream's view of our head before subscribing, so the
    // upstream never fans our own head back at us as a fresh update.
    let head = RefIdentifier::new(repo, HEAD_REF);
    let head_state = {
        let guard = hub.store().acquire_ref(&head).await;
        guard.state().map(|s| s.deep_copy())
    };
    if let Some(state) = head_state {
        hub.remotes()
            .enqueue(
                &remote.endpoint,
                refhub_protocol::RefUpdateParams {
                    repo: remote.repo.clone(),
                    ref_name: HEAD_REF.to_string(),
                    update: RefUpdate::forced(state),
                },
            )
            .await;
    }

    hub.remotes()
        .watch(&remote.endpoint, &remote.repo, remote.refspecs.clone())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::ext::{Extension, ExtensionRegistry, RepoConfigurer};
    use async_trait::async_trait;
    use refhub_types::RefState;
    use std::sync::Mutex;

    fn hub() -> Arc<Hub> {
        Hub::new(ServerConfig::default(), ExtensionRegistry::new()).unwrap()
    }

    #[tokio::test]
    async fn noop_update_short_circuits() {
        let hub = hub();
        apply_config_update(&hub, "r", |_config| {}).await.unwrap();
        let guard = hub.store().acquire_repo("r").await;
        assert!(guard.config().remotes.is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_persisting() {
        let hub = hub();
        let err = apply_config_update(&hub, "r", |config| {
            for name in ["origin", "backup"] {
                config.remotes.insert(
                    name.into(),
                    refhub_types::RemoteConfiguration {
                        endpoint: format!("{name}.example:4288"),
                        repo: "r".into(),
                        refspecs: vec!["*".into()],
                    },
                );
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Types(refhub_types::TypeError::InvalidConfig(_))
        ));

        let guard = hub.store().acquire_repo("r").await;
        assert!(guard.config().remotes.is_empty());
    }

    #[tokio::test]
    async fn attach_is_refused_once_shared_refs_exist() {
        let hub = hub();
        let target = RefIdentifier::new("r", "branch/x");
        crate::pipeline::apply_and_broadcast(
            &hub,
            &target,
            &RefUpdate::with_state(RefState::new("b0", "main")),
            None,
        )
        .await
        .unwrap();

        let err = apply_config_update(&hub, "r", |config| {
            config.remotes.insert(
                "origin".into(),
                refhub_types::RemoteConfiguration {
                    endpoint: "upstream.example:4288".into(),
                    repo: "r".into(),
                    refspecs: vec!["*".into()],
                },
            );
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig(_)));
    }

    struct Rejecting;

    #[async_trait]
    impl RepoConfigurer for Rejecting {
        async fn configure_repo(
            &self,
            _repo: &str,
            _old: &RepoConfiguration,
            _new: &RepoConfiguration,
        ) -> ServerResult<()> {
            Err(ServerError::InvalidConfig("policy says no".into()))
        }
    }

    impl Extension for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }
        fn repo_configurer(&self) -> Option<&dyn RepoConfigurer> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn configurer_hook_can_veto() {
        let mut exts = ExtensionRegistry::new();
        exts.push(Arc::new(Rejecting));
        let hub = Hub::new(ServerConfig::default(), exts).unwrap();

        let err = apply_config_update(&hub, "r", |config| {
            config.remotes.insert(
                "origin".into(),
                refhub_types::RemoteConfiguration {
                    endpoint: "upstream.example:4288".into(),
                    repo: "r".into(),
                    refspecs: vec!["*".into()],
                },
            );
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig(_)));

        let guard = hub.store().acquire_repo("r").await;
        assert!(guard.config().remotes.is_empty());
    }

    struct Observing(Mutex<Vec<(usize, usize)>>);

    #[async_trait]
    impl RepoConfigurer for Observing {
        async fn configure_repo(
            &self,
            _repo: &str,
            old: &RepoConfiguration,
            new: &RepoConfiguration,
        ) -> ServerResult<()> {
            self.0.lock().unwrap().push((old.remotes.len(), new.remotes.len()));
            Ok(())
        }
    }

    impl Extension for Observing {
        fn name(&self) -> &str {
            "observing"
        }
        fn repo_configurer(&self) -> Option<&dyn RepoConfigurer> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn hooks_see_old_and_new_configs() {
        let observer = Arc::new(Observing(Mutex::new(Vec::new())));
        let mut exts = ExtensionRegistry::new();
        exts.push(observer.clone());
        let hub = Hub::new(ServerConfig::default(), exts).unwrap();

        // Clearing remotes on a fresh repo is a no-op and skips hooks.
        apply_config_update(&hub, "r", |config| config.remotes.clear())
            .await
            .unwrap();
        assert!(observer.0.lock().unwrap().is_empty());
    }
}
