//! Method dispatch for one connection.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::info;

use refhub_protocol::{
    methods, Capabilities, ConfigureParams, DebugLogParams, InitializeParams, InitializeResult,
    RefInfoParams, RefInfoResult, RefListItem, RefUpdateParams, RepoParams, WatchParams,
};
use refhub_types::{validate_ref_name, validate_repo_name, RefIdentifier, BRANCH_PREFIX};

use crate::error::{ServerError, ServerResult};
use crate::pipeline;
use crate::registry::Connection;
use crate::repoconfig;
use crate::server::Hub;

/// Environment toggle for the `debug/log` method.
pub const DEBUG_LOG_ENV: &str = "REFHUB_DEBUG_LOG";

fn parse<T: DeserializeOwned>(params: Option<Value>) -> ServerResult<T> {
    let params = params.ok_or_else(|| ServerError::InvalidParams("missing params".into()))?;
    serde_json::from_value(params).map_err(|e| ServerError::InvalidParams(e.to_string()))
}

/// Handle one request or notification and produce its result.
pub async fn dispatch(
    hub: Arc<Hub>,
    conn: Arc<Connection>,
    method: String,
    params: Option<Value>,
) -> ServerResult<Value> {
    // Only initialize and exit are usable before initialize.
    if !conn.is_initialized() && method != methods::INITIALIZE && method != methods::EXIT {
        return Err(ServerError::NotInitialized);
    }
    // After shutdown, only exit is left.
    if conn.is_shutting_down() && method != methods::EXIT {
        return Err(ServerError::InvalidRequest(format!(
            "{method} after shutdown"
        )));
    }

    match method.as_str() {
        methods::INITIALIZE => initialize(&conn, params),
        methods::INITIALIZED => Ok(json!(true)),
        methods::PING => Ok(json!("pong")),
        methods::DEBUG_LOG => debug_log(params),
        methods::SHUTDOWN => {
            conn.mark_shutting_down();
            Ok(Value::Null)
        }
        methods::EXIT => {
            conn.close();
            Ok(Value::Null)
        }
        methods::REPO_INFO => repo_info(&hub, params).await,
        methods::REPO_CONFIGURE => repo_configure(&hub, params).await,
        methods::REPO_WATCH => repo_watch(&hub, &conn, params).await,
        methods::REPO_LIST => repo_list(&hub),
        methods::REF_LIST => ref_list(&hub, params).await,
        methods::REF_INFO => ref_info(&hub, params).await,
        methods::REF_UPDATE => ref_update(&hub, &conn, params).await,
        _ => dispatch_extension(&hub, &method, params).await,
    }
}

fn initialize(conn: &Arc<Connection>, params: Option<Value>) -> ServerResult<Value> {
    let params: InitializeParams = match params {
        Some(v) => serde_json::from_value(v).map_err(|e| ServerError::InvalidParams(e.to_string()))?,
        None => InitializeParams { id: None },
    };
    let id = params
        .id
        .unwrap_or_else(|| format!("client-{}", uuid::Uuid::now_v7()));
    conn.initialize(id)?;
    let result = InitializeResult {
        capabilities: Capabilities {
            watch: true,
            remotes: true,
        },
    };
    serde_json::to_value(result).map_err(|e| ServerError::Internal(e.to_string()))
}

fn debug_log(params: Option<Value>) -> ServerResult<Value> {
    let params: DebugLogParams = parse(params)?;
    if std::env::var_os(DEBUG_LOG_ENV).is_none() {
        return Ok(Value::Null);
    }
    match params.header {
        Some(header) => info!(%header, "{}", params.text),
        None => info!("{}", params.text),
    }
    Ok(Value::Null)
}

async fn repo_info(hub: &Arc<Hub>, params: Option<Value>) -> ServerResult<Value> {
    let params: RepoParams = parse(params)?;
    validate_repo_name(&params.repo)?;
    let repo = hub.store().acquire_repo(&params.repo).await;
    serde_json::to_value(repo.config()).map_err(|e| ServerError::Internal(e.to_string()))
}

async fn repo_configure(hub: &Arc<Hub>, params: Option<Value>) -> ServerResult<Value> {
    let params: ConfigureParams = parse(params)?;
    validate_repo_name(&params.repo)?;
    let remotes = params.remotes;
    repoconfig::apply_config_update(hub, &params.repo, move |config| {
        config.remotes = remotes;
    })
    .await?;
    Ok(Value::Null)
}

async fn repo_watch(
    hub: &Arc<Hub>,
    conn: &Arc<Connection>,
    params: Option<Value>,
) -> ServerResult<Value> {
    let params: WatchParams = parse(params)?;
    validate_repo_name(&params.repo)?;

    // Install the watch and replay under the repo's order lock. An
    // update in flight settles before the snapshot; one arriving after
    // waits, then reaches this watcher as a live notification. The
    // watcher sees each update exactly once, replay or live.
    let order = hub.update_order(&params.repo);
    let _order = order.lock().await;
    conn.set_watch(params.repo.clone(), params.refspecs.clone());

    let timeout = hub.config().notify_timeout();
    for (ref_name, state) in hub.store().list_ref_states(&params.repo).await {
        if !refhub_types::matches_any(&params.refspecs, &ref_name) {
            continue;
        }
        let payload = RefUpdateParams {
            repo: params.repo.clone(),
            ref_name,
            update: refhub_types::RefUpdate::with_state(state),
        };
        let value =
            serde_json::to_value(&payload).map_err(|e| ServerError::Internal(e.to_string()))?;
        let msg = refhub_protocol::Message::Request(refhub_protocol::Request::notification(
            methods::REF_UPDATE,
            Some(value),
        ));
        conn.notify(msg, timeout).await?;
    }
    Ok(Value::Null)
}

fn repo_list(hub: &Arc<Hub>) -> ServerResult<Value> {
    if !hub.config().is_private {
        return Err(ServerError::InvalidRequest(
            "repo/list is only available on private servers".into(),
        ));
    }
    Ok(json!(hub.store().list_repos()))
}

async fn ref_list(hub: &Arc<Hub>, params: Option<Value>) -> ServerResult<Value> {
    let params: RepoParams = parse(params)?;
    validate_repo_name(&params.repo)?;
    let mut items = Vec::new();
    for (ref_name, state) in hub.store().list_ref_states(&params.repo).await {
        let ident = RefIdentifier::new(&params.repo, &ref_name);
        let mut watchers: Vec<String> = hub
            .registry()
            .watchers(&ident)
            .into_iter()
            .filter_map(|c| c.client_id())
            .collect();
        watchers.sort();
        items.push(RefListItem {
            ref_name,
            state,
            watchers,
        });
    }
    serde_json::to_value(items).map_err(|e| ServerError::Internal(e.to_string()))
}

async fn ref_info(hub: &Arc<Hub>, params: Option<Value>) -> ServerResult<Value> {
    let params: RefInfoParams = parse(params)?;
    validate_repo_name(&params.repo)?;

    let exact = RefIdentifier::new(&params.repo, &params.ref_name);
    let resolved = match hub.store().acquire_existing_ref(&exact).await {
        Ok(guard) => Some(guard),
        Err(refhub_store::StoreError::RefNotExists { .. }) if params.fuzzy => {
            let branch = RefIdentifier::new(
                &params.repo,
                format!("{BRANCH_PREFIX}{}", params.ref_name),
            );
            hub.store().acquire_existing_ref(&branch).await.ok()
        }
        Err(e) => return Err(e.into()),
    };
    let guard = resolved.ok_or_else(|| {
        ServerError::from(refhub_store::StoreError::RefNotExists {
            repo: params.repo.clone(),
            ref_name: params.ref_name.clone(),
        })
    })?;
    let state = guard
        .state()
        .map(|s| s.deep_copy())
        .ok_or_else(|| {
            ServerError::from(refhub_store::StoreError::RefNotExists {
                repo: params.repo.clone(),
                ref_name: params.ref_name.clone(),
            })
        })?;
    let result = RefInfoResult {
        ref_name: guard.ident().ref_name.clone(),
        state,
    };
    serde_json::to_value(result).map_err(|e| ServerError::Internal(e.to_string()))
}

async fn ref_update(
    hub: &Arc<Hub>,
    conn: &Arc<Connection>,
    params: Option<Value>,
) -> ServerResult<Value> {
    let params: RefUpdateParams = parse(params)?;
    validate_repo_name(&params.repo)?;
    validate_ref_name(&params.ref_name)?;
    params.update.validate()?;

    let target = RefIdentifier::new(&params.repo, &params.ref_name);
    pipeline::apply_and_broadcast(hub, &target, &params.update, Some(conn)).await?;
    Ok(Value::Null)
}

async fn dispatch_extension(
    hub: &Arc<Hub>,
    method: &str,
    params: Option<Value>,
) -> ServerResult<Value> {
    for ext in hub.extensions().iter() {
        if let Some(handler) = ext.method_handler() {
            if let Some(result) = handler.handle(method, params.as_ref()).await {
                return result;
            }
        }
    }
    Err(ServerError::MethodNotFound(method.to_string()))
}
