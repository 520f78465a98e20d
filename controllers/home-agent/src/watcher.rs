//! Kubernetes resource watchers.
//!
//! HomeAgent changes, changes of the owned Deployments and changes of agent
//! pods are funnelled through `kube_runtime::Controller`, which coalesces
//! notifications per HomeAgent and never runs two reconciles of the same
//! object at once.
//!
//! The Controller does not reconcile objects that are gone, so a second raw
//! watch picks up HomeAgent deletions and routes them to the same reconcile
//! entry point, which then takes the cleanup path.

use crate::backoff::ErrorBackoffs;
use crate::error::ControllerError;
use crate::metrics::{Metrics, OUTCOME_DONE, OUTCOME_ERROR, OUTCOME_REQUEUE};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::workload::PARENT_LABEL;
use crds::HomeAgent;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, Resource};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, WatchStreamExt, watcher};
use kube_store::ObjectKey;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Requeue delay for objects whose key cannot be derived
const FALLBACK_ERROR_REQUEUE: Duration = Duration::from_secs(60);

/// Shared state handed to every reconcile invocation
#[derive(Debug)]
pub struct Context {
    reconciler: Reconciler,
    metrics: Arc<Metrics>,
    backoffs: ErrorBackoffs,
}

impl Context {
    pub fn new(reconciler: Reconciler, metrics: Arc<Metrics>, backoffs: ErrorBackoffs) -> Self {
        Self {
            reconciler,
            metrics,
            backoffs,
        }
    }

    /// Run one reconcile of `key` and translate the outcome for the Controller
    pub async fn dispatch(&self, key: &ObjectKey) -> Result<Action, ControllerError> {
        let started = Instant::now();
        let result = self.reconciler.reconcile(key).await;
        let elapsed = started.elapsed();

        match result {
            Ok(ReconcileOutcome::Done) => {
                self.metrics.observe(OUTCOME_DONE, elapsed);
                self.backoffs.reset(&key.to_string());
                Ok(Action::await_change())
            }
            Ok(ReconcileOutcome::RetryAfter(delay)) => {
                self.metrics.observe(OUTCOME_REQUEUE, elapsed);
                self.backoffs.reset(&key.to_string());
                Ok(Action::requeue(delay))
            }
            Err(e) => {
                self.metrics.observe(OUTCOME_ERROR, elapsed);
                Err(e)
            }
        }
    }

    /// Reconcile a deleted HomeAgent until its cleanup succeeds.
    ///
    /// Deleted objects never come back through the Controller, so failures
    /// are retried here with the same per-object backoff as `error_policy`.
    pub async fn cleanup_until_done(self: Arc<Self>, key: ObjectKey) {
        loop {
            match self.dispatch(&key).await {
                Ok(_) => return,
                Err(e) => {
                    let delay = self.backoffs.next_for(&key.to_string());
                    error!(
                        "Failed to clean up after HomeAgent {}: {}, retrying in {:?}",
                        key, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Controller reconcile entry point
pub async fn reconcile_home_agent(
    agent: Arc<HomeAgent>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let key = ObjectKey::from_resource(&*agent)?;
    ctx.dispatch(&key).await
}

/// Controller error policy: per-object Fibonacci backoff
pub fn error_policy(agent: Arc<HomeAgent>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    match ObjectKey::from_resource(&*agent) {
        Ok(key) => {
            let delay = ctx.backoffs.next_for(&key.to_string());
            error!(
                "Reconciliation of HomeAgent {} failed: {}, retrying in {:?}",
                key, error, delay
            );
            Action::requeue(delay)
        }
        Err(e) => {
            error!("Reconciliation of unidentifiable HomeAgent failed: {} ({})", error, e);
            Action::requeue(FALLBACK_ERROR_REQUEUE)
        }
    }
}

/// HomeAgent that an agent pod belongs to, from its `parent` label
pub fn pod_owner(pod: &Pod) -> Option<ObjectRef<HomeAgent>> {
    let parent = pod.metadata.labels.as_ref()?.get(PARENT_LABEL)?;
    let namespace = pod.metadata.namespace.as_deref()?;
    Some(ObjectRef::new(parent).within(namespace))
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Watches HomeAgents and the resources they own.
pub struct Watcher {
    ctx: Arc<Context>,
    home_agent_api: Api<HomeAgent>,
    deployment_api: Api<Deployment>,
    pod_api: Api<Pod>,
    concurrency: u16,
    ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("ctx", &self.ctx)
            .field("concurrency", &self.concurrency)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance scoped to `namespace`, or to all
    /// namespaces when `None`.
    pub fn new(
        ctx: Arc<Context>,
        client: Client,
        namespace: Option<&str>,
        concurrency: u16,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            ctx,
            home_agent_api: scoped_api(client.clone(), namespace),
            deployment_api: scoped_api(client.clone(), namespace),
            pod_api: scoped_api(client, namespace),
            concurrency,
            ready,
        }
    }

    /// Reconciles HomeAgents on every change of the HomeAgent, its
    /// Deployment or its pods. Returns once a shutdown signal arrives.
    pub async fn watch_home_agents(&self) -> Result<(), ControllerError> {
        info!("Starting HomeAgent watcher");

        let controller_config = ControllerConfig::default().concurrency(self.concurrency);
        let controller = Controller::new(self.home_agent_api.clone(), watcher::Config::default())
            .owns(self.deployment_api.clone(), watcher::Config::default())
            .watches(
                self.pod_api.clone(),
                watcher::Config::default().labels(PARENT_LABEL),
                |pod| pod_owner(&pod),
            )
            .with_config(controller_config)
            .shutdown_on_signal();

        self.ready.store(true, Ordering::Relaxed);

        controller
            .run(reconcile_home_agent, error_policy, self.ctx.clone())
            .for_each(|res| async move {
                match res {
                    Ok((obj, _action)) => debug!("Reconciled HomeAgent {}", obj),
                    Err(e) => warn!("HomeAgent controller error: {}", e),
                }
            })
            .await;

        self.ready.store(false, Ordering::Relaxed);
        info!("HomeAgent watcher stopped");
        Ok(())
    }

    /// Routes HomeAgent deletions to the cleanup path.
    pub async fn watch_deletions(&self) -> Result<(), ControllerError> {
        info!("Starting HomeAgent deletion watcher");

        let mut stream = Box::pin(
            watcher(self.home_agent_api.clone(), watcher::Config::default()).default_backoff(),
        );

        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Delete(agent)) => {
                    let key = match ObjectKey::from_resource(&agent) {
                        Ok(key) => key,
                        Err(e) => {
                            warn!("Ignoring deletion of unidentifiable HomeAgent: {}", e);
                            continue;
                        }
                    };
                    info!("HomeAgent deleted: {}", key);
                    tokio::spawn(self.ctx.clone().cleanup_until_done(key));
                }
                Ok(watcher::Event::InitDone) => {
                    debug!("HomeAgent deletion watcher initialization complete");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("HomeAgent deletion watch error: {}", e);
                }
            }
        }

        Err(ControllerError::Watch(
            "HomeAgent deletion watch ended".to_string(),
        ))
    }
}
