//! Filtered pod watches.
//!
//! A [`PodWatch`] carries two ordered channels: pod snapshots for pods whose
//! name matches the filter, and stream errors. The underlying watch task is
//! aborted when the watch is dropped, so holding a `PodWatch` scopes the
//! upstream watch resource.

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher;
use kube::{Api, Client};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ClusterError;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const ERROR_CHANNEL_CAPACITY: usize = 8;

/// A running, filtered pod watch.
pub struct PodWatch {
    /// Snapshots of matching pods, in arrival order.
    pub events: mpsc::Receiver<Pod>,
    /// Failures of the underlying watch stream.
    pub errors: mpsc::Receiver<ClusterError>,
    task: Option<JoinHandle<()>>,
}

impl PodWatch {
    /// Build a watch from pre-wired channels, with no backing task.
    ///
    /// Intended for in-memory cluster fakes in tests.
    #[must_use]
    pub fn from_channels(events: mpsc::Receiver<Pod>, errors: mpsc::Receiver<ClusterError>) -> Self {
        Self {
            events,
            errors,
            task: None,
        }
    }
}

impl Drop for PodWatch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn a watch over pods in `namespace` whose name matches `pattern`.
pub(crate) fn spawn_pod_watch(client: Client, namespace: &str, pattern: Regex) -> PodWatch {
    let api: Api<Pod> = Api::namespaced(client, namespace);
    let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (error_tx, errors) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        let stream = watcher(api, watcher::Config::default());
        tokio::pin!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(watcher::Event::Apply(pod) | watcher::Event::InitApply(pod)) => {
                    if name_matches(&pattern, &pod) && event_tx.send(pod).await.is_err() {
                        break;
                    }
                }
                Ok(
                    watcher::Event::Delete(_)
                    | watcher::Event::Init
                    | watcher::Event::InitDone,
                ) => {}
                Err(e) => {
                    if error_tx
                        .send(ClusterError::Watch(e.to_string()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    });

    PodWatch {
        events,
        errors,
        task: Some(task),
    }
}

fn name_matches(pattern: &Regex, pod: &Pod) -> bool {
    pod.metadata
        .name
        .as_deref()
        .is_some_and(|name| pattern.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn named_pod(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[test]
    fn test_name_filter() {
        let pattern = Regex::new("^probe-pod$").unwrap();
        assert!(name_matches(&pattern, &named_pod("probe-pod")));
        assert!(!name_matches(&pattern, &named_pod("probe-pod-2")));
        assert!(!name_matches(&pattern, &Pod::default()));
    }

    #[tokio::test]
    async fn test_from_channels_delivers_in_order() {
        let (event_tx, events) = mpsc::channel(4);
        let (_error_tx, errors) = mpsc::channel::<ClusterError>(4);
        let mut watch = PodWatch::from_channels(events, errors);

        event_tx.send(named_pod("a")).await.unwrap();
        event_tx.send(named_pod("b")).await.unwrap();
        drop(event_tx);

        assert_eq!(watch.events.recv().await.unwrap().metadata.name.unwrap(), "a");
        assert_eq!(watch.events.recv().await.unwrap().metadata.name.unwrap(), "b");
        assert!(watch.events.recv().await.is_none());
    }
}
