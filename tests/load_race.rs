//! Overlapping loads through a `LoadSession`: only the most recent attempt
//! may reach the map, the status display and the activity log.

mod load_race {
    #![allow(non_snake_case)]

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;
    use tokio::time::{Duration, sleep};

    use tilegate::admission::UrlAdmissionGate;
    use tilegate::loading::{Fetcher, LoadError, LoadOptions, LoadOutcome, LoadSession};
    use tilegate::sinks::{MemoryActivity, MemoryMap, MemoryStatus, StatusKind};

    const U1: &str = "https://stac.example.com/items/one";
    const U2: &str = "https://stac.example.com/items/two";

    type Reply = Result<Value, LoadError>;

    /// Fetcher whose responses are released by the test, one URL at a time.
    #[derive(Default)]
    struct GatedFetcher {
        pending: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    }

    impl GatedFetcher {
        fn hold(&self, url: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().unwrap().insert(url.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch_json(&self, url: &str) -> Reply {
            let rx = self.pending.lock().unwrap().remove(url);
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(LoadError::FetchFailed("released without reply".into()))),
                None => Err(LoadError::FetchFailed(format!("unexpected fetch of {url}"))),
            }
        }
    }

    struct Viewer {
        session: Arc<LoadSession>,
        fetcher: Arc<GatedFetcher>,
        map: Arc<MemoryMap>,
        status: Arc<MemoryStatus>,
        activity: Arc<MemoryActivity>,
    }

    impl Viewer {
        fn new(timeout: Duration) -> Self {
            let fetcher = Arc::new(GatedFetcher::default());
            let map = Arc::new(MemoryMap::new());
            let status = Arc::new(MemoryStatus::new());
            let activity = Arc::new(MemoryActivity::new());
            let session = LoadSession::new(
                UrlAdmissionGate::default(),
                fetcher.clone(),
                map.clone(),
                status.clone(),
                activity.clone(),
            )
            .with_timeout(timeout);

            Self {
                session: Arc::new(session),
                fetcher,
                map,
                status,
                activity,
            }
        }

        /// Start loading `url` in the background and wait until it is fetching.
        async fn start(&self, url: &'static str) -> JoinHandle<LoadOutcome> {
            let session = self.session.clone();
            let task = tokio::spawn(async move { session.load(url, &LoadOptions::default()).await });
            sleep(Duration::from_millis(1)).await;
            task
        }

        fn events_for(&self, url: &str) -> Vec<String> {
            self.activity
                .events()
                .into_iter()
                .filter(|(_, fields)| fields["url"] == url)
                .map(|(name, _)| name)
                .collect()
        }
    }

    fn item(x: f64) -> Value {
        json!({"type": "Feature", "bbox": [x, 0.0, x + 1.0, 1.0]})
    }

    #[tokio::test(start_paused = true)]
    async fn test_race__late_result_of_older_load_is_discarded() {
        let viewer = Viewer::new(Duration::from_secs(10));
        let reply_one = viewer.fetcher.hold(U1);
        let reply_two = viewer.fetcher.hold(U2);

        let first = viewer.start(U1).await;
        let second = viewer.start(U2).await;

        // U2 answers first and renders
        reply_two.send(Ok(item(20.0))).unwrap();
        let outcome_two = second.await.unwrap();
        assert!(outcome_two.is_rendered());

        let status_before = viewer.status.history();
        let map_before = viewer.map.calls();

        // U1 answers late: nothing changes
        reply_one.send(Ok(item(10.0))).unwrap();
        assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);

        assert_eq!(viewer.status.history(), status_before);
        assert_eq!(viewer.map.calls(), map_before);
        assert_eq!(viewer.map.current_layer().unwrap().source_url, U2);
        assert_eq!(viewer.events_for(U1), vec!["stac_load_attempt"]);
        assert!(viewer.events_for(U2).contains(&"stac_rendered".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_race__older_load_answering_first_is_discarded() {
        let viewer = Viewer::new(Duration::from_secs(10));
        let reply_one = viewer.fetcher.hold(U1);
        let reply_two = viewer.fetcher.hold(U2);

        let first = viewer.start(U1).await;
        let second = viewer.start(U2).await;

        reply_one.send(Ok(item(10.0))).unwrap();
        assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);
        assert_eq!(viewer.map.current_layer(), None);
        assert_eq!(viewer.status.loading().as_deref(), Some("Loading STAC item..."));

        reply_two.send(Ok(item(20.0))).unwrap();
        assert!(second.await.unwrap().is_rendered());
        assert_eq!(viewer.map.current_layer().unwrap().source_url, U2);
        assert_eq!(
            viewer.status.last().unwrap().message,
            format!("Loaded: {U2}")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_race__older_failure_is_not_reported() {
        let viewer = Viewer::new(Duration::from_secs(10));
        let reply_one = viewer.fetcher.hold(U1);
        let reply_two = viewer.fetcher.hold(U2);

        let first = viewer.start(U1).await;
        let second = viewer.start(U2).await;

        reply_one
            .send(Err(LoadError::FetchFailed("HTTP 502 Bad Gateway".into())))
            .unwrap();
        assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);

        assert!(
            viewer
                .status
                .history()
                .iter()
                .all(|entry| entry.kind != StatusKind::Error)
        );
        assert!(!viewer.events_for(U1).contains(&"stac_fetch_error".to_string()));

        reply_two.send(Ok(item(20.0))).unwrap();
        assert!(second.await.unwrap().is_rendered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_race__superseded_load_never_times_out() {
        let viewer = Viewer::new(Duration::from_secs(1));
        let _reply_one = viewer.fetcher.hold(U1);
        let reply_two = viewer.fetcher.hold(U2);

        let first = viewer.start(U1).await;
        sleep(Duration::from_millis(500)).await;
        let second = viewer.start(U2).await;

        // Past U1's deadline, before U2's
        sleep(Duration::from_millis(700)).await;
        assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);
        assert!(viewer.status.last().is_none());
        assert!(
            !viewer
                .activity
                .names()
                .contains(&"stac_timeout".to_string())
        );

        reply_two.send(Ok(item(20.0))).unwrap();
        assert!(second.await.unwrap().is_rendered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_race__latest_load_times_out_once() {
        let viewer = Viewer::new(Duration::from_secs(1));
        let _reply_one = viewer.fetcher.hold(U1);
        let reply_two = viewer.fetcher.hold(U2);

        let first = viewer.start(U1).await;
        let second = viewer.start(U2).await;

        assert_eq!(second.await.unwrap(), LoadOutcome::TimedOut);
        assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);

        // A reply after the deadline has no effect
        let _ = reply_two.send(Ok(item(20.0)));
        sleep(Duration::from_millis(10)).await;

        let errors: Vec<_> = viewer
            .status
            .history()
            .into_iter()
            .filter(|entry| entry.kind == StatusKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Operation timed out.");
        assert_eq!(viewer.map.current_layer(), None);
        assert_eq!(viewer.events_for(U2).last().unwrap(), "stac_timeout");
        assert_eq!(viewer.session.coordinator().current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_race__new_load_after_timeout_renders() {
        let viewer = Viewer::new(Duration::from_secs(1));
        let _reply_one = viewer.fetcher.hold(U1);
        let reply_two = viewer.fetcher.hold(U2);

        let first = viewer.start(U1).await;
        assert_eq!(first.await.unwrap(), LoadOutcome::TimedOut);

        let second = viewer.start(U2).await;
        reply_two.send(Ok(item(5.0))).unwrap();
        assert!(second.await.unwrap().is_rendered());
        assert_eq!(viewer.map.current_layer().unwrap().source_url, U2);
    }
}
