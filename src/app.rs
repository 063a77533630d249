// App — the explicitly owned set of components one running instance shares.
//
// Nothing here is global: build as many Apps as you like (tests do).
// Cloning an App clones the Arcs, not the state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::StateStore;
use crate::feed::{AlertFeed, UserCountFeed};
use crate::hub::{FanoutHub, PushConfig};
use crate::notify::{PushSink, StdoutSink, TelegramSink};
use crate::pipeline::{jobs, persist, IngestionPipeline};
use crate::scheduler::Scheduler;
use crate::state::{DedupStore, FilterStore, PeakCounter};

#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub store: Arc<dyn StateStore>,
    pub dedup: Arc<DedupStore>,
    pub peak: Arc<PeakCounter>,
    pub filters: Arc<FilterStore>,
    pub hub: Arc<FanoutHub>,
    pub pipeline: Arc<IngestionPipeline>,
}

/// Pick the push sink: Telegram when credentials are set, stdout otherwise.
pub fn build_sink(config: &Config) -> Result<Arc<dyn PushSink>> {
    if config.telegram_configured() {
        info!("Pushing notifications to Telegram");
        Ok(Arc::new(TelegramSink::new(
            &config.telegram_api_url,
            &config.telegram_bot_token,
            &config.telegram_chat_id,
        )?))
    } else {
        warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set, notifications go to stdout");
        Ok(Arc::new(StdoutSink))
    }
}

impl App {
    /// Build the components, restore persisted state into them, and start
    /// the push worker (when a sink is given). Must run inside a tokio runtime.
    pub async fn start(
        config: Config,
        store: Arc<dyn StateStore>,
        sink: Option<Arc<dyn PushSink>>,
    ) -> Self {
        let dedup = Arc::new(DedupStore::new());
        let peak = Arc::new(PeakCounter::new());
        let filters = Arc::new(FilterStore::default());
        persist::restore(store.as_ref(), &dedup, &peak, &filters).await;

        let push = sink.map(|sink| PushConfig {
            sink,
            filters: config.push_categories,
            queue_capacity: config.push_queue_capacity,
            timeout: Duration::from_secs(config.push_timeout_secs),
        });
        let hub = Arc::new(FanoutHub::new(push));
        let pipeline = Arc::new(IngestionPipeline::new(dedup.clone(), hub.clone()));

        Self {
            config: Arc::new(config),
            store,
            dedup,
            peak,
            filters,
            hub,
            pipeline,
        }
    }

    /// The four periodic jobs, wired to this App's components.
    pub fn scheduler(
        &self,
        alerts: Arc<dyn AlertFeed>,
        users: Arc<dyn UserCountFeed>,
    ) -> Scheduler {
        let config = &self.config;

        let pipeline = self.pipeline.clone();
        let fetch = move || {
            let (alerts, pipeline) = (alerts.clone(), pipeline.clone());
            async move {
                jobs::fetch_alerts(alerts.as_ref(), &pipeline)
                    .await
                    .map(|_| ())
            }
        };

        let peak = self.peak.clone();
        let sample = move || {
            let (users, peak) = (users.clone(), peak.clone());
            async move { jobs::sample_users(users.as_ref(), &peak).await.map(|_| ()) }
        };

        let (peak, hub) = (self.peak.clone(), self.hub.clone());
        let report = move || {
            let (peak, hub) = (peak.clone(), hub.clone());
            async move {
                jobs::report_peak(&peak, &hub).await;
                anyhow::Ok(())
            }
        };

        let app = self.clone();
        let save = move || {
            let app = app.clone();
            async move { app.save_state().await }
        };

        Scheduler::new()
            .every("fetch-alerts", config.fetch_every_minutes, fetch)
            .every("sample-users", config.sample_every_minutes, sample)
            .every("users-report", config.report_every_minutes, report)
            .every("persist-state", config.persist_every_minutes, save)
    }

    pub async fn save_state(&self) -> Result<()> {
        persist::save(
            self.store.as_ref(),
            &self.dedup,
            &self.peak,
            self.config.dedup_retention(),
        )
        .await
    }

    /// Drain the push queue and write a final snapshot.
    pub async fn shutdown(&self) {
        self.hub.shutdown().await;
        if let Err(e) = self.save_state().await {
            warn!(error = %e, "Final state save failed");
        }
    }
}
