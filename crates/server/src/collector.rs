use crate::config::{NotifierKind, ServerConfig};
use crate::notify::{self, LogNotifier, Notifier, SmtpNotifier, DEFAULT_NOTIFY_TIMEOUT};
use beacon_core::{
    classify, render, AlertDecision, AlertGate, HeaderList, ParameterSet, RequestMeta,
    SchemaRegistry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One inbound beacon, already lifted out of the HTTP request.
#[derive(Debug, Clone, Default)]
pub struct Beacon {
    pub meta: RequestMeta,
    pub headers: HeaderList,
    pub params: ParameterSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconOutcome {
    pub report: String,
    pub missing_required: Vec<String>,
    pub decision: AlertDecision,
    /// `Some` only when an alert was dispatched.
    pub delivered: Option<bool>,
}

/// Shared per-process beacon pipeline: classify, render, gate, notify.
pub struct Collector {
    registry: Arc<SchemaRegistry>,
    gate: AlertGate,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl Collector {
    pub fn new(registry: Arc<SchemaRegistry>, gate: AlertGate, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry,
            gate,
            notifier,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let notifier: Arc<dyn Notifier> = match config.notifier {
            NotifierKind::Smtp => Arc::new(SmtpNotifier::new(config.smtp.clone())),
            NotifierKind::Log => Arc::new(LogNotifier),
        };
        Self::new(
            Arc::new(SchemaRegistry::analytics()),
            AlertGate::new(config.alert_cooldown),
            notifier,
        )
        .with_notify_timeout(config.notify_timeout)
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }

    pub fn notifier_name(&self) -> &'static str {
        self.notifier.name()
    }

    pub async fn process(&self, beacon: Beacon) -> BeaconOutcome {
        self.process_at(beacon, Instant::now()).await
    }

    /// Same as [`Collector::process`] with an explicit clock reading for the alert gate.
    pub async fn process_at(&self, beacon: Beacon, now: Instant) -> BeaconOutcome {
        let classification = classify(&beacon.params, &self.registry);
        let report = render(&beacon.meta, &beacon.headers, &classification);
        let decision = self
            .gate
            .evaluate(classification.has_missing_required(), now);

        let delivered = match decision {
            AlertDecision::Fire => {
                log::warn!(
                    "Beacon from {} is missing required parameters [{}]; sending alert via {}",
                    beacon.meta.source,
                    classification.missing_required.join(", "),
                    self.notifier.name()
                );
                match notify::dispatch(self.notifier.as_ref(), &report, self.notify_timeout).await
                {
                    Ok(()) => Some(true),
                    Err(err) => {
                        log::error!("Failed to send alert: {err}");
                        Some(false)
                    }
                }
            }
            AlertDecision::Suppressed { remaining } => {
                log::info!(
                    "Beacon missing required parameters [{}]; alert suppressed for another {}s",
                    classification.missing_required.join(", "),
                    remaining.as_secs()
                );
                None
            }
            AlertDecision::NotRequired => None,
        };

        BeaconOutcome {
            report,
            missing_required: classification.missing_required,
            decision,
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, report: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(report.to_string());
            if self.fail {
                return Err(NotifyError::Protocol("relay unavailable".to_string()));
            }
            Ok(())
        }
    }

    fn collector(notifier: Arc<RecordingNotifier>) -> Collector {
        Collector::new(
            Arc::new(SchemaRegistry::analytics()),
            AlertGate::default(),
            notifier,
        )
    }

    fn beacon(query: &str) -> Beacon {
        Beacon {
            params: ParameterSet::from_urlencoded(query.as_bytes()),
            ..Beacon::default()
        }
    }

    #[tokio::test]
    async fn complete_beacon_sends_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let collector = collector(notifier.clone());

        let outcome = collector.process(beacon("v=1&cid=abc&t=pageview")).await;

        assert_eq!(outcome.decision, AlertDecision::NotRequired);
        assert!(outcome.missing_required.is_empty());
        assert_eq!(outcome.delivered, None);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_missing_hit_type_alerts_with_the_report() {
        let notifier = Arc::new(RecordingNotifier::default());
        let collector = collector(notifier.clone());

        let outcome = collector
            .process(beacon("v=1&tid=UA-1&cid=abc&dp=%2Fhome"))
            .await;

        assert_eq!(outcome.decision, AlertDecision::Fire);
        assert_eq!(outcome.missing_required, vec!["t".to_string()]);
        assert_eq!(outcome.delivered, Some(true));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], outcome.report);
    }

    #[tokio::test]
    async fn concurrent_beacons_inside_cooldown_do_not_alert_again() {
        let notifier = Arc::new(RecordingNotifier::default());
        let collector = collector(notifier.clone());
        let first = Instant::now();
        collector.process_at(beacon("v=1&cid=a"), first).await;

        let later = first + Duration::from_secs(5 * 60);
        let (a, b) = tokio::join!(
            collector.process_at(beacon("v=1&cid=b"), later),
            collector.process_at(beacon("v=1&cid=c"), later),
        );

        assert!(!a.decision.should_fire());
        assert!(!b.decision.should_fire());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_beacons_after_cooldown_alert_exactly_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let collector = Arc::new(collector(notifier.clone()));
        let first = Instant::now();
        collector.process_at(beacon("v=1&cid=a"), first).await;

        let later = first + Duration::from_secs(61 * 60);
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let collector = collector.clone();
                tokio::spawn(async move {
                    collector
                        .process_at(beacon(&format!("v=1&cid={i}")), later)
                        .await
                })
            })
            .collect();
        let mut fired = 0;
        for task in tasks {
            if task.await.unwrap().decision.should_fire() {
                fired += 1;
            }
        }

        assert_eq!(fired, 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });
        let collector = collector(notifier.clone());

        let outcome = collector.process(beacon("tid=UA-1")).await;

        assert_eq!(outcome.decision, AlertDecision::Fire);
        assert_eq!(outcome.delivered, Some(false));
        assert!(outcome.report.contains("Required but Missing:"));
        assert_eq!(collector.gate().snapshot().alerts_fired, 1);
    }
}
