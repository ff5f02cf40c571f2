//! Reminder scheduling: a single polling loop that fires daily birthday
//! digests behind a persisted local-day gate and announces imminent
//! interviews exactly once via dedup claims. The claim, not polling
//! precision, is what makes delivery at-most-once.

pub mod birthdays;
pub mod interviews;
pub mod store;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::models::notification::DedupKey;
use crate::models::subscriber::Subscriber;
use crate::scheduler::birthdays::{birthday_digest, birthday_matches};
use crate::scheduler::interviews::{interview_reminder_text, reminder_window};
use crate::scheduler::store::ReminderStore;
use crate::services::telegram_service::Notifier;
use crate::utils::time::{local_month_day_in, local_parts};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub timezone: Tz,
    pub poll_interval: std::time::Duration,
    pub interview_lead: Duration,
    pub window_half_width: Duration,
    pub birthday_today_at: (u32, u32),
    pub birthday_upcoming_at: (u32, u32),
    pub birthday_upcoming_days: u64,
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timezone: config.timezone,
            poll_interval: std::time::Duration::from_secs(config.poll_interval_secs),
            interview_lead: Duration::minutes(config.interview_lead_minutes),
            window_half_width: Duration::seconds(config.reminder_window_secs),
            birthday_today_at: config.birthday_today_at,
            birthday_upcoming_at: config.birthday_upcoming_at,
            birthday_upcoming_days: config.birthday_upcoming_days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BirthdayJob {
    Today,
    Upcoming,
}

impl BirthdayJob {
    fn name(&self) -> &'static str {
        match self {
            BirthdayJob::Today => "birthday_today",
            BirthdayJob::Upcoming => "birthday_upcoming",
        }
    }

    fn trigger_at(&self, config: &SchedulerConfig) -> (u32, u32) {
        match self {
            BirthdayJob::Today => config.birthday_today_at,
            BirthdayJob::Upcoming => config.birthday_upcoming_at,
        }
    }

    fn days_ahead(&self, config: &SchedulerConfig) -> u64 {
        match self {
            BirthdayJob::Today => 0,
            BirthdayJob::Upcoming => config.birthday_upcoming_days,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickReport {
    pub checked: usize,
    pub matched: usize,
    pub delivered: usize,
}

pub struct ReminderScheduler<S, N> {
    store: S,
    notifier: N,
    config: SchedulerConfig,
}

impl<S: ReminderStore, N: Notifier> ReminderScheduler<S, N> {
    pub fn new(store: S, notifier: N, config: SchedulerConfig) -> Self {
        Self { store, notifier, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn run_tick_once(&self) -> Result<TickReport> {
        self.run_tick_at(Utc::now()).await
    }

    /// One full evaluation pass at the given instant. Each sub-job catches
    /// its own failures so a broken scan never starves the others.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut report = TickReport::default();

        for job in [BirthdayJob::Today, BirthdayJob::Upcoming] {
            if let Err(err) = self.run_birthday_job(job, now, &mut report).await {
                tracing::error!(job = job.name(), error = ?err, "birthday job failed");
            }
        }

        if let Err(err) = self.check_imminent_interviews(now, &mut report).await {
            tracing::error!(error = ?err, "interview reminder check failed");
        }

        match self.store.purge_expired_dedup(now).await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "purged expired dedup records"),
            Err(err) => tracing::error!(error = ?err, "dedup purge failed"),
        }

        Ok(report)
    }

    async fn run_birthday_job(
        &self,
        job: BirthdayJob,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<()> {
        let (hour, minute) = job.trigger_at(&self.config);
        let local = local_parts(now, self.config.timezone);
        if (local.hour, local.minute) < (hour, minute) {
            return Ok(());
        }
        let last = self.store.last_run_day(job.name()).await?;
        if last.as_deref() == Some(local.day_key.as_str()) {
            return Ok(());
        }
        // arm before sending: a crash mid-fan-out skips the day instead of
        // repeating it
        self.store.set_last_run_day(job.name(), &local.day_key).await?;

        let days_ahead = job.days_ahead(&self.config);
        let target = local_month_day_in(now, self.config.timezone, days_ahead);
        let employees = self.store.find_employees_with_birthday().await?;
        report.checked += employees.len();

        let matches = birthday_matches(&employees, target, self.config.timezone);
        if matches.is_empty() {
            return Ok(());
        }
        let subscribers = self.store.find_enabled_subscribers().await?;
        if subscribers.is_empty() {
            return Ok(());
        }

        report.matched += matches.len();
        let text = birthday_digest(&matches, days_ahead);
        report.delivered += self.fan_out(&subscribers, &text).await;
        Ok(())
    }

    async fn check_imminent_interviews(
        &self,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<()> {
        let (from, to) =
            reminder_window(now, self.config.interview_lead, self.config.window_half_width);
        let candidates = self
            .store
            .find_candidates_with_imminent_head_interview(from, to)
            .await?;
        report.checked += candidates.len();
        if candidates.is_empty() {
            return Ok(());
        }

        let subscribers = self.store.find_enabled_subscribers().await?;
        for candidate in &candidates {
            let Some(interview) = candidate.head_interview() else {
                continue;
            };
            let key = DedupKey::meet_1h(candidate.id, interview.scheduled_at);
            let expires_at = interview.scheduled_at + Duration::hours(24);
            // claim-before-notify: the insert is the only thing that makes
            // this at-most-once across ticks and processes
            if !self.store.claim_dedup_record(&key, expires_at).await? {
                continue;
            }
            report.matched += 1;

            let text = interview_reminder_text(candidate, interview, self.config.timezone);
            report.delivered += self.fan_out(&subscribers, &text).await;

            if let Err(err) = self.store.mark_head_interview_reminded(candidate.id).await {
                tracing::warn!(
                    candidate_id = %candidate.id,
                    error = ?err,
                    "failed to mark head interview reminded"
                );
            }
        }
        Ok(())
    }

    /// Every enabled subscriber gets an attempt; one failure neither stops
    /// the others nor retries the job (the claim is already spent).
    async fn fan_out(&self, subscribers: &[Subscriber], text: &str) -> usize {
        let mut delivered = 0;
        for subscriber in subscribers {
            match self.notifier.deliver(subscriber.chat_id, text).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(
                        chat_id = subscriber.chat_id,
                        error = ?err,
                        "reminder delivery failed"
                    );
                }
            }
        }
        delivered
    }
}

/// Live polling loop. Cancellation is observed only between ticks, so an
/// in-flight fan-out always finishes.
pub async fn run_loop<S, N>(scheduler: Arc<ReminderScheduler<S, N>>, shutdown: CancellationToken)
where
    S: ReminderStore,
    N: Notifier,
{
    loop {
        match scheduler.run_tick_once().await {
            Ok(report) if report.matched > 0 => {
                tracing::info!(
                    checked = report.checked,
                    matched = report.matched,
                    delivered = report.delivered,
                    "reminder tick"
                );
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = ?err, "reminder tick failed"),
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(scheduler.config().poll_interval) => {}
        }
    }
    tracing::info!("reminder scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::candidate::{Candidate, CandidateStatus, Interview};
    use crate::models::employee::{Department, Employee};
    use async_trait::async_trait;
    use chrono_tz::Europe::Kyiv;
    use mockall::mock;
    use sqlx::types::Json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            timezone: Kyiv,
            poll_interval: std::time::Duration::from_secs(30),
            interview_lead: Duration::minutes(60),
            window_half_width: Duration::seconds(45),
            birthday_today_at: (9, 0),
            birthday_upcoming_at: (12, 0),
            birthday_upcoming_days: 7,
        }
    }

    fn candidate_with_interview(scheduled_at: DateTime<Utc>) -> Candidate {
        let created = utc("2025-01-01T00:00:00Z");
        Candidate {
            id: Uuid::new_v4(),
            full_name: "Test Candidate".to_string(),
            email: "candidate@example.com".to_string(),
            phone: String::new(),
            notes: None,
            status: CandidateStatus::NotHeld,
            meet_link: None,
            department: Department::Gambling,
            position: None,
            polygraph_at: None,
            accepted_at: None,
            declined_at: None,
            canceled_at: None,
            polygraph_address: String::new(),
            interviews: Json(vec![Interview::seeded_now(scheduled_at)]),
            created_at: created,
            updated_at: created,
        }
    }

    fn employee_with_birthday(name: &str, birthday: &str) -> Employee {
        let now = utc("2025-01-01T00:00:00Z");
        Employee {
            id: Uuid::new_v4(),
            candidate_id: None,
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: String::new(),
            birthday_at: Some(utc(birthday)),
            department: Department::Gambling,
            position: None,
            notes: String::new(),
            hired_at: now,
            terminated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn subscriber(chat_id: i64) -> Subscriber {
        let now = utc("2025-01-01T00:00:00Z");
        Subscriber {
            chat_id,
            username: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// In-memory stand-in mirroring the Postgres contract, including the
    /// uniqueness semantics of the dedup claim.
    #[derive(Default)]
    struct InMemoryStore {
        candidates: Mutex<Vec<Candidate>>,
        employees: Vec<Employee>,
        subscribers: Vec<Subscriber>,
        claims: Mutex<HashSet<(Uuid, DateTime<Utc>, &'static str)>>,
        job_days: Mutex<HashMap<String, String>>,
        /// Simulates a failing reminded-marker write so the dedup claim is
        /// the only thing standing between ticks and a duplicate send.
        fail_mark: bool,
    }

    #[async_trait]
    impl ReminderStore for InMemoryStore {
        async fn find_candidates_with_imminent_head_interview(
            &self,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Candidate>> {
            let candidates = self.candidates.lock().unwrap();
            Ok(candidates
                .iter()
                .filter(|c| {
                    matches!(c.status, CandidateStatus::NotHeld | CandidateStatus::Reserve)
                        && c.head_interview().map_or(false, |i| {
                            !i.reminded && from <= i.scheduled_at && i.scheduled_at <= to
                        })
                })
                .cloned()
                .collect())
        }

        async fn find_employees_with_birthday(&self) -> Result<Vec<Employee>> {
            Ok(self
                .employees
                .iter()
                .filter(|e| e.birthday_at.is_some() && e.terminated_at.is_none())
                .cloned()
                .collect())
        }

        async fn find_enabled_subscribers(&self) -> Result<Vec<Subscriber>> {
            Ok(self.subscribers.iter().filter(|s| s.enabled).cloned().collect())
        }

        async fn claim_dedup_record(
            &self,
            key: &DedupKey,
            _expires_at: DateTime<Utc>,
        ) -> Result<bool> {
            let mut claims = self.claims.lock().unwrap();
            Ok(claims.insert((key.candidate_id, key.scheduled_at, key.kind.as_str())))
        }

        async fn purge_expired_dedup(&self, _now: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }

        async fn last_run_day(&self, job_name: &str) -> Result<Option<String>> {
            Ok(self.job_days.lock().unwrap().get(job_name).cloned())
        }

        async fn set_last_run_day(&self, job_name: &str, day_key: &str) -> Result<()> {
            self.job_days
                .lock()
                .unwrap()
                .insert(job_name.to_string(), day_key.to_string());
            Ok(())
        }

        async fn mark_head_interview_reminded(&self, candidate_id: Uuid) -> Result<()> {
            if self.fail_mark {
                return Err(Error::Internal("marker write lost".to_string()));
            }
            let mut candidates = self.candidates.lock().unwrap();
            if let Some(candidate) = candidates.iter_mut().find(|c| c.id == candidate_id) {
                if let Some(head) = candidate.interviews.0.first_mut() {
                    head.reminded = true;
                }
            }
            Ok(())
        }
    }

    /// Records every delivery; selected recipients can be made to fail.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
        failing: HashSet<i64>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, chat_id: i64, text: &str) -> Result<()> {
            if self.failing.contains(&chat_id) {
                return Err(Error::Internal("recipient unreachable".to_string()));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    mock! {
        pub QuietNotifier {}

        #[async_trait]
        impl Notifier for QuietNotifier {
            async fn deliver(&self, chat_id: i64, text: &str) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn interview_reminder_is_sent_at_most_once_across_ticks() {
        let now = utc("2025-01-15T10:00:00Z");
        let store = InMemoryStore {
            candidates: Mutex::new(vec![candidate_with_interview(now + Duration::minutes(60))]),
            subscribers: vec![subscriber(1), subscriber(2)],
            // even with the marker lost, the dedup claim must keep the
            // second tick silent
            fail_mark: true,
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        let first = scheduler.run_tick_at(now).await.unwrap();
        assert_eq!(first.checked, 1);
        assert_eq!(first.matched, 1);
        assert_eq!(first.delivered, 2);

        let second = scheduler.run_tick_at(now + Duration::seconds(30)).await.unwrap();
        assert_eq!(second.matched, 0);
        assert_eq!(second.delivered, 0);

        assert_eq!(scheduler.notifier.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reminded_marker_hides_candidate_from_later_scans() {
        let now = utc("2025-01-15T10:00:00Z");
        let store = InMemoryStore {
            candidates: Mutex::new(vec![candidate_with_interview(now + Duration::minutes(60))]),
            subscribers: vec![subscriber(1)],
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        scheduler.run_tick_at(now).await.unwrap();
        let second = scheduler.run_tick_at(now + Duration::seconds(30)).await.unwrap();
        assert_eq!(second.checked, 0);
    }

    #[tokio::test]
    async fn lost_claim_race_is_a_silent_skip() {
        let now = utc("2025-01-15T10:00:00Z");
        let scheduled = now + Duration::minutes(60);
        let candidate = candidate_with_interview(scheduled);
        let store = InMemoryStore {
            candidates: Mutex::new(vec![candidate.clone()]),
            subscribers: vec![subscriber(1)],
            ..Default::default()
        };
        // another process already announced this interview
        store
            .claims
            .lock()
            .unwrap()
            .insert((candidate.id, scheduled, "meet_1h"));
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        let report = scheduler.run_tick_at(now).await.unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.matched, 0);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn window_boundary_at_one_hour_lead() {
        let now = utc("2025-01-15T10:00:00Z");
        let store = InMemoryStore {
            candidates: Mutex::new(vec![
                candidate_with_interview(now + Duration::minutes(61)),
                candidate_with_interview(now + Duration::minutes(60) + Duration::seconds(30)),
            ]),
            subscribers: vec![subscriber(1)],
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        let report = scheduler.run_tick_at(now).await.unwrap();
        // only the 60m30s interview is inside now + 60m ± 45s
        assert_eq!(report.checked, 1);
        assert_eq!(report.matched, 1);
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_stop_the_fan_out() {
        let now = utc("2025-01-15T10:00:00Z");
        let store = InMemoryStore {
            candidates: Mutex::new(vec![candidate_with_interview(now + Duration::minutes(60))]),
            subscribers: vec![subscriber(1), subscriber(2), subscriber(3)],
            ..Default::default()
        };
        let notifier = RecordingNotifier {
            failing: HashSet::from([2]),
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, notifier, test_config());

        let report = scheduler.run_tick_at(now).await.unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 2);
        let sent = scheduler.notifier.sent.lock().unwrap();
        let recipients: Vec<i64> = sent.iter().map(|(chat, _)| *chat).collect();
        assert_eq!(recipients, vec![1, 3]);
    }

    #[tokio::test]
    async fn birthday_digest_fires_once_per_local_day() {
        // 07:00 UTC = 09:00 in Kyiv (winter)
        let at_nine = utc("2025-01-15T07:00:00Z");
        let store = InMemoryStore {
            employees: vec![
                employee_with_birthday("Anna", "1990-01-15T12:00:00Z"),
                employee_with_birthday("Boris", "1985-01-15T12:00:00Z"),
            ],
            subscribers: vec![subscriber(1)],
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        let first = scheduler.run_tick_at(at_nine).await.unwrap();
        assert_eq!(first.matched, 2);
        assert_eq!(first.delivered, 1);

        // second tick in the same minute: the day key is already burned
        let second = scheduler.run_tick_at(at_nine + Duration::seconds(30)).await.unwrap();
        assert_eq!(second.matched, 0);
        assert_eq!(second.delivered, 0);

        let sent = scheduler.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("• Anna"));
        assert!(sent[0].1.contains("• Boris"));
    }

    #[tokio::test]
    async fn birthday_gate_rearms_on_the_next_local_day() {
        let store = InMemoryStore {
            employees: vec![employee_with_birthday("Anna", "1990-01-15T12:00:00Z")],
            subscribers: vec![subscriber(1)],
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        let day_one = scheduler.run_tick_at(utc("2025-01-15T07:00:00Z")).await.unwrap();
        assert_eq!(day_one.delivered, 1);

        // next day: gate re-arms, but Anna no longer matches
        let day_two = scheduler.run_tick_at(utc("2025-01-16T07:00:00Z")).await.unwrap();
        assert_eq!(day_two.matched, 0);
        assert_eq!(scheduler.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nothing_is_delivered_before_the_trigger_time() {
        let store = InMemoryStore {
            employees: vec![employee_with_birthday("Anna", "1990-01-15T12:00:00Z")],
            subscribers: vec![subscriber(1)],
            ..Default::default()
        };
        let mut notifier = MockQuietNotifier::new();
        notifier.expect_deliver().never();
        let scheduler = ReminderScheduler::new(store, notifier, test_config());

        // 08:30 local, half an hour before the 09:00 trigger
        let report = scheduler.run_tick_at(utc("2025-01-15T06:30:00Z")).await.unwrap();
        assert_eq!(report.matched, 0);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn upcoming_job_looks_seven_days_ahead() {
        // 10:00 UTC = 12:00 in Kyiv; Jan 15 + 7 = Jan 22
        let at_noon = utc("2025-01-15T10:00:00Z");
        let store = InMemoryStore {
            employees: vec![
                employee_with_birthday("Soon", "1990-01-22T12:00:00Z"),
                employee_with_birthday("Later", "1990-02-22T12:00:00Z"),
            ],
            subscribers: vec![subscriber(1)],
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        let report = scheduler.run_tick_at(at_noon).await.unwrap();
        assert_eq!(report.matched, 1);
        assert_eq!(report.delivered, 1);
        let sent = scheduler.notifier.sent.lock().unwrap();
        assert!(sent[0].1.contains("Через 7 дн."));
        assert!(sent[0].1.contains("• Soon"));
    }

    #[tokio::test]
    async fn concurrent_claims_yield_exactly_one_winner() {
        let store = InMemoryStore::default();
        let scheduled = utc("2025-01-15T11:00:00Z");
        let key = DedupKey::meet_1h(Uuid::new_v4(), scheduled);
        let expires = scheduled + Duration::hours(24);

        let (first, second) = tokio::join!(
            store.claim_dedup_record(&key, expires),
            store.claim_dedup_record(&key, expires),
        );
        let winners = [first.unwrap(), second.unwrap()];
        assert_eq!(winners.iter().filter(|claimed| **claimed).count(), 1);
    }

    #[tokio::test]
    async fn no_enabled_subscribers_means_no_delivery_but_no_error() {
        let at_nine = utc("2025-01-15T07:00:00Z");
        let store = InMemoryStore {
            employees: vec![employee_with_birthday("Anna", "1990-01-15T12:00:00Z")],
            subscribers: vec![],
            ..Default::default()
        };
        let scheduler = ReminderScheduler::new(store, RecordingNotifier::default(), test_config());

        let report = scheduler.run_tick_at(at_nine).await.unwrap();
        assert_eq!(report.delivered, 0);
    }
}
