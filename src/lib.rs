pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use crate::scheduler::store::PgReminderStore;
use crate::scheduler::{ReminderScheduler, SchedulerConfig};
use crate::services::{
    candidate_service::CandidateService, employee_service::EmployeeService,
    subscriber_service::SubscriberService, telegram_service::TelegramNotifier,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub candidate_service: CandidateService,
    pub employee_service: EmployeeService,
    pub subscriber_service: SubscriberService,
    pub notifier: TelegramNotifier,
    pub scheduler: Arc<ReminderScheduler<PgReminderStore, TelegramNotifier>>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let candidate_service = CandidateService::new(pool.clone());
        let employee_service = EmployeeService::new(pool.clone());
        let subscriber_service = SubscriberService::new(pool.clone());
        let notifier = TelegramNotifier::new(&config.telegram_bot_token);
        let scheduler = Arc::new(ReminderScheduler::new(
            PgReminderStore::new(pool.clone()),
            notifier.clone(),
            SchedulerConfig::from_config(config),
        ));

        Self {
            pool,
            candidate_service,
            employee_service,
            subscriber_service,
            notifier,
            scheduler,
        }
    }
}
