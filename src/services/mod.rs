pub mod candidate_service;
pub mod employee_service;
pub mod subscriber_service;
pub mod telegram_service;
