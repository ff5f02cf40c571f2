pub mod candidate;
pub mod employee;
pub mod notification;
pub mod subscriber;
