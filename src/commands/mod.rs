pub mod payment;
pub mod payment_type;
pub mod receipt;
pub mod report;
pub mod student;
pub mod user;
