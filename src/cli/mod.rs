pub mod export;
pub mod report;
pub mod session;
pub mod setup;
pub mod ui;
