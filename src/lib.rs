//! Action center signals and the offline debrief queue behind the key
//! account manager dashboard.

pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod queue;
pub mod remote;
pub mod report;
pub mod signals;
pub mod storage;
