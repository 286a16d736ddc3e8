pub mod config;
pub mod control;
pub mod dispatch;
pub mod obs;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod signal;
