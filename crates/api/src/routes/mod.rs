//! HTTP route handlers

pub mod alerts;
pub mod notifications;
pub mod telemetry;
pub mod ws;
