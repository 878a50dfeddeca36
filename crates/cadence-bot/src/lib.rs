//! Webhook server and command dispatcher for the cadence check-in bot.

pub mod config;
pub mod dispatcher;
pub mod feedback;
pub mod messenger;
pub mod replies;
pub mod retry;
pub mod server;
pub mod sheet;
pub mod state;
pub mod token;
