//! Telegram side of the relay.
//!
//! Delivers forwarded text through the Bot API and runs the operator
//! control plane: slash commands, inline menus and the long-polling loop.

pub mod bot;
pub mod commands;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod menu;
pub mod report;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_support;

pub use {
    bot::{build_bot, run_polling},
    delivery::TelegramDelivery,
    error::{Error, Result},
    handlers::ControlPlane,
    menu::MenuAction,
};
