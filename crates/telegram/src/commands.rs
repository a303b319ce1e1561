//! Slash commands understood by the bot.

use teloxide::types::BotCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    /// `/password` with its argument, if any.
    Password(Option<String>),
    Logout,
    AddChat,
    Status,
    Performance,
    Help,
}

impl Command {
    /// Parse a message text. `/cmd@botname` forms are accepted; anything
    /// not starting with `/` or naming an unknown command is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, arg) = match rest.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, arg.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let arg = (!arg.is_empty()).then(|| arg.to_string());

        Some(match name.as_str() {
            "start" => Self::Start,
            "password" => Self::Password(arg),
            "logout" => Self::Logout,
            "addchat" => Self::AddChat,
            "status" => Self::Status,
            "performance" => Self::Performance,
            "help" => Self::Help,
            _ => return None,
        })
    }
}

/// Commands advertised through `setMyCommands`.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Main menu"),
        BotCommand::new("password", "Authenticate: /password <password>"),
        BotCommand::new("status", "Forwarding status"),
        BotCommand::new("addchat", "Register this chat as a destination"),
        BotCommand::new("performance", "Uptime and host metrics"),
        BotCommand::new("logout", "End your session"),
        BotCommand::new("help", "How to use the bot"),
    ]
}

pub const HELP_TEXT: &str = "🤖 MAX → Telegram relay\n\n\
    1. Authenticate with /password <password>\n\
    2. Add this chat with /addchat (or the admin panel)\n\
    3. Pick the destination under \"📋 Chats\"\n\
    4. Press \"🚀 Start forwarding\" and log in to MAX in the browser window\n\
    5. Press \"✅ I have logged in\"\n\n\
    Sessions expire after an hour of inactivity.\n\n\
    Commands:\n\
    /start - main menu\n\
    /password <pw> - authenticate\n\
    /status - forwarding status\n\
    /addchat - register this chat\n\
    /performance - uptime and host metrics\n\
    /logout - end your session\n\
    /help - this text";
