//! Inline-keyboard menus and the callback actions behind their buttons.

use std::fmt;

use {
    maxrelay_common::DestinationId,
    teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup},
};

const CHAT_PREFIX: &str = "chat:";

/// Everything a menu button can ask for, parsed from its callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Auth,
    Status,
    Help,
    MainMenu,
    AdminMenu,
    StartForwarding,
    StopForwarding,
    ListChats,
    AddChat,
    ImReady,
    Performance,
    Logout,
    SelectChat(DestinationId),
}

impl MenuAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix(CHAT_PREFIX) {
            return (!id.is_empty()).then(|| Self::SelectChat(DestinationId::new(id)));
        }
        Some(match data {
            "auth" => Self::Auth,
            "status" => Self::Status,
            "help" => Self::Help,
            "main_menu" => Self::MainMenu,
            "admin_menu" => Self::AdminMenu,
            "start_forwarding" => Self::StartForwarding,
            "stop_forwarding" => Self::StopForwarding,
            "list_chats" => Self::ListChats,
            "add_chat" => Self::AddChat,
            "im_ready" => Self::ImReady,
            "performance" => Self::Performance,
            "logout" => Self::Logout,
            _ => return None,
        })
    }

    /// Actions reachable without an operator session.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Self::Auth | Self::Status | Self::Help | Self::MainMenu | Self::Logout
        )
    }

    fn button(&self, label: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(label, self.to_string())
    }
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match self {
            Self::Auth => "auth",
            Self::Status => "status",
            Self::Help => "help",
            Self::MainMenu => "main_menu",
            Self::AdminMenu => "admin_menu",
            Self::StartForwarding => "start_forwarding",
            Self::StopForwarding => "stop_forwarding",
            Self::ListChats => "list_chats",
            Self::AddChat => "add_chat",
            Self::ImReady => "im_ready",
            Self::Performance => "performance",
            Self::Logout => "logout",
            Self::SelectChat(id) => return write!(f, "{CHAT_PREFIX}{id}"),
        };
        f.write_str(data)
    }
}

pub fn main_menu(authorized: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![MenuAction::Auth.button("🔐 Authenticate")],
        vec![
            MenuAction::Status.button("📊 Status"),
            MenuAction::Help.button("❓ Help"),
        ],
    ];
    if authorized {
        rows.push(vec![MenuAction::AdminMenu.button("⚙️ Admin panel")]);
    }
    InlineKeyboardMarkup::new(rows)
}

/// The "I have logged in" row only appears while a run waits for the
/// manual login.
pub fn admin_menu(forwarding_active: bool, source_ready: bool) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if forwarding_active {
        rows.push(vec![
            MenuAction::StopForwarding.button("🛑 Stop forwarding"),
        ]);
        if !source_ready {
            rows.push(vec![MenuAction::ImReady.button("✅ I have logged in")]);
        }
    } else {
        rows.push(vec![
            MenuAction::StartForwarding.button("🚀 Start forwarding"),
        ]);
    }
    rows.push(vec![
        MenuAction::ListChats.button("📋 Chats"),
        MenuAction::AddChat.button("➕ Add this chat"),
    ]);
    rows.push(vec![
        MenuAction::Performance.button("📈 Performance"),
        MenuAction::Status.button("📊 Status"),
    ]);
    rows.push(vec![
        MenuAction::Logout.button("🚪 Log out"),
        MenuAction::MainMenu.button("⬅️ Main menu"),
    ]);
    InlineKeyboardMarkup::new(rows)
}

/// One button per registered chat, the selected one marked.
pub fn chat_list(
    chats: &[(DestinationId, String)],
    selected: Option<&DestinationId>,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = chats
        .iter()
        .map(|(id, label)| {
            let mark = if Some(id) == selected { "● " } else { "○ " };
            vec![MenuAction::SelectChat(id.clone()).button(format!("{mark}{label}"))]
        })
        .collect();
    rows.push(vec![MenuAction::AdminMenu.button("⬅️ Back")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn back_to_admin() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![MenuAction::AdminMenu.button("⬅️ Back")]])
}

pub fn back_to_main() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![MenuAction::MainMenu.button("⬅️ Back")]])
}
