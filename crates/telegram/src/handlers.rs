//! Update handling: slash commands and menu callbacks.

use std::sync::Arc;

use {
    maxrelay_auth::SessionAuthority,
    maxrelay_common::{DestinationId, OperatorId},
    maxrelay_forwarder::{CommandOutcome, ControlCommand, Controller},
    maxrelay_store::Store,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{CallbackQuery, Chat, InlineKeyboardMarkup, MessageId},
    },
    tracing::{debug, info, warn},
};

use crate::{
    commands::{Command, HELP_TEXT},
    error::Result,
    menu::{self, MenuAction},
    report::{HostSnapshot, performance_report, status_report},
};

/// Label used for chats without a title (private chats).
const PRIVATE_CHAT_LABEL: &str = "Private messages";

const PASSWORD_USAGE: &str = "Usage: /password <password>";

/// Text plus the keyboard that goes with it.
type Screen = (String, InlineKeyboardMarkup);

/// The operator-facing side of the bot.
pub struct ControlPlane {
    bot: Bot,
    controller: Arc<Controller>,
    sessions: Arc<SessionAuthority>,
    store: Arc<Store>,
}

impl ControlPlane {
    pub fn new(
        bot: Bot,
        controller: Arc<Controller>,
        sessions: Arc<SessionAuthority>,
        store: Arc<Store>,
    ) -> Self {
        Self {
            bot,
            controller,
            sessions,
            store,
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub async fn handle_message(&self, msg: Message) -> Result<()> {
        let Some(text) = msg.text() else {
            return Ok(());
        };
        let Some(command) = Command::parse(text) else {
            debug!(chat_id = msg.chat.id.0, "ignoring non-command message");
            return Ok(());
        };
        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };
        let operator = OperatorId(user.id.0);
        let chat_id = msg.chat.id;
        debug!(%operator, chat_id = chat_id.0, ?command, "command received");

        let (text, markup) = match command {
            Command::Start => {
                let authorized = self.sessions.is_authorized(operator);
                (
                    "👋 MAX → Telegram relay\n\nChoose an action:".to_string(),
                    menu::main_menu(authorized),
                )
            },
            Command::Password(None) => (PASSWORD_USAGE.to_string(), menu::back_to_main()),
            Command::Password(Some(password)) => {
                self.authenticate(operator, &msg.chat, &password)?
            },
            Command::Logout => self.logout(operator),
            Command::AddChat => {
                if self.sessions.is_authorized(operator) {
                    self.add_chat(&msg.chat)?
                } else {
                    unauthorized()
                }
            },
            Command::Status => self.status_screen(operator),
            Command::Performance => {
                if self.sessions.is_authorized(operator) {
                    self.performance_screen().await
                } else {
                    unauthorized()
                }
            },
            Command::Help => (HELP_TEXT.to_string(), menu::back_to_main()),
        };

        self.bot
            .send_message(chat_id, text)
            .reply_markup(markup)
            .await?;
        Ok(())
    }

    pub async fn handle_callback_query(&self, query: CallbackQuery) -> Result<()> {
        // Dismiss the client-side spinner whatever happens next.
        if let Err(e) = self.bot.answer_callback_query(&query.id).await {
            debug!(error = %e, "failed to answer callback query");
        }

        let Some(data) = query.data.as_deref() else {
            return Ok(());
        };
        let Some(message) = query.message.as_ref() else {
            return Ok(());
        };
        let Some(action) = MenuAction::parse(data) else {
            warn!(data, "unknown callback data");
            return Ok(());
        };
        let operator = OperatorId(query.from.id.0);
        let chat = message.chat();
        debug!(%operator, chat_id = chat.id.0, %action, "menu action");

        let screen = if !action.is_public() && !self.sessions.is_authorized(operator) {
            warn!(%operator, %action, "unauthorized menu action");
            unauthorized()
        } else {
            self.dispatch(operator, chat, action).await?
        };

        self.show(chat.id, message.id(), screen).await
    }

    /// Persist a handler failure and tell the admin about it.
    pub async fn report_failure(&self, context: &str, error: &crate::Error) {
        let text = format!("{context}: {error}");
        if let Err(e) = self.store.record_error(&text) {
            warn!(error = %e, "failed to persist last error");
        }
        let Some(admin) = self.store.admin_destination() else {
            return;
        };
        let Ok(chat_id) = admin.as_chat_id() else {
            return;
        };
        if let Err(e) = self
            .bot
            .send_message(ChatId(chat_id), format!("❌ {text}"))
            .await
        {
            warn!(error = %e, "failed to notify admin");
        }
    }

    async fn dispatch(
        &self,
        operator: OperatorId,
        chat: &Chat,
        action: MenuAction,
    ) -> Result<Screen> {
        Ok(match action {
            MenuAction::Auth => {
                if self.sessions.is_authorized(operator) {
                    ("✅ You are already authenticated.".to_string(), self.admin_keyboard())
                } else {
                    (
                        format!("🔐 Send the password with the command:\n{PASSWORD_USAGE}"),
                        menu::back_to_main(),
                    )
                }
            },
            MenuAction::Status => self.status_screen(operator),
            MenuAction::Help => (HELP_TEXT.to_string(), menu::back_to_main()),
            MenuAction::MainMenu => (
                "🏠 Main menu".to_string(),
                menu::main_menu(self.sessions.is_authorized(operator)),
            ),
            MenuAction::AdminMenu => ("⚙️ Admin panel".to_string(), self.admin_keyboard()),
            MenuAction::StartForwarding => self.command(operator, ControlCommand::Start).await,
            MenuAction::StopForwarding => self.command(operator, ControlCommand::Stop).await,
            MenuAction::ImReady => self.command(operator, ControlCommand::MarkReady).await,
            MenuAction::SelectChat(id) => {
                let outcome = self
                    .controller
                    .execute(operator, ControlCommand::SelectDestination(id))
                    .await;
                (outcome.to_string(), menu::back_to_admin())
            },
            MenuAction::ListChats => self.chat_list_screen(),
            MenuAction::AddChat => self.add_chat(chat)?,
            MenuAction::Performance => self.performance_screen().await,
            MenuAction::Logout => self.logout(operator),
        })
    }

    fn authenticate(&self, operator: OperatorId, chat: &Chat, password: &str) -> Result<Screen> {
        if !self.sessions.authenticate(operator, password) {
            warn!(%operator, "authentication failed");
            return Ok(("❌ Wrong password.".to_string(), menu::back_to_main()));
        }

        let chat_dest = DestinationId::from(chat.id.0);
        if self.store.set_admin_if_unset(chat_dest.clone())? {
            info!(%operator, admin = %chat_dest, "admin chat recorded");
        }
        self.store.register_destination(chat_dest, chat_label(chat))?;
        info!(%operator, "operator authenticated");
        Ok((
            "✅ Authenticated. The session lasts one hour of inactivity.".to_string(),
            self.admin_keyboard(),
        ))
    }

    fn logout(&self, operator: OperatorId) -> Screen {
        let text = if self.sessions.logout(operator) {
            info!(%operator, "operator logged out");
            "👋 Logged out."
        } else {
            "ℹ️ You were not logged in."
        };
        (text.to_string(), menu::main_menu(false))
    }

    fn add_chat(&self, chat: &Chat) -> Result<Screen> {
        let label = chat_label(chat);
        self.store
            .register_destination(DestinationId::from(chat.id.0), label)?;
        Ok((format!("✅ Chat added: {label}"), menu::back_to_admin()))
    }

    async fn command(&self, operator: OperatorId, command: ControlCommand) -> Screen {
        let outcome = self.controller.execute(operator, command).await;
        let markup = if outcome == CommandOutcome::Unauthorized {
            menu::back_to_main()
        } else {
            self.admin_keyboard()
        };
        (outcome.to_string(), markup)
    }

    fn status_screen(&self, operator: OperatorId) -> Screen {
        let authorized = self.sessions.is_authorized(operator);
        let text = status_report(authorized, &self.controller.status(), &self.store);
        let markup = if authorized {
            menu::back_to_admin()
        } else {
            menu::back_to_main()
        };
        (text, markup)
    }

    async fn performance_screen(&self) -> Screen {
        let host = HostSnapshot::sample().await;
        let text = performance_report(&self.controller.status(), &self.store, &host);
        (text, menu::back_to_admin())
    }

    fn chat_list_screen(&self) -> Screen {
        let chats = self.store.destinations();
        if chats.is_empty() {
            return (
                "📋 No chats registered yet. Add one with /addchat.".to_string(),
                menu::back_to_admin(),
            );
        }
        let selected = self.store.selected_destination();
        (
            "📋 Select the destination chat:".to_string(),
            menu::chat_list(&chats, selected.as_ref()),
        )
    }

    fn admin_keyboard(&self) -> InlineKeyboardMarkup {
        let status = self.controller.status();
        menu::admin_menu(status.forwarding_active, status.source_ready)
    }

    /// Edit the menu message in place; send a new one if it can't be edited.
    async fn show(&self, chat_id: ChatId, message_id: MessageId, screen: Screen) -> Result<()> {
        let (text, markup) = screen;
        match self
            .bot
            .edit_message_text(chat_id, message_id, text.clone())
            .reply_markup(markup.clone())
            .await
        {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => {
                debug!(error = %e, "edit failed, sending a new message");
                self.bot
                    .send_message(chat_id, text)
                    .reply_markup(markup)
                    .await?;
                Ok(())
            },
        }
    }
}

fn unauthorized() -> Screen {
    (CommandOutcome::Unauthorized.to_string(), menu::back_to_main())
}

fn chat_label(chat: &Chat) -> &str {
    chat.title().unwrap_or(PRIVATE_CHAT_LABEL)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{
            MockBehavior, Wiring, callback_query, group_message, text_message, wired,
        },
    };

    const PASSWORD: &str = "letmein";
    const USER: u64 = 1001;
    const PRIVATE_CHAT: i64 = 1001;

    async fn fixture() -> Wiring {
        wired(MockBehavior::Ok, PASSWORD).await
    }

    #[tokio::test]
    async fn test_password_without_argument_shows_usage() {
        let f = fixture().await;
        f.plane
            .handle_message(text_message(PRIVATE_CHAT, USER, "/password"))
            .await
            .unwrap();
        assert_eq!(f.api.texts_to(PRIVATE_CHAT), vec![PASSWORD_USAGE]);
        assert!(!f.sessions.is_authorized(OperatorId(USER)));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let f = fixture().await;
        f.plane
            .handle_message(text_message(PRIVATE_CHAT, USER, "/password nope"))
            .await
            .unwrap();
        assert_eq!(f.api.texts_to(PRIVATE_CHAT), vec!["❌ Wrong password."]);
        assert!(!f.sessions.is_authorized(OperatorId(USER)));
        assert_eq!(f.store.admin_destination(), None);
        assert_eq!(f.store.destination_count(), 0);
    }

    #[tokio::test]
    async fn test_password_in_group_registers_chat_and_admin() {
        let f = fixture().await;
        f.plane
            .handle_message(group_message(-100500, "Family", USER, "/password letmein"))
            .await
            .unwrap();

        assert!(f.sessions.is_authorized(OperatorId(USER)));
        assert_eq!(f.store.admin_destination(), Some(DestinationId::from(-100500)));
        assert_eq!(
            f.store.destination_label(&DestinationId::from(-100500)),
            Some("Family".into())
        );
        let sent = f.api.texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.starts_with("✅ Authenticated"));
        assert!(sent[0].reply_markup.is_some());

        // A second operator authenticating elsewhere does not move the admin chat.
        f.plane
            .handle_message(text_message(PRIVATE_CHAT, 2002, "/password letmein"))
            .await
            .unwrap();
        assert_eq!(f.store.admin_destination(), Some(DestinationId::from(-100500)));
        assert_eq!(
            f.store.destination_label(&DestinationId::from(PRIVATE_CHAT)),
            Some(PRIVATE_CHAT_LABEL.into())
        );
    }

    #[tokio::test]
    async fn test_addchat_requires_session() {
        let f = fixture().await;
        f.plane
            .handle_message(group_message(-42, "Team", USER, "/addchat@relay_bot"))
            .await
            .unwrap();
        assert_eq!(f.store.destination_count(), 0);
        assert_eq!(
            f.api.texts_to(-42),
            vec![CommandOutcome::Unauthorized.to_string()]
        );
    }

    #[tokio::test]
    async fn test_non_command_text_is_ignored() {
        let f = fixture().await;
        f.plane
            .handle_message(text_message(PRIVATE_CHAT, USER, "hello there"))
            .await
            .unwrap();
        assert!(f.api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_callback_does_not_start() {
        let f = fixture().await;
        f.plane
            .handle_callback_query(callback_query(PRIVATE_CHAT, USER, "start_forwarding"))
            .await
            .unwrap();

        assert!(!f.engine.is_active());
        let requests = f.api.requests();
        assert_eq!(requests[0].method, "AnswerCallbackQuery");
        assert_eq!(
            f.api.texts_to(PRIVATE_CHAT),
            vec![CommandOutcome::Unauthorized.to_string()]
        );
    }

    #[tokio::test]
    async fn test_start_without_destination_is_rejected() {
        let f = fixture().await;
        assert!(f.sessions.authenticate(OperatorId(USER), PASSWORD));
        f.plane
            .handle_callback_query(callback_query(PRIVATE_CHAT, USER, "start_forwarding"))
            .await
            .unwrap();

        assert!(!f.engine.is_active());
        assert_eq!(
            f.api.texts_to(PRIVATE_CHAT),
            vec![CommandOutcome::NoDestinationSelected.to_string()]
        );
        assert!(!f.store.settings().forwarding_enabled);
    }

    #[tokio::test]
    async fn test_select_chat_callback_persists_destination() {
        let f = fixture().await;
        assert!(f.sessions.authenticate(OperatorId(USER), PASSWORD));
        f.store
            .register_destination(DestinationId::new("-100777"), "News")
            .unwrap();

        f.plane
            .handle_callback_query(callback_query(PRIVATE_CHAT, USER, "chat:-100777"))
            .await
            .unwrap();

        assert_eq!(
            f.store.selected_destination(),
            Some(DestinationId::new("-100777"))
        );
        assert_eq!(f.api.texts_to(PRIVATE_CHAT), vec!["✅ Selected chat: News"]);
    }

    #[tokio::test]
    async fn test_list_chats_offers_each_registered_chat() {
        let f = fixture().await;
        assert!(f.sessions.authenticate(OperatorId(USER), PASSWORD));
        f.store
            .register_destination(DestinationId::new("-1"), "One")
            .unwrap();
        f.store
            .register_destination(DestinationId::new("-2"), "Two")
            .unwrap();

        f.plane
            .handle_callback_query(callback_query(PRIVATE_CHAT, USER, "list_chats"))
            .await
            .unwrap();

        let sent = f.api.texts();
        let markup = sent[0].reply_markup.as_ref().unwrap().to_string();
        assert!(markup.contains("chat:-1"));
        assert!(markup.contains("chat:-2"));
    }

    #[tokio::test]
    async fn test_im_ready_when_idle_reports_not_running() {
        let f = fixture().await;
        assert!(f.sessions.authenticate(OperatorId(USER), PASSWORD));
        f.plane
            .handle_callback_query(callback_query(PRIVATE_CHAT, USER, "im_ready"))
            .await
            .unwrap();
        assert_eq!(
            f.api.texts_to(PRIVATE_CHAT),
            vec![CommandOutcome::NotActive.to_string()]
        );
    }

    #[tokio::test]
    async fn test_logout_callback_ends_session() {
        let f = fixture().await;
        assert!(f.sessions.authenticate(OperatorId(USER), PASSWORD));
        f.plane
            .handle_callback_query(callback_query(PRIVATE_CHAT, USER, "logout"))
            .await
            .unwrap();
        assert!(!f.sessions.is_authorized(OperatorId(USER)));
        assert_eq!(f.api.texts_to(PRIVATE_CHAT), vec!["👋 Logged out."]);
    }

    #[tokio::test]
    async fn test_report_failure_persists_and_notifies_admin() {
        let f = fixture().await;
        f.store.set_admin_if_unset(DestinationId::from(900)).unwrap();

        f.plane
            .report_failure("update handling failed", &crate::Error::message("boom"))
            .await;

        let last = f.store.settings().last_error.unwrap();
        assert!(last.ends_with("update handling failed: boom"));
        assert_eq!(f.api.texts_to(900), vec!["❌ update handling failed: boom"]);
    }
}
