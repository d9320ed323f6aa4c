//! Subscriber table wiring events to game handlers.

use std::sync::Arc;

use crate::{
    dto::{
        event::{MessageCallback, MessageText},
        payload::Payload,
    },
    services::{
        dispatcher::Dispatcher, flood_guard::FloodGuard, game_service, lobby_service,
        round_service,
    },
    state::SharedState,
};

const MENU_COMMANDS: [&str; 3] = ["/start", "start", "menu"];
const STOP_COMMAND: &str = "stop";

/// Build the dispatcher with every game subscriber registered.
pub fn build_dispatcher(state: SharedState, flood_guard: Arc<dyn FloodGuard>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(state, flood_guard);

    dispatcher.on_chat_invite("greet", |invite| invite.invites_bot(), lobby_service::greet);

    dispatcher
        .on_message_text("open_menu", is_menu_command, lobby_service::open_menu)
        .on_message_text(
            "force_stop",
            |message: &MessageText| message.command() == STOP_COMMAND,
            game_service::force_stop,
        );

    dispatcher
        .on_message_callback(
            "new_game",
            |cb| matches!(cb.payload, Payload::NewGame),
            lobby_service::new_game,
        )
        .on_message_callback(
            "join",
            |cb| matches!(cb.payload, Payload::Join),
            lobby_service::join,
        )
        .on_message_callback(
            "start_game",
            |cb| matches!(cb.payload, Payload::StartGame),
            lobby_service::start_game,
        )
        .on_message_callback(
            "show_themes",
            |cb| matches!(cb.payload, Payload::ShowThemes { .. }),
            round_service::show_themes,
        )
        .on_message_callback(
            "choose_theme",
            |cb| matches!(cb.payload, Payload::ChooseTheme { .. }),
            round_service::choose_theme,
        )
        .on_message_callback(
            "choose_question",
            |cb| matches!(cb.payload, Payload::ChooseQuestion { .. }),
            round_service::choose_question,
        )
        .on_message_callback(
            "answer",
            |cb| matches!(cb.payload, Payload::Answer { .. }),
            round_service::answer,
        )
        .on_message_callback(
            "show_scoreboard",
            |cb| matches!(cb.payload, Payload::ShowScoreboard { .. }),
            round_service::show_scoreboard,
        )
        .on_message_callback("stop_game", is_stop_request, game_service::stop_game)
        .on_message_callback(
            "confirm_stop_game",
            |cb| matches!(cb.payload, Payload::ConfirmStopGame { .. }),
            game_service::confirm_stop_game,
        )
        .on_message_callback(
            "cancel_stop_game",
            |cb| matches!(cb.payload, Payload::CancelStopGame { .. }),
            game_service::cancel_stop_game,
        );

    dispatcher
}

fn is_menu_command(message: &MessageText) -> bool {
    MENU_COMMANDS.contains(&message.command().as_str())
}

fn is_stop_request(callback: &MessageCallback) -> bool {
    matches!(callback.payload, Payload::StopGame { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> MessageText {
        MessageText {
            chat_id: 1,
            user_id: 2,
            text: body.into(),
        }
    }

    #[test]
    fn menu_commands_accept_mentions() {
        assert!(is_menu_command(&text("/start")));
        assert!(is_menu_command(&text("[club1|@trivia] Menu")));
        assert!(!is_menu_command(&text("menus")));
    }
}
