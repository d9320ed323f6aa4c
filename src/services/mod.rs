/// Rendering screens onto the chat's board message.
pub mod board;
/// Update routing to registered subscribers.
pub mod dispatcher;
/// Per-chat rate limiting.
pub mod flood_guard;
/// Stopping and finishing games.
pub mod game_service;
/// Subscriber table for every game event.
pub mod handlers;
/// Menu, lobby and game start.
pub mod lobby_service;
/// Long-poll ingestion loops.
pub mod poller;
/// Themes, questions, answers and scoreboards.
pub mod round_service;
/// Screen texts and keyboards.
pub mod screens;
/// Cancellable answer timers.
pub mod timer;
