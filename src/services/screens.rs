//! Text and keyboards for every screen the bot shows.

use std::{fmt::Write, time::Duration};

use crate::{
    dao::models::{GameId, ScoreEntity, ThemeEntity},
    dto::payload::Payload,
    platform::{Button, ButtonColor, Keyboard, UserSummary},
    state::{
        game::{PriceSlots, Round, Screen},
        session::Roster,
        state_machine::FinishReason,
    },
};

/// Number of theme buttons per keyboard row.
const THEMES_PER_ROW: usize = 2;

pub fn greeting() -> Screen {
    Screen::new(
        "Hi! I run trivia games. Press \"New game\" to open a lobby.",
        Some(menu_keyboard()),
    )
}

pub fn main_menu() -> Screen {
    Screen::new("Trivia: main menu", Some(menu_keyboard()))
}

fn menu_keyboard() -> Keyboard {
    Keyboard::new().row(vec![
        Button::new("New game", Payload::NewGame).colored(ButtonColor::Positive),
    ])
}

pub fn lobby(roster: &Roster) -> Screen {
    let mut text = String::from("Lobby is open. Press \"Join\" to play.");
    if roster.is_empty() {
        text.push_str("\nNobody has joined yet.");
    } else {
        text.push_str("\nPlayers:");
        for (position, user) in roster.values().enumerate() {
            let _ = write!(text, "\n{}. {}", position + 1, user.display_name());
        }
    }

    let keyboard = Keyboard::new().row(vec![
        Button::new("Join", Payload::Join),
        Button::new("Start", Payload::StartGame).colored(ButtonColor::Positive),
    ]);
    Screen::new(text, Some(keyboard))
}

pub fn themes(game_id: GameId, open: &[&ThemeEntity], turn_holder: Option<&str>) -> Screen {
    let mut text = String::from("Pick a theme.");
    if let Some(name) = turn_holder {
        let _ = write!(text, "\nTurn: {name}");
    }

    let mut keyboard = Keyboard::new();
    for chunk in open.chunks(THEMES_PER_ROW) {
        keyboard = keyboard.row(
            chunk
                .iter()
                .map(|theme| {
                    Button::new(
                        theme.title.clone(),
                        Payload::ChooseTheme {
                            game_id,
                            theme_id: theme.id,
                        },
                    )
                })
                .collect(),
        );
    }
    keyboard = keyboard.row(vec![stop_button(game_id)]);

    Screen::new(text, Some(keyboard))
}

pub fn prices(
    game_id: GameId,
    theme: &ThemeEntity,
    slots: PriceSlots,
    turn_holder: Option<&str>,
) -> Screen {
    let mut text = format!("Theme: {}\nPick a price.", theme.title);
    if let Some(name) = turn_holder {
        let _ = write!(text, "\nTurn: {name}");
    }

    let keyboard = Keyboard::new()
        .row(
            slots
                .available_prices()
                .map(|price| {
                    Button::new(
                        price.to_string(),
                        Payload::ChooseQuestion {
                            game_id,
                            theme_id: theme.id,
                            price,
                        },
                    )
                })
                .collect(),
        )
        .row(vec![
            Button::new("Back to themes", Payload::ShowThemes { game_id })
                .colored(ButtonColor::Secondary),
            stop_button(game_id),
        ]);

    Screen::new(text, Some(keyboard))
}

pub fn question(game_id: GameId, round: &Round, remaining: Option<Duration>) -> Screen {
    let mut text = format!("For {}: {}", round.price, round.question.title);
    if let Some(remaining) = remaining {
        let _ = write!(text, "\n\u{23f3} {} s", remaining.as_secs().max(1));
    }

    let mut keyboard = Keyboard::new();
    for answer in &round.question.answers {
        keyboard = keyboard.row(vec![Button::new(
            answer.title.clone(),
            Payload::Answer {
                game_id,
                round_id: round.round_id,
                answer_id: answer.id,
            },
        )]);
    }

    Screen::new(text, Some(keyboard))
}

/// Result of one round, rendered on the reveal screen.
pub struct RevealView<'a> {
    pub round: &'a Round,
    pub winner: Option<&'a UserSummary>,
    pub wrong: Vec<&'a UserSummary>,
}

pub fn reveal(game_id: GameId, view: &RevealView<'_>) -> Screen {
    let round = view.round;
    let correct = round
        .answer_title(round.correct_answer_id)
        .unwrap_or_default();
    let mut text = format!("{}\nCorrect answer: {correct}", round.question.title);

    if round.answered.is_empty() {
        text.push_str("\nNobody answered.");
    }
    if let Some(winner) = view.winner {
        let _ = write!(text, "\n+{} to {}", round.price, winner.display_name());
    } else if !round.answered.is_empty() {
        text.push_str("\nNobody got it right.");
    }
    for user in &view.wrong {
        let _ = write!(text, "\n-{} to {}", round.price, user.display_name());
    }

    Screen::new(text, Some(round_over_keyboard(game_id)))
}

pub fn scoreboard(game_id: GameId, scores: &[ScoreEntity]) -> Screen {
    let mut text = String::from("Scoreboard:");
    write_scores(&mut text, scores);
    Screen::new(text, Some(round_over_keyboard(game_id)))
}

fn round_over_keyboard(game_id: GameId) -> Keyboard {
    Keyboard::new().row(vec![
        Button::new("Themes", Payload::ShowThemes { game_id }).colored(ButtonColor::Positive),
        Button::new("Scoreboard", Payload::ShowScoreboard { game_id })
            .colored(ButtonColor::Secondary),
        stop_button(game_id),
    ])
}

pub fn stop_confirm(game_id: GameId) -> Screen {
    let keyboard = Keyboard::new().row(vec![
        Button::new("Yes, stop", Payload::ConfirmStopGame { game_id })
            .colored(ButtonColor::Negative),
        Button::new("Keep playing", Payload::CancelStopGame { game_id })
            .colored(ButtonColor::Positive),
    ]);
    Screen::new("Stop the game?", Some(keyboard))
}

pub fn final_scoreboard(reason: FinishReason, scores: &[ScoreEntity]) -> Screen {
    let mut text = String::from(match reason {
        FinishReason::ThemesExhausted => "All questions have been played. Game over!",
        FinishReason::Confirmed | FinishReason::Forced => "The game was stopped.",
    });
    if scores.is_empty() {
        text.push_str("\nNo scores recorded.");
    } else {
        text.push_str("\nFinal scores:");
        write_scores(&mut text, scores);
    }
    Screen::new(text, Some(menu_keyboard()))
}

fn write_scores(text: &mut String, scores: &[ScoreEntity]) {
    for (position, score) in scores.iter().enumerate() {
        let _ = write!(
            text,
            "\n{}. {}: {}",
            position + 1,
            score.user.display_name(),
            score.score
        );
    }
}

fn stop_button(game_id: GameId) -> Button {
    Button::new("Stop", Payload::StopGame { game_id }).colored(ButtonColor::Negative)
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::{AnswerEntity, QuestionEntity};

    fn user(id: i64, name: &str) -> UserSummary {
        UserSummary {
            id,
            first_name: name.into(),
            last_name: String::new(),
        }
    }

    fn round() -> Round {
        Round {
            round_id: Uuid::new_v4(),
            theme_id: 1,
            question: QuestionEntity {
                id: 1,
                theme_id: 1,
                title: "Longest river?".into(),
                answers: vec![
                    AnswerEntity {
                        id: 1,
                        title: "Nile".into(),
                        is_correct: true,
                    },
                    AnswerEntity {
                        id: 2,
                        title: "Volga".into(),
                        is_correct: false,
                    },
                ],
            },
            correct_answer_id: 1,
            price: 200,
            answered: IndexMap::new(),
        }
    }

    #[test]
    fn prices_only_offer_open_slots() {
        let mut slots = PriceSlots::default();
        slots.consume(100);
        let theme = ThemeEntity {
            id: 4,
            title: "Rivers".into(),
        };
        let screen = prices(Uuid::new_v4(), &theme, slots, Some("Ann"));

        let offered: Vec<i64> = screen
            .keyboard
            .unwrap()
            .buttons()
            .filter_map(|button| match button.payload {
                Payload::ChooseQuestion { price, .. } => Some(price),
                _ => None,
            })
            .collect();
        assert_eq!(offered, vec![200, 300, 400, 500]);
        assert!(screen.text.contains("Turn: Ann"));
    }

    #[test]
    fn question_buttons_echo_the_round() {
        let round = round();
        let screen = question(Uuid::new_v4(), &round, Some(Duration::from_secs(7)));

        assert!(screen.text.contains("7 s"));
        assert!(screen.keyboard.unwrap().buttons().all(|button| matches!(
            button.payload,
            Payload::Answer { round_id, .. } if round_id == round.round_id
        )));
    }

    #[test]
    fn reveal_lists_winner_and_wrong_answerers() {
        let mut round = round();
        round.answered.insert(1, 2);
        round.answered.insert(2, 1);
        let (a, b) = (user(1, "A"), user(2, "B"));
        let screen = reveal(
            Uuid::new_v4(),
            &RevealView {
                round: &round,
                winner: Some(&b),
                wrong: vec![&a],
            },
        );

        assert!(screen.text.contains("Correct answer: Nile"));
        assert!(screen.text.contains("+200 to B"));
        assert!(screen.text.contains("-200 to A"));
    }

    #[test]
    fn silent_round_says_nobody_answered() {
        let round = round();
        let screen = reveal(
            Uuid::new_v4(),
            &RevealView {
                round: &round,
                winner: None,
                wrong: Vec::new(),
            },
        );
        assert!(screen.text.contains("Nobody answered."));
    }

    #[test]
    fn lobby_lists_players_in_join_order() {
        let mut roster = Roster::new();
        roster.insert(2, user(2, "Bea"));
        roster.insert(1, user(1, "Al"));
        let screen = lobby(&roster);
        assert!(screen.text.contains("1. Bea\n2. Al"));
    }
}
