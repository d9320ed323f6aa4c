//! Loading quiz content from its JSON document.

use std::{io, path::Path};

use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{AnswerEntity, QuestionEntity, ThemeEntity},
    dto::quiz::QuizContentInput,
};

/// Failures while reading quiz content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read quiz content from {path}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse quiz content from {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("quiz content is invalid: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Validated content with identifiers assigned in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizContent {
    pub themes: Vec<ThemeEntity>,
    pub questions: Vec<QuestionEntity>,
}

impl TryFrom<QuizContentInput> for QuizContent {
    type Error = ContentError;

    fn try_from(input: QuizContentInput) -> Result<Self, Self::Error> {
        input.validate()?;

        let mut content = QuizContent::default();
        let mut next_question = 1;
        let mut next_answer = 1;

        for (theme_index, theme) in input.themes.into_iter().enumerate() {
            let theme_id = theme_index as u32 + 1;
            content.themes.push(ThemeEntity {
                id: theme_id,
                title: theme.title,
            });

            for question in theme.questions {
                let answers = question
                    .answers
                    .into_iter()
                    .map(|answer| {
                        let entity = AnswerEntity {
                            id: next_answer,
                            title: answer.title,
                            is_correct: answer.is_correct,
                        };
                        next_answer += 1;
                        entity
                    })
                    .collect();

                content.questions.push(QuestionEntity {
                    id: next_question,
                    theme_id,
                    title: question.title,
                    answers,
                });
                next_question += 1;
            }
        }

        Ok(content)
    }
}

/// Read, parse and validate the quiz content file at `path`.
pub fn load_content(path: impl AsRef<Path>) -> Result<QuizContent, ContentError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ContentError::Read {
        path: display.clone(),
        source,
    })?;
    let input: QuizContentInput =
        serde_json::from_str(&raw).map_err(|source| ContentError::Parse {
            path: display,
            source,
        })?;
    QuizContent::try_from(input)
}
