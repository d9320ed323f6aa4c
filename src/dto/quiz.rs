//! Quiz content as it is written in the JSON content file.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::dto::validation::{validate_answer_flags, validate_not_blank};

/// Root of a quiz content document.
#[derive(Debug, Deserialize, Validate)]
pub struct QuizContentInput {
    #[validate(length(min = 1), nested)]
    pub themes: Vec<ThemeInput>,
}

/// Theme and the questions filed under it.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ThemeInput {
    #[validate(length(min = 1, max = 64))]
    pub title: String,
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// Question text with its answer options.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionInput {
    pub title: String,
    pub answers: Vec<AnswerInput>,
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_not_blank(&self.title) {
            errors.add("title", e);
        }

        let flags: Vec<bool> = self.answers.iter().map(|answer| answer.is_correct).collect();
        if let Err(e) = validate_answer_flags(&flags) {
            errors.add("answers", e);
        }

        if self
            .answers
            .iter()
            .any(|answer| validate_not_blank(&answer.title).is_err())
        {
            let mut err = validator::ValidationError::new("blank");
            err.message = Some("Answer titles must not be blank".into());
            errors.add("answers", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// One answer option.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerInput {
    pub title: String,
    pub is_correct: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn content(answers: serde_json::Value) -> QuizContentInput {
        serde_json::from_value(json!({
            "themes": [{
                "title": "Rivers",
                "questions": [{ "title": "Longest river?", "answers": answers }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn well_formed_content_validates() {
        let input = content(json!([
            { "title": "Nile", "is_correct": true },
            { "title": "Volga", "is_correct": false }
        ]));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn nested_question_errors_surface_at_the_root() {
        let input = content(json!([
            { "title": "Nile", "is_correct": true },
            { "title": "Amazon", "is_correct": true }
        ]));
        assert!(input.validate().is_err());
    }

    #[test]
    fn empty_theme_list_is_rejected() {
        let input: QuizContentInput = serde_json::from_value(json!({ "themes": [] })).unwrap();
        assert!(input.validate().is_err());
    }
}
