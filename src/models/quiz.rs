// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::grading::MarkingType;

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_answers"))]
pub struct Question {
    #[validate(length(min = 1, max = 1000))]
    pub description: String,

    /// Optional link to an image or other media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub asset: Option<String>,

    #[validate(length(min = 2, max = 5))]
    pub options: Vec<String>,

    /// Indices into `options` that are correct.
    #[validate(length(min = 1, max = 5))]
    pub answers: Vec<usize>,
}

/// Every answer must point at an existing option, at most once.
fn validate_answers(question: &Question) -> Result<(), ValidationError> {
    if question.answers.len() > question.options.len() {
        return Err(ValidationError::new("more_answers_than_options"));
    }
    for (i, answer) in question.answers.iter().enumerate() {
        if *answer >= question.options.len() {
            return Err(ValidationError::new("answer_out_of_range"));
        }
        if question.answers[..i].contains(answer) {
            return Err(ValidationError::new("duplicate_answer"));
        }
    }
    Ok(())
}

fn validate_marking_type(marking_type: &str) -> Result<(), ValidationError> {
    marking_type
        .parse::<MarkingType>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("unknown_marking_type"))
}

/// The author-editable part of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizCore {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// One of `none`, `negative` or `binary`, case-insensitive.
    #[validate(custom(function = validate_marking_type))]
    pub marking_type: String,

    #[validate(length(min = 1, max = 10), nested)]
    pub questions: Vec<Question>,
}

/// Represents the 'quizzes' table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub quiz_id: String,
    pub author: String,
    #[serde(flatten)]
    pub core: QuizCore,
    pub is_published: bool,
    pub is_deleted: bool,
}

impl Quiz {
    /// Builds a fresh, unpublished quiz with a time-ordered ID.
    pub fn new(author: &str, core: QuizCore) -> Self {
        Self {
            quiz_id: Uuid::now_v7().to_string(),
            author: author.to_owned(),
            core,
            is_published: false,
            is_deleted: false,
        }
    }

    /// Only published, live quizzes may be served from the cache.
    pub fn is_cacheable(&self) -> bool {
        self.is_published && !self.is_deleted
    }
}

/// DTO for sending a question to a non-author (excludes answers).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub options: Vec<String>,
    /// Tells the client whether to render a single-select control.
    pub multiple_answers: bool,
}

/// DTO for sending a quiz to a non-author.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub quiz_id: String,
    pub author: String,
    pub title: String,
    pub marking_type: String,
    pub questions: Vec<PublicQuestion>,
}

impl From<Quiz> for PublicQuiz {
    fn from(quiz: Quiz) -> Self {
        Self {
            quiz_id: quiz.quiz_id,
            author: quiz.author,
            title: quiz.core.title,
            marking_type: quiz.core.marking_type,
            questions: quiz
                .core
                .questions
                .into_iter()
                .map(|q| PublicQuestion {
                    multiple_answers: q.answers.len() > 1,
                    description: q.description,
                    asset: q.asset,
                    options: q.options,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(options: usize, answers: Vec<usize>) -> Question {
        Question {
            description: "Pick one".to_string(),
            asset: None,
            options: (0..options).map(|i| format!("option {i}")).collect(),
            answers,
        }
    }

    #[test]
    fn rejects_answer_outside_options() {
        assert!(question(3, vec![0, 1]).validate().is_ok());
        assert!(question(3, vec![3]).validate().is_err());
        assert!(question(2, vec![1, 1]).validate().is_err());
    }

    #[test]
    fn marking_type_is_case_insensitive() {
        let mut core = QuizCore {
            title: "Rust basics".to_string(),
            marking_type: "NeGaTiVe".to_string(),
            questions: vec![question(4, vec![0])],
        };
        assert!(core.validate().is_ok());

        core.marking_type = "percentage".to_string();
        assert!(core.validate().is_err());
    }

    #[test]
    fn question_count_is_bounded() {
        let core = QuizCore {
            title: "Empty".to_string(),
            marking_type: "binary".to_string(),
            questions: vec![],
        };
        assert!(core.validate().is_err());
    }

    #[test]
    fn public_view_hides_answers() {
        let quiz = Quiz::new(
            "alice",
            QuizCore {
                title: "Hidden".to_string(),
                marking_type: "binary".to_string(),
                questions: vec![question(4, vec![0, 2])],
            },
        );
        let view = serde_json::to_value(PublicQuiz::from(quiz)).unwrap();
        assert!(view["questions"][0].get("answers").is_none());
        assert_eq!(view["questions"][0]["multipleAnswers"], true);
    }
}
