// src/grading.rs

//! Scores an answer sheet against a quiz's answer key.

use std::collections::HashSet;
use std::str::FromStr;

use crate::{error::AppError, models::quiz::QuizCore};

/// Supported marking schemes, parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingType {
    /// Ungraded; the score is NaN.
    None,
    /// Fractional credit with a penalty for each wrong selection.
    Negative,
    /// One point for an exact match, nothing otherwise.
    Binary,
}

impl FromStr for MarkingType {
    type Err = GradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            Ok(MarkingType::None)
        } else if s.eq_ignore_ascii_case("negative") {
            Ok(MarkingType::Negative)
        } else if s.eq_ignore_ascii_case("binary") {
            Ok(MarkingType::Binary)
        } else {
            Err(GradingError::InvalidMarkingType(s.to_string()))
        }
    }
}

/// Client-input errors raised while grading. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GradingError {
    #[error("invalid marking type '{0}'")]
    InvalidMarkingType(String),

    #[error("question {question} has a single answer but {selected} options were selected")]
    MultipleSelections { question: usize, selected: usize },

    #[error("question {question} has no option {option}")]
    OptionOutOfRange { question: usize, option: usize },

    #[error("question {question} selects option {option} more than once")]
    DuplicateSelection { question: usize, option: usize },

    #[error("{given} answers submitted for a quiz with {expected} questions")]
    TooManyAnswers { given: usize, expected: usize },
}

impl From<GradingError> for AppError {
    fn from(err: GradingError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// A question's answer key paired with what was selected for it.
struct Marked<'a> {
    key: HashSet<usize>,
    total_options: usize,
    selected: &'a [usize],
}

/// Scores `responses` against `quiz` using the quiz's marking type.
///
/// `none` yields NaN without an error once the sheet is well-formed.
/// Callers should treat that as an ungraded submission rather than a zero.
pub fn grade(responses: &[Vec<usize>], quiz: &QuizCore) -> Result<f64, GradingError> {
    match quiz.marking_type.parse::<MarkingType>()? {
        MarkingType::None => mark_sheet(responses, quiz).map(|_| f64::NAN),
        MarkingType::Negative => negative_marking(responses, quiz),
        MarkingType::Binary => binary_marking(responses, quiz),
    }
}

/// +1/|key| per correct selection, -1/max(options - |key|, 1) per wrong one.
pub fn negative_marking(responses: &[Vec<usize>], quiz: &QuizCore) -> Result<f64, GradingError> {
    Ok(mark_sheet(responses, quiz)?
        .iter()
        .map(fractional_score)
        .sum())
}

/// Same credit as negative marking, but no question can contribute less than zero.
pub fn non_negative_marking(
    responses: &[Vec<usize>],
    quiz: &QuizCore,
) -> Result<f64, GradingError> {
    Ok(mark_sheet(responses, quiz)?
        .iter()
        .map(|marked| fractional_score(marked).max(0.0))
        .sum())
}

/// All-or-nothing: a question scores 1 only if the selection equals the key.
pub fn binary_marking(responses: &[Vec<usize>], quiz: &QuizCore) -> Result<f64, GradingError> {
    let points = mark_sheet(responses, quiz)?
        .iter()
        .filter(|marked| {
            marked.selected.len() == marked.key.len()
                && marked.selected.iter().all(|s| marked.key.contains(s))
        })
        .count();
    Ok(points as f64)
}

fn fractional_score(marked: &Marked<'_>) -> f64 {
    let correct_weight = marked.key.len() as f64;
    let incorrect_weight = marked.total_options.saturating_sub(marked.key.len()).max(1) as f64;

    marked
        .selected
        .iter()
        .map(|option| {
            if marked.key.contains(option) {
                1.0 / correct_weight
            } else {
                -1.0 / incorrect_weight
            }
        })
        .sum()
}

/// Builds the answer key for every question and checks the sheet against it.
/// Questions without a row in the sheet count as unanswered.
fn mark_sheet<'a>(
    responses: &'a [Vec<usize>],
    quiz: &QuizCore,
) -> Result<Vec<Marked<'a>>, GradingError> {
    if responses.len() > quiz.questions.len() {
        return Err(GradingError::TooManyAnswers {
            given: responses.len(),
            expected: quiz.questions.len(),
        });
    }

    let mut sheet = Vec::with_capacity(quiz.questions.len());
    for (i, question) in quiz.questions.iter().enumerate() {
        let number = i + 1;
        let selected = responses.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let key: HashSet<usize> = question.answers.iter().copied().collect();

        if key.len() == 1 && selected.len() > 1 {
            return Err(GradingError::MultipleSelections {
                question: number,
                selected: selected.len(),
            });
        }

        let mut seen = HashSet::with_capacity(selected.len());
        for &option in selected {
            if option >= question.options.len() {
                return Err(GradingError::OptionOutOfRange {
                    question: number,
                    option,
                });
            }
            if !seen.insert(option) {
                return Err(GradingError::DuplicateSelection {
                    question: number,
                    option,
                });
            }
        }

        sheet.push(Marked {
            key,
            total_options: question.options.len(),
            selected,
        });
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::Question;

    fn question(options: &[&str], answers: &[usize]) -> Question {
        Question {
            description: "Which apply?".to_string(),
            asset: None,
            options: options.iter().map(|o| o.to_string()).collect(),
            answers: answers.to_vec(),
        }
    }

    fn quiz(marking_type: &str) -> QuizCore {
        QuizCore {
            title: "Sample".to_string(),
            marking_type: marking_type.to_string(),
            questions: vec![
                question(&["A", "B", "C", "D"], &[0, 1, 3]),
                question(&["Yes", "No"], &[1]),
            ],
        }
    }

    #[test]
    fn negative_marking_worked_example() {
        let score = grade(&[vec![0, 1], vec![1]], &quiz("negative")).unwrap();
        assert!((score - (2.0 / 3.0 + 1.0)).abs() < 1e-9);
    }

    #[test]
    fn negative_marking_full_key_scores_question_count() {
        let score = grade(&[vec![0, 1, 3], vec![1]], &quiz("negative")).unwrap();
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn negative_marking_only_wrong_options_is_not_positive() {
        let score = grade(&[vec![2], vec![0]], &quiz("Negative")).unwrap();
        assert!(score <= 0.0);
        assert!((score - -2.0).abs() < 1e-9);
    }

    #[test]
    fn negative_marking_all_options_correct_avoids_division_by_zero() {
        let core = QuizCore {
            title: "All true".to_string(),
            marking_type: "negative".to_string(),
            questions: vec![question(&["A", "B"], &[0, 1])],
        };
        let score = grade(&[vec![0, 1]], &core).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn non_negative_marking_clamps_each_question() {
        let score = non_negative_marking(&[vec![2], vec![0]], &quiz("negative")).unwrap();
        assert_eq!(score, 0.0);

        let score = non_negative_marking(&[vec![0, 2], vec![1]], &quiz("negative")).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn binary_marking_counts_exact_matches() {
        let core = quiz("BINARY");
        assert_eq!(grade(&[vec![3, 0, 1], vec![1]], &core).unwrap(), 2.0);
        assert_eq!(grade(&[vec![0, 1], vec![1]], &core).unwrap(), 1.0);
        assert_eq!(grade(&[vec![], vec![]], &core).unwrap(), 0.0);
        assert_eq!(grade(&[], &core).unwrap(), 0.0);
    }

    #[test]
    fn single_answer_question_rejects_multiple_selections() {
        for marking in ["negative", "binary", "none"] {
            let err = grade(&[vec![0], vec![0, 1]], &quiz(marking)).err();
            assert_eq!(
                err,
                Some(GradingError::MultipleSelections {
                    question: 2,
                    selected: 2
                })
            );
        }
    }

    #[test]
    fn none_marking_is_nan() {
        let score = grade(&[vec![0], vec![1]], &quiz("None")).unwrap();
        assert!(score.is_nan());
    }

    #[test]
    fn unknown_marking_type_is_rejected() {
        let err = grade(&[vec![0]], &quiz("percentage")).unwrap_err();
        assert_eq!(err, GradingError::InvalidMarkingType("percentage".to_string()));
        assert!(matches!(AppError::from(err), AppError::InvalidInput(_)));
    }

    #[test]
    fn malformed_sheets_are_rejected() {
        let core = quiz("negative");
        assert!(matches!(
            grade(&[vec![7], vec![1]], &core),
            Err(GradingError::OptionOutOfRange { question: 1, option: 7 })
        ));
        assert!(matches!(
            grade(&[vec![0, 0], vec![1]], &core),
            Err(GradingError::DuplicateSelection { question: 1, option: 0 })
        ));
        assert!(matches!(
            grade(&[vec![0], vec![1], vec![0]], &core),
            Err(GradingError::TooManyAnswers { given: 3, expected: 2 })
        ));
    }
}
