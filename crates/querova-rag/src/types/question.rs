//! Question types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

static OPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z])\)\s*(.+)$").expect("valid regex"));

/// Type of question; determines the prompt and the answer shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    OpenEnded,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    /// Detect question type from free text
    ///
    /// Heuristics:
    /// - TrueFalse if the text names a true/false format
    /// - MultipleChoice if it names a multiple choice format or lists `A)` and `B)`
    /// - ShortAnswer for count/date/person lookups
    /// - OpenEnded otherwise
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();

        const TRUE_FALSE: &[&str] = &["true/false", "true or false", "doğru/yanlış", "evet/hayir"];
        if TRUE_FALSE.iter().any(|p| lower.contains(p)) {
            return Self::TrueFalse;
        }

        const MULTIPLE_CHOICE: &[&str] = &["multiple choice", "çoktan seçmeli"];
        if MULTIPLE_CHOICE.iter().any(|p| lower.contains(p))
            || (lower.contains("a)") && lower.contains("b)"))
        {
            return Self::MultipleChoice;
        }

        const SHORT_ANSWER: &[&str] = &[
            "how many", "how much", "what year", "in which year", "who ", "when ",
            "kaç", "ne zaman", "hangi yıl", "kim",
        ];
        if SHORT_ANSWER.iter().any(|p| lower.contains(p)) {
            return Self::ShortAnswer;
        }

        Self::OpenEnded
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenEnded => "open_ended",
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
            Self::ShortAnswer => "short_answer",
        }
    }
}

/// One listed option of a multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

impl QuestionOption {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A question to answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuestionOption>>,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>, question_type: QuestionType) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            question_type,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Vec<QuestionOption>) -> Self {
        self.options = Some(options);
        self
    }

    /// Build a question from raw text, detecting its type and parsing `A) ...` option lines.
    /// A multiple-choice guess without at least two parsable options falls back to open-ended.
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut question_type = QuestionType::detect(&text);
        let mut options = None;

        if question_type == QuestionType::MultipleChoice {
            let parsed = parse_options(&text);
            if parsed.len() >= 2 {
                options = Some(parsed);
            } else {
                question_type = QuestionType::OpenEnded;
            }
        }

        Self {
            id: id.into(),
            text,
            question_type,
            options,
        }
    }

    /// Options are required iff the question is multiple choice
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidQuestion(format!(
                "question '{}' has empty text",
                self.id
            )));
        }

        match (self.question_type, &self.options) {
            (QuestionType::MultipleChoice, None) => Err(Error::InvalidQuestion(format!(
                "multiple choice question '{}' has no options",
                self.id
            ))),
            (QuestionType::MultipleChoice, Some(options)) => {
                if options.len() < 2 {
                    return Err(Error::InvalidQuestion(format!(
                        "multiple choice question '{}' needs at least two options",
                        self.id
                    )));
                }
                let mut seen = HashSet::new();
                for option in options {
                    let key = option.id.trim().to_lowercase();
                    if key.is_empty() || !seen.insert(key) {
                        return Err(Error::InvalidQuestion(format!(
                            "question '{}' has an empty or duplicate option id '{}'",
                            self.id, option.id
                        )));
                    }
                }
                Ok(())
            }
            (_, Some(_)) => Err(Error::InvalidQuestion(format!(
                "question '{}' lists options but is not multiple choice",
                self.id
            ))),
            (_, None) => Ok(()),
        }
    }

    /// Options slice (empty unless multiple choice)
    pub fn options(&self) -> &[QuestionOption] {
        self.options.as_deref().unwrap_or_default()
    }
}

/// Parse `A) option text` lines
pub fn parse_options(text: &str) -> Vec<QuestionOption> {
    text.lines()
        .filter_map(|line| {
            let caps = OPTION_LINE.captures(line.trim())?;
            Some(QuestionOption::new(&caps[1], caps[2].trim()))
        })
        .collect()
}
