//! CSV question import.
//!
//! Expected columns, header row first:
//! `question_text, option_a, option_b, option_c, option_d, correct_answer,
//! explanation, difficulty, exam_type_id`.

use crate::model::{
    Difficulty, ExamTypeId, OptionLabel, QuestionDraft, QuestionOptions, TopicId,
};

/// Why a data row was left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    /// A required column is absent or blank.
    MissingField(&'static str),
    InvalidAnswer(String),
    InvalidDifficulty(String),
    InvalidExamType(String),
    /// The CSV reader could not decode the line.
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the source text, header included.
    pub line: u64,
    pub reason: RowRejection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatch {
    pub drafts: Vec<QuestionDraft>,
    pub skipped: Vec<SkippedRow>,
}

const REQUIRED: [&str; 6] = [
    "question_text",
    "option_a",
    "option_b",
    "option_c",
    "option_d",
    "correct_answer",
];

/// Parse CSV text into question drafts for `topic_id`.
///
/// The first non-blank line is treated as a header and skipped. Blank lines
/// are ignored. Malformed rows are reported in `skipped`, never fatal.
#[must_use]
pub fn parse_questions_csv(text: &str, topic_id: TopicId) -> ImportBatch {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut batch = ImportBatch::default();
    for result in reader.records() {
        match result {
            Ok(record) => {
                let line = record.position().map_or(0, csv::Position::line);
                if record.iter().all(str::is_empty) {
                    continue;
                }
                match parse_row(&record, topic_id) {
                    Ok(draft) => batch.drafts.push(draft),
                    Err(reason) => batch.skipped.push(SkippedRow { line, reason }),
                }
            }
            Err(e) => {
                let line = e.position().map_or(0, csv::Position::line);
                batch.skipped.push(SkippedRow {
                    line,
                    reason: RowRejection::Unreadable(e.to_string()),
                });
            }
        }
    }
    batch
}

fn parse_row(record: &csv::StringRecord, topic_id: TopicId) -> Result<QuestionDraft, RowRejection> {
    let field = |idx: usize| record.get(idx).filter(|v| !v.is_empty());

    let mut required = [""; 6];
    for (idx, name) in REQUIRED.iter().enumerate() {
        required[idx] = field(idx).ok_or(RowRejection::MissingField(*name))?;
    }
    let [prompt, a, b, c, d, correct] = required;

    let correct = correct
        .parse::<OptionLabel>()
        .map_err(|_| RowRejection::InvalidAnswer(correct.to_string()))?;

    let difficulty = match field(7) {
        None => Difficulty::Medium,
        Some(raw) => raw
            .parse::<Difficulty>()
            .map_err(|_| RowRejection::InvalidDifficulty(raw.to_string()))?,
    };

    let exam_type_id = field(8)
        .map(|raw| {
            raw.parse::<ExamTypeId>()
                .map_err(|_| RowRejection::InvalidExamType(raw.to_string()))
        })
        .transpose()?;

    Ok(QuestionDraft {
        topic_id,
        exam_type_id,
        prompt: prompt.to_string(),
        options: QuestionOptions::new(a, b, c, d),
        correct,
        explanation: field(6).map(str::to_string),
        difficulty: Some(difficulty),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "question_text,option_a,option_b,option_c,option_d,correct_answer,explanation,difficulty,exam_type_id";

    #[test]
    fn header_is_skipped_and_defaults_apply() {
        let text = format!("{HEADER}\nWhat is 2+2?,3,4,5,6,b,,,\n");
        let batch = parse_questions_csv(&text, TopicId::new(7));

        assert!(batch.skipped.is_empty());
        assert_eq!(batch.drafts.len(), 1);
        let draft = &batch.drafts[0];
        assert_eq!(draft.topic_id, TopicId::new(7));
        assert_eq!(draft.prompt, "What is 2+2?");
        assert_eq!(draft.correct, OptionLabel::B);
        assert_eq!(draft.difficulty, Some(Difficulty::Medium));
        assert_eq!(draft.explanation, None);
        assert_eq!(draft.exam_type_id, None);
    }

    #[test]
    fn malformed_rows_are_dropped_with_reason() {
        let text = format!(
            "{HEADER}\n\
             Capital of Nigeria?,Lagos,Abuja,Kano,Ibadan,B,Moved in 1991,easy,2\n\
             Missing option,a,b,,d,A,,,\n\
             Bad answer,a,b,c,d,E,,,\n\
             Bad level,a,b,c,d,A,,extreme,\n\
             \n\
             Too short,a,b\n"
        );
        let batch = parse_questions_csv(&text, TopicId::new(1));

        assert_eq!(batch.drafts.len(), 1);
        let ok = &batch.drafts[0];
        assert_eq!(ok.explanation.as_deref(), Some("Moved in 1991"));
        assert_eq!(ok.difficulty, Some(Difficulty::Easy));
        assert_eq!(ok.exam_type_id, Some(ExamTypeId::new(2)));

        let reasons: Vec<_> = batch.skipped.iter().map(|s| s.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                RowRejection::MissingField("option_c"),
                RowRejection::InvalidAnswer("E".into()),
                RowRejection::InvalidDifficulty("extreme".into()),
                RowRejection::MissingField("option_c"),
            ]
        );
        assert_eq!(batch.skipped[0].line, 3);
    }

    #[test]
    fn quoted_fields_may_contain_commas() {
        let text = format!("{HEADER}\n\"Pick one, please\",\"1,000\",b,c,d,a,,hard,\n");
        let batch = parse_questions_csv(&text, TopicId::new(1));
        assert_eq!(batch.drafts.len(), 1);
        assert_eq!(batch.drafts[0].prompt, "Pick one, please");
        assert_eq!(batch.drafts[0].options.a, "1,000");
    }

    #[test]
    fn header_only_yields_nothing() {
        let batch = parse_questions_csv(HEADER, TopicId::new(1));
        assert!(batch.drafts.is_empty());
        assert!(batch.skipped.is_empty());
    }
}
