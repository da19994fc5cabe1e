use std::fmt;

use chrono::{DateTime, Utc};
use prep_core::model::{
    Achievement, AchievementId, ConditionType, Difficulty, ExamType, ExamTypeId, MockExam,
    MockExamId, OptionLabel, QuestionDraft, QuestionOptions, Subject, SubjectId, Topic, TopicId,
    Track, TrackColor, TrackId, ValidatedQuestion,
};
use storage::repository::{NewAchievementRecord, NewMockExamRecord, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    mock_minutes: u32,
    with_achievements: bool,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidMinutes { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidMinutes { raw } => write!(f, "invalid --mock-minutes value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("PREP_DB_URL").unwrap_or_else(|_| "sqlite://prep.sqlite3".into());
        let mut mock_minutes = std::env::var("PREP_SEED_MOCK_MINUTES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(30);
        let mut with_achievements = true;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--mock-minutes" => {
                    let value = require_value(&mut args, "--mock-minutes")?;
                    mock_minutes = value
                        .parse::<u32>()
                        .ok()
                        .filter(|m| *m > 0)
                        .ok_or_else(|| ArgsError::InvalidMinutes { raw: value.clone() })?;
                }
                "--no-achievements" => with_achievements = false,
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            mock_minutes,
            with_achievements,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://prep.sqlite3)");
    eprintln!("  --mock-minutes <n>        Duration of the sample mock exam (default: 30)");
    eprintln!("  --no-achievements         Skip the starter achievement catalog");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  PREP_DB_URL, PREP_SEED_MOCK_MINUTES");
}

type Row<'a> = (&'a str, [&'a str; 4], OptionLabel, &'a str, Difficulty);

const ALGEBRA: &[Row<'static>] = &[
    ("Solve for x: 2x + 3 = 11", ["3", "4", "5", "7"], OptionLabel::B, "2x = 8, so x = 4.", Difficulty::Easy),
    ("Expand (x + 2)(x - 2)", ["x² - 4", "x² + 4", "x² - 4x + 4", "2x - 4"], OptionLabel::A, "Difference of two squares.", Difficulty::Easy),
    ("If 3^x = 81, what is x?", ["3", "4", "27", "9"], OptionLabel::B, "81 = 3^4.", Difficulty::Medium),
    ("Roots of x² - 5x + 6 = 0", ["1 and 6", "-2 and -3", "2 and 3", "5 and 6"], OptionLabel::C, "(x - 2)(x - 3) = 0.", Difficulty::Medium),
];

const GRAMMAR: &[Row<'static>] = &[
    ("Choose the correct form: She ___ to school every day.", ["go", "goes", "going", "gone"], OptionLabel::B, "Third person singular takes -es.", Difficulty::Easy),
    ("The opposite of 'scarce' is", ["rare", "plentiful", "small", "hidden"], OptionLabel::B, "Scarce means in short supply.", Difficulty::Easy),
    ("Pick the correctly spelt word", ["accomodate", "acommodate", "accommodate", "acomodate"], OptionLabel::C, "Double c, double m.", Difficulty::Medium),
];

const MECHANICS: &[Row<'static>] = &[
    ("The SI unit of force is the", ["joule", "watt", "newton", "pascal"], OptionLabel::C, "1 N = 1 kg·m/s².", Difficulty::Easy),
    ("A body moving at constant velocity has", ["zero acceleration", "increasing speed", "zero mass", "no inertia"], OptionLabel::A, "Velocity does not change.", Difficulty::Easy),
    ("Which quantity is a vector?", ["mass", "speed", "displacement", "time"], OptionLabel::C, "Displacement has direction.", Difficulty::Medium),
];

fn drafts(topic: TopicId, exam_type: ExamTypeId, rows: &[Row<'_>]) -> Vec<QuestionDraft> {
    rows.iter()
        .map(|(prompt, [a, b, c, d], correct, explanation, difficulty)| QuestionDraft {
            topic_id: topic,
            exam_type_id: Some(exam_type),
            prompt: (*prompt).to_string(),
            options: QuestionOptions::new(*a, *b, *c, *d),
            correct: *correct,
            explanation: Some((*explanation).to_string()),
            difficulty: Some(*difficulty),
        })
        .collect()
}

struct SeedCatalog {
    exam_types: Vec<ExamType>,
    tracks: Vec<Track>,
    subjects: Vec<Subject>,
    topics: Vec<Topic>,
    questions: Vec<ValidatedQuestion>,
}

impl SeedCatalog {
    fn build(now: DateTime<Utc>) -> Result<Self, prep_core::Error> {
        let waec = ExamTypeId::new(1);
        let exam_types = vec![
            ExamType::new(waec, "WAEC", "West African Senior School Certificate Examination")?,
            ExamType::new(ExamTypeId::new(2), "JAMB", "Unified Tertiary Matriculation Examination")?,
            ExamType::new(ExamTypeId::new(3), "NECO", "National Examinations Council")?,
        ];

        let science = TrackId::new(1);
        let tracks = vec![
            Track::new(science, "Science", TrackColor::Blue)?,
            Track::new(TrackId::new(2), "Art", TrackColor::Purple)?,
            Track::new(TrackId::new(3), "Commercial", TrackColor::Green)?,
        ];

        let subjects = vec![
            Subject::new(SubjectId::new(1), "English Language", None, true)?,
            Subject::new(SubjectId::new(2), "Mathematics", None, true)?,
            Subject::new(SubjectId::new(3), "Physics", Some(science), false)?,
            Subject::new(SubjectId::new(4), "Literature in English", Some(TrackId::new(2)), false)?,
            Subject::new(SubjectId::new(5), "Economics", Some(TrackId::new(3)), false)?,
        ];

        let grammar = TopicId::new(1);
        let algebra = TopicId::new(2);
        let mechanics = TopicId::new(3);
        let topics = vec![
            Topic::new(grammar, SubjectId::new(1), "Grammar and Usage", None)?,
            Topic::new(algebra, SubjectId::new(2), "Algebra", Some("Equations and expressions".into()))?,
            Topic::new(mechanics, SubjectId::new(3), "Mechanics", None)?,
        ];

        let mut questions = Vec::new();
        for draft in drafts(grammar, waec, GRAMMAR)
            .into_iter()
            .chain(drafts(algebra, waec, ALGEBRA))
            .chain(drafts(mechanics, waec, MECHANICS))
        {
            questions.push(draft.validate(now)?);
        }

        Ok(Self {
            exam_types,
            tracks,
            subjects,
            topics,
            questions,
        })
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let catalog = SeedCatalog::build(now)?;
    for exam_type in &catalog.exam_types {
        storage.catalog.upsert_exam_type(exam_type).await?;
    }
    for track in &catalog.tracks {
        storage.catalog.upsert_track(track).await?;
    }
    for subject in &catalog.subjects {
        storage.catalog.upsert_subject(subject).await?;
    }
    for topic in &catalog.topics {
        storage.catalog.upsert_topic(topic).await?;
    }
    let waec = ExamTypeId::new(1);
    let validated = catalog.questions;
    let question_ids = storage.questions.insert_questions(&validated).await?;

    let exam_questions: Vec<_> = question_ids.iter().copied().take(10).collect();
    let total = u32::try_from(exam_questions.len())?;
    let draft = MockExam::new(
        MockExamId::new(1),
        "WAEC General Paper 1",
        Some(waec),
        args.mock_minutes,
        total,
        now,
    )?;
    let exam_id = storage
        .mock_exams
        .insert_mock_exam(NewMockExamRecord::from_exam(&draft))
        .await?;
    storage
        .mock_exams
        .set_exam_questions(exam_id, &exam_questions)
        .await?;

    let mut achievements = 0;
    if args.with_achievements && storage.achievements.list_achievements().await?.is_empty() {
        let starter = [
            ("First Steps", "Answer your first question correctly", ConditionType::Questions, 1),
            ("Half Century", "Answer 50 questions correctly", ConditionType::Questions, 50),
            ("Centurion", "Answer 100 questions correctly", ConditionType::Questions, 100),
            ("On a Roll", "Practice 3 days in a row", ConditionType::Streak, 3),
            ("Week Warrior", "Practice 7 days in a row", ConditionType::Streak, 7),
            ("Sharp Shooter", "Reach 80% accuracy", ConditionType::Accuracy, 80),
        ];
        for (name, description, condition, threshold) in starter {
            let rule = Achievement::new(AchievementId::new(1), name, description, condition, threshold)?;
            storage
                .achievements
                .insert_achievement(NewAchievementRecord::from_achievement(&rule))
                .await?;
            achievements += 1;
        }
    }

    println!(
        "Seeded {} questions, mock exam {} and {} achievements into {}",
        question_ids.len(),
        exam_id.value(),
        achievements,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
