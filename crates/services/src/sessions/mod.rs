mod exam;
mod practice;
mod progress;
mod timer;

// Public API of the session subsystem.
pub use crate::error::{ExamError, PracticeError};
pub use exam::{AttemptReport, MockExamService, QuestionReview, RunningExam, Submission, SubmitKind};
pub use practice::{
    AnswerFeedback, PRACTICE_QUESTION_LIMIT, PracticeAnswerResult, PracticeLoopService,
    PracticeSession, PracticeStep,
};
pub use progress::SessionProgress;
pub use timer::SessionTimer;
