use std::error::Error;

use prep_core::model::{MockExamId, OptionLabel, Question, TopicId};
use services::sessions::{PracticeStep, Submission, SubmitKind};
use services::{MockExamService, PracticeLoopService, SyncStatus};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

type Input = Lines<BufReader<Stdin>>;

fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

fn print_question(index: usize, total: usize, question: &Question) {
    println!();
    println!("Question {} of {}", index + 1, total);
    println!("{}", question.prompt);
    for (label, text) in question.options.iter() {
        println!("  {label}. {text}");
    }
}

fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

//
// ─── PRACTICE ──────────────────────────────────────────────────────────────────
//

/// Interactive practice round: answer with A-D, `q` to stop early.
pub async fn practice(service: &PracticeLoopService, topic: TopicId) -> Result<(), Box<dyn Error>> {
    let mut session = service.start(topic).await?;
    println!("Practicing {}", session.topic().name);
    if let Some(streak) = session.streak() {
        println!("Current streak: {} day(s)", streak.record.current_streak());
    }
    if let SyncStatus::Failed { reason } = session.streak_sync() {
        println!("(streak not saved: {reason})");
    }

    let mut input = stdin_lines();
    let total = session.questions().len();
    loop {
        let Some(question) = session.current_question() else {
            break;
        };
        print_question(session.current_index(), total, question);

        let Some(line) = input.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            break;
        }
        let Ok(label) = line.parse::<OptionLabel>() else {
            println!("Answer with A, B, C or D (q to quit).");
            continue;
        };

        let result = service.answer(&mut session, label).await?;
        if result.feedback.is_correct {
            println!("Correct!");
        } else {
            println!("Wrong. The answer is {}.", result.feedback.correct);
        }
        if let Some(explanation) = &result.feedback.explanation {
            println!("{explanation}");
        }
        if result.progress_sync.is_failed() {
            println!("(progress not saved)");
        }
        for achievement in &result.unlocked {
            println!("Achievement unlocked: {}", achievement.name);
        }

        if let PracticeStep::Finished(_) = session.advance() {
            break;
        }
    }

    let score = session.score();
    println!();
    println!("Round over: {}/{} correct", score.correct, score.total);
    Ok(())
}

//
// ─── MOCK EXAM ─────────────────────────────────────────────────────────────────
//

/// Interactive timed exam. Commands: A-D, `n`, `p`, `go <number>`, `submit`.
pub async fn exam(service: &MockExamService, id: MockExamId) -> Result<(), Box<dyn Error>> {
    let mut running = service.start(id).await?;
    let total = running.questions().len();
    println!(
        "{}: {} questions, {} minutes",
        running.exam().name,
        total,
        running.exam().duration_minutes
    );

    let mut remaining = running.watch_remaining();
    let mut input = stdin_lines();
    let mut show = true;

    let submission = loop {
        if show {
            if let Some(question) = running.current() {
                print_question(running.current_index(), total, question);
                println!("[{} left]", format_clock(running.remaining_secs()));
            }
        }
        show = true;

        tokio::select! {
            changed = remaining.changed() => {
                show = false;
                if changed.is_err() || *remaining.borrow_and_update() == 0 {
                    println!();
                    println!("Time is up.");
                    match service.wait_for_expiry(&mut running).await? {
                        Some(submission) => break submission,
                        None => break service.submit(&mut running, SubmitKind::Automatic).await?,
                    }
                }
            }
            line = input.next_line() => {
                let Some(line) = line? else {
                    break service.submit(&mut running, SubmitKind::Manual).await?;
                };
                let line = line.trim();
                match line.to_ascii_lowercase().as_str() {
                    "submit" => break service.submit(&mut running, SubmitKind::Manual).await?,
                    "n" => {
                        running.next();
                    }
                    "p" => {
                        running.previous();
                    }
                    other => {
                        if let Some(number) = other.strip_prefix("go ") {
                            let target = number.trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1));
                            if !matches!(target.map(|index| running.go_to(index)), Some(Ok(_))) {
                                show = false;
                                println!("No such question.");
                            }
                        } else if let Ok(label) = line.parse::<OptionLabel>() {
                            if let Some(question_id) = running.current().map(|q| q.id) {
                                running.select(question_id, label)?;
                                println!("Selected {label}.");
                                running.next();
                            }
                        } else {
                            show = false;
                            println!("A-D to answer, n/p to move, go <number>, submit to finish.");
                        }
                    }
                }
            }
        }
    };

    print_report(&submission);
    Ok(())
}

fn print_report(submission: &Submission) {
    let report = &submission.report;
    println!();
    if submission.kind == SubmitKind::Automatic {
        println!("Submitted automatically when time ran out.");
    }
    println!(
        "Score: {}/{} ({}%) in {}",
        report.score,
        report.total,
        report.percent,
        format_clock(report.elapsed_secs)
    );
    for (index, item) in report.review.iter().enumerate() {
        let selected = item
            .selected
            .map_or_else(|| "-".to_string(), |label| label.to_string());
        let mark = if item.is_correct { "ok" } else { "x" };
        println!(
            "  {:>3}. [{mark}] chose {selected}, answer {}",
            index + 1,
            item.question.correct
        );
    }
    if report.review.iter().any(|item| item.selected.is_none()) {
        warn!(attempt_id = report.attempt_id.value(), "exam submitted with unanswered questions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_minutes_and_seconds() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(1_800), "30:00");
        assert_eq!(format_clock(3_725), "62:05");
    }
}
