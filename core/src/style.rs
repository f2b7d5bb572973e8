use std::collections::BTreeMap;
use std::fmt::Display;

use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::{
    grading::{CaseReport, CaseStatus, Verdict, VerdictKind},
    problem::TestCase,
};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for VerdictKind {
    fn color(&self) -> Color {
        use VerdictKind::*;
        if !self::is_truecolor_supported() {
            return match self {
                Accepted => Color::Green,
                WrongAnswer => Color::Yellow,
                TimeLimitExceeded => Color::Red,
                RuntimeError => Color::Magenta,
                CompileError => Color::Blue,
                InternalError => Color::BrightBlack,
            };
        }

        let (r, g, b) = match self {
            Accepted => (30, 180, 40),
            WrongAnswer => (210, 138, 4),
            TimeLimitExceeded => (220, 42, 42),
            RuntimeError => (171, 40, 200),
            CompileError => (40, 100, 210),
            InternalError => (110, 110, 110),
        };
        Color::TrueColor { r, g, b }
    }
}

impl ColorTheme for CaseStatus {
    fn color(&self) -> Color {
        match self {
            // Shares RE's class but deserves its own shade.
            CaseStatus::MemoryLimitExceeded if is_truecolor_supported() => Color::TrueColor {
                r: 200,
                g: 60,
                b: 140,
            },
            _ => self.verdict_kind().color(),
        }
    }
}

pub fn badge<T: ColorTheme + Display>(code: T) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightBlack
    };
    format!(" {} ", code).on_color(code.color()).bold().color(fg)
}

/// Pads a short code to the width of the longest one (`TLE`, `MLE`).
pub fn pad_code(code: impl Display) -> String {
    " ".repeat(3usize.saturating_sub(code.to_string().len()))
}

pub fn print_verdict_summary(verdict: &Verdict) {
    let bar = "-".repeat(5);
    print!("{} {} ", bar, badge(verdict.kind));

    match verdict.kind {
        VerdictKind::CompileError => print!("{}", "Compilation failed, no testcase was run".bright_red()),
        VerdictKind::InternalError => print!(
            "{}",
            verdict
                .message
                .as_deref()
                .unwrap_or(Verdict::INTERNAL_ERROR_MESSAGE)
                .bright_black()
        ),
        _ => print_case_counts(verdict),
    }

    println!(" {}", bar);
}

fn print_case_counts(verdict: &Verdict) {
    let num_total = verdict.cases.len();
    let num_passed = verdict.num_passed();

    if num_passed == num_total {
        let msg = format!("All {} tests passed ✨", num_total);
        print!("{}", msg.green());
        return;
    }

    let summary_msg = if num_passed > 0 {
        format!("{}/{} tests failed 💣", num_total - num_passed, num_total)
    } else {
        format!("All {} tests failed 💀", num_total)
    };

    let count: BTreeMap<String, (CaseStatus, usize)> =
        verdict
            .cases
            .iter()
            .filter(|c| !c.status.passed())
            .fold(BTreeMap::new(), |mut count, c| {
                count.entry(c.status.to_string()).or_insert((c.status, 0)).1 += 1;
                count
            });
    let detail_msg = count
        .values()
        .map(|&(status, cnt)| {
            format!(
                "{}{}{}",
                badge(status),
                "x".dimmed(),
                cnt.to_string().bold().bright_white(),
            )
        })
        .collect::<Vec<String>>()
        .join(", ");

    print!("{} ({})", summary_msg.bright_red(), detail_msg);
}

const BOLD_LINE: &str = "━";
const THIN_LINE: &str = "─";

fn terminal_cols() -> usize {
    let (cols, _) = terminal::size().unwrap_or((40, 40));
    cols as usize
}

fn print_sub_title(s: &str, cols: usize) {
    println!(
        "{}{}",
        s.cyan().bold(),
        THIN_LINE
            .repeat(cols.saturating_sub(s.len() + 1))
            .bright_black(),
    )
}

fn print_lines(entire_str: &str) {
    let lines: Vec<_> = entire_str.lines().collect();
    if lines.is_empty() {
        println!("{}", "<EMPTY>".magenta().dimmed());
        return;
    }
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_end();
        print!("{}", trimmed);

        let num_trailing_whitespace = line.len() - trimmed.len();
        if num_trailing_whitespace > 0 {
            print!(
                "{}{}",
                " ".repeat(num_trailing_whitespace).on_red(),
                "(Trailing whitespace)".bright_red().bold()
            );
        }

        let is_last_line = i + 1 == lines.len();
        if is_last_line && !entire_str.ends_with('\n') {
            print!("{}", " Missing new line ".on_yellow().black().bold());
        }

        println!();
    }
}

pub fn print_compile_output(diagnostics: &str) {
    let cols = terminal_cols();
    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();
    println!("\n{}", bold_bar);
    print_sub_title("[compiler]", cols);
    print!("{}", diagnostics);
    if !diagnostics.ends_with('\n') {
        println!();
    }
    println!("{}", bold_bar);
}

pub fn print_case_detail(report: &CaseReport, case: &TestCase) {
    let cols = terminal_cols();
    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();

    let time = report
        .execution
        .as_ref()
        .map(|e| format!(" [{}ms]", e.wall_time.as_millis()))
        .unwrap_or_default();
    println!(
        "\n{}: {}{}\n{}",
        report.name.color(Color::BrightYellow).bold(),
        badge(report.status),
        time,
        bold_bar,
    );

    // Internal errors show nothing about the run.
    let Some(exec) = &report.execution else {
        println!("{}", Verdict::INTERNAL_ERROR_MESSAGE.bright_black());
        println!("{}", bold_bar);
        return
    };

    print_sub_title("[input]", cols);
    print_lines(&case.input);

    print_sub_title("[expected]", cols);
    print_lines(&case.expected_output);

    print_sub_title("[stdout]", cols);
    print_lines(&exec.stdout);
    if exec.stdout_truncated {
        println!("{}", "(stdout truncated)".bright_red());
    }
    if exec.output_lost {
        println!("{}", "(stdout was not read to the end)".bright_red());
    }

    if !exec.stderr.is_empty() {
        print_sub_title("[stderr]", cols);
        print!("{}", exec.stderr);
        if exec.stderr_truncated {
            println!("{}", "(stderr truncated)".bright_red());
        }
    }

    match (exec.exit_code, exec.signal) {
        (_, Some(sig)) => println!("{}", format!("Killed by signal {}", sig).bright_red()),
        (Some(code), None) if code != 0 => {
            println!("{}", format!("Exited with code {}", code).bright_red())
        }
        _ => {}
    }

    println!("{}", bold_bar);
}
