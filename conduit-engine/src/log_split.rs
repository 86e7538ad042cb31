//! Transcript splitting
//!
//! The backend prefixes every transcript line with a 14-character elapsed time
//! token (`00h00m01s234ms`) followed by two spaces. Every shell step starts
//! with a line naming the workspace in brackets and the generated `.sh` file;
//! those lines split a stage transcript into per-step segments. The segment
//! before the first boundary is the leading segment (checkout output).

use std::sync::LazyLock;

use conduit_core::{ActivityStage, ActivityStep, StageStatus, StepStatus};
use regex::Regex;

static STEP_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n[0-9A-Za-z_]{14}\s{2}\[.*?\].*?\.sh").expect("valid step boundary pattern")
});

static TIME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\n)[0-9A-Za-z_]{14}  ").expect("valid time token pattern"));

const CHECKOUT_MARKER: &str = "  Cloning the remote Git repository\n";
const SUCCESS_MARKER: &str = "  Finished: SUCCESS\n";
const FAILURE_MARKER: &str = "  Finished: FAILURE\n";

/// Split a transcript into the leading segment followed by one segment per
/// observed step
pub fn split_steps(raw: &str) -> Vec<&str> {
    STEP_BOUNDARY.split(raw).collect()
}

/// Update step statuses and timings of `stage` from its transcript
///
/// A finished marker at the end of the transcript sets the stage terminal.
/// Every observed step but the last is Success; the last observed one carries
/// the stage outcome (Building while unfinished); unobserved steps are
/// Waiting. A step already Success or Fail keeps its status unless the
/// transcript reports it terminal too. A lone checkout step is timed from the
/// leading segment instead.
///
/// Returns whether any step changed.
pub fn parse_steps(stage: &mut ActivityStage, raw: &str) -> bool {
    let before = stage.steps.clone();

    let mut last_status = StepStatus::Building;
    if raw.ends_with(SUCCESS_MARKER) {
        stage.status = StageStatus::Success;
        last_status = StepStatus::Success;
    } else if raw.ends_with(FAILURE_MARKER) {
        stage.status = StageStatus::Fail;
        last_status = StepStatus::Fail;
    }

    let segments = split_steps(raw);
    let stage_start = stage.start_ts;

    if segments[0].contains(CHECKOUT_MARKER) {
        if let Some(step) = stage.steps.first_mut() {
            advance(step, last_status);
            parse_step_time(step, segments[0], stage_start);
            stage.duration = step.duration;
        }
        return stage.steps != before;
    }

    let observed = segments.len() - 1;
    for (i, step) in stage.steps.iter_mut().enumerate() {
        if i + 1 < observed {
            advance(step, StepStatus::Success);
        } else if i + 1 == observed {
            advance(step, last_status);
        } else {
            advance(step, StepStatus::Waiting);
            continue;
        }
        parse_step_time(step, segments[i + 1], stage_start);
    }
    stage.duration = stage.steps.iter().map(|step| step.duration).sum();

    stage.steps != before
}

/// Terminal steps only move to another terminal status
fn advance(step: &mut ActivityStep, status: StepStatus) {
    if step.status.is_terminal() && !status.is_terminal() {
        return;
    }
    step.status = status;
}

/// Derive a step's start and, once terminal, its duration from the first
/// and last time tokens of its segment
fn parse_step_time(step: &mut ActivityStep, segment: &str, stage_start: i64) {
    let tokens: Vec<&str> = TIME_TOKEN
        .find_iter(segment)
        .map(|m| m.as_str().trim())
        .collect();
    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return;
    };

    let Some(start) = parse_elapsed(first) else {
        tracing::error!("Unparseable time token in transcript of step {}: {}", step.name, first);
        return;
    };
    step.start_ts = stage_start + start;

    if !step.status.is_terminal() {
        return;
    }
    let Some(end) = parse_elapsed(last) else {
        tracing::error!("Unparseable time token in transcript of step {}: {}", step.name, last);
        return;
    };
    step.duration = end - start;
}

/// Parse an elapsed time token such as `00h01m02s003ms` into milliseconds
///
/// Accepts a sequence of decimal numbers, each followed by one of the units
/// `h`, `m`, `s`, `ms`, `us`, `µs` or `ns`.
pub fn parse_elapsed(token: &str) -> Option<i64> {
    let mut rest = token;
    let mut nanos = 0f64;
    if rest.is_empty() {
        return None;
    }

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "h" => 3_600e9,
            "m" => 60e9,
            "s" => 1e9,
            "ms" => 1e6,
            "us" | "µs" => 1e3,
            "ns" => 1.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        nanos += value * scale;
    }

    Some((nanos / 1e6) as i64)
}

/// Transcript segment of one step, empty when it has not been reached
///
/// The first step of the first stage is the checkout and reads the leading
/// segment.
pub fn step_segment(raw: &str, stage: usize, step: usize) -> &str {
    let segments = split_steps(raw);
    if stage == 0 && step == 0 {
        return segments[0];
    }
    segments.get(step + 1).copied().unwrap_or_default()
}
