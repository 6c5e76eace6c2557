//! Human-readable error descriptions, exit codes and structured JSON errors.

use residuum_core::error::{BuildError, EstimatorError};
use residuum_sources::SourceError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidParam { name, reason } => format!(
                "What happened: Estimator parameter {name} is invalid ({reason}).\nLikely causes: An out-of-range value in the config or a bad runtime override.\nHow to fix: Correct the value and rerun `residuum check-config`."
            ),
            BuildError::InvalidRestoredVolume(v) => format!(
                "What happened: Cannot restore a volume of {v} L.\nLikely causes: Negative or non-numeric --restore-volume.\nHow to fix: Pass the last known volume in litres (>= 0), or omit the flag to anchor on the next totalizer reading."
            ),
        };
    }

    if let Some(ee) = err.downcast_ref::<EstimatorError>() {
        return match ee {
            EstimatorError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then run `residuum check-config`."
            ),
            EstimatorError::Persist(msg) => format!(
                "What happened: The state file could not be used ({msg}).\nLikely causes: Hand-edited or truncated state file, or no write permission.\nHow to fix: Fix or delete the state file; the configured coefficients are used when it is absent."
            ),
            EstimatorError::Source(msg) => format!(
                "What happened: Reading source failed ({msg}).\nLikely causes: A malformed line in the input, or the input stream closed with an error.\nHow to fix: Check the input around the reported line and rerun."
            ),
            EstimatorError::FeedDisconnected => {
                "What happened: The reading feed stopped unexpectedly.\nLikely causes: The reader thread exited.\nHow to fix: Re-run with --log-level=debug for details.".to_string()
            }
        };
    }

    if let Some(se) = err.downcast_ref::<SourceError>() {
        return match se {
            SourceError::Headers { .. } => {
                "Invalid headers in replay CSV. Expected 'timestamp,channel,value'.".to_string()
            }
            SourceError::Timestamp { line, value } => format!(
                "What happened: Line {line} has an unreadable timestamp '{value}'.\nLikely causes: A timestamp format other than ISO-8601.\nHow to fix: Use e.g. 2024-01-01T06:00:00."
            ),
            SourceError::Row { line, reason } => format!(
                "What happened: Line {line} could not be read ({reason}).\nLikely causes: Unknown channel or missing column.\nHow to fix: Channels are temperature, totalizer and vibration."
            ),
            SourceError::Io(e) => format!(
                "What happened: Could not read the input ({e}).\nLikely causes: Wrong path or missing permissions.\nHow to fix: Check the file path and try again."
            ),
            SourceError::Csv(e) => format!(
                "What happened: The CSV is malformed ({e}).\nLikely causes: Wrong delimiter or an unbalanced quote.\nHow to fix: Export the readings as plain comma-separated values."
            ),
        };
    }

    // String-based heuristics for errors from loaders that report via eyre
    let msg = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("vibration csv must have headers") {
        return "Invalid headers in vibration CSV. Expected 'x,y,z,mag'.".to_string();
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path.\nHow to fix: Point --config at an existing TOML file. Original: {msg}"
        );
    }

    // Generic fallback
    format!(
        "Something went wrong.\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable short name of an error, used as the `reason` field in JSON output.
pub fn error_reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidParameter";
    }
    if let Some(ee) = err.downcast_ref::<EstimatorError>() {
        return match ee {
            EstimatorError::Config(_) => "InvalidConfig",
            EstimatorError::Persist(_) => "StateFile",
            EstimatorError::Source(_) => "Source",
            EstimatorError::FeedDisconnected => "FeedDisconnected",
        };
    }
    if err.downcast_ref::<SourceError>().is_some() {
        return "Source";
    }
    "Error"
}

/// 3 = configuration, 4 = input, 5 = state file, 1 = anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match error_reason_name(err) {
        "InvalidParameter" | "InvalidConfig" => 3,
        "Source" | "FeedDisconnected" => 4,
        "StateFile" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": error_reason_name(err), "message": humanize(err) }).to_string()
}
