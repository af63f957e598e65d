//! Local telemetry outputs: one stdout line per cycle plus an optional CSV log.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use eyre::WrapErr;
use polar_core::CycleState;
use polar_traits::BoxError;
use serde_json::{Value, json};

const CSV_HEADER: [&str; 6] = [
    "seq",
    "uptime_ms",
    "temperature_c",
    "volume_ml",
    "needs_cooling",
    "time_to_target",
];

pub struct CycleOutput {
    json: bool,
    csv: Option<csv::Writer<std::fs::File>>,
}

impl CycleOutput {
    /// Open the outputs. An existing CSV file is appended to without a
    /// second header row.
    pub fn open(json: bool, csv_path: Option<&Path>) -> eyre::Result<Self> {
        let csv = match csv_path {
            Some(path) => {
                let fresh = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .wrap_err_with(|| format!("open telemetry csv {}", path.display()))?;
                let mut w = csv::WriterBuilder::new()
                    .has_headers(false)
                    .from_writer(file);
                if fresh {
                    w.write_record(CSV_HEADER).wrap_err("write csv header")?;
                    w.flush().wrap_err("flush csv header")?;
                }
                Some(w)
            }
            None => None,
        };
        Ok(Self { json, csv })
    }

    pub fn publish(&mut self, s: &CycleState) -> Result<(), BoxError> {
        let line = if self.json {
            json_line(s).to_string()
        } else {
            human_line(s)
        };
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;

        if let Some(w) = self.csv.as_mut() {
            w.write_record([
                s.seq.to_string(),
                s.uptime_ms.to_string(),
                format!("{:.2}", s.temperature_c),
                format!("{:.1}", s.volume),
                s.needs_cooling.to_string(),
                format!("{:.2}", s.time_to_target),
            ])?;
            w.flush()?;
        }
        Ok(())
    }
}

/// JSON object for one cycle; an infinite estimate is reported as `null`.
pub fn json_line(s: &CycleState) -> Value {
    let ttt = if s.time_to_target.is_finite() {
        json!(s.time_to_target)
    } else {
        Value::Null
    };
    json!({
        "seq": s.seq,
        "uptime_ms": s.uptime_ms,
        "temperature_c": s.temperature_c,
        "volume_ml": s.volume,
        "needs_cooling": s.needs_cooling,
        "time_to_target": ttt,
    })
}

pub fn human_line(s: &CycleState) -> String {
    format!(
        "cycle {}: {:.2} °C, {:.1} ml, cooling {}, time to target {:.1}",
        s.seq,
        s.temperature_c,
        s.volume,
        if s.needs_cooling { "on" } else { "off" },
        s.time_to_target,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(ttt: f32) -> CycleState {
        CycleState {
            seq: 3,
            uptime_ms: 15_000,
            temperature_c: 30.0,
            volume: 350.0,
            needs_cooling: true,
            time_to_target: ttt,
        }
    }

    #[test]
    fn json_line_has_stable_keys() {
        let v = json_line(&state(10.0));
        assert_eq!(v["seq"], 3);
        assert_eq!(v["needs_cooling"], true);
        assert_eq!(v["time_to_target"], 10.0);
    }

    #[test]
    fn infinite_estimate_is_null() {
        assert!(json_line(&state(f32::INFINITY))["time_to_target"].is_null());
    }

    #[test]
    fn csv_log_gets_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycles.csv");
        {
            let mut out = CycleOutput::open(true, Some(&path)).unwrap();
            out.publish(&state(1.0)).unwrap();
        }
        {
            let mut out = CycleOutput::open(true, Some(&path)).unwrap();
            out.publish(&state(2.0)).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("seq,")).count(), 1);
        assert_eq!(text.lines().count(), 3);
    }
}
