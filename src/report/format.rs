//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the evaluation code stays clean and testable
//! - output changes are localized (snapshot tests below)

use crate::domain::{BatchEntry, EBiasShift, OffsetWindowKind, ResultsFile, TraceStats};

/// Format the run summary: trace stats, settings, corrections and metrics.
pub fn format_run_summary(source: &str, trace: &TraceStats, file: &ResultsFile) -> String {
    let s = &file.settings;
    let r = &file.results;
    let o = &file.options;
    let mut out = String::new();

    out.push_str("=== hesm - Hysteresis Evaluation (shunt method) ===\n");
    out.push_str(&format!("Trace: {source}\n"));
    out.push_str(&format!(
        "Sample: {}{}\n",
        file.sample.name,
        file.sample
            .electrode_key
            .as_deref()
            .map(|k| format!(" [{k}]"))
            .unwrap_or_default()
    ));
    out.push_str(&format!(
        "Samples: n={} | dt={:.3e} s | duration={:.4} s\n",
        trace.n_samples, trace.time_step, trace.duration
    ));
    out.push_str(&format!(
        "Vset=[{:.3}, {:.3}] V | Vref=[{:.4}, {:.4}] V\n",
        trace.vset_min, trace.vset_max, trace.vref_min, trace.vref_max
    ));
    out.push_str(&format!(
        "Drive: A={:.2} V | f={:.2} Hz | d={:.3e} m | area={:.3e} m²\n",
        s.amplitude, s.frequency, s.thickness, s.area
    ));

    out.push_str("\nCorrections:\n");
    out.push_str(&format!(
        "- E bias: {:.4} MV/m ({})\n",
        r.e_bias / 1e6,
        match (r.e_bias_corrected, o.ebias_shift) {
            (false, _) => "not corrected",
            (true, EBiasShift::Half) => "corrected by half",
            (true, EBiasShift::Full) => "corrected in full",
        }
    ));
    out.push_str(&format!(
        "- loss current: {}\n",
        if r.loss_current_corrected {
            "subtracted"
        } else if s.correct_loss_current {
            "requested, skipped (capacitance/tanδ missing)"
        } else {
            "off"
        }
    ));
    let window = match o.offset_window.kind {
        OffsetWindowKind::Fixed => format!("fixed start {}", o.offset_window.start_index),
        OffsetWindowKind::ZeroCrossing => "zero crossing".to_string(),
    };
    if s.custom_current_offset == 0.0 {
        out.push_str(&format!(
            "- current offset: {:.4e} A (auto, {window}, {} periods)\n",
            r.current_offset, o.offset_window.periods
        ));
    } else {
        out.push_str(&format!("- current offset: {:.4e} A (custom)\n", r.current_offset));
    }
    out.push_str(&format!(
        "- P shifts: Pdiff={:.4} mC/m², PNull={:.4} mC/m²\n",
        r.p_diff * 1e3,
        r.p_null * 1e3
    ));
    if r.vref_floor_rows > 0 {
        out.push_str(&format!(
            "- Vref floor: {} rows ({:?})\n",
            r.vref_floor_rows, o.vref_policy
        ));
    }

    out.push_str("\nResults:\n");
    out.push_str(&format!(
        "- PR = ({:.4} ± {:.4}) mC/m² [{}σ]\n",
        r.pr * 1e3,
        r.pr_error * 1e3,
        r.pr_error_sigma
    ));
    out.push_str(&format!("- EC = {:.4} MV/m\n", r.ec / 1e6));
    out.push('\n');

    out
}

/// Format the batch PR table; failed files are listed with their error.
pub fn format_batch_table(entries: &[BatchEntry]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<32} {:>8} {:>12} {:>12} {:>10}\n",
            "file", "Vamp", "PR", "PR_error", "EC"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:<32} {:>8} {:>12} {:>12} {:>10}\n",
            "", "V", "mC/m²", "mC/m²", "MV/m"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<32} {:-<8} {:-<12} {:-<12} {:-<10}", "", "", "", "", "").trim_end());
    out.push('\n');

    for entry in entries {
        let line = match &entry.outcome {
            Ok(r) => format!(
                "{:<32} {:>8.2} {:>12.4} {:>12.4} {:>10.4}",
                truncate(&entry.file, 32),
                entry.amplitude,
                r.pr * 1e3,
                r.pr_error * 1e3,
                r.ec / 1e6
            ),
            Err(msg) => format!(
                "{:<32} {:>8.2} error: {msg}",
                truncate(&entry.file, 32),
                entry.amplitude
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    let failed = entries.iter().filter(|e| e.outcome.is_err()).count();
    if failed > 0 {
        out.push_str(&format!("{failed} of {} traces failed.\n", entries.len()));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvalOptions, HysteresisResults, LoopMetrics, MeasurementSettings, SampleInfo};

    fn results(pr: f64, ec: f64) -> HysteresisResults {
        HysteresisResults {
            amplitude: 10.0,
            frequency: 1.0,
            thickness: 1e-6,
            area: 1e-6,
            area_error: 0.0,
            e_bias: 0.0,
            e_bias_corrected: false,
            loss_current_corrected: false,
            current_offset: 0.0,
            p_diff: 0.0,
            p_null: 0.0,
            pr,
            pr_error: 0.001,
            pr_error_sigma: 1.0,
            ec,
            vref_floor_rows: 0,
        }
    }

    #[test]
    fn batch_table_snapshot() {
        let entries = vec![
            BatchEntry {
                file: "A5.0V.csv".to_string(),
                amplitude: 5.0,
                outcome: Ok(LoopMetrics::from(&results(0.1, 2e6))),
            },
            BatchEntry {
                file: "A10.0V.csv".to_string(),
                amplitude: 10.0,
                outcome: Err("bad row".to_string()),
            },
        ];
        let txt = format_batch_table(&entries);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("file"));
        assert!(lines[0].ends_with("EC"));
        assert_eq!(
            lines[3],
            format!("{:<32} {:>8} {:>12} {:>12} {:>10}", "A5.0V.csv", "5.00", "100.0000", "1.0000", "2.0000")
        );
        assert!(lines[4].ends_with("error: bad row"));
        assert_eq!(lines[5], "1 of 2 traces failed.");
    }

    #[test]
    fn summary_names_the_bias_shift() {
        let mut r = results(0.1, 2e6);
        r.e_bias = 0.2e6;
        r.e_bias_corrected = true;
        let file = ResultsFile {
            tool: "hesm".to_string(),
            generated: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            sample: SampleInfo::default(),
            settings: MeasurementSettings {
                amplitude: 10.0,
                frequency: 1.0,
                thickness: 1e-6,
                area: 1e-6,
                area_error: 0.0,
                rref: 1e4,
                rref_error: 0.0,
                vref_error: 0.0,
                capacitance: None,
                loss_tangent: None,
                correct_ebias: true,
                correct_loss_current: false,
                custom_current_offset: 0.0,
            },
            options: EvalOptions {
                ebias_shift: EBiasShift::Full,
                ..EvalOptions::default()
            },
            results: r,
        };
        let trace = TraceStats {
            n_samples: 1200,
            duration: 1.2,
            time_step: 1e-3,
            vset_min: -10.0,
            vset_max: 10.0,
            vref_min: -0.1,
            vref_max: 0.1,
        };

        let txt = format_run_summary("trace.csv", &trace, &file);
        assert!(txt.contains("- E bias: 0.2000 MV/m (corrected in full)"), "{txt}");
        assert!(txt.contains("- PR = (100.0000 ± 1.0000) mC/m² [1σ]"), "{txt}");
    }

    #[test]
    fn truncate_long_names() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
