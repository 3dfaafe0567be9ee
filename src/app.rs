//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads settings and traces
//! - runs the reconstruction (single trace or batch)
//! - prints reports/plots
//! - writes optional exports

use chrono::Local;
use clap::Parser;

use crate::cli::{BatchArgs, Command, EvalArgs, PlotArgs, SimulateArgs};
use crate::domain::SampleInfo;
use crate::error::AppError;
use crate::io::export::{RunBundle, write_batch_tsv, write_run_bundle, write_trace_csv};
use crate::io::settings::{SettingsFile, load_settings, render_settings_text};

pub mod pipeline;

/// Entry point for the `hesm` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Eval(args) => handle_eval(args),
        Command::Batch(args) => handle_batch(args),
        Command::Plot(args) => handle_plot(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::View(args) => crate::tui::run(args),
    }
}

fn handle_eval(args: EvalArgs) -> Result<(), AppError> {
    let generated = Local::now().naive_local();
    let run = pipeline::run_eval(&args.traces, args.settings.as_deref(), args.options.to_options(), generated)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.source, &run.stats, &run.results_file)
    );

    let plot = crate::plot::render_loop_ascii(
        &run.reconstruction.table,
        args.width,
        args.height,
        Some(&run.reconstruction.results),
    );
    if !args.no_plot {
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &args.export_json {
        crate::io::results::write_results_json(path, &run.results_file)?;
    }
    if let Some(dir) = &args.export_dir {
        let target = write_run_bundle(
            dir,
            &run.name,
            &RunBundle {
                table: &run.reconstruction.table,
                results: &run.results_file,
                settings_source: Some(run.settings_path.as_path()),
                plot: &plot,
            },
        )?;
        println!("Exported run to {}", target.display());
    }

    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let Some(first) = args.traces.first() else {
        return Err(AppError::new(2, "No trace given."));
    };
    let settings_path = pipeline::resolve_settings_path(args.settings.as_deref(), first);
    let settings = load_settings(&settings_path)?;

    let entries = pipeline::run_batch(&args.traces, &settings, &args.options.to_options());
    println!("{}", crate::report::format_batch_table(&entries));

    if let Some(path) = &args.export {
        write_batch_tsv(path, &entries)?;
    }

    if entries.iter().all(|e| e.outcome.is_err()) {
        return Err(AppError::new(3, "No trace could be evaluated."));
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let table = crate::io::ingest::read_hysteresis_csv(&args.data)?;
    let plot = crate::plot::render_loop_ascii(&table, args.width, args.height, None);
    println!("{plot}");
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let model = args.to_model();
    let trace = crate::data::synthetic::generate_trace(&model)?;
    write_trace_csv(&args.out, &trace)?;
    println!("Wrote {} samples to {}", trace.len(), args.out.display());

    if let Some(path) = &args.settings_out {
        let file = SettingsFile {
            sample: SampleInfo {
                name: "synthetic".to_string(),
                drive_offset: model.drive_offset,
                ..SampleInfo::default()
            },
            settings: model.settings(),
        };
        std::fs::write(path, render_settings_text(&file))
            .map_err(|e| AppError::new(2, format!("Failed to write settings '{}': {e}", path.display())))?;
        println!("Wrote settings to {}", path.display());
    }

    println!(
        "Expected PR ≈ {:.4} mC/m², EC ≈ {:.4} MV/m",
        model.remanent_polarization() * 1e3,
        model.coercive_field / 1e6
    );
    Ok(())
}
