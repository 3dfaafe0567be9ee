//! Ratatui-based terminal UI.
//!
//! The viewer shows the raw drive and current against time, the reconstructed
//! P–E loop and the scalar results. Corrections and evaluation options can be
//! toggled from the keyboard; the loop is re-evaluated after every change.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::app::pipeline::{evaluate, resolve_settings_path};
use crate::cli::ViewArgs;
use crate::domain::{EvalOptions, HysteresisTable, OffsetWindowKind, RawSample, VrefPolicy};
use crate::error::AppError;
use crate::eval::Reconstruction;
use crate::io::ingest::load_raw_trace;
use crate::io::settings::{SettingsFile, load_settings};

mod plotters_chart;

use plotters_chart::{Series, TracePlottersChart};

/// Start the TUI.
///
/// The trace and settings are loaded before the terminal is taken over, so
/// input errors are reported like any other command.
pub fn run(args: ViewArgs) -> Result<(), AppError> {
    let settings_path = resolve_settings_path(args.settings.as_deref(), &args.trace);
    let settings = load_settings(&settings_path)?;
    let trace = load_raw_trace(&args.trace)?;
    let mut app = App::new(args.trace, trace.samples, settings, args.options.to_options());

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    trace_path: PathBuf,
    samples: Vec<RawSample>,
    settings: SettingsFile,
    options: EvalOptions,
    /// Last evaluation; an error keeps the viewer open with its message.
    eval: Result<Reconstruction, String>,
    status: String,
}

impl App {
    fn new(trace_path: PathBuf, samples: Vec<RawSample>, settings: SettingsFile, options: EvalOptions) -> Self {
        let mut app = Self {
            trace_path,
            samples,
            settings,
            options,
            eval: Err("not evaluated".to_string()),
            status: String::new(),
        };
        app.reevaluate();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the viewer should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let change = match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('b') => {
                let s = &mut self.settings.settings;
                s.correct_ebias = !s.correct_ebias;
                format!("E-bias correction {}", on_off(s.correct_ebias))
            }
            KeyCode::Char('l') => {
                let s = &mut self.settings.settings;
                s.correct_loss_current = !s.correct_loss_current;
                format!("loss-current correction {}", on_off(s.correct_loss_current))
            }
            KeyCode::Char('o') => {
                let window = &mut self.options.offset_window;
                window.kind = next_window_kind(window.kind);
                format!("offset window: {}", window_label(window.kind))
            }
            KeyCode::Char('v') => {
                self.options.vref_policy = next_vref_policy(self.options.vref_policy);
                format!("Vref policy: {:?}", self.options.vref_policy)
            }
            _ => return false,
        };

        self.reevaluate();
        if self.eval.is_ok() {
            self.status = change;
        }
        false
    }

    fn reevaluate(&mut self) {
        self.eval = evaluate(&self.samples, &self.settings, &self.options).map_err(|e| e.to_string());
        self.status = match &self.eval {
            Ok(_) => "evaluated".to_string(),
            Err(msg) => msg.clone(),
        };
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let s = &self.settings.settings;
        let lines = vec![
            Line::from(vec![
                Span::styled("hesm", Style::default().fg(Color::Cyan)),
                Span::raw(format!(
                    " | {} | {}",
                    self.settings.sample.name,
                    self.trace_path.display()
                )),
            ]),
            Line::from(Span::styled(
                format!(
                    "A={} V | f={} Hz | n={} | E-bias: {} | loss: {} | offset: {} | Vref: {:?}",
                    s.amplitude,
                    s.frequency,
                    self.samples.len(),
                    on_off(s.correct_ebias),
                    on_off(s.correct_loss_current),
                    window_label(self.options.offset_window.kind),
                    self.options.vref_policy,
                ),
                Style::default().fg(Color::Gray),
            )),
        ];

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(8)])
            .split(area);
        let charts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);

        self.draw_time_chart(frame, charts[0]);
        self.draw_loop_chart(frame, charts[1]);
        self.draw_results(frame, rows[1]);
    }

    fn draw_time_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(inner) = chart_frame(frame, area, "Vset / I (normalized)") else {
            return;
        };
        let Ok(out) = &self.eval else {
            waiting(frame, inner);
            return;
        };

        let (vset, current, x_bounds) = time_series(&out.table);
        let y_bounds = [-1.1, 1.1];
        let series = [
            Series {
                points: &vset,
                color: RGBColor(0, 255, 255),
            },
            Series {
                points: &current,
                color: RGBColor(255, 255, 0),
            },
        ];
        let labels = AxisLabels {
            x: "t (s)",
            y: "norm.",
        };
        render_chart(frame, inner, &series, &[], x_bounds, y_bounds, labels);
    }

    fn draw_loop_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(inner) = chart_frame(frame, area, "P–E loop") else {
            return;
        };
        let Ok(out) = &self.eval else {
            waiting(frame, inner);
            return;
        };

        let (points, x_bounds, y_bounds) = loop_series(&out.table);
        let r = &out.results;
        let markers = [
            (0.0, r.pr * 1e3),
            (0.0, -r.pr * 1e3),
            (r.ec / 1e6, 0.0),
            (-r.ec / 1e6, 0.0),
        ];
        let series = [Series {
            points: &points,
            color: RGBColor(0, 255, 255),
        }];
        let labels = AxisLabels {
            x: "E (MV/m)",
            y: "P (mC/m²)",
        };
        render_chart(frame, inner, &series, &markers, x_bounds, y_bounds, labels);
    }

    fn draw_results(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let lines: Vec<Line> = match &self.eval {
            Ok(out) => {
                let r = &out.results;
                vec![
                    Line::from(Span::styled(
                        format!(
                            "PR = ({:.4} ± {:.4}) mC/m² [{}σ]",
                            r.pr * 1e3,
                            r.pr_error * 1e3,
                            r.pr_error_sigma
                        ),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!("EC = {:.4} MV/m", r.ec / 1e6)),
                    Line::from(format!(
                        "E bias = {:.4} MV/m | current offset = {:.4e} A",
                        r.e_bias / 1e6,
                        r.current_offset
                    )),
                    Line::from(format!(
                        "Pdiff = {:.4} mC/m² | PNull = {:.4} mC/m² | Vref floor rows = {}",
                        r.p_diff * 1e3,
                        r.p_null * 1e3,
                        r.vref_floor_rows
                    )),
                ]
            }
            Err(msg) => vec![Line::from(Span::styled(msg.clone(), Style::default().fg(Color::Red)))],
        };

        let p = Paragraph::new(Text::from(lines)).block(Block::default().title("Results").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "b E-bias  l loss  o offset window  v Vref policy  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "ON" } else { "OFF" }
}

fn window_label(kind: OffsetWindowKind) -> &'static str {
    match kind {
        OffsetWindowKind::Fixed => "fixed",
        OffsetWindowKind::ZeroCrossing => "zero crossing",
    }
}

fn next_window_kind(cur: OffsetWindowKind) -> OffsetWindowKind {
    match cur {
        OffsetWindowKind::Fixed => OffsetWindowKind::ZeroCrossing,
        OffsetWindowKind::ZeroCrossing => OffsetWindowKind::Fixed,
    }
}

fn next_vref_policy(cur: VrefPolicy) -> VrefPolicy {
    match cur {
        VrefPolicy::Clamp => VrefPolicy::Flag,
        VrefPolicy::Flag => VrefPolicy::Fail,
        VrefPolicy::Fail => VrefPolicy::Clamp,
    }
}

/// Vset and I against time, each scaled to a peak magnitude of 1.
fn time_series(table: &HysteresisTable) -> (Vec<(f64, f64)>, Vec<(f64, f64)>, [f64; 2]) {
    let vset = normalized(table, |r| r.vset);
    let current = normalized(table, |r| r.current);

    let x_bounds = match (table.rows.first(), table.rows.last()) {
        (Some(a), Some(b)) if b.time > a.time => [a.time, b.time],
        _ => [0.0, 1.0],
    };
    (vset, current, x_bounds)
}

fn normalized(table: &HysteresisTable, value: impl Fn(&crate::domain::HysteresisRow) -> f64) -> Vec<(f64, f64)> {
    let peak = table
        .rows
        .iter()
        .map(|r| value(r).abs())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let scale = if peak > 0.0 { 1.0 / peak } else { 1.0 };
    table.rows.iter().map(|r| (r.time, value(r) * scale)).collect()
}

/// The loop in MV/m and mC/m², with padded bounds.
fn loop_series(table: &HysteresisTable) -> (Vec<(f64, f64)>, [f64; 2], [f64; 2]) {
    let points: Vec<(f64, f64)> = table
        .loop_points()
        .into_iter()
        .map(|(e, p)| (e / 1e6, p * 1e3))
        .filter(|(e, p)| e.is_finite() && p.is_finite())
        .collect();

    let x_bounds = padded_bounds(points.iter().map(|p| p.0));
    let y_bounds = padded_bounds(points.iter().map(|p| p.1));
    (points, x_bounds, y_bounds)
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() || hi <= lo {
        return [-1.0, 1.0];
    }
    let pad = ((hi - lo) * 0.05).max(1e-12);
    [lo - pad, hi + pad]
}

fn fmt_axis(v: f64) -> String {
    format!("{v:.2}")
}

fn chart_frame(frame: &mut ratatui::Frame<'_>, area: Rect, title: &str) -> Option<Rect> {
    let block = Block::default().title(title.to_string()).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Clear, inner);
    (inner.width > 0 && inner.height > 0).then_some(inner)
}

fn waiting(frame: &mut ratatui::Frame<'_>, inner: Rect) {
    let msg = Paragraph::new("No evaluation (see results).").style(Style::default().fg(Color::Yellow));
    frame.render_widget(msg, inner);
}

#[derive(Debug, Clone, Copy)]
struct AxisLabels<'a> {
    x: &'a str,
    y: &'a str,
}

fn render_chart(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    series: &[Series<'_>],
    markers: &[(f64, f64)],
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    labels: AxisLabels<'_>,
) {
    let (chart_rect, insets) = chart_layout(inner);
    let widget = TracePlottersChart {
        series,
        markers,
        x_bounds,
        y_bounds,
        x_label: labels.x,
        y_label: labels.y,
        fmt_x: fmt_axis,
        fmt_y: fmt_axis,
    };
    frame.render_widget(widget, chart_rect);
    if let Some(insets) = insets {
        draw_axis_ticks(frame, inner, chart_rect, insets, x_bounds, y_bounds, labels);
    }
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    labels: AxisLabels<'_>,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = format!("{x_val:.2}");
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = format!("{y_val:.1}");
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(labels.x)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(labels.y).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
