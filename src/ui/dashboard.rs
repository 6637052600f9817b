//! Live terminal dashboard.
//!
//! Rendering is split in two: pure functions turn a [`DashboardSnapshot`] into
//! styled text, and a [`Dashboard`] puts that text on screen. Nothing in a
//! session depends on a render succeeding.

use std::io::{self, IsTerminal, Write};

use crate::metrics::zones::{Color, HeartZone, PowerZone, PowerZones, Zone};
use crate::storage::training::CADENCE_RANGE;
use crate::ui::ansi::{self, paint, paint_bold, visible_width, GREEN, RED, WHITE, YELLOW};

/// Panel width of the three small metric panels.
const SMALL_PANEL_WIDTH: usize = 24;

/// Width of the full-width panels.
const WIDE_PANEL_WIDTH: usize = SMALL_PANEL_WIDTH * 3 + 2;

const CADENCE_BORDER: Color = Color::new(0xBF, 0x21, 0x1E);
const RESISTANCE_BORDER: Color = Color::new(0xE9, 0xCE, 0x2C);
const POWER_BORDER: Color = Color::new(0xE8, 0x90, 0x05);
const TRAINING_BORDER: Color = Color::new(0x85, 0xAA, 0xD5);

/// What one refresh shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardSnapshot {
    Workout(WorkoutView),
    Training(TrainingView),
}

/// Live workout metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutView {
    pub cadence: u16,
    pub resistance: u8,
    pub power: i16,
    pub heart_rate: u32,
    pub heart_zone: HeartZone,
    pub power_zone: PowerZone,
    pub ftp: f64,
    /// Watt bounds of the current power zone
    pub power_bounds: (f64, f64),
}

impl WorkoutView {
    /// Power as a percentage of FTP.
    pub fn ftp_percent(&self) -> f64 {
        f64::from(self.power) / self.ftp * 100.0
    }
}

/// Watt bounds shown for a power zone; the no-zone label shows the lowest zone.
pub fn power_zone_limits(power_zones: &PowerZones, zone: PowerZone) -> (f64, f64) {
    let shown = if zone == PowerZone::NoZone {
        PowerZone::ORDERED[0]
    } else {
        zone
    };
    power_zones
        .value_bounds(shown)
        .unwrap_or((f64::NEG_INFINITY, f64::INFINITY))
}

/// Training coverage at the current resistance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingView {
    pub resistance: u8,
    pub cadence: u16,
    /// Samples recorded per cadence at `resistance`
    pub counts: Vec<(u16, usize)>,
}

impl TrainingView {
    pub fn count(&self, cadence: u16) -> usize {
        self.counts
            .iter()
            .find(|(c, _)| *c == cadence)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Screen the dashboard draws on.
pub trait Dashboard {
    /// Draw one frame.
    fn render(&mut self, snapshot: &DashboardSnapshot) -> io::Result<()>;

    /// Restore the terminal. Called once when the session ends.
    fn close(&mut self) -> io::Result<()>;
}

/// Dashboard drawing full-screen frames on a terminal.
pub struct TerminalDashboard<W: Write> {
    out: W,
    /// Emit colors and cursor control
    styled: bool,
    started: bool,
}

impl TerminalDashboard<io::Stdout> {
    /// Draw on stdout, styled only when it is a terminal.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let styled = out.is_terminal();
        Self::new(out, styled)
    }
}

impl<W: Write> TerminalDashboard<W> {
    pub fn new(out: W, styled: bool) -> Self {
        Self {
            out,
            styled,
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Dashboard for TerminalDashboard<W> {
    fn render(&mut self, snapshot: &DashboardSnapshot) -> io::Result<()> {
        let frame = render_snapshot(snapshot);

        if !self.styled {
            writeln!(self.out, "{}", ansi::strip(&frame))?;
            return self.out.flush();
        }

        if !self.started {
            write!(self.out, "{}{}", ansi::ENTER_ALT_SCREEN, ansi::HIDE_CURSOR)?;
            self.started = true;
        }

        write!(self.out, "{}", ansi::CURSOR_HOME)?;
        for line in frame.lines() {
            write!(self.out, "{}{}\r\n", line, ansi::CLEAR_LINE)?;
        }
        write!(self.out, "{}", ansi::CLEAR_BELOW)?;
        self.out.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        if self.styled && self.started {
            write!(self.out, "{}{}", ansi::SHOW_CURSOR, ansi::LEAVE_ALT_SCREEN)?;
            self.started = false;
        }
        self.out.flush()
    }
}

/// Render a full frame.
pub fn render_snapshot(snapshot: &DashboardSnapshot) -> String {
    match snapshot {
        DashboardSnapshot::Workout(view) => render_workout(view),
        DashboardSnapshot::Training(view) => render_training(view),
    }
}

/// Cadence, resistance and power side by side, then heart rate and power zone.
pub fn render_workout(view: &WorkoutView) -> String {
    let top = [
        metric_panel("Cadence (RPM)", &view.cadence.to_string(), CADENCE_BORDER),
        metric_panel("Resistance", &view.resistance.to_string(), RESISTANCE_BORDER),
        metric_panel("Power (W)", &view.power.to_string(), POWER_BORDER),
    ];

    let mut lines = Vec::new();
    for row in 0..top[0].len() {
        let joined: Vec<&str> = top.iter().map(|panel| panel[row].as_str()).collect();
        lines.push(joined.join(" "));
    }
    lines.extend(heart_rate_panel(view));
    lines.extend(power_zone_panel(view));

    lines.join("\n")
}

/// Sample coverage grid for the current resistance.
pub fn render_training(view: &TrainingView) -> String {
    let mut body = vec![String::new()];
    body.push(paint(
        "  Cad.    0   1   2   3   4   5   6   7   8   9    ",
        WHITE,
    ));

    let lowest = *CADENCE_RANGE.start();
    let mut bucket = (*CADENCE_RANGE.end() - 1) / 10 * 10;
    while bucket >= lowest {
        let mut row = paint(&format!("  {:3}    ", bucket), WHITE);
        for cadence in bucket..bucket + 10 {
            row.push_str(&coverage_cell(view.count(cadence)));
        }
        body.push(row);
        bucket -= 10;
    }

    body.push(paint(
        &format!(
            "  Resistance: {}  -  Cadence: {} RPM",
            view.resistance, view.cadence
        ),
        WHITE,
    ));

    panel("Training", &body, WIDE_PANEL_WIDTH, TRAINING_BORDER).join("\n")
}

fn coverage_cell(samples: usize) -> String {
    if samples > 15 {
        format!("{}{}{} ", paint("█", GREEN), paint("█", YELLOW), paint("█", RED))
    } else if samples > 5 {
        format!("{}{}  ", paint("█", GREEN), paint("█", YELLOW))
    } else if samples > 1 {
        format!("{}   ", paint("█", GREEN))
    } else {
        "    ".to_string()
    }
}

fn metric_panel(title: &str, value: &str, border: Color) -> Vec<String> {
    let body = [String::new(), paint_bold(value, WHITE), String::new()];
    panel(title, &body, SMALL_PANEL_WIDTH, border)
}

fn heart_rate_panel(view: &WorkoutView) -> Vec<String> {
    let color = view.heart_zone.color();
    let zones: Vec<HeartZone> = std::iter::once(HeartZone::NoZone)
        .chain(HeartZone::ORDERED)
        .collect();

    let body = [
        paint_bold(&view.heart_zone.to_string(), color),
        zone_bar(view.heart_zone, &zones),
        paint_bold(&view.heart_rate.to_string(), WHITE),
    ];

    panel("Heart Rate (BPM)", &body, WIDE_PANEL_WIDTH, color)
}

fn power_zone_panel(view: &WorkoutView) -> Vec<String> {
    let zone = view.power_zone;
    let index = PowerZone::ORDERED.iter().position(|z| *z == zone);

    // Zone whose color marks the current interval; the no-zone label borrows the lowest.
    let current = index.map_or(PowerZone::ORDERED[0], |i| PowerZone::ORDERED[i]);
    let below = match index {
        Some(i) if i > 0 => PowerZone::ORDERED[i - 1],
        _ => PowerZone::NoZone,
    };
    let above = match index {
        Some(i) => PowerZone::ORDERED.get(i + 1).copied().unwrap_or(current),
        None => PowerZone::ORDERED[1],
    };

    let header = format!(
        "{}{}{}",
        paint(&format!("{} - ", zone.value()), WHITE),
        paint_bold(&zone.to_string(), zone.color()),
        paint(&format!(" - {}%", view.ftp_percent().round()), WHITE),
    );

    let zones: Vec<PowerZone> = std::iter::once(PowerZone::NoZone)
        .chain(PowerZone::ORDERED)
        .collect();

    let (lower, upper) = view.power_bounds;
    let footer = format!(
        "{}{}{}{}{}",
        paint(&watt_limit(lower), below.color()),
        paint(" - ", WHITE),
        paint(&view.power.to_string(), current.color()),
        paint(" - ", WHITE),
        paint(&watt_limit(upper), above.color()),
    );

    panel(
        "Power Zone",
        &[header, zone_bar(zone, &zones), footer],
        WIDE_PANEL_WIDTH,
        current.color(),
    )
}

fn watt_limit(watts: f64) -> String {
    if watts == f64::INFINITY {
        "∞".to_string()
    } else if watts <= 0.0 {
        "0".to_string()
    } else {
        format!("{}", watts.round())
    }
}

/// `«««` then one colored block per zone reached, then `»»»`.
fn zone_bar<Z: Zone>(current: Z, zones: &[Z]) -> String {
    let mut bar = paint_bold("«««", WHITE);
    for zone in zones {
        if current.value() >= zone.value() {
            bar.push_str(&paint("███", zone.color()));
        } else {
            bar.push_str("   ");
        }
    }
    bar.push_str(&paint_bold("»»»", WHITE));
    bar
}

/// Heavy-bordered box with a title and centered body lines.
fn panel(title: &str, body: &[String], width: usize, border: Color) -> Vec<String> {
    let inner = width.saturating_sub(2);
    let title = format!(" {} ", title);
    let fill = inner.saturating_sub(title.chars().count());
    let left = fill / 2;

    let mut lines = Vec::with_capacity(body.len() + 2);
    lines.push(paint(
        &format!("┏{}{}{}┓", "━".repeat(left), title, "━".repeat(fill - left)),
        border,
    ));

    for line in body {
        let pad = inner.saturating_sub(visible_width(line));
        let before = pad / 2;
        lines.push(format!(
            "{}{}{}{}{}",
            paint("┃", border),
            " ".repeat(before),
            line,
            " ".repeat(pad - before),
            paint("┃", border),
        ));
    }

    lines.push(paint(&format!("┗{}┛", "━".repeat(inner)), border));
    lines
}
