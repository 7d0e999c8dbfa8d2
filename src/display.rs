use color_eyre::Result;
use ratatui::{
    crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph},
    DefaultTerminal, Frame,
};

use hackrf_antenna_swr::{plot::MAX_SWR, SwrPair};

/// Show the SWR curve until the user quits.
pub fn show(pairs: &[SwrPair]) -> Result<()> {
    let terminal = ratatui::init();
    let result = SwrView::new(pairs).run(terminal);
    ratatui::restore();
    result
}

struct SwrView {
    // frequency in MHz, swr
    data_points: Vec<(f64, f64)>,
    min_freq: f64,
    max_freq: f64,
    max_swr: f64,
}

impl SwrView {
    fn new(pairs: &[SwrPair]) -> Self {
        let data_points: Vec<(f64, f64)> = pairs
            .iter()
            .map(|p| (p.frequency / 1_000_000.0, p.swr.min(MAX_SWR)))
            .collect();
        let min_freq = data_points.first().map_or(0.0, |p| p.0);
        let max_freq = data_points.last().map_or(1.0, |p| p.0);
        let max_swr = data_points
            .iter()
            .map(|p| p.1)
            .fold(2.0, f64::max)
            .ceil();
        Self {
            data_points,
            min_freq,
            max_freq,
            max_swr,
        }
    }

    fn run(self, mut terminal: DefaultTerminal) -> Result<()> {
        loop {
            terminal.draw(|frame| self.draw(frame))?;

            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    _ => {}
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::vertical([
            Constraint::Length(3), // Title and info
            Constraint::Fill(1),   // Chart
        ])
        .split(frame.area());

        let info_text = match self.best() {
            Some((freq, swr)) => format!(
                "{:.3} - {:.3} MHz, {} points, best SWR {:.2} at {:.3} MHz",
                self.min_freq,
                self.max_freq,
                self.data_points.len(),
                swr,
                freq
            ),
            None => "No SWR data".to_string(),
        };

        frame.render_widget(
            Block::bordered().title(Line::from("Antenna SWR").blue().bold().centered()),
            chunks[0],
        );
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(
                    info_text,
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(" [q] Quit", Style::default().fg(Color::Gray)),
            ])),
            Rect::new(
                chunks[0].x + 2,
                chunks[0].y + 1,
                chunks[0].width.saturating_sub(4),
                1,
            ),
        );

        self.render_chart(frame, chunks[1]);
    }

    fn best(&self) -> Option<(f64, f64)> {
        self.data_points
            .iter()
            .copied()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn render_chart(&self, frame: &mut Frame, area: Rect) {
        if self.data_points.is_empty() {
            return;
        }

        let mid_freq = (self.min_freq + self.max_freq) / 2.0;
        let x_labels = vec![
            Span::styled(
                format!("{:.1}", self.min_freq),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{:.1}", mid_freq)),
            Span::styled(
                format!("{:.1}", self.max_freq),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ];

        let mid_swr = (1.0 + self.max_swr) / 2.0;
        let y_labels = vec![
            Span::styled("1.0", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{:.1}", mid_swr)),
            Span::styled(
                format!("{:.1}", self.max_swr),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ];

        let dataset = Dataset::default()
            .name("SWR")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&self.data_points);

        let chart = Chart::new(vec![dataset])
            .block(Block::bordered())
            .x_axis(
                Axis::default()
                    .title("Frequency (MHz)")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([self.min_freq, self.max_freq])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title("SWR")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([1.0, self.max_swr])
                    .labels(y_labels),
            );

        frame.render_widget(chart, area);
    }
}
