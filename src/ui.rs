use image::RgbaImage;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Widget, Wrap},
    Frame,
};

use crate::overlay::{Label, ViewFrame};
use crate::{AppState, FormField};

/// Draws an RGBA raster with half-block cells, two pixel rows per cell.
pub struct RasterView<'a> {
    image: &'a RgbaImage,
    labels: &'a [Label],
}

impl<'a> RasterView<'a> {
    pub fn new(frame: &'a ViewFrame) -> Self {
        Self {
            image: &frame.image,
            labels: &frame.labels,
        }
    }
}

impl Widget for RasterView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        // Keep the raster square: a cell is roughly twice as tall as wide
        let side = area.width.min(area.height * 2);
        let x0 = area.x + (area.width - side) / 2;
        let rows = side / 2;
        let y0 = area.y + (area.height - rows) / 2;
        let scale_x = width as f64 / side as f64;
        let scale_y = height as f64 / (rows as f64 * 2.0);

        let sample = |cx: u16, sub_row: u16| -> Color {
            let px = ((cx as f64 + 0.5) * scale_x) as u32;
            let py = ((sub_row as f64 + 0.5) * scale_y) as u32;
            let p = self.image.get_pixel(px.min(width - 1), py.min(height - 1));
            Color::Rgb(p[0], p[1], p[2])
        };

        for row in 0..rows {
            for col in 0..side {
                if let Some(cell) = buf.cell_mut((x0 + col, y0 + row)) {
                    cell.set_char('▀')
                        .set_fg(sample(col, row * 2))
                        .set_bg(sample(col, row * 2 + 1));
                }
            }
        }

        for label in self.labels {
            if label.x < 0.0 || label.y < 0.0 {
                continue;
            }
            let col = (label.x / scale_x) as u16;
            let row = (label.y / scale_y / 2.0) as u16;
            if col >= side || row >= rows {
                continue;
            }
            let max_len = (side - col) as usize;
            let text: String = label.text.chars().take(max_len).collect();
            let [r, g, b, _] = label.color.0;
            buf.set_string(
                x0 + col,
                y0 + row,
                text,
                Style::default().fg(Color::Rgb(r, g, b)).bg(Color::Black),
            );
        }
    }
}

pub fn draw_ui(f: &mut Frame, app_state: &AppState) {
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(70), // Views
            Constraint::Percentage(30), // Info
        ])
        .split(f.area());

    let view_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(main_chunks[0]);

    let side_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(view_chunks[1]);

    let view_areas = [view_chunks[0], side_chunks[0], side_chunks[1]];
    for ((view, frame), area) in app_state
        .sim
        .views
        .iter()
        .zip(&app_state.frames)
        .zip(view_areas)
    {
        draw_view(f, area, &view.caption(), frame);
    }

    let info_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // Header
            Constraint::Min(8),     // Satellites
            Constraint::Length(5),  // Intervals
            Constraint::Length(10), // Event log
            Constraint::Length(3),  // Footer
        ])
        .split(main_chunks[1]);

    draw_header(f, info_chunks[0], app_state);
    draw_satellite_list(f, info_chunks[1], app_state);
    draw_intervals(f, info_chunks[2], app_state);
    draw_event_log(f, info_chunks[3], app_state);
    draw_footer(f, info_chunks[4]);

    if app_state.form.is_some() {
        draw_custom_form(f, app_state);
    }
    if let Some(message) = &app_state.alert {
        draw_alert(f, message);
    }
}

fn draw_view(f: &mut Frame, area: Rect, title: &str, frame: &ViewFrame) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .style(Style::default().fg(Color::White));
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(RasterView::new(frame), inner);
}

fn draw_header(f: &mut Frame, area: Rect, app_state: &AppState) {
    let header_text = vec![
        Line::from(vec![Span::raw(app_state.sim.observer.location_text())]),
        Line::from(vec![
            Span::styled("Time: ", Style::default().fg(Color::Cyan)),
            Span::raw(app_state.clock_text.clone()),
        ]),
    ];

    let header = Paragraph::new(header_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Overpass: {}", app_state.sim.observer.name))
            .style(Style::default().fg(Color::White)),
    );

    f.render_widget(header, area);
}

fn draw_satellite_list(f: &mut Frame, area: Rect, app_state: &AppState) {
    let items: Vec<ListItem> = app_state
        .sim
        .satellites
        .iter()
        .map(|sat| {
            let [r, g, b, _] = sat.color.0;
            ListItem::new(Line::from(vec![
                Span::styled(sat.name.clone(), Style::default().fg(Color::Rgb(r, g, b))),
                Span::raw(" "),
                Span::styled(
                    format!("({})", sat.type_label()),
                    Style::default()
                        .fg(Color::Gray)
                        .add_modifier(Modifier::ITALIC),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(app_state.sim.satellite_header())
                .style(Style::default().fg(Color::White)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !app_state.sim.satellites.is_empty() {
        state.select(Some(
            app_state
                .selected_satellite
                .min(app_state.sim.satellites.len() - 1),
        ));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_intervals(f: &mut Frame, area: Rect, app_state: &AppState) {
    let lines: Vec<Line> = app_state
        .interval_lines
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();

    let intervals = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Next free intervals")
                .style(Style::default().fg(Color::Green)),
        );
    f.render_widget(intervals, area);
}

fn draw_event_log(f: &mut Frame, area: Rect, app_state: &AppState) {
    // Newest entries stay visible at the bottom
    let visible = area.height.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = app_state
        .sim
        .events
        .entries()
        .rev()
        .take(visible)
        .map(|entry| Line::from(entry.to_string()))
        .collect();
    lines.reverse();

    let log = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Event log ({})", app_state.sim.events.len()))
            .style(Style::default().fg(Color::White)),
    );
    f.render_widget(log, area);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new("a: Add | c: Custom | d: Delete | r: Relocate | ↑/↓: Select | q: Quit")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn draw_custom_form(f: &mut Frame, app_state: &AppState) {
    let Some(form) = &app_state.form else {
        return;
    };

    let area = centered_rect(50, 30, f.area());
    f.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),    // Fields
            Constraint::Length(3), // Footer
        ])
        .split(area);

    let fields = [
        (FormField::OrbitType, "Orbit type", &form.orbit_type),
        (FormField::Name, "Name", &form.name),
    ];

    let field_lines: Vec<Line> = fields
        .iter()
        .map(|(field, label, value)| {
            let is_current = *field == form.field;
            let value = if is_current {
                format!("{}|", value)
            } else {
                value.to_string()
            };

            let label_style = if is_current {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Yellow)
            };

            let indicator = if is_current { "> " } else { "  " };

            Line::from(vec![
                Span::styled(indicator, label_style),
                Span::styled(format!("{:12}", label), label_style),
                Span::raw(": "),
                Span::styled(truncate_string(&value, 40), Style::default().fg(Color::White)),
            ])
        })
        .collect();

    let form_widget = Paragraph::new(field_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Add custom satellite (crash, stable, escape)")
            .style(Style::default().fg(Color::White)),
    );
    f.render_widget(form_widget, chunks[0]);

    let footer = Paragraph::new("Tab: Next field | Enter: Add | ESC: Cancel")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[1]);
}

fn draw_alert(f: &mut Frame, message: &str) {
    let area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, area);

    let alert = Paragraph::new(vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to dismiss",
            Style::default().fg(Color::Gray),
        )),
    ])
    .wrap(Wrap { trim: true })
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Alert")
            .style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(alert, area);
}

/// Helper function to create a centered rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Helper function to truncate strings for display
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn raster_fills_cells_with_half_blocks() {
        let frame = ViewFrame {
            image: RgbaImage::from_fn(4, 4, |_, y| {
                if y < 2 {
                    Rgba([255, 0, 0, 255])
                } else {
                    Rgba([0, 0, 255, 255])
                }
            }),
            labels: vec![Label::new("N", 0.0, 0.0, Rgba([1, 2, 3, 255]))],
        };
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        RasterView::new(&frame).render(area, &mut buf);

        let top = &buf[(1, 0)];
        assert_eq!(top.symbol(), "▀");
        assert_eq!(top.fg, Color::Rgb(255, 0, 0));
        let bottom = &buf[(1, 1)];
        assert_eq!(bottom.bg, Color::Rgb(0, 0, 255));

        let label = &buf[(0, 0)];
        assert_eq!(label.symbol(), "N");
        assert_eq!(label.fg, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("Imaginary Sat 12", 10), "Imagina...");
        assert_eq!(truncate_string("°°°°°°", 5), "°°...");
    }
}
