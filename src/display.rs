use crate::memory::Frame;
use std::io;
use std::time::Duration;

/// Display is what the scheduler presents finished frames to. It should
/// abstract the implementation details, so a variety of kinds of screen would
/// work, including ones that finish presenting asynchronously.
pub trait Display {
    /// hand a finished frame to the output device
    fn present(&mut self, frame: &Frame) -> Result<(), io::Error>;

    /// wait for the previous `present` to complete; false if it is still
    /// outstanding after `timeout`
    fn wait_presented(&mut self, _timeout: Duration) -> Result<bool, io::Error> {
        Ok(true)
    }
}

/// RGB for the 16 base colours followed by the 16 extended ones
#[rustfmt::skip]
pub const PALETTE_RGB: [(u8, u8, u8); 32] = [
    (0x00, 0x00, 0x00), (0x1d, 0x2b, 0x53), (0x7e, 0x25, 0x53), (0x00, 0x87, 0x51),
    (0xab, 0x52, 0x36), (0x5f, 0x57, 0x4f), (0xc2, 0xc3, 0xc7), (0xff, 0xf1, 0xe8),
    (0xff, 0x00, 0x4d), (0xff, 0xa3, 0x00), (0xff, 0xec, 0x27), (0x00, 0xe4, 0x36),
    (0x29, 0xad, 0xff), (0x83, 0x76, 0x9c), (0xff, 0x77, 0xa8), (0xff, 0xcc, 0xaa),
    (0x29, 0x18, 0x14), (0x11, 0x1d, 0x35), (0x42, 0x21, 0x36), (0x12, 0x53, 0x59),
    (0x74, 0x2f, 0x29), (0x49, 0x33, 0x3b), (0xa2, 0x88, 0x79), (0xf3, 0xef, 0x7d),
    (0xbe, 0x12, 0x50), (0xff, 0x6c, 0x24), (0xa8, 0xe7, 0x2e), (0x00, 0xb5, 0x4e),
    (0x06, 0x5a, 0xb5), (0x75, 0x46, 0x65), (0xff, 0x6e, 0x59), (0xff, 0x9d, 0x81),
];

/// screen palette entry to an index into PALETTE_RGB; bit 7 selects the
/// extended half
pub fn color_index(entry: u8) -> usize {
    (((entry >> 3) & 0x10) | (entry & 0xf)) as usize
}

// store useful metadata about the output surface
#[cfg_attr(not(feature = "term"), allow(dead_code))]
struct Resolution(usize, usize);

#[cfg_attr(not(feature = "term"), allow(dead_code))]
impl Resolution {
    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.0 - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.1 - 1) as f64, 0.0]
    }

    /// split the frame into one point list per colour; colour 0 is left
    /// empty since it is the background
    fn points_by_colour(&self, frame: &Frame) -> Vec<Vec<(f64, f64)>> {
        let mut planes = vec![Vec::new(); PALETTE_RGB.len()];
        for y in 0..self.1 {
            for x in 0..self.0 {
                let c = color_index(frame.pixel(x, y));
                if c != 0 {
                    planes[c].push((x as f64, -1.0 * y as f64));
                }
            }
        }
        planes
    }
}

#[cfg(feature = "term")]
pub use self::term::TermDisplay;

#[cfg(feature = "term")]
mod term {
    use super::{Display, Resolution, PALETTE_RGB};
    use crate::memory::{Frame, SCREEN_HEIGHT, SCREEN_WIDTH};
    use std::io;
    use tui::backend::CrosstermBackend;
    use tui::layout::Rect;
    use tui::style::{Color, Modifier, Style};
    use tui::symbols::Marker;
    use tui::text::{Span, Spans};
    use tui::widgets::canvas::{Canvas, Points};
    use tui::widgets::{Block, Borders, Clear, Paragraph};
    use tui::Terminal;

    /// colour display in a terminal, rendered using TUI and crossterm; each
    /// character cell carries 2x4 pixels as braille dots
    pub struct TermDisplay {
        terminal: Terminal<CrosstermBackend<io::Stdout>>,
        resolution: Resolution,
    }

    impl TermDisplay {
        pub fn new() -> Result<TermDisplay, io::Error> {
            let backend = CrosstermBackend::new(io::stdout());
            let mut terminal = Terminal::new(backend)?;
            terminal.clear()?;
            terminal.hide_cursor()?;
            Ok(TermDisplay {
                terminal,
                resolution: Resolution(SCREEN_WIDTH, SCREEN_HEIGHT),
            })
        }

        fn screen_area(&self) -> Rect {
            Rect::new(
                0,
                0,
                2 + (self.resolution.0 / 2) as u16,
                2 + (self.resolution.1 / 4) as u16,
            )
        }

        /// draw a small boxed menu over the screen area
        pub fn draw_menu(
            &mut self,
            title: &str,
            lines: &[&str],
            selected: Option<usize>,
        ) -> Result<(), io::Error> {
            let screen = self.screen_area();
            let width = 4 + lines.iter().map(|l| l.len()).max().unwrap_or(0).max(title.len()) as u16;
            let height = 2 + lines.len() as u16;
            let area = Rect::new(
                screen.width.saturating_sub(width) / 2,
                screen.height.saturating_sub(height) / 2,
                width.min(screen.width),
                height.min(screen.height),
            );
            let text: Vec<Spans> = lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    if Some(i) == selected {
                        Spans::from(Span::styled(
                            format!("> {}", line),
                            Style::default().add_modifier(Modifier::BOLD),
                        ))
                    } else {
                        Spans::from(format!("  {}", line))
                    }
                })
                .collect();
            self.terminal.draw(|f| {
                let menu = Paragraph::new(text).block(
                    Block::default()
                        .title(title)
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black).fg(Color::White)),
                );
                f.render_widget(Clear, area);
                f.render_widget(menu, area);
            })?;
            Ok(())
        }
    }

    impl Drop for TermDisplay {
        fn drop(&mut self) {
            if let Err(e) = self.terminal.show_cursor() {
                log::warn!("failed to restore cursor: {}", e);
            }
        }
    }

    impl Display for TermDisplay {
        fn present(&mut self, frame: &Frame) -> Result<(), io::Error> {
            let planes = self.resolution.points_by_colour(frame);
            let size = self.screen_area();
            let x_bounds = self.resolution.x_bounds();
            let y_bounds = self.resolution.y_bounds();
            self.terminal.draw(|f| {
                let canvas = Canvas::default()
                    .block(
                        Block::default()
                            .title("pocket8")
                            .borders(Borders::ALL)
                            .style(Style::default().bg(Color::Black)),
                    )
                    .x_bounds(x_bounds)
                    .y_bounds(y_bounds)
                    .marker(Marker::Braille)
                    .paint(|ctx| {
                        for (c, coords) in planes.iter().enumerate() {
                            if coords.is_empty() {
                                continue;
                            }
                            let (r, g, b) = PALETTE_RGB[c];
                            ctx.draw(&Points {
                                coords,
                                color: Color::Rgb(r, g, b),
                            });
                        }
                    });
                f.render_widget(canvas, size);
            })?;
            Ok(())
        }
    }
}

/// useful for testing non-display routines
#[derive(Debug, Default)]
pub struct DummyDisplay {
    /// how many frames have been presented
    pub presented: usize,
    /// report this many outstanding waits before completing each present
    pub pending_waits: usize,
    outstanding: usize,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn present(&mut self, _frame: &Frame) -> Result<(), io::Error> {
        self.presented += 1;
        self.outstanding = self.pending_waits;
        Ok(())
    }

    fn wait_presented(&mut self, _timeout: Duration) -> Result<bool, io::Error> {
        if self.outstanding > 0 {
            self.outstanding -= 1;
            return Ok(false);
        }
        Ok(true)
    }
}
