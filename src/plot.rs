//! Loss curves laid out by plotters and rasterized onto an `image` buffer.

use crate::error::{GanError, Result};
use image::{Rgb, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::text_anchor::{HPos, VPos};
use plotters_backend::{BackendColor, BackendCoord, BackendTextStyle, DrawingErrorKind};
use std::convert::Infallible;
use std::path::Path;

const WIDTH: u32 = 800;
const PANEL_HEIGHT: u32 = 360;
const CAPTION_SIZE: u32 = 24;
const LABEL_SIZE: u32 = 16;

const DIS_COLOR: RGBColor = RGBColor(31, 119, 180);
const GEN_COLOR: RGBColor = RGBColor(255, 127, 14);

/// A drawing surface. Saving consumes it, so the pixel buffer is released after every
/// plot no matter how many reports a run produces.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Canvas {
        Canvas {
            image: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }

    fn backend(&mut self) -> RasterBackend<'_> {
        RasterBackend {
            image: &mut self.image,
        }
    }
}

/// plotters backend writing straight into an `RgbImage`. Text goes through the built-in
/// bitmap font, so rendering never depends on system fonts.
struct RasterBackend<'a> {
    image: &'a mut RgbImage,
}

impl RasterBackend<'_> {
    fn glyph_scale<S: BackendTextStyle>(style: &S) -> i32 {
        ((style.size() / 8.0).round() as i32).max(1)
    }
}

impl DrawingBackend for RasterBackend<'_> {
    type ErrorType = Infallible;

    fn get_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn ensure_prepared(&mut self) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn present(&mut self) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        Ok(())
    }

    fn draw_pixel(
        &mut self,
        (x, y): BackendCoord,
        color: BackendColor,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        let (w, h) = self.image.dimensions();
        if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h || color.alpha <= 0.0 {
            return Ok(());
        }
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        let (r, g, b) = color.rgb;
        if color.alpha >= 1.0 {
            *pixel = Rgb([r, g, b]);
        } else {
            let a = color.alpha;
            let blend = |old: u8, new: u8| (old as f64 * (1.0 - a) + new as f64 * a).round() as u8;
            *pixel = Rgb([blend(pixel[0], r), blend(pixel[1], g), blend(pixel[2], b)]);
        }
        Ok(())
    }

    fn estimate_text_size<S: BackendTextStyle>(
        &self,
        text: &str,
        style: &S,
    ) -> std::result::Result<(u32, u32), DrawingErrorKind<Infallible>> {
        let scale = Self::glyph_scale(style) as u32;
        Ok((
            text.chars().count() as u32 * font::ADVANCE * scale,
            font::HEIGHT * scale,
        ))
    }

    fn draw_text<S: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &S,
        pos: BackendCoord,
    ) -> std::result::Result<(), DrawingErrorKind<Infallible>> {
        let color = style.color();
        let scale = Self::glyph_scale(style);
        let (width, height) = self.estimate_text_size(text, style)?;
        let (width, height) = (width as i32, height as i32);
        let dx = match style.anchor().h_pos {
            HPos::Left => 0,
            HPos::Right => -width,
            HPos::Center => -width / 2,
        };
        let dy = match style.anchor().v_pos {
            VPos::Top => 0,
            VPos::Center => -height / 2,
            VPos::Bottom => -height,
        };
        let trans = style.transform();

        for (i, c) in text.chars().enumerate() {
            let origin = i as i32 * font::ADVANCE as i32 * scale;
            for (row, bits) in font::glyph(c).iter().enumerate() {
                for col in 0..3 {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            let x = origin + col * scale + sx + dx;
                            let y = row as i32 * scale + sy + dy;
                            let (x, y) = trans.transform(x, y);
                            self.draw_pixel((pos.0 + x, pos.1 + y), color)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// One panel of the loss figure.
struct Panel<'a> {
    title: &'a str,
    values: &'a [f32],
    color: RGBColor,
}

/// Two vertically stacked line plots sharing the x-axis (report index * `step_interval`).
pub fn render_loss_plot(
    dis_losses: &[f32],
    gen_losses: &[f32],
    step_interval: usize,
) -> Result<Canvas> {
    let mut canvas = Canvas::new(WIDTH, 2 * PANEL_HEIGHT);
    let panels = [
        Panel {
            title: "Discriminator loss",
            values: dis_losses,
            color: DIS_COLOR,
        },
        Panel {
            title: "Generator loss",
            values: gen_losses,
            color: GEN_COLOR,
        },
    ];
    {
        let root = canvas.backend().into_drawing_area();
        for (area, panel) in root.split_evenly((2, 1)).iter().zip(&panels) {
            draw_panel(area, panel, step_interval)
                .map_err(|e| GanError::Plot(e.to_string()))?;
        }
    }
    Ok(canvas)
}

fn value_range(values: &[f32]) -> (f32, f32) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi {
        (0.0, 1.0)
    } else if hi - lo < 1e-6 {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    step_interval: usize,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (y_min, y_max) = value_range(panel.values);
    let x_max = (panel.values.len().saturating_sub(1).max(1) * step_interval) as f32;

    let mut chart = ChartBuilder::on(area)
        .caption(panel.title, ("sans-serif", CAPTION_SIZE).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0f32..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_labels(6)
        .y_labels(6)
        .x_desc("step")
        .y_desc("loss")
        .label_style(("sans-serif", LABEL_SIZE).into_font())
        .axis_desc_style(("sans-serif", LABEL_SIZE).into_font())
        .x_label_formatter(&|x| format!("{}", x.round() as u64))
        .y_label_formatter(&|y| format!("{y:.2}"))
        .draw()?;

    let points = panel
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| ((i * step_interval) as f32, v));
    chart.draw_series(LineSeries::new(points, panel.color.stroke_width(2)))?;
    Ok(())
}

/// 3x5 bitmap font, uppercase only. Each row is 3 bits, MSB on the left.
mod font {
    pub const ADVANCE: u32 = 4;
    pub const HEIGHT: u32 = 5;

    pub fn glyph(c: char) -> [u8; 5] {
        match c.to_ascii_uppercase() {
            '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
            '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
            '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
            '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
            '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
            '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
            '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
            '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
            '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
            '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
            '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
            '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
            'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
            'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
            'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
            'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
            'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
            'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
            'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
            'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
            'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
            'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
            'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
            'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
            'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
            'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
            'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
            'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
            'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
            'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
            'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
            'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
            'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
            'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
            'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
            'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
            'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
            'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
            _ => [0; 5],
        }
    }
}
