use crate::config::GanConfig;
use crate::error::Result;
use crate::plot::render_loss_plot;
use image::{GrayImage, Luma};
use indicatif::ProgressBar;
use ndarray::prelude::*;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Pixels between and around tiles of a sample grid.
const GRID_PADDING: u32 = 2;

/// Loss values sampled at every report event.
///
/// Grows by one entry per report: with 60k samples, batches of 60 and a report every
/// 250 batches that is 4 entries per epoch, a few hundred for a 100 epoch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossHistory {
    pub discriminator: Vec<f32>,
    pub generator: Vec<f32>,
}

impl LossHistory {
    pub fn push(&mut self, dis_loss: f32, gen_loss: f32) {
        self.discriminator.push(dis_loss);
        self.generator.push(gen_loss);
    }

    pub fn len(&self) -> usize {
        self.discriminator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discriminator.is_empty()
    }
}

/// Where a report was triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPosition {
    pub epoch: usize,
    pub epochs: usize,
    pub batch: usize,
    pub batches: usize,
}

pub fn status_line(position: &ReportPosition, dis_loss: f32, gen_loss: f32) -> String {
    format!(
        "[Epoch {}/{}] [Batch {}/{}] [Dis loss: {:.6}] [Gen loss: {:.6}]",
        position.epoch, position.epochs, position.batch, position.batches, dis_loss, gen_loss
    )
}

/// Tile the first `count` images of `batch` into a grid with `columns` tiles per row.
/// Pixels are clamped to [0, 1] before being mapped to 0..=255.
pub fn sample_grid(batch: ArrayView3<f32>, count: usize, columns: usize) -> GrayImage {
    let (len, h, w) = batch.dim();
    let count = count.min(len);
    let columns = columns.max(1).min(count.max(1));
    let rows = count.div_ceil(columns).max(1);
    let (h, w) = (h as u32, w as u32);

    let grid_w = columns as u32 * (w + GRID_PADDING) + GRID_PADDING;
    let grid_h = rows as u32 * (h + GRID_PADDING) + GRID_PADDING;
    let mut grid = GrayImage::new(grid_w, grid_h);

    for (k, image) in batch.outer_iter().take(count).enumerate() {
        let x0 = GRID_PADDING + (k % columns) as u32 * (w + GRID_PADDING);
        let y0 = GRID_PADDING + (k / columns) as u32 * (h + GRID_PADDING);
        for ((r, c), &v) in image.indexed_iter() {
            let level = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            grid.put_pixel(x0 + c as u32, y0 + r as u32, Luma([level]));
        }
    }
    grid
}

/// Periodic reporting: loss bookkeeping, console status, sample grids and loss plots.
///
/// Artifact writes are best effort. A failed write is logged and the run goes on.
/// Console lines are written with the progress bar suspended, so they show up even
/// when the bar itself is hidden (e.g. output redirected to a file).
pub struct Reporter {
    console: Box<dyn Write + Send>,
    samples_dir: PathBuf,
    plots_dir: PathBuf,
    loss_csv: Option<File>,
    grid_size: usize,
    grid_columns: usize,
    report_every: usize,
    counter: usize,
    history: LossHistory,
}

impl Reporter {
    pub fn new(config: &GanConfig) -> Result<Reporter> {
        Reporter::with_console(config, Box::new(io::stdout()))
    }

    pub fn with_console(config: &GanConfig, console: Box<dyn Write + Send>) -> Result<Reporter> {
        fs::create_dir_all(&config.samples_dir)?; // in case the folder does not exist
        fs::create_dir_all(&config.plots_dir)?;

        let loss_csv = match &config.loss_csv {
            Some(path) => {
                // Create or truncate CSV file and write header
                let mut csv_file = File::create(path)?;
                writeln!(csv_file, "report,epoch,batch,dis_loss,gen_loss")?;
                Some(csv_file)
            }
            None => None,
        };

        Ok(Reporter {
            console,
            samples_dir: config.samples_dir.clone(),
            plots_dir: config.plots_dir.clone(),
            loss_csv,
            grid_size: config.grid_size,
            grid_columns: config.grid_columns,
            report_every: config.report_every,
            counter: 0,
            history: LossHistory::default(),
        })
    }

    /// Reports happen on batches 0, every, 2 * every, ... of each epoch.
    pub fn is_due(&self, batch: usize) -> bool {
        batch % self.report_every == 0
    }

    /// Print one line to the console without tearing the progress bar.
    pub fn log(&mut self, pb: &ProgressBar, line: &str) {
        let console = &mut self.console;
        pb.suspend(|| {
            // nowhere left to report a broken console
            let _ = writeln!(console, "{line}").and_then(|_| console.flush());
        });
    }

    fn warn(&mut self, pb: &ProgressBar, path: &Path, e: impl std::fmt::Display) {
        self.log(pb, &format!("[WARN] failed to write {}: {e}", path.display()));
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    /// Number of report events so far; also the index of the next artifact files.
    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn sample_path(&self, k: usize) -> PathBuf {
        self.samples_dir.join(format!("im{k}.png"))
    }

    pub fn plot_path(&self, k: usize) -> PathBuf {
        self.plots_dir.join(format!("loss{k}.png"))
    }

    pub fn report(
        &mut self,
        position: &ReportPosition,
        dis_loss: f32,
        gen_loss: f32,
        fake_batch: &Array3<f32>,
        pb: &ProgressBar,
    ) {
        self.history.push(dis_loss, gen_loss);
        self.log(pb, &status_line(position, dis_loss, gen_loss));

        let k = self.counter;
        let grid = sample_grid(fake_batch.view(), self.grid_size, self.grid_columns);
        let sample_path = self.sample_path(k);
        if let Err(e) = grid.save(&sample_path) {
            self.warn(pb, &sample_path, e);
        }

        // the canvas is dropped as soon as it is saved
        let plot_path = self.plot_path(k);
        let plotted = render_loss_plot(
            &self.history.discriminator,
            &self.history.generator,
            self.report_every,
        )
        .and_then(|canvas| canvas.save(&plot_path));
        if let Err(e) = plotted {
            self.warn(pb, &plot_path, e);
        }

        if let Some(csv_file) = self.loss_csv.as_mut() {
            let written = writeln!(
                csv_file,
                "{},{},{},{:.6},{:.6}",
                k, position.epoch, position.batch, dis_loss, gen_loss
            )
            .and_then(|_| csv_file.flush());
            if let Err(e) = written {
                self.log(pb, &format!("[WARN] failed to append loss csv row: {e}"));
            }
        }

        self.counter += 1;
    }
}
