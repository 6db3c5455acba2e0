use std::error::Error;
use std::fs;
use std::io;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::PlotError;
use crate::metrics::ConfusionMatrix;

/// Turns a confusion matrix into an image file.
pub trait PlotRenderer {
    fn render(&self, matrix: &ConfusionMatrix, title: &str, path: &Path) -> Result<(), PlotError>;
}

/// Heatmap of counts with class labels on both axes, drawn as a PNG.
#[derive(Debug, Clone, Copy)]
pub struct ConfusionMatrixPlot {
    pub size: (u32, u32),
}

impl Default for ConfusionMatrixPlot {
    fn default() -> Self {
        Self { size: (640, 480) }
    }
}

impl ConfusionMatrixPlot {
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_possible_wrap)]
    fn draw<DB>(
        root: &DrawingArea<DB, Shift>,
        matrix: &ConfusionMatrix,
        title: &str,
    ) -> Result<(), Box<dyn Error>>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let labels = matrix.labels();
        let classes = labels.len() as i32;
        let max_count = matrix.max_count().max(1) as f64;

        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0i32..classes, classes..0i32)?;

        let (plot_width, plot_height) = chart.plotting_area().dim_in_pixel();
        let cell_width = plot_width as i32 / classes;
        let cell_height = plot_height as i32 / classes;
        let label_of = |value: &i32| {
            usize::try_from(*value)
                .ok()
                .and_then(|i| labels.get(i))
                .cloned()
                .unwrap_or_default()
        };

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_labels(labels.len() + 1)
            .y_labels(labels.len() + 1)
            // ticks sit on cell edges; shift each label to its cell centre
            .x_label_offset(cell_width / 2)
            .y_label_offset(cell_height / 2)
            .x_label_formatter(&label_of)
            .y_label_formatter(&label_of)
            .x_desc("Predicted label")
            .y_desc("True label")
            .label_style(("sans-serif", 16))
            .draw()?;

        let cells: Vec<(i32, i32, usize)> = matrix
            .counts()
            .indexed_iter()
            .map(|((row, column), &count)| (column as i32, row as i32, count))
            .collect();

        chart.draw_series(cells.iter().map(|&(x, y, count)| {
            let intensity = count as f64 / max_count;
            Rectangle::new([(x, y), (x + 1, y + 1)], BLUE.mix(0.1 + 0.8 * intensity).filled())
        }))?;

        chart.draw_series(cells.iter().map(|&(x, y, count)| {
            let colour = if count as f64 / max_count > 0.5 { WHITE } else { BLACK };
            EmptyElement::at((x, y))
                + Text::new(
                    count.to_string(),
                    (cell_width / 2 - 6, cell_height / 2 - 8),
                    ("sans-serif", 18).into_font().color(&colour),
                )
        }))?;

        root.present()?;
        Ok(())
    }
}

impl PlotRenderer for ConfusionMatrixPlot {
    fn render(&self, matrix: &ConfusionMatrix, title: &str, path: &Path) -> Result<(), PlotError> {
        if matrix.labels().is_empty() {
            return Err(PlotError::EmptyMatrix);
        }

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        Self::draw(&root, matrix, title).map_err(|error| PlotError::Draw {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })
    }
}

/// Deletes the plot file left behind by a session. Returns whether a file
/// was removed.
pub fn remove_plot(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}
