use std::ffi::OsStr;
use std::fs;
use std::ops::{Range, RangeInclusive};
use std::path::Path;

use approx::relative_eq;
use log::debug;
use plotters::coord::ranged1d::{DefaultFormatting, KeyPointHint};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use resvg::{tiny_skia, usvg};

use crate::error::{Error, Result};
use crate::table::Table;

/// Series colors, cycled in input size order.
const PALETTE: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

const FONT: &str = "sans-serif";

/// How the chart looks.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartOptions {
    /// The caption above the plot.
    pub title: String,
    /// The x axis description.
    pub x_label: String,
    /// The y axis description.
    pub y_label: String,
    /// The heading of the legend.
    pub legend_title: String,
    /// The image width, in pixels.
    pub width: u32,
    /// The image height, in pixels.
    pub height: u32,
    /// The thread counts which get a tick on the x axis.
    pub x_ticks: RangeInclusive<u32>,
    /// Whether to draw grid lines.
    pub grid: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        ChartOptions {
            title: "Execution Time vs Number of Threads".to_string(),
            x_label: "Number of Threads".to_string(),
            y_label: "Execution Time (seconds)".to_string(),
            legend_title: "Input Size".to_string(),
            width: 1000,
            height: 600,
            x_ticks: 1..=8,
            grid: true,
        }
    }
}

/// The legend entry for the series of a given input size.
pub fn series_label(size: u64) -> String {
    format!("{} elements", size)
}

/// The x axis bounds: the tick range, widened to cover every recorded thread count, plus a margin.
pub(crate) fn x_bounds(table: &Table, ticks: &RangeInclusive<u32>) -> (f64, f64) {
    let (mut lo, mut hi) = (f64::from(*ticks.start()), f64::from(*ticks.end()));
    if let Some((min, max)) = table.threads_range() {
        lo = lo.min(min.into());
        hi = hi.max(max.into());
    }
    if relative_eq!(lo, hi) {
        hi = lo + 1.0;
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// The y axis bounds: from zero (or below, for negative times) to just above the largest time.
pub(crate) fn y_bounds(table: &Table) -> (f64, f64) {
    let (lo, hi) = match table.elapsed_range() {
        Some((min, max)) => (min.min(0.0), max.max(0.0)),
        None => (0.0, 1.0),
    };
    let hi = if relative_eq!(lo, hi) { lo + 1.0 } else { hi };
    (lo, hi + (hi - lo) * 0.05)
}

/// A linear thread-count axis whose key points are exactly the configured ticks.
#[derive(Clone)]
struct ThreadAxis {
    coord: RangedCoordf64,
    ticks: Vec<f64>,
}

impl ThreadAxis {
    fn new(bounds: Range<f64>, ticks: &RangeInclusive<u32>) -> ThreadAxis {
        ThreadAxis { coord: bounds.into(), ticks: ticks.clone().map(f64::from).collect() }
    }
}

impl Ranged for ThreadAxis {
    type FormatOption = DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.coord.map(value, limit)
    }

    fn key_points<Hint: KeyPointHint>(&self, _hint: Hint) -> Vec<f64> {
        self.ticks.clone()
    }

    fn range(&self) -> Range<f64> {
        self.coord.range()
    }
}

fn draw_err(e: impl std::fmt::Display) -> Error {
    Error::Draw(e.to_string())
}

/// Draw the chart as an SVG document.
///
/// Each input size becomes one line with a marker at every recorded thread count, colored in
/// ascending size order. An empty table yields axes and a title but no series or legend.
pub fn render_svg(table: &Table, options: &ChartOptions) -> Result<String> {
    let mut svg = String::new();
    {
        let root =
            SVGBackend::with_string(&mut svg, (options.width, options.height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let (x_lo, x_hi) = x_bounds(table, &options.x_ticks);
        let (y_lo, y_hi) = y_bounds(table);

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, (FONT, 24).into_font())
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(64)
            .build_cartesian_2d(ThreadAxis::new(x_lo..x_hi, &options.x_ticks), y_lo..y_hi)
            .map_err(draw_err)?;

        let threads_label = |x: &f64| format!("{:.0}", x);
        let mut mesh = chart.configure_mesh();
        mesh.x_desc(options.x_label.as_str())
            .y_desc(options.y_label.as_str())
            .x_label_formatter(&threads_label)
            .label_style((FONT, 14).into_font());
        if !options.grid {
            mesh.disable_mesh();
        }
        mesh.draw().map_err(draw_err)?;

        if table.is_empty() {
            debug!("no measurements, drawing empty chart");
        } else {
            // An unmarked series heads the legend.
            chart
                .draw_series(std::iter::empty::<Circle<(f64, f64), i32>>())
                .map_err(draw_err)?
                .label(options.legend_title.as_str());
        }

        for (idx, (size, series)) in table.iter().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];
            let points: Vec<(f64, f64)> = series.map(|(t, e)| (f64::from(t), e)).collect();
            debug!("size {}: {} point(s)", size, points.len());

            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(draw_err)?
                .label(series_label(size))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 4, color.filled())))
                .map_err(draw_err)?;
        }

        if !table.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .label_font((FONT, 14).into_font())
                .draw()
                .map_err(draw_err)?;
        }

        root.present().map_err(draw_err)?;
    }
    Ok(svg)
}

/// Convert an SVG document to PNG bytes.
///
/// Text is set in whatever system fonts are available; if there are none, text is left out
/// rather than failing the conversion.
pub fn rasterize(svg: &str) -> Result<Vec<u8>> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    debug!("loaded {} font face(s)", options.fontdb.len());

    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| Error::Rasterize(e.to_string()))?;
    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        Error::Rasterize(format!("invalid canvas size {}x{}", size.width(), size.height()))
    })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    pixmap.encode_png().map_err(|e| Error::Rasterize(e.to_string()))
}

/// Render the chart and write it to `path`, replacing any existing file.
///
/// A `.svg` extension writes the SVG document; `.png` or no extension writes a PNG.
pub fn save(table: &Table, options: &ChartOptions, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let ext = path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase);
    let bytes = match ext.as_deref() {
        Some("svg") => render_svg(table, options)?.into_bytes(),
        Some("png") | None => rasterize(&render_svg(table, options)?)?,
        Some(_) => return Err(Error::UnsupportedFormat(path.to_path_buf())),
    };
    fs::write(path, &bytes).map_err(|source| Error::Write { path: path.to_path_buf(), source })?;
    debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
