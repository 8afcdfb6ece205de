use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser as _;
use log::{info, LevelFilter};
use plotlib::page::Page;
use plotlib::repr::Plot;
use plotlib::style::{PointMarker, PointStyle};
use plotlib::view::ContinuousView;

use benchplot::{ChartOptions, Parser, Table};

const MARKERS: [PointMarker; 3] = [PointMarker::Circle, PointMarker::Square, PointMarker::Cross];

#[derive(Debug, clap::Parser)]
#[command(version, about = "chart execution time against thread count for each input size")]
struct Opts {
    /// Path to the measurements file (`size | threads | elapsed` per line)
    #[arg(default_value = "times.txt")]
    input: PathBuf,

    /// Where to write the chart; a .svg extension writes SVG, anything else PNG
    #[arg(short, long, default_value = "benchmark_plot.png")]
    output: PathBuf,

    /// Field delimiter
    #[arg(short, long, default_value = "|", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Fail on lines with other than three fields instead of skipping them
    #[arg(long)]
    strict: bool,

    /// Chart title
    #[arg(long)]
    title: Option<String>,

    /// Image width in pixels
    #[arg(long, default_value_t = 1000)]
    width: u32,

    /// Image height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Leave out grid lines
    #[arg(long)]
    no_grid: bool,

    /// Print a preview of the chart to the terminal
    #[arg(long)]
    show: bool,

    /// More logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn parse_delimiter(s: &str) -> std::result::Result<u8, String> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(format!("expected a single ASCII character, got {:?}", s)),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose, opts.quiet);

    let table = Parser::new()
        .delimiter(opts.delimiter)
        .strict(opts.strict)
        .parse_path(&opts.input)
        .with_context(|| format!("couldn't parse {}", opts.input.display()))?;
    info!(
        "read {} measurement(s) for {} input size(s) from {}",
        table.len(),
        table.sizes().count(),
        opts.input.display()
    );

    let mut chart = ChartOptions {
        width: opts.width,
        height: opts.height,
        grid: !opts.no_grid,
        ..Default::default()
    };
    if let Some(title) = opts.title {
        chart.title = title;
    }

    benchplot::save(&table, &chart, &opts.output)
        .with_context(|| format!("couldn't save chart to {}", opts.output.display()))?;
    info!("wrote {}", opts.output.display());

    if opts.show {
        if table.is_empty() {
            info!("no measurements to preview");
        } else {
            println!("{}", preview(&table, &chart)?);
        }
    }

    Ok(())
}

fn preview(table: &Table, chart: &ChartOptions) -> Result<String> {
    let (lo, hi) = (f64::from(*chart.x_ticks.start()), f64::from(*chart.x_ticks.end()));
    let (x_min, x_max) = table
        .iter()
        .flat_map(|(_, series)| series.map(|(t, _)| f64::from(t)))
        .fold((lo, hi), |(min, max), t| (min.min(t), max.max(t)));
    let y_max = table
        .iter()
        .flat_map(|(_, series)| series.map(|(_, e)| e))
        .fold(0.0, f64::max);

    let mut view = ContinuousView::new()
        .x_range(x_min, x_max)
        .y_range(0.0, if y_max > 0.0 { y_max * 1.05 } else { 1.0 })
        .x_label(chart.x_label.clone())
        .y_label(chart.y_label.clone());
    for (idx, (size, series)) in table.iter().enumerate() {
        let points = series.map(|(t, e)| (f64::from(t), e)).collect();
        let plot = Plot::new(points)
            .point_style(PointStyle::new().marker(MARKERS[idx % MARKERS.len()].clone()))
            .legend(benchplot::series_label(size));
        view = view.add(plot);
    }

    Page::single(&view).dimensions(80, 30).to_text().map_err(|e| anyhow!("{}", e))
}
