//! Chart rendering using Plotters

use crate::stats::{CategoryBreakdown, ChurnSplit, CorrelationMatrix, Histogram};
use plotters::element::Pie;
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

/// Corporate palette
pub const POSITIVE: RGBColor = RGBColor(0x2E, 0xD3, 0xA7);
pub const NEGATIVE: RGBColor = RGBColor(0xFF, 0x9F, 0x43);
pub const PRIMARY: RGBColor = RGBColor(0x1F, 0x6A, 0xE1);
pub const TITLE: RGBColor = RGBColor(0x0A, 0x25, 0x40);
pub const CRITICAL: RGBColor = RGBColor(0xFF, 0x41, 0x36);

const RETAINED_LABEL: &str = "Retained";
const CHURNED_LABEL: &str = "Churned";

/// Turn a column name like `monthly_charges` into `Monthly Charges`
pub fn pretty_label(column: &str) -> String {
    column
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Label for an integer tick position, blank between categories
fn category_tick(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

fn path_str(path: &Path) -> crate::Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("Chart path is not valid UTF-8: {}", path.display()))
}

/// Pie of retained vs churned customers
pub fn create_churn_pie(retained: usize, churned: usize, output_path: &Path) -> crate::Result<()> {
    if retained + churned == 0 {
        anyhow::bail!("Cannot draw a churn pie for an empty table");
    }

    let root = BitMapBackend::new(path_str(output_path)?, (600, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Customers: retained vs churned", ("sans-serif", 26).into_font().color(&TITLE))?;

    let dims = root.dim_in_pixel();
    let center = (dims.0 as i32 / 2, dims.1 as i32 / 2);
    let radius = f64::from(dims.0.min(dims.1)) * 0.35;
    let sizes = vec![retained as f64, churned as f64];
    let colors = vec![POSITIVE, NEGATIVE];
    let labels = vec![RETAINED_LABEL, CHURNED_LABEL];

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 18).into_font().color(&TITLE));
    pie.percentages(("sans-serif", radius * 0.1).into_font().color(&WHITE));
    root.draw(&pie)?;

    root.present()?;
    info!(path = %output_path.display(), "churn pie saved");
    Ok(())
}

/// Stacked bars of retained/churned percentage per category
pub fn create_churn_bar(
    rows: &[CategoryBreakdown],
    column: &str,
    output_path: &Path,
) -> crate::Result<()> {
    if rows.is_empty() {
        anyhow::bail!("No categories to plot for '{}'", column);
    }

    let labels: Vec<String> = rows.iter().map(|r| r.category.clone()).collect();
    let n = rows.len() as f64;

    let root = BitMapBackend::new(path_str(output_path)?, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Churn rate by {}", pretty_label(column)),
            ("sans-serif", 26).into_font().color(&TITLE),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n - 0.5), 0f64..100f64)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(rows.len())
        .x_label_formatter(&|x| category_tick(&labels, *x))
        .x_desc(pretty_label(column))
        .y_desc("Percent (%)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            let x = i as f64;
            Rectangle::new([(x - 0.35, 0.0), (x + 0.35, row.retained_pct())], POSITIVE.filled())
        }))?
        .label(RETAINED_LABEL)
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], POSITIVE.filled()));

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            let x = i as f64;
            let base = row.retained_pct();
            Rectangle::new([(x - 0.35, base), (x + 0.35, base + row.churn_pct())], NEGATIVE.filled())
        }))?
        .label(CHURNED_LABEL)
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], NEGATIVE.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(TITLE)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "churn breakdown chart saved");
    Ok(())
}

/// Side-by-side bars of retained and churned customer counts per category
pub fn create_churn_count_bar(
    rows: &[CategoryBreakdown],
    column: &str,
    output_path: &Path,
) -> crate::Result<()> {
    if rows.is_empty() {
        anyhow::bail!("No categories to plot for '{}'", column);
    }

    let labels: Vec<String> = rows.iter().map(|r| r.category.clone()).collect();
    let n = rows.len() as f64;
    let max_count = rows
        .iter()
        .map(|r| r.retained.max(r.churned))
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let root = BitMapBackend::new(path_str(output_path)?, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Customers by {} and status", pretty_label(column)),
            ("sans-serif", 26).into_font().color(&TITLE),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n - 0.5), 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(rows.len())
        .x_label_formatter(&|x| category_tick(&labels, *x))
        .x_desc(pretty_label(column))
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            let x = i as f64;
            Rectangle::new([(x - 0.38, 0.0), (x - 0.02, row.retained as f64)], POSITIVE.filled())
        }))?
        .label(RETAINED_LABEL)
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], POSITIVE.filled()));

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            let x = i as f64;
            Rectangle::new([(x + 0.02, 0.0), (x + 0.38, row.churned as f64)], NEGATIVE.filled())
        }))?
        .label(CHURNED_LABEL)
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], NEGATIVE.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(TITLE)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "churn count chart saved");
    Ok(())
}

/// Overlaid histogram of a numeric column by churn status
pub fn create_histogram(
    hist: &Histogram,
    column: &str,
    title: Option<&str>,
    output_path: &Path,
) -> crate::Result<()> {
    let default_title = format!("Distribution of {}", pretty_label(column));
    let title = title.unwrap_or(&default_title);

    let x_min = hist.edges.first().copied().unwrap_or(0.0);
    let x_max = hist.edges.last().copied().unwrap_or(1.0);
    let y_max = (hist.max_count().max(1) as f64) * 1.1;

    let root = BitMapBackend::new(path_str(output_path)?, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 26).into_font().color(&TITLE))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc(pretty_label(column))
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (counts, color, label) in [
        (&hist.retained, POSITIVE, RETAINED_LABEL),
        (&hist.churned, NEGATIVE, CHURNED_LABEL),
    ] {
        chart
            .draw_series(counts.iter().enumerate().map(|(i, &count)| {
                Rectangle::new(
                    [(hist.edges[i], 0.0), (hist.edges[i + 1], count as f64)],
                    color.mix(0.6).filled(),
                )
            }))?
            .label(label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(TITLE)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "histogram saved");
    Ok(())
}

/// Bars of a metric's mean for retained vs churned customers
pub fn create_avg_metric_bar(
    means: &ChurnSplit<Option<f64>>,
    metric: &str,
    is_currency: bool,
    output_path: &Path,
) -> crate::Result<()> {
    let bars = [
        (RETAINED_LABEL, means.retained.unwrap_or(0.0), POSITIVE),
        (CHURNED_LABEL, means.churned.unwrap_or(0.0), NEGATIVE),
    ];
    let y_max = bars.iter().map(|b| b.1).fold(0.0, f64::max).max(1.0) * 1.2;
    let labels: Vec<String> = bars.iter().map(|b| b.0.to_string()).collect();

    let root = BitMapBackend::new(path_str(output_path)?, (600, 450)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Average {} by status", pretty_label(metric)),
            ("sans-serif", 24).into_font().color(&TITLE),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..1.5f64, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(2)
        .x_label_formatter(&|x| category_tick(&labels, *x))
        .y_desc(if is_currency { "$".to_string() } else { pretty_label(metric) })
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value, color))| {
        let x = i as f64;
        Rectangle::new([(x - 0.3, 0.0), (x + 0.3, *value)], color.filled())
    }))?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value, _))| {
        let text = if is_currency {
            format!("${:.0}", value)
        } else {
            format!("{:.1}", value)
        };
        Text::new(text, (i as f64 - 0.1, *value + y_max * 0.05), ("sans-serif", 16).into_font())
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "average metric chart saved");
    Ok(())
}

/// Map a correlation in [-1, 1] onto a red/white/blue diverging scale
fn diverging_color(r: f64) -> RGBColor {
    if r.is_nan() {
        return RGBColor(0xE6, 0xE9, 0xEF);
    }
    let t = r.clamp(-1.0, 1.0);
    let lerp = |a: u8, b: u8, f: f64| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    if t >= 0.0 {
        RGBColor(lerp(255, 178, t), lerp(255, 24, t), lerp(255, 43, t))
    } else {
        RGBColor(lerp(255, 33, -t), lerp(255, 102, -t), lerp(255, 172, -t))
    }
}

/// Heatmap of the correlation matrix with annotated cells
pub fn create_correlation_heatmap(matrix: &CorrelationMatrix, output_path: &Path) -> crate::Result<()> {
    let n = matrix.columns.len();
    if n == 0 {
        anyhow::bail!("No numeric columns to correlate");
    }
    let size = n as f64;

    let root = BitMapBackend::new(path_str(output_path)?, (800, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Correlation between numeric variables",
            ("sans-serif", 26).into_font().color(&TITLE),
        )
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(120)
        .build_cartesian_2d(-0.5f64..(size - 0.5), -0.5f64..(size - 0.5))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|x| category_tick(&matrix.columns, *x))
        .y_label_formatter(&|y| category_tick(&matrix.columns, *y))
        .draw()?;

    chart.draw_series((0..n).flat_map(|i| (0..n).map(move |j| (i, j))).map(|(i, j)| {
        let (x, y) = (j as f64, i as f64);
        Rectangle::new(
            [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
            diverging_color(matrix.values[[i, j]]).filled(),
        )
    }))?;

    chart.draw_series((0..n).flat_map(|i| (0..n).map(move |j| (i, j))).map(|(i, j)| {
        let r = matrix.values[[i, j]];
        let text = if r.is_nan() { "-".to_string() } else { format!("{:.2}", r) };
        Text::new(text, (j as f64 - 0.15, i as f64 + 0.1), ("sans-serif", 14).into_font())
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "correlation heatmap saved");
    Ok(())
}

/// Horizontal gauge of a churn probability with risk bands and a 50% marker
pub fn create_gauge_chart(probability: f64, reference_pct: f64, output_path: &Path) -> crate::Result<()> {
    let value = (probability * 100.0).clamp(0.0, 100.0);
    let delta = value - reference_pct;

    let root = BitMapBackend::new(path_str(output_path)?, (700, 300)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Churn probability: {:.1}% ({:+.1} vs {:.1})", value, delta, reference_pct),
            ("sans-serif", 24).into_font().color(&TITLE),
        )
        .margin(15)
        .x_label_area_size(40)
        .build_cartesian_2d(0f64..100f64, 0f64..1f64)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .disable_y_axis()
        .x_labels(11)
        .x_label_formatter(&|x| format!("{:.0}%", x))
        .draw()?;

    let bands = [(0.0, 30.0, POSITIVE), (30.0, 70.0, NEGATIVE), (70.0, 100.0, CRITICAL)];
    chart.draw_series(bands.iter().map(|(lo, hi, color)| {
        Rectangle::new([(*lo, 0.1), (*hi, 0.9)], color.mix(0.35).filled())
    }))?;

    chart.draw_series(std::iter::once(Rectangle::new(
        [(0.0, 0.35), (value, 0.65)],
        PRIMARY.filled(),
    )))?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![(50.0, 0.05), (50.0, 0.95)],
        RED.stroke_width(4),
    )))?;

    root.present()?;
    info!(path = %output_path.display(), "gauge chart saved");
    Ok(())
}
