//! Plotters drawing for each chart kind. Every function writes one PNG.

use std::error::Error;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::analysis::aggregation::{CountTable, Correlation, GroupMean, Histogram, YearMonthTrend};

type PlotResult = Result<(), Box<dyn Error>>;
type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

// --------------------------------------------------------
//  Constants
// --------------------------------------------------------
const PLOT_WIDTH: u32 = 1500;
const PLOT_HEIGHT: u32 = 800;
const TREND_PLOT_HEIGHT: u32 = 1600;
const HEATMAP_SIZE: u32 = 1500;
const PLOT_MARGIN: i32 = 20;
const FONT_SIZE_TITLE: u32 = 28;
const FONT_SIZE_CAPTION: u32 = 22;
const FONT_SIZE_AXIS: u32 = 16;
const FONT_SIZE_TICK: u32 = 13;

const GREY: RGBColor = RGBColor(128, 128, 128);
const PALETTE: [RGBColor; 9] = [
    RGBColor(0, 119, 182),   // Blue
    RGBColor(217, 72, 1),    // Orange
    RGBColor(0, 153, 136),   // Teal
    RGBColor(153, 0, 153),   // Purple
    RGBColor(230, 159, 0),   // Yellow
    RGBColor(86, 180, 233),  // Sky Blue
    RGBColor(213, 94, 0),    // Vermillion
    RGBColor(0, 158, 115),   // Bluish Green
    RGBColor(204, 121, 167), // Reddish Purple
];

fn colour(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

fn titled_root<'a>(output_path: &'a Path, size: (u32, u32), title: &str) -> Result<Area<'a>, Box<dyn Error>> {
    let root = BitMapBackend::new(output_path, size).into_drawing_area();
    root.fill(&WHITE)?;
    Ok(root.titled(title, ("sans-serif", FONT_SIZE_TITLE))?)
}

fn segment_label(labels: &[String], v: &SegmentValue<i32>) -> String {
    match v {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
            labels.get(*i as usize).cloned().unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    }
}

/// Value range with a little headroom; degenerate inputs get a unit range.
fn padded_range(values: impl IntoIterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (if include_zero && lo == 0.0 { 0.0 } else { lo - pad }, hi + pad)
}

/// Grouped bars: one bar per `(series, category)`, series side by side.
fn bar_panel(
    area: &Area,
    caption: &str,
    labels: &[String],
    series: &[(String, Vec<f64>)],
    x_desc: &str,
    y_desc: &str,
) -> PlotResult {
    let n = labels.len().max(1);
    let (_, y_max) = padded_range(series.iter().flat_map(|(_, v)| v.iter().copied()), true);

    let mut chart = ChartBuilder::on(area)
        .margin(PLOT_MARGIN)
        .caption(caption, ("sans-serif", FONT_SIZE_CAPTION))
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n as i32).into_segmented(), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|v: &SegmentValue<i32>| segment_label(labels, v))
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", FONT_SIZE_AXIS))
        .label_style(("sans-serif", FONT_SIZE_TICK))
        .draw()?;

    let groups = series.len().max(1);
    let (plot_width, _) = chart.plotting_area().dim_in_pixel();
    let slot = plot_width as f64 / n as f64 / groups as f64;

    for (g, (name, values)) in series.iter().enumerate() {
        let fill = colour(g);
        let left = (slot * g as f64) as u32 + 2;
        let right = (slot * (groups - g - 1) as f64) as u32 + 2;

        let anno = chart.draw_series(values.iter().enumerate().map(|(i, &v)| {
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(i as i32), 0.0),
                    (SegmentValue::Exact(i as i32 + 1), v),
                ],
                fill.filled(),
            );
            bar.set_margin(0, 0, left, right);
            bar
        }))?;

        if !name.is_empty() {
            anno.label(name.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], fill.filled()));
        }
    }

    if series.iter().any(|(name, _)| !name.is_empty()) {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()?;
    }
    Ok(())
}

/// A line over ordered labels, with an optional vertical marker at `marker`.
fn line_panel(
    area: &Area,
    caption: &str,
    labels: &[String],
    values: &[Option<f64>],
    y_desc: &str,
    stroke: RGBColor,
    marker: Option<usize>,
) -> PlotResult {
    let n = labels.len().max(1);
    let (y_lo, y_hi) = padded_range(values.iter().flatten().copied(), false);

    let mut chart = ChartBuilder::on(area)
        .margin(PLOT_MARGIN)
        .caption(caption, ("sans-serif", FONT_SIZE_CAPTION))
        .x_label_area_size(90)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n as i32).into_segmented(), y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_labels(n)
        .x_label_formatter(&|v: &SegmentValue<i32>| segment_label(labels, v))
        .x_label_style(
            ("sans-serif", FONT_SIZE_TICK)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", FONT_SIZE_AXIS))
        .draw()?;

    let points: Vec<(SegmentValue<i32>, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (SegmentValue::CenterOf(i as i32), v)))
        .collect();

    chart
        .draw_series(LineSeries::new(points.clone(), stroke.stroke_width(2)))?
        .label(y_desc)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], stroke.stroke_width(2)));
    chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, stroke.filled())))?;

    if let Some(at) = marker {
        let x = SegmentValue::CenterOf(at as i32);
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x.clone(), y_lo), (x, y_hi)],
            GREY.stroke_width(3),
        )))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;
    Ok(())
}

pub fn draw_count_chart(output_path: &Path, title: &str, column: &str, table: &CountTable) -> PlotResult {
    let root = titled_root(output_path, (PLOT_WIDTH, PLOT_HEIGHT), title)?;

    let series: Vec<(String, Vec<f64>)> = table
        .hues
        .iter()
        .zip(table.counts.iter())
        .map(|(hue, counts)| (hue.clone(), counts.iter().map(|&c| c as f64).collect()))
        .collect();
    bar_panel(&root, "", &table.categories, &series, column, "count")?;

    root.present()?;
    Ok(())
}

/// One panel per averaged value, side by side.
pub fn draw_mean_bars(
    output_path: &Path,
    title: &str,
    category: &str,
    panels: &[(String, Vec<GroupMean>)],
) -> PlotResult {
    let root = titled_root(output_path, (PLOT_WIDTH, PLOT_HEIGHT), title)?;
    let areas = root.split_evenly((1, panels.len().max(1)));

    for ((caption, means), area) in panels.iter().zip(areas.iter()) {
        let labels: Vec<String> = means.iter().map(|m| m.key.clone()).collect();
        let values: Vec<f64> = means.iter().map(|m| m.mean.unwrap_or(0.0)).collect();
        bar_panel(
            area,
            caption,
            &labels,
            &[(String::new(), values)],
            category,
            &format!("mean {caption}"),
        )?;
    }

    root.present()?;
    Ok(())
}

/// Monthly mean on top, month-over-month change of the total below.
pub fn draw_year_month_trend(
    output_path: &Path,
    title: &str,
    value: &str,
    trend: &YearMonthTrend,
) -> PlotResult {
    let root = titled_root(output_path, (PLOT_WIDTH, TREND_PLOT_HEIGHT), title)?;
    let areas = root.split_evenly((2, 1));

    let means: Vec<Option<f64>> = trend.means.iter().map(|&m| Some(m)).collect();
    line_panel(
        &areas[0],
        &format!("Average {value}"),
        &trend.labels,
        &means,
        value,
        colour(0),
        None,
    )?;
    line_panel(
        &areas[1],
        &format!("{value} Percent Change"),
        &trend.labels,
        &trend.pct_change,
        value,
        colour(7),
        None,
    )?;

    root.present()?;
    Ok(())
}

pub fn draw_competition_effect(
    output_path: &Path,
    title: &str,
    store_id: i64,
    trend: &YearMonthTrend,
    marker: Option<usize>,
) -> PlotResult {
    let root = titled_root(output_path, (PLOT_WIDTH, PLOT_HEIGHT), title)?;
    let means: Vec<Option<f64>> = trend.means.iter().map(|&m| Some(m)).collect();
    line_panel(
        &root,
        &format!("Store {store_id}"),
        &trend.labels,
        &means,
        "Sales",
        colour(0),
        marker,
    )?;
    root.present()?;
    Ok(())
}

/// Bins outside `clip` are cut at the axis edge.
pub fn draw_histogram(
    output_path: &Path,
    title: &str,
    column: &str,
    hist: &Histogram,
    clip: (f64, f64),
) -> PlotResult {
    let root = titled_root(output_path, (PLOT_WIDTH, PLOT_HEIGHT), title)?;
    let (_, y_max) = padded_range(hist.counts.iter().map(|&c| c as f64), true);

    let mut chart = ChartBuilder::on(&root)
        .margin(PLOT_MARGIN)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(clip.0..clip.1, 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(column)
        .y_desc("Frequency")
        .axis_desc_style(("sans-serif", FONT_SIZE_AXIS))
        .draw()?;

    let fill = colour(0);
    chart.draw_series((0..hist.counts.len()).filter_map(|bin| {
        let (x0, x1) = hist.edges(bin);
        let (x0, x1) = (x0.max(clip.0), x1.min(clip.1));
        (x0 < x1).then(|| {
            Rectangle::new([(x0, 0.0), (x1, hist.counts[bin] as f64)], fill.mix(0.8).filled())
        })
    }))?;

    root.present()?;
    Ok(())
}

pub fn draw_scatter(
    output_path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    points: &[(f64, f64)],
) -> PlotResult {
    let root = titled_root(output_path, (PLOT_WIDTH, PLOT_HEIGHT), title)?;
    let (x_lo, x_hi) = padded_range(points.iter().map(|p| p.0), false);
    let (y_lo, y_hi) = padded_range(points.iter().map(|p| p.1), false);

    let mut chart = ChartBuilder::on(&root)
        .margin(PLOT_MARGIN)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", FONT_SIZE_AXIS))
        .draw()?;

    let fill = colour(0);
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, fill.mix(0.6).filled())))?;

    root.present()?;
    Ok(())
}

/// Diverging blue-white-red scale over [-1, 1]; NaN cells are grey.
fn correlation_colour(r: f64) -> RGBColor {
    if !r.is_finite() {
        return RGBColor(200, 200, 200);
    }
    let r = r.clamp(-1.0, 1.0);
    let (target, t) = if r >= 0.0 {
        ((180.0, 4.0, 38.0), r)
    } else {
        ((59.0, 76.0, 192.0), -r)
    };
    let lerp = |to: f64| (255.0 + (to - 255.0) * t).round() as u8;
    RGBColor(lerp(target.0), lerp(target.1), lerp(target.2))
}

pub fn draw_heatmap(output_path: &Path, title: &str, corr: &Correlation) -> PlotResult {
    let root = titled_root(output_path, (HEATMAP_SIZE, HEATMAP_SIZE), title)?;
    let p = corr.names.len().max(1);
    let reversed: Vec<String> = corr.names.iter().rev().cloned().collect();

    let mut chart = ChartBuilder::on(&root)
        .margin(PLOT_MARGIN)
        .x_label_area_size(180)
        .y_label_area_size(180)
        .build_cartesian_2d((0..p as i32).into_segmented(), (0..p as i32).into_segmented())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(p)
        .y_labels(p)
        .x_label_formatter(&|v: &SegmentValue<i32>| segment_label(&corr.names, v))
        .y_label_formatter(&|v: &SegmentValue<i32>| segment_label(&reversed, v))
        .x_label_style(
            ("sans-serif", FONT_SIZE_TICK)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .draw()?;

    let names = corr.names.len();
    chart.draw_series((0..names).flat_map(|i| {
        (0..names).map(move |j| {
            let row = (names - 1 - i) as i32;
            let col = j as i32;
            Rectangle::new(
                [
                    (SegmentValue::Exact(col), SegmentValue::Exact(row)),
                    (SegmentValue::Exact(col + 1), SegmentValue::Exact(row + 1)),
                ],
                correlation_colour(corr.matrix[[i, j]]).filled(),
            )
        })
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_never_collapse() {
        assert_eq!(padded_range(Vec::<f64>::new(), true), (0.0, 1.0));
        assert_eq!(padded_range(vec![5.0], false), (4.0, 6.0));
        let (lo, hi) = padded_range(vec![0.0, 10.0], true);
        assert_eq!(lo, 0.0);
        assert!(hi > 10.0);
    }

    #[test]
    fn correlation_scale_endpoints() {
        let rgb = |r: f64| {
            let c = correlation_colour(r);
            (c.0, c.1, c.2)
        };
        assert_eq!(rgb(0.0), (255, 255, 255));
        assert_eq!(rgb(1.0), (180, 4, 38));
        assert_eq!(rgb(-1.0), (59, 76, 192));
        assert_eq!(rgb(f64::NAN), (200, 200, 200));
    }

    #[test]
    fn segment_labels_follow_index() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(segment_label(&labels, &SegmentValue::CenterOf(1)), "b");
        assert_eq!(segment_label(&labels, &SegmentValue::Last), "");
        assert_eq!(segment_label(&labels, &SegmentValue::Exact(5)), "");
    }
}
