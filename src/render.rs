// Rendering sink: draws a ResolvedChart onto a canvas and tracks the
// live chart bound to each canvas identity, releasing the previous
// one before a new draw.

use anyhow::{anyhow, Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::palette::ColorPalette;
use crate::resolve::ResolvedChart;

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
        }
    }
}

/// A chart currently drawn on some canvas, with its encoded image kept
/// for the download/export path.
#[derive(Debug, Clone)]
pub struct ChartHandle {
    pub chart: ResolvedChart,
    pub image: Vec<u8>,
    pub format: OutputFormat,
}

/// Tracks the live chart per canvas identity. Canvases are a scarce
/// per-page resource; the registry guarantees at most one live chart
/// per identity by releasing the previous handle before every draw.
#[derive(Debug, Default)]
pub struct ChartRegistry {
    charts: HashMap<String, ChartHandle>,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a chart on the given canvas identity. Any chart already
    /// bound there is released first, on the failure path too.
    pub fn render_chart(
        &mut self,
        canvas_id: &str,
        chart: ResolvedChart,
        options: &RenderOptions,
    ) -> Result<()> {
        if self.dispose(canvas_id) {
            debug!(canvas = canvas_id, "released previous chart");
        }
        let image = encode_chart(&chart, options)?;
        self.charts.insert(
            canvas_id.to_string(),
            ChartHandle {
                chart,
                image,
                format: options.format.clone(),
            },
        );
        Ok(())
    }

    /// Release the chart bound to a canvas identity, if any.
    pub fn dispose(&mut self, canvas_id: &str) -> bool {
        self.charts.remove(canvas_id).is_some()
    }

    pub fn get(&self, canvas_id: &str) -> Option<&ChartHandle> {
        self.charts.get(canvas_id)
    }

    /// Encoded image bytes of the live chart, for download.
    pub fn export_image(&self, canvas_id: &str) -> Option<&[u8]> {
        self.charts.get(canvas_id).map(|handle| handle.image.as_slice())
    }

    pub fn live_count(&self) -> usize {
        self.charts.len()
    }
}

/// Encode a chart in the requested output format.
pub fn encode_chart(chart: &ResolvedChart, options: &RenderOptions) -> Result<Vec<u8>> {
    match options.format {
        OutputFormat::Png => render_png(chart, options),
        OutputFormat::Svg => render_svg(chart, options).map(String::into_bytes),
    }
}

/// Draw to an RGB buffer and encode as PNG.
pub fn render_png(chart: &ResolvedChart, options: &RenderOptions) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; (options.width * options.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (options.width, options.height))
            .into_drawing_area();
        draw_chart(&root, chart)?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(
                &buffer,
                options.width,
                options.height,
                image::ColorType::Rgb8,
            )
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

/// Draw into an SVG document.
pub fn render_svg(chart: &ResolvedChart, options: &RenderOptions) -> Result<String> {
    let mut svg = String::new();
    {
        let root =
            SVGBackend::with_string(&mut svg, (options.width, options.height)).into_drawing_area();
        draw_chart(&root, chart)?;
    }
    Ok(svg)
}

fn draw_chart<DB>(root: &DrawingArea<DB, Shift>, chart: &ResolvedChart) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match chart.kind.as_str() {
        "pie" => draw_pie(root, chart)?,
        "line" => draw_line(root, chart)?,
        // Unknown kinds fall back to bars rather than failing the draw.
        _ => draw_bars(root, chart)?,
    }

    root.present().context("Failed to present drawing")?;
    Ok(())
}

fn draw_bars<DB>(root: &DrawingArea<DB, Shift>, chart: &ResolvedChart) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let num_categories = chart.labels.len();
    let (y_min, y_max) = value_range(chart);

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(10)
        .caption(chart_title(chart), ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50);
    let mut ctx = builder
        .build_cartesian_2d(0.0..num_categories as f64, y_min..y_max)
        .context("Failed to build chart")?;

    let labels = chart.labels.clone();
    ctx.configure_mesh()
        .x_labels(num_categories)
        .x_label_formatter(&|x| {
            let idx = *x as usize;
            labels.get(idx).cloned().unwrap_or_default()
        })
        .draw()
        .context("Failed to draw mesh")?;

    // Side-by-side series within each category slot.
    let num_series = chart.series.len().max(1);
    let bar_width = 0.8 / num_series as f64;
    for (series_idx, series) in chart.series.iter().enumerate() {
        let color = parse_color(&series.color);
        for (cat_idx, &value) in series.values.iter().enumerate() {
            let x_offset = (series_idx as f64 - (num_series as f64 - 1.0) / 2.0) * bar_width;
            let x_center = cat_idx as f64 + 0.5 + x_offset;
            ctx.draw_series(std::iter::once(Rectangle::new(
                [
                    (x_center - bar_width / 2.0, 0.0),
                    (x_center + bar_width / 2.0, value),
                ],
                color.filled(),
            )))
            .context("Failed to draw bar")?;
        }
    }

    Ok(())
}

fn draw_line<DB>(root: &DrawingArea<DB, Shift>, chart: &ResolvedChart) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let num_categories = chart.labels.len();
    let (y_min, y_max) = value_range(chart);

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(10)
        .caption(chart_title(chart), ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50);
    let mut ctx = builder
        .build_cartesian_2d(0.0..num_categories as f64, y_min..y_max)
        .context("Failed to build chart")?;

    let labels = chart.labels.clone();
    ctx.configure_mesh()
        .x_labels(num_categories)
        .x_label_formatter(&|x| {
            let idx = *x as usize;
            labels.get(idx).cloned().unwrap_or_default()
        })
        .draw()
        .context("Failed to draw mesh")?;

    for series in &chart.series {
        let color = parse_color(&series.color);
        let points: Vec<(f64, f64)> = series
            .values
            .iter()
            .enumerate()
            .map(|(idx, &value)| (idx as f64 + 0.5, value))
            .collect();
        ctx.draw_series(LineSeries::new(points, color.stroke_width(2)))
            .context("Failed to draw line series")?;
    }

    Ok(())
}

fn draw_pie<DB>(root: &DrawingArea<DB, Shift>, chart: &ResolvedChart) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let series = chart
        .series
        .first()
        .ok_or_else(|| anyhow!("Pie chart requires at least one series"))?;
    let total: f64 = series.values.iter().sum();
    if total <= 0.0 {
        anyhow::bail!("Pie chart requires a positive value total");
    }

    let (width, height) = root.dim_in_pixel();
    let center = ((width / 2) as i32, (height / 2) as i32);
    let radius = f64::from(width.min(height)) * 0.35;

    // One slice per label; colors come from the default palette since
    // series styling is a single color, not one per slice.
    let palette = ColorPalette::category10();
    let colors: Vec<RGBColor> = (0..chart.labels.len())
        .map(|idx| parse_color(&palette.color_for(idx)))
        .collect();

    let pie = Pie::new(&center, &radius, &series.values, &colors, &chart.labels);
    root.draw(&pie).context("Failed to draw pie")?;
    Ok(())
}

fn chart_title(chart: &ResolvedChart) -> String {
    chart
        .options
        .title
        .as_ref()
        .filter(|title| title.display)
        .map(|title| title.text.clone())
        .unwrap_or_default()
}

fn value_range(chart: &ResolvedChart) -> (f64, f64) {
    let mut min = 0.0f64;
    let mut max = 0.0f64;
    for series in &chart.series {
        for &value in &series.values {
            min = f64::min(min, value);
            max = f64::max(max, value);
        }
    }

    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

/// Parse a color string to RGBColor. Hex and a few CSS names are
/// recognized; anything else falls back to the default series blue.
fn parse_color(spec: &str) -> RGBColor {
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() == 6 {
            if let Ok(value) = u32::from_str_radix(hex, 16) {
                return RGBColor((value >> 16) as u8, (value >> 8) as u8, value as u8);
            }
        }
    }
    match spec {
        "red" => RED,
        "green" => GREEN,
        "blue" => BLUE,
        "black" => BLACK,
        "yellow" => YELLOW,
        "cyan" => CYAN,
        "magenta" => MAGENTA,
        "white" => WHITE,
        _ => RGBColor(31, 119, 180),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::ChartOptions;
    use crate::resolve::{AggregationMode, ResolvedSeries};

    fn make_chart(kind: &str) -> ResolvedChart {
        ResolvedChart {
            kind: kind.to_string(),
            labels: vec!["NY".to_string(), "LA".to_string()],
            series: vec![ResolvedSeries {
                name: "sales".to_string(),
                values: vec![15.0, 7.0],
                color: "#1f77b4".to_string(),
                mode: AggregationMode::Raw,
            }],
            options: ChartOptions::default(),
        }
    }

    fn is_png(bytes: &[u8]) -> bool {
        bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
    }

    #[test]
    fn test_render_png_bar() {
        let bytes = render_png(&make_chart("bar"), &RenderOptions::default()).unwrap();
        assert!(is_png(&bytes));
    }

    #[test]
    fn test_render_png_line_and_pie() {
        assert!(is_png(
            &render_png(&make_chart("line"), &RenderOptions::default()).unwrap()
        ));
        assert!(is_png(
            &render_png(&make_chart("pie"), &RenderOptions::default()).unwrap()
        ));
    }

    #[test]
    fn test_unknown_kind_falls_back_to_bars() {
        let bytes = render_png(&make_chart("mystery"), &RenderOptions::default()).unwrap();
        assert!(is_png(&bytes));
    }

    #[test]
    fn test_render_svg() {
        let svg = render_svg(&make_chart("bar"), &RenderOptions::default()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_pie_rejects_zero_total() {
        let mut chart = make_chart("pie");
        chart.series[0].values = vec![0.0, 0.0];
        assert!(render_png(&chart, &RenderOptions::default()).is_err());
    }

    #[test]
    fn test_registry_releases_previous_chart() {
        let mut registry = ChartRegistry::new();
        let options = RenderOptions::default();

        registry
            .render_chart("insights", make_chart("bar"), &options)
            .unwrap();
        assert_eq!(registry.live_count(), 1);

        registry
            .render_chart("insights", make_chart("line"), &options)
            .unwrap();
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.get("insights").unwrap().chart.kind, "line");
    }

    #[test]
    fn test_registry_dispose_and_export() {
        let mut registry = ChartRegistry::new();
        let options = RenderOptions::default();

        assert!(registry.export_image("insights").is_none());
        registry
            .render_chart("insights", make_chart("bar"), &options)
            .unwrap();
        assert!(is_png(registry.export_image("insights").unwrap()));

        assert!(registry.dispose("insights"));
        assert!(!registry.dispose("insights"));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#336699"), RGBColor(0x33, 0x66, 0x99));
        assert_eq!(parse_color("red"), RED);
        assert_eq!(parse_color("rgba(54,162,235,0.6)"), RGBColor(31, 119, 180));
    }
}
