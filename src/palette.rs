/// Default color assignment for series that arrive without styling.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<&'static str>,
}

impl ColorPalette {
    /// The d3 category10 palette.
    pub fn category10() -> Self {
        Self {
            colors: vec![
                "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2",
                "#7f7f7f", "#bcbd22", "#17becf",
            ],
        }
    }

    /// Color for the n-th series, cycling past the palette end.
    pub fn color_for(&self, index: usize) -> String {
        self.colors[index % self.colors.len()].to_string()
    }
}
