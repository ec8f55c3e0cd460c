use crate::{ScoreCategory, Scores, MAX_SCORE};

/// Radar chart series for one candidate: the five categories in fixed order,
/// followed by the first point again so renderers can close the polygon.
pub fn radar_series(scores: &Scores) -> Vec<(&'static str, u8)> {
    let mut series: Vec<(&'static str, u8)> = scores
        .iter()
        .map(|(cat, value)| (cat.label(), value))
        .collect();
    if let Some(first) = series.first().copied() {
        series.push(first);
    }
    series
}

/// Plain-text stand-in for the radar chart, one bar per category.
///
/// `width` is the bar length for a score of 100.
pub fn render_bars(scores: &Scores, width: usize) -> String {
    let mut out = String::with_capacity(ScoreCategory::ALL.len() * (width + 16));
    for (cat, value) in scores.iter() {
        let filled = (value as usize * width + MAX_SCORE as usize / 2) / MAX_SCORE as usize;
        out.push_str(cat.label());
        out.push(' ');
        out.push_str(&"█".repeat(filled));
        out.push_str(&"·".repeat(width.saturating_sub(filled)));
        out.push_str(&format!(" {value:>3}\n"));
    }
    out
}
