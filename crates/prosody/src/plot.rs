//! Pitch comparison chart (PNG).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use recite_core::{PitchContour, PlotStyle, RecitationError, RecitationResult};
use tracing::{debug, warn};

const FONT_FAMILY: &str = "sans-serif";

const REFERENCE_COLOR: RGBColor = RGBColor(31, 119, 180);
const CANDIDATE_COLOR: RGBColor = RGBColor(255, 127, 14);

/// Common TrueType locations with Hebrew coverage.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONTS: Lazy<Mutex<FontRegistry>> = Lazy::new(|| Mutex::new(FontRegistry::default()));

fn plot_err(e: impl std::fmt::Display) -> RecitationError {
    RecitationError::Plot(e.to_string())
}

type FontCache = HashMap<PathBuf, &'static [u8]>;

/// Label font registered with plotters, keyed by the file it came from.
#[derive(Default)]
struct FontRegistry {
    active: Option<PathBuf>,
    system_probed: bool,
    cache: FontCache,
}

impl FontRegistry {
    /// Make `requested` (or else a system font) the label font. A requested
    /// path that cannot be used keeps the current font.
    fn ensure(
        &mut self,
        requested: Option<&Path>,
        mut register: impl FnMut(&Path, &mut FontCache) -> bool,
    ) -> bool {
        if let Some(path) = requested {
            if self.active.as_deref() == Some(path) {
                return true;
            }
            if register(path, &mut self.cache) {
                if let Some(previous) = self.active.replace(path.to_path_buf()) {
                    debug!("plot font switched from {}", previous.display());
                }
                return true;
            }
            warn!("font {} unusable, keeping the current one", path.display());
        }
        if self.active.is_some() {
            return true;
        }
        if self.system_probed {
            return false;
        }
        self.system_probed = true;
        for path in SYSTEM_FONTS.iter().map(Path::new) {
            if register(path, &mut self.cache) {
                self.active = Some(path.to_path_buf());
                return true;
            }
        }
        warn!("no TrueType font found, charts are drawn without text");
        false
    }
}

/// Read, keep alive for the process and register `path` under [`FONT_FAMILY`].
fn register_path(path: &Path, cache: &mut FontCache) -> bool {
    let bytes = match cache.get(path) {
        Some(bytes) => *bytes,
        None => {
            let Ok(data) = std::fs::read(path) else {
                return false;
            };
            let bytes: &'static [u8] = Box::leak(data.into_boxed_slice());
            cache.insert(path.to_path_buf(), bytes);
            bytes
        }
    };
    match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
        Ok(()) => {
            debug!("plot font: {}", path.display());
            true
        }
        Err(_) => {
            warn!("unusable font {}", path.display());
            false
        }
    }
}

fn ensure_font(style: &PlotStyle) -> bool {
    FONTS.lock().ensure(style.font_path.as_deref(), register_path)
}

/// Y axis bounds with a 5% margin; flat data gets ±1 Hz.
fn value_range(a: &[f64], b: &[f64]) -> (f64, f64) {
    let (lo, hi) = a
        .iter()
        .chain(b)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo < 1e-9 {
        return (lo - 1.0, hi + 1.0);
    }
    let margin = (hi - lo) * 0.05;
    (lo - margin, hi + margin)
}

/// Draw both contours, reference in blue and candidate in orange, into a
/// `style.width` × `style.height` PNG at `destination`.
pub fn plot_pitch(
    reference: &PitchContour,
    candidate: &PitchContour,
    destination: impl AsRef<Path>,
    style: &PlotStyle,
) -> RecitationResult<()> {
    let destination = destination.as_ref();
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let with_text = ensure_font(style);

    let root = BitMapBackend::new(destination, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let x_max = (reference.len().max(candidate.len()).max(2) - 1) as f64;
    let (y_min, y_max) = value_range(reference.values(), candidate.values());

    let mut builder = ChartBuilder::on(&root);
    builder.margin(15);
    if with_text {
        builder
            .caption(&style.title, (FONT_FAMILY, 22))
            .x_label_area_size(40)
            .y_label_area_size(55);
    }
    let mut chart = builder
        .build_cartesian_2d(0f64..x_max, y_min..y_max)
        .map_err(plot_err)?;

    let mut mesh = chart.configure_mesh();
    if with_text {
        mesh.x_desc(&style.x_label)
            .y_desc(&style.y_label)
            .label_style((FONT_FAMILY, 14));
    } else {
        mesh.x_labels(0).y_labels(0);
    }
    mesh.draw().map_err(plot_err)?;

    let series = [
        (reference, REFERENCE_COLOR, &style.reference_label),
        (candidate, CANDIDATE_COLOR, &style.candidate_label),
    ];
    for (contour, color, label) in series {
        let points = contour.values().iter().enumerate().map(|(i, v)| (i as f64, *v));
        let drawn = chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(plot_err)?;
        if with_text {
            drawn
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    if with_text {
        chart
            .configure_series_labels()
            .label_font((FONT_FAMILY, 14))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
    } else {
        // Legend swatches without names, top right.
        let x = style.width as i32 - 60;
        for (row, color) in [REFERENCE_COLOR, CANDIDATE_COLOR].into_iter().enumerate() {
            let y = 25 + row as i32 * 15;
            root.draw(&PathElement::new(vec![(x, y), (x + 30, y)], color.stroke_width(3)))
                .map_err(plot_err)?;
        }
    }

    root.present().map_err(plot_err)?;
    debug!("pitch chart written to {}", destination.display());
    Ok(())
}
