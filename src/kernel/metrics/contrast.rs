//! Text contrast evaluation across light and dark color schemes.
//!
//! Ratios follow the WCAG definition: relative luminance from linearized
//! sRGB channels, then `(L1 + 0.05) / (L2 + 0.05)` with `L1 >= L2`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use crate::kernel::error::{EngineError, Result};

pub const AA_NORMAL: f64 = 4.5;
pub const AA_LARGE: f64 = 3.0;
pub const AAA_NORMAL: f64 = 7.0;
pub const AAA_LARGE: f64 = 4.5;

const LARGE_TEXT_PX: f64 = 24.0;
const LARGE_BOLD_TEXT_PX: f64 = 18.66;
const BOLD_WEIGHT: u16 = 700;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Exact equality, alpha compared by bit pattern.
    pub fn same_bits(&self, other: &Rgba) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b && self.a.to_bits() == other.a.to_bits()
    }

    /// Alpha-composites `self` over an opaque `backdrop`.
    pub fn over(&self, backdrop: &Rgba) -> Rgba {
        let a = self.a.clamp(0.0, 1.0);
        let mix = |fg: u8, bg: u8| (fg as f64 * a + bg as f64 * (1.0 - a)).round() as u8;
        Rgba::rgb(mix(self.r, backdrop.r), mix(self.g, backdrop.g), mix(self.b, backdrop.b))
    }
}

impl FromStr for Rgba {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim().to_ascii_lowercase();
        let invalid = || EngineError::InvalidColor(s.to_string());

        match text.as_str() {
            "white" => return Ok(Rgba::rgb(255, 255, 255)),
            "black" => return Ok(Rgba::rgb(0, 0, 0)),
            "transparent" => return Ok(Rgba { r: 0, g: 0, b: 0, a: 0.0 }),
            _ => {}
        }

        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(invalid);
        }

        let inner = text
            .strip_prefix("rgba(")
            .or_else(|| text.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;

        // Accepts both `r, g, b, a` and `r g b / a`.
        let parts: Vec<&str> = inner
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(invalid());
        }

        let channel = |p: &str| -> Option<u8> {
            let v: f64 = p.parse().ok()?;
            v.is_finite().then(|| v.round().clamp(0.0, 255.0) as u8)
        };
        let r = channel(parts[0]).ok_or_else(invalid)?;
        let g = channel(parts[1]).ok_or_else(invalid)?;
        let b = channel(parts[2]).ok_or_else(invalid)?;
        let a = match parts.get(3) {
            Some(p) => parse_alpha(p).ok_or_else(invalid)?,
            None => 1.0,
        };
        Ok(Rgba { r, g, b, a })
    }
}

fn parse_alpha(p: &str) -> Option<f64> {
    let v: f64 = match p.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? / 100.0,
        None => p.parse().ok()?,
    };
    v.is_finite().then(|| v.clamp(0.0, 1.0))
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let digits: Vec<u8> = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8))
        .collect::<Option<Vec<_>>>()?;
    let pair = |i: usize| digits[i] * 16 + digits[i + 1];
    match digits.len() {
        3 => Some(Rgba::rgb(digits[0] * 17, digits[1] * 17, digits[2] * 17)),
        6 => Some(Rgba::rgb(pair(0), pair(2), pair(4))),
        8 => Some(Rgba {
            r: pair(0),
            g: pair(2),
            b: pair(4),
            a: pair(6) as f64 / 255.0,
        }),
        _ => None,
    }
}

fn linearize(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn relative_luminance(color: &Rgba) -> f64 {
    0.2126 * linearize(color.r) + 0.7152 * linearize(color.g) + 0.0722 * linearize(color.b)
}

/// Contrast of `foreground` drawn on `background`. Translucent foregrounds are
/// composited onto the background first; the background is taken as opaque.
pub fn contrast_ratio(foreground: &Rgba, background: &Rgba) -> f64 {
    let backdrop = Rgba { a: 1.0, ..*background };
    let fg = foreground.over(&backdrop);
    let l_fg = relative_luminance(&fg);
    let l_bg = relative_luminance(&backdrop);
    let (l1, l2) = if l_fg >= l_bg { (l_fg, l_bg) } else { (l_bg, l_fg) };
    (l1 + 0.05) / (l2 + 0.05)
}

pub fn is_large_text(font_size_px: f64, font_weight: u16) -> bool {
    font_size_px >= LARGE_TEXT_PX || (font_size_px >= LARGE_BOLD_TEXT_PX && font_weight >= BOLD_WEIGHT)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorScheme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    fn at_least(ratio: f64, threshold: f64) -> Self {
        if ratio >= threshold {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Computed text colors for one element under one color scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorSample {
    pub element_id: String,
    pub scheme: ColorScheme,
    pub foreground: String,
    pub background: String,
    #[serde(default = "default_font_size")]
    pub font_size_px: f64,
    #[serde(default = "default_font_weight")]
    pub font_weight: u16,
}

fn default_font_size() -> f64 {
    16.0
}

fn default_font_weight() -> u16 {
    400
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastResult {
    pub element_id: String,
    pub scheme: ColorScheme,
    pub ratio: f64,
    pub large_text: bool,
    pub aa: Verdict,
    pub aaa: Verdict,
}

pub fn classify(element_id: &str, scheme: ColorScheme, ratio: f64, large_text: bool) -> ContrastResult {
    let (aa, aaa) = if large_text {
        (AA_LARGE, AAA_LARGE)
    } else {
        (AA_NORMAL, AAA_NORMAL)
    };
    ContrastResult {
        element_id: element_id.to_string(),
        scheme,
        ratio,
        large_text,
        aa: Verdict::at_least(ratio, aa),
        aaa: Verdict::at_least(ratio, aaa),
    }
}

pub fn evaluate_sample(sample: &ColorSample) -> Result<ContrastResult> {
    let fg: Rgba = sample.foreground.parse()?;
    let bg: Rgba = sample.background.parse()?;
    let ratio = contrast_ratio(&fg, &bg);
    Ok(classify(
        &sample.element_id,
        sample.scheme,
        ratio,
        is_large_text(sample.font_size_px, sample.font_weight),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastMetrics {
    pub evaluated: usize,
    pub aa_failures: usize,
    pub aaa_failures: usize,
    pub unparseable: usize,
    /// Elements whose colors are identical in both schemes.
    pub non_responsive: Vec<String>,
    /// AA failures, lowest ratio first.
    pub worst: Vec<ContrastResult>,
}

pub fn evaluate(samples: &[ColorSample], top_n: usize) -> ContrastMetrics {
    let mut results = Vec::new();
    let mut unparseable = 0;
    // element -> scheme -> first parsed (fg, bg)
    let mut pairs: BTreeMap<&str, BTreeMap<ColorScheme, (Rgba, Rgba)>> = BTreeMap::new();

    for sample in samples {
        let parsed = sample
            .foreground
            .parse::<Rgba>()
            .and_then(|fg| sample.background.parse::<Rgba>().map(|bg| (fg, bg)));
        let (fg, bg) = match parsed {
            Ok(colors) => colors,
            Err(e) => {
                warn!("skipping color sample for {}: {}", sample.element_id, e);
                unparseable += 1;
                continue;
            }
        };
        pairs
            .entry(sample.element_id.as_str())
            .or_default()
            .entry(sample.scheme)
            .or_insert((fg, bg));
        results.push(classify(
            &sample.element_id,
            sample.scheme,
            contrast_ratio(&fg, &bg),
            is_large_text(sample.font_size_px, sample.font_weight),
        ));
    }

    let non_responsive = pairs
        .iter()
        .filter_map(|(element, schemes)| {
            let (light_fg, light_bg) = schemes.get(&ColorScheme::Light)?;
            let (dark_fg, dark_bg) = schemes.get(&ColorScheme::Dark)?;
            (light_fg.same_bits(dark_fg) && light_bg.same_bits(dark_bg)).then(|| element.to_string())
        })
        .collect();

    let aa_failures = results.iter().filter(|r| r.aa == Verdict::Fail).count();
    let aaa_failures = results.iter().filter(|r| r.aaa == Verdict::Fail).count();

    let mut worst: Vec<ContrastResult> = results.iter().filter(|r| r.aa == Verdict::Fail).cloned().collect();
    worst.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));
    worst.truncate(top_n);

    ContrastMetrics {
        evaluated: results.len(),
        aa_failures,
        aaa_failures,
        unparseable,
        non_responsive,
        worst,
    }
}
