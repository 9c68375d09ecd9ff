//! Parameter strings of flags and control-script commands.
//!
//! A parameter is a list of values separated by commas and/or spaces, e.g.
//! `0, 0, 63, 63` or `12.5 40`.

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use merlin_core::geometry::{AnnularRange, FrameCalibration, PhysicalPos, ScanRoi};

/// Split a parameter string into its values.
pub fn read_param(text: &str) -> Vec<&str> {
    text.split([',', ' ', '\t'])
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parse exactly `N` values of `what`.
pub fn parse_values<T, const N: usize>(text: &str, what: &str) -> Result<[T; N]>
where
    T: FromStr + Copy + Default,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let tokens = read_param(text);
    if tokens.len() < N {
        bail!("{what} needs {N} values, got '{}'", text.trim());
    }
    let mut values = [T::default(); N];
    for (value, token) in values.iter_mut().zip(&tokens) {
        *value = token
            .parse()
            .with_context(|| format!("invalid {what} value '{token}'"))?;
    }
    Ok(values)
}

/// `x0, y0, x1, y1`
pub fn parse_roi(text: &str) -> Result<ScanRoi> {
    let [x0, y0, x1, y1] = parse_values::<i64, 4>(text, "scan ROI")?;
    Ok(ScanRoi::new(x0, y0, x1, y1)?)
}

/// `x, y` of the calibration origin, in frame pixels.
pub fn parse_origin(text: &str) -> Result<PhysicalPos> {
    let [x, y] = parse_values::<f64, 2>(text, "origin")?;
    Ok(PhysicalPos::new(x, y))
}

/// `a0.x, a1.x, a0.y, a1.y`, applied to the basis of `calibration`.
pub fn apply_sampling(calibration: &mut FrameCalibration, text: &str) -> Result<()> {
    let [a0x, a1x, a0y, a1y] = parse_values::<f64, 4>(text, "sampling")?;
    calibration.a0 = PhysicalPos::new(a0x, a0y);
    calibration.a1 = PhysicalPos::new(a1x, a1y);
    Ok(())
}

/// `min, max`
pub fn parse_range(text: &str) -> Result<AnnularRange> {
    let [min, max] = parse_values::<f64, 2>(text, "annular range")?;
    Ok(AnnularRange::new(min, max))
}

/// `x, y` of a frame pixel.
pub fn parse_pixel(text: &str) -> Result<(i64, i64)> {
    let [x, y] = parse_values::<i64, 2>(text, "pixel")?;
    Ok((x, y))
}
