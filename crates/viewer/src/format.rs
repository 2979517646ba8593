//! Human-readable value magnitudes (`1500` -> `1.5KI`)

const UNITS: [&str; 5] = ["I", "KI", "MI", "GI", "TI"];

/// Format a value with two significant digits and the largest unit that
/// keeps it at or above one. `divider` goes between the number and the unit.
pub fn format_magnitude(value: f64, divider: &str) -> String {
    if !value.is_finite() || value <= 0.0 {
        return format!("0{}{}", divider, UNITS[0]);
    }

    let mut scaled = value;
    let mut unit = 0;
    while scaled >= 1000.0 && unit < UNITS.len() - 1 {
        scaled /= 1000.0;
        unit += 1;
    }

    format!("{}{}{}", two_significant(scaled), divider, UNITS[unit])
}

fn two_significant(value: f64) -> f64 {
    let magnitude = value.log10().floor() as i32 + 1;
    let digits = 2 - magnitude;
    if digits >= 0 {
        let scale = 10f64.powi(digits);
        (value * scale).round() / scale
    } else {
        let scale = 10f64.powi(-digits);
        (value / scale).round() * scale
    }
}
