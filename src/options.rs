/// Formatting options applied to every label the DOT emitter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintOptions {
    /// Decimal places for numeric values; `None` leaves values untouched.
    pub decimal_places: Option<u32>,
    /// Font size for all text labels.
    pub font_size: u32,
    /// Source node fields from the model's internal representation.
    pub internal: bool,
}

pub const DEFAULT_FONT_SIZE: u32 = 14;

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            decimal_places: None,
            font_size: DEFAULT_FONT_SIZE,
            internal: false,
        }
    }
}

impl PrintOptions {
    pub fn new(decimal_places: Option<u32>, font_size: u32, internal: bool) -> Self {
        PrintOptions {
            decimal_places,
            font_size,
            internal,
        }
    }

    /// Round `value` half away from zero to the configured decimal places.
    ///
    /// Identity when rounding is disabled. Values whose scaled form is not
    /// finite (huge scales, infinities, NaN) are returned unchanged.
    pub fn round(&self, value: f32) -> f32 {
        let Some(places) = self.decimal_places else {
            return value;
        };
        let scale = 10f64.powi(places.min(i32::MAX as u32) as i32);
        let scaled = value as f64 * scale;
        if !scaled.is_finite() || !scale.is_finite() {
            return value;
        }
        let rounded = (scaled.round() / scale) as f32;
        if rounded.is_finite() { rounded } else { value }
    }
}
