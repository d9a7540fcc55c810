#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;


#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! log {
    ( $( $t:tt )* ) => {
        web_sys::console::log_1(&format!( $( $t )* ).into());
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! log {
    ( $( $t:tt )* ) => {
        println!( $( $t )* );
    }
}


#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(module = "/helper.js")]
extern "C" {
    pub fn get_canvas_width() -> u32;
    pub fn get_canvas_height() -> u32;
    pub fn get_time_milliseconds() -> f64;
}


/// Enable better error messages if our code ever panics
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}


/// Transmutes a slice
#[inline(always)]
pub fn transmute_slice<S, T>(slice: &[S]) -> &[T] {
    let ptr = slice.as_ptr() as *const T;
    let len = std::mem::size_of_val(slice) / std::mem::size_of::<T>();
    unsafe { std::slice::from_raw_parts(ptr, len) }
}


/// Incremental moving average over the last `period` samples
pub struct IncrementalMA {
    samples: Vec<f64>,
    period: usize,
    next: usize,
    sum: f64,
}

impl IncrementalMA {
    pub fn new(period: usize) -> Self {
        Self {
            samples: Vec::with_capacity(period),
            period,
            next: 0,
            sum: 0.0,
        }
    }

    /// Adds a sample and returns the current average
    pub fn add(&mut self, value: f64) -> f64 {
        if self.samples.len() < self.period {
            self.samples.push(value);
            self.sum += value;
        } else {
            self.sum += value - self.samples[self.next];
            self.samples[self.next] = value;
            self.next = (self.next + 1) % self.period;
        }
        self.sum / self.samples.len() as f64
    }
}


/// Scales a logical-pixel position to device pixels
#[inline(always)]
pub fn logical_to_device(x: f32, y: f32, device_pixel_ratio: f32) -> (f32, f32) {
    (x * device_pixel_ratio, y * device_pixel_ratio)
}


/// Check if a float is zero
#[inline(always)]
pub fn is_float_zero(x: f32, threshold: f32) -> bool {
    x.abs() < threshold
}


/// Check if two floats are equal
#[inline(always)]
pub fn are_floats_equal(x: f32, y: f32, threshold: f32) -> bool {
    is_float_zero(x - y, threshold)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average_fills_then_slides() {
        let mut ma = IncrementalMA::new(3);
        assert_eq!(ma.add(3.0), 3.0);
        assert_eq!(ma.add(5.0), 4.0);
        assert_eq!(ma.add(7.0), 5.0);
        // window slides: (5 + 7 + 9) / 3
        assert_eq!(ma.add(9.0), 7.0);
    }

    #[test]
    fn test_logical_to_device_scales_both_axes() {
        let (x, y) = logical_to_device(10.0, 20.0, 2.0);
        assert_eq!(x, 20.0);
        assert_eq!(y, 40.0);
        // a 1:1 ratio passes positions through untouched
        assert_eq!(logical_to_device(7.5, 3.25, 1.0), (7.5, 3.25));
    }

    #[test]
    fn test_float_comparison_helpers() {
        assert!(is_float_zero(0.000001, 0.00001));
        assert!(!is_float_zero(0.1, 0.00001));
        assert!(are_floats_equal(1.0, 1.0 + 1e-7, 1e-5));
    }
}
