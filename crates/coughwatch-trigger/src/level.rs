/// Peak absolute sample value of a frame. Widened to i32 so i16::MIN maps
/// to 32768 instead of overflowing.
pub fn peak_amplitude(samples: &[i16]) -> i32 {
    samples.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_of_mixed_signs() {
        assert_eq!(peak_amplitude(&[10, -300, 250]), 300);
    }

    #[test]
    fn peak_of_empty_frame_is_zero() {
        assert_eq!(peak_amplitude(&[]), 0);
    }

    #[test]
    fn peak_handles_i16_min() {
        assert_eq!(peak_amplitude(&[i16::MIN]), 32768);
    }
}
