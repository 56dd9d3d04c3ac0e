/// Head attitude from accelerometer readings
use std::f64::consts::PI;

/// Roll and pitch in degrees of a gravity vector
pub fn roll_pitch(x: f64, y: f64, z: f64) -> (f64, f64) {
    let roll = y.atan2(z) / PI * 180.0;
    let pitch = (-x).atan2((y * y + z * z).sqrt()) / PI * 180.0;
    (roll, pitch)
}

/// Component-wise mean of a batch of `[x, y, z]` samples
pub fn mean(samples: &[[f64; 3]]) -> Option<[f64; 3]> {
    if samples.is_empty() {
        return None;
    }
    let mut sum = [0.0; 3];
    for sample in samples {
        for (acc, value) in sum.iter_mut().zip(sample) {
            *acc += value;
        }
    }
    let n = samples.len() as f64;
    Some([sum[0] / n, sum[1] / n, sum[2] / n])
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: f64 = 9.81;

    #[test]
    fn test_roll_pitch() {
        assert_eq!(roll_pitch(0.0, 0.0, G), (0.0, 0.0));
        assert_eq!(roll_pitch(0.0, 0.0, -G), (180.0, 0.0));
        assert_eq!(roll_pitch(0.0, G, 0.0), (90.0, 0.0));
        assert_eq!(roll_pitch(0.0, -G, 0.0), (-90.0, 0.0));
        assert_eq!(roll_pitch(G, 0.0, 0.0), (0.0, -90.0));
        assert_eq!(roll_pitch(-G, 0.0, 0.0), (0.0, 90.0));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(
            mean(&[[1.0, 2.0, 3.0], [3.0, 2.0, 1.0]]),
            Some([2.0, 2.0, 2.0])
        );
    }
}
