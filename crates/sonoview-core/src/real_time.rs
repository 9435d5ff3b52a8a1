//! Time positions for labels and overlays
//!
//! Frame positions are converted to [`RealTime`] only for display: ruler
//! labels, the pane frame-count overlay and selection extents.

use std::fmt;
use std::ops::Neg;

use crate::types::{FrameIndex, SampleRate};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Seconds plus nanoseconds, normalised so both parts share a sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RealTime {
    pub sec: i64,
    pub nsec: i32,
}

impl RealTime {
    pub const ZERO: RealTime = RealTime { sec: 0, nsec: 0 };

    pub fn new(sec: i64, nsec: i64) -> Self {
        let total = sec * NANOS_PER_SEC + nsec;
        Self {
            sec: total / NANOS_PER_SEC,
            nsec: (total % NANOS_PER_SEC) as i32,
        }
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Self::new(0, (seconds * NANOS_PER_SEC as f64).round() as i64)
    }

    pub fn from_frame(frame: FrameIndex, rate: SampleRate) -> Self {
        if frame < 0 {
            return -Self::from_frame(-frame, rate);
        }
        let rate = rate.max(1) as i64;
        let sec = frame / rate;
        let rem = frame - sec * rate;
        Self {
            sec,
            nsec: ((rem as f64 * 1_000_000.0 / rate as f64) * 1000.0) as i32,
        }
    }

    /// Nearest frame at or after this time
    pub fn to_frame(self, rate: SampleRate) -> FrameIndex {
        if self < Self::ZERO {
            return -(-self).to_frame(rate);
        }
        let s = self.sec as f64 + (self.nsec as f64 + 1.0) / NANOS_PER_SEC as f64;
        (s * rate as f64) as FrameIndex
    }

    pub fn as_seconds(self) -> f64 {
        self.sec as f64 + self.nsec as f64 / NANOS_PER_SEC as f64
    }

    pub fn msec(self) -> i32 {
        self.nsec / 1_000_000
    }

    /// `[h:][m:]ss.mmm`, hours and minutes only when nonzero
    ///
    /// Trailing zero milliseconds are dropped unless `fixed_dp` is set.
    pub fn to_text(self, fixed_dp: bool) -> String {
        if self < Self::ZERO {
            return format!("-{}", (-self).to_text(fixed_dp));
        }

        let sec = self.sec;
        let mut out = String::new();
        if sec >= 3600 {
            out.push_str(&format!("{}:", sec / 3600));
        }
        if sec >= 60 {
            out.push_str(&format!("{}:", (sec % 3600) / 60));
        }
        if sec >= 10 {
            out.push_str(&format!("{}", (sec % 60) / 10));
        }
        out.push_str(&format!("{}", sec % 10));

        let ms = self.msec();
        if ms != 0 {
            let digits = format!("{:03}", ms);
            let digits = if fixed_dp {
                digits.as_str()
            } else {
                digits.trim_end_matches('0')
            };
            out.push('.');
            out.push_str(digits);
        } else if fixed_dp {
            out.push_str(".000");
        }
        out
    }
}

impl Neg for RealTime {
    type Output = RealTime;

    fn neg(self) -> RealTime {
        RealTime {
            sec: -self.sec,
            nsec: -self.nsec,
        }
    }
}

impl fmt::Display for RealTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_conversion() {
        let rt = RealTime::from_frame(66150, 44100);
        assert_eq!(rt.sec, 1);
        assert_eq!(rt.msec(), 500);
        assert_eq!(rt.to_frame(44100), 66150);
    }

    #[test]
    fn test_negative_frames() {
        let rt = RealTime::from_frame(-22050, 44100);
        assert!(rt < RealTime::ZERO);
        assert_eq!(rt.to_text(false), "-0.5");
        assert_eq!(rt.to_frame(44100), -22050);
    }

    #[test]
    fn test_text_formatting() {
        assert_eq!(RealTime::new(0, 0).to_text(false), "0");
        assert_eq!(RealTime::new(0, 0).to_text(true), "0.000");
        assert_eq!(RealTime::new(12, 250_000_000).to_text(false), "12.25");
        assert_eq!(RealTime::new(12, 250_000_000).to_text(true), "12.250");
        assert_eq!(RealTime::new(75, 5_000_000).to_text(true), "1:15.005");
        assert_eq!(RealTime::new(3661, 500_000_000).to_text(false), "1:1:01.5");
    }

    #[test]
    fn test_new_normalises_carry() {
        assert_eq!(RealTime::new(1, 1_500_000_000), RealTime { sec: 2, nsec: 500_000_000 });
        assert_eq!(RealTime::from_seconds(2.5).as_seconds(), 2.5);
    }
}
