use derive_new::new;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::arm_hal::{ColorSensor, HalResult};

/// Raw channel intensities from one sensor read.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize, new)]
pub struct RgbSample {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
pub enum ColorCategory {
    Red,
    Blue,
    /// No bin's dominance rule matched. The caller retries.
    Indeterminate,
}

impl ColorCategory {
    pub fn bin(self) -> Option<Bin> {
        match self {
            ColorCategory::Red => Some(Bin::Red),
            ColorCategory::Blue => Some(Bin::Blue),
            ColorCategory::Indeterminate => None,
        }
    }
}

/// Destination bins. Only conclusive categories map to one.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
pub enum Bin {
    Red,
    Blue,
}

/// Strict dominance: a channel wins only if it is greater than both others. Ties and green
/// dominance are indeterminate.
pub fn classify(sample: RgbSample) -> ColorCategory {
    let RgbSample { red, green, blue } = sample;
    if red > green && red > blue {
        ColorCategory::Red
    } else if blue > red && blue > green {
        ColorCategory::Blue
    } else {
        ColorCategory::Indeterminate
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
pub enum Hue {
    Red,
    Yellow,
    Green,
    Cyan,
    White,
    Blue,
    Magenta,
}

const CYAN_MIN_BLUE: u16 = 90;
const WHITE_MIN_BLUE: u16 = 80;
const WHITE_MIN_RED: u16 = 60;

/// Finer-grained reading: dominant channel first, then the runner-up and a few fixed intensity
/// thresholds. Ties go to red, then green. Not used for bin decisions.
pub fn classify_extended(sample: RgbSample) -> Hue {
    let RgbSample { red, green, blue } = sample;
    let max = red.max(green).max(blue);
    if max == red {
        Hue::Red
    } else if max == green {
        if red >= blue {
            Hue::Yellow
        } else if blue >= CYAN_MIN_BLUE {
            Hue::Cyan
        } else if blue >= WHITE_MIN_BLUE && red >= WHITE_MIN_RED {
            Hue::White
        } else {
            Hue::Green
        }
    } else if red >= green {
        Hue::Magenta
    } else {
        Hue::Blue
    }
}

/// Result of one sensor read.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize)]
pub struct ColorReading {
    pub sample: RgbSample,
    pub category: ColorCategory,
    pub hue: Hue,
}

/// Owns the color sensor and turns each read into a [`ColorReading`].
pub struct ColorClassifier {
    sensor: Box<dyn ColorSensor>,
}

impl ColorClassifier {
    pub fn new(sensor: Box<dyn ColorSensor>) -> Self {
        Self { sensor }
    }

    pub fn read(&mut self) -> HalResult<ColorReading> {
        let sample = self.sensor.read_rgb()?;
        let reading = ColorReading {
            sample,
            category: classify(sample),
            hue: classify_extended(sample),
        };
        debug!(
            "RGB: R={}, G={}, B={} => {:?} ({:?})",
            sample.red,
            sample.green,
            sample.blue,
            reading.category,
            reading.hue);
        Ok(reading)
    }
}
