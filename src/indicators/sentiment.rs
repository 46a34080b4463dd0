/// Fear & Greed reading (0 = extreme fear, 100 = extreme greed)
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentReading {
    pub value: f64,
    pub classification: String,
}

impl SentimentReading {
    pub fn new(value: f64) -> Self {
        Self {
            value: value.clamp(0.0, 100.0),
            classification: classify(value).to_string(),
        }
    }
}

pub fn classify(value: f64) -> &'static str {
    match value {
        v if v <= 24.0 => "Extreme Fear",
        v if v <= 49.0 => "Fear",
        v if v < 75.0 => "Greed",
        _ => "Extreme Greed",
    }
}

/// Contrarian adjustment to buy conviction: fear supports buying, greed argues against it
pub fn buy_conviction_adjustment(value: f64) -> f64 {
    if value <= 30.0 {
        0.3
    } else if value >= 70.0 {
        -0.3
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_bands() {
        assert_eq!(classify(10.0), "Extreme Fear");
        assert_eq!(classify(40.0), "Fear");
        assert_eq!(classify(60.0), "Greed");
        assert_eq!(classify(90.0), "Extreme Greed");
    }

    #[test]
    fn test_adjustment_is_contrarian() {
        assert_eq!(buy_conviction_adjustment(20.0), 0.3);
        assert_eq!(buy_conviction_adjustment(50.0), 0.0);
        assert_eq!(buy_conviction_adjustment(80.0), -0.3);
    }

    #[test]
    fn test_reading_clamps() {
        let reading = SentimentReading::new(140.0);
        assert_eq!(reading.value, 100.0);
        assert_eq!(reading.classification, "Extreme Greed");
    }
}
