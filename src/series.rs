use crate::error::SerialPressError;

/// Parsed form of a series start string such as `"AB 007"`: the literal
/// prefix (spaces preserved), the numeric base, and the zero-padding width
/// taken from the original digit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSpec {
    prefix: String,
    base: u128,
    width: usize,
}

impl SeriesSpec {
    /// The numeric tail is ASCII digits only; other Unicode decimals are
    /// prefix text.
    pub fn parse(start: &str) -> Result<SeriesSpec, SerialPressError> {
        let digits = start
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(SerialPressError::InvalidInput(
                "series start must end with a numeric part".to_string(),
            ));
        }
        let split = start.len() - digits;
        let base = start[split..].parse::<u128>().map_err(|_| {
            SerialPressError::InvalidInput("series numeric part is out of range".to_string())
        })?;
        Ok(SeriesSpec {
            prefix: start[..split].to_string(),
            base,
            width: digits,
        })
    }

    /// The i-th serial (0-indexed). The width is fixed from the start
    /// string; values that outgrow it simply print longer.
    pub fn value(&self, index: u32) -> String {
        let n = self.base + index as u128;
        format!("{}{:0width$}", self.prefix, n, width = self.width)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_base_and_width() {
        let spec = SeriesSpec::parse("AB007").expect("parse");
        assert_eq!(spec.prefix(), "AB");
        assert_eq!(spec.value(0), "AB007");
        assert_eq!(spec.value(1), "AB008");
        assert_eq!(spec.value(2), "AB009");
    }

    #[test]
    fn preserves_spaces_in_prefix() {
        let spec = SeriesSpec::parse("LOT 42 - 0099").expect("parse");
        assert_eq!(spec.prefix(), "LOT 42 - ");
        assert_eq!(spec.value(0), "LOT 42 - 0099");
        assert_eq!(spec.value(1), "LOT 42 - 0100");
    }

    #[test]
    fn digits_only_start_has_empty_prefix() {
        let spec = SeriesSpec::parse("0001").expect("parse");
        assert_eq!(spec.prefix(), "");
        assert_eq!(spec.value(41), "0042");
    }

    #[test]
    fn width_overflow_grows_the_number() {
        let spec = SeriesSpec::parse("X99").expect("parse");
        assert_eq!(spec.value(0), "X99");
        assert_eq!(spec.value(1), "X100");
        assert_eq!(spec.value(2), "X101");
    }

    #[test]
    fn non_ascii_decimal_digits_stay_in_the_prefix() {
        assert!(SeriesSpec::parse("LOT-٠٧").is_err());
        let spec = SeriesSpec::parse("LOT-٠٧1").expect("parse");
        assert_eq!(spec.prefix(), "LOT-٠٧");
        assert_eq!(spec.value(1), "LOT-٠٧2");
    }

    #[test]
    fn rejects_start_without_trailing_digits() {
        assert!(SeriesSpec::parse("SERIAL").is_err());
        assert!(SeriesSpec::parse("12A").is_err());
        assert!(SeriesSpec::parse("").is_err());
    }

    #[test]
    fn sequence_is_strictly_increasing_with_constant_shape() {
        let spec = SeriesSpec::parse("QC-0090").expect("parse");
        let values: Vec<String> = (0..20).map(|i| spec.value(i)).collect();
        assert_eq!(values.len(), 20);
        for (i, value) in values.iter().enumerate() {
            assert!(value.starts_with("QC-"));
            let numeric: u64 = value["QC-".len()..].parse().expect("numeric tail");
            assert_eq!(numeric, 90 + i as u64);
            assert!(value.len() >= "QC-0090".len());
        }
    }
}
