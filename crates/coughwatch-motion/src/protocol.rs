use thiserror::Error;

/// One accelerometer reading: two lateral axes plus the amplitude channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionSample {
    pub x: i32,
    pub y: i32,
    pub adc: i32,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("malformed token `{0}`")]
    MalformedToken(String),

    #[error("empty line")]
    Empty,
}

/// Parses one line of the sensor's `key=value` protocol.
///
/// The device emits whitespace/tab separated fields such as
/// `Xs=12	Ys=9	X=1042	Y=-80	ADC=512`; only `X`, `Y` and `ADC` matter
/// here, extra keys are tolerated and ignored. Lines arrive CR-terminated
/// and occasionally truncated mid-token; those fail as malformed and the
/// reader skips them.
pub fn parse_line(line: &str) -> Result<MotionSample, ParseError> {
    let line = line.trim_matches(|c: char| c.is_whitespace() || c == '"');
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut x = None;
    let mut y = None;
    let mut adc = None;

    for token in line.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            return Err(ParseError::MalformedToken(token.to_string()));
        };
        let value: i32 = value
            .parse()
            .map_err(|_| ParseError::MalformedToken(token.to_string()))?;
        match key {
            "X" => x = Some(value),
            "Y" => y = Some(value),
            "ADC" => adc = Some(value),
            _ => {}
        }
    }

    Ok(MotionSample {
        x: x.ok_or(ParseError::MissingField("X"))?,
        y: y.ok_or(ParseError::MissingField("Y"))?,
        adc: adc.ok_or(ParseError::MissingField("ADC"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_line_with_tabs() {
        let sample = parse_line("Xs=12\tYs=9\tX=1042\tY=-80\tADC=512\r").unwrap();
        assert_eq!(
            sample,
            MotionSample {
                x: 1042,
                y: -80,
                adc: 512
            }
        );
    }

    #[test]
    fn parses_space_separated_line() {
        let sample = parse_line(" X=1 Y=2 ADC=3 ").unwrap();
        assert_eq!(sample, MotionSample { x: 1, y: 2, adc: 3 });
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let sample = parse_line("W=9 X=1 Y=2 ADC=3 T=77").unwrap();
        assert_eq!(sample, MotionSample { x: 1, y: 2, adc: 3 });
    }

    #[test]
    fn missing_adc_is_rejected() {
        assert_eq!(
            parse_line("X=1 Y=2"),
            Err(ParseError::MissingField("ADC"))
        );
    }

    #[test]
    fn truncated_value_is_rejected() {
        assert_eq!(
            parse_line("X=1 Y=2 ADC="),
            Err(ParseError::MalformedToken("ADC=".to_string()))
        );
    }

    #[test]
    fn token_without_equals_is_rejected() {
        assert!(matches!(
            parse_line("X=1 garbage ADC=3"),
            Err(ParseError::MalformedToken(_))
        ));
    }

    #[test]
    fn blank_line_is_rejected() {
        assert_eq!(parse_line("\r\n"), Err(ParseError::Empty));
    }
}
