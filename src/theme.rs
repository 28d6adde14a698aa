use anyhow::{anyhow, Result};
use crossterm::style::Color;

pub fn accent_color(value: &str) -> Color {
    parse_color(value).unwrap_or(Color::AnsiValue(2))
}

pub fn parse_color(value: &str) -> Result<Color> {
    let v = value.trim();
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    if !v.is_empty() && v.len() <= 3 && v.bytes().all(|b| b.is_ascii_digit()) {
        let index: u16 = v.parse().map_err(|_| anyhow!("Invalid ANSI color: {v}"))?;
        return u8::try_from(index)
            .map(Color::AnsiValue)
            .map_err(|_| anyhow!("ANSI color out of range: {v}"));
    }
    Err(anyhow!("Unsupported color format: {v}"))
}

fn parse_hex_color(hex: &str) -> Result<Color> {
    let value = hex.trim();
    if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(anyhow!("Invalid hex color: #{value}"));
    }
    let bytes = match value.len() {
        3 => u32::from_str_radix(value, 16).ok(),
        6 => u32::from_str_radix(value, 16).ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Invalid hex color: #{value}"))?;

    Ok(match value.len() {
        3 => {
            let r = ((bytes >> 8) & 0xF) as u8;
            let g = ((bytes >> 4) & 0xF) as u8;
            let b = (bytes & 0xF) as u8;
            Color::Rgb {
                r: r * 17,
                g: g * 17,
                b: b * 17,
            }
        }
        _ => Color::Rgb {
            r: ((bytes >> 16) & 0xFF) as u8,
            g: ((bytes >> 8) & 0xFF) as u8,
            b: (bytes & 0xFF) as u8,
        },
    })
}

pub fn to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ansi_indices() {
        assert_eq!(parse_color("2").unwrap(), Color::AnsiValue(2));
        assert_eq!(parse_color("255").unwrap(), Color::AnsiValue(255));
        assert!(parse_color("256").is_err());
        assert!(parse_color("-1").is_err());
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(
            parse_color("#ff8000").unwrap(),
            Color::Rgb { r: 255, g: 128, b: 0 }
        );
        assert_eq!(
            parse_color("#f80").unwrap(),
            Color::Rgb { r: 255, g: 136, b: 0 }
        );
        assert!(parse_color("#ggg").is_err());
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("red").is_err());
    }

    #[test]
    fn accent_falls_back_to_green() {
        assert_eq!(accent_color("nope"), Color::AnsiValue(2));
    }

    #[test]
    fn hex_round_trips_through_parser() {
        let hex = to_hex(18, 52, 86);
        assert_eq!(hex, "#123456");
        assert_eq!(parse_color(&hex).unwrap(), Color::Rgb { r: 18, g: 52, b: 86 });
    }
}
