use pixeld::core::models::Rgb;
use pixeld::PixeldError;
use proptest::prelude::*;

#[test]
fn test_rgb_parse_valid_lowercase() {
    let rgb: Rgb = "ff00aa".parse().unwrap();
    assert_eq!(rgb.bytes(), [0xFF, 0x00, 0xAA]);
}

#[test]
fn test_rgb_parse_valid_uppercase() {
    let rgb: Rgb = "FF00AA".parse().unwrap();
    assert_eq!(rgb.bytes(), [0xFF, 0x00, 0xAA]);
}

#[test]
fn test_rgb_parse_mixed_case() {
    let rgb: Rgb = "Ff00aA".parse().unwrap();
    assert_eq!(rgb.bytes(), [0xFF, 0x00, 0xAA]);
}

#[test]
fn test_rgb_reemitted_lowercase() {
    let rgb: Rgb = "00BB00".parse().unwrap();
    assert_eq!(rgb.to_string(), "00bb00");
}

#[test]
fn test_rgb_parse_too_short() {
    let err = "fff".parse::<Rgb>().unwrap_err();
    assert!(matches!(err, PixeldError::Validation(_)));
}

#[test]
fn test_rgb_parse_too_long() {
    let err = "ff00aa0".parse::<Rgb>().unwrap_err();
    assert!(matches!(err, PixeldError::Validation(_)));
}

#[test]
fn test_rgb_parse_non_hex() {
    let err = "gg0000".parse::<Rgb>().unwrap_err();
    assert!(matches!(err, PixeldError::Validation(_)));
}

#[test]
fn test_rgb_parse_rejects_css_prefix() {
    let err = "#ff000".parse::<Rgb>().unwrap_err();
    assert!(matches!(err, PixeldError::Validation(_)));
}

#[test]
fn test_rgb_white_is_default_background() {
    assert_eq!(Rgb::WHITE.bytes(), [0xFF, 0xFF, 0xFF]);
    assert_eq!(Rgb::WHITE.to_string(), "ffffff");
}

proptest! {
    #[test]
    fn test_rgb_round_trip(bytes in proptest::array::uniform3(any::<u8>())) {
        let rgb = Rgb::from_bytes(bytes);
        let parsed: Rgb = rgb.to_string().parse().unwrap();
        prop_assert_eq!(parsed, rgb);
    }

    #[test]
    fn test_rgb_format_matches_lowered_input(bytes in proptest::array::uniform3(any::<u8>())) {
        let hex = format!("{:02X}{:02X}{:02X}", bytes[0], bytes[1], bytes[2]);
        let parsed: Rgb = hex.parse().unwrap();
        prop_assert_eq!(parsed.to_string(), hex.to_lowercase());
    }
}
