use pixeld::PixeldError;
use pixeld::core::models::{AuthState, PixelPayload, UserRef};

const WIDTH: u32 = 4;
const HEIGHT: u32 = 2;

fn payload(x: i64, y: i64, rgb: &str) -> PixelPayload {
    PixelPayload {
        x,
        y,
        rgb: rgb.to_string(),
    }
}

#[test]
fn test_pixel_validate_in_bounds() {
    let pixel = payload(3, 1, "FF0000").validate(WIDTH, HEIGHT).unwrap();
    assert_eq!(pixel.x, 3);
    assert_eq!(pixel.y, 1);
    assert_eq!(pixel.rgb.bytes(), [0xFF, 0x00, 0x00]);
}

#[test]
fn test_pixel_validate_x_at_width_rejected() {
    let err = payload(4, 0, "FF0000").validate(WIDTH, HEIGHT).unwrap_err();
    assert!(matches!(err, PixeldError::Validation(_)));
    assert!(err.to_string().contains("x must be inside range(0, 4)"));
}

#[test]
fn test_pixel_validate_negative_y_rejected() {
    let err = payload(0, -1, "FF0000").validate(WIDTH, HEIGHT).unwrap_err();
    assert!(err.to_string().contains("y must be inside range(0, 2)"));
}

#[test]
fn test_pixel_validate_bad_color_rejected() {
    let err = payload(0, 0, "red").validate(WIDTH, HEIGHT).unwrap_err();
    assert!(matches!(err, PixeldError::Validation(_)));
}

#[test]
fn test_user_ref_accepts_snowflake() {
    let user = UserRef {
        user_id: 80528701850124288,
    };
    assert_eq!(user.validate().unwrap(), 80528701850124288);
}

#[test]
fn test_user_ref_rejects_negative() {
    let user = UserRef { user_id: -1 };
    assert!(matches!(
        user.validate().unwrap_err(),
        PixeldError::Validation(_)
    ));
}

#[test]
fn test_auth_state_details() {
    assert!(AuthState::NoToken.detail().contains("/authorize"));
    assert!(AuthState::BadHeader.detail().contains("Bearer"));
    assert_eq!(AuthState::Banned.detail(), "You are banned.");
    assert!(!AuthState::NoToken.is_authenticated());
    assert!(AuthState::User.is_authenticated());
    assert!(AuthState::Moderator.is_authenticated());
}
