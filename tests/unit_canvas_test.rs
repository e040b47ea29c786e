use pixeld::core::canvas::{Canvas, buffer_index, write_pixel};
use pixeld::core::models::Rgb;

fn test_canvas(width: u32, height: u32) -> Canvas {
    let pool = deadpool_redis::Config::from_url("redis://127.0.0.1")
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .unwrap();
    Canvas::new(pool, "test-canvas-cache".to_string(), width, height)
}

#[test]
fn test_buffer_index_layout() {
    // Row-major, three bytes per pixel.
    assert_eq!(buffer_index(4, 0, 0), 0);
    assert_eq!(buffer_index(4, 1, 0), 3);
    assert_eq!(buffer_index(4, 3, 0), 9);
    assert_eq!(buffer_index(4, 0, 1), 12);
    assert_eq!(buffer_index(4, 3, 1), 21);
}

#[test]
fn test_write_pixel_patches_three_bytes() {
    let mut buffer = vec![0xFF; 4 * 2 * 3];
    let rgb: Rgb = "ff0000".parse().unwrap();
    write_pixel(&mut buffer, 4, 1, 0, rgb);

    assert_eq!(&buffer[3..6], &[0xFF, 0x00, 0x00]);
    // Every other pixel stays at the white background.
    assert!(buffer[..3].iter().all(|&b| b == 0xFF));
    assert!(buffer[6..].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_write_pixel_rebuild_population() {
    // Replaying (x, y, rgb) placements in history order leaves the latest
    // color per coordinate, exactly what the rebuild query streams.
    let mut buffer = vec![0xFF; 4 * 2 * 3];
    let placements = [
        (0u32, 0u32, "aa0000"),
        (0, 0, "00bb00"),
        (1, 0, "0000cc"),
    ];
    for (x, y, rgb) in placements {
        write_pixel(&mut buffer, 4, x, y, rgb.parse().unwrap());
    }

    assert_eq!(&buffer[0..3], &[0x00, 0xBB, 0x00]);
    assert_eq!(&buffer[3..6], &[0x00, 0x00, 0xCC]);
}

#[tokio::test]
async fn test_canvas_dimensions_and_bounds() {
    let canvas = test_canvas(4, 2);
    assert_eq!(canvas.width(), 4);
    assert_eq!(canvas.height(), 2);
    assert_eq!(canvas.flat_len(), 24);

    assert!(canvas.in_bounds(0, 0));
    assert!(canvas.in_bounds(3, 1));
    assert!(!canvas.in_bounds(4, 0));
    assert!(!canvas.in_bounds(0, 2));
}

#[tokio::test]
async fn test_flat_len_tracks_size_change() {
    // The freshness check compares the cached buffer length against this
    // value, so a resized canvas forces a rebuild.
    assert_eq!(test_canvas(4, 2).flat_len(), 24);
    assert_eq!(test_canvas(8, 2).flat_len(), 48);
}
