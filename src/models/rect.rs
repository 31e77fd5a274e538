/// Axis-aligned bounding box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// X coordinate of the top-left corner
    pub x: i32,
    /// Y coordinate of the top-left corner
    pub y: i32,
    /// Box width in pixels
    pub width: i32,
    /// Box height in pixels
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in square pixels
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Width / height ratio
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Center point of the rectangle
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Euclidean distance between the centers of two rectangles
    pub fn center_distance(&self, other: &Rect) -> f64 {
        let (cx1, cy1) = self.center();
        let (cx2, cy2) = other.center();
        let dx = cx1 - cx2;
        let dy = cy1 - cy2;
        (dx * dx + dy * dy).sqrt()
    }

    /// Check that the rectangle lies fully inside an image of the given size
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width > 0
            && self.height > 0
            && self.x + self.width <= image_width as i32
            && self.y + self.height <= image_height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_distance() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(3, 4, 10, 10);
        assert!((a.center_distance(&b) - 5.0).abs() < 1e-9);
        assert!((b.center_distance(&a) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_fits_within() {
        assert!(Rect::new(0, 0, 10, 10).fits_within(10, 10));
        assert!(!Rect::new(1, 0, 10, 10).fits_within(10, 10));
        assert!(!Rect::new(-1, 0, 5, 5).fits_within(10, 10));
        assert!(!Rect::new(0, 0, 0, 5).fits_within(10, 10));
    }

    #[test]
    fn test_aspect_ratio() {
        let card = Rect::new(0, 0, 70, 100);
        assert!((card.aspect_ratio() - 0.7).abs() < 1e-9);
    }
}
