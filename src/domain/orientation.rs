/// Rotation needed to display an image upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Rotate180,
    /// 90 degrees clockwise.
    Cw90,
    /// 90 degrees counter-clockwise.
    Ccw90,
}

impl Rotation {
    /// Maps an EXIF orientation tag to a rotation. Tags other than 3, 6 and 8
    /// (mirrored variants, 1, or garbage) are left as they are.
    pub fn from_orientation_tag(tag: u16) -> Self {
        match tag {
            3 => Rotation::Rotate180,
            6 => Rotation::Cw90,
            8 => Rotation::Ccw90,
            _ => Rotation::None,
        }
    }
}
