/// COCO class id for "person"
pub const PERSON_CLASS_ID: i64 = 0;

/// One predicted box for a single image, in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub confidence: f32,
    pub class_id: i64,
}

impl Detection {
    /// Build a detection from raw detector numbers.
    /// Coordinates are truncated towards zero, the class id likewise.
    pub fn from_raw(xyxy: [f32; 4], confidence: f32, class_id: f32) -> Self {
        Self {
            x0: xyxy[0] as i32,
            y0: xyxy[1] as i32,
            x1: xyxy[2] as i32,
            y1: xyxy[3] as i32,
            confidence,
            class_id: class_id as i64,
        }
    }

    pub fn is_person(&self) -> bool {
        self.class_id == PERSON_CLASS_ID
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    /// Label drawn above the box
    pub fn label(&self) -> String {
        format!("person {:.2}", self.confidence)
    }
}
