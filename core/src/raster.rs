/// A position within a `width x height` raster, advanced in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterCursor {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl RasterCursor {
    pub fn new(width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0);
        Self { x: 0, y: 0, width, height }
    }

    pub fn x(&self) -> u32 {
        self.x
    }
    pub fn y(&self) -> u32 {
        self.y
    }
    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn row_last(&self) -> bool {
        self.x + 1 == self.width
    }

    pub fn frame_last(&self) -> bool {
        self.y + 1 == self.height && self.row_last()
    }

    /// Steps one pixel forward, wrapping at the end of a row and back to the
    /// origin at the end of the frame.
    pub fn advance(&mut self) {
        self.x += 1;
        if self.x >= self.width {
            self.x = 0;
            self.y += 1;
            if self.y >= self.height {
                self.y = 0;
            }
        }
    }

    pub fn next_row(&mut self) {
        self.x = 0;
        self.y += 1;
        if self.y >= self.height {
            self.y = 0;
        }
    }

    /// Up to `count` positions following the current one, stopping at the end
    /// of the frame.
    pub fn lookahead(&self, count: usize) -> Vec<(u32, u32)> {
        let mut cursor = *self;
        let mut ahead = Vec::with_capacity(count);
        while ahead.len() < count && !cursor.frame_last() {
            cursor.advance();
            ahead.push(cursor.position());
        }
        ahead
    }
}
