/// Raw video frame handed through, untouched, to the appearance backend.
pub struct Frame {
    pub dims: (u32, u32),
    pub data: Vec<u8>,
    pub timestamp: f32, // in seconds
}

impl Frame {
    #[inline]
    pub fn new(dims: (u32, u32), data: Vec<u8>, timestamp: f32) -> Self {
        Self {
            dims,
            data,
            timestamp,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.dims.0
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.dims.1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
