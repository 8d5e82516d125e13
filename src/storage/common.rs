const U8_SIZE: usize = std::mem::size_of::<u8>();
const U32_SIZE: usize = std::mem::size_of::<u32>();

/// Writes big endian values into a byte buffer, front to back.
/// Panics if the buffer is too small, callers size their buffers up front.
pub struct Serializer<'a> {
    buffer: &'a mut [u8],
    pos: usize,
}

impl<'a> Serializer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn serialize_u8(&mut self, val: u8) {
        self.buffer[self.pos..self.pos + U8_SIZE].copy_from_slice(val.to_be_bytes().as_slice());
        self.pos += U8_SIZE;
    }

    pub fn serialize_u32(&mut self, val: u32) {
        self.buffer[self.pos..self.pos + U32_SIZE].copy_from_slice(val.to_be_bytes().as_slice());
        self.pos += U32_SIZE;
    }

    pub fn serialize_i32(&mut self, val: i32) {
        self.buffer[self.pos..self.pos + U32_SIZE].copy_from_slice(val.to_be_bytes().as_slice());
        self.pos += U32_SIZE;
    }

    pub fn copy_bytes(&mut self, bytes: &[u8]) {
        self.buffer[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    /// Zeroes the next `count` bytes.
    pub fn pad(&mut self, count: usize) {
        self.buffer[self.pos..self.pos + count].fill(0);
        self.pos += count;
    }

    /// Returns how many bytes were written.
    pub fn end(self) -> usize {
        self.pos
    }
}

/// Reads what a [`Serializer`] wrote.
pub struct Deserializer<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Deserializer<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn deserialize_u8(&mut self) -> u8 {
        let val = self.buffer[self.pos];
        self.pos += U8_SIZE;
        val
    }

    pub fn deserialize_u32(&mut self) -> u32 {
        let mut bytes = [0u8; U32_SIZE];
        bytes.copy_from_slice(self.take_bytes(U32_SIZE));
        u32::from_be_bytes(bytes)
    }

    pub fn deserialize_i32(&mut self) -> i32 {
        let mut bytes = [0u8; U32_SIZE];
        bytes.copy_from_slice(self.take_bytes(U32_SIZE));
        i32::from_be_bytes(bytes)
    }

    pub fn take_bytes(&mut self, count: usize) -> &'a [u8] {
        let bytes = &self.buffer[self.pos..self.pos + count];
        self.pos += count;
        bytes
    }
}
