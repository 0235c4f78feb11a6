// src/wgpu_utils/uniform_arena.rs
//! Per-frame uniform storage
//!
//! Every draw snapshots its program's uniform block into one growing buffer;
//! the draw then binds that buffer with a dynamic offset. The GPU buffer is
//! recreated when a frame outgrows it, which bumps [`UniformArena::generation`]
//! so that bind groups built against the old buffer can be dropped.

/// Rounds `value` up to a multiple of `alignment`.
pub fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

pub struct UniformArena {
    alignment: u64,
    staging: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    generation: u64,
}

impl UniformArena {
    /// # Arguments
    /// * `alignment` - Offset alignment, normally `min_uniform_buffer_offset_alignment`
    pub fn new(alignment: u64) -> Self {
        Self {
            alignment: alignment.max(1),
            staging: Vec::new(),
            buffer: None,
            capacity: 0,
            generation: 0,
        }
    }

    /// Appends one block and returns its offset.
    pub fn push(&mut self, bytes: &[u8]) -> u32 {
        let offset = align_to(self.staging.len() as u64, self.alignment);
        self.staging.resize(offset as usize, 0);
        self.staging.extend_from_slice(bytes);
        offset as u32
    }

    /// Bytes staged this frame
    pub fn len(&self) -> u64 {
        self.staging.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    pub fn staged(&self) -> &[u8] {
        &self.staging
    }

    /// Copies the staged blocks to the GPU, growing the buffer if needed.
    ///
    /// # Returns
    /// True if the buffer was recreated
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let required = align_to(self.len().max(1), wgpu::COPY_BUFFER_ALIGNMENT).max(self.alignment);
        let grown = self.buffer.is_none() || required > self.capacity;

        if grown {
            let capacity = required.next_power_of_two();
            log::debug!("uniform arena grows to {} bytes", capacity);
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Uniform Arena"),
                size: capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.capacity = capacity;
            self.generation += 1;
        }

        if let Some(buffer) = &self.buffer {
            if !self.staging.is_empty() {
                let padded = align_to(self.len(), wgpu::COPY_BUFFER_ALIGNMENT) as usize;
                self.staging.resize(padded, 0);
                queue.write_buffer(buffer, 0, &self.staging);
            }
        }
        grown
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Incremented every time the GPU buffer is replaced
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forgets this frame's blocks; the GPU buffer is kept.
    pub fn clear(&mut self) {
        self.staging.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(300, 256), 512);
        assert_eq!(align_to(7, 1), 7);
    }

    #[test]
    fn test_push_aligns_every_block() {
        let mut arena = UniformArena::new(256);
        assert_eq!(arena.push(&[1u8; 160]), 0);
        assert_eq!(arena.push(&[2u8; 160]), 256);
        assert_eq!(arena.push(&[3u8; 16]), 512);
        assert_eq!(arena.len(), 528);
        assert_eq!(arena.staged()[256], 2);
        assert_eq!(arena.staged()[200], 0);

        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.push(&[4u8; 4]), 0);
        assert_eq!(arena.generation(), 0);
    }
}
