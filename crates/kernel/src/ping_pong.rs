//! Double-buffered storage.
//!
//! A stage that reads and writes the same logical field renders into the
//! writable half while sampling the readable half; [`PingPong::commit`] swaps
//! the roles once the write has landed. The pair never exposes the same
//! buffer as both readable and writable.

use crate::error::KernelError;

/// Two buffers of the same shape with a read/write role flag.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    buffers: [T; 2],
    read: usize,
    pending: bool,
}

impl<T> PingPong<T> {
    /// Pair `front` (initially readable) with `back` (initially writable).
    pub fn new(front: T, back: T) -> Self {
        Self {
            buffers: [front, back],
            read: 0,
            pending: false,
        }
    }

    /// Build both halves with the same constructor.
    pub fn from_fn(mut make: impl FnMut() -> T) -> Self {
        Self::new(make(), make())
    }

    /// Buffer holding the last committed value.
    pub fn readable(&self) -> &T {
        &self.buffers[self.read]
    }

    /// Buffer the next pass renders into. Marks a write as pending.
    pub fn writable(&mut self) -> &mut T {
        self.pending = true;
        &mut self.buffers[1 - self.read]
    }

    /// Borrow the readable and writable halves at once, for stages that
    /// sample the field they write. Marks a write as pending.
    pub fn split(&mut self) -> (&T, &mut T) {
        self.pending = true;
        let (first, second) = self.buffers.split_at_mut(1);
        if self.read == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Swap roles after a completed write.
    pub fn commit(&mut self) -> Result<(), KernelError> {
        if !self.pending {
            return Err(KernelError::CommitWithoutWrite);
        }
        self.read = 1 - self.read;
        self.pending = false;
        Ok(())
    }

    /// Whether a write has been issued since the last commit.
    pub fn has_pending_write(&self) -> bool {
        self.pending
    }

    /// Host-side overwrite of the committed value between frames.
    pub fn readable_mut(&mut self) -> &mut T {
        &mut self.buffers[self.read]
    }

    /// Apply `f` to both halves and drop any pending write.
    pub fn reset_with(&mut self, mut f: impl FnMut(&mut T)) {
        for buffer in &mut self.buffers {
            f(buffer);
        }
        self.read = 0;
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_swaps_roles() {
        let mut pp = PingPong::new(1u32, 2u32);
        assert_eq!(*pp.readable(), 1);
        *pp.writable() = 5;
        pp.commit().unwrap();
        assert_eq!(*pp.readable(), 5);
        *pp.writable() = 7;
        pp.commit().unwrap();
        assert_eq!(*pp.readable(), 7);
    }

    #[test]
    fn written_value_invisible_until_commit() {
        let mut pp = PingPong::new(1u32, 0u32);
        *pp.writable() = 42;
        assert_eq!(*pp.readable(), 1);
        assert!(pp.has_pending_write());
        pp.commit().unwrap();
        assert_eq!(*pp.readable(), 42);
        assert!(!pp.has_pending_write());
    }

    #[test]
    fn commit_without_write_is_rejected() {
        let mut pp = PingPong::new(0u8, 0u8);
        assert!(matches!(pp.commit(), Err(KernelError::CommitWithoutWrite)));
        *pp.writable() = 1;
        pp.commit().unwrap();
        assert!(pp.commit().is_err());
    }

    #[test]
    fn split_halves_are_distinct() {
        let mut pp = PingPong::new(vec![1.0f32], vec![0.0f32]);
        for round in 0..4 {
            let (read, write) = pp.split();
            assert!(!std::ptr::eq(read, write));
            write[0] = read[0] + 1.0;
            pp.commit().unwrap();
            assert_eq!(pp.readable()[0], 2.0 + round as f32);
        }
    }

    #[test]
    fn reset_restores_initial_roles() {
        let mut pp = PingPong::new(1i32, 2i32);
        *pp.writable() = 3;
        pp.reset_with(|v| *v = 0);
        assert_eq!(*pp.readable(), 0);
        assert!(!pp.has_pending_write());
    }
}
