//! Guest memory backing a resource, as a list of segments.

/// Scatter list of guest memory. Offsets address the concatenation of all
/// segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Iov {
    segments: Vec<Vec<u8>>,
}

impl Iov {
    pub fn new(segments: Vec<Vec<u8>>) -> Self {
        Self { segments }
    }

    /// One zero-filled segment of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![vec![0; len]])
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Vec<u8>> {
        self.segments
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.segments.concat()
    }

    /// Copy out of the iov starting at `offset`. Returns the bytes copied,
    /// which is short when the iov ends first.
    pub fn read_at(&self, mut offset: usize, out: &mut [u8]) -> usize {
        let mut done = 0;
        for seg in &self.segments {
            if done == out.len() {
                break;
            }
            if offset >= seg.len() {
                offset -= seg.len();
                continue;
            }
            let n = (seg.len() - offset).min(out.len() - done);
            out[done..done + n].copy_from_slice(&seg[offset..offset + n]);
            done += n;
            offset = 0;
        }
        done
    }

    /// Copy `data` into the iov starting at `offset`. Returns the bytes
    /// written.
    pub fn write_at(&mut self, mut offset: usize, data: &[u8]) -> usize {
        let mut done = 0;
        for seg in &mut self.segments {
            if done == data.len() {
                break;
            }
            if offset >= seg.len() {
                offset -= seg.len();
                continue;
            }
            let n = (seg.len() - offset).min(data.len() - done);
            seg[offset..offset + n].copy_from_slice(&data[done..done + n]);
            done += n;
            offset = 0;
        }
        done
    }

    /// The bytes from `offset` on when they sit in a single segment.
    pub(crate) fn contiguous_from(&self, offset: usize) -> Option<&[u8]> {
        match self.segments.as_slice() {
            [only] => only.get(offset..),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for Iov {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(vec![bytes])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn read_across_segments() {
        let iov = Iov::new(vec![vec![1, 2, 3], vec![], vec![4, 5], vec![6]]);
        assert_eq!(iov.len(), 6);
        let mut out = [0u8; 4];
        assert_eq!(iov.read_at(2, &mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
        assert_eq!(iov.read_at(5, &mut out), 1);
        assert_eq!(iov.read_at(9, &mut out), 0);
    }

    #[test]
    fn write_across_segments() {
        let mut iov = Iov::new(vec![vec![0; 2], vec![0; 3]]);
        assert_eq!(iov.write_at(1, &[9, 8, 7, 6, 5]), 4);
        assert_eq!(iov.to_vec(), vec![0, 9, 8, 7, 6]);
        assert!(iov.contiguous_from(0).is_none());
        let single = Iov::from(vec![1, 2, 3]);
        assert_eq!(single.contiguous_from(1), Some(&[2u8, 3][..]));
    }
}
