//! Byte views over `#[repr(C)]` structs handed back to the guest.

/// View a plain-data struct as bytes.
///
/// # Safety
///
/// Only implement on `#[repr(C)]` structs whose fields are all plain numeric
/// types (or arrays of them) with no pointers and no padding bytes.
pub unsafe trait AsBytes: Sized {
    fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self as *const Self as *const u8, std::mem::size_of::<Self>())
        }
    }

    /// Copy as much of `self` as fits into `dst`, returning the byte count.
    fn copy_to(&self, dst: &mut [u8]) -> usize {
        let src = self.as_bytes();
        let len = src.len().min(dst.len());
        dst[..len].copy_from_slice(&src[..len]);
        len
    }
}

unsafe impl AsBytes for u32 {}
unsafe impl AsBytes for u64 {}
unsafe impl AsBytes for [u32; 4] {}

/// Reinterpret little-endian bytes as `u32` words, ignoring a trailing
/// partial word.
pub fn words(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_copy() {
        let value = [1u32, 2, 3, 4];
        let mut dst = [0u8; 6];
        assert_eq!(value.copy_to(&mut dst), 6);
        assert_eq!(&dst, &[1, 0, 0, 0, 2, 0]);
    }

    #[test]
    fn word_view() {
        let bytes = [1u8, 0, 0, 0, 0xff, 0, 0, 0, 7];
        assert_eq!(words(&bytes).collect::<Vec<_>>(), vec![1, 255]);
    }
}
