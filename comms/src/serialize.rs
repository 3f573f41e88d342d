use std::io;

/// Types that can be written as a frame body.
///
/// Implementors write their header (and any owned encoding) into `buf` and may
/// return a borrowed tail that is written after it without copying.
pub trait Serialize<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}
