//! ROM loader.
use std::{fs, path::Path};

use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Raw program image, loaded verbatim at the program origin.
///
/// There is no header or magic number. The only constraint is that the
/// image fits between the origin and the end of memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    bytes: Vec<u8>,
}

impl Rom {
    /// Read a ROM file from disk.
    pub fn load(path: impl AsRef<Path>) -> Chip8Result<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(Chip8Error::RomNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Chip8Result<Self> {
        let bytes = bytes.into();

        if !check_program_size(&bytes) {
            return Err(Chip8Error::LargeProgram {
                size: bytes.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }

        Ok(Self { bytes })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for Rom {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Whether the program fits in memory after the program origin.
#[inline]
pub fn check_program_size(bytecode: &[u8]) -> bool {
    bytecode.len() <= MAX_PROGRAM_SIZE
}

#[cfg(test)]
mod test {
    use std::{env, process};

    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("chip8-rom-{}-{name}", process::id()))
    }

    #[test]
    fn test_load_file() {
        let path = temp_path("ok.ch8");
        fs::write(&path, [0x60, 0x05, 0x12, 0x00]).unwrap();

        let rom = Rom::load(&path).unwrap();
        assert_eq!(rom.as_bytes(), &[0x60, 0x05, 0x12, 0x00]);
        assert_eq!(rom.len(), 4);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_not_found() {
        let path = temp_path("missing.ch8");
        match Rom::load(&path) {
            Err(Chip8Error::RomNotFound(missing)) => assert_eq!(missing, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_oversize() {
        let path = temp_path("large.ch8");
        fs::write(&path, vec![0; MAX_PROGRAM_SIZE + 1]).unwrap();

        let result = Rom::load(&path);
        fs::remove_file(&path).unwrap();

        match result {
            Err(Chip8Error::LargeProgram { size, max }) => {
                assert_eq!(size, 3585);
                assert_eq!(max, 3584);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_largest_program_fits() {
        assert!(Rom::from_bytes(vec![0xFF; MAX_PROGRAM_SIZE]).is_ok());
        assert!(Rom::from_bytes(Vec::new()).unwrap().is_empty());
    }
}
